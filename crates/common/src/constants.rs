//! Application-wide constants: validation error strings, wire sizes, and the
//! buyer metadata forwarding allowlist.

/// Delimiter used when joining accumulated error messages into one string.
pub const ERROR_DELIMITER: &str = "; ";

/// Minimum size of the padded auction-result plaintext. Responses smaller
/// than this are zero-padded up to it so that chaff and real results share a
/// size class.
pub const MIN_AUCTION_RESULT_BYTES: usize = 512;

/// Inbound metadata keys that may be forwarded to buyer front-ends. Anything
/// not on this list is stripped before the `GetBids` fan-out.
pub const BUYER_METADATA_KEYS: &[&str] = &["x-accept-language", "x-user-agent", "x-bna-client-ip"];

// Client-visible validation errors (returned inside the sealed envelope).
pub const MISSING_GENERATION_ID: &str = "Request is missing generation id";
pub const MISSING_PUBLISHER_NAME: &str = "Request is missing publisher name";
pub const MISSING_BUYER_INPUTS: &str = "Request is missing buyer inputs";
pub const MALFORMED_BUYER_INPUT: &str = "Buyer input could not be decoded";
pub const EMPTY_INTEREST_GROUP_OWNER: &str = "Buyer input has an empty interest group owner";

/// Per-buyer defect, formatted with the buyer origin.
pub fn missing_interest_groups(buyer: &str) -> String {
    format!("Buyer input for buyer '{buyer}' has no interest groups")
}

/// Aggregate error reported when buyer inputs exist but none are usable.
pub fn unusable_buyer_inputs(observed: &str) -> String {
    format!("Buyer inputs are present but none are usable: {observed}")
}

// Ad-server-visible validation errors (returned over the unary status).
pub const EMPTY_SELLER_SIGNALS: &str = "Seller signals are empty";
pub const EMPTY_AUCTION_SIGNALS: &str = "Auction signals are empty";
pub const EMPTY_BUYER_LIST: &str = "Buyer list is empty";
pub const EMPTY_SELLER: &str = "Seller is empty";
pub const WRONG_SELLER_DOMAIN: &str = "Seller domain does not match this server";
pub const EMPTY_BUYER_IN_PER_BUYER_CONFIG: &str = "Per-buyer config has an empty buyer key";
pub const UNKNOWN_CLIENT_TYPE: &str = "Client type is unknown";

/// Per-buyer-config defect, formatted with the buyer origin.
pub fn empty_buyer_signals(buyer: &str) -> String {
    format!("Per-buyer config for buyer '{buyer}' has empty buyer signals")
}

// Terminal envelope errors.
pub const EMPTY_PROTECTED_AUDIENCE_CIPHERTEXT: &str = "Protected audience ciphertext is empty";
pub const INVALID_ENVELOPE_KEY_ID: &str = "Invalid envelope key id";
pub const MISSING_PRIVATE_KEY: &str = "Missing private key";

/// Decryption failure, formatted with the underlying reason.
pub fn malformed_encapsulated_request(reason: &str) -> String {
    format!("Malformed encapsulated request: {reason}")
}

pub const MALFORMED_PROTECTED_AUDIENCE_PAYLOAD: &str =
    "Protected audience payload could not be decoded";
pub const INTERNAL_SERVER_ERROR: &str = "Internal server error";
pub const NO_BIDS_RECEIVED: &str = "No bids received from any buyer";

// Debug-report URL placeholders, interpolated against post-auction signals.
pub const WINNING_BID_PLACEHOLDER: &str = "${winningBid}";
pub const MADE_WINNING_BID_PLACEHOLDER: &str = "${madeWinningBid}";

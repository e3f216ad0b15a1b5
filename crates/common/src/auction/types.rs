//! Core types for the `SelectAd` flow: the inbound request/response pair, the
//! decrypted protected audience input, and the messages exchanged with buyer
//! and scoring backends.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Client platform that produced the protected audience payload. Dictates the
/// payload wire format (CBOR for browsers, proto for apps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientType {
    Unknown,
    Browser,
    App,
}

/// Per-buyer overrides supplied by the seller's ad server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerBuyerConfig {
    /// Opaque signals forwarded to this buyer; omitted from the fan-out when
    /// empty.
    #[serde(default)]
    pub buyer_signals: String,
    /// Debug id propagated to the buyer's log context.
    #[serde(default)]
    pub buyer_debug_id: String,
    /// Per-buyer `GetBids` deadline in milliseconds; 0 means unset.
    #[serde(default)]
    pub buyer_timeout_ms: u64,
}

/// Auction configuration supplied by the seller's ad server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuctionConfig {
    /// Seller origin; must match the configured origin domain.
    pub seller: String,
    /// Opaque signals for the scoring backend.
    #[serde(default)]
    pub seller_signals: String,
    /// Opaque signals forwarded to every buyer and to scoring.
    #[serde(default)]
    pub auction_signals: String,
    /// Buyer origins to solicit, in solicitation order.
    #[serde(default)]
    pub buyer_list: Vec<String>,
    #[serde(default)]
    pub per_buyer_config: BTreeMap<String, PerBuyerConfig>,
    /// Debug id propagated to the scoring backend's log context.
    #[serde(default)]
    pub seller_debug_id: String,
    /// Request-level `GetBids` deadline in milliseconds; 0 means unset.
    #[serde(default)]
    pub buyer_timeout_ms: u64,
}

/// The inbound `SelectAd` request.
#[derive(Debug, Clone, Default)]
pub struct SelectAdRequest {
    pub auction_config: AuctionConfig,
    pub client_type: ClientType,
    /// Sealed protected audience payload; used when encryption is enabled.
    pub protected_audience_ciphertext: Vec<u8>,
    /// Raw protected audience input; used when encryption is disabled.
    pub raw_protected_audience_input: Option<ProtectedAudienceInput>,
}

impl Default for ClientType {
    fn default() -> Self {
        Self::Unknown
    }
}

/// The outbound `SelectAd` response. Exactly one of the two fields is
/// populated depending on whether encryption is enabled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectAdResponse {
    pub auction_result_ciphertext: Vec<u8>,
    pub raw_response: Option<AuctionResult>,
}

/// Decrypted per-request bidding input from the client device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProtectedAudienceInput {
    /// Unique id for this auction, minted by the client.
    #[serde(default)]
    pub generation_id: String,
    /// Publisher site or app the ad slot belongs to.
    #[serde(default)]
    pub publisher_name: String,
    /// Whether event-level debug beacons may be sent for this request.
    #[serde(default)]
    pub enable_debug_reporting: bool,
    /// Encoded [`BuyerInput`] blob per buyer origin.
    #[serde(default)]
    pub buyer_input: BTreeMap<String, Vec<u8>>,
}

/// Browser-reported signals for one interest group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrowserSignals {
    #[serde(default)]
    pub join_count: i32,
    #[serde(default)]
    pub bid_count: i32,
    /// Seconds since the user joined the interest group.
    #[serde(default)]
    pub recency: i64,
    /// Serialized previous-win records.
    #[serde(default)]
    pub prev_wins: String,
}

/// One interest group within a buyer's input. Input order is significant: it
/// defines the index space reported in the bidding-group map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterestGroup {
    pub name: String,
    #[serde(default)]
    pub bidding_signals_keys: Vec<String>,
    #[serde(default)]
    pub browser_signals: Option<BrowserSignals>,
}

/// Decoded bidding input for a single buyer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuyerInput {
    pub interest_groups: Vec<InterestGroup>,
}

/// Log context forwarded to backends for cross-service correlation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogContext {
    pub generation_id: String,
    pub adtech_debug_id: String,
}

/// Event-level debug beacon URLs attached to a bid or score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebugReportUrls {
    #[serde(default)]
    pub auction_debug_win_url: String,
    #[serde(default)]
    pub auction_debug_loss_url: String,
}

/// A single ad candidate returned by a buyer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdWithBid {
    /// Opaque ad payload forwarded to scoring.
    #[serde(default)]
    pub ad: Option<serde_json::Value>,
    #[serde(default)]
    pub bid: f64,
    /// Render URL for the ad creative.
    #[serde(default)]
    pub render: String,
    #[serde(default)]
    pub allow_component_auction: bool,
    #[serde(default)]
    pub ad_component_render: Vec<String>,
    #[serde(default)]
    pub interest_group_name: String,
    #[serde(default)]
    pub ad_cost: f64,
    #[serde(default)]
    pub modeling_signals: i32,
    #[serde(default)]
    pub debug_report_urls: Option<DebugReportUrls>,
}

/// Bid solicitation sent to one buyer front-end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetBidsRequest {
    /// Chaff requests carry no real payload; this server only sends real ones.
    pub is_chaff: bool,
    pub publisher_name: String,
    pub seller: String,
    pub auction_signals: String,
    pub buyer_signals: Option<String>,
    pub buyer_input: BuyerInput,
    pub enable_debug_reporting: bool,
    pub log_context: LogContext,
}

/// Bids returned by one buyer front-end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetBidsResponse {
    pub bids: Vec<AdWithBid>,
}

/// Buyer origin → bid response, for buyers that returned at least one bid.
pub type BuyerBidsMap = BTreeMap<String, GetBidsResponse>;

/// Opaque scoring-signal blob fetched from the key/value service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringSignals {
    pub scoring_signals: String,
}

/// A bid flattened for scoring, augmented with interest-group metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdWithBidMetadata {
    #[serde(default)]
    pub ad: Option<serde_json::Value>,
    #[serde(default)]
    pub bid: f64,
    #[serde(default)]
    pub render: String,
    #[serde(default)]
    pub allow_component_auction: bool,
    #[serde(default)]
    pub ad_component_render: Vec<String>,
    #[serde(default)]
    pub interest_group_name: String,
    #[serde(default)]
    pub interest_group_owner: String,
    #[serde(default)]
    pub ad_cost: f64,
    #[serde(default)]
    pub modeling_signals: i32,
    /// Populated for browser clients from the matching interest group.
    #[serde(default)]
    pub join_count: Option<i32>,
    #[serde(default)]
    pub recency: Option<i64>,
}

/// Scoring request covering every collected bid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreAdsRequest {
    pub ad_bids: Vec<AdWithBidMetadata>,
    pub auction_signals: String,
    pub seller_signals: String,
    /// Moved out of the reactor on dispatch; absent when the signals fetch
    /// failed.
    pub scoring_signals: Option<String>,
    pub publisher_hostname: String,
    pub enable_debug_reporting: bool,
    pub log_context: LogContext,
}

/// Winning score returned by the scoring backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdScore {
    #[serde(default)]
    pub desirability: f64,
    /// Render URL of the winning ad.
    #[serde(default)]
    pub render: String,
    #[serde(default)]
    pub component_renders: Vec<String>,
    #[serde(default)]
    pub interest_group_name: String,
    #[serde(default)]
    pub interest_group_owner: String,
    #[serde(default)]
    pub buyer_bid: f64,
    #[serde(default)]
    pub debug_report_urls: Option<DebugReportUrls>,
}

/// Scoring backend response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreAdsResponse {
    pub ad_score: Option<AdScore>,
}

/// Buyer origin → indices (by input order) of interest groups whose ads
/// produced a positive bid.
pub type BiddingGroupMap = BTreeMap<String, Vec<u32>>;

/// Error surfaced to the client inside the sealed envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionResultError {
    pub code: i32,
    pub message: String,
}

/// The auction outcome serialized into the response payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuctionResult {
    /// True when the auction produced no winner; chaff responses are padded
    /// to the same size class as real ones.
    #[serde(default)]
    pub is_chaff: bool,
    #[serde(default)]
    pub ad_render_url: String,
    #[serde(default)]
    pub ad_component_render_urls: Vec<String>,
    #[serde(default)]
    pub interest_group_name: String,
    #[serde(default)]
    pub interest_group_owner: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub bid: f64,
    #[serde(default)]
    pub bidding_groups: BiddingGroupMap,
    #[serde(default)]
    pub error: Option<AuctionResultError>,
}

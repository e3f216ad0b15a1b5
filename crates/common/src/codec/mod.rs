//! Payload codecs for the sealed request/response bodies.
//!
//! The client type dictates the wire format: browsers speak CBOR
//! (`ciborium`), apps speak protobuf (`prost`). [`proto`] holds the
//! hand-written prost messages mirroring the domain types.

pub mod proto;

use error_stack::Report;
use prost::Message;

use crate::auction::types::{AuctionResult, BuyerInput, ClientType, ProtectedAudienceInput};
use crate::compression::{gzip_compress, gzip_decompress};
use crate::error::SellerFrontendError;
use crate::framing::{decode_frame, encode_frame, CompressionType};

/// Encode a protected audience input in the client's wire format.
///
/// # Errors
///
/// Returns a [`SellerFrontendError::Codec`] report for unknown client types
/// or serializer failures.
pub fn encode_protected_audience_input(
    client_type: ClientType,
    input: &ProtectedAudienceInput,
) -> Result<Vec<u8>, Report<SellerFrontendError>> {
    match client_type {
        ClientType::Browser => encode_cbor(input),
        ClientType::App => Ok(proto::ProtectedAudienceInputProto::from(input).encode_to_vec()),
        ClientType::Unknown => Err(unknown_client_type()),
    }
}

/// Decode a protected audience input in the client's wire format.
///
/// # Errors
///
/// Returns a [`SellerFrontendError::Codec`] report for unknown client types
/// or malformed payloads.
pub fn decode_protected_audience_input(
    client_type: ClientType,
    bytes: &[u8],
) -> Result<ProtectedAudienceInput, Report<SellerFrontendError>> {
    match client_type {
        ClientType::Browser => decode_cbor(bytes),
        ClientType::App => proto::ProtectedAudienceInputProto::decode(bytes)
            .map(ProtectedAudienceInput::from)
            .map_err(|e| {
                Report::new(SellerFrontendError::codec(format!(
                    "failed to decode protected audience input proto: {e}"
                )))
            }),
        ClientType::Unknown => Err(unknown_client_type()),
    }
}

/// Encode a single buyer's input in the client's wire format.
///
/// # Errors
///
/// Returns a [`SellerFrontendError::Codec`] report for unknown client types
/// or serializer failures.
pub fn encode_buyer_input(
    client_type: ClientType,
    input: &BuyerInput,
) -> Result<Vec<u8>, Report<SellerFrontendError>> {
    match client_type {
        ClientType::Browser => encode_cbor(input),
        ClientType::App => Ok(proto::BuyerInputProto::from(input).encode_to_vec()),
        ClientType::Unknown => Err(unknown_client_type()),
    }
}

/// Decode a single buyer's input in the client's wire format.
///
/// # Errors
///
/// Returns a [`SellerFrontendError::Codec`] report for unknown client types
/// or malformed payloads.
pub fn decode_buyer_input(
    client_type: ClientType,
    bytes: &[u8],
) -> Result<BuyerInput, Report<SellerFrontendError>> {
    match client_type {
        ClientType::Browser => decode_cbor(bytes),
        ClientType::App => proto::BuyerInputProto::decode(bytes)
            .map(BuyerInput::from)
            .map_err(|e| {
                Report::new(SellerFrontendError::codec(format!(
                    "failed to decode buyer input proto: {e}"
                )))
            }),
        ClientType::Unknown => Err(unknown_client_type()),
    }
}

/// Encode an auction result in the client's wire format.
///
/// # Errors
///
/// Returns a [`SellerFrontendError::Codec`] report for unknown client types
/// or serializer failures.
pub fn encode_auction_result(
    client_type: ClientType,
    result: &AuctionResult,
) -> Result<Vec<u8>, Report<SellerFrontendError>> {
    match client_type {
        ClientType::Browser => encode_cbor(result),
        ClientType::App => Ok(proto::AuctionResultProto::from(result).encode_to_vec()),
        ClientType::Unknown => Err(unknown_client_type()),
    }
}

/// Decode an auction result in the client's wire format. This is the client
/// half of the response pipeline, used by tests.
///
/// # Errors
///
/// Returns a [`SellerFrontendError::Codec`] report for unknown client types
/// or malformed payloads.
pub fn decode_auction_result(
    client_type: ClientType,
    bytes: &[u8],
) -> Result<AuctionResult, Report<SellerFrontendError>> {
    match client_type {
        ClientType::Browser => decode_cbor(bytes),
        ClientType::App => proto::AuctionResultProto::decode(bytes)
            .map(AuctionResult::from)
            .map_err(|e| {
                Report::new(SellerFrontendError::codec(format!(
                    "failed to decode auction result proto: {e}"
                )))
            }),
        ClientType::Unknown => Err(unknown_client_type()),
    }
}

/// Gzip an encoded payload and wrap it in a padded frame.
///
/// # Errors
///
/// Returns a [`SellerFrontendError::Compression`] report when compression
/// fails.
pub fn compress_and_frame(encoded: &[u8]) -> Result<Vec<u8>, Report<SellerFrontendError>> {
    let compressed = gzip_compress(encoded)?;
    Ok(encode_frame(CompressionType::Gzip, &compressed))
}

/// Reverse of [`compress_and_frame`]: strip the frame and decompress the
/// payload.
///
/// # Errors
///
/// Returns a [`SellerFrontendError::Framing`] or
/// [`SellerFrontendError::Compression`] report when the frame or gzip stream
/// is malformed.
pub fn unframe_and_decompress(bytes: &[u8]) -> Result<Vec<u8>, Report<SellerFrontendError>> {
    let frame = decode_frame(bytes)?;
    match frame.compression {
        CompressionType::Uncompressed => Ok(frame.payload),
        CompressionType::Gzip => gzip_decompress(&frame.payload),
    }
}

fn encode_cbor<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, Report<SellerFrontendError>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf).map_err(|e| {
        Report::new(SellerFrontendError::codec(format!(
            "failed to encode CBOR: {e}"
        )))
    })?;
    Ok(buf)
}

fn decode_cbor<T: serde::de::DeserializeOwned>(
    bytes: &[u8],
) -> Result<T, Report<SellerFrontendError>> {
    ciborium::de::from_reader(bytes).map_err(|e| {
        Report::new(SellerFrontendError::codec(format!(
            "failed to decode CBOR: {e}"
        )))
    })
}

fn unknown_client_type() -> Report<SellerFrontendError> {
    Report::new(SellerFrontendError::codec(
        "unknown client type has no wire format",
    ))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::auction::types::{AuctionResultError, BrowserSignals, InterestGroup};

    fn sample_buyer_input() -> BuyerInput {
        BuyerInput {
            interest_groups: vec![InterestGroup {
                name: "ig1".to_string(),
                bidding_signals_keys: vec!["key1".to_string()],
                browser_signals: Some(BrowserSignals {
                    join_count: 3,
                    bid_count: 1,
                    recency: 86_400,
                    prev_wins: String::new(),
                }),
            }],
        }
    }

    fn sample_auction_result() -> AuctionResult {
        AuctionResult {
            is_chaff: false,
            ad_render_url: "https://b.com/ad".to_string(),
            ad_component_render_urls: vec!["https://b.com/component".to_string()],
            interest_group_name: "ig1".to_string(),
            interest_group_owner: "b.com".to_string(),
            score: 42.0,
            bid: 2.0,
            bidding_groups: BTreeMap::from([("b.com".to_string(), vec![0])]),
            error: None,
        }
    }

    #[test]
    fn browser_buyer_input_round_trips_as_cbor() {
        let input = sample_buyer_input();
        let encoded = encode_buyer_input(ClientType::Browser, &input).expect("encodes");
        let decoded = decode_buyer_input(ClientType::Browser, &encoded).expect("decodes");
        assert_eq!(decoded, input);
    }

    #[test]
    fn app_buyer_input_round_trips_as_proto() {
        let input = sample_buyer_input();
        let encoded = encode_buyer_input(ClientType::App, &input).expect("encodes");
        let decoded = decode_buyer_input(ClientType::App, &encoded).expect("decodes");
        assert_eq!(decoded, input);
    }

    #[test]
    fn auction_result_round_trips_in_both_formats() {
        let result = sample_auction_result();
        for client_type in [ClientType::Browser, ClientType::App] {
            let encoded = encode_auction_result(client_type, &result).expect("encodes");
            let decoded = decode_auction_result(client_type, &encoded).expect("decodes");
            assert_eq!(decoded, result);
        }
    }

    #[test]
    fn auction_result_error_survives_round_trip() {
        let result = AuctionResult {
            is_chaff: true,
            error: Some(AuctionResultError {
                code: 1,
                message: "Request is missing generation id".to_string(),
            }),
            ..Default::default()
        };
        let encoded = encode_auction_result(ClientType::Browser, &result).expect("encodes");
        let decoded = decode_auction_result(ClientType::Browser, &encoded).expect("decodes");
        assert_eq!(decoded, result);
    }

    #[test]
    fn unknown_client_type_is_rejected() {
        assert!(encode_buyer_input(ClientType::Unknown, &sample_buyer_input()).is_err());
        assert!(decode_buyer_input(ClientType::Unknown, &[]).is_err());
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        assert!(decode_buyer_input(ClientType::Browser, b"not cbor").is_err());
        assert!(decode_buyer_input(ClientType::App, &[0xff, 0xff, 0xff]).is_err());
    }

    #[test]
    fn frame_pipeline_round_trips() {
        let encoded =
            encode_auction_result(ClientType::Browser, &sample_auction_result()).expect("encodes");
        let framed = compress_and_frame(&encoded).expect("frames");
        let unframed = unframe_and_decompress(&framed).expect("unframes");
        assert_eq!(unframed, encoded);
    }
}

//! Hand-written prost messages for the APP wire format, with conversions to
//! and from the domain types.

use std::collections::BTreeMap;

use prost::Message;

use crate::auction::types::{
    AuctionResult, AuctionResultError, BrowserSignals, BuyerInput, InterestGroup,
    ProtectedAudienceInput,
};

#[derive(Clone, PartialEq, Message)]
pub struct BrowserSignalsProto {
    #[prost(int32, tag = "1")]
    pub join_count: i32,
    #[prost(int32, tag = "2")]
    pub bid_count: i32,
    #[prost(int64, tag = "3")]
    pub recency: i64,
    #[prost(string, tag = "4")]
    pub prev_wins: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct InterestGroupProto {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, repeated, tag = "2")]
    pub bidding_signals_keys: Vec<String>,
    #[prost(message, optional, tag = "3")]
    pub browser_signals: Option<BrowserSignalsProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct BuyerInputProto {
    #[prost(message, repeated, tag = "1")]
    pub interest_groups: Vec<InterestGroupProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ProtectedAudienceInputProto {
    #[prost(string, tag = "1")]
    pub generation_id: String,
    #[prost(string, tag = "2")]
    pub publisher_name: String,
    #[prost(bool, tag = "3")]
    pub enable_debug_reporting: bool,
    #[prost(btree_map = "string, bytes", tag = "4")]
    pub buyer_input: BTreeMap<String, Vec<u8>>,
}

#[derive(Clone, PartialEq, Message)]
pub struct InterestGroupIndicesProto {
    #[prost(uint32, repeated, tag = "1")]
    pub index: Vec<u32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct AuctionResultErrorProto {
    #[prost(int32, tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct AuctionResultProto {
    #[prost(bool, tag = "1")]
    pub is_chaff: bool,
    #[prost(string, tag = "2")]
    pub ad_render_url: String,
    #[prost(string, repeated, tag = "3")]
    pub ad_component_render_urls: Vec<String>,
    #[prost(string, tag = "4")]
    pub interest_group_name: String,
    #[prost(string, tag = "5")]
    pub interest_group_owner: String,
    #[prost(double, tag = "6")]
    pub score: f64,
    #[prost(double, tag = "7")]
    pub bid: f64,
    #[prost(btree_map = "string, message", tag = "8")]
    pub bidding_groups: BTreeMap<String, InterestGroupIndicesProto>,
    #[prost(message, optional, tag = "9")]
    pub error: Option<AuctionResultErrorProto>,
}

impl From<&BrowserSignals> for BrowserSignalsProto {
    fn from(signals: &BrowserSignals) -> Self {
        Self {
            join_count: signals.join_count,
            bid_count: signals.bid_count,
            recency: signals.recency,
            prev_wins: signals.prev_wins.clone(),
        }
    }
}

impl From<BrowserSignalsProto> for BrowserSignals {
    fn from(proto: BrowserSignalsProto) -> Self {
        Self {
            join_count: proto.join_count,
            bid_count: proto.bid_count,
            recency: proto.recency,
            prev_wins: proto.prev_wins,
        }
    }
}

impl From<&InterestGroup> for InterestGroupProto {
    fn from(group: &InterestGroup) -> Self {
        Self {
            name: group.name.clone(),
            bidding_signals_keys: group.bidding_signals_keys.clone(),
            browser_signals: group.browser_signals.as_ref().map(Into::into),
        }
    }
}

impl From<InterestGroupProto> for InterestGroup {
    fn from(proto: InterestGroupProto) -> Self {
        Self {
            name: proto.name,
            bidding_signals_keys: proto.bidding_signals_keys,
            browser_signals: proto.browser_signals.map(Into::into),
        }
    }
}

impl From<&BuyerInput> for BuyerInputProto {
    fn from(input: &BuyerInput) -> Self {
        Self {
            interest_groups: input.interest_groups.iter().map(Into::into).collect(),
        }
    }
}

impl From<BuyerInputProto> for BuyerInput {
    fn from(proto: BuyerInputProto) -> Self {
        Self {
            interest_groups: proto.interest_groups.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<&ProtectedAudienceInput> for ProtectedAudienceInputProto {
    fn from(input: &ProtectedAudienceInput) -> Self {
        Self {
            generation_id: input.generation_id.clone(),
            publisher_name: input.publisher_name.clone(),
            enable_debug_reporting: input.enable_debug_reporting,
            buyer_input: input.buyer_input.clone(),
        }
    }
}

impl From<ProtectedAudienceInputProto> for ProtectedAudienceInput {
    fn from(proto: ProtectedAudienceInputProto) -> Self {
        Self {
            generation_id: proto.generation_id,
            publisher_name: proto.publisher_name,
            enable_debug_reporting: proto.enable_debug_reporting,
            buyer_input: proto.buyer_input,
        }
    }
}

impl From<&AuctionResult> for AuctionResultProto {
    fn from(result: &AuctionResult) -> Self {
        Self {
            is_chaff: result.is_chaff,
            ad_render_url: result.ad_render_url.clone(),
            ad_component_render_urls: result.ad_component_render_urls.clone(),
            interest_group_name: result.interest_group_name.clone(),
            interest_group_owner: result.interest_group_owner.clone(),
            score: result.score,
            bid: result.bid,
            bidding_groups: result
                .bidding_groups
                .iter()
                .map(|(buyer, indices)| {
                    (
                        buyer.clone(),
                        InterestGroupIndicesProto {
                            index: indices.clone(),
                        },
                    )
                })
                .collect(),
            error: result.error.as_ref().map(|e| AuctionResultErrorProto {
                code: e.code,
                message: e.message.clone(),
            }),
        }
    }
}

impl From<AuctionResultProto> for AuctionResult {
    fn from(proto: AuctionResultProto) -> Self {
        Self {
            is_chaff: proto.is_chaff,
            ad_render_url: proto.ad_render_url,
            ad_component_render_urls: proto.ad_component_render_urls,
            interest_group_name: proto.interest_group_name,
            interest_group_owner: proto.interest_group_owner,
            score: proto.score,
            bid: proto.bid,
            bidding_groups: proto
                .bidding_groups
                .into_iter()
                .map(|(buyer, indices)| (buyer, indices.index))
                .collect(),
            error: proto.error.map(|e| AuctionResultError {
                code: e.code,
                message: e.message,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buyer_input_conversion_preserves_group_order() {
        let input = BuyerInput {
            interest_groups: vec![
                InterestGroup {
                    name: "first".to_string(),
                    ..Default::default()
                },
                InterestGroup {
                    name: "second".to_string(),
                    ..Default::default()
                },
            ],
        };
        let round_tripped = BuyerInput::from(BuyerInputProto::from(&input));
        assert_eq!(round_tripped, input);
    }

    #[test]
    fn empty_messages_decode_to_defaults() {
        let decoded = AuctionResultProto::decode(&[][..]).expect("empty proto decodes");
        let result = AuctionResult::from(decoded);
        assert_eq!(result, AuctionResult::default());
    }
}

//! Scoring stage: scoring-signal fetch and the `ScoreAds` dispatch.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::auction::types::{
    AdWithBid, AdWithBidMetadata, AuctionConfig, BuyerBidsMap, BuyerInput, ClientType, LogContext,
    ProtectedAudienceInput, ScoreAdsRequest, ScoreAdsResponse, ScoringSignals,
};
use crate::clients::{ScoringClient, ScoringSignalsProvider};
use crate::status::Status;

/// Fetch scoring signals for the collected bids. Failure is non-fatal:
/// scoring proceeds without signals.
pub async fn fetch_scoring_signals(
    provider: &dyn ScoringSignalsProvider,
    buyer_bids: &BuyerBidsMap,
    timeout: Duration,
) -> Option<ScoringSignals> {
    let result = match tokio::time::timeout(timeout, provider.fetch_signals(buyer_bids, timeout))
        .await
    {
        Ok(result) => result,
        Err(_) => Err(Status::deadline_exceeded(format!(
            "scoring signals fetch deadline of {}ms expired",
            timeout.as_millis()
        ))),
    };

    match result {
        Ok(signals) => Some(signals),
        Err(status) => {
            log::warn!("scoring signals fetch from key-value server failed: {status}");
            None
        }
    }
}

/// Assemble the scoring request covering every collected bid. The signals
/// blob is moved into the request.
pub fn build_score_ads_request(
    auction_config: &AuctionConfig,
    protected_audience_input: &ProtectedAudienceInput,
    buyer_bids: &BuyerBidsMap,
    buyer_inputs: &BTreeMap<String, BuyerInput>,
    scoring_signals: Option<ScoringSignals>,
    client_type: ClientType,
    legacy_interest_group_scan: bool,
) -> ScoreAdsRequest {
    let mut ad_bids = Vec::new();
    for (buyer, response) in buyer_bids {
        for bid in &response.bids {
            ad_bids.push(build_ad_with_bid_metadata(
                bid,
                buyer,
                buyer_inputs.get(buyer),
                client_type,
                legacy_interest_group_scan,
            ));
        }
    }

    ScoreAdsRequest {
        ad_bids,
        auction_signals: auction_config.auction_signals.clone(),
        seller_signals: auction_config.seller_signals.clone(),
        scoring_signals: scoring_signals.map(|signals| signals.scoring_signals),
        publisher_hostname: protected_audience_input.publisher_name.clone(),
        enable_debug_reporting: protected_audience_input.enable_debug_reporting,
        log_context: LogContext {
            generation_id: protected_audience_input.generation_id.clone(),
            adtech_debug_id: auction_config.seller_debug_id.clone(),
        },
    }
}

/// Augment one bid with its owner and, for browser clients, the join count
/// and recency of the interest group it came from.
pub(crate) fn build_ad_with_bid_metadata(
    bid: &AdWithBid,
    interest_group_owner: &str,
    buyer_input: Option<&BuyerInput>,
    client_type: ClientType,
    legacy_interest_group_scan: bool,
) -> AdWithBidMetadata {
    let mut metadata = AdWithBidMetadata {
        ad: bid.ad.clone(),
        bid: bid.bid,
        render: bid.render.clone(),
        allow_component_auction: bid.allow_component_auction,
        ad_component_render: bid.ad_component_render.clone(),
        interest_group_name: bid.interest_group_name.clone(),
        interest_group_owner: interest_group_owner.to_string(),
        ad_cost: bid.ad_cost,
        modeling_signals: bid.modeling_signals,
        join_count: None,
        recency: None,
    };

    if client_type != ClientType::Browser {
        return metadata;
    }

    let Some(buyer_input) = buyer_input else {
        return metadata;
    };

    let matching_group = buyer_input.interest_groups.iter().find(|group| {
        if legacy_interest_group_scan {
            // Legacy scan order: the first group whose name differs.
            group.name != bid.interest_group_name
        } else {
            group.name == bid.interest_group_name
        }
    });
    if let Some(group) = matching_group {
        if let Some(signals) = &group.browser_signals {
            metadata.join_count = Some(signals.join_count);
            metadata.recency = Some(signals.recency);
        }
    }

    metadata
}

/// Dispatch the scoring request. Deadline expiry and backend failures are
/// returned as-is for the reactor to propagate.
pub async fn score_ads(
    client: &dyn ScoringClient,
    request: ScoreAdsRequest,
    timeout: Duration,
) -> Result<ScoreAdsResponse, Status> {
    match tokio::time::timeout(timeout, client.score_ads(request, timeout)).await {
        Ok(result) => result,
        Err(_) => Err(Status::deadline_exceeded(format!(
            "ScoreAds deadline of {}ms expired",
            timeout.as_millis()
        ))),
    }
}

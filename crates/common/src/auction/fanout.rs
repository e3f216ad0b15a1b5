//! Parallel buyer bid solicitation.
//!
//! One `GetBids` call per buyer in the request's buyer list whose input is
//! present, all in flight at once. Completions are drained at a single await
//! point; the pending-count barrier survives as settlement accounting so that
//! every buyer settles exactly once regardless of outcome.

use std::collections::BTreeMap;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};

use crate::auction::types::{
    AuctionConfig, BuyerBidsMap, BuyerInput, GetBidsRequest, GetBidsResponse, LogContext,
    PerBuyerConfig, ProtectedAudienceInput,
};
use crate::clients::{ClientRegistry, RequestMetadata};
use crate::status::Status;

/// Result of the fan-out stage.
#[derive(Debug, Default)]
pub struct FanoutOutcome {
    /// Responses from buyers that returned at least one bid.
    pub buyer_bids: BuyerBidsMap,
    /// Number of barrier settlements; always equals the buyer-list length.
    pub settled_buyers: usize,
}

/// Solicit every buyer in the auction config's buyer list.
///
/// Buyers with no decoded input and buyers with no registered client settle
/// immediately without an outbound call. Failed or empty responses settle
/// without contributing bids.
pub async fn solicit_buyers(
    registry: &ClientRegistry,
    auction_config: &AuctionConfig,
    protected_audience_input: &ProtectedAudienceInput,
    buyer_inputs: &BTreeMap<String, BuyerInput>,
    metadata: &RequestMetadata,
    default_timeout: Duration,
) -> FanoutOutcome {
    let mut pending_bids = auction_config.buyer_list.len();
    let mut outcome = FanoutOutcome::default();
    let mut in_flight = FuturesUnordered::new();

    for buyer in &auction_config.buyer_list {
        let Some(buyer_input) = buyer_inputs.get(buyer) else {
            log::debug!("no buyer input found for buyer: {buyer}");
            settle(&mut pending_bids, &mut outcome);
            continue;
        };

        let Some(client) = registry.buyer_clients.client_for(buyer) else {
            log::debug!("no buyer client found for buyer: {buyer}");
            settle(&mut pending_bids, &mut outcome);
            continue;
        };

        let request = build_get_bids_request(
            buyer,
            buyer_input,
            auction_config,
            protected_audience_input,
        );
        let timeout = buyer_timeout(
            auction_config.per_buyer_config.get(buyer),
            auction_config.buyer_timeout_ms,
            default_timeout,
        );
        let metadata = metadata.clone();
        let buyer = buyer.clone();
        in_flight.push(async move {
            let result = match tokio::time::timeout(
                timeout,
                client.get_bids(request, &metadata, timeout),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(Status::deadline_exceeded(format!(
                    "GetBids deadline of {}ms expired",
                    timeout.as_millis()
                ))),
            };
            (buyer, result)
        });
    }

    while let Some((buyer, result)) = in_flight.next().await {
        match result {
            Ok(response) if response.bids.is_empty() => {
                log::debug!("skipping buyer {buyer} due to empty GetBids response");
            }
            Ok(response) => {
                record_bids(&mut outcome.buyer_bids, buyer, response);
            }
            Err(status) => {
                log::warn!("GetBids failed for buyer {buyer}: {status}");
            }
        }
        settle(&mut pending_bids, &mut outcome);
    }

    outcome
}

fn settle(pending_bids: &mut usize, outcome: &mut FanoutOutcome) {
    *pending_bids -= 1;
    outcome.settled_buyers += 1;
    if *pending_bids == 0 {
        log::debug!(
            "all buyers settled, {} returned bids",
            outcome.buyer_bids.len()
        );
    }
}

fn record_bids(buyer_bids: &mut BuyerBidsMap, buyer: String, response: GetBidsResponse) {
    log::debug!("buyer {buyer} returned {} bids", response.bids.len());
    buyer_bids.insert(buyer, response);
}

/// Build the solicitation for one buyer. Buyer signals are attached only when
/// the per-buyer config provides non-empty signals.
pub(crate) fn build_get_bids_request(
    buyer: &str,
    buyer_input: &BuyerInput,
    auction_config: &AuctionConfig,
    protected_audience_input: &ProtectedAudienceInput,
) -> GetBidsRequest {
    let per_buyer_config = auction_config.per_buyer_config.get(buyer);
    let buyer_signals = per_buyer_config
        .map(|config| config.buyer_signals.clone())
        .filter(|signals| !signals.is_empty());
    let buyer_debug_id = per_buyer_config
        .map(|config| config.buyer_debug_id.clone())
        .unwrap_or_default();

    GetBidsRequest {
        is_chaff: false,
        publisher_name: protected_audience_input.publisher_name.clone(),
        seller: auction_config.seller.clone(),
        auction_signals: auction_config.auction_signals.clone(),
        buyer_signals,
        buyer_input: buyer_input.clone(),
        enable_debug_reporting: protected_audience_input.enable_debug_reporting,
        log_context: LogContext {
            generation_id: protected_audience_input.generation_id.clone(),
            adtech_debug_id: buyer_debug_id,
        },
    }
}

/// Deadline for one buyer: the per-buyer override wins, then the
/// request-level timeout, then the configured default.
pub(crate) fn buyer_timeout(
    per_buyer_config: Option<&PerBuyerConfig>,
    request_timeout_ms: u64,
    default_timeout: Duration,
) -> Duration {
    if let Some(config) = per_buyer_config {
        if config.buyer_timeout_ms > 0 {
            return Duration::from_millis(config.buyer_timeout_ms);
        }
    }
    if request_timeout_ms > 0 {
        return Duration::from_millis(request_timeout_ms);
    }
    default_timeout
}

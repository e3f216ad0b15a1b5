//! Fire-and-forget win/loss debug beacons.
//!
//! After scoring, every collected bid that carries debug report URLs gets one
//! HTTP GET: the winning `(owner, interest group)` pair receives its win URL,
//! everything else its loss URL. Placeholders in the URL are interpolated
//! against the post-auction signals. Beacon tasks are spawned and never
//! awaited by the reactor; failures are logged only.

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::auction::types::{AdScore, AdWithBid, BuyerBidsMap};
use crate::clients::HttpFetcher;
use crate::constants::{MADE_WINNING_BID_PLACEHOLDER, WINNING_BID_PLACEHOLDER};

const DEBUG_REPORT_TIMEOUT: Duration = Duration::from_secs(5);

/// Auction outcome summary used for beacon URL interpolation.
#[derive(Debug, Clone, Default)]
pub struct PostAuctionSignals {
    pub winning_ig_owner: String,
    pub winning_ig_name: String,
    pub winning_bid: f64,
    pub has_winner: bool,
}

/// Derive post-auction signals from the optional high score.
pub fn generate_post_auction_signals(high_score: Option<&AdScore>) -> PostAuctionSignals {
    match high_score {
        Some(score) => PostAuctionSignals {
            winning_ig_owner: score.interest_group_owner.clone(),
            winning_ig_name: score.interest_group_name.clone(),
            winning_bid: score.buyer_bid,
            has_winner: true,
        },
        None => PostAuctionSignals::default(),
    }
}

/// Spawn one beacon task per bid with debug report URLs. The returned handles
/// are detached by the reactor; tests may await them.
pub fn dispatch_debug_reports(
    buyer_bids: &BuyerBidsMap,
    signals: &PostAuctionSignals,
    fetcher: &Arc<dyn HttpFetcher>,
) -> Vec<tokio::task::JoinHandle<()>> {
    let mut handles = Vec::new();
    for (buyer, response) in buyer_bids {
        for bid in &response.bids {
            let Some(url) = beacon_url(bid, buyer, signals) else {
                continue;
            };
            let fetcher = Arc::clone(fetcher);
            let buyer = buyer.clone();
            let ig_name = bid.interest_group_name.clone();
            handles.push(tokio::spawn(async move {
                match fetcher.fetch(&url, DEBUG_REPORT_TIMEOUT).await {
                    Ok(_) => {
                        log::debug!(
                            "performed debug reporting for {buyer}, interest group {ig_name}"
                        );
                    }
                    Err(status) => {
                        log::debug!(
                            "debug reporting failed for {buyer}, interest group {ig_name}: \
                             {status}"
                        );
                    }
                }
            }));
        }
    }
    handles
}

/// Pick and interpolate the beacon URL for one bid. Returns `None` when the
/// bid carries no debug URLs or the interpolated URL is invalid.
pub(crate) fn beacon_url(
    bid: &AdWithBid,
    buyer: &str,
    signals: &PostAuctionSignals,
) -> Option<String> {
    let urls = bid.debug_report_urls.as_ref()?;
    let made_winning_bid = signals.has_winner
        && signals.winning_ig_owner == buyer
        && signals.winning_ig_name == bid.interest_group_name;

    let template = if made_winning_bid {
        &urls.auction_debug_win_url
    } else {
        &urls.auction_debug_loss_url
    };
    if template.is_empty() {
        return None;
    }

    let interpolated = template
        .replace(WINNING_BID_PLACEHOLDER, &signals.winning_bid.to_string())
        .replace(MADE_WINNING_BID_PLACEHOLDER, &made_winning_bid.to_string());

    if let Err(e) = Url::parse(&interpolated) {
        log::warn!("dropping invalid debug report URL for {buyer}: {e}");
        return None;
    }
    Some(interpolated)
}

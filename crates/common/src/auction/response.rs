//! Auction-result assembly: bidding-group computation, the result structure,
//! and the encode → compress → pad → encapsulate pipeline.

use std::collections::{BTreeMap, BTreeSet};

use error_stack::Report;

use crate::auction::types::{
    AdScore, AuctionResult, AuctionResultError, BiddingGroupMap, BuyerBidsMap, BuyerInput,
    ClientType,
};
use crate::codec::{compress_and_frame, encode_auction_result};
use crate::envelope::{encapsulate_response, EnvelopeContext};
use crate::error::SellerFrontendError;

/// Compute the bidding-group map: for each buyer that returned bids, the
/// input-order indices of its interest groups whose name matches a bid with a
/// positive amount.
pub fn bidding_groups(
    buyer_bids: &BuyerBidsMap,
    buyer_inputs: &BTreeMap<String, BuyerInput>,
) -> BiddingGroupMap {
    let mut groups = BiddingGroupMap::new();
    for (buyer, response) in buyer_bids {
        let bidding_names: BTreeSet<&str> = response
            .bids
            .iter()
            .filter(|bid| bid.bid > 0.0)
            .map(|bid| bid.interest_group_name.as_str())
            .collect();

        let Some(buyer_input) = buyer_inputs.get(buyer) else {
            continue;
        };
        let indices: Vec<u32> = buyer_input
            .interest_groups
            .iter()
            .enumerate()
            .filter(|(_, group)| bidding_names.contains(group.name.as_str()))
            .filter_map(|(index, _)| u32::try_from(index).ok())
            .collect();
        groups.insert(buyer.clone(), indices);
    }
    groups
}

/// Build the auction result from the optional high score. Without a winner
/// the result is chaff; a client-visible error rides along either way.
pub fn build_auction_result(
    high_score: Option<&AdScore>,
    bidding_group_map: BiddingGroupMap,
    error: Option<AuctionResultError>,
) -> AuctionResult {
    let Some(score) = high_score else {
        return AuctionResult {
            is_chaff: true,
            error,
            ..Default::default()
        };
    };

    AuctionResult {
        is_chaff: false,
        ad_render_url: score.render.clone(),
        ad_component_render_urls: score.component_renders.clone(),
        interest_group_name: score.interest_group_name.clone(),
        interest_group_owner: score.interest_group_owner.clone(),
        score: score.desirability,
        bid: score.buyer_bid,
        bidding_groups: bidding_group_map,
        error,
    }
}

/// Run the outbound pipeline: encode the result for the client type, gzip,
/// wrap in a padded frame, and seal it with the request's envelope context.
///
/// # Errors
///
/// Returns a [`SellerFrontendError`] report when encoding, compression, or
/// encapsulation fails.
pub fn seal_auction_result(
    client_type: ClientType,
    result: &AuctionResult,
    context: EnvelopeContext,
) -> Result<Vec<u8>, Report<SellerFrontendError>> {
    let encoded = encode_auction_result(client_type, result)?;
    let framed = compress_and_frame(&encoded)?;
    encapsulate_response(context, &framed)
}

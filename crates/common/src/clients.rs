//! Trait definitions for the backends the reactor talks to, plus the registry
//! handed to each reactor instance.
//!
//! Production implementations live outside this crate; tests use the
//! recording doubles from [`crate::test_support`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::auction::types::{
    BuyerBidsMap, GetBidsRequest, GetBidsResponse, ScoreAdsRequest, ScoreAdsResponse,
    ScoringSignals,
};
use crate::constants::BUYER_METADATA_KEYS;
use crate::envelope::PrivateKey;
use crate::status::Status;

/// Metadata key/value pairs forwarded to buyer front-ends.
pub type RequestMetadata = Vec<(String, String)>;

/// Filter inbound call metadata down to the keys buyers are allowed to see.
pub fn filter_buyer_metadata(inbound: &HashMap<String, String>) -> RequestMetadata {
    let mut forwarded: RequestMetadata = inbound
        .iter()
        .filter(|(key, _)| BUYER_METADATA_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    forwarded.sort();
    forwarded
}

/// Bid solicitation client for a single buyer front-end.
#[async_trait]
pub trait BuyerBidClient: Send + Sync {
    /// Issue one `GetBids` call with the given deadline.
    async fn get_bids(
        &self,
        request: GetBidsRequest,
        metadata: &RequestMetadata,
        timeout: Duration,
    ) -> Result<GetBidsResponse, Status>;
}

/// Resolves the bid client for a buyer origin. Buyers without a registered
/// client are skipped by the fan-out.
pub trait BuyerClientFactory: Send + Sync {
    fn client_for(&self, buyer: &str) -> Option<Arc<dyn BuyerBidClient>>;
}

/// Key/value provider for scoring signals.
#[async_trait]
pub trait ScoringSignalsProvider: Send + Sync {
    async fn fetch_signals(
        &self,
        buyer_bids: &BuyerBidsMap,
        timeout: Duration,
    ) -> Result<ScoringSignals, Status>;
}

/// Scoring backend executing the seller's decision logic.
#[async_trait]
pub trait ScoringClient: Send + Sync {
    async fn score_ads(
        &self,
        request: ScoreAdsRequest,
        timeout: Duration,
    ) -> Result<ScoreAdsResponse, Status>;
}

/// Private-key lookup for the sealed envelope.
pub trait KeyStore: Send + Sync {
    fn private_key(&self, key_id: u8) -> Option<PrivateKey>;
}

/// Minimal HTTP GET transport, used only for debug beacons.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, Status>;
}

/// Shared backend handles for one reactor instance.
#[derive(Clone)]
pub struct ClientRegistry {
    pub buyer_clients: Arc<dyn BuyerClientFactory>,
    pub scoring: Arc<dyn ScoringClient>,
    pub scoring_signals: Arc<dyn ScoringSignalsProvider>,
    pub key_store: Arc<dyn KeyStore>,
    pub reporting: Arc<dyn HttpFetcher>,
}

//! The per-request `SelectAd` reactor.
//!
//! One reactor instance is created per inbound call and driven through a
//! fixed pipeline: decrypt, validate, fan out buyer bids, fetch scoring
//! signals, score, report debug beacons, then encode, compress, pad, and
//! encrypt the result. [`SelectAdReactor::run`] consumes the reactor, so the
//! response path completes exactly once and nothing can mutate the request
//! state afterwards. Cancellation is drop semantics: when the caller drops
//! the future, in-flight upstream calls are abandoned and their effects
//! discarded.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use error_stack::Report;

use crate::auction::debug_report::{dispatch_debug_reports, generate_post_auction_signals};
use crate::auction::errors::{AuctionErrorCode, ErrorAccumulator, ErrorVisibility};
use crate::auction::fanout::solicit_buyers;
use crate::auction::response::{bidding_groups, build_auction_result, seal_auction_result};
use crate::auction::scoring::{build_score_ads_request, fetch_scoring_signals, score_ads};
use crate::auction::types::{
    AdScore, AuctionResult, AuctionResultError, BuyerBidsMap, BuyerInput, ClientType,
    ProtectedAudienceInput, SelectAdRequest, SelectAdResponse,
};
use crate::benchmarking::{benchmarking_logger, BenchmarkingLogger};
use crate::clients::{filter_buyer_metadata, ClientRegistry, RequestMetadata};
use crate::codec::{decode_buyer_input, decode_protected_audience_input, unframe_and_decompress};
use crate::constants;
use crate::envelope::{decapsulate_request, parse_key_id, EnvelopeContext};
use crate::error::SellerFrontendError;
use crate::settings::Settings;
use crate::status::Status;

/// Per-request state machine driving one `SelectAd` call.
pub struct SelectAdReactor {
    request: SelectAdRequest,
    metadata: RequestMetadata,
    clients: ClientRegistry,
    settings: Arc<Settings>,
    benchmarking: Box<dyn BenchmarkingLogger>,
    error_accumulator: ErrorAccumulator,
    protected_audience_input: ProtectedAudienceInput,
    buyer_inputs: BTreeMap<String, BuyerInput>,
    envelope_context: Option<EnvelopeContext>,
    /// Set when fail-fast decoding stopped on a malformed buyer input.
    decode_aborted: bool,
}

impl SelectAdReactor {
    pub fn new(
        request: SelectAdRequest,
        inbound_metadata: &HashMap<String, String>,
        clients: ClientRegistry,
        settings: Arc<Settings>,
    ) -> Self {
        let benchmarking = benchmarking_logger(settings.features.enable_benchmarking);
        Self {
            request,
            metadata: filter_buyer_metadata(inbound_metadata),
            clients,
            settings,
            benchmarking,
            error_accumulator: ErrorAccumulator::new(),
            protected_audience_input: ProtectedAudienceInput::default(),
            buyer_inputs: BTreeMap::new(),
            envelope_context: None,
            decode_aborted: false,
        }
    }

    /// Drive the request to completion. Consuming `self` guarantees exactly
    /// one completion per reactor.
    pub async fn run(mut self) -> Result<SelectAdResponse, Status> {
        self.benchmarking.begin();

        if self.settings.features.enable_encryption {
            if let Err(status) = self.decrypt_request() {
                self.benchmarking.end();
                return Err(status);
            }
        } else {
            self.protected_audience_input = self
                .request
                .raw_protected_audience_input
                .take()
                .unwrap_or_default();
            self.decode_buyer_inputs();
        }

        log::debug!(
            "handling auction for generation id {}",
            self.protected_audience_input.generation_id
        );

        self.validate_auction_config();
        if self
            .error_accumulator
            .has_errors(ErrorVisibility::AdServerVisible)
        {
            self.benchmarking.end();
            return Err(Status::invalid_argument(self.error_accumulator.joined(
                ErrorVisibility::AdServerVisible,
                AuctionErrorCode::ClientSide,
            )));
        }

        let input_usable = !self.decode_aborted && self.validate_protected_audience_input();
        if !input_usable {
            // Client-visible errors travel inside the envelope with an OK
            // status; nothing is solicited.
            return self.complete_auction(None, &BuyerBidsMap::new());
        }

        let fanout = solicit_buyers(
            &self.clients,
            &self.request.auction_config,
            &self.protected_audience_input,
            &self.buyer_inputs,
            &self.metadata,
            Duration::from_millis(self.settings.rpc.get_bid_timeout_ms),
        )
        .await;

        if fanout.buyer_bids.is_empty() {
            log::debug!("{}", constants::NO_BIDS_RECEIVED);
            return self.complete_auction(None, &fanout.buyer_bids);
        }

        self.benchmarking.build_input_begin();
        let scoring_signals = fetch_scoring_signals(
            &*self.clients.scoring_signals,
            &fanout.buyer_bids,
            Duration::from_millis(self.settings.rpc.key_value_signals_fetch_timeout_ms),
        )
        .await;
        let score_request = build_score_ads_request(
            &self.request.auction_config,
            &self.protected_audience_input,
            &fanout.buyer_bids,
            &self.buyer_inputs,
            scoring_signals,
            self.request.client_type,
            self.settings.features.legacy_interest_group_scan,
        );
        self.benchmarking.build_input_end();

        let score_response = score_ads(
            &*self.clients.scoring,
            score_request,
            Duration::from_millis(self.settings.rpc.score_ads_timeout_ms),
        )
        .await;

        match score_response {
            Ok(response) => {
                let high_score = response.ad_score.filter(|score| score.buyer_bid > 0.0);
                self.complete_auction(high_score, &fanout.buyer_bids)
            }
            Err(status) => {
                log::warn!("ScoreAds failed: {status}");
                self.benchmarking.end();
                Err(status)
            }
        }
    }

    /// Open the sealed payload and decode the protected audience input plus
    /// the per-buyer inputs. Any failure here is terminal.
    fn decrypt_request(&mut self) -> Result<(), Status> {
        let ciphertext = std::mem::take(&mut self.request.protected_audience_ciphertext);
        if ciphertext.is_empty() {
            return Err(Status::invalid_argument(
                constants::EMPTY_PROTECTED_AUDIENCE_CIPHERTEXT,
            ));
        }
        log::trace!(
            "protected audience ciphertext: {}",
            BASE64.encode(&ciphertext)
        );

        let key_id = match parse_key_id(&ciphertext) {
            Ok(key_id) => key_id,
            Err(report) => {
                log::debug!("failed to parse envelope key id: {report:?}");
                return Err(Status::invalid_argument(constants::INVALID_ENVELOPE_KEY_ID));
            }
        };

        let Some(private_key) = self.clients.key_store.private_key(key_id) else {
            log::debug!("unable to retrieve private key for key id {key_id}");
            return Err(Status::invalid_argument(constants::MISSING_PRIVATE_KEY));
        };

        let decapsulated = decapsulate_request(&private_key, &ciphertext).map_err(|report| {
            log::debug!("unable to decrypt the ciphertext: {report:?}");
            Status::invalid_argument(constants::malformed_encapsulated_request(
                "decryption failed",
            ))
        })?;

        let payload = unframe_and_decompress(&decapsulated.plaintext).map_err(|report| {
            log::debug!("unable to unframe the decrypted payload: {report:?}");
            Status::invalid_argument(constants::malformed_encapsulated_request(
                "payload framing invalid",
            ))
        })?;

        self.protected_audience_input =
            decode_protected_audience_input(self.request.client_type, &payload).map_err(
                |report| {
                    log::debug!("unable to decode the protected audience input: {report:?}");
                    Status::invalid_argument(constants::MALFORMED_PROTECTED_AUDIENCE_PAYLOAD)
                },
            )?;
        self.envelope_context = Some(decapsulated.context);
        self.decode_buyer_inputs();
        Ok(())
    }

    /// Decode every buyer's encoded input blob. Malformed blobs surface as a
    /// client-visible error; with fail-fast decoding the first one aborts.
    fn decode_buyer_inputs(&mut self) {
        let encoded = std::mem::take(&mut self.protected_audience_input.buyer_input);
        for (buyer, bytes) in encoded {
            match decode_buyer_input(self.request.client_type, &bytes) {
                Ok(input) => {
                    self.buyer_inputs.insert(buyer, input);
                }
                Err(report) => {
                    log::debug!("malformed buyer input for buyer {buyer}: {report:?}");
                    self.error_accumulator.report(
                        ErrorVisibility::ClientVisible,
                        constants::MALFORMED_BUYER_INPUT,
                        AuctionErrorCode::ClientSide,
                    );
                    if self.settings.features.fail_fast_decode {
                        self.decode_aborted = true;
                        return;
                    }
                }
            }
        }
    }

    /// Check the seller-supplied auction config; defects surface to the ad
    /// server over the unary status.
    fn validate_auction_config(&mut self) {
        let config = &self.request.auction_config;
        let seller_signals_empty = config.seller_signals.is_empty();
        let auction_signals_empty = config.auction_signals.is_empty();
        let buyer_list_empty = config.buyer_list.is_empty();
        let seller_empty = config.seller.is_empty();
        let wrong_seller_domain = config.seller != self.settings.seller.origin_domain;
        enum PerBuyerDefect {
            EmptyBuyer,
            EmptyBuyerSignals(String),
        }
        let mut per_buyer_defects: Vec<PerBuyerDefect> = Vec::new();
        for (buyer, per_buyer_config) in &config.per_buyer_config {
            if buyer.is_empty() {
                per_buyer_defects.push(PerBuyerDefect::EmptyBuyer);
            }
            if per_buyer_config.buyer_signals.is_empty() {
                per_buyer_defects.push(PerBuyerDefect::EmptyBuyerSignals(buyer.clone()));
            }
        }
        let unknown_client_type = self.request.client_type == ClientType::Unknown;

        if seller_signals_empty {
            self.report_ad_server_error(constants::EMPTY_SELLER_SIGNALS);
        }
        if auction_signals_empty {
            self.report_ad_server_error(constants::EMPTY_AUCTION_SIGNALS);
        }
        if buyer_list_empty {
            self.report_ad_server_error(constants::EMPTY_BUYER_LIST);
        }
        if seller_empty {
            self.report_ad_server_error(constants::EMPTY_SELLER);
        }
        if wrong_seller_domain {
            self.report_ad_server_error(constants::WRONG_SELLER_DOMAIN);
        }
        for defect in &per_buyer_defects {
            match defect {
                PerBuyerDefect::EmptyBuyer => {
                    self.report_ad_server_error(constants::EMPTY_BUYER_IN_PER_BUYER_CONFIG);
                }
                PerBuyerDefect::EmptyBuyerSignals(buyer) => {
                    self.report_ad_server_error(constants::empty_buyer_signals(buyer));
                }
            }
        }
        if unknown_client_type {
            self.report_ad_server_error(constants::UNKNOWN_CLIENT_TYPE);
        }
    }

    /// Check the decrypted client input. Returns whether the input is usable
    /// enough to solicit buyers.
    fn validate_protected_audience_input(&mut self) -> bool {
        let mut usable = true;
        if self.protected_audience_input.generation_id.is_empty() {
            self.report_client_error(constants::MISSING_GENERATION_ID);
            usable = false;
        }
        if self.protected_audience_input.publisher_name.is_empty() {
            self.report_client_error(constants::MISSING_PUBLISHER_NAME);
            usable = false;
        }

        if self.buyer_inputs.is_empty() {
            self.report_client_error(constants::MISSING_BUYER_INPUTS);
            return false;
        }

        let mut observed_errors = BTreeSet::new();
        let mut any_buyer_input_valid = false;
        for (buyer, buyer_input) in &self.buyer_inputs {
            let mut any_error = false;
            if buyer.is_empty() {
                observed_errors.insert(constants::EMPTY_INTEREST_GROUP_OWNER.to_string());
                any_error = true;
            }
            if buyer_input.interest_groups.is_empty() {
                observed_errors.insert(constants::missing_interest_groups(buyer));
                any_error = true;
            }
            if !any_error {
                any_buyer_input_valid = true;
            }
        }

        if any_buyer_input_valid {
            // At least one buyer input is well formed; the rest are logged
            // but not reported.
            for observed_error in observed_errors {
                log::debug!("{observed_error}");
            }
        } else {
            let joined = observed_errors
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(constants::ERROR_DELIMITER);
            self.report_client_error(constants::unusable_buyer_inputs(&joined));
            usable = false;
        }

        usable
    }

    /// Terminal stage shared by every non-fatal path: bidding groups, debug
    /// beacons, result assembly, and the outbound encoding pipeline.
    fn complete_auction(
        mut self,
        high_score: Option<AdScore>,
        buyer_bids: &BuyerBidsMap,
    ) -> Result<SelectAdResponse, Status> {
        self.benchmarking.handle_response_begin();

        let bidding_group_map = bidding_groups(buyer_bids, &self.buyer_inputs);
        let post_auction_signals = generate_post_auction_signals(high_score.as_ref());
        // Beacon tasks are detached; the reactor never awaits them.
        drop(dispatch_debug_reports(
            buyer_bids,
            &post_auction_signals,
            &self.clients.reporting,
        ));

        let client_error = self
            .error_accumulator
            .has_errors(ErrorVisibility::ClientVisible)
            .then(|| AuctionResultError {
                code: AuctionErrorCode::ClientSide.as_i32(),
                message: self.error_accumulator.joined(
                    ErrorVisibility::ClientVisible,
                    AuctionErrorCode::ClientSide,
                ),
            });
        let result = build_auction_result(high_score.as_ref(), bidding_group_map, client_error);

        if !self.settings.features.enable_encryption {
            self.benchmarking.handle_response_end();
            self.benchmarking.end();
            return Ok(SelectAdResponse {
                auction_result_ciphertext: Vec::new(),
                raw_response: Some(result),
            });
        }

        match self.sealed_ciphertext(&result) {
            Ok(ciphertext) => {
                self.benchmarking.handle_response_end();
                self.benchmarking.end();
                Ok(SelectAdResponse {
                    auction_result_ciphertext: ciphertext,
                    raw_response: None,
                })
            }
            Err(report) => {
                log::error!("failed to seal the auction result: {report:?}");
                self.benchmarking.end();
                Err(Status::internal(""))
            }
        }
    }

    /// Seal the result with the stored envelope context. A reactor that
    /// reaches encryption without a context is an orchestration defect.
    fn sealed_ciphertext(
        &mut self,
        result: &AuctionResult,
    ) -> Result<Vec<u8>, Report<SellerFrontendError>> {
        let context = self.envelope_context.take().ok_or_else(|| {
            Report::new(SellerFrontendError::Auction {
                message: "envelope context missing during response encryption".to_string(),
            })
        })?;
        seal_auction_result(self.request.client_type, result, context)
    }

    fn report_ad_server_error(&mut self, message: impl Into<String>) {
        self.error_accumulator.report(
            ErrorVisibility::AdServerVisible,
            message,
            AuctionErrorCode::ClientSide,
        );
    }

    fn report_client_error(&mut self, message: impl Into<String>) {
        self.error_accumulator.report(
            ErrorVisibility::ClientVisible,
            message,
            AuctionErrorCode::ClientSide,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::types::{AdScore, DebugReportUrls};
    use crate::codec::encode_buyer_input;
    use crate::constants::MIN_AUCTION_RESULT_BYTES;
    use crate::envelope::open_response;
    use crate::status::StatusCode;
    use crate::test_support::tests::{
        create_test_settings, create_test_settings_without_encryption, open_auction_result,
        protected_audience_input_for, sample_auction_config, seal_select_ad_payload, test_bid,
        test_private_key, test_registry, MockBuyerClient, MockScoringClient, MockSignalsProvider,
        TestRegistry,
    };

    fn winning_score() -> AdScore {
        AdScore {
            desirability: 42.0,
            render: "b.com/ad".to_string(),
            component_renders: Vec::new(),
            interest_group_name: "ig1".to_string(),
            interest_group_owner: "b.com".to_string(),
            buyer_bid: 2.0,
            debug_report_urls: None,
        }
    }

    fn sealed_browser_request(buyers: &[&str]) -> (SelectAdRequest, EnvelopeContext) {
        sealed_request_for_input(buyers, protected_audience_input_for(ClientType::Browser, buyers))
    }

    fn sealed_request_for_input(
        buyers: &[&str],
        input: ProtectedAudienceInput,
    ) -> (SelectAdRequest, EnvelopeContext) {
        let (ciphertext, context) =
            seal_select_ad_payload(&test_private_key(), ClientType::Browser, &input);
        let request = SelectAdRequest {
            auction_config: sample_auction_config(buyers),
            client_type: ClientType::Browser,
            protected_audience_ciphertext: ciphertext,
            raw_protected_audience_input: None,
        };
        (request, context)
    }

    async fn run_reactor(
        request: SelectAdRequest,
        registry: &TestRegistry,
        settings: Settings,
    ) -> Result<SelectAdResponse, Status> {
        SelectAdReactor::new(
            request,
            &HashMap::new(),
            registry.registry.clone(),
            Arc::new(settings),
        )
        .run()
        .await
    }

    fn two_buyer_registry(scoring: MockScoringClient) -> TestRegistry {
        test_registry(
            &[
                (
                    "a.com",
                    MockBuyerClient::with_bid(test_bid("a.com/ad", "ig1", 1.0)),
                ),
                (
                    "b.com",
                    MockBuyerClient::with_bid(test_bid("b.com/ad", "ig1", 2.0)),
                ),
            ],
            scoring,
            MockSignalsProvider::with_signals("{\"renderUrls\":{}}"),
        )
    }

    #[tokio::test]
    async fn two_buyers_produce_an_encrypted_winner() {
        let registry = two_buyer_registry(MockScoringClient::with_score(winning_score()));
        let (request, context) = sealed_browser_request(&["a.com", "b.com"]);

        let response = run_reactor(request, &registry, create_test_settings())
            .await
            .expect("auction should succeed");

        assert!(response.raw_response.is_none());
        assert!(!response.auction_result_ciphertext.is_empty());

        let result = open_auction_result(
            context,
            ClientType::Browser,
            &response.auction_result_ciphertext,
        );
        assert!(!result.is_chaff);
        assert_eq!(result.ad_render_url, "b.com/ad");
        assert_eq!(result.score, 42.0);
        assert_eq!(result.bid, 2.0);
        assert_eq!(result.interest_group_owner, "b.com");
        assert_eq!(result.interest_group_name, "ig1");
        assert_eq!(result.bidding_groups["a.com"], vec![0]);
        assert_eq!(result.bidding_groups["b.com"], vec![0]);
        assert!(result.error.is_none());

        let score_requests = registry.score_calls.requests();
        assert_eq!(score_requests.len(), 1);
        assert_eq!(score_requests[0].ad_bids.len(), 2);
        assert_eq!(
            score_requests[0].scoring_signals.as_deref(),
            Some("{\"renderUrls\":{}}")
        );
    }

    #[tokio::test]
    async fn absent_buyer_input_limits_solicitation() {
        let registry = two_buyer_registry(MockScoringClient::with_score(AdScore {
            interest_group_owner: "a.com".to_string(),
            render: "a.com/ad".to_string(),
            buyer_bid: 1.0,
            desirability: 10.0,
            interest_group_name: "ig1".to_string(),
            ..Default::default()
        }));
        // Buyer list names both buyers, input is present only for a.com.
        let input = protected_audience_input_for(ClientType::Browser, &["a.com"]);
        let (request, context) = sealed_request_for_input(&["a.com", "b.com"], input);

        let response = run_reactor(request, &registry, create_test_settings())
            .await
            .expect("auction should succeed");

        let solicited: Vec<String> = registry
            .buyer_calls
            .requests()
            .iter()
            .map(|(buyer, _)| buyer.clone())
            .collect();
        assert_eq!(solicited, vec!["a.com".to_string()]);

        let score_requests = registry.score_calls.requests();
        assert_eq!(score_requests.len(), 1);
        assert_eq!(score_requests[0].ad_bids.len(), 1);

        let result = open_auction_result(
            context,
            ClientType::Browser,
            &response.auction_result_ciphertext,
        );
        assert!(!result.is_chaff);
    }

    #[tokio::test]
    async fn all_empty_bids_skip_scoring_and_return_chaff() {
        let registry = test_registry(
            &[
                ("a.com", MockBuyerClient::empty()),
                ("b.com", MockBuyerClient::empty()),
            ],
            MockScoringClient::with_score(winning_score()),
            MockSignalsProvider::with_signals("{}"),
        );
        let (request, context) = sealed_browser_request(&["a.com", "b.com"]);

        let response = run_reactor(request, &registry, create_test_settings())
            .await
            .expect("auction should succeed");

        assert!(registry.score_calls.requests().is_empty());
        assert!(registry.beacons.urls().is_empty());

        let result = open_auction_result(
            context,
            ClientType::Browser,
            &response.auction_result_ciphertext,
        );
        assert!(result.is_chaff);
        assert!(result.bidding_groups.is_empty());
    }

    #[tokio::test]
    async fn wrong_seller_domain_fails_before_fanout() {
        let registry = two_buyer_registry(MockScoringClient::with_score(winning_score()));
        let (mut request, _context) = sealed_browser_request(&["a.com", "b.com"]);
        request.auction_config.seller = "someone-else.example.com".to_string();

        let status = run_reactor(request, &registry, create_test_settings())
            .await
            .expect_err("mismatched seller should be rejected");

        assert_eq!(status.code(), StatusCode::InvalidArgument);
        assert!(status.message().contains(constants::WRONG_SELLER_DOMAIN));
        assert!(registry.buyer_calls.requests().is_empty());
        assert!(registry.score_calls.requests().is_empty());
    }

    #[tokio::test]
    async fn empty_buyer_list_is_ad_server_visible() {
        let registry = two_buyer_registry(MockScoringClient::with_score(winning_score()));
        let (mut request, _context) = sealed_browser_request(&["a.com"]);
        request.auction_config.buyer_list.clear();

        let status = run_reactor(request, &registry, create_test_settings())
            .await
            .expect_err("empty buyer list should be rejected");

        assert_eq!(status.code(), StatusCode::InvalidArgument);
        assert!(status.message().contains(constants::EMPTY_BUYER_LIST));
        assert!(registry.buyer_calls.requests().is_empty());
    }

    #[tokio::test]
    async fn unknown_client_type_is_ad_server_visible() {
        let registry = two_buyer_registry(MockScoringClient::with_score(winning_score()));
        let request = SelectAdRequest {
            auction_config: sample_auction_config(&["a.com"]),
            client_type: ClientType::Unknown,
            protected_audience_ciphertext: Vec::new(),
            raw_protected_audience_input: Some(protected_audience_input_for(
                ClientType::Browser,
                &["a.com"],
            )),
        };

        let status = run_reactor(request, &registry, create_test_settings_without_encryption())
            .await
            .expect_err("unknown client type should be rejected");

        assert_eq!(status.code(), StatusCode::InvalidArgument);
        assert!(status.message().contains(constants::UNKNOWN_CLIENT_TYPE));
    }

    #[tokio::test]
    async fn empty_ciphertext_is_rejected() {
        let registry = two_buyer_registry(MockScoringClient::with_score(winning_score()));
        let (mut request, _context) = sealed_browser_request(&["a.com"]);
        request.protected_audience_ciphertext.clear();

        let status = run_reactor(request, &registry, create_test_settings())
            .await
            .expect_err("empty ciphertext should be rejected");

        assert_eq!(status.code(), StatusCode::InvalidArgument);
        assert!(status
            .message()
            .contains(constants::EMPTY_PROTECTED_AUDIENCE_CIPHERTEXT));
    }

    #[tokio::test]
    async fn unknown_key_id_is_rejected_without_decoding() {
        let registry = two_buyer_registry(MockScoringClient::with_score(winning_score()));
        let (mut request, _context) = sealed_browser_request(&["a.com"]);
        // Corrupt the key id byte so the key store lookup fails.
        request.protected_audience_ciphertext[0] ^= 0xff;

        let status = run_reactor(request, &registry, create_test_settings())
            .await
            .expect_err("unknown key id should be rejected");

        assert_eq!(status.code(), StatusCode::InvalidArgument);
        assert!(status.message().contains(constants::MISSING_PRIVATE_KEY));
        assert!(registry.buyer_calls.requests().is_empty());
    }

    #[tokio::test]
    async fn truncated_ciphertext_fails_key_id_parsing() {
        let registry = two_buyer_registry(MockScoringClient::with_score(winning_score()));
        let (mut request, _context) = sealed_browser_request(&["a.com"]);
        request.protected_audience_ciphertext.truncate(3);

        let status = run_reactor(request, &registry, create_test_settings())
            .await
            .expect_err("truncated ciphertext should be rejected");

        assert_eq!(status.code(), StatusCode::InvalidArgument);
        assert!(status.message().contains(constants::INVALID_ENVELOPE_KEY_ID));
    }

    #[tokio::test]
    async fn corrupted_ciphertext_body_fails_decryption() {
        let registry = two_buyer_registry(MockScoringClient::with_score(winning_score()));
        let (mut request, _context) = sealed_browser_request(&["a.com"]);
        let last = request.protected_audience_ciphertext.len() - 1;
        request.protected_audience_ciphertext[last] ^= 0xff;

        let status = run_reactor(request, &registry, create_test_settings())
            .await
            .expect_err("corrupted ciphertext should be rejected");

        assert_eq!(status.code(), StatusCode::InvalidArgument);
        assert!(status.message().contains("Malformed encapsulated request"));
    }

    #[tokio::test(start_paused = true)]
    async fn scoring_timeout_propagates_the_status() {
        let registry = two_buyer_registry(
            MockScoringClient::with_score(winning_score()).delayed(Duration::from_secs(30)),
        );
        let (request, _context) = sealed_browser_request(&["a.com", "b.com"]);

        let status = run_reactor(request, &registry, create_test_settings())
            .await
            .expect_err("slow scoring should time out");

        assert_eq!(status.code(), StatusCode::DeadlineExceeded);
    }

    #[tokio::test]
    async fn scoring_failure_propagates_the_backend_status() {
        let registry = two_buyer_registry(MockScoringClient::failing(Status::unavailable(
            "scorer down",
        )));
        let (request, _context) = sealed_browser_request(&["a.com", "b.com"]);

        let status = run_reactor(request, &registry, create_test_settings())
            .await
            .expect_err("scoring failure should propagate");

        assert_eq!(status.code(), StatusCode::Unavailable);
        assert_eq!(status.message(), "scorer down");
    }

    #[tokio::test]
    async fn client_visible_errors_ride_inside_the_envelope() {
        let registry = two_buyer_registry(MockScoringClient::with_score(winning_score()));
        let mut input = protected_audience_input_for(ClientType::Browser, &["a.com", "b.com"]);
        input.generation_id.clear();
        let (request, context) = sealed_request_for_input(&["a.com", "b.com"], input);

        let response = run_reactor(request, &registry, create_test_settings())
            .await
            .expect("client-visible errors still return OK");

        assert!(registry.buyer_calls.requests().is_empty());

        let result = open_auction_result(
            context,
            ClientType::Browser,
            &response.auction_result_ciphertext,
        );
        assert!(result.is_chaff);
        let error = result.error.expect("envelope should carry the error");
        assert_eq!(error.code, AuctionErrorCode::ClientSide.as_i32());
        assert!(error.message.contains(constants::MISSING_GENERATION_ID));
    }

    #[tokio::test]
    async fn malformed_buyer_input_allows_partial_success() {
        let registry = two_buyer_registry(MockScoringClient::with_score(AdScore {
            interest_group_owner: "a.com".to_string(),
            render: "a.com/ad".to_string(),
            buyer_bid: 1.0,
            desirability: 10.0,
            interest_group_name: "ig1".to_string(),
            ..Default::default()
        }));
        let mut input = protected_audience_input_for(ClientType::Browser, &["a.com"]);
        input
            .buyer_input
            .insert("b.com".to_string(), b"garbage bytes".to_vec());
        let (request, context) = sealed_request_for_input(&["a.com", "b.com"], input);

        let response = run_reactor(request, &registry, create_test_settings())
            .await
            .expect("partial success should still return OK");

        let solicited: Vec<String> = registry
            .buyer_calls
            .requests()
            .iter()
            .map(|(buyer, _)| buyer.clone())
            .collect();
        assert_eq!(solicited, vec!["a.com".to_string()]);

        let result = open_auction_result(
            context,
            ClientType::Browser,
            &response.auction_result_ciphertext,
        );
        assert!(!result.is_chaff);
        let error = result.error.expect("envelope should carry the error");
        assert!(error.message.contains(constants::MALFORMED_BUYER_INPUT));
    }

    #[tokio::test]
    async fn fail_fast_decode_aborts_before_fanout() {
        let registry = two_buyer_registry(MockScoringClient::with_score(winning_score()));
        let mut input = protected_audience_input_for(ClientType::Browser, &["b.com"]);
        // BTreeMap order puts the malformed a.com entry first.
        input
            .buyer_input
            .insert("a.com".to_string(), b"garbage bytes".to_vec());
        let (request, context) = sealed_request_for_input(&["a.com", "b.com"], input);

        let mut settings = create_test_settings();
        settings.features.fail_fast_decode = true;

        let response = run_reactor(request, &registry, settings)
            .await
            .expect("fail-fast abort still returns OK");

        assert!(registry.buyer_calls.requests().is_empty());

        let result = open_auction_result(
            context,
            ClientType::Browser,
            &response.auction_result_ciphertext,
        );
        assert!(result.is_chaff);
        let error = result.error.expect("envelope should carry the error");
        assert!(error.message.contains(constants::MALFORMED_BUYER_INPUT));
    }

    #[tokio::test]
    async fn signals_fetch_failure_is_not_fatal() {
        let registry = test_registry(
            &[(
                "a.com",
                MockBuyerClient::with_bid(test_bid("a.com/ad", "ig1", 1.0)),
            )],
            MockScoringClient::with_score(AdScore {
                interest_group_owner: "a.com".to_string(),
                render: "a.com/ad".to_string(),
                buyer_bid: 1.0,
                desirability: 10.0,
                interest_group_name: "ig1".to_string(),
                ..Default::default()
            }),
            MockSignalsProvider::failing(Status::unavailable("kv store down")),
        );
        let (request, context) = sealed_browser_request(&["a.com"]);

        let response = run_reactor(request, &registry, create_test_settings())
            .await
            .expect("auction should proceed without signals");

        let score_requests = registry.score_calls.requests();
        assert_eq!(score_requests.len(), 1);
        assert_eq!(score_requests[0].scoring_signals, None);

        let result = open_auction_result(
            context,
            ClientType::Browser,
            &response.auction_result_ciphertext,
        );
        assert!(!result.is_chaff);
    }

    #[tokio::test]
    async fn encryption_disabled_returns_the_raw_response() {
        let registry = two_buyer_registry(MockScoringClient::with_score(winning_score()));
        let request = SelectAdRequest {
            auction_config: sample_auction_config(&["a.com", "b.com"]),
            client_type: ClientType::Browser,
            protected_audience_ciphertext: Vec::new(),
            raw_protected_audience_input: Some(protected_audience_input_for(
                ClientType::Browser,
                &["a.com", "b.com"],
            )),
        };

        let response = run_reactor(
            request,
            &registry,
            create_test_settings_without_encryption(),
        )
        .await
        .expect("auction should succeed");

        assert!(response.auction_result_ciphertext.is_empty());
        let result = response.raw_response.expect("raw response expected");
        assert!(!result.is_chaff);
        assert_eq!(result.ad_render_url, "b.com/ad");
    }

    #[tokio::test]
    async fn zero_bid_winner_is_treated_as_chaff() {
        let mut no_winner = winning_score();
        no_winner.buyer_bid = 0.0;
        let registry = two_buyer_registry(MockScoringClient::with_score(no_winner));
        let (request, context) = sealed_browser_request(&["a.com", "b.com"]);

        let response = run_reactor(request, &registry, create_test_settings())
            .await
            .expect("auction should succeed");

        let result = open_auction_result(
            context,
            ClientType::Browser,
            &response.auction_result_ciphertext,
        );
        assert!(result.is_chaff);
    }

    #[tokio::test]
    async fn response_plaintext_is_padded_to_the_size_class() {
        let registry = two_buyer_registry(MockScoringClient::with_score(winning_score()));
        let (request, context) = sealed_browser_request(&["a.com", "b.com"]);

        let response = run_reactor(request, &registry, create_test_settings())
            .await
            .expect("auction should succeed");

        let plaintext = open_response(context, &response.auction_result_ciphertext)
            .expect("response should open");
        assert_eq!(plaintext.len(), MIN_AUCTION_RESULT_BYTES);
    }

    #[tokio::test]
    async fn debug_beacons_fire_for_reported_bids() {
        let mut winning_bid = test_bid("b.com/ad", "ig1", 2.0);
        winning_bid.debug_report_urls = Some(DebugReportUrls {
            auction_debug_win_url: "https://b.test/win?bid=${winningBid}".to_string(),
            auction_debug_loss_url: "https://b.test/loss?bid=${winningBid}".to_string(),
        });
        let mut losing_bid = test_bid("a.com/ad", "ig1", 1.0);
        losing_bid.debug_report_urls = Some(DebugReportUrls {
            auction_debug_win_url: "https://a.test/win?bid=${winningBid}".to_string(),
            auction_debug_loss_url: "https://a.test/loss?bid=${winningBid}".to_string(),
        });
        let registry = test_registry(
            &[
                ("a.com", MockBuyerClient::with_bid(losing_bid)),
                ("b.com", MockBuyerClient::with_bid(winning_bid)),
            ],
            MockScoringClient::with_score(winning_score()),
            MockSignalsProvider::with_signals("{}"),
        );
        let (request, _context) = sealed_browser_request(&["a.com", "b.com"]);

        run_reactor(request, &registry, create_test_settings())
            .await
            .expect("auction should succeed");

        // Beacon tasks are detached; let the current-thread runtime drain them.
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }

        let mut urls = registry.beacons.urls();
        urls.sort();
        assert_eq!(
            urls,
            vec![
                "https://a.test/loss?bid=2".to_string(),
                "https://b.test/win?bid=2".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn unusable_buyer_inputs_complete_without_fanout() {
        let registry = two_buyer_registry(MockScoringClient::with_score(winning_score()));
        let mut input = protected_audience_input_for(ClientType::Browser, &[]);
        // Present but unusable: no interest groups.
        input.buyer_input.insert(
            "a.com".to_string(),
            encode_buyer_input(ClientType::Browser, &crate::auction::types::BuyerInput::default())
                .expect("empty buyer input encodes"),
        );
        let (request, context) = sealed_request_for_input(&["a.com"], input);

        let response = run_reactor(request, &registry, create_test_settings())
            .await
            .expect("unusable inputs still return OK");

        assert!(registry.buyer_calls.requests().is_empty());
        let result = open_auction_result(
            context,
            ClientType::Browser,
            &response.auction_result_ciphertext,
        );
        assert!(result.is_chaff);
        let error = result.error.expect("envelope should carry the error");
        assert!(error
            .message
            .contains("none are usable"));
    }
}

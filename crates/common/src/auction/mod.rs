//! The `SelectAd` auction pipeline.
//!
//! One [`reactor::SelectAdReactor`] is created per inbound call and driven
//! through decryption, validation, the parallel buyer fan-out, scoring, debug
//! reporting, and response sealing. The supporting stages live in their own
//! modules; production backends are injected through
//! [`crate::clients::ClientRegistry`].

pub mod debug_report;
pub mod errors;
pub mod fanout;
pub mod reactor;
pub mod response;
pub mod scoring;
pub mod types;

pub use errors::{AuctionErrorCode, ErrorAccumulator, ErrorVisibility};
pub use reactor::SelectAdReactor;
pub use types::{
    AdScore, AdWithBid, AuctionConfig, AuctionResult, BuyerInput, ClientType, GetBidsRequest,
    GetBidsResponse, ProtectedAudienceInput, SelectAdRequest, SelectAdResponse,
};

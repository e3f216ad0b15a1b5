//! Common functionality for the seller front-end auction service.
//!
//! This crate implements the `SelectAd` request pipeline: sealed-envelope
//! decryption, input validation, the parallel buyer bid fan-out, scoring
//! dispatch, debug beacons, and response encoding. Transport, key rotation,
//! and backend clients are injected through the traits in [`clients`].
//!
//! # Modules
//!
//! - [`auction`]: The per-request reactor and its pipeline stages
//! - [`benchmarking`]: Per-request timing hooks
//! - [`clients`]: Backend trait definitions and the client registry
//! - [`codec`]: CBOR/proto payload codecs and the framing pipeline
//! - [`compression`]: Gzip helpers
//! - [`constants`]: Error strings, wire sizes, and metadata allowlist
//! - [`envelope`]: Sealed request/response envelope
//! - [`error`]: Error types and error handling utilities
//! - [`framing`]: Payload framing and power-of-two padding
//! - [`logging`]: Logging initialization
//! - [`settings`]: Configuration management and validation
//! - [`status`]: gRPC-shaped status codes
//! - [`test_support`]: Testing utilities and mocks

pub mod auction;
pub mod benchmarking;
pub mod clients;
pub mod codec;
pub mod compression;
pub mod constants;
pub mod envelope;
pub mod error;
pub mod framing;
pub mod logging;
pub mod settings;
pub mod status;
pub mod test_support;

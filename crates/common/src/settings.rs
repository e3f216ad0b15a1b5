//! Configuration management for the seller front-end.
//!
//! Settings are loaded from TOML with environment overrides (prefix
//! `SELLER_FRONTEND`, separator `__`) and validated before use:
//!
//! ```toml
//! [seller]
//! origin_domain = "seller.example.com"
//!
//! [rpc]
//! get_bid_timeout_ms = 1000
//! key_value_signals_fetch_timeout_ms = 500
//! score_ads_timeout_ms = 1000
//!
//! [features]
//! enable_encryption = true
//! ```

use config::{Config, Environment, File, FileFormat};
use error_stack::{Report, ResultExt};
use serde::Deserialize;
use validator::Validate;

use crate::error::SellerFrontendError;

/// Environment variable prefix for settings overrides, e.g.
/// `SELLER_FRONTEND__SELLER__ORIGIN_DOMAIN`.
const ENV_PREFIX: &str = "SELLER_FRONTEND";

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SellerSettings {
    /// Origin domain this server fronts. Requests whose auction config names
    /// a different seller are rejected.
    #[validate(length(min = 1))]
    pub origin_domain: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RpcSettings {
    /// Default deadline for buyer `GetBids` calls when the request does not
    /// carry its own timeout.
    #[serde(default = "default_get_bid_timeout_ms")]
    #[validate(range(min = 1))]
    pub get_bid_timeout_ms: u64,

    /// Deadline for the scoring-signals key/value fetch.
    #[serde(default = "default_signals_fetch_timeout_ms")]
    #[validate(range(min = 1))]
    pub key_value_signals_fetch_timeout_ms: u64,

    /// Deadline for the `ScoreAds` call.
    #[serde(default = "default_score_ads_timeout_ms")]
    #[validate(range(min = 1))]
    pub score_ads_timeout_ms: u64,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            get_bid_timeout_ms: default_get_bid_timeout_ms(),
            key_value_signals_fetch_timeout_ms: default_signals_fetch_timeout_ms(),
            score_ads_timeout_ms: default_score_ads_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeatureSettings {
    /// When disabled, requests carry a raw protected audience input and the
    /// response is returned unencrypted.
    #[serde(default = "default_true")]
    pub enable_encryption: bool,

    /// Emit per-phase timing logs for each request.
    #[serde(default)]
    pub enable_benchmarking: bool,

    /// Abort buyer-input decoding on the first malformed entry instead of
    /// skipping it.
    #[serde(default)]
    pub fail_fast_decode: bool,

    /// Match browser signals against the first interest group whose name
    /// differs from the bid's (legacy scan order) instead of the equal name.
    #[serde(default)]
    pub legacy_interest_group_scan: bool,
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self {
            enable_encryption: true,
            enable_benchmarking: false,
            fail_fast_decode: false,
            legacy_interest_group_scan: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Settings {
    #[validate(nested)]
    pub seller: SellerSettings,

    #[serde(default)]
    #[validate(nested)]
    pub rpc: RpcSettings,

    #[serde(default)]
    pub features: FeatureSettings,
}

impl Settings {
    /// Parse settings from a TOML string, apply environment overrides, and
    /// validate the result.
    ///
    /// # Errors
    ///
    /// Returns a [`SellerFrontendError::Configuration`] report when the TOML
    /// is malformed, required keys are missing, or validation fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, Report<SellerFrontendError>> {
        let builder = Config::builder()
            .add_source(File::from_str(toml_str, FileFormat::Toml))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

        let config = builder
            .build()
            .change_context(SellerFrontendError::Configuration {
                message: "failed to assemble configuration sources".to_string(),
            })?;

        let settings: Settings =
            config
                .try_deserialize()
                .change_context(SellerFrontendError::Configuration {
                    message: "failed to deserialize settings".to_string(),
                })?;

        settings
            .validate()
            .change_context(SellerFrontendError::Configuration {
                message: "settings validation failed".to_string(),
            })?;

        Ok(settings)
    }
}

fn default_get_bid_timeout_ms() -> u64 {
    1000
}

fn default_signals_fetch_timeout_ms() -> u64 {
    500
}

fn default_score_ads_timeout_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

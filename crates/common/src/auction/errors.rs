//! Two-channel error accumulation for request validation.
//!
//! Errors observed while validating a `SelectAd` request surface through one
//! of two channels: client-visible errors travel inside the sealed response
//! envelope, ad-server-visible errors travel over the unary status. Each
//! error is a `(visibility, code, message)` entry; duplicates are collapsed.

use std::collections::{BTreeMap, BTreeSet};

use crate::constants::ERROR_DELIMITER;

/// Which party may observe an accumulated error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorVisibility {
    ClientVisible,
    AdServerVisible,
}

/// Error code carried inside the response envelope's error field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AuctionErrorCode {
    ClientSide = 1,
    ServerSide = 2,
}

impl AuctionErrorCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

type ErrorMap = BTreeMap<AuctionErrorCode, BTreeSet<String>>;

/// Append-only error collector with per-channel dedup.
#[derive(Debug, Default)]
pub struct ErrorAccumulator {
    client_visible: ErrorMap,
    ad_server_visible: ErrorMap,
}

impl ErrorAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error on the given channel. The same message reported twice
    /// for one `(visibility, code)` pair is kept once.
    pub fn report(
        &mut self,
        visibility: ErrorVisibility,
        message: impl Into<String>,
        code: AuctionErrorCode,
    ) {
        let message = message.into();
        log::debug!("accumulating {visibility:?} error: {message}");
        self.channel_mut(visibility)
            .entry(code)
            .or_default()
            .insert(message);
    }

    pub fn has_errors(&self, visibility: ErrorVisibility) -> bool {
        !self.channel(visibility).is_empty()
    }

    pub fn has_any_errors(&self) -> bool {
        !self.client_visible.is_empty() || !self.ad_server_visible.is_empty()
    }

    /// All messages for one channel and code, joined with the error
    /// delimiter. Empty string when nothing was reported.
    pub fn joined(&self, visibility: ErrorVisibility, code: AuctionErrorCode) -> String {
        self.channel(visibility)
            .get(&code)
            .map(|messages| {
                messages
                    .iter()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(ERROR_DELIMITER)
            })
            .unwrap_or_default()
    }

    fn channel(&self, visibility: ErrorVisibility) -> &ErrorMap {
        match visibility {
            ErrorVisibility::ClientVisible => &self.client_visible,
            ErrorVisibility::AdServerVisible => &self.ad_server_visible,
        }
    }

    fn channel_mut(&mut self, visibility: ErrorVisibility) -> &mut ErrorMap {
        match visibility {
            ErrorVisibility::ClientVisible => &mut self.client_visible,
            ErrorVisibility::AdServerVisible => &mut self.ad_server_visible,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_are_independent() {
        let mut accumulator = ErrorAccumulator::new();
        accumulator.report(
            ErrorVisibility::ClientVisible,
            "missing generation id",
            AuctionErrorCode::ClientSide,
        );

        assert!(accumulator.has_errors(ErrorVisibility::ClientVisible));
        assert!(!accumulator.has_errors(ErrorVisibility::AdServerVisible));
        assert!(accumulator.has_any_errors());
    }

    #[test]
    fn duplicate_messages_are_collapsed() {
        let mut accumulator = ErrorAccumulator::new();
        for _ in 0..3 {
            accumulator.report(
                ErrorVisibility::AdServerVisible,
                "buyer list is empty",
                AuctionErrorCode::ClientSide,
            );
        }

        assert_eq!(
            accumulator.joined(ErrorVisibility::AdServerVisible, AuctionErrorCode::ClientSide),
            "buyer list is empty"
        );
    }

    #[test]
    fn joined_concatenates_in_stable_order() {
        let mut accumulator = ErrorAccumulator::new();
        accumulator.report(
            ErrorVisibility::AdServerVisible,
            "seller is empty",
            AuctionErrorCode::ClientSide,
        );
        accumulator.report(
            ErrorVisibility::AdServerVisible,
            "auction signals are empty",
            AuctionErrorCode::ClientSide,
        );

        assert_eq!(
            accumulator.joined(ErrorVisibility::AdServerVisible, AuctionErrorCode::ClientSide),
            "auction signals are empty; seller is empty"
        );
    }

    #[test]
    fn joined_is_empty_for_untouched_channel() {
        let accumulator = ErrorAccumulator::new();
        assert_eq!(
            accumulator.joined(ErrorVisibility::ClientVisible, AuctionErrorCode::ClientSide),
            ""
        );
        assert!(!accumulator.has_any_errors());
    }
}

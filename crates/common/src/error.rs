//! Error types shared across the seller front-end.
//!
//! Internal fallible operations return [`error_stack::Report`]s over
//! [`SellerFrontendError`]; the report is converted into an RPC
//! [`crate::status::Status`] only at the reactor boundary.

use derive_more::{Display, Error};

/// Top-level error type for the seller front-end library.
#[derive(Debug, Display, Error)]
pub enum SellerFrontendError {
    /// Settings could not be loaded, parsed, or validated.
    #[display("Configuration error: {message}")]
    Configuration { message: String },

    /// Sealed-envelope parsing, decryption, or encryption failed.
    #[display("Envelope error: {message}")]
    Envelope { message: String },

    /// Payload encoding or decoding failed.
    #[display("Codec error: {message}")]
    Codec { message: String },

    /// Gzip compression or decompression failed.
    #[display("Compression error: {message}")]
    Compression { message: String },

    /// Payload frame was malformed or could not be built.
    #[display("Framing error: {message}")]
    Framing { message: String },

    /// Auction orchestration failed outside of any upstream RPC.
    #[display("Auction error: {message}")]
    Auction { message: String },
}

impl SellerFrontendError {
    /// Shorthand for an [`SellerFrontendError::Envelope`] with an owned message.
    pub fn envelope(message: impl Into<String>) -> Self {
        Self::Envelope {
            message: message.into(),
        }
    }

    /// Shorthand for an [`SellerFrontendError::Codec`] with an owned message.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }
}

//! Gzip helpers for payload bodies.

use std::io::{Read, Write};

use error_stack::{Report, ResultExt};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::SellerFrontendError;

/// Gzip-compress `data`.
///
/// # Errors
///
/// Returns a [`SellerFrontendError::Compression`] report when the encoder
/// fails to finalize the stream.
pub fn gzip_compress(data: &[u8]) -> Result<Vec<u8>, Report<SellerFrontendError>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .change_context(SellerFrontendError::Compression {
            message: "failed to write gzip stream".to_string(),
        })?;
    encoder
        .finish()
        .change_context(SellerFrontendError::Compression {
            message: "failed to finish gzip stream".to_string(),
        })
}

/// Gzip-decompress `data`.
///
/// # Errors
///
/// Returns a [`SellerFrontendError::Compression`] report when `data` is not a
/// valid gzip stream.
pub fn gzip_decompress(data: &[u8]) -> Result<Vec<u8>, Report<SellerFrontendError>> {
    let mut decoder = GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .change_context(SellerFrontendError::Compression {
            message: "failed to decompress gzip stream".to_string(),
        })?;
    Ok(decompressed)
}

//! Payload framing for sealed request and response bodies.
//!
//! Both directions of the envelope carry the same frame:
//!
//! ```text
//! [ compression type: 1 byte | payload length: u32 BE | payload | zero padding ]
//! ```
//!
//! The frame is padded with zeros so that the total size is the next power of
//! two of `header + payload`, with a floor of
//! [`crate::constants::MIN_AUCTION_RESULT_BYTES`]. Padding puts chaff and
//! real auction results in the same size class.

use error_stack::Report;

use crate::constants::MIN_AUCTION_RESULT_BYTES;
use crate::error::SellerFrontendError;

/// Size of the frame header: compression type byte plus big-endian length.
pub const FRAME_HEADER_LEN: usize = 1 + 4;

/// Compression applied to the framed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    Uncompressed,
    Gzip,
}

impl CompressionType {
    fn to_byte(self) -> u8 {
        match self {
            Self::Uncompressed => 0,
            Self::Gzip => 1,
        }
    }

    fn from_byte(byte: u8) -> Result<Self, Report<SellerFrontendError>> {
        match byte {
            0 => Ok(Self::Uncompressed),
            1 => Ok(Self::Gzip),
            other => Err(Report::new(SellerFrontendError::Framing {
                message: format!("unknown compression type byte {other}"),
            })),
        }
    }
}

/// A decoded frame: the compression type and the unpadded payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub compression: CompressionType,
    pub payload: Vec<u8>,
}

/// Total frame size for a payload of `payload_len` bytes: the next power of
/// two of header + payload, floored at the minimum result size.
pub fn padded_frame_size(payload_len: usize) -> usize {
    (FRAME_HEADER_LEN + payload_len)
        .next_power_of_two()
        .max(MIN_AUCTION_RESULT_BYTES)
}

/// Build a padded frame around `payload`.
pub fn encode_frame(compression: CompressionType, payload: &[u8]) -> Vec<u8> {
    let total = padded_frame_size(payload.len());
    let mut frame = Vec::with_capacity(total);
    frame.push(compression.to_byte());
    // Payload length is bounded by the sealed request size, well below u32.
    #[allow(clippy::cast_possible_truncation)]
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    frame.resize(total, 0);
    frame
}

/// Parse a frame, ignoring any zero padding after the payload.
///
/// # Errors
///
/// Returns a [`SellerFrontendError::Framing`] report when the header is
/// truncated, the compression byte is unknown, or the recorded length runs
/// past the end of the buffer.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, Report<SellerFrontendError>> {
    if bytes.len() < FRAME_HEADER_LEN {
        return Err(Report::new(SellerFrontendError::Framing {
            message: format!(
                "frame too short: {} bytes, need at least {FRAME_HEADER_LEN}",
                bytes.len()
            ),
        }));
    }

    let compression = CompressionType::from_byte(bytes[0])?;
    let mut length_bytes = [0u8; 4];
    length_bytes.copy_from_slice(&bytes[1..FRAME_HEADER_LEN]);
    let payload_len = u32::from_be_bytes(length_bytes) as usize;

    let end = FRAME_HEADER_LEN + payload_len;
    if end > bytes.len() {
        return Err(Report::new(SellerFrontendError::Framing {
            message: format!(
                "frame length {payload_len} exceeds buffer of {} bytes",
                bytes.len() - FRAME_HEADER_LEN
            ),
        }));
    }

    Ok(Frame {
        compression,
        payload: bytes[FRAME_HEADER_LEN..end].to_vec(),
    })
}

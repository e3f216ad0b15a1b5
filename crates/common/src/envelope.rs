//! Sealed request/response envelope for the `SelectAd` flow.
//!
//! A request ciphertext is framed as:
//!
//! ```text
//! [ key id: 1 byte | request nonce: 24 bytes | XChaCha20-Poly1305 ciphertext ]
//! ```
//!
//! Decapsulating a request yields the plaintext plus a single-use
//! [`EnvelopeContext`]. The response is sealed under a key derived with
//! HMAC-SHA-256 from the private key and both nonces, so only the party that
//! produced the request context can open it:
//!
//! ```text
//! [ response nonce: 24 bytes | XChaCha20-Poly1305 ciphertext ]
//! ```
//!
//! The context is consumed by [`encapsulate_response`]; at-most-once
//! encapsulation is enforced by move semantics.

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use error_stack::Report;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::error::SellerFrontendError;

/// Length of the envelope nonces (XChaCha20 extended nonce).
pub const ENVELOPE_NONCE_LEN: usize = 24;

/// Length of the envelope keys.
pub const ENVELOPE_KEY_LEN: usize = 32;

const REQUEST_HEADER_LEN: usize = 1 + ENVELOPE_NONCE_LEN;
const RESPONSE_KEY_LABEL: &[u8] = b"auction result key";

type HmacSha256 = Hmac<Sha256>;

/// A private envelope key held by the key store.
#[derive(Clone)]
pub struct PrivateKey {
    key_id: u8,
    secret: [u8; ENVELOPE_KEY_LEN],
}

impl PrivateKey {
    pub fn new(key_id: u8, secret: [u8; ENVELOPE_KEY_LEN]) -> Self {
        Self { key_id, secret }
    }

    pub fn key_id(&self) -> u8 {
        self.key_id
    }
}

impl std::fmt::Debug for PrivateKey {
    // Secret bytes stay out of logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

/// Single-use state carried from request decapsulation to response
/// encapsulation.
pub struct EnvelopeContext {
    key_id: u8,
    request_nonce: [u8; ENVELOPE_NONCE_LEN],
    secret: [u8; ENVELOPE_KEY_LEN],
}

impl EnvelopeContext {
    pub fn key_id(&self) -> u8 {
        self.key_id
    }
}

/// Result of opening a sealed request.
pub struct DecapsulatedRequest {
    pub plaintext: Vec<u8>,
    pub context: EnvelopeContext,
}

/// Read the key id from the first byte of a sealed request.
///
/// # Errors
///
/// Returns a [`SellerFrontendError::Envelope`] report when the ciphertext is
/// too short to carry the envelope header.
pub fn parse_key_id(ciphertext: &[u8]) -> Result<u8, Report<SellerFrontendError>> {
    if ciphertext.len() < REQUEST_HEADER_LEN {
        return Err(Report::new(SellerFrontendError::envelope(format!(
            "ciphertext of {} bytes is shorter than the {REQUEST_HEADER_LEN}-byte header",
            ciphertext.len()
        ))));
    }
    Ok(ciphertext[0])
}

/// Open a sealed request with the private key matching its key id.
///
/// # Errors
///
/// Returns a [`SellerFrontendError::Envelope`] report when the header is
/// truncated, the key id does not match `key`, or authenticated decryption
/// fails.
pub fn decapsulate_request(
    key: &PrivateKey,
    ciphertext: &[u8],
) -> Result<DecapsulatedRequest, Report<SellerFrontendError>> {
    let key_id = parse_key_id(ciphertext)?;
    if key_id != key.key_id {
        return Err(Report::new(SellerFrontendError::envelope(format!(
            "key id {key_id} does not match private key {}",
            key.key_id
        ))));
    }

    let mut request_nonce = [0u8; ENVELOPE_NONCE_LEN];
    request_nonce.copy_from_slice(&ciphertext[1..REQUEST_HEADER_LEN]);

    let cipher = XChaCha20Poly1305::new((&key.secret).into());
    let plaintext = cipher
        .decrypt(
            XNonce::from_slice(&request_nonce),
            Payload {
                msg: &ciphertext[REQUEST_HEADER_LEN..],
                aad: &[key_id],
            },
        )
        .map_err(|_| {
            Report::new(SellerFrontendError::envelope(
                "request decryption failed (wrong key or corrupted ciphertext)",
            ))
        })?;

    Ok(DecapsulatedRequest {
        plaintext,
        context: EnvelopeContext {
            key_id,
            request_nonce,
            secret: key.secret,
        },
    })
}

/// Seal a response plaintext, consuming the request context.
///
/// # Errors
///
/// Returns a [`SellerFrontendError::Envelope`] report when encryption fails.
pub fn encapsulate_response(
    context: EnvelopeContext,
    plaintext: &[u8],
) -> Result<Vec<u8>, Report<SellerFrontendError>> {
    let mut response_nonce = [0u8; ENVELOPE_NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut response_nonce);

    let response_key = derive_response_key(&context.secret, &context.request_nonce, &response_nonce);
    let cipher = XChaCha20Poly1305::new((&response_key).into());
    let sealed = cipher
        .encrypt(XNonce::from_slice(&response_nonce), plaintext)
        .map_err(|_| Report::new(SellerFrontendError::envelope("response encryption failed")))?;

    let mut out = Vec::with_capacity(ENVELOPE_NONCE_LEN + sealed.len());
    out.extend_from_slice(&response_nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Seal a request plaintext under `key`. This is the client half of the
/// envelope, used by callers of the service and by tests.
///
/// # Errors
///
/// Returns a [`SellerFrontendError::Envelope`] report when encryption fails.
pub fn seal_request(
    key: &PrivateKey,
    plaintext: &[u8],
) -> Result<(Vec<u8>, EnvelopeContext), Report<SellerFrontendError>> {
    let mut request_nonce = [0u8; ENVELOPE_NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut request_nonce);

    let cipher = XChaCha20Poly1305::new((&key.secret).into());
    let sealed = cipher
        .encrypt(
            XNonce::from_slice(&request_nonce),
            Payload {
                msg: plaintext,
                aad: &[key.key_id],
            },
        )
        .map_err(|_| Report::new(SellerFrontendError::envelope("request encryption failed")))?;

    let mut out = Vec::with_capacity(REQUEST_HEADER_LEN + sealed.len());
    out.push(key.key_id);
    out.extend_from_slice(&request_nonce);
    out.extend_from_slice(&sealed);

    let context = EnvelopeContext {
        key_id: key.key_id,
        request_nonce,
        secret: key.secret,
    };
    Ok((out, context))
}

/// Open a sealed response with the context produced by [`seal_request`].
/// This is the client half of the envelope, used by tests.
///
/// # Errors
///
/// Returns a [`SellerFrontendError::Envelope`] report when the response is
/// truncated or authenticated decryption fails.
pub fn open_response(
    context: EnvelopeContext,
    sealed: &[u8],
) -> Result<Vec<u8>, Report<SellerFrontendError>> {
    if sealed.len() < ENVELOPE_NONCE_LEN {
        return Err(Report::new(SellerFrontendError::envelope(format!(
            "sealed response of {} bytes is shorter than the {ENVELOPE_NONCE_LEN}-byte nonce",
            sealed.len()
        ))));
    }

    let mut response_nonce = [0u8; ENVELOPE_NONCE_LEN];
    response_nonce.copy_from_slice(&sealed[..ENVELOPE_NONCE_LEN]);

    let response_key = derive_response_key(&context.secret, &context.request_nonce, &response_nonce);
    let cipher = XChaCha20Poly1305::new((&response_key).into());
    cipher
        .decrypt(
            XNonce::from_slice(&response_nonce),
            &sealed[ENVELOPE_NONCE_LEN..],
        )
        .map_err(|_| {
            Report::new(SellerFrontendError::envelope(
                "response decryption failed (wrong context or corrupted ciphertext)",
            ))
        })
}

fn derive_response_key(
    secret: &[u8; ENVELOPE_KEY_LEN],
    request_nonce: &[u8; ENVELOPE_NONCE_LEN],
    response_nonce: &[u8; ENVELOPE_NONCE_LEN],
) -> [u8; ENVELOPE_KEY_LEN] {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret)
        .expect("HMAC accepts keys of any length");
    mac.update(RESPONSE_KEY_LABEL);
    mac.update(request_nonce);
    mac.update(response_nonce);

    let mut key = [0u8; ENVELOPE_KEY_LEN];
    key.copy_from_slice(&mac.finalize().into_bytes());
    key
}

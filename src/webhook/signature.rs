//! Webhook signature verification.
//!
//! The gateway signs each delivery with HMAC-SHA256 over the raw request
//! body and sends the lowercase hex digest in `X-Signature`. The body must
//! be verified before it is parsed; re-serialized JSON will not match.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use crate::error::WebhookError;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex signature
pub const SIGNATURE_HEADER: &str = "x-signature";

/// Length of a hex-encoded SHA-256 digest
const SIGNATURE_HEX_LEN: usize = 64;

/// Check `signature_header` against HMAC-SHA256(`secret`, `raw_body`).
///
/// The header must be exactly the 64-character lowercase hex digest; any
/// other spelling (uppercase, padding, prefixes) yields `false`. The digest
/// comparison runs in constant time.
pub fn verify(raw_body: &[u8], signature_header: &str, secret: &[u8]) -> bool {
    if !is_lowercase_hex_digest(signature_header) {
        return false;
    }

    let provided = match hex::decode(signature_header) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(raw_body);
    mac.verify_slice(&provided).is_ok()
}

fn is_lowercase_hex_digest(header: &str) -> bool {
    header.len() == SIGNATURE_HEX_LEN
        && header
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Compute the hex signature the gateway would send for `raw_body`
pub fn sign(raw_body: &[u8], secret: &[u8]) -> String {
    // HMAC accepts keys of any length; new_from_slice cannot fail here.
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret)
        .unwrap_or_else(|_| unreachable!("HMAC-SHA256 accepts any key length"));
    mac.update(raw_body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verifier bound to the shared webhook secret
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    secret: SecretString,
}

impl SignatureVerifier {
    /// Create a verifier for `secret`
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// See [`verify`]
    pub fn verify(&self, raw_body: &[u8], signature_header: &str) -> bool {
        verify(raw_body, signature_header, self.secret.expose_secret().as_bytes())
    }

    /// Verify a delivery, distinguishing a missing header from a bad one
    pub fn check(&self, raw_body: &[u8], signature_header: Option<&str>) -> Result<(), WebhookError> {
        let header = signature_header.ok_or(WebhookError::MissingSignature)?;
        if self.verify(raw_body, header) {
            Ok(())
        } else {
            Err(WebhookError::InvalidSignature)
        }
    }
}

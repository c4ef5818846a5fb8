//! Request sealing: HMAC-SHA256 over a canonical payload.
//!
//! Wire contract: `mask|context|timestamp|path|nonce`, UTF-8, mask and
//! timestamp in decimal. The seal is the standard padded base64 encoding of
//! the 32-byte MAC. Sealing and verification must produce byte-identical
//! payloads; any change here is a protocol break.

use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use subtle::ConstantTimeEq;

use crate::error::{CoreError, CoreResult};
use crate::types::SecureRequest;

type HmacSha256 = Hmac<Sha256>;

/// Field delimiter of the canonical payload.
pub const SEAL_DELIMITER: char = '|';

// ---------------------------------------------------------------------------
// SealKey — the shared secret
// ---------------------------------------------------------------------------

/// Shared secret used for sealing and for keying decoy derivation.
///
/// Only the keyed MAC state is retained; the raw secret bytes are not stored.
#[derive(Clone)]
pub struct SealKey {
    mac: HmacSha256,
}

impl SealKey {
    pub fn new(secret: &[u8]) -> CoreResult<Self> {
        if secret.is_empty() {
            return Err(CoreError::EmptySecret);
        }
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| CoreError::Crypto(format!("invalid HMAC key: {}", e)))?;
        Ok(Self { mac })
    }

    /// HMAC-SHA256 over the concatenation of `parts`.
    pub fn mac(&self, parts: &[&[u8]]) -> [u8; 32] {
        let mut mac = self.mac.clone();
        for part in parts {
            mac.update(part);
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(&mac.finalize().into_bytes());
        out
    }
}

impl fmt::Debug for SealKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SealKey([REDACTED])")
    }
}

// ---------------------------------------------------------------------------
// Seal — base64 MAC tag
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Seal(String);

impl Seal {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Seal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Protocol
// ---------------------------------------------------------------------------

pub fn canonical_payload(
    mask: i64,
    context: &str,
    timestamp: i64,
    path: &str,
    nonce: &str,
) -> Vec<u8> {
    format!(
        "{mask}{d}{context}{d}{timestamp}{d}{path}{d}{nonce}",
        d = SEAL_DELIMITER
    )
    .into_bytes()
}

pub fn compute_seal(payload: &[u8], key: &SealKey) -> Seal {
    Seal(STANDARD.encode(key.mac(&[payload])))
}

/// Seal the fields of a request as a caller would.
pub fn seal_request(
    key: &SealKey,
    mask: i64,
    context: &str,
    timestamp: i64,
    path: &str,
    nonce: &str,
) -> Seal {
    compute_seal(
        &canonical_payload(mask, context, timestamp, path, nonce),
        key,
    )
}

/// Recompute the expected seal and compare it in constant time.
pub fn verify(request: &SecureRequest, key: &SealKey) -> bool {
    let expected = seal_request(
        key,
        request.mask,
        &request.context,
        request.timestamp,
        &request.path,
        request.nonce.as_str(),
    );
    constant_time_eq(expected.as_str().as_bytes(), request.seal.as_bytes())
}

/// Length check may short-circuit; once lengths match every byte is compared
/// and differences are accumulated without branching.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SecureRequest;

    fn key() -> SealKey {
        SealKey::new(b"vortex-test-secret").unwrap()
    }

    fn sealed_request() -> SecureRequest {
        let req = SecureRequest::unsealed(9, "GET", 1_700_000_000_000, "/api/v1/resource", "n-1");
        let seal = seal_request(
            &key(),
            req.mask,
            &req.context,
            req.timestamp,
            &req.path,
            req.nonce.as_str(),
        );
        req.with_seal(seal.into_string())
    }

    #[test]
    fn test_canonical_payload_layout() {
        let payload = canonical_payload(9, "GET", 1_700_000_000_000, "/api", "abc");
        assert_eq!(payload, b"9|GET|1700000000000|/api|abc".to_vec());
    }

    #[test]
    fn test_canonical_payload_negative_mask() {
        let payload = canonical_payload(-1, "POST", 0, "/", "");
        assert_eq!(payload, b"-1|POST|0|/|".to_vec());
    }

    #[test]
    fn test_seal_is_standard_base64_of_32_bytes() {
        let seal = compute_seal(b"payload", &key());
        let raw = STANDARD.decode(seal.as_str()).unwrap();
        assert_eq!(raw.len(), 32);
        assert_eq!(seal.as_str().len(), 44);
        assert!(seal.as_str().ends_with('='));
    }

    #[test]
    fn test_seal_matches_reference_hmac() {
        // Independent computation with the hmac crate directly.
        let mut mac = HmacSha256::new_from_slice(b"vortex-test-secret").unwrap();
        mac.update(b"9|GET|1|/p|n");
        let expected = STANDARD.encode(mac.finalize().into_bytes());
        let seal = seal_request(&key(), 9, "GET", 1, "/p", "n");
        assert_eq!(seal.as_str(), expected);
    }

    #[test]
    fn test_verify_accepts_correct_seal() {
        assert!(verify(&sealed_request(), &key()));
    }

    #[test]
    fn test_verify_rejects_tampered_fields() {
        let base = sealed_request();

        let mut r = base.clone();
        r.mask = 1;
        assert!(!verify(&r, &key()));

        let mut r = base.clone();
        r.context = "POST".into();
        assert!(!verify(&r, &key()));

        let mut r = base.clone();
        r.timestamp += 1;
        assert!(!verify(&r, &key()));

        let mut r = base.clone();
        r.path = "/api/v1/other".into();
        assert!(!verify(&r, &key()));

        let mut r = base;
        r.nonce = "n-2".into();
        assert!(!verify(&r, &key()));
    }

    #[test]
    fn test_verify_rejects_wrong_key() {
        let other = SealKey::new(b"another-secret").unwrap();
        assert!(!verify(&sealed_request(), &other));
    }

    #[test]
    fn test_verify_rejects_hex_encoded_seal() {
        let req = sealed_request();
        let raw = STANDARD.decode(&req.seal).unwrap();
        let hex_seal = req.clone().with_seal(hex::encode(raw));
        assert!(!verify(&hex_seal, &key()));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abcdef", b"abcdef"));
        assert!(!constant_time_eq(b"abcdef", b"abcdeg"));
        assert!(!constant_time_eq(b"xbcdef", b"abcdef"));
        assert!(!constant_time_eq(b"abc", b"abcdef"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert_eq!(SealKey::new(b"").unwrap_err(), CoreError::EmptySecret);
    }

    #[test]
    fn test_key_debug_is_redacted() {
        let dbg = format!("{:?}", key());
        assert_eq!(dbg, "SealKey([REDACTED])");
        assert!(!dbg.contains("vortex"));
    }
}

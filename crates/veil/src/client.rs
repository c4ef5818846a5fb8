//! Caller-side helper: produce the four `X-Veil-*` header values.

use veil_core::{seal_request, Clock, Nonce, SealKey, SystemClock};

use crate::http::{MASK_HEADER, NONCE_HEADER, SEAL_HEADER, TIMESTAMP_HEADER};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedHeaders {
    pub mask: String,
    pub seal: String,
    pub timestamp: String,
    pub nonce: String,
}

impl SealedHeaders {
    pub fn build(
        key: &SealKey,
        mask: i64,
        context: &str,
        path: &str,
        timestamp: i64,
        nonce: &Nonce,
    ) -> Self {
        let seal = seal_request(key, mask, context, timestamp, path, nonce.as_str());
        Self {
            mask: mask.to_string(),
            seal: seal.into_string(),
            timestamp: timestamp.to_string(),
            nonce: nonce.to_string(),
        }
    }

    /// Seal with the current time and a freshly minted nonce.
    pub fn now(key: &SealKey, mask: i64, context: &str, path: &str) -> Self {
        let timestamp = i64::try_from(SystemClock.now_ms()).unwrap_or(i64::MAX);
        Self::build(key, mask, context, path, timestamp, &Nonce::generate())
    }

    /// Header name / value pairs, ready to attach to a request.
    pub fn pairs(&self) -> [(&'static str, &str); 4] {
        [
            (MASK_HEADER, self.mask.as_str()),
            (SEAL_HEADER, self.seal.as_str()),
            (TIMESTAMP_HEADER, self.timestamp.as_str()),
            (NONCE_HEADER, self.nonce.as_str()),
        ]
    }
}

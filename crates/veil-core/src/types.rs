use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Reality — the outcome classification of a request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reality {
    /// Real data, untouched.
    Prime,
    /// Real data with sensitive fields redacted.
    Mirror,
    /// Deterministic decoy data.
    Shadow,
}

impl Reality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reality::Prime => "prime",
            Reality::Mirror => "mirror",
            Reality::Shadow => "shadow",
        }
    }
}

impl fmt::Display for Reality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Typed identifiers
// ---------------------------------------------------------------------------

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

define_id!(
    Nonce,
    "Caller-minted single-use token. Opaque to the engine."
);
define_id!(
    Fingerprint,
    "Caller-identifying key used to track integrity failures."
);

impl Nonce {
    /// Mint a fresh 128-bit random nonce, hex-encoded.
    pub fn generate() -> Self {
        let bytes: [u8; 16] = rand::random();
        Self(hex::encode(bytes))
    }
}

// ---------------------------------------------------------------------------
// SecureRequest — the signed request as seen by the engine
// ---------------------------------------------------------------------------

/// A request as delivered by the transport adapter.
///
/// Every field is untrusted. `mask` is kept as a raw signed integer because the
/// adapter passes through whatever the caller sent, including negative or
/// out-of-range values. `timestamp` is Unix epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecureRequest {
    pub mask: i64,
    pub seal: String,
    pub context: String,
    pub timestamp: i64,
    pub path: String,
    pub nonce: Nonce,
}

impl SecureRequest {
    /// Build an unsealed request. The seal is filled in with
    /// [`crate::seal::seal_request`] or by the caller.
    pub fn unsealed(
        mask: i64,
        context: impl Into<String>,
        timestamp: i64,
        path: impl Into<String>,
        nonce: impl Into<Nonce>,
    ) -> Self {
        Self {
            mask,
            seal: String::new(),
            context: context.into(),
            timestamp,
            path: path.into(),
            nonce: nonce.into(),
        }
    }

    pub fn with_seal(mut self, seal: impl Into<String>) -> Self {
        self.seal = seal.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reality_display() {
        assert_eq!(Reality::Prime.to_string(), "prime");
        assert_eq!(Reality::Mirror.to_string(), "mirror");
        assert_eq!(Reality::Shadow.to_string(), "shadow");
    }

    #[test]
    fn test_reality_serde_lowercase() {
        let json = serde_json::to_string(&Reality::Shadow).unwrap();
        assert_eq!(json, "\"shadow\"");
        let back: Reality = serde_json::from_str("\"mirror\"").unwrap();
        assert_eq!(back, Reality::Mirror);
    }

    #[test]
    fn test_generated_nonces_are_unique_hex() {
        let a = Nonce::generate();
        let b = Nonce::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_unsealed_request_builder() {
        let req = SecureRequest::unsealed(9, "GET", 1_000, "/api", "n-1").with_seal("abc");
        assert_eq!(req.mask, 9);
        assert_eq!(req.nonce.as_str(), "n-1");
        assert_eq!(req.seal, "abc");
    }
}

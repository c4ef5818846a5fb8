//! Deterministic decoy synthesis.
//!
//! A decoy is derived entirely from the request context and the shared
//! secret: the same `(path, context, seed_material)` under the same key
//! always yields a byte-identical record, while a caller without the key
//! cannot predict one. No clock or OS randomness is consulted.

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use veil_core::SealKey;

const DOMAIN_TAG: &[u8] = b"SHADOW";
const CURRENCY: &str = "BRL";
const FLAGS: [&str; 2] = ["verified", "secure"];
const REGIONS: [&str; 4] = ["sa-east-1", "us-east-1", "eu-west-1", "ap-southeast-1"];

const BALANCE_MIN: f64 = 1_000.0;
const BALANCE_MAX: f64 = 500_000.0;
const PROCESSING_MIN_MS: u64 = 10;
const PROCESSING_MAX_MS: u64 = 150;

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// 64-bit LCG with Knuth's MMIX constants.
#[derive(Debug, Clone)]
struct Lcg(u64);

impl Lcg {
    const MULTIPLIER: u64 = 6_364_136_223_846_793_005;
    const INCREMENT: u64 = 1_442_695_040_888_963_407;

    fn next_u64(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(Self::MULTIPLIER)
            .wrapping_add(Self::INCREMENT);
        self.0
    }

    /// Uniform in `[0, 1)` from the top 53 bits.
    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform-ish in `[0, bound)`; the high bits of an LCG are the good ones.
    fn next_below(&mut self, bound: u64) -> u64 {
        (self.next_u64() >> 32) % bound
    }
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Checking,
    Savings,
    Investment,
}

impl AccountType {
    pub const ALL: [AccountType; 3] = [
        AccountType::Checking,
        AccountType::Savings,
        AccountType::Investment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Checking => "checking",
            AccountType::Savings => "savings",
            AccountType::Investment => "investment",
        }
    }
}

/// A fake but plausible banking record.
#[derive(Debug, Clone, PartialEq)]
pub struct DecoyPayload {
    pub vault_id: String,
    pub transaction_id: String,
    pub account_type: AccountType,
    pub balance: f64,
    pub currency: &'static str,
    pub flags: [&'static str; 2],
    pub processing_time_ms: u64,
    pub region: &'static str,
}

impl DecoyPayload {
    /// The JSON document served by the HTTP adapter.
    pub fn to_json(&self) -> Value {
        json!({
            "status": "success",
            "vault_id": self.vault_id,
            "transaction_id": self.transaction_id,
            "data": {
                "account_type": self.account_type.as_str(),
                "balance": self.balance,
                "currency": self.currency,
                "flags": self.flags,
            },
            "meta": {
                "processing_time_ms": self.processing_time_ms,
                "region": self.region,
            },
        })
    }
}

impl fmt::Display for DecoyPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SHADOW_VAULT_ID:{}:DATA_ENCRYPTED", self.vault_id)
    }
}

// ---------------------------------------------------------------------------
// Synthesis
// ---------------------------------------------------------------------------

pub fn synthesize(path: &str, context: &str, seed_material: &str, key: &SealKey) -> DecoyPayload {
    let mac = key.mac(&[
        DOMAIN_TAG,
        b"|",
        path.as_bytes(),
        b"|",
        context.as_bytes(),
        b"|",
        seed_material.as_bytes(),
    ]);

    let mut seed = [0u8; 8];
    seed.copy_from_slice(&mac[..8]);
    let vault_id = URL_SAFE_NO_PAD.encode(seed);
    let mut rng = Lcg(u64::from_be_bytes(seed));

    let transaction_id = format!("tx-{:016x}", rng.next_u64());
    let account_type = AccountType::ALL[rng.next_below(AccountType::ALL.len() as u64) as usize];

    let raw = BALANCE_MIN + rng.next_f64() * (BALANCE_MAX - BALANCE_MIN);
    // Rounding can land on the exclusive upper bound.
    let balance = ((raw * 100.0).round() / 100.0).min(BALANCE_MAX - 0.01);

    let processing_time_ms =
        PROCESSING_MIN_MS + rng.next_below(PROCESSING_MAX_MS - PROCESSING_MIN_MS);
    let region = REGIONS[rng.next_below(REGIONS.len() as u64) as usize];

    DecoyPayload {
        vault_id,
        transaction_id,
        account_type,
        balance,
        currency: CURRENCY,
        flags: FLAGS,
        processing_time_ms,
        region,
    }
}

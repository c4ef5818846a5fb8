//! Failure escalation per caller fingerprint.
//!
//! Each failed seal check bumps a counter for the caller. Up to `threshold`
//! failures within `window_ms` of the first one resolve to Mirror; beyond that
//! the caller is shown Shadow. A failure arriving after the window has elapsed
//! discards the record instead of decaying it. Any fully successful request
//! clears the record.

use serde::{Deserialize, Serialize};
use veil_core::{Fingerprint, Reality};

use crate::error::GuardResult;
use crate::shard::{ShardedMap, DEFAULT_SHARDS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationPolicy {
    pub threshold: u32,
    pub window_ms: u64,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            threshold: 10,
            window_ms: 3_600_000,
        }
    }
}

impl EscalationPolicy {
    fn classify(&self, count: u32) -> Reality {
        if count <= self.threshold {
            Reality::Mirror
        } else {
            Reality::Shadow
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct FailureRecord {
    count: u32,
    first_failure_ms: u64,
}

#[derive(Debug)]
pub struct FailureEscalator {
    records: ShardedMap<Fingerprint, FailureRecord>,
    policy: EscalationPolicy,
}

impl FailureEscalator {
    pub fn new(policy: EscalationPolicy, capacity: usize) -> GuardResult<Self> {
        Ok(Self {
            records: ShardedMap::new(capacity, DEFAULT_SHARDS)?,
            policy,
        })
    }

    pub fn policy(&self) -> EscalationPolicy {
        self.policy
    }

    /// Record one integrity failure and return the reality it earns.
    pub fn record_failure(&self, fingerprint: &Fingerprint, now_ms: u64) -> Reality {
        let policy = self.policy;
        self.records.with_shard(fingerprint, |records| {
            if let Some(record) = records.get_mut(fingerprint) {
                if now_ms.saturating_sub(record.first_failure_ms) > policy.window_ms {
                    records.remove(fingerprint);
                    return Reality::Mirror;
                }
                record.count = record.count.saturating_add(1);
                return policy.classify(record.count);
            }
            let fresh = FailureRecord {
                count: 1,
                first_failure_ms: now_ms,
            };
            match records.try_insert(fingerprint.clone(), fresh) {
                Ok(()) => policy.classify(1),
                // Saturated: new callers go untracked.
                Err(_) => Reality::Mirror,
            }
        })
    }

    /// Forget the caller's failures. Returns whether a record existed.
    pub fn clear(&self, fingerprint: &Fingerprint) -> bool {
        self.records.remove(fingerprint).is_some()
    }

    pub fn failure_count(&self, fingerprint: &Fingerprint) -> Option<u32> {
        self.records
            .with_shard(fingerprint, |records| records.get(fingerprint).map(|r| r.count))
    }

    /// Remove records whose window has elapsed.
    pub fn evict_expired(&self, now_ms: u64) -> usize {
        let window = self.policy.window_ms;
        self.records
            .retain(|_, record| now_ms.saturating_sub(record.first_failure_ms) <= window)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

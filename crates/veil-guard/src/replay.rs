//! Anti-replay nonce store.
//!
//! A nonce is accepted at most once while its record is live. Check and
//! insert happen inside a single shard critical section, so two concurrent
//! requests carrying the same nonce can never both be accepted.

use serde::{Deserialize, Serialize};
use veil_core::Nonce;

use crate::error::GuardResult;
use crate::shard::{ShardedMap, DEFAULT_SHARDS};

/// What to do when the store is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityPolicy {
    /// Refuse the new nonce.
    #[default]
    RejectNew,
    /// Drop the oldest nonce of the target shard to make room.
    EvictOldest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    Replay,
    Saturated,
}

impl Admission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Admission::Accepted)
    }
}

#[derive(Debug)]
pub struct ReplayGuard {
    seen: ShardedMap<Nonce, u64>,
    policy: CapacityPolicy,
}

impl ReplayGuard {
    pub fn new(capacity: usize, policy: CapacityPolicy) -> GuardResult<Self> {
        Ok(Self {
            seen: ShardedMap::new(capacity, DEFAULT_SHARDS)?,
            policy,
        })
    }

    pub fn policy(&self) -> CapacityPolicy {
        self.policy
    }

    /// Record `nonce` as consumed at `now_ms` unless it is already present.
    pub fn try_accept(&self, nonce: &Nonce, now_ms: u64) -> Admission {
        let policy = self.policy;
        self.seen.with_shard(nonce, |seen| {
            if seen.contains_key(nonce) {
                return Admission::Replay;
            }
            if seen.try_insert(nonce.clone(), now_ms).is_ok() {
                return Admission::Accepted;
            }
            match policy {
                CapacityPolicy::RejectNew => Admission::Saturated,
                // Only this shard is locked; an empty one has nothing to give up.
                CapacityPolicy::EvictOldest => {
                    if seen.remove_min_by_key(|recorded| *recorded).is_none() {
                        return Admission::Saturated;
                    }
                    match seen.try_insert(nonce.clone(), now_ms) {
                        Ok(()) => Admission::Accepted,
                        Err(_) => Admission::Saturated,
                    }
                }
            }
        })
    }

    /// Remove nonces recorded before `now_ms - ttl_ms`.
    pub fn evict_expired(&self, now_ms: u64, ttl_ms: u64) -> usize {
        let cutoff = now_ms.saturating_sub(ttl_ms);
        self.seen.retain(|_, recorded| *recorded >= cutoff)
    }

    pub fn contains(&self, nonce: &Nonce) -> bool {
        self.seen.with_shard(nonce, |seen| seen.contains_key(nonce))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

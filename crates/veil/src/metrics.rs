//! Operator-facing counters.
//!
//! Counters are independent atomics, updated without coordination with the
//! decision path. They are the only place where the individual failure kinds
//! are distinguished.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use veil_core::Reality;
use veil_guard::{SweepObserver, SweepReport};

const COUNTER_COUNT: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    TotalRequests,
    InvalidMasks,
    MissingReadPermission,
    StaleRequests,
    SealFailures,
    ReplayAttempts,
    NonceStoreSaturated,
    SuccessfulRequests,
    RealityPrime,
    RealityMirror,
    RealityShadow,
    ProcessingTimeNs,
    EvictionRuns,
    NoncesEvicted,
    FailuresEvicted,
}

impl Counter {
    pub const ALL: [Counter; COUNTER_COUNT] = [
        Counter::TotalRequests,
        Counter::InvalidMasks,
        Counter::MissingReadPermission,
        Counter::StaleRequests,
        Counter::SealFailures,
        Counter::ReplayAttempts,
        Counter::NonceStoreSaturated,
        Counter::SuccessfulRequests,
        Counter::RealityPrime,
        Counter::RealityMirror,
        Counter::RealityShadow,
        Counter::ProcessingTimeNs,
        Counter::EvictionRuns,
        Counter::NoncesEvicted,
        Counter::FailuresEvicted,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Counter::TotalRequests => "total_requests",
            Counter::InvalidMasks => "invalid_masks",
            Counter::MissingReadPermission => "missing_read_permission",
            Counter::StaleRequests => "stale_requests",
            Counter::SealFailures => "seal_failures",
            Counter::ReplayAttempts => "replay_attempts",
            Counter::NonceStoreSaturated => "nonce_store_saturated",
            Counter::SuccessfulRequests => "successful_requests",
            Counter::RealityPrime => "reality.prime",
            Counter::RealityMirror => "reality.mirror",
            Counter::RealityShadow => "reality.shadow",
            Counter::ProcessingTimeNs => "processing_time_ns",
            Counter::EvictionRuns => "eviction_runs",
            Counter::NoncesEvicted => "nonces_evicted",
            Counter::FailuresEvicted => "failures_evicted",
        }
    }

    pub fn for_reality(reality: Reality) -> Counter {
        match reality {
            Reality::Prime => Counter::RealityPrime,
            Reality::Mirror => Counter::RealityMirror,
            Reality::Shadow => Counter::RealityShadow,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug)]
pub struct Metrics {
    counters: [AtomicU64; COUNTER_COUNT],
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            counters: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(&self, counter: Counter) {
        self.add(counter, 1);
    }

    pub fn add(&self, counter: Counter, value: u64) {
        self.counters[counter.index()].fetch_add(value, Ordering::Relaxed);
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.counters[counter.index()].load(Ordering::Relaxed)
    }

    /// Every counter by name, sorted.
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        Counter::ALL
            .iter()
            .map(|c| (c.name().to_string(), self.get(*c)))
            .collect()
    }

    pub fn reset(&self) {
        for counter in &self.counters {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl SweepObserver for Metrics {
    fn on_sweep(&self, report: &SweepReport) {
        self.incr(Counter::EvictionRuns);
        self.add(Counter::NoncesEvicted, report.nonces_evicted as u64);
        self.add(Counter::FailuresEvicted, report.failures_evicted as u64);
    }
}

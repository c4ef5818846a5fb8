//! Veil Guard — the engine's shared, concurrent state.
//!
//! Two stores live here, both lock-striped so that concurrent requests only
//! contend when their keys hash to the same shard:
//!
//! - [`ReplayGuard`]: nonces already consumed, with TTL eviction and a hard
//!   capacity cap.
//! - [`FailureEscalator`]: consecutive seal failures per fingerprint, driving
//!   the Mirror → Shadow escalation ladder.
//!
//! [`Sweeper`] evicts expired entries from both on a fixed interval as a tokio
//! task that never blocks the request path for more than one shard at a time.

pub mod error;
pub mod escalation;
pub mod replay;
pub mod shard;
pub mod sweeper;

pub use error::{GuardError, GuardResult};
pub use escalation::{EscalationPolicy, FailureEscalator};
pub use replay::{Admission, CapacityPolicy, ReplayGuard};
pub use shard::{ShardedMap, DEFAULT_SHARDS};
pub use sweeper::{SweepObserver, SweepReport, Sweeper, SweeperHandle};

//! Veil Library
//!
//! The reality resolution engine and its outer surfaces. Each request is
//! resolved to one of three realities:
//!
//! - **Prime**: the real data, for a well-formed, fresh, correctly sealed and
//!   never-seen request.
//! - **Mirror**: a redacted view, for stale requests and for the first few
//!   seal failures of a caller.
//! - **Shadow**: a keyed, deterministic decoy, for malformed masks, missing
//!   read permission, replays and persistent forgers.
//!
//! # Architecture
//!
//! [`RealityEngine`] owns the seal key, the replay guard, the failure
//! escalator and the counters. The HTTP adapter in [`http`] and the binary
//! are thin layers over it; [`client::SealedHeaders`] is what a caller uses
//! to produce a valid request.

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod metrics;

pub use client::SealedHeaders;
pub use config::{EngineConfig, ServerConfig, VeilConfig};
pub use engine::{CacheStats, Payload, RealityEngine, Resolution};
pub use error::{VeilError, VeilResult};
pub use http::{build_router, AppState, JitterRange, RealDataProvider, StaticDataProvider};
pub use metrics::{Counter, Metrics};

//! The reality resolver.
//!
//! Checks run in a fixed order and the first failing check decides:
//!
//! 1. mask well-formed             else Shadow
//! 2. mask carries READ            else Shadow
//! 3. timestamp fresh              else Mirror
//! 4. seal valid                   else escalator (Mirror or Shadow)
//! 5. nonce not seen before        else Shadow
//! 6. Prime, and the caller's failure record is cleared
//!
//! No classification is an error. The caller only ever sees a payload; which
//! check failed is visible in the counters and logs alone.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;
use veil_core::{
    has_permission, is_valid_mask, verify, Clock, Fingerprint, Permission, Reality, SealKey,
    SecureRequest, SystemClock,
};
use veil_decoy::{sanitize, synthesize, DecoyPayload};
use veil_guard::{Admission, FailureEscalator, ReplayGuard, Sweeper};

use crate::config::{EngineConfig, VeilConfig};
use crate::error::VeilResult;
use crate::metrics::{Counter, Metrics};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// What the caller receives.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// The real data, untouched.
    Real(String),
    /// The real data after redaction.
    Sanitized(String),
    Decoy(DecoyPayload),
}

impl Payload {
    /// Text form of the payload.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Real(data) | Payload::Sanitized(data) => f.write_str(data),
            Payload::Decoy(decoy) => write!(f, "{}", decoy),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub request_id: Uuid,
    pub reality: Reality,
    pub payload: Payload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub nonce_store_size: usize,
    pub failure_record_count: usize,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct RealityEngine {
    key: SealKey,
    replay: Arc<ReplayGuard>,
    escalator: Arc<FailureEscalator>,
    metrics: Arc<Metrics>,
    clock: Arc<dyn Clock>,
    max_age_ms: u64,
    nonce_ttl_ms: u64,
    sweep_interval: Duration,
}

impl RealityEngine {
    pub fn new(secret: &[u8], config: &EngineConfig) -> VeilResult<Self> {
        Self::with_clock(secret, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        secret: &[u8],
        config: &EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> VeilResult<Self> {
        let key = SealKey::new(secret)?;
        let replay = ReplayGuard::new(config.nonce_capacity, config.capacity_policy)?;
        let escalator = FailureEscalator::new(config.escalation_policy(), config.failure_capacity)?;
        Ok(Self {
            key,
            replay: Arc::new(replay),
            escalator: Arc::new(escalator),
            metrics: Arc::new(Metrics::new()),
            clock,
            max_age_ms: config.max_age_ms,
            nonce_ttl_ms: config.nonce_ttl_ms,
            sweep_interval: config.sweep_interval(),
        })
    }

    /// Build an engine from a full configuration, reading the secret from the
    /// configured environment variable.
    pub fn from_config(config: &VeilConfig) -> VeilResult<Self> {
        config.validate()?;
        let secret = config.load_secret()?;
        Self::new(secret.as_bytes(), &config.engine)
    }

    /// Classify `request` and produce the payload for that reality.
    pub fn process_request(
        &self,
        request: &SecureRequest,
        real_data: &str,
        fingerprint: &Fingerprint,
    ) -> Resolution {
        let started = Instant::now();
        let request_id = Uuid::new_v4();
        debug!(%request_id, path = %request.path, "processing request");
        self.metrics.incr(Counter::TotalRequests);

        let (reality, payload) = self.resolve(request, real_data, fingerprint, request_id);

        self.metrics.incr(Counter::for_reality(reality));
        let elapsed_ns = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.metrics.add(Counter::ProcessingTimeNs, elapsed_ns);
        debug!(%request_id, %reality, elapsed_ns, "request processed");

        Resolution {
            request_id,
            reality,
            payload,
        }
    }

    fn resolve(
        &self,
        request: &SecureRequest,
        real_data: &str,
        fingerprint: &Fingerprint,
        request_id: Uuid,
    ) -> (Reality, Payload) {
        if !is_valid_mask(request.mask) {
            self.metrics.incr(Counter::InvalidMasks);
            warn!(%request_id, mask = request.mask, "invalid permission mask");
            return self.shadow(request, real_data);
        }

        if !has_permission(request.mask, Permission::Read) {
            self.metrics.incr(Counter::MissingReadPermission);
            warn!(%request_id, mask = request.mask, "mask lacks read permission");
            return self.shadow(request, real_data);
        }

        let now_ms = self.clock.now_ms();
        if !self.is_fresh(request.timestamp, now_ms) {
            self.metrics.incr(Counter::StaleRequests);
            info!(%request_id, timestamp = request.timestamp, now_ms, "stale request");
            return mirror(real_data);
        }

        if !verify(request, &self.key) {
            self.metrics.incr(Counter::SealFailures);
            warn!(%request_id, %fingerprint, "seal verification failed");
            return match self.escalator.record_failure(fingerprint, now_ms) {
                Reality::Shadow => self.shadow(request, real_data),
                _ => mirror(real_data),
            };
        }

        match self.replay.try_accept(&request.nonce, now_ms) {
            Admission::Accepted => {}
            Admission::Replay => {
                self.metrics.incr(Counter::ReplayAttempts);
                warn!(%request_id, nonce = %request.nonce, "nonce replay");
                return self.shadow(request, real_data);
            }
            Admission::Saturated => {
                self.metrics.incr(Counter::NonceStoreSaturated);
                warn!(%request_id, "nonce store saturated, refusing request");
                return self.shadow(request, real_data);
            }
        }

        self.escalator.clear(fingerprint);
        self.metrics.incr(Counter::SuccessfulRequests);
        info!(%request_id, reality = %Reality::Prime, "request granted");
        (Reality::Prime, Payload::Real(real_data.to_string()))
    }

    /// `0 <= now - timestamp <= max_age`, without overflow.
    fn is_fresh(&self, timestamp: i64, now_ms: u64) -> bool {
        let now = i64::try_from(now_ms).unwrap_or(i64::MAX);
        match now.checked_sub(timestamp) {
            Some(age) => age >= 0 && age.unsigned_abs() <= self.max_age_ms,
            None => false,
        }
    }

    fn shadow(&self, request: &SecureRequest, real_data: &str) -> (Reality, Payload) {
        let decoy = synthesize(
            &request.path,
            &request.context,
            &real_data.len().to_string(),
            &self.key,
        );
        (Reality::Shadow, Payload::Decoy(decoy))
    }

    // -- Operator surface ---------------------------------------------------

    pub fn metrics(&self) -> BTreeMap<String, u64> {
        self.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            nonce_store_size: self.replay.len(),
            failure_record_count: self.escalator.len(),
        }
    }

    /// A sweeper over this engine's stores, reporting into its counters.
    /// Call [`Sweeper::spawn`] on it from within a tokio runtime.
    pub fn sweeper(&self) -> VeilResult<Sweeper> {
        let sweeper = Sweeper::new(
            Arc::clone(&self.replay),
            Arc::clone(&self.escalator),
            Arc::clone(&self.clock),
            self.nonce_ttl_ms,
            self.sweep_interval,
        )?;
        Ok(sweeper.with_observer(self.metrics.clone()))
    }

    pub fn key(&self) -> &SealKey {
        &self.key
    }
}

fn mirror(real_data: &str) -> (Reality, Payload) {
    (Reality::Mirror, Payload::Sanitized(sanitize(real_data)))
}

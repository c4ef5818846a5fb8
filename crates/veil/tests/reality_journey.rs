//! End-to-end journeys through the reality engine.
//!
//! Journey 1: an honest caller encodes READ+ADMIN, seals, and gets Prime
//! Journey 2: the same request replayed gets a Shadow vault id
//! Journey 3: an adjacent-bit mask is Shadow whatever the seal says
//! Journey 4: a forger walks the Mirror ladder into Shadow, then recovers
//! Journey 5: stale requests degrade to Mirror and leave the nonce unused
//! Journey 6: the sweeper reclaims nonces, after which replay is possible

use std::sync::Arc;

use veil::{EngineConfig, Payload, RealityEngine, SealedHeaders};
use veil_core::{
    encode, encode_ids, seal_request, Fingerprint, ManualClock, Nonce, Permission, Reality,
    SealKey, SecureRequest,
};

const SECRET: &[u8] = b"journey-shared-secret";
const START: u64 = 1_700_000_000_000;
const PATH: &str = "/api/v1/resource";
const REAL: &str = r#"{"data":{"secret":"vault","balance":1000000.0,"cpf":"12345678901"}}"#;

fn journey_engine(config: EngineConfig) -> (RealityEngine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(START));
    let engine = RealityEngine::with_clock(SECRET, &config, clock.clone()).unwrap();
    (engine, clock)
}

fn key() -> SealKey {
    SealKey::new(SECRET).unwrap()
}

/// Build a request the way a client would from its sealed headers.
fn signed(mask: i64, timestamp: u64, nonce: &str) -> SecureRequest {
    let headers = SealedHeaders::build(
        &key(),
        mask,
        "GET",
        PATH,
        timestamp as i64,
        &Nonce::new(nonce),
    );
    SecureRequest::unsealed(mask, "GET", timestamp as i64, PATH, nonce).with_seal(headers.seal)
}

// ============================================================================
// Journeys 1 and 2: honest request, then replay
// ============================================================================

#[test]
fn test_journey_prime_then_replay() {
    let (engine, _) = journey_engine(EngineConfig::default());
    let mask = encode([Permission::Read, Permission::Admin]).unwrap();
    assert_eq!(mask.as_i64(), 9);
    assert_eq!(encode_ids(&[1, 5]).unwrap(), mask);

    let caller = Fingerprint::new("honest");
    let request = signed(mask.as_i64(), START, "journey-nonce-1");

    let first = engine.process_request(&request, REAL, &caller);
    assert_eq!(first.reality, Reality::Prime);
    assert_eq!(first.payload.render(), REAL);

    let replay = engine.process_request(&request, REAL, &caller);
    assert_eq!(replay.reality, Reality::Shadow);
    let text = replay.payload.render();
    assert!(text.starts_with("SHADOW_VAULT_ID:"), "got {}", text);
    assert!(text.ends_with(":DATA_ENCRYPTED"));
    assert!(!text.contains("vault\""));

    let metrics = engine.metrics();
    assert_eq!(metrics["successful_requests"], 1);
    assert_eq!(metrics["replay_attempts"], 1);
    assert_eq!(engine.cache_stats().nonce_store_size, 1);
}

// ============================================================================
// Journey 3: malformed mask
// ============================================================================

#[test]
fn test_journey_adjacent_mask_is_shadow() {
    let (engine, _) = journey_engine(EngineConfig::default());
    // READ|WRITE: bits 0 and 1, sealed correctly.
    let request = signed(3, START, "adjacent");
    let resolution = engine.process_request(&request, REAL, &Fingerprint::new("probe"));
    assert_eq!(resolution.reality, Reality::Shadow);
    assert!(matches!(resolution.payload, Payload::Decoy(_)));
    assert_eq!(engine.metrics()["invalid_masks"], 1);
    assert_eq!(engine.metrics()["seal_failures"], 0);
}

// ============================================================================
// Journey 4: forger escalation and recovery
// ============================================================================

#[test]
fn test_journey_forger_escalates_then_recovers() {
    let mut config = EngineConfig::default();
    config.failure_threshold = 3;
    let (engine, clock) = journey_engine(config);
    let forger = Fingerprint::new("forger");

    for i in 0..3 {
        let forged = signed(9, clock_now(&clock), &format!("f{}", i)).with_seal("Zm9yZ2Vk");
        let r = engine.process_request(&forged, REAL, &forger);
        assert_eq!(r.reality, Reality::Mirror, "failure {} should be Mirror", i + 1);
        let text = r.payload.render();
        assert!(!text.contains("12345678901"));
        assert!(!text.contains("1000000"));
    }

    let forged = signed(9, clock_now(&clock), "f3").with_seal("Zm9yZ2Vk");
    assert_eq!(
        engine.process_request(&forged, REAL, &forger).reality,
        Reality::Shadow
    );

    // A correctly sealed request from the same fingerprint resets the ladder.
    let honest = signed(9, clock_now(&clock), "recover");
    assert_eq!(
        engine.process_request(&honest, REAL, &forger).reality,
        Reality::Prime
    );
    assert_eq!(engine.cache_stats().failure_record_count, 0);

    let forged = signed(9, clock_now(&clock), "f4").with_seal("Zm9yZ2Vk");
    assert_eq!(
        engine.process_request(&forged, REAL, &forger).reality,
        Reality::Mirror
    );
}

#[test]
fn test_journey_failure_window_expires() {
    let mut config = EngineConfig::default();
    config.failure_threshold = 1;
    config.failure_window_ms = 10_000;
    let (engine, clock) = journey_engine(config);
    let forger = Fingerprint::new("slow-forger");

    let forged = |n: &str, now: u64| signed(9, now, n).with_seal("bad");
    engine.process_request(&forged("a", clock_now(&clock)), REAL, &forger);
    assert_eq!(
        engine
            .process_request(&forged("b", clock_now(&clock)), REAL, &forger)
            .reality,
        Reality::Shadow
    );

    clock.advance(10_001);
    assert_eq!(
        engine
            .process_request(&forged("c", clock_now(&clock)), REAL, &forger)
            .reality,
        Reality::Mirror
    );
}

// ============================================================================
// Journey 5: stale timestamps
// ============================================================================

#[test]
fn test_journey_stale_request_keeps_nonce_unused() {
    let (engine, clock) = journey_engine(EngineConfig::default());
    let caller = Fingerprint::new("late");

    let stale = signed(9, START, "late-nonce");
    clock.advance(300_001);
    let r = engine.process_request(&stale, REAL, &caller);
    assert_eq!(r.reality, Reality::Mirror);
    assert!(matches!(r.payload, Payload::Sanitized(_)));
    assert_eq!(engine.cache_stats().nonce_store_size, 0);

    // Re-sealed with a fresh timestamp, the same nonce is still good.
    let fresh = signed(9, clock_now(&clock), "late-nonce");
    assert_eq!(
        engine.process_request(&fresh, REAL, &caller).reality,
        Reality::Prime
    );
}

// ============================================================================
// Journey 6: eviction
// ============================================================================

#[test]
fn test_journey_sweeper_allows_replay_after_ttl() {
    let mut config = EngineConfig::default();
    config.nonce_ttl_ms = 1_000;
    config.max_age_ms = 10_000;
    let (engine, clock) = journey_engine(config);
    let caller = Fingerprint::new("patient");

    let request = signed(9, START, "ttl-nonce");
    assert_eq!(
        engine.process_request(&request, REAL, &caller).reality,
        Reality::Prime
    );

    clock.advance(1_001);
    let report = engine.sweeper().unwrap().sweep_once();
    assert_eq!(report.nonces_evicted, 1);

    // Still fresh under max_age, and the nonce has been forgotten.
    assert_eq!(
        engine.process_request(&request, REAL, &caller).reality,
        Reality::Prime
    );
    assert_eq!(engine.metrics()["eviction_runs"], 1);
}

#[test]
fn test_journey_shadow_is_stable_across_engines() {
    let (a, _) = journey_engine(EngineConfig::default());
    let (b, _) = journey_engine(EngineConfig::default());
    let req = signed(3, START, "x");
    let fp = Fingerprint::new("any");
    assert_eq!(
        a.process_request(&req, REAL, &fp).payload,
        b.process_request(&req, REAL, &fp).payload
    );

    // A different secret yields a different decoy.
    let other = RealityEngine::new(b"other-secret", &EngineConfig::default()).unwrap();
    let seal = seal_request(other.key(), 3, "GET", START as i64, PATH, "x");
    let req_other = SecureRequest::unsealed(3, "GET", START as i64, PATH, "x")
        .with_seal(seal.into_string());
    assert_ne!(
        a.process_request(&req, REAL, &fp).payload,
        other.process_request(&req_other, REAL, &fp).payload
    );
}

fn clock_now(clock: &ManualClock) -> u64 {
    use veil_core::Clock;
    clock.now_ms()
}

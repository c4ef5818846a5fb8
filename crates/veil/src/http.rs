//! Axum adapter in front of the reality engine.
//!
//! Every route except `/health` is guarded. The four `X-Veil-*` headers are
//! read into a [`SecureRequest`], the HTTP method becomes the seal context and
//! the URI path the seal path. Whatever the engine decides, the response is
//! `200 OK` with no header that names the reality.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use veil_core::{Fingerprint, Reality, SecureRequest};

use crate::config::ServerConfig;
use crate::engine::{Payload, RealityEngine};

pub const MASK_HEADER: &str = "x-veil-mask";
pub const SEAL_HEADER: &str = "x-veil-seal";
pub const TIMESTAMP_HEADER: &str = "x-veil-timestamp";
pub const NONCE_HEADER: &str = "x-veil-nonce";

/// Hex characters kept from the fingerprint digest.
const FINGERPRINT_LEN: usize = 32;

// ---------------------------------------------------------------------------
// Real data
// ---------------------------------------------------------------------------

/// Source of the protected documents, keyed by URI path.
pub trait RealDataProvider: Send + Sync {
    /// The serialized document at `path`, if one exists.
    fn fetch(&self, path: &str) -> Option<String>;
}

/// Fixed in-memory documents.
#[derive(Debug, Clone, Default)]
pub struct StaticDataProvider {
    documents: HashMap<String, String>,
}

impl StaticDataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, path: impl Into<String>, document: &serde_json::Value) -> Self {
        self.documents.insert(path.into(), document.to_string());
        self
    }

    /// The demo vault served by `veil serve`.
    pub fn demo() -> Self {
        Self::new().with_document(
            "/api/v1/resource",
            &serde_json::json!({
                "data": {
                    "secret": "central bank vault credentials",
                    "balance": 1_000_000.00,
                    "status": "verified",
                }
            }),
        )
    }
}

impl RealDataProvider for StaticDataProvider {
    fn fetch(&self, path: &str) -> Option<String> {
        self.documents.get(path).cloned()
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Bounds of the random delay added to Shadow responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JitterRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl JitterRange {
    pub fn none() -> Self {
        Self {
            min_ms: 0,
            max_ms: 0,
        }
    }

    pub fn sample(&self) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rand::thread_rng().gen_range(self.min_ms..=self.max_ms))
    }
}

impl From<&ServerConfig> for JitterRange {
    fn from(config: &ServerConfig) -> Self {
        Self {
            min_ms: config.jitter_min_ms,
            max_ms: config.jitter_max_ms,
        }
    }
}

/// Shared application state for Axum handlers.
pub struct AppState {
    pub engine: Arc<RealityEngine>,
    pub data: Arc<dyn RealDataProvider>,
    pub jitter: JitterRange,
}

/// Build the Axum router: `/health` plus the guarded fallback.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .fallback(handle_guarded)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /health -- liveness only
async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Any other route -- resolved through the engine
async fn handle_guarded(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let context = request.method().as_str().to_string();
    let path = request.uri().path().to_string();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let headers = request.headers();

    let secure = secure_request_from_headers(headers, context, path);
    let fingerprint = derive_fingerprint(peer, headers);
    let document = state.data.fetch(&secure.path);

    debug!(%fingerprint, method = %secure.context, path = %secure.path, "guarded request");

    let resolution = state.engine.process_request(
        &secure,
        document.as_deref().unwrap_or_default(),
        &fingerprint,
    );

    match (resolution.reality, resolution.payload) {
        (Reality::Prime, Payload::Real(_)) if document.is_none() => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "not found" })),
        )
            .into_response(),
        (_, Payload::Real(body)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        (_, Payload::Sanitized(text)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            text,
        )
            .into_response(),
        (_, Payload::Decoy(decoy)) => {
            // Keep Shadow latency in the same band as real processing.
            tokio::time::sleep(state.jitter.sample()).await;
            (StatusCode::OK, Json(decoy.to_json())).into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

/// Missing or unparseable numbers fall back to values that fail their check:
/// mask `-1`, timestamp `0`. Missing seal and nonce become empty strings.
pub fn secure_request_from_headers(
    headers: &HeaderMap,
    context: String,
    path: String,
) -> SecureRequest {
    let mask = header_str(headers, MASK_HEADER)
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(-1);
    let timestamp = header_str(headers, TIMESTAMP_HEADER)
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(0);
    let seal = header_str(headers, SEAL_HEADER).unwrap_or_default();
    let nonce = header_str(headers, NONCE_HEADER).unwrap_or_default();

    SecureRequest::unsealed(mask, context, timestamp, path, nonce).with_seal(seal)
}

/// SHA-256 over peer address and User-Agent, hex, truncated.
pub fn derive_fingerprint(peer: Option<SocketAddr>, headers: &HeaderMap) -> Fingerprint {
    let ip = peer
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let agent = header_str(headers, header::USER_AGENT.as_str()).unwrap_or_default();

    let digest = Sha256::new()
        .chain_update(ip.as_bytes())
        .chain_update(b"|")
        .chain_update(agent.as_bytes())
        .finalize();
    let mut hex = hex::encode(digest);
    hex.truncate(FINGERPRINT_LEN);
    Fingerprint::new(hex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_headers_parsed() {
        let mut headers = HeaderMap::new();
        headers.insert(MASK_HEADER, HeaderValue::from_static("9"));
        headers.insert(SEAL_HEADER, HeaderValue::from_static("c2VhbA=="));
        headers.insert(TIMESTAMP_HEADER, HeaderValue::from_static(" 1700000000000 "));
        headers.insert(NONCE_HEADER, HeaderValue::from_static("abc"));

        let req = secure_request_from_headers(&headers, "GET".into(), "/api".into());
        assert_eq!(req.mask, 9);
        assert_eq!(req.seal, "c2VhbA==");
        assert_eq!(req.timestamp, 1_700_000_000_000);
        assert_eq!(req.nonce.as_str(), "abc");
        assert_eq!(req.context, "GET");
        assert_eq!(req.path, "/api");
    }

    #[test]
    fn test_missing_headers_use_failing_defaults() {
        let req = secure_request_from_headers(&HeaderMap::new(), "POST".into(), "/x".into());
        assert_eq!(req.mask, -1);
        assert_eq!(req.timestamp, 0);
        assert_eq!(req.seal, "");
        assert_eq!(req.nonce.as_str(), "");
    }

    #[test]
    fn test_garbage_mask_is_negative() {
        let mut headers = HeaderMap::new();
        headers.insert(MASK_HEADER, HeaderValue::from_static("nine"));
        headers.insert(TIMESTAMP_HEADER, HeaderValue::from_static("soon"));
        let req = secure_request_from_headers(&headers, "GET".into(), "/".into());
        assert_eq!(req.mask, -1);
        assert_eq!(req.timestamp, 0);
    }

    #[test]
    fn test_fingerprint_stable_and_distinct() {
        let addr: SocketAddr = "10.0.0.1:5555".parse().unwrap();
        let other_port: SocketAddr = "10.0.0.1:6666".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("curl/8"));

        let a = derive_fingerprint(Some(addr), &headers);
        assert_eq!(a, derive_fingerprint(Some(addr), &headers));
        // Port is not part of the identity.
        assert_eq!(a, derive_fingerprint(Some(other_port), &headers));
        assert_eq!(a.as_str().len(), FINGERPRINT_LEN);

        let mut other_agent = HeaderMap::new();
        other_agent.insert(header::USER_AGENT, HeaderValue::from_static("python"));
        assert_ne!(a, derive_fingerprint(Some(addr), &other_agent));
        assert_ne!(a, derive_fingerprint(None, &headers));
    }

    #[test]
    fn test_jitter_sample_within_range() {
        let range = JitterRange {
            min_ms: 5,
            max_ms: 10,
        };
        for _ in 0..50 {
            let d = range.sample();
            assert!(d >= Duration::from_millis(5) && d <= Duration::from_millis(10));
        }
        assert_eq!(JitterRange::none().sample(), Duration::ZERO);
    }

    #[test]
    fn test_static_provider() {
        let provider = StaticDataProvider::demo();
        let doc = provider.fetch("/api/v1/resource").unwrap();
        assert!(doc.contains("verified"));
        assert!(provider.fetch("/missing").is_none());
    }
}

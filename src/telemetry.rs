//! Telemetry circuit breaker and feature-flag cache.
//!
//! Ported from `examples/original_source/.../telemetry/circuit_breaker_manager.py`
//! (`CircuitBreakerManager`, backed there by `pybreaker`) and `common/feature_flag.py`. Both
//! are process-wide registries keyed by a string (host, or session-id-hex), guarded by a
//! fine-grained lock rather than thread-local storage.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use tracing::debug;

use crate::constants::{TELEMETRY_CIRCUIT_FAILURE_MAX, TELEMETRY_CIRCUIT_RESET_TIMEOUT_SECS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

struct Breaker {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    failure_max: u32,
    reset_timeout: Duration,
}

impl Breaker {
    fn new(failure_max: u32, reset_timeout: Duration) -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            failure_max,
            reset_timeout,
        }
    }

    /// `true` if the call should be allowed through (closed or half-open probe); `false` means
    /// return the synthetic success without performing network I/O.
    fn allow_call(&mut self, host: &str) -> bool {
        match self.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                let elapsed = self.opened_at.map_or(Duration::ZERO, |t| t.elapsed());
                if elapsed >= self.reset_timeout {
                    debug!(host, "circuit breaker half-open - testing telemetry requests");
                    self.state = BreakerState::HalfOpen;
                    true
                } else {
                    false
                }
            }
            BreakerState::HalfOpen => true,
        }
    }

    fn record_success(&mut self, host: &str) {
        if self.state != BreakerState::Closed {
            debug!(host, "circuit breaker closed - telemetry requests will be allowed");
        }
        self.state = BreakerState::Closed;
        self.consecutive_failures = 0;
        self.opened_at = None;
    }

    /// Only rate-limit (429/503) failures count toward opening the circuit; other
    /// errors are recorded elsewhere without affecting breaker state.
    fn record_rate_limit_failure(&mut self, host: &str) {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.failure_max && self.state != BreakerState::Open {
            debug!(host, "circuit breaker opened - telemetry requests will be blocked");
            self.state = BreakerState::Open;
            self.opened_at = Some(Instant::now());
        }
    }
}

/// Fire-and-forget push to the host's telemetry-ingest endpoint, gated by the breaker above.
/// Payload shape mirrors nothing in particular: the original's event schema (driver version,
/// statement latencies, error codes) is out of scope here, so this sends an empty body purely
/// to exercise the gate/record-outcome cycle the breaker wraps. A push never surfaces an error
/// to its caller, matching `TelemetryClient.export_event`'s "best effort, never raises" contract.
pub async fn push_telemetry_event(client: &reqwest::Client, host: &str) {
    if !telemetry_allow_call(host) {
        debug!(host, "telemetry push skipped, circuit open");
        return;
    }

    let url = format!("https://{host}/telemetry-ext");
    match client.post(&url).json(&serde_json::json!({})).send().await {
        Ok(response)
            if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS
                || response.status() == reqwest::StatusCode::SERVICE_UNAVAILABLE =>
        {
            telemetry_record_rate_limit_failure(host);
        }
        Ok(_) => telemetry_record_success(host),
        Err(e) => debug!(host, error = %e, "telemetry push failed outside the breaker's rate-limit path"),
    }
}

static BREAKERS: Lazy<Mutex<HashMap<String, Breaker>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Per-host circuit breaker gate for the telemetry push path. Returns `true` when
/// the call should actually go out over the network.
#[must_use]
pub fn telemetry_allow_call(host: &str) -> bool {
    let mut breakers = BREAKERS.lock().expect("telemetry breaker registry poisoned");
    breakers
        .entry(host.to_string())
        .or_insert_with(|| {
            Breaker::new(
                TELEMETRY_CIRCUIT_FAILURE_MAX,
                Duration::from_secs(TELEMETRY_CIRCUIT_RESET_TIMEOUT_SECS),
            )
        })
        .allow_call(host)
}

pub fn telemetry_record_success(host: &str) {
    let mut breakers = BREAKERS.lock().expect("telemetry breaker registry poisoned");
    if let Some(breaker) = breakers.get_mut(host) {
        breaker.record_success(host);
    }
}

pub fn telemetry_record_rate_limit_failure(host: &str) {
    let mut breakers = BREAKERS.lock().expect("telemetry breaker registry poisoned");
    breakers
        .entry(host.to_string())
        .or_insert_with(|| {
            Breaker::new(
                TELEMETRY_CIRCUIT_FAILURE_MAX,
                Duration::from_secs(TELEMETRY_CIRCUIT_RESET_TIMEOUT_SECS),
            )
        })
        .record_rate_limit_failure(host);
}

/// Process-wide feature-flag cache keyed by session-id-hex. Read-mostly: a
/// `RwLock` lets concurrent readers see a stale snapshot while a single writer refreshes.
static FEATURE_FLAGS: Lazy<RwLock<HashMap<String, Arc<HashMap<String, bool>>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

#[must_use]
pub fn feature_flags_for_session(session_id_hex: &str) -> Option<Arc<HashMap<String, bool>>> {
    FEATURE_FLAGS.read().expect("feature flag cache poisoned").get(session_id_hex).cloned()
}

/// Single-writer refresh: concurrent readers keep seeing the previous snapshot (if any) until
/// this completes.
pub fn refresh_feature_flags(session_id_hex: &str, flags: HashMap<String, bool>) {
    let mut cache = FEATURE_FLAGS.write().expect("feature flag cache poisoned");
    cache.insert(session_id_hex.to_string(), Arc::new(flags));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circuit_opens_after_failure_max_consecutive_rate_limit_errors() {
        let host = "unit-test-host-open";
        for _ in 0..TELEMETRY_CIRCUIT_FAILURE_MAX {
            assert!(telemetry_allow_call(host));
            telemetry_record_rate_limit_failure(host);
        }
        assert!(!telemetry_allow_call(host));
    }

    #[test]
    fn circuit_closes_on_success() {
        let host = "unit-test-host-close";
        for _ in 0..TELEMETRY_CIRCUIT_FAILURE_MAX {
            telemetry_record_rate_limit_failure(host);
        }
        assert!(!telemetry_allow_call(host));
        telemetry_record_success(host);
        assert!(telemetry_allow_call(host));
    }

    #[test]
    fn feature_flag_cache_round_trips() {
        let mut flags = HashMap::new();
        flags.insert("cloud_fetch".to_string(), true);
        refresh_feature_flags("abc123", flags);
        let cached = feature_flags_for_session("abc123").unwrap();
        assert_eq!(cached.get("cloud_fetch"), Some(&true));
    }

    #[test]
    fn feature_flag_cache_miss_returns_none() {
        assert!(feature_flags_for_session("never-seen").is_none());
    }
}

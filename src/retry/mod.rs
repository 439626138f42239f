//! Command-type-aware retry policy.
//!
//! The split between retry config and executor state follows this codebase's existing
//! resilience module; the decision rules themselves (`_get_command_type_from_path` and the
//! `delay_min`/`delay_max`/`stop_after_attempts_count`/`stop_after_attempts_duration` defaults)
//! come from the SEA HTTP client this driver is modeled on.

use std::time::{Duration, Instant};

use crate::constants::{
    DEFAULT_RETRY_DELAY_DEFAULT_SECS, DEFAULT_RETRY_DELAY_MAX_SECS, DEFAULT_RETRY_DELAY_MIN_SECS,
    DEFAULT_STOP_AFTER_ATTEMPTS_COUNT, DEFAULT_STOP_AFTER_ATTEMPTS_DURATION_SECS,
};
use crate::error::{Error, RequestContext};

/// Coarse RPC classification used to decide whether a "dangerous" retry is safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandType {
    ExecuteStatement,
    GetOperationStatus,
    CloseOperation,
    CloseSession,
    Other,
}

impl CommandType {
    /// `true` for commands the server guarantees are safe to retry even on a "dangerous" status
    /// code.
    #[must_use]
    pub const fn is_idempotent(self) -> bool {
        matches!(self, Self::GetOperationStatus | Self::CloseOperation | Self::CloseSession)
    }

    /// Classifies a REST path + method the way the SEA HTTP client does, so the same policy
    /// serves both backends (ported from `_get_command_type_from_path`). Cancel requests
    /// classify as `Other`, matching the original.
    #[must_use]
    pub fn from_path(path: &str, method: &str) -> Self {
        let path = path.to_ascii_lowercase();
        let method = method.to_ascii_uppercase();
        if path.contains("/statements") {
            if method == "POST" && path.ends_with("/statements") {
                return Self::ExecuteStatement;
            }
            if path.contains("/cancel") {
                return Self::Other;
            }
            return match method.as_str() {
                "DELETE" => Self::CloseOperation,
                "GET" => Self::GetOperationStatus,
                _ => Self::Other,
            };
        }
        if path.contains("/sessions") && method == "DELETE" {
            return Self::CloseSession;
        }
        Self::Other
    }
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub delay_min: Duration,
    pub delay_max: Duration,
    pub delay_default: Duration,
    pub stop_after_attempts_count: u32,
    pub stop_after_attempts_duration: Duration,
    /// Status codes retried only for idempotent command types, or when `force_dangerous_codes`
    /// names them explicitly.
    pub force_dangerous_codes: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            delay_min: Duration::from_secs_f64(DEFAULT_RETRY_DELAY_MIN_SECS),
            delay_max: Duration::from_secs_f64(DEFAULT_RETRY_DELAY_MAX_SECS),
            delay_default: Duration::from_secs_f64(DEFAULT_RETRY_DELAY_DEFAULT_SECS),
            stop_after_attempts_count: DEFAULT_STOP_AFTER_ATTEMPTS_COUNT,
            stop_after_attempts_duration: Duration::from_secs_f64(
                DEFAULT_STOP_AFTER_ATTEMPTS_DURATION_SECS,
            ),
            force_dangerous_codes: Vec::new(),
        }
    }
}

const ALWAYS_RETRIED: &[u16] = &[429, 503];
const NEVER_RETRIED: &[u16] = &[401, 403, 501];

/// Per-request retry decision state machine: `INIT -> IN_FLIGHT -> (SUCCESS | TERMINAL_FAIL |
/// RETRY_SLEEP -> IN_FLIGHT | GIVE_UP)`.
pub struct RetryState {
    config: RetryConfig,
    command_type: CommandType,
    attempt: u32,
    started_at: Instant,
}

impl RetryState {
    #[must_use]
    pub fn new(config: RetryConfig, command_type: CommandType) -> Self {
        Self {
            config,
            command_type,
            attempt: 0,
            started_at: Instant::now(),
        }
    }

    /// Decides whether `status` on `method` should be retried, and if so, returns the delay to
    /// sleep before the next attempt. `retry_after` is the parsed value of a `Retry-After`
    /// response header, if present.
    ///
    /// Returns `Ok(None)` when the caller should treat the response as terminal (success, or a
    /// non-retryable failure to propagate as-is). Returns `Err` once a retry budget is exhausted.
    pub fn next_delay(
        &mut self,
        status: u16,
        method: &str,
        retry_after: Option<Duration>,
    ) -> Result<Option<Duration>, Error> {
        if !self.is_retryable_status(status, method) {
            return Ok(None);
        }

        self.attempt += 1;
        let elapsed = self.started_at.elapsed();

        if self.attempt > self.config.stop_after_attempts_count {
            return Err(Error::max_retry(
                self.attempt - 1,
                RequestContext::new().with_http_code(status).with_method(method),
            ));
        }
        if elapsed >= self.config.stop_after_attempts_duration {
            return Err(Error::max_retry_duration(
                elapsed.as_secs_f64(),
                RequestContext::new().with_http_code(status).with_method(method),
            ));
        }

        Ok(Some(self.compute_delay(retry_after)))
    }

    fn is_retryable_status(&self, status: u16, method: &str) -> bool {
        if NEVER_RETRIED.contains(&status) {
            return false;
        }
        if ALWAYS_RETRIED.contains(&status) {
            return true;
        }
        if self.config.force_dangerous_codes.contains(&status) {
            return self.command_type.is_idempotent();
        }
        // Outside the always/never/dangerous lists, only idempotent GETs are retried by default.
        method.eq_ignore_ascii_case("GET") && (400..600).contains(&status)
    }

    /// `delay = min(delay_max, delay_min * 2^attempt)`, clamped below by `delay_default`,
    /// honoring a `Retry-After` header when it is at least as long as the computed backoff.
    fn compute_delay(&self, retry_after: Option<Duration>) -> Duration {
        let exponent = i32::try_from(self.attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let backoff = self
            .config
            .delay_min
            .mul_f64(2f64.powi(exponent))
            .min(self.config.delay_max)
            .max(self.config.delay_default);

        let jittered = backoff.mul_f64(1.0 + fastrand::f64() * 0.1);

        match retry_after {
            Some(header_delay) if header_delay >= backoff => header_delay,
            _ => jittered,
        }
    }

    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }
}

/// Parses a `Retry-After` header value: either a non-negative integer number of seconds, or an
/// HTTP-date (RFC 7231), in which case the delay is the difference from now (floored at zero).
#[must_use]
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let target = httpdate::parse_http_date(value.trim()).ok()?;
    let now = std::time::SystemTime::now();
    target.duration_since(now).ok().or(Some(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_type_from_path_matches_sea_classifier() {
        assert_eq!(
            CommandType::from_path("/api/2.0/sql/statements", "POST"),
            CommandType::ExecuteStatement
        );
        assert_eq!(
            CommandType::from_path("/api/2.0/sql/statements/abc", "GET"),
            CommandType::GetOperationStatus
        );
        assert_eq!(
            CommandType::from_path("/api/2.0/sql/statements/abc/cancel", "POST"),
            CommandType::Other
        );
        assert_eq!(
            CommandType::from_path("/api/2.0/sql/statements/abc", "DELETE"),
            CommandType::CloseOperation
        );
        assert_eq!(
            CommandType::from_path("/api/2.0/sql/sessions/abc", "DELETE"),
            CommandType::CloseSession
        );
        assert_eq!(CommandType::from_path("/api/2.0/sql/sessions", "POST"), CommandType::Other);
    }

    #[test]
    fn always_retried_regardless_of_method() {
        let mut state = RetryState::new(RetryConfig::default(), CommandType::Other);
        assert!(state.next_delay(503, "POST", None).unwrap().is_some());
    }

    #[test]
    fn never_retried_terminal_codes() {
        let mut state = RetryState::new(RetryConfig::default(), CommandType::ExecuteStatement);
        assert!(state.next_delay(401, "POST", None).unwrap().is_none());
        assert!(state.next_delay(403, "POST", None).unwrap().is_none());
        assert!(state.next_delay(501, "POST", None).unwrap().is_none());
    }

    #[test]
    fn dangerous_code_not_retried_for_non_idempotent_command() {
        let mut config = RetryConfig::default();
        config.force_dangerous_codes.push(502);
        let mut state = RetryState::new(config, CommandType::ExecuteStatement);
        assert!(state.next_delay(502, "POST", None).unwrap().is_none());
    }

    #[test]
    fn dangerous_code_retried_for_idempotent_command() {
        let mut config = RetryConfig::default();
        config.force_dangerous_codes.push(502);
        let mut state = RetryState::new(config, CommandType::GetOperationStatus);
        assert!(state.next_delay(502, "GET", None).unwrap().is_some());
    }

    #[test]
    fn retry_after_header_honored_when_at_least_backoff() {
        let mut state = RetryState::new(RetryConfig::default(), CommandType::Other);
        let delay = state
            .next_delay(503, "POST", Some(Duration::from_secs(3)))
            .unwrap()
            .unwrap();
        assert!(delay >= Duration::from_secs(3));
    }

    #[test]
    fn gives_up_after_attempt_budget_exhausted() {
        let mut config = RetryConfig::default();
        config.stop_after_attempts_count = 2;
        let mut state = RetryState::new(config, CommandType::Other);
        assert!(state.next_delay(503, "POST", None).unwrap().is_some());
        assert!(state.next_delay(503, "POST", None).unwrap().is_some());
        let err = state.next_delay(503, "POST", None).unwrap_err();
        assert!(matches!(err, Error::MaxRetry { attempts: 2, .. }));
    }

    #[test]
    fn parse_retry_after_seconds() {
        assert_eq!(parse_retry_after("3"), Some(Duration::from_secs(3)));
    }

    #[test]
    fn parse_retry_after_invalid_is_none() {
        assert_eq!(parse_retry_after("not-a-date"), None);
    }
}

//! Structured logging helpers: secret redaction for request/response tracing.
//!
//! Grounded on the same `SecretContext`/`should_redact_header`/`redact_sensitive_value`
//! shape used elsewhere in this codebase for scrubbing logged requests; here the resolved
//! secrets are PAT tokens / auth header values rather than OpenAPI security-scheme secrets.

#[must_use]
pub fn should_redact_header(header_name: &str) -> bool {
    matches!(
        header_name.to_ascii_lowercase().as_str(),
        "authorization" | "proxy-authorization" | "x-api-key" | "cookie" | "set-cookie"
    )
}

#[must_use]
pub fn redact_sensitive_value(value: &str) -> String {
    if value.is_empty() {
        value.to_string()
    } else {
        "[REDACTED]".to_string()
    }
}

/// Holds the set of resolved secret values (auth header contents, PAT tokens) that must never
/// appear verbatim in a logged request/response line.
#[derive(Debug, Default, Clone)]
pub struct SecretContext {
    secrets: Vec<String>,
}

impl SecretContext {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_secret(mut self, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.secrets.push(value);
        }
        self
    }

    #[must_use]
    pub fn is_secret(&self, value: &str) -> bool {
        !value.is_empty() && self.secrets.iter().any(|s| s == value)
    }

    #[must_use]
    pub fn redact_in_text(&self, text: &str) -> String {
        let mut redacted = text.to_string();
        for secret in &self.secrets {
            redacted = redacted.replace(secret.as_str(), "[REDACTED]");
        }
        redacted
    }
}

/// Logs a retry decision as structured fields, not an interpolated string.
pub fn log_retry_decision(attempt: u32, status: u16, delay_ms: u128, session_id: &str) {
    tracing::warn!(session_id, attempt, status, delay_ms, "retrying request");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_header_is_redacted() {
        assert!(should_redact_header("Authorization"));
        assert!(should_redact_header("AUTHORIZATION"));
        assert!(!should_redact_header("Content-Type"));
    }

    #[test]
    fn secret_context_redacts_known_values() {
        let ctx = SecretContext::empty().with_secret("dapiabc123");
        let redacted = ctx.redact_in_text("Authorization: Bearer dapiabc123");
        assert_eq!(redacted, "Authorization: Bearer [REDACTED]");
    }

    #[test]
    fn empty_value_is_not_redacted() {
        assert_eq!(redact_sensitive_value(""), "");
        assert_eq!(redact_sensitive_value("x"), "[REDACTED]");
    }
}

//! Consolidated error taxonomy.
//!
//! A single closed enum, external errors captured with `#[from]`, and a `pub fn` constructor
//! per variant rather than public struct-literal construction.

use std::fmt;

/// Context attached to [`Error::Request`] and its specializations: everything a caller needs to
/// classify a transport failure without re-parsing the underlying HTTP exchange.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub http_code: Option<u16>,
    pub method: Option<String>,
    pub session_id: Option<String>,
    pub query_id: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_http_code(mut self, code: u16) -> Self {
        self.http_code = Some(code);
        self
    }

    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    #[must_use]
    pub fn with_query_id(mut self, query_id: impl Into<String>) -> Self {
        self.query_id = Some(query_id.into());
        self
    }
}

impl fmt::Display for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(code) = self.http_code {
            parts.push(format!("http-code={code}"));
        }
        if let Some(method) = &self.method {
            parts.push(format!("method={method}"));
        }
        if let Some(session_id) = &self.session_id {
            parts.push(format!("session-id={session_id}"));
        }
        if let Some(query_id) = &self.query_id {
            parts.push(format!("query-id={query_id}"));
        }
        write!(f, "{}", parts.join(", "))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Misuse of the client API: closed cursor, invalid connect URL, unsupported paradigm.
    #[error("interface error: {0}")]
    Interface(String),

    #[error("operational error: {0}")]
    Operational(String),

    #[error("programming error: {0}")]
    Programming(String),

    #[error("data error: {0}")]
    Data(String),

    #[error("integrity error: {0}")]
    Integrity(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("not supported: {0}")]
    NotSupported(String),

    /// HTTP/network failure. `context.http_code` is set once a response was received at all.
    #[error("request failed: {message}{}", format_context(.context))]
    Request {
        message: String,
        context: RequestContext,
    },

    /// A statement transitioned to `failed`; carries the server diagnostic and query id.
    #[error("server operation failed (query_id={query_id:?}): {message}")]
    ServerOperation { message: String, query_id: Option<String> },

    /// Retry policy exhausted the wall-clock budget before a terminal response arrived.
    #[error("retry duration budget exceeded after {elapsed_secs:.1}s{}", format_context(.context))]
    MaxRetryDuration { elapsed_secs: f64, context: RequestContext },

    /// Retry policy exhausted its attempt budget.
    #[error("retry attempt budget exhausted after {attempts} attempts{}", format_context(.context))]
    MaxRetry { attempts: u32, context: RequestContext },

    #[error("session already closed")]
    SessionAlreadyClosed,

    #[error("cursor already closed")]
    CursorAlreadyClosed,

    /// Internal-only: the telemetry circuit breaker rejected a push. Never surfaced to callers
    /// of the public API; a synthetic success is substituted instead.
    #[error("telemetry rate limited")]
    TelemetryRateLimit,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

fn format_context(context: &RequestContext) -> String {
    let rendered = context.to_string();
    if rendered.is_empty() {
        String::new()
    } else {
        format!(" ({rendered})")
    }
}

impl Error {
    pub fn interface(message: impl Into<String>) -> Self {
        Self::Interface(message.into())
    }

    pub fn operational(message: impl Into<String>) -> Self {
        Self::Operational(message.into())
    }

    pub fn programming(message: impl Into<String>) -> Self {
        Self::Programming(message.into())
    }

    pub fn data(message: impl Into<String>) -> Self {
        Self::Data(message.into())
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::NotSupported(message.into())
    }

    pub fn request(message: impl Into<String>, context: RequestContext) -> Self {
        Self::Request {
            message: message.into(),
            context,
        }
    }

    pub fn request_network(message: impl Into<String>) -> Self {
        Self::Request {
            message: message.into(),
            context: RequestContext::new(),
        }
    }

    pub fn server_operation(message: impl Into<String>, query_id: Option<String>) -> Self {
        Self::ServerOperation {
            message: message.into(),
            query_id,
        }
    }

    pub fn max_retry_duration(elapsed_secs: f64, context: RequestContext) -> Self {
        Self::MaxRetryDuration { elapsed_secs, context }
    }

    pub fn max_retry(attempts: u32, context: RequestContext) -> Self {
        Self::MaxRetry { attempts, context }
    }

    /// `true` for the closed-session/closed-command varieties callers are expected to tolerate
    /// when calling `close()` a second time.
    #[must_use]
    pub const fn is_already_closed(&self) -> bool {
        matches!(self, Self::SessionAlreadyClosed | Self::CursorAlreadyClosed)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_context_renders_only_present_fields() {
        let ctx = RequestContext::new().with_http_code(503).with_method("GET");
        let rendered = ctx.to_string();
        assert!(rendered.contains("http-code=503"));
        assert!(rendered.contains("method=GET"));
        assert!(!rendered.contains("session-id"));
    }

    #[test]
    fn already_closed_classification() {
        assert!(Error::SessionAlreadyClosed.is_already_closed());
        assert!(Error::CursorAlreadyClosed.is_already_closed());
        assert!(!Error::interface("x").is_already_closed());
    }

    #[test]
    fn max_retry_display_includes_context() {
        let err = Error::max_retry(31, RequestContext::new().with_http_code(503));
        let msg = err.to_string();
        assert!(msg.contains("31 attempts"));
        assert!(msg.contains("http-code=503"));
    }
}

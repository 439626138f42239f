//! L1 HTTP transport: pooled connections, TLS, retry-policy-driven resubmission.
//!
//! A `reqwest::Client` built once per session, wrapped by a loop that consults [`crate::retry`]
//! after every non-terminal response, following the `create_resilient_client`/`execute_with_retry`
//! split used elsewhere in this codebase.

use std::time::Duration;

use reqwest::{Method, StatusCode};
use tracing::{debug, warn};

use crate::auth::AuthProvider;
use crate::error::{Error, RequestContext};
use crate::retry::{parse_retry_after, CommandType, RetryConfig, RetryState};

/// Response envelope the driver's callers see: status, headers, raw body bytes. Higher layers
/// decode `data` as JSON or Thrift.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: reqwest::header::HeaderMap,
    pub data: bytes::Bytes,
}

impl Response {
    #[must_use]
    pub fn is_success(&self) -> bool {
        StatusCode::from_u16(self.status).is_ok_and(StatusCode::is_success)
    }
}

pub struct TimeoutConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Executes requests against one warehouse endpoint, applying [`crate::retry`] decisions
/// between attempts. One instance is owned exclusively by a `Session`.
pub struct Transport {
    client: reqwest::Client,
    base_url: String,
    retry_config: RetryConfig,
    auth: std::sync::Arc<dyn AuthProvider>,
}

impl Transport {
    /// Builds the pooled client with explicit connect/request timeouts and no implicit retry
    /// middleware; retries are driven by [`RetryState`] at the call site, not by the HTTP client
    /// itself.
    pub fn new(
        base_url: impl Into<String>,
        timeouts: &TimeoutConfig,
        retry_config: RetryConfig,
        auth: std::sync::Arc<dyn AuthProvider>,
    ) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeouts.connect_timeout)
            .timeout(timeouts.request_timeout)
            .build()
            .map_err(Error::Http)?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            retry_config,
            auth,
        })
    }

    /// `request(method, path, body?, headers?) -> Response | RequestError`.
    /// `command_type` classifies the call for the retry policy, the way `set_command_type`
    /// does on the original HTTP client.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<bytes::Bytes>,
        extra_headers: Option<reqwest::header::HeaderMap>,
        command_type: CommandType,
    ) -> Result<Response, Error> {
        let url = format!("{}{path}", self.base_url);
        let mut retry_state = RetryState::new(self.retry_config.clone(), command_type);

        loop {
            let mut request = self.client.request(method.clone(), &url);
            let mut headers = extra_headers.clone().unwrap_or_default();
            self.auth.add_headers(&mut headers);
            request = request.headers(headers);
            if let Some(body) = body.clone() {
                request = request.body(body);
            }

            let sent = request.send().await;

            let response = match sent {
                Ok(response) => response,
                Err(err) => {
                    // No response at all: network/TLS/DNS failure, no http-code in context.
                    if err.is_timeout() || err.is_connect() {
                        if let Some(delay) = self.sleep_for_transport_error(&mut retry_state, &method)? {
                            debug!(error = %err, delay_ms = delay.as_millis(), "retrying after transport error");
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                    }
                    return Err(Error::request_network(err.to_string()));
                }
            };

            let status = response.status().as_u16();
            let headers = response.headers().clone();

            if StatusCode::from_u16(status).is_ok_and(StatusCode::is_success) {
                let data = response.bytes().await.map_err(Error::Http)?;
                return Ok(Response { status, headers, data });
            }

            let retry_after = headers
                .get(crate::constants::HEADER_RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);

            match retry_state.next_delay(status, method.as_str(), retry_after) {
                Ok(Some(delay)) => {
                    warn!(status, attempt = retry_state.attempt(), delay_ms = delay.as_millis(), "retrying request");
                    tokio::time::sleep(delay).await;
                }
                Ok(None) => {
                    return Err(Error::request(
                        format!("request to {path} failed with status {status}"),
                        RequestContext::new().with_http_code(status).with_method(method.as_str()),
                    ));
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn sleep_for_transport_error(
        &self,
        retry_state: &mut RetryState,
        method: &Method,
    ) -> Result<Option<Duration>, Error> {
        // Transport-level failures (no status code) are treated as a 503-equivalent for backoff
        // purposes only; they never surface an http-code in the resulting context.
        retry_state.next_delay(503, method.as_str(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_success_classification() {
        let resp = Response {
            status: 200,
            headers: reqwest::header::HeaderMap::new(),
            data: bytes::Bytes::new(),
        };
        assert!(resp.is_success());
        let resp = Response { status: 404, ..resp };
        assert!(!resp.is_success());
    }
}

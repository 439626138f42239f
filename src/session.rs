//! L6 Session: DB-API-shaped connection over a backend [`Client`].
//!
//! Grounded on `examples/original_source/.../session.py`'s `Session` class: lazy `open()`,
//! a cached `useragent_header` built from `{DRIVER_NAME}/{DRIVER_VERSION} (entry)`, and a
//! `close()` that tolerates every "already closed" shape the server can report. The backend
//! selection (`_create_backend`, `use_sea` kwarg) is reproduced by [`Session::connect`].

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::sea::SeaClient;
use crate::backend::thrift::ThriftClient;
use crate::backend::{Client, MetadataFilter};
use crate::config::ConnectionOptions;
use crate::error::Error;
use crate::model::SessionId;
use crate::result::ResultSet;
use crate::telemetry;
use crate::transport::{Transport, TimeoutConfig};

const DRIVER_NAME: &str = "waresql";
const DRIVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Builds the cached `User-Agent` header value, following `session.py`'s
/// `"{}/{} ({})"` format. A caller-supplied entry is percent-encoded first: header values may
/// not carry raw control characters, and an entry is free-form caller text.
#[must_use]
fn build_user_agent(entry: Option<&str>) -> String {
    match entry {
        Some(entry) if !entry.is_empty() => {
            format!("{DRIVER_NAME}/{DRIVER_VERSION} ({})", urlencoding::encode(entry))
        }
        _ => format!("{DRIVER_NAME}/{DRIVER_VERSION}"),
    }
}

/// A SEA `http_path` looks like `/sql/1.0/warehouses/<id>`; the warehouse id is its final
/// segment. The Thrift variant has no equivalent concept and uses `http_path` as-is.
#[must_use]
fn extract_warehouse_id(http_path: &str) -> String {
    http_path.rsplit('/').next().unwrap_or(http_path).to_string()
}

enum SessionState {
    Unopened,
    Open(SessionId),
    Closed,
}

/// Owns exactly one backend `Client` and, once opened, exactly one `SessionId`. Every `Cursor`
/// borrows a `Session`; closing it closes all cursors built on top of it, enforced by every
/// cursor operation re-checking session state before use.
pub struct Session {
    client: Arc<dyn Client>,
    catalog: Option<String>,
    schema: Option<String>,
    session_configuration: HashMap<String, String>,
    user_agent: String,
    connection_id: Uuid,
    state: Mutex<SessionState>,
    host: String,
    telemetry_client: reqwest::Client,
}

impl Session {
    /// Builds the transport and selects the backend variant per `options.use_sea`, the way
    /// `Session._create_backend` dispatches on the `use_sea` kwarg. Does not open the session;
    /// the first operation that needs one does so lazily.
    pub fn connect(options: ConnectionOptions, user_agent_entry: Option<&str>) -> Result<Arc<Self>, Error> {
        let base_url = format!("https://{}", options.server_hostname);
        let timeouts = TimeoutConfig {
            connect_timeout: std::time::Duration::from_secs(10),
            request_timeout: options.socket_timeout,
        };
        let auth = options.auth_provider();

        let client: Arc<dyn Client> = if options.use_sea {
            let transport = Transport::new(base_url, &timeouts, options.retry_config.clone(), auth)?;
            Arc::new(SeaClient::new(
                transport,
                extract_warehouse_id(&options.http_path),
                options.max_download_threads,
                options.lz4_compression,
            ))
        } else {
            let transport = Transport::new(base_url, &timeouts, options.retry_config.clone(), auth)?;
            Arc::new(ThriftClient::new(transport, options.http_path.clone()))
        };

        Ok(Arc::new(Self {
            client,
            catalog: options.catalog.clone(),
            schema: options.schema.clone(),
            session_configuration: options.session_configuration.clone(),
            user_agent: build_user_agent(user_agent_entry),
            connection_id: Uuid::new_v4(),
            state: Mutex::new(SessionState::Unopened),
            host: options.server_hostname.clone(),
            telemetry_client: reqwest::Client::new(),
        }))
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    #[must_use]
    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    #[must_use]
    pub fn client(&self) -> &Arc<dyn Client> {
        &self.client
    }

    /// Opens the session on first call; every subsequent call returns the cached id. Raises
    /// `InterfaceError` once the session has been closed.
    pub async fn ensure_open(&self) -> Result<SessionId, Error> {
        let mut state = self.state.lock().await;
        match &*state {
            SessionState::Open(id) => Ok(id.clone()),
            SessionState::Closed => Err(Error::interface("operation attempted on a closed session")),
            SessionState::Unopened => {
                let id = self
                    .client
                    .open_session(self.catalog.as_deref(), self.schema.as_deref(), &self.session_configuration)
                    .await?;
                info!(session_id = %id, connection_id = %self.connection_id, "session opened");
                *state = SessionState::Open(id.clone());
                self.spawn_telemetry_push();
                Ok(id)
            }
        }
    }

    /// Idempotent. Tolerates a session that was already closed, by this call or by the server,
    /// the way `Session.close` swallows `SessionAlreadyClosedError` and "Invalid SessionHandle".
    pub async fn close(&self) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        let SessionState::Open(id) = &*state else {
            debug!("session appears to have been closed already");
            *state = SessionState::Closed;
            return Ok(());
        };

        match self.client.close_session(id).await {
            Ok(()) => {}
            Err(e) if e.is_already_closed() => {
                info!("session was closed by a prior request");
            }
            Err(e) => {
                warn!(error = %e, "attempt to close session raised an exception at the server");
            }
        }
        *state = SessionState::Closed;
        self.spawn_telemetry_push();
        Ok(())
    }

    /// Fires a telemetry push on a detached task so open/close never block on it; the breaker
    /// and the push itself both swallow their own failures, matching `Session`'s open/close
    /// telemetry calls in the original connector.
    fn spawn_telemetry_push(&self) {
        let client = self.telemetry_client.clone();
        let host = self.host.clone();
        tokio::spawn(async move { telemetry::push_telemetry_event(&client, &host).await });
    }

    #[must_use]
    pub async fn is_open(&self) -> bool {
        matches!(&*self.state.lock().await, SessionState::Open(_))
    }

    pub(crate) async fn get_catalogs(&self) -> Result<ResultSet, Error> {
        let id = self.ensure_open().await?;
        self.client.get_catalogs(&id).await
    }

    pub(crate) async fn get_schemas(&self, filter: &MetadataFilter) -> Result<ResultSet, Error> {
        let id = self.ensure_open().await?;
        self.client.get_schemas(&id, filter).await
    }

    pub(crate) async fn get_tables(&self, filter: &MetadataFilter) -> Result<ResultSet, Error> {
        let id = self.ensure_open().await?;
        self.client.get_tables(&id, filter).await
    }

    pub(crate) async fn get_columns(&self, filter: &MetadataFilter) -> Result<ResultSet, Error> {
        let id = self.ensure_open().await?;
        self.client.get_columns(&id, filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_without_entry_is_bare_name_and_version() {
        assert_eq!(build_user_agent(None), format!("{DRIVER_NAME}/{DRIVER_VERSION}"));
    }

    #[test]
    fn user_agent_with_entry_is_parenthesized() {
        let ua = build_user_agent(Some("my app"));
        assert_eq!(ua, format!("{DRIVER_NAME}/{DRIVER_VERSION} (my%20app)"));
    }

    #[test]
    fn warehouse_id_is_final_path_segment() {
        assert_eq!(extract_warehouse_id("/sql/1.0/warehouses/abc123"), "abc123");
    }
}

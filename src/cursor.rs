//! L6 Cursor: the DB-API-shaped row iterator built over a [`Session`].
//!
//! Grounded on `examples/original_source/.../client.py`'s `Cursor` (its shape is inferred from
//! `tests/unit/test_streaming_put.py::TestStreamingPut`, since `client.py` itself was filtered
//! from the retrieval pack) for `execute(sql, parameters, input_stream=...)`,
//! `_handle_staging_put_stream`, and the `ProgrammingError`/`OperationalError` split on a
//! missing stream vs. a failed PUT.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use indexmap::IndexMap;
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

use crate::backend::{ExecuteOutcome, ExecuteRequest, MetadataFilter};
use crate::error::Error;
use crate::model::{CommandId, CommandState, Row, Value};
use crate::param::{self, BoundParameter, Paradigm};
use crate::result::ResultSet;
use crate::session::Session;
use crate::staging::{self, StagingPutTarget};

/// Default `fetchmany` batch size when the caller doesn't specify one.
pub const DEFAULT_ARRAY_SIZE: usize = 10_000;

struct ActiveResult {
    result_set: Option<ResultSet>,
    is_query_pending: bool,
}

/// One statement's worth of state: a Cursor executes at most one command at a time.
/// `command_id` lives behind its own lock so `cancel()` can read it without waiting on
/// whatever `result_set`'s lock is doing (a long cloud-fetch download, say) — `cancel()` must
/// stay callable from another task while a fetch is in flight.
pub struct Cursor {
    session: Arc<Session>,
    arraysize: usize,
    command_id: RwLock<Option<CommandId>>,
    active: Mutex<ActiveResult>,
    cancelled: AtomicBool,
    closed: AtomicBool,
}

impl Cursor {
    #[must_use]
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            arraysize: DEFAULT_ARRAY_SIZE,
            command_id: RwLock::new(None),
            active: Mutex::new(ActiveResult { result_set: None, is_query_pending: false }),
            cancelled: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub const fn arraysize(&self) -> usize {
        self.arraysize
    }

    pub fn set_arraysize(&mut self, size: usize) {
        self.arraysize = size.max(1);
    }

    fn check_open(&self) -> Result<(), Error> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::CursorAlreadyClosed);
        }
        Ok(())
    }

    /// Releases whatever command is currently active before a new `execute` starts, the way
    /// calling `execute` twice on one cursor first tears down the previous statement.
    async fn release_active_command(&self) {
        let previous = self.command_id.write().await.take();
        if let Some(id) = previous {
            if let Err(e) = self.session.client().cancel(&id).await {
                warn!(command_id = %id, error = %e, "cancel of superseded command failed");
            }
            if let Err(e) = self.session.client().close_command(&id).await {
                warn!(command_id = %id, error = %e, "close of superseded command failed");
            }
        }
        let mut active = self.active.lock().await;
        active.result_set = None;
        active.is_query_pending = false;
    }

    async fn prepare_request(&self, sql: &str, parameters: &IndexMap<String, Value>) -> Result<(String, Vec<BoundParameter>), Error> {
        // Native parameter binding is negotiated purely client-side here (no server capability
        // probe wired up yet): inline mode only kicks in when the caller opts out of native
        // binding explicitly, mirroring `use_inline_params`'s default of `false`.
        let paradigm = param::choose_paradigm(true, false, !parameters.is_empty());
        match paradigm {
            Paradigm::None => Ok((sql.to_string(), Vec::new())),
            Paradigm::Native => {
                let bound = parameters
                    .iter()
                    .map(|(name, value)| BoundParameter {
                        name: Some(name.clone()),
                        position: None,
                        type_tag: param::infer_type_tag(value).to_string(),
                        value: value.clone(),
                    })
                    .collect();
                Ok((sql.to_string(), bound))
            }
            Paradigm::Inline => {
                let named: Vec<(String, Value)> = parameters.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                let rendered = param::prepare_inline_statement(sql, &named)?;
                Ok((rendered, Vec::new()))
            }
        }
    }

    /// Synchronous `execute`: blocks until the statement is complete (or failed) and the
    /// cursor is ready to fetch. Tears down any previously active command first.
    pub async fn execute(&self, sql: &str, parameters: &IndexMap<String, Value>) -> Result<(), Error> {
        self.execute_with_stream(sql, parameters, None).await
    }

    /// Staging-PUT variant: `sql` containing the `'__input_stream__'` placeholder requires
    /// `input_stream` to be `Some`; its absence is a `ProgrammingError`, matching the original's
    /// "No input stream provided for streaming operation" message.
    pub async fn execute_with_stream(
        &self,
        sql: &str,
        parameters: &IndexMap<String, Value>,
        input_stream: Option<Bytes>,
    ) -> Result<(), Error> {
        self.check_open()?;
        let is_staging_put = staging::is_staging_input_stream(sql);
        if is_staging_put && input_stream.is_none() {
            return Err(Error::programming("No input stream provided for streaming operation"));
        }

        self.release_active_command().await;
        self.cancelled.store(false, Ordering::Release);

        let (rendered_sql, bound) = self.prepare_request(sql, parameters).await?;
        let session_id = self.session.ensure_open().await?;

        let mut request = ExecuteRequest::new(rendered_sql);
        request.parameters = bound;

        let outcome = self.session.client().execute(&session_id, request).await?;
        let mut result_set = match outcome {
            ExecuteOutcome::Complete(result_set) => result_set,
            ExecuteOutcome::Submitted(command_id) => {
                *self.command_id.write().await = Some(command_id.clone());
                self.await_submitted(command_id).await?
            }
        };

        if is_staging_put {
            let Some(stream) = input_stream else {
                unreachable!("checked above");
            };
            self.handle_staging_put_stream(&mut result_set, stream).await?;
        }

        let mut active = self.active.lock().await;
        active.result_set = Some(result_set);
        active.is_query_pending = false;
        Ok(())
    }

    async fn await_submitted(&self, command_id: CommandId) -> Result<ResultSet, Error> {
        loop {
            let state = self.session.client().get_state(&command_id).await?;
            if state == CommandState::Failed {
                return Err(Error::server_operation("statement failed", Some(command_id.to_string())));
            }
            if state.is_terminal() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(crate::constants::MIN_POLL_INTERVAL_MS)).await;
        }
        self.session.client().get_execution_result(&command_id).await
    }

    /// Reads the single staging-operation row the server returns (`operation`, `localFile`,
    /// `presignedUrl`, `headers`) and PUTs the caller's stream to the presigned URL.
    async fn handle_staging_put_stream(&self, result_set: &mut ResultSet, stream: Bytes) -> Result<(), Error> {
        let Some(row) = result_set.fetch_one().await? else {
            return Err(Error::operational("staging PUT response carried no row"));
        };
        let local_file = row.get_by_name("localFile").and_then(value_as_str);
        if local_file != Some("__input_stream__") {
            return Err(Error::operational("staging PUT response did not target the input stream"));
        }
        let presigned_url = row
            .get_by_name("presignedUrl")
            .and_then(value_as_str)
            .ok_or_else(|| Error::operational("staging PUT response missing presignedUrl"))?
            .to_string();
        let headers = row
            .get_by_name("headers")
            .and_then(value_as_str)
            .and_then(|raw| serde_json::from_str::<std::collections::HashMap<String, String>>(raw).ok())
            .unwrap_or_default();

        let target = StagingPutTarget { presigned_url, headers: headers.into_iter().collect() };
        let http_client = reqwest::Client::new();
        staging::put_stream(&http_client, &target, stream).await
    }

    /// `execute_async`: submits the statement and returns immediately; the caller polls
    /// `is_query_pending` and later calls `get_async_execution_result`.
    pub async fn execute_async(&self, sql: &str, parameters: &IndexMap<String, Value>) -> Result<(), Error> {
        self.check_open()?;
        self.release_active_command().await;
        self.cancelled.store(false, Ordering::Release);

        let (rendered_sql, bound) = self.prepare_request(sql, parameters).await?;
        let session_id = self.session.ensure_open().await?;

        let mut request = ExecuteRequest::new(rendered_sql);
        request.parameters = bound;
        request.r#async = true;

        match self.session.client().execute(&session_id, request).await? {
            ExecuteOutcome::Submitted(command_id) => {
                *self.command_id.write().await = Some(command_id);
                self.active.lock().await.is_query_pending = true;
                Ok(())
            }
            ExecuteOutcome::Complete(result_set) => {
                // Server resolved the command before polling started; treat as already-done.
                let mut active = self.active.lock().await;
                active.result_set = Some(result_set);
                active.is_query_pending = false;
                Ok(())
            }
        }
    }

    /// Polls backend state once. A terminal state is cached server-side once observed; here
    /// that just means a subsequent call sees `is_query_pending` already cleared.
    pub async fn is_query_pending(&self) -> Result<bool, Error> {
        let Some(command_id) = self.command_id.read().await.clone() else {
            return Ok(false);
        };
        let state = self.session.client().get_state(&command_id).await?;
        let pending = !state.is_terminal();
        if !pending {
            self.active.lock().await.is_query_pending = false;
        }
        Ok(pending)
    }

    /// Resolves a pending `execute_async` command into a fetchable result set.
    pub async fn get_async_execution_result(&self) -> Result<(), Error> {
        self.check_open()?;
        let Some(command_id) = self.command_id.read().await.clone() else {
            return Err(Error::programming("no async command is pending on this cursor"));
        };
        let state = self.session.client().get_state(&command_id).await?;
        if state == CommandState::Failed {
            return Err(Error::server_operation("statement failed", Some(command_id.to_string())));
        }
        if !state.is_terminal() {
            return Err(Error::programming("get_async_execution_result called before the command finished"));
        }
        let result_set = self.session.client().get_execution_result(&command_id).await?;
        let mut active = self.active.lock().await;
        active.result_set = Some(result_set);
        active.is_query_pending = false;
        Ok(())
    }

    fn check_fetchable(&self) -> Result<(), Error> {
        self.check_open()?;
        if self.cancelled.load(Ordering::Acquire) {
            return Err(Error::operational("cursor's command was cancelled"));
        }
        Ok(())
    }

    pub async fn fetch_one(&self) -> Result<Option<Row>, Error> {
        self.check_fetchable()?;
        let mut active = self.active.lock().await;
        let Some(result_set) = active.result_set.as_mut() else {
            return Err(Error::programming("no active result set; call execute first"));
        };
        result_set.fetch_one().await
    }

    pub async fn fetch_many(&self, n: usize) -> Result<Vec<Row>, Error> {
        self.check_fetchable()?;
        let mut active = self.active.lock().await;
        let Some(result_set) = active.result_set.as_mut() else {
            return Err(Error::programming("no active result set; call execute first"));
        };
        result_set.fetch_many(n).await
    }

    /// `fetchmany()` with no explicit count uses `arraysize`.
    pub async fn fetch_many_default(&self) -> Result<Vec<Row>, Error> {
        self.fetch_many(self.arraysize).await
    }

    pub async fn fetch_all(&self) -> Result<Vec<Row>, Error> {
        self.check_fetchable()?;
        let mut active = self.active.lock().await;
        let Some(result_set) = active.result_set.as_mut() else {
            return Err(Error::programming("no active result set; call execute first"));
        };
        result_set.fetch_all().await
    }

    /// Callable from another task while `execute`/fetch is in flight: only issues the backend
    /// cancel RPC, never aborts an in-flight HTTP call. Never raises.
    pub async fn cancel(&self) {
        let Some(command_id) = self.command_id.read().await.clone() else {
            return;
        };
        if let Err(e) = self.session.client().cancel(&command_id).await {
            warn!(command_id = %command_id, error = %e, "cancel raised an error, ignoring");
        }
        self.cancelled.store(true, Ordering::Release);
    }

    /// Closes the active command (if any) and releases the result set. Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.release_active_command().await;
    }

    pub async fn catalogs(&self) -> Result<ResultSet, Error> {
        self.check_open()?;
        self.session.get_catalogs().await
    }

    pub async fn schemas(&self, filter: &MetadataFilter) -> Result<ResultSet, Error> {
        self.check_open()?;
        self.session.get_schemas(filter).await
    }

    pub async fn tables(&self, filter: &MetadataFilter) -> Result<ResultSet, Error> {
        self.check_open()?;
        self.session.get_tables(filter).await
    }

    pub async fn columns(&self, filter: &MetadataFilter) -> Result<ResultSet, Error> {
        self.check_open()?;
        self.session.get_columns(filter).await
    }
}

fn value_as_str(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s.as_str()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_array_size_is_reasonable() {
        assert_eq!(DEFAULT_ARRAY_SIZE, 10_000);
    }

    #[test]
    fn value_as_str_rejects_non_string() {
        assert_eq!(value_as_str(&Value::Int(1)), None);
        assert_eq!(value_as_str(&Value::String("x".to_string())), Some("x"));
    }
}

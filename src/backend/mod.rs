//! L3 Backend Client: a transport-neutral interface with two concrete variants.

pub mod sea;
pub mod sea_metadata;
pub mod thrift;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Error;
use crate::model::{CommandId, CommandState, SessionId};
use crate::result::ResultSet;

/// Scoping filters shared by the four metadata operations.
#[derive(Debug, Clone, Default)]
pub struct MetadataFilter {
    pub catalog_name: Option<String>,
    pub schema_name: Option<String>,
    pub table_name: Option<String>,
    pub column_name: Option<String>,
    pub table_types: Vec<String>,
}

/// Inputs to `execute`. `parameters` have already passed through the
/// parameter-preparation layer by the time they reach the backend.
#[derive(Debug, Clone)]
pub struct ExecuteRequest {
    pub sql: String,
    pub parameters: Vec<crate::param::BoundParameter>,
    pub max_rows: Option<u64>,
    pub max_bytes: Option<u64>,
    pub lz4_compressed: bool,
    pub use_cloud_fetch: bool,
    pub r#async: bool,
}

impl ExecuteRequest {
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            parameters: Vec::new(),
            max_rows: None,
            max_bytes: None,
            lz4_compressed: true,
            use_cloud_fetch: true,
            r#async: false,
        }
    }
}

/// Outcome of `execute`: the sync path installs a `ResultSet` directly, the async path returns
/// only a handle the caller later polls.
pub enum ExecuteOutcome {
    Complete(ResultSet),
    Submitted(CommandId),
}

/// Abstract backend client: both the Thrift and SEA variants implement identical
/// semantics for every operation below.
#[async_trait]
pub trait Client: Send + Sync {
    async fn open_session(
        &self,
        catalog: Option<&str>,
        schema: Option<&str>,
        session_configuration: &HashMap<String, String>,
    ) -> Result<SessionId, Error>;

    /// Idempotent: a 404-equivalent from the server is treated as success.
    async fn close_session(&self, session: &SessionId) -> Result<(), Error>;

    async fn execute(
        &self,
        session: &SessionId,
        request: ExecuteRequest,
    ) -> Result<ExecuteOutcome, Error>;

    async fn get_state(&self, command: &CommandId) -> Result<CommandState, Error>;

    /// Idempotent; transitions the command to `Canceled`.
    async fn cancel(&self, command: &CommandId) -> Result<(), Error>;

    /// Idempotent.
    async fn close_command(&self, command: &CommandId) -> Result<(), Error>;

    /// Valid only once `get_state` reports `Succeeded`.
    async fn get_execution_result(&self, command: &CommandId) -> Result<ResultSet, Error>;

    async fn get_catalogs(&self, session: &SessionId) -> Result<ResultSet, Error>;

    async fn get_schemas(&self, session: &SessionId, filter: &MetadataFilter) -> Result<ResultSet, Error>;

    async fn get_tables(&self, session: &SessionId, filter: &MetadataFilter) -> Result<ResultSet, Error>;

    async fn get_columns(&self, session: &SessionId, filter: &MetadataFilter) -> Result<ResultSet, Error>;
}

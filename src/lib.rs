//! Client driver for submitting SQL statements to a remote analytic warehouse over either a
//! binary-RPC ("Thrift") or JSON-REST ("SEA") transport, and streaming results back through a
//! cloud-fetch-aware pipeline.
//!
//! Layering follows the module list below: [`transport`] is the pooled HTTP client with
//! retry-policy integration, [`auth`] attaches credentials, [`backend`] is the transport-neutral
//! RPC surface with its two concrete variants, [`result`] converts whatever shape a variant
//! returns into rows, [`param`] prepares parameters and rewrites statements, and [`session`]/
//! [`cursor`] are the connection- and statement-scoped objects applications hold onto.

pub mod auth;
pub mod backend;
pub mod config;
pub mod constants;
pub mod cursor;
pub mod error;
pub mod logging;
pub mod model;
pub mod param;
pub mod result;
pub mod retry;
pub mod session;
pub mod staging;
pub mod telemetry;
pub mod transport;

pub use config::{ConnectionOptions, ConnectionOptionsBuilder};
pub use cursor::Cursor;
pub use error::{Error, Result};
pub use model::{ColumnDescription, CommandId, CommandState, Row, SessionId, Value};
pub use result::ResultSet;
pub use session::Session;

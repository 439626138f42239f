//! Data model shared by both backend variants.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Which wire protocol issued a [`SessionId`]/[`CommandId`] — carried so a handle can never be
/// replayed against the wrong backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendTag {
    Thrift,
    Sea,
}

/// Opaque server-assigned identifier for a logical session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId {
    pub backend: BackendTag,
    pub guid: String,
    /// Thrift sessions additionally carry a secret handle component never logged or displayed.
    pub secret: Option<String>,
}

impl SessionId {
    #[must_use]
    pub const fn thrift(guid: String, secret: String) -> Self {
        Self {
            backend: BackendTag::Thrift,
            guid,
            secret: Some(secret),
        }
    }

    #[must_use]
    pub const fn sea(guid: String) -> Self {
        Self {
            backend: BackendTag::Sea,
            guid,
            secret: None,
        }
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.guid)
    }
}

/// Opaque identifier for a submitted statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandId {
    pub backend: BackendTag,
    pub guid: String,
    pub secret: Option<String>,
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.guid)
    }
}

/// Only `Running`/`Pending` are non-terminal, only `Succeeded` permits result reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
    Closed,
}

impl CommandState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }

    /// Total mapping from backend-specific state codes.
    #[must_use]
    pub fn from_backend_code(code: &str) -> Self {
        match code.to_ascii_lowercase().as_str() {
            "initialized" | "pending" | "running" => Self::Running,
            "finished" | "succeeded" => Self::Succeeded,
            "canceled" | "cancelled" => Self::Canceled,
            "closed" => Self::Closed,
            _ => Self::Failed,
        }
    }
}

/// Ordering matches the result schema; immutable once received.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescription {
    pub name: String,
    pub type_name: String,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub nullable: bool,
}

/// Positionally-indexed, with case-sensitive lookup by column name.
#[derive(Debug, Clone, Default)]
pub struct Row {
    pub values: Vec<Value>,
    columns: std::sync::Arc<Vec<ColumnDescription>>,
}

impl Row {
    #[must_use]
    pub fn new(values: Vec<Value>, columns: std::sync::Arc<Vec<ColumnDescription>>) -> Self {
        Self { values, columns }
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Case-sensitive lookup by declared column name.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        let index = self.columns.iter().position(|c| c.name == name)?;
        self.values.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A typed cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    TinyInt(i8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    /// Decimal preserves precision/scale alongside the unscaled digits, carried as a decimal
    /// string to avoid pulling in a bignum dependency this dependency stack doesn't already use.
    Decimal {
        unscaled: String,
        precision: u32,
        scale: u32,
    },
    String(String),
    Binary(Vec<u8>),
    Date(NaiveDate),
    TimestampNaive(NaiveDateTime),
    TimestampAware(DateTime<Utc>),
}

impl Value {
    #[must_use]
    pub const fn type_tag(&self) -> &'static str {
        match self {
            Self::Null => "void",
            Self::Boolean(_) => "boolean",
            Self::TinyInt(_) => "tinyint",
            Self::SmallInt(_) => "smallint",
            Self::Int(_) => "int",
            Self::BigInt(_) => "bigint",
            Self::Float(_) => "float",
            Self::Double(_) => "double",
            Self::Decimal { .. } => "decimal",
            Self::String(_) => "string",
            Self::Binary(_) => "binary",
            Self::Date(_) => "date",
            Self::TimestampNaive(_) => "timestamp_ntz",
            Self::TimestampAware(_) => "timestamp",
        }
    }
}

/// `start_row_offset + row_count == next chunk's start_row_offset`.
#[derive(Debug, Clone)]
pub struct ResultChunk {
    pub chunk_index: u64,
    pub start_row_offset: u64,
    pub row_count: u64,
    pub byte_count: Option<u64>,
    pub source: ChunkSource,
}

#[derive(Debug, Clone)]
pub enum ChunkSource {
    InlineRows(Vec<Row>),
    InlineArrow(Vec<u8>),
    External {
        presigned_url: String,
        expiry_time: DateTime<Utc>,
        http_headers: Vec<(String, String)>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_state_mapping_is_total() {
        assert_eq!(CommandState::from_backend_code("pending"), CommandState::Running);
        assert_eq!(CommandState::from_backend_code("running"), CommandState::Running);
        assert_eq!(CommandState::from_backend_code("finished"), CommandState::Succeeded);
        assert_eq!(CommandState::from_backend_code("canceled"), CommandState::Canceled);
        assert_eq!(CommandState::from_backend_code("closed"), CommandState::Closed);
        assert_eq!(CommandState::from_backend_code("timedout"), CommandState::Failed);
        assert_eq!(CommandState::from_backend_code("totally-unknown"), CommandState::Failed);
    }

    #[test]
    fn terminal_classification() {
        assert!(!CommandState::Pending.is_terminal());
        assert!(!CommandState::Running.is_terminal());
        assert!(CommandState::Succeeded.is_terminal());
        assert!(CommandState::Failed.is_terminal());
        assert!(CommandState::Canceled.is_terminal());
        assert!(CommandState::Closed.is_terminal());
    }

    #[test]
    fn row_lookup_by_name_is_case_sensitive() {
        let columns = std::sync::Arc::new(vec![ColumnDescription {
            name: "Id".into(),
            type_name: "int".into(),
            precision: None,
            scale: None,
            nullable: false,
        }]);
        let row = Row::new(vec![Value::Int(1)], columns);
        assert_eq!(row.get_by_name("Id"), Some(&Value::Int(1)));
        assert_eq!(row.get_by_name("id"), None);
    }
}

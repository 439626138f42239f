//! Shared literal values: header names, default tuning knobs, SEA endpoint
//! paths and the canonical metadata column names both backends must agree on.

pub const HEADER_AUTHORIZATION: &str = "Authorization";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_RETRY_AFTER: &str = "Retry-After";
pub const HEADER_USER_AGENT: &str = "User-Agent";

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_THRIFT: &str = "application/x-thrift";

/// Default number of concurrent cloud-fetch download workers.
pub const DEFAULT_MAX_DOWNLOAD_THREADS: usize = 10;

/// Minimum time-to-expiry a cloud-fetch link must have before a worker will
/// use it; links closer to expiry than this are treated as already expired.
pub const DEFAULT_LINK_EXPIRY_BUFFER_SECS: i64 = 60;

/// Floor under which the adaptive state-poll delay never drops.
pub const MIN_POLL_INTERVAL_MS: u64 = 1_000;

// ---- Retry policy defaults ----
pub const DEFAULT_RETRY_DELAY_MIN_SECS: f64 = 1.0;
pub const DEFAULT_RETRY_DELAY_MAX_SECS: f64 = 60.0;
pub const DEFAULT_RETRY_DELAY_DEFAULT_SECS: f64 = 5.0;
pub const DEFAULT_STOP_AFTER_ATTEMPTS_COUNT: u32 = 30;
pub const DEFAULT_STOP_AFTER_ATTEMPTS_DURATION_SECS: f64 = 900.0;

// ---- Telemetry circuit breaker ----
pub const TELEMETRY_CIRCUIT_FAILURE_MAX: u32 = 20;
pub const TELEMETRY_CIRCUIT_RESET_TIMEOUT_SECS: u64 = 30;

// ---- SEA REST surface ----
pub const SEA_PATH_SESSIONS: &str = "/api/2.0/sql/sessions";
pub const SEA_PATH_STATEMENTS: &str = "/api/2.0/sql/statements";

// ---- Canonical metadata column names ----
pub const CATALOG_COLUMNS: &[&str] = &["TABLE_CAT"];
pub const SCHEMA_COLUMNS: &[&str] = &["TABLE_SCHEM", "TABLE_CATALOG"];
pub const TABLE_COLUMNS: &[&str] = &[
    "TABLE_CAT",
    "TABLE_SCHEM",
    "TABLE_NAME",
    "TABLE_TYPE",
    "REMARKS",
    "TYPE_CAT",
    "TYPE_SCHEM",
    "TYPE_NAME",
    "SELF_REFERENCING_COL_NAME",
    "REF_GENERATION",
];
pub const COLUMN_COLUMNS: &[&str] = &[
    "TABLE_CAT",
    "TABLE_SCHEM",
    "TABLE_NAME",
    "COLUMN_NAME",
    "DATA_TYPE",
    "TYPE_NAME",
    "COLUMN_SIZE",
    "BUFFER_LENGTH",
    "DECIMAL_DIGITS",
    "NUM_PREC_RADIX",
    "NULLABLE",
    "REMARKS",
    "COLUMN_DEF",
    "SQL_DATA_TYPE",
    "SQL_DATETIME_SUB",
    "CHAR_OCTET_LENGTH",
    "ORDINAL_POSITION",
    "IS_NULLABLE",
];

pub const BOOLEAN_TRUTHY_TOKENS: &[&str] = &["true", "t", "1", "yes", "y"];

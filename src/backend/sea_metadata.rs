//! SEA metadata column renaming: rewrites SEA's raw JSON field names to the
//! canonical column set the Thrift variant already returns, so callers cannot tell the backends
//! apart.
//!
//! Grounded on `examples/original_source/.../backend/sea/utils/metadata_mappings.py` and
//! `metadata_transformations.py`. Columns present only on one backend are emitted as NULL on
//! the other to keep row shape identical.

use serde_json::Value as Json;

use crate::model::Value;

/// One canonical output column: its name, the SEA JSON field it's sourced from (`None` when the
/// SEA backend has no equivalent and the column is always NULL), and an optional transform.
pub struct ResultColumn {
    pub canonical_name: &'static str,
    pub sea_field: Option<&'static str>,
    pub transform: fn(Option<&Json>) -> Value,
    /// Declared type of the canonical output column, independent of the SEA source field's
    /// own type, since renamed/NULL-filled columns don't carry one.
    pub sql_type: &'static str,
}

fn identity_string(value: Option<&Json>) -> Value {
    match value {
        Some(Json::String(s)) => Value::String(s.clone()),
        Some(other) => Value::String(other.to_string()),
        None => Value::Null,
    }
}

fn identity_int(value: Option<&Json>) -> Value {
    match value.and_then(serde_json::Value::as_i64) {
        Some(n) => Value::Int(n as i32),
        None => Value::Null,
    }
}

fn always_null(_value: Option<&Json>) -> Value {
    Value::Null
}

fn transform_remarks(value: Option<&Json>) -> Value {
    match value {
        Some(Json::String(s)) => Value::String(s.clone()),
        _ => Value::String(String::new()),
    }
}

fn transform_table_type(value: Option<&Json>) -> Value {
    match value {
        Some(Json::String(s)) if !s.is_empty() => Value::String(s.clone()),
        _ => Value::String("TABLE".to_string()),
    }
}

fn transform_is_nullable(value: Option<&Json>) -> Value {
    let nullable = matches!(value, None | Some(Json::Bool(true))) || matches!(value, Some(Json::String(s)) if s == "true");
    Value::String(if nullable { "YES" } else { "NO" }.to_string())
}

fn transform_nullable_to_int(value: Option<&Json>) -> Value {
    let nullable = matches!(value, None | Some(Json::Bool(true))) || matches!(value, Some(Json::String(s)) if s == "true");
    Value::Int(i32::from(nullable))
}

fn transform_ordinal_position(value: Option<&Json>) -> Value {
    // SEA returns 1-based ordinals; the canonical (Thrift-compatible) schema is 0-based.
    match value.and_then(serde_json::Value::as_i64) {
        Some(n) => Value::Int((n - 1) as i32),
        None => Value::Int(0),
    }
}

fn transform_data_type(value: Option<&Json>) -> Value {
    let Some(Json::String(raw)) = value else {
        return Value::Int(1111);
    };
    let upper = raw.to_uppercase();
    let base = upper.split('(').next().unwrap_or(&upper);
    let code = match base {
        "STRING" | "VARCHAR" => 12,
        "INT" | "INTEGER" => 4,
        "DOUBLE" => 8,
        "FLOAT" => 6,
        "BOOLEAN" => 16,
        "DATE" => 91,
        "TIMESTAMP" | "TIMESTAMP_NTZ" => 93,
        "DECIMAL" => 3,
        "NUMERIC" => 2,
        "BINARY" => -2,
        "ARRAY" => 2003,
        "MAP" | "STRUCT" => 2002,
        "TINYINT" => -6,
        "SMALLINT" => 5,
        "BIGINT" | "LONG" => -5,
        _ => 1111,
    };
    Value::Int(code)
}

pub static CATALOG_COLUMNS: &[ResultColumn] = &[ResultColumn {
    canonical_name: "TABLE_CAT",
    sea_field: Some("catalog"),
    transform: identity_string,
    sql_type: "string",
}];

pub static SCHEMA_COLUMNS: &[ResultColumn] = &[
    ResultColumn {
        canonical_name: "TABLE_SCHEM",
        sea_field: Some("databaseName"),
        transform: identity_string,
        sql_type: "string",
    },
    ResultColumn {
        canonical_name: "TABLE_CATALOG",
        sea_field: None,
        transform: always_null,
        sql_type: "string",
    },
];

pub static TABLE_COLUMNS: &[ResultColumn] = &[
    ResultColumn { canonical_name: "TABLE_CAT", sea_field: Some("catalogName"), transform: identity_string, sql_type: "string" },
    ResultColumn { canonical_name: "TABLE_SCHEM", sea_field: Some("namespace"), transform: identity_string, sql_type: "string" },
    ResultColumn { canonical_name: "TABLE_NAME", sea_field: Some("tableName"), transform: identity_string, sql_type: "string" },
    ResultColumn { canonical_name: "TABLE_TYPE", sea_field: Some("tableType"), transform: transform_table_type, sql_type: "string" },
    ResultColumn { canonical_name: "REMARKS", sea_field: Some("remarks"), transform: transform_remarks, sql_type: "string" },
    ResultColumn { canonical_name: "TYPE_CAT", sea_field: None, transform: always_null, sql_type: "string" },
    ResultColumn { canonical_name: "TYPE_SCHEM", sea_field: None, transform: always_null, sql_type: "string" },
    ResultColumn { canonical_name: "TYPE_NAME", sea_field: None, transform: always_null, sql_type: "string" },
    ResultColumn { canonical_name: "SELF_REFERENCING_COL_NAME", sea_field: None, transform: always_null, sql_type: "string" },
    ResultColumn { canonical_name: "REF_GENERATION", sea_field: None, transform: always_null, sql_type: "string" },
];

/// Canonical `columns()` output. Includes the five JDBC-standard columns SEA has no source
/// field for (`SCOPE_*`, `SOURCE_DATA_TYPE`, `IS_AUTO_INCREMENT`) as NULL-filled entries, matching
/// the original connector's column mapping rather than silently trimming them.
pub static COLUMN_COLUMNS: &[ResultColumn] = &[
    ResultColumn { canonical_name: "TABLE_CAT", sea_field: Some("catalogName"), transform: identity_string, sql_type: "string" },
    ResultColumn { canonical_name: "TABLE_SCHEM", sea_field: Some("namespace"), transform: identity_string, sql_type: "string" },
    ResultColumn { canonical_name: "TABLE_NAME", sea_field: Some("tableName"), transform: identity_string, sql_type: "string" },
    ResultColumn { canonical_name: "COLUMN_NAME", sea_field: Some("col_name"), transform: identity_string, sql_type: "string" },
    ResultColumn { canonical_name: "DATA_TYPE", sea_field: Some("columnType"), transform: transform_data_type, sql_type: "int" },
    ResultColumn { canonical_name: "TYPE_NAME", sea_field: Some("columnType"), transform: identity_string, sql_type: "string" },
    ResultColumn { canonical_name: "COLUMN_SIZE", sea_field: Some("columnSize"), transform: identity_int, sql_type: "int" },
    ResultColumn { canonical_name: "BUFFER_LENGTH", sea_field: None, transform: always_null, sql_type: "int" },
    ResultColumn { canonical_name: "DECIMAL_DIGITS", sea_field: Some("decimalDigits"), transform: identity_int, sql_type: "int" },
    ResultColumn { canonical_name: "NUM_PREC_RADIX", sea_field: Some("radix"), transform: identity_int, sql_type: "int" },
    ResultColumn { canonical_name: "NULLABLE", sea_field: Some("isNullable"), transform: transform_nullable_to_int, sql_type: "int" },
    ResultColumn { canonical_name: "REMARKS", sea_field: Some("remarks"), transform: transform_remarks, sql_type: "string" },
    ResultColumn { canonical_name: "COLUMN_DEF", sea_field: None, transform: always_null, sql_type: "string" },
    ResultColumn { canonical_name: "SQL_DATA_TYPE", sea_field: None, transform: always_null, sql_type: "int" },
    ResultColumn { canonical_name: "SQL_DATETIME_SUB", sea_field: None, transform: always_null, sql_type: "int" },
    ResultColumn { canonical_name: "CHAR_OCTET_LENGTH", sea_field: None, transform: always_null, sql_type: "int" },
    ResultColumn { canonical_name: "ORDINAL_POSITION", sea_field: Some("ordinalPosition"), transform: transform_ordinal_position, sql_type: "int" },
    ResultColumn { canonical_name: "IS_NULLABLE", sea_field: Some("isNullable"), transform: transform_is_nullable, sql_type: "string" },
    ResultColumn { canonical_name: "SCOPE_CATALOG", sea_field: None, transform: always_null, sql_type: "string" },
    ResultColumn { canonical_name: "SCOPE_SCHEMA", sea_field: None, transform: always_null, sql_type: "string" },
    ResultColumn { canonical_name: "SCOPE_TABLE", sea_field: None, transform: always_null, sql_type: "string" },
    ResultColumn { canonical_name: "SOURCE_DATA_TYPE", sea_field: None, transform: always_null, sql_type: "int" },
    ResultColumn { canonical_name: "IS_AUTO_INCREMENT", sea_field: None, transform: always_null, sql_type: "string" },
];

/// Renames a single SEA row (a JSON object keyed by SEA field names) to a canonical row,
/// producing one [`Value`] per entry of `columns`, in order.
#[must_use]
pub fn rename_row(columns: &[ResultColumn], source: &Json) -> Vec<Value> {
    columns
        .iter()
        .map(|col| {
            let field = col.sea_field.and_then(|name| source.get(name));
            (col.transform)(field)
        })
        .collect()
}

/// Normalizes a SEA primitive type spelling to the canonical one used across both backends
/// (`byte -> tinyint`, `short -> smallint`, `long -> bigint`, interval handling).
#[must_use]
pub fn normalize_type_name(sea_type: &str, interval_type: Option<&str>) -> String {
    match sea_type {
        "byte" => "tinyint".to_string(),
        "short" => "smallint".to_string(),
        "long" => "bigint".to_string(),
        "interval" => match interval_type {
            Some(unit) if unit.contains("YEAR") || unit.contains("MONTH") => "interval_year_month".to_string(),
            Some(unit) if unit.contains("DAY") || unit.contains("HOUR") || unit.contains("MINUTE") || unit.contains("SECOND") => {
                "interval_day_time".to_string()
            }
            // Open question: exact mapping is ambiguous when `type_interval_type` is
            // missing. Emit the raw type string and let the caller log a warning.
            _ => "interval".to_string(),
        },
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn catalog_row_renames_single_field() {
        let source = json!({"catalog": "main"});
        let row = rename_row(CATALOG_COLUMNS, &source);
        assert_eq!(row, vec![Value::String("main".to_string())]);
    }

    #[test]
    fn table_row_fills_absent_fields_with_null() {
        let source = json!({"catalogName": "c", "namespace": "s", "tableName": "t", "tableType": "VIEW"});
        let row = rename_row(TABLE_COLUMNS, &source);
        assert_eq!(row[0], Value::String("c".to_string()));
        assert_eq!(row[3], Value::String("VIEW".to_string()));
        assert_eq!(row[5], Value::Null); // TYPE_CAT
    }

    #[test]
    fn empty_table_type_defaults_to_table() {
        let source = json!({"tableType": ""});
        let row = rename_row(TABLE_COLUMNS, &source);
        assert_eq!(row[3], Value::String("TABLE".to_string()));
    }

    #[test]
    fn normalize_byte_short_long() {
        assert_eq!(normalize_type_name("byte", None), "tinyint");
        assert_eq!(normalize_type_name("short", None), "smallint");
        assert_eq!(normalize_type_name("long", None), "bigint");
    }

    #[test]
    fn normalize_interval_with_missing_unit_falls_back_to_raw() {
        assert_eq!(normalize_type_name("interval", None), "interval");
    }

    #[test]
    fn normalize_interval_year_month() {
        assert_eq!(normalize_type_name("interval", Some("YEAR")), "interval_year_month");
    }
}

//! L5 Parameter & query preparation.
//!
//! Grounded on `examples/original_source/.../parameters/{choose,inline,_types}.py`:
//! `prepare_parameters_and_statement` picks a paradigm, `transform_paramstyle` rewrites
//! `%(name)s` to `:name` for native mode, and `ParamEscaper` is the inline literal-escaping
//! table.

use crate::error::Error;
use crate::model::Value;

/// One of the three parameter "paradigms".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paradigm {
    None,
    Inline,
    Native,
}

/// Selects a paradigm from server capability, the `use_inline_params` option, and whether any
/// parameters were supplied.
#[must_use]
pub fn choose_paradigm(server_supports_native: bool, use_inline_params: bool, has_parameters: bool) -> Paradigm {
    if !has_parameters {
        return Paradigm::None;
    }
    if use_inline_params || !server_supports_native {
        Paradigm::Inline
    } else {
        Paradigm::Native
    }
}

/// A bound parameter as it travels to the backend client. Only
/// native mode carries these onward to the wire; inline mode consumes them into literal SQL
/// text and sends an empty list.
#[derive(Debug, Clone)]
pub struct BoundParameter {
    pub name: Option<String>,
    pub position: Option<usize>,
    pub type_tag: String,
    pub value: Value,
}

/// Type inference for untyped native parameters: a total function over supported value types.
#[must_use]
pub fn infer_type_tag(value: &Value) -> &'static str {
    value.type_tag()
}

/// Rewrites `%(name)s` markers to `:name` so legacy call sites keep working in native mode.
/// A no-op when the SQL text has no such markers.
#[must_use]
pub fn rewrite_pyformat_to_named(sql: &str) -> String {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && bytes.get(i + 1) == Some(&b'(') {
            if let Some(close) = sql[i + 2..].find(")s") {
                let name = &sql[i + 2..i + 2 + close];
                if !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                    out.push(':');
                    out.push_str(name);
                    i += 2 + close + 2;
                    continue;
                }
            }
        }
        let ch = sql[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

/// Escapes a value into a literal SQL fragment for inline mode. Strings double backslashes then single-quotes; temporal values render in
/// ISO format; `NULL` stands in for absent values; sequences become a parenthesized comma list.
pub fn escape_inline_literal(value: &Value) -> Result<String, Error> {
    Ok(match value {
        Value::Null => "NULL".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::TinyInt(n) => n.to_string(),
        Value::SmallInt(n) => n.to_string(),
        Value::Int(n) => n.to_string(),
        Value::BigInt(n) => n.to_string(),
        Value::Float(n) => n.to_string(),
        Value::Double(n) => n.to_string(),
        Value::Decimal { unscaled, .. } => unscaled.clone(),
        Value::String(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        Value::Binary(bytes) => format!("X'{}'", hex::encode(bytes)),
        Value::Date(d) => format!("'{}'", d.format("%Y-%m-%d")),
        Value::TimestampNaive(dt) => format!("'{}'", dt.format("%Y-%m-%d %H:%M:%S%.f")),
        Value::TimestampAware(dt) => format!("'{}'", dt.format("%Y-%m-%d %H:%M:%S%.f")),
    })
}

/// Substitutes escaped values into `%(name)s`/`%s` markers client-side, mirroring
/// `inject_parameters`'s plain string substitution.
pub fn prepare_inline_statement(sql: &str, named: &[(String, Value)]) -> Result<String, Error> {
    let mut rendered = sql.to_string();
    for (name, value) in named {
        let marker = format!("%({name})s");
        let literal = escape_inline_literal(value)?;
        rendered = rendered.replace(&marker, &literal);
    }
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Value;

    #[test]
    fn paradigm_selection_prefers_native_when_supported() {
        assert_eq!(choose_paradigm(true, false, true), Paradigm::Native);
        assert_eq!(choose_paradigm(true, true, true), Paradigm::Inline);
        assert_eq!(choose_paradigm(false, false, true), Paradigm::Inline);
        assert_eq!(choose_paradigm(true, false, false), Paradigm::None);
    }

    #[test]
    fn rewrite_pyformat_markers() {
        let sql = "SELECT * FROM t WHERE a = %(a)s AND b = %(b)s";
        assert_eq!(rewrite_pyformat_to_named(sql), "SELECT * FROM t WHERE a = :a AND b = :b");
    }

    #[test]
    fn rewrite_is_noop_without_markers() {
        assert_eq!(rewrite_pyformat_to_named("SELECT 1"), "SELECT 1");
    }

    #[test]
    fn escape_string_doubles_backslash_and_quote() {
        let literal = escape_inline_literal(&Value::String("O'Brien\\".to_string())).unwrap();
        assert_eq!(literal, "'O\\'Brien\\\\'");
    }

    #[test]
    fn escape_null_renders_null_keyword() {
        assert_eq!(escape_inline_literal(&Value::Null).unwrap(), "NULL");
    }

    #[test]
    fn prepare_inline_statement_substitutes_named_markers() {
        let sql = "SELECT %(p)s";
        let rendered = prepare_inline_statement(sql, &[("p".to_string(), Value::String("foo".to_string()))]).unwrap();
        assert!(rendered.contains("'foo'"));
    }
}

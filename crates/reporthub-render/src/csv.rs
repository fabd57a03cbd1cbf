//! Tabular CSV conversion of report bodies.
//!
//! A body is tabular when it carries a non-empty `data` array whose first
//! element is an object. The header row is that object's keys; later rows
//! missing a key get an empty cell.

use serde_json::{Map, Value};

/// Byte-order mark written ahead of CSV with Arabic content so spreadsheet
/// tools pick UTF-8.
pub const UTF8_BOM: &str = "\u{feff}";

/// Rows of the body's `data` array, if the body is tabular.
pub fn tabular_rows(body: &Value) -> Option<&Vec<Value>> {
    let rows = body.get("data")?.as_array()?;
    match rows.first() {
        Some(Value::Object(_)) => Some(rows),
        _ => None,
    }
}

/// Convert a tabular body to CSV text. Returns `None` for non-tabular bodies.
pub fn to_csv(body: &Value) -> Option<String> {
    let rows = tabular_rows(body)?;
    let headers: Vec<&String> = rows.first()?.as_object()?.keys().collect();

    let mut out = String::new();
    push_line(&mut out, headers.iter().map(|h| escape_field(h)));

    let empty = Map::new();
    for row in rows {
        let object = row.as_object().unwrap_or(&empty);
        push_line(
            &mut out,
            headers
                .iter()
                .map(|h| object.get(h.as_str()).map(cell).unwrap_or_default()),
        );
    }
    Some(out)
}

fn push_line(out: &mut String, fields: impl Iterator<Item = String>) {
    let line: Vec<String> = fields.collect();
    out.push_str(&line.join(","));
    out.push('\n');
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => escape_field(s),
        nested => escape_field(&nested.to_string()),
    }
}

fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

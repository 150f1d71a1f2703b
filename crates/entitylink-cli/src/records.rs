//! Line-delimited JSON record source: the illustrative input adapter this
//! binary exists to drive. Real file/CSV/JDBC adapters are an explicit
//! Non-goal of the core — this is just enough to make the workspace
//! runnable end to end.
//!
//! Each line is a JSON object:
//! ```json
//! {"id": "r1", "fields": {"name": ["John Smith"], "ssn": "111-11-1111"}}
//! ```
//! A field's value may be a single string or an array of strings; empty
//! strings are dropped by [`entitylink_core::model::Record::push`].

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use entitylink_core::model::Record;
use serde_json::Value;

/// Read every non-blank line of `path` as one `(id, Record)` pair.
pub fn read_jsonl(path: &Path) -> Result<Vec<(String, Record)>> {
    let file = File::open(path).with_context(|| format!("opening record source {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading {} line {}", path.display(), line_no + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(parse_line(&line).with_context(|| format!("{} line {}", path.display(), line_no + 1))?);
    }
    Ok(records)
}

fn parse_line(line: &str) -> Result<(String, Record)> {
    let value: Value = serde_json::from_str(line)?;
    let id = value
        .get("id")
        .and_then(Value::as_str)
        .context("record is missing a string \"id\" field")?
        .to_string();

    let fields = value
        .get("fields")
        .and_then(Value::as_object)
        .context("record is missing a \"fields\" object")?;

    let mut record = Record::new();
    for (name, field_value) in fields {
        match field_value {
            Value::String(s) => {
                record.push(name.clone(), s.clone());
            }
            Value::Array(values) => {
                for v in values {
                    if let Some(s) = v.as_str() {
                        record.push(name.clone(), s.to_string());
                    }
                }
            }
            Value::Null => {}
            other => anyhow::bail!("field \"{name}\" must be a string or array of strings, got {other}"),
        }
    }
    Ok((id, record))
}

/// Find the id a previously-read record was stored under, by value
/// equality. Linear in the batch size — acceptable for an example binary
/// that isn't the indexed identity lookup path itself.
pub fn id_of<'a>(records: &'a [(String, Record)], needle: &Record) -> Option<&'a str> {
    records.iter().find(|(_, r)| r == needle).map(|(id, _)| id.as_str())
}

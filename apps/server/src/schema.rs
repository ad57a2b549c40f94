//! Table shape sampling.
//!
//! Reads one row per table and records each column with the JSON type of
//! its sampled value. Empty tables yield no columns.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bazaar_backend::{DataApi, Query};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

pub const SCHEMA_FILE: &str = "schema.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnShape {
    pub column: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableShape {
    pub columns: Vec<ColumnShape>,
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::String(_) => "string",
        Value::Number(_) => "number",
        Value::Bool(_) => "boolean",
        Value::Null | Value::Array(_) | Value::Object(_) => "object",
    }
}

pub fn shape_of(row: Option<&Value>) -> TableShape {
    let columns = match row {
        Some(Value::Object(fields)) => fields
            .iter()
            .map(|(column, value)| ColumnShape {
                column: column.clone(),
                kind: json_kind(value),
            })
            .collect(),
        _ => Vec::new(),
    };
    TableShape { columns }
}

/// Sample every table. Tables that fail to load are logged and left out.
pub async fn sample_tables<D>(data: &D, tables: &[String]) -> BTreeMap<String, TableShape>
where
    D: DataApi + ?Sized,
{
    let mut schema = BTreeMap::new();
    for table in tables {
        match data.select(&Query::from(table.as_str()).limit(1)).await {
            Ok(rows) => {
                schema.insert(table.clone(), shape_of(rows.first()));
            }
            Err(err) => error!(table = %table, error = %err, "failed to sample table"),
        }
    }
    schema
}

/// Write the sampled shapes to `{out_dir}/schema.json`, creating the directory.
pub fn write_schema(out_dir: &Path, schema: &BTreeMap<String, TableShape>) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    let path = out_dir.join(SCHEMA_FILE);
    let body = serde_json::to_string_pretty(schema).context("failed to encode schema")?;
    fs::write(&path, body).with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), tables = schema.len(), "schema written");
    Ok(path)
}

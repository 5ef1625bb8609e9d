use anyhow::{bail, ensure, Context as _, Result};
use serde_json::Value;

use super::record::Record;

/// Parses a backup file. The payload has to be a JSON array whose first
/// element carries a truthy `id` and an `amount`; the rest is checked by the
/// record deserializer.
pub fn parse_backup(content: &[u8]) -> Result<Vec<Record>> {
    let value: Value = serde_json::from_slice(content).context("Backup is not valid JSON")?;
    let Value::Array(entries) = &value else {
        bail!("Backup must contain a list of records");
    };
    if let Some(first) = entries.first() {
        ensure!(
            first.get("id").map(is_truthy).unwrap_or(false),
            "Backup records must have an id"
        );
        ensure!(
            first.get("amount").is_some(),
            "Backup records must have an amount"
        );
    }
    serde_json::from_value(value).context("Backup contains malformed records")
}

pub fn render_backup(records: &[Record]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(records)?)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(value) => *value,
        Value::Number(number) => number.as_f64().map(|n| n != 0.0).unwrap_or(true),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

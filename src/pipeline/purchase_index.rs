//! Purchase index builder
//!
//! Reads the purchase log: one header line that is always skipped, then one
//! JSON object per line carrying at least `user_id` and `category`. Blank lines
//! are ignored. The first malformed line aborts the build.

use crate::constants::{CATEGORY_FIELD, USER_ID_FIELD};
use crate::error::{FunnelError, Result};
use crate::metrics::FunnelMetrics;
use crate::types::{PurchaseIndex, PurchaseRecord};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Open `path` and build the purchase index from it
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_purchase_index(path: &Path) -> Result<PurchaseIndex> {
    if !path.exists() {
        return Err(FunnelError::SourceNotFound { path: path.to_path_buf() });
    }
    let file = File::open(path)?;
    let index = build_index(BufReader::new(file))?;
    info!(entries = index.len(), "Purchase index built");
    Ok(index)
}

/// Build the purchase index from any buffered reader
pub fn build_index<R: BufRead>(source: R) -> Result<PurchaseIndex> {
    let mut index = PurchaseIndex::default();
    let mut parsed = 0usize;

    // Line 1 is the header and is skipped whatever it holds
    for (offset, line) in source.lines().enumerate().skip(1) {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record = parse_record(trimmed, offset + 1)?;
        index.insert(record);
        parsed += 1;
    }

    debug!(lines = parsed, entries = index.len(), "Parsed purchase log");
    FunnelMetrics::record_index_built(parsed, index.len());
    Ok(index)
}

fn parse_record(line: &str, line_no: usize) -> Result<PurchaseRecord> {
    let value: Value = serde_json::from_str(line).map_err(|e| FunnelError::MalformedRecord {
        line: line_no,
        reason: format!("invalid JSON: {}", e),
    })?;

    let object = value.as_object().ok_or_else(|| FunnelError::MalformedRecord {
        line: line_no,
        reason: "expected a JSON object".to_string(),
    })?;

    let field = |name: &str| -> Result<String> {
        match object.get(name) {
            Some(Value::Null) | None => Err(FunnelError::MalformedRecord {
                line: line_no,
                reason: format!("missing field `{}`", name),
            }),
            Some(v) => Ok(stringify(v)),
        }
    };

    Ok(PurchaseRecord {
        user_id: field(USER_ID_FIELD)?,
        category: field(CATEGORY_FIELD)?,
    })
}

/// Strings are taken verbatim; other values use their JSON text
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

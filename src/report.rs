//! Rendering of run results for the command line

use crate::pipeline::{RunFailure, RunReport};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

pub fn render_success(report: &RunReport, format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Text => {
            let mut lines = vec![format!(
                "[OK] Wrote {} rows to: {}",
                report.funnel.rows_written,
                report.output.display()
            )];
            match &report.funnel.first_row {
                Some(row) => lines.push(format!("[Example] {}", row)),
                None => lines.push("[Info] No matches found; output contains only the header.".to_string()),
            }
            Ok(lines.join("\n"))
        }
        OutputFormat::Json => serde_json::to_string_pretty(report),
    }
}

pub fn render_failure(failure: &RunFailure, format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Text => Ok(format!("[ERROR] {}", failure)),
        OutputFormat::Json => serde_json::to_string_pretty(&json!({
            "phase": failure.phase,
            "kind": failure.error.kind(),
            "error": failure.error.to_string(),
        })),
    }
}

pub mod funnel;
pub mod purchase_index;

pub use funnel::{build_funnel, stream_funnel, ColumnLayout, FunnelSummary};
pub use purchase_index::{build_index, load_purchase_index};

use crate::config::Config;
use crate::error::FunnelError;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tracing::{error, info, instrument};

/// Phase of a run, used to say which step failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    LoadPurchases,
    BuildFunnel,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::LoadPurchases => f.write_str("load purchases"),
            Phase::BuildFunnel => f.write_str("build funnel"),
        }
    }
}

/// Result of a complete run
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub purchase_log: PathBuf,
    pub visit_log: PathBuf,
    pub output: PathBuf,
    pub index_entries: usize,
    pub funnel: FunnelSummary,
}

#[derive(Debug, thiserror::Error)]
#[error("Failed to {phase}: {error}")]
pub struct RunFailure {
    pub phase: Phase,
    #[source]
    pub error: FunnelError,
}

pub struct Pipeline;

impl Pipeline {
    /// Load the purchase index, then stream the visit log into the funnel file
    #[instrument(skip_all)]
    pub fn run(config: &Config) -> Result<RunReport, RunFailure> {
        let index = load_purchase_index(&config.purchase_log_path).map_err(|error| {
            error!("Purchase index failed: {}", error);
            RunFailure { phase: Phase::LoadPurchases, error }
        })?;

        let funnel = build_funnel(&config.visit_log_path, &index, &config.output_path).map_err(|error| {
            error!("Funnel build failed: {}", error);
            RunFailure { phase: Phase::BuildFunnel, error }
        })?;

        info!(entries = index.len(), rows = funnel.rows_written, "Run finished");
        Ok(RunReport {
            purchase_log: config.purchase_log_path.clone(),
            visit_log: config.visit_log_path.clone(),
            output: config.output_path.clone(),
            index_entries: index.len(),
            funnel,
        })
    }
}

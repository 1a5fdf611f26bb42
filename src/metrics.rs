//! Funnel run metrics
//!
//! Counters are recorded through the `metrics` facade. Without an installed
//! recorder every call is a no-op. The binary installs a Prometheus recorder
//! when a metrics file is configured and writes the text exposition there when
//! the run ends, for a node_exporter textfile collector or a Pushgateway job to
//! pick up.

use crate::error::{FunnelError, Result};
use ::metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Once;

static REGISTER: Once = Once::new();

/// Build a metric name of the form `funnel_<phase>_<name>[_total]`
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("funnel_", $phase, "_", $name, "_total")
    };
    (gauge, $phase:literal, $name:literal) => {
        concat!("funnel_", $phase, "_", $name)
    };
}

pub struct FunnelMetrics;

impl FunnelMetrics {
    /// Describe every metric once per process
    pub fn register() {
        REGISTER.call_once(|| {
            describe_counter!(
                phase_metric!(counter, "purchases", "lines_parsed"),
                "Purchase log lines parsed into records"
            );
            describe_gauge!(
                phase_metric!(gauge, "purchases", "index_entries"),
                "Distinct user ids held in the purchase index"
            );
            describe_counter!(
                phase_metric!(counter, "visits", "rows_read"),
                "Visit rows read after the header"
            );
            describe_counter!(
                phase_metric!(counter, "visits", "rows_written"),
                "Funnel rows written to the output"
            );
            describe_counter!(
                phase_metric!(counter, "visits", "rows_skipped"),
                "Visit rows skipped as empty or short"
            );
            describe_counter!(
                phase_metric!(counter, "visits", "rows_unmatched"),
                "Visit rows without a purchase category"
            );
        });
    }

    pub fn record_index_built(lines_parsed: usize, entries: usize) {
        counter!(phase_metric!(counter, "purchases", "lines_parsed")).increment(lines_parsed as u64);
        gauge!(phase_metric!(gauge, "purchases", "index_entries")).set(entries as f64);
    }

    pub fn record_stream_finished(read: usize, written: usize, skipped: usize, unmatched: usize) {
        counter!(phase_metric!(counter, "visits", "rows_read")).increment(read as u64);
        counter!(phase_metric!(counter, "visits", "rows_written")).increment(written as u64);
        counter!(phase_metric!(counter, "visits", "rows_skipped")).increment(skipped as u64);
        counter!(phase_metric!(counter, "visits", "rows_unmatched")).increment(unmatched as u64);
    }
}

/// Prometheus recorder whose contents are written to a file on demand
pub struct MetricsSnapshot {
    handle: PrometheusHandle,
    path: PathBuf,
}

impl MetricsSnapshot {
    /// Install a Prometheus recorder as the process-wide recorder
    pub fn install(path: &Path) -> Result<Self> {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        ::metrics::set_global_recorder(recorder)
            .map_err(|_| FunnelError::Config("a metrics recorder is already installed".to_string()))?;
        Ok(Self::from_handle(handle, path))
    }

    pub fn from_handle(handle: PrometheusHandle, path: &Path) -> Self {
        Self { handle, path: path.to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Render every recorded metric to the snapshot file
    pub fn write(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, self.handle.render())?;
        Ok(())
    }
}

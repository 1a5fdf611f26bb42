use crate::constants::{DEFAULT_OUTPUT, DEFAULT_PURCHASE_LOG, DEFAULT_VISIT_LOG};
use crate::error::{FunnelError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Paths for one run, fully resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub purchase_log_path: PathBuf,
    pub visit_log_path: PathBuf,
    pub output_path: PathBuf,
    /// Directory for rotated JSON logs; console logging only when unset
    pub log_dir: Option<PathBuf>,
    /// Prometheus text file written when the run ends
    pub metrics_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            purchase_log_path: PathBuf::from(DEFAULT_PURCHASE_LOG),
            visit_log_path: PathBuf::from(DEFAULT_VISIT_LOG),
            output_path: PathBuf::from(DEFAULT_OUTPUT),
            log_dir: None,
            metrics_file: None,
        }
    }
}

/// Optional TOML config file
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub purchase_log: Option<PathBuf>,
    pub visit_log: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub metrics_file: Option<PathBuf>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            FunnelError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        let config: FileConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Values given on the command line or through the environment
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub purchase_log: Option<PathBuf>,
    pub visit_log: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub metrics_file: Option<PathBuf>,
}

impl Config {
    /// Overrides win over the file, the file wins over the defaults
    pub fn resolve(overrides: Overrides, file: Option<FileConfig>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Config::default();
        Self {
            purchase_log_path: overrides
                .purchase_log
                .or(file.purchase_log)
                .unwrap_or(defaults.purchase_log_path),
            visit_log_path: overrides
                .visit_log
                .or(file.visit_log)
                .unwrap_or(defaults.visit_log_path),
            output_path: overrides.output.or(file.output).unwrap_or(defaults.output_path),
            log_dir: overrides.log_dir.or(file.log_dir),
            metrics_file: overrides.metrics_file.or(file.metrics_file),
        }
    }

    /// Resolve with the config file at `config_path`, when one is named
    pub fn load(overrides: Overrides, config_path: Option<&Path>) -> Result<Self> {
        let file = config_path.map(FileConfig::load).transpose()?;
        Ok(Self::resolve(overrides, file))
    }
}

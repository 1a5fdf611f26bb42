use clap::Parser;
use purchase_funnel::config::{Config, Overrides};
use purchase_funnel::constants;
use purchase_funnel::logging;
use purchase_funnel::metrics::{FunnelMetrics, MetricsSnapshot};
use purchase_funnel::report::{self, OutputFormat};
use purchase_funnel::Pipeline;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, warn};

#[derive(Parser)]
#[command(name = "purchase_funnel")]
#[command(about = "Join a purchase log with a visit log into a funnel CSV")]
#[command(version)]
struct Cli {
    /// Purchase log: a header line, then one JSON object per line [default: purchase_log.txt]
    #[arg(long, env = constants::ENV_PURCHASE_LOG)]
    purchase_log: Option<PathBuf>,

    /// Visit log CSV with a `user_id,source` header [default: visit_log.csv]
    #[arg(long, env = constants::ENV_VISIT_LOG)]
    visit_log: Option<PathBuf>,

    /// Where to write the funnel CSV [default: funnel.csv]
    #[arg(long, env = constants::ENV_OUTPUT)]
    output: Option<PathBuf>,

    /// Optional TOML file providing any of the paths above
    #[arg(long, env = constants::ENV_CONFIG)]
    config: Option<PathBuf>,

    /// Directory for daily-rotated JSON logs
    #[arg(long, env = constants::ENV_LOG_DIR)]
    log_dir: Option<PathBuf>,

    /// Write a Prometheus text snapshot of the run's metrics to this file
    #[arg(long, env = constants::ENV_METRICS_FILE)]
    metrics_file: Option<PathBuf>,

    /// Summary format printed on stdout
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let overrides = Overrides {
        purchase_log: cli.purchase_log,
        visit_log: cli.visit_log,
        output: cli.output,
        log_dir: cli.log_dir,
        metrics_file: cli.metrics_file,
    };
    let config = match Config::load(overrides, cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("[ERROR] {}", e);
            return ExitCode::from(2);
        }
    };

    let _guard = match logging::init_logging(config.log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("[ERROR] Failed to initialize logging: {:#}", e);
            return ExitCode::from(2);
        }
    };
    let snapshot = match config.metrics_file.as_deref().map(MetricsSnapshot::install).transpose() {
        Ok(snapshot) => snapshot,
        Err(e) => {
            eprintln!("[ERROR] Failed to initialize metrics: {}", e);
            return ExitCode::from(2);
        }
    };
    FunnelMetrics::register();

    let (rendered, code) = match Pipeline::run(&config) {
        Ok(report) => (report::render_success(&report, cli.format), ExitCode::SUCCESS),
        Err(failure) => (report::render_failure(&failure, cli.format), ExitCode::from(1)),
    };

    if let Some(snapshot) = &snapshot {
        if let Err(e) = snapshot.write() {
            warn!("Failed to write metrics to {}: {}", snapshot.path().display(), e);
        }
    }

    match rendered {
        Ok(text) => {
            println!("{}", text);
            code
        }
        Err(e) => {
            error!("Failed to render summary: {}", e);
            ExitCode::from(1)
        }
    }
}

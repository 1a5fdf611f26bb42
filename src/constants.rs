/// Default input/output file names, resolved against the working directory
pub const DEFAULT_PURCHASE_LOG: &str = "purchase_log.txt";
pub const DEFAULT_VISIT_LOG: &str = "visit_log.csv";
pub const DEFAULT_OUTPUT: &str = "funnel.csv";

// Field and column names shared by both inputs
pub const USER_ID_FIELD: &str = "user_id";
pub const CATEGORY_FIELD: &str = "category";
pub const SOURCE_COLUMN: &str = "source";

/// Header row written to every funnel file
pub const FUNNEL_HEADER: [&str; 3] = [USER_ID_FIELD, SOURCE_COLUMN, CATEGORY_FIELD];

// Environment variables read by the CLI
pub const ENV_CONFIG: &str = "FUNNEL_CONFIG";
pub const ENV_PURCHASE_LOG: &str = "FUNNEL_PURCHASE_LOG";
pub const ENV_VISIT_LOG: &str = "FUNNEL_VISIT_LOG";
pub const ENV_OUTPUT: &str = "FUNNEL_OUTPUT";
pub const ENV_LOG_DIR: &str = "FUNNEL_LOG_DIR";
pub const ENV_METRICS_FILE: &str = "FUNNEL_METRICS_FILE";

/// Default tracing directive when RUST_LOG is unset
pub const DEFAULT_LOG_DIRECTIVE: &str = "purchase_funnel=info";
pub const LOG_FILE_PREFIX: &str = "funnel.log";

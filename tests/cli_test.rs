use anyhow::Result;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

const PURCHASES: &str = "user_id,category\n{\"user_id\":\"u1\",\"category\":\"Groceries\"}\n";
const VISITS: &str = "user_id,source\nu1,ads\nu2,email\n";
const FUNNEL: &str = "user_id,source,category\nu1,ads,Groceries\n";

/// The binary run from `dir` with no inherited FUNNEL_* settings
fn funnel_command(dir: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_purchase_funnel"));
    command.current_dir(dir).env("RUST_LOG", "off");
    for var in [
        "FUNNEL_CONFIG",
        "FUNNEL_PURCHASE_LOG",
        "FUNNEL_VISIT_LOG",
        "FUNNEL_OUTPUT",
        "FUNNEL_LOG_DIR",
        "FUNNEL_METRICS_FILE",
    ] {
        command.env_remove(var);
    }
    command
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_default_paths_in_working_directory() -> Result<()> {
    let temp_dir = tempdir()?;
    fs::write(temp_dir.path().join("purchase_log.txt"), PURCHASES)?;
    fs::write(temp_dir.path().join("visit_log.csv"), VISITS)?;

    let output = funnel_command(temp_dir.path()).output()?;

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(
        stdout(&output),
        "[OK] Wrote 1 rows to: funnel.csv\n[Example] u1,ads,Groceries\n"
    );
    assert_eq!(fs::read_to_string(temp_dir.path().join("funnel.csv"))?, FUNNEL);
    Ok(())
}

#[test]
fn test_flags_choose_the_paths() -> Result<()> {
    let temp_dir = tempdir()?;
    fs::write(temp_dir.path().join("purchases.ndjson"), PURCHASES)?;
    fs::write(temp_dir.path().join("visits.csv"), VISITS)?;

    let output = funnel_command(temp_dir.path())
        .args([
            "--purchase-log",
            "purchases.ndjson",
            "--visit-log",
            "visits.csv",
            "--output",
            "out/converted.csv",
        ])
        .output()?;

    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).starts_with("[OK] Wrote 1 rows to: out/converted.csv\n"));
    assert_eq!(fs::read_to_string(temp_dir.path().join("out/converted.csv"))?, FUNNEL);
    assert!(!temp_dir.path().join("funnel.csv").exists());
    Ok(())
}

#[test]
fn test_environment_variables_choose_the_paths() -> Result<()> {
    let temp_dir = tempdir()?;
    fs::write(temp_dir.path().join("p.txt"), PURCHASES)?;
    fs::write(temp_dir.path().join("v.csv"), VISITS)?;

    let output = funnel_command(temp_dir.path())
        .env("FUNNEL_PURCHASE_LOG", "p.txt")
        .env("FUNNEL_VISIT_LOG", "v.csv")
        .env("FUNNEL_OUTPUT", "f.csv")
        .output()?;

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(fs::read_to_string(temp_dir.path().join("f.csv"))?, FUNNEL);
    Ok(())
}

#[test]
fn test_config_file_supplies_paths_and_flags_win() -> Result<()> {
    let temp_dir = tempdir()?;
    fs::write(temp_dir.path().join("p.txt"), PURCHASES)?;
    fs::write(temp_dir.path().join("v.csv"), VISITS)?;
    fs::write(
        temp_dir.path().join("funnel.toml"),
        "purchase_log = \"p.txt\"\nvisit_log = \"v.csv\"\noutput = \"from_file.csv\"\n",
    )?;

    let output = funnel_command(temp_dir.path())
        .args(["--config", "funnel.toml", "--output", "from_flag.csv"])
        .output()?;

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(fs::read_to_string(temp_dir.path().join("from_flag.csv"))?, FUNNEL);
    assert!(!temp_dir.path().join("from_file.csv").exists());
    Ok(())
}

#[test]
fn test_no_matches_reports_header_only() -> Result<()> {
    let temp_dir = tempdir()?;
    fs::write(temp_dir.path().join("purchase_log.txt"), PURCHASES)?;
    fs::write(temp_dir.path().join("visit_log.csv"), "user_id,source\nu9,ads\n")?;

    let output = funnel_command(temp_dir.path()).output()?;

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(
        stdout(&output),
        "[OK] Wrote 0 rows to: funnel.csv\n[Info] No matches found; output contains only the header.\n"
    );
    Ok(())
}

#[test]
fn test_purchase_failure_exits_one() -> Result<()> {
    let temp_dir = tempdir()?;
    fs::write(
        temp_dir.path().join("purchase_log.txt"),
        "header\n{\"user_id\":\"u1\",\"category\":\"A\"}\n{broken\n",
    )?;
    fs::write(temp_dir.path().join("visit_log.csv"), VISITS)?;

    let output = funnel_command(temp_dir.path()).output()?;

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).starts_with("[ERROR] Failed to load purchases: malformed record at line 3: "));
    assert!(!temp_dir.path().join("funnel.csv").exists());
    Ok(())
}

#[test]
fn test_missing_visit_log_exits_one() -> Result<()> {
    let temp_dir = tempdir()?;
    fs::write(temp_dir.path().join("purchase_log.txt"), PURCHASES)?;

    let output = funnel_command(temp_dir.path()).output()?;

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(
        stdout(&output),
        "[ERROR] Failed to build funnel: source not found: visit_log.csv\n"
    );
    Ok(())
}

#[test]
fn test_unreadable_config_exits_two() -> Result<()> {
    let temp_dir = tempdir()?;
    fs::write(temp_dir.path().join("purchase_log.txt"), PURCHASES)?;
    fs::write(temp_dir.path().join("visit_log.csv"), VISITS)?;

    let output = funnel_command(temp_dir.path())
        .args(["--config", "missing.toml"])
        .output()?;

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("[ERROR] Configuration error"));
    assert!(stdout(&output).is_empty());
    assert!(!temp_dir.path().join("funnel.csv").exists());
    Ok(())
}

#[test]
fn test_json_format_and_metrics_snapshot() -> Result<()> {
    let temp_dir = tempdir()?;
    fs::write(temp_dir.path().join("purchase_log.txt"), PURCHASES)?;
    fs::write(temp_dir.path().join("visit_log.csv"), VISITS)?;

    let output = funnel_command(temp_dir.path())
        .args(["--format", "json", "--metrics-file", "metrics/funnel.prom"])
        .output()?;

    assert_eq!(output.status.code(), Some(0));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(report["index_entries"], 1);
    assert_eq!(report["funnel"]["rows_written"], 1);
    assert_eq!(report["funnel"]["first_row"]["category"], "Groceries");

    let metrics = fs::read_to_string(temp_dir.path().join("metrics/funnel.prom"))?;
    assert!(metrics.contains("funnel_visits_rows_written_total 1"));
    Ok(())
}

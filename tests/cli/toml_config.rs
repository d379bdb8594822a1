//! CLI TOML configuration tests
//!
//! Configuration values are applied first; the command line wins.

use clap::Parser;
use pcq::app::cli::args::*;
use std::io::Write;
use toml::Table;

#[test]
fn test_cli_overrides_toml() {
    let mut file_args = Args::default();
    let mut config = Table::new();
    config.insert("threads".to_string(), toml::Value::Integer(2));
    config.insert("work-ms".to_string(), toml::Value::Integer(80));
    config.insert("wait-on-dispose".to_string(), toml::Value::Boolean(false));
    Args::apply_toml_values(&mut file_args, &config).unwrap();

    let cli = Args::try_parse_from(["pcq", "--work-ms", "5"]).unwrap();
    let settings = file_args.merge(cli).resolve().unwrap();

    assert_eq!(settings.threads, Some(2));
    assert_eq!(settings.work.as_millis(), 5);
    assert!(!settings.wait_on_dispose);
}

#[test]
fn test_toml_threshold_reaches_settings() {
    let mut args = Args::default();
    let config: Table = toml::from_str("threshold-ms = 120\nmode = \"threshold-task-group\"").unwrap();
    Args::apply_toml_values(&mut args, &config).unwrap();

    let settings = args.resolve().unwrap();
    assert_eq!(settings.threshold.map(|t| t.as_millis()), Some(120));
}

#[tokio::test]
async fn test_config_file_round_trip_through_loader() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "items = 12\nlog-level = \"debug\"\nlog-file = \"-\"").unwrap();

    let (args, _) = Args::load_config_file(Some(file.path())).await.unwrap();
    assert_eq!(args.items, Some(12));
    assert_eq!(args.log_level.as_deref(), Some("debug"));
    assert_eq!(args.log_file, None);
}

#[tokio::test]
async fn test_invalid_config_value_names_the_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "background = \"yes\"").unwrap();

    let err = Args::load_config_file(Some(file.path())).await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("'background' must be true or false"), "got: {}", message);
    assert!(message.contains(&file.path().display().to_string()));
}

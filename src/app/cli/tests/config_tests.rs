//! Tests for TOML configuration loading

use crate::app::cli::args::{Args, ModeSelection};
use crate::queue::{QueueMode, ThreadPriority};
use std::io::Write;
use std::path::PathBuf;

fn apply(text: &str) -> Result<Args, String> {
    let config: toml::Table = toml::from_str(text).unwrap();
    let mut args = Args::default();
    Args::apply_toml_values(&mut args, &config).map_err(|e| e.to_string())?;
    Ok(args)
}

#[test]
fn test_apply_all_keys() {
    let args = apply(
        r#"
        mode = "pipeline"
        threads = 2
        items = 40
        work-ms = 15
        fail-every = 7
        name = "shared"
        posix = false
        threshold-ms = 300
        sleep-after-enqueue-ms = 2
        poll-interval-ms = 75
        wait-on-dispose = false
        priority = "highest"
        background = false
        color = true
        log-level = "warn"
        log-format = "ext"
        log-file = "/tmp/pcq.log"
        "#,
    )
    .unwrap();

    assert_eq!(args.mode, Some(ModeSelection::One(QueueMode::Pipeline)));
    assert_eq!(args.threads, Some(2));
    assert_eq!(args.items, Some(40));
    assert_eq!(args.work_ms, Some(15));
    assert_eq!(args.fail_every, Some(7));
    assert_eq!(args.name.as_deref(), Some("shared"));
    assert_eq!(args.posix, Some(false));
    assert_eq!(args.threshold_ms, Some(300));
    assert_eq!(args.sleep_after_enqueue_ms, Some(2));
    assert_eq!(args.poll_interval_ms, Some(75));
    assert_eq!(args.wait_on_dispose, Some(false));
    assert_eq!(args.priority, Some(ThreadPriority::Highest));
    assert_eq!(args.background, Some(false));
    assert_eq!(args.color, Some(true));
    assert_eq!(args.log_level.as_deref(), Some("warn"));
    assert_eq!(args.log_format.as_deref(), Some("ext"));
    assert_eq!(args.log_file, Some(PathBuf::from("/tmp/pcq.log")));
}

#[test]
fn test_log_file_none_disables_file_logging() {
    let args = apply(r#"log-file = "none""#).unwrap();
    assert_eq!(args.log_file, None);
}

#[test]
fn test_wrong_value_types_are_rejected() {
    assert_eq!(apply("threads = \"four\"").unwrap_err(), "'threads' must be a non-negative integer");
    assert_eq!(apply("items = -1").unwrap_err(), "'items' must be a non-negative integer");
    assert_eq!(apply("color = 1").unwrap_err(), "'color' must be true or false");
    assert_eq!(apply("name = 3").unwrap_err(), "'name' must be a string");
    assert_eq!(apply("threads = 0").unwrap_err(), "threads must be greater than 0");
}

#[test]
fn test_unknown_values_are_rejected() {
    assert!(apply(r#"mode = "lifo""#).unwrap_err().contains("unknown mode 'lifo'"));
    assert_eq!(apply(r#"priority = "urgent""#).unwrap_err(), "unknown priority 'urgent'");
}

#[test]
fn test_unknown_keys_are_ignored() {
    let args = apply("future-option = true").unwrap();
    assert_eq!(args, Args::default());
}

#[tokio::test]
async fn test_load_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "threads = 1\nmode = \"mutex\"").unwrap();

    let (args, raw) = Args::load_config_file(Some(file.path())).await.unwrap();
    assert_eq!(args.threads, Some(1));
    assert_eq!(args.mode, Some(ModeSelection::One(QueueMode::Mutex)));
    assert!(raw.unwrap().contains_key("mode"));
}

#[tokio::test]
async fn test_missing_explicit_config_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");

    let err = Args::load_config_file(Some(&missing)).await.unwrap_err();
    assert!(err.message().contains("does not exist"));
}

#[tokio::test]
async fn test_malformed_config_file_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "threads = [").unwrap();

    let err = Args::load_config_file(Some(file.path())).await.unwrap_err();
    assert!(err.message().starts_with("Error parsing configuration file"));
}

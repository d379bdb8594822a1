//! CLI argument parsing tests

use clap::Parser;
use pcq::app::cli::args::*;
use pcq::queue::QueueMode;
use std::time::Duration;

#[test]
fn test_single_mode_run_settings() {
    let args = Args::try_parse_from([
        "pcq",
        "--mode",
        "semaphore",
        "--threads",
        "1",
        "--items",
        "3",
        "--work-ms",
        "0",
        "--name",
        "cli-shared",
    ])
    .unwrap();

    let settings = args.resolve().unwrap();
    assert_eq!(settings.modes, vec![QueueMode::Semaphore]);
    assert_eq!(settings.threads, Some(1));
    assert_eq!(settings.items, 3);
    assert_eq!(settings.work, Duration::ZERO);
    assert_eq!(settings.name.as_deref(), Some("cli-shared"));
}

#[test]
fn test_all_modes_in_declaration_order() {
    let settings = Args::try_parse_from(["pcq", "--mode", "all"])
        .unwrap()
        .resolve()
        .unwrap();

    assert_eq!(settings.modes.first(), Some(&QueueMode::WorkerPool));
    assert_eq!(settings.modes.last(), Some(&QueueMode::Mutex));
    assert_eq!(settings.modes.len(), 7);
}

#[test]
fn test_help_and_version_are_reported_as_errors_by_try_parse() {
    let help = Args::try_parse_from(["pcq", "--help"]).unwrap_err();
    assert_eq!(help.kind(), clap::error::ErrorKind::DisplayHelp);
    assert!(help.to_string().contains("--threshold-ms"));

    let version = Args::try_parse_from(["pcq", "--version"]).unwrap_err();
    assert_eq!(version.kind(), clap::error::ErrorKind::DisplayVersion);
}

#[test]
fn test_unknown_option_rejected() {
    assert!(Args::try_parse_from(["pcq", "--repository", "."]).is_err());
}

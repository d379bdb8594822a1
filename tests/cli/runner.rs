//! Runner tests: parsed settings driving real queues

use clap::Parser;
use pcq::app::cli::args::Args;
use pcq::app::runner::{render_reports, run_mode};
use pcq::core::cancel::CancellationToken;
use pcq::queue::{queue_maximum, TaskResult};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_all_modes_from_cli() {
    let threads = 2.min(queue_maximum()).to_string();
    let args = Args::try_parse_from([
        "pcq",
        "--threads",
        threads.as_str(),
        "--items",
        "8",
        "--work-ms",
        "2",
        "--fail-every",
        "4",
        "--threshold-ms",
        "50",
    ])
    .unwrap();
    let settings = args.resolve().unwrap();
    let token = CancellationToken::new();

    let mut reports = Vec::new();
    for mode in &settings.modes {
        let report = run_mode(&settings, *mode, &token).await.unwrap();
        assert!(report.drained, "{} did not drain", mode);
        assert_eq!(report.count(TaskResult::Success), 6, "{}", mode);
        assert_eq!(report.count(TaskResult::Error), 2, "{}", mode);
        reports.push(report);
    }

    let table = render_reports(&reports, false);
    assert_eq!(table.len(), 7);
    assert!(table.to_string().contains("threshold-task-group"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancelled_run_reports_not_drained() {
    let args = Args::try_parse_from(["pcq", "-m", "worker-pool", "-t", "1", "-n", "50", "-w", "100"]).unwrap();
    let settings = args.resolve().unwrap();
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(150)).await;
        canceller.cancel();
    });

    let report = run_mode(&settings, settings.modes[0], &token).await.unwrap();
    assert!(!report.drained);
    assert!(report.count(TaskResult::Success) < 50);
}

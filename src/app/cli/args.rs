//! Command line arguments of the demo runner
//!
//! Every option is optional so that values from the configuration file
//! can fill the gaps; [`Args::resolve`] applies defaults and validation.

use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use strum::IntoEnumIterator;

use crate::core::validation::{validate_positive_int, ValidationError};
use crate::queue::{QueueMode, ThreadPriority};

/// Default number of synthetic items per run
pub const DEFAULT_ITEMS: usize = 32;

/// Default duration of one synthetic item
pub const DEFAULT_WORK_MS: u64 = 50;

/// Which strategies to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeSelection {
    All,
    One(QueueMode),
}

impl ModeSelection {
    pub fn modes(self) -> Vec<QueueMode> {
        match self {
            ModeSelection::All => QueueMode::iter().collect(),
            ModeSelection::One(mode) => vec![mode],
        }
    }
}

impl FromStr for ModeSelection {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("all") {
            return Ok(ModeSelection::All);
        }
        QueueMode::from_str(value).map(ModeSelection::One).map_err(|_| {
            let known: Vec<String> = QueueMode::iter().map(|m| m.to_string()).collect();
            format!("unknown mode '{}' (expected all, {})", value, known.join(", "))
        })
    }
}

#[derive(Parser, Debug, Clone, Default, PartialEq)]
#[command(name = "pcq")]
#[command(about = "Run synthetic work through producer/consumer queue strategies")]
#[command(version, long_version = crate::core::version::long_version())]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config-file", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Queue strategy, or 'all' to run each one in turn
    #[arg(short = 'm', long = "mode", value_name = "MODE")]
    pub mode: Option<ModeSelection>,

    /// Worker/permit count (default: logical CPUs, doubled with SMT)
    #[arg(short = 't', long = "threads", value_name = "COUNT", value_parser = validate_positive_int)]
    pub threads: Option<usize>,

    /// Number of synthetic items to enqueue
    #[arg(short = 'n', long = "items", value_name = "COUNT", value_parser = validate_positive_int)]
    pub items: Option<usize>,

    /// Duration of one item in milliseconds
    #[arg(short = 'w', long = "work-ms", value_name = "MS")]
    pub work_ms: Option<u64>,

    /// Fail every Nth item (0 disables)
    #[arg(long = "fail-every", value_name = "N")]
    pub fail_every: Option<usize>,

    /// Queue name; named semaphore and mutex queues share their primitive
    #[arg(short = 'N', long = "name", value_name = "NAME")]
    pub name: Option<String>,

    /// Use POSIX named semaphores so several processes share named primitives
    #[arg(long = "posix", value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    pub posix: Option<bool>,

    /// Partial batch flush threshold for threshold-task-group, in milliseconds
    #[arg(short = 'T', long = "threshold-ms", value_name = "MS", allow_negative_numbers = true)]
    pub threshold_ms: Option<i64>,

    /// Pause after every enqueue, in milliseconds
    #[arg(long = "sleep-after-enqueue-ms", value_name = "MS")]
    pub sleep_after_enqueue_ms: Option<u64>,

    /// Interval at which idle dispatchers re-check cancellation, in milliseconds
    #[arg(long = "poll-interval-ms", value_name = "MS")]
    pub poll_interval_ms: Option<u64>,

    /// Drain (true) or discard (false) pending items when a queue is dropped
    #[arg(long = "wait-on-dispose", value_name = "BOOL")]
    pub wait_on_dispose: Option<bool>,

    /// Dispatcher priority hint
    #[arg(long = "priority", value_name = "PRIORITY")]
    pub priority: Option<ThreadPriority>,

    /// Dispatcher background hint
    #[arg(long = "background", value_name = "BOOL")]
    pub background: Option<bool>,

    /// Color output control (default: auto-detect terminal)
    #[arg(short = 'g', long = "color", value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    pub color: Option<bool>,

    /// Log level
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error", "off"])]
    pub log_level: Option<String>,

    /// Log file path (use 'none' to disable file logging)
    #[arg(short = 'f', long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log output format
    #[arg(short = 'o', long = "log-format", value_name = "FORMAT", value_parser = ["text", "ext", "json"])]
    pub log_format: Option<String>,
}

/// Fully resolved settings of one runner invocation
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub modes: Vec<QueueMode>,
    pub threads: Option<usize>,
    pub items: usize,
    pub work: Duration,
    pub fail_every: usize,
    pub name: Option<String>,
    pub posix: bool,
    pub threshold: Option<Duration>,
    pub sleep_after_enqueue: Option<Duration>,
    pub poll_interval: Option<Duration>,
    pub wait_on_dispose: bool,
    pub priority: ThreadPriority,
    pub background: bool,
}

impl Args {
    /// Overlay `cli` on top of these (configuration file) values
    ///
    /// Anything given on the command line wins.
    pub fn merge(self, cli: Args) -> Args {
        Args {
            config_file: cli.config_file.or(self.config_file),
            mode: cli.mode.or(self.mode),
            threads: cli.threads.or(self.threads),
            items: cli.items.or(self.items),
            work_ms: cli.work_ms.or(self.work_ms),
            fail_every: cli.fail_every.or(self.fail_every),
            name: cli.name.or(self.name),
            posix: cli.posix.or(self.posix),
            threshold_ms: cli.threshold_ms.or(self.threshold_ms),
            sleep_after_enqueue_ms: cli.sleep_after_enqueue_ms.or(self.sleep_after_enqueue_ms),
            poll_interval_ms: cli.poll_interval_ms.or(self.poll_interval_ms),
            wait_on_dispose: cli.wait_on_dispose.or(self.wait_on_dispose),
            priority: cli.priority.or(self.priority),
            background: cli.background.or(self.background),
            color: cli.color.or(self.color),
            log_level: cli.log_level.or(self.log_level),
            log_file: cli.log_file.or(self.log_file),
            log_format: cli.log_format.or(self.log_format),
        }
    }

    /// Apply defaults and produce the settings for the runner
    pub fn resolve(&self) -> Result<RunSettings, ValidationError> {
        if self.posix == Some(true) && !cfg!(target_os = "linux") {
            return Err(ValidationError::new(
                "--posix named primitives are only available on Linux",
            ));
        }
        if let Some(0) = self.threads {
            return Err(ValidationError::new("threads must be greater than 0"));
        }

        Ok(RunSettings {
            modes: self.mode.unwrap_or(ModeSelection::All).modes(),
            threads: self.threads,
            items: self.items.unwrap_or(DEFAULT_ITEMS),
            work: Duration::from_millis(self.work_ms.unwrap_or(DEFAULT_WORK_MS)),
            fail_every: self.fail_every.unwrap_or(0),
            name: self.name.clone(),
            posix: self.posix.unwrap_or(false),
            threshold: self
                .threshold_ms
                .map(|ms| Duration::from_millis(ms.max(0) as u64))
                .filter(|threshold| !threshold.is_zero()),
            sleep_after_enqueue: self
                .sleep_after_enqueue_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
            poll_interval: self.poll_interval_ms.map(Duration::from_millis),
            wait_on_dispose: self.wait_on_dispose.unwrap_or(true),
            priority: self.priority.unwrap_or_default(),
            background: self.background.unwrap_or(true),
        })
    }

    /// Log file to use; the magic values `none` and `-` disable file logging
    pub fn effective_log_file(&self) -> Option<&PathBuf> {
        self.log_file.as_ref().filter(|path| {
            let text = path.to_string_lossy();
            !(text.eq_ignore_ascii_case("none") || text == "-")
        })
    }
}

//! TOML configuration file parsing and loading
//!
//! Keys mirror the long command line options (`threads`, `work-ms`,
//! `log-level`, ...). Values found in the file are overlaid by whatever is
//! given on the command line.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::core::validation::ValidationError;
use crate::queue::ThreadPriority;

use super::args::{Args, ModeSelection};

/// `<config dir>/Pcq/pcq.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("Pcq").join("pcq.toml"))
}

impl Args {
    /// Load the configuration file into a fresh `Args`
    ///
    /// An explicitly named file must exist; the default file is optional.
    /// Returns the raw table alongside so callers can inspect extra keys.
    pub async fn load_config_file(
        config_file: Option<&Path>,
    ) -> Result<(Args, Option<toml::Table>), ValidationError> {
        let path = match config_file {
            Some(path) => {
                if !path.exists() {
                    return Err(ValidationError::new(&format!(
                        "The specified configuration file does not exist: {}",
                        path.display()
                    )));
                }
                path.to_path_buf()
            }
            None => match default_config_path() {
                Some(path) if path.exists() => path,
                _ => return Ok((Args::default(), None)),
            },
        };

        let contents = tokio::fs::read_to_string(&path).await.map_err(|e| {
            ValidationError::new(&format!(
                "Error reading configuration file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config = toml::from_str::<toml::Table>(&contents).map_err(|e| {
            ValidationError::new(&format!(
                "Error parsing configuration file {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut args = Args::default();
        Self::apply_toml_values(&mut args, &config).map_err(|e| {
            ValidationError::new(&format!(
                "Error in configuration file {}: {}",
                path.display(),
                e
            ))
        })?;
        log::debug!("loaded configuration from {}", path.display());
        Ok((args, Some(config)))
    }

    /// Apply TOML configuration values to Args
    pub fn apply_toml_values(args: &mut Self, config: &toml::Table) -> Result<(), ValidationError> {
        if let Some(mode) = string_value(config, "mode")? {
            args.mode = Some(
                ModeSelection::from_str(mode).map_err(|e| ValidationError::new(&e))?,
            );
        }
        if let Some(threads) = count_value(config, "threads")? {
            if threads == 0 {
                return Err(ValidationError::new("threads must be greater than 0"));
            }
            args.threads = Some(threads);
        }
        if let Some(items) = count_value(config, "items")? {
            if items == 0 {
                return Err(ValidationError::new("items must be greater than 0"));
            }
            args.items = Some(items);
        }
        if let Some(work_ms) = count_value(config, "work-ms")? {
            args.work_ms = Some(work_ms as u64);
        }
        if let Some(fail_every) = count_value(config, "fail-every")? {
            args.fail_every = Some(fail_every);
        }
        if let Some(name) = string_value(config, "name")? {
            args.name = Some(name.to_string());
        }
        if let Some(posix) = bool_value(config, "posix")? {
            args.posix = Some(posix);
        }
        // Negative thresholds are accepted and mean "no threshold"
        if let Some(value) = config.get("threshold-ms") {
            let threshold = value
                .as_integer()
                .ok_or_else(|| wrong_type("threshold-ms", "an integer"))?;
            args.threshold_ms = Some(threshold);
        }
        if let Some(pause) = count_value(config, "sleep-after-enqueue-ms")? {
            args.sleep_after_enqueue_ms = Some(pause as u64);
        }
        if let Some(interval) = count_value(config, "poll-interval-ms")? {
            args.poll_interval_ms = Some(interval as u64);
        }
        if let Some(wait) = bool_value(config, "wait-on-dispose")? {
            args.wait_on_dispose = Some(wait);
        }
        if let Some(priority) = string_value(config, "priority")? {
            args.priority = Some(ThreadPriority::from_str(priority).map_err(|_| {
                ValidationError::new(&format!("unknown priority '{}'", priority))
            })?);
        }
        if let Some(background) = bool_value(config, "background")? {
            args.background = Some(background);
        }
        if let Some(color) = bool_value(config, "color")? {
            args.color = Some(color);
        }
        if let Some(log_level) = string_value(config, "log-level")? {
            args.log_level = Some(log_level.to_string());
        }
        if let Some(log_file) = string_value(config, "log-file")? {
            if log_file.eq_ignore_ascii_case("none") || log_file == "-" {
                args.log_file = None; // Magic values "none" and "-" disable file logging
            } else {
                args.log_file = Some(PathBuf::from(log_file));
            }
        }
        if let Some(log_format) = string_value(config, "log-format")? {
            args.log_format = Some(log_format.to_string());
        }

        Ok(())
    }
}

fn wrong_type(key: &str, expected: &str) -> ValidationError {
    ValidationError::new(&format!("'{}' must be {}", key, expected))
}

fn string_value<'a>(config: &'a toml::Table, key: &str) -> Result<Option<&'a str>, ValidationError> {
    match config.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_str()
            .map(Some)
            .ok_or_else(|| wrong_type(key, "a string")),
    }
}

fn bool_value(config: &toml::Table, key: &str) -> Result<Option<bool>, ValidationError> {
    match config.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_bool()
            .map(Some)
            .ok_or_else(|| wrong_type(key, "true or false")),
    }
}

fn count_value(config: &toml::Table, key: &str) -> Result<Option<usize>, ValidationError> {
    match config.get(key) {
        None => Ok(None),
        Some(value) => match value.as_integer() {
            Some(n) if n >= 0 => Ok(Some(n as usize)),
            _ => Err(wrong_type(key, "a non-negative integer")),
        },
    }
}

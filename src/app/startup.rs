//! Application startup
//!
//! Parses the command line, overlays it on the configuration file,
//! initialises logging and runs the requested strategies on a tokio
//! runtime. Returns the process exit code.

use clap::{CommandFactory, FromArgMatches};
use std::io::IsTerminal;

use super::cli::args::Args;
use super::runner::{render_reports, run_mode};
use crate::core::cancel::CancellationToken;
use crate::core::error_handling::log_error_with_context;
use crate::core::logging::init_logging;
use crate::core::shutdown::install_signal_handlers;
use crate::core::styles::help_styles;

/// Run the application and return its exit code
pub fn startup() -> i32 {
    let stdout_is_terminal = std::io::stdout().is_terminal();
    let matches = match Args::command()
        .styles(help_styles(stdout_is_terminal))
        .try_get_matches()
    {
        Ok(matches) => matches,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() { 2 } else { 0 };
        }
    };
    let cli_args = match Args::from_arg_matches(&matches) {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return 2;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start async runtime: {}", e);
            return 1;
        }
    };

    runtime.block_on(run(cli_args, stdout_is_terminal))
}

async fn run(cli_args: Args, stdout_is_terminal: bool) -> i32 {
    // Logging is not up yet, so configuration problems go to stderr
    let file_args = match Args::load_config_file(cli_args.config_file.as_deref()).await {
        Ok((args, _)) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let args = file_args.merge(cli_args);
    let use_color = args.color.unwrap_or(stdout_is_terminal);

    let log_file = args.effective_log_file().map(|p| p.to_string_lossy().to_string());
    if let Err(e) = init_logging(
        args.log_level.as_deref(),
        args.log_format.as_deref(),
        log_file.as_deref(),
        use_color,
    ) {
        eprintln!("Error: failed to initialise logging: {}", e);
        return 1;
    }
    log::debug!("final arguments: {:?}", args);

    let settings = match args.resolve() {
        Ok(settings) => settings,
        Err(e) => {
            log_error_with_context(&e, "Resolving settings");
            return 1;
        }
    };

    let token = CancellationToken::new();
    install_signal_handlers(token.clone());

    let mut reports = Vec::with_capacity(settings.modes.len());
    for mode in &settings.modes {
        if token.is_cancelled() {
            log::warn!("skipping remaining strategies after interrupt");
            break;
        }
        match run_mode(&settings, *mode, &token).await {
            Ok(report) => reports.push(report),
            Err(e) => {
                log_error_with_context(&e, &format!("Running the {} queue", mode));
                return 1;
            }
        }
    }

    let table = render_reports(&reports, use_color);
    if use_color {
        table.printstd();
    } else {
        print!("{}", table);
    }

    if token.is_cancelled() {
        130
    } else {
        0
    }
}

#![forbid(unsafe_code)]

//! `toolbox-watchdog` — runs toolbox commands under the failure watchdog.
//!
//! Every subcommand executes inside [`Watchdog::run`]; the process exit
//! status is derived from the returned [`toolbox_watchdog::Outcome`].

use std::path::{Path, PathBuf};
use std::process::{Command as ProcessCommand, ExitCode, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, EnvFilter};

use toolbox_watchdog::inspect::{EnvironmentReport, HostInspector};
use toolbox_watchdog::watchdog::EXIT_EXPECTED;
use toolbox_watchdog::{AppError, Failure, Reporter, Watchdog, WatchdogConfig};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "toolbox-watchdog",
    about = "Run toolbox commands with structured failure diagnostics",
    version,
    long_about = None
)]
struct Cli {
    /// Path to the TOML watchdog configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print system information, compiled-in packages, and search paths.
    Inspect,

    /// Parse and validate a watchdog configuration file.
    ValidateConfig {
        /// Configuration file to check.
        path: PathBuf,
    },

    /// Run an external program; a non-zero exit is reported as a failure.
    Exec {
        /// Program to execute.
        program: String,
        /// Arguments passed to the program.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

fn main() -> ExitCode {
    let args = Cli::parse();

    let config = match args.config.as_deref() {
        Some(path) => WatchdogConfig::load_from_path(path),
        None => Ok(WatchdogConfig::default()),
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => {
            // No configuration to report with yet: fall back to defaults.
            Reporter::stderr(&WatchdogConfig::default()).handle(&Failure::Expected(err));
            return ExitCode::from(EXIT_EXPECTED);
        }
    };

    let _log_guard = match init_tracing(args.log_format, &config) {
        Ok(guard) => guard,
        Err(err) => {
            Reporter::stderr(&config).handle(&Failure::Expected(err));
            return ExitCode::from(EXIT_EXPECTED);
        }
    };

    let mut watchdog = Watchdog::new(Reporter::stderr(&config));
    let outcome = watchdog.run(|| dispatch(args.command));
    debug!(exit_code = outcome.exit_code(), "command finished");
    ExitCode::from(outcome.exit_code())
}

fn dispatch(command: Command) -> Result<(), Failure> {
    match command {
        Command::Inspect => {
            let report = EnvironmentReport::collect(&HostInspector::default())?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::ValidateConfig { path } => {
            let config = WatchdogConfig::load_from_path(&path)?;
            println!(
                "{}: ok (crash log: {}, version: {})",
                path.display(),
                config.crash_log.display(),
                config.version
            );
        }
        Command::Exec { program, args } => {
            info!(%program, "executing external program");
            let status = ProcessCommand::new(&program).args(&args).status()?;
            if !status.success() {
                return Err(AppError::remote(format!("{program} exited with {status}"))
                    .with_code(exit_code_for(status))
                    .into());
            }
        }
    }
    Ok(())
}

fn exit_code_for(status: ExitStatus) -> String {
    status
        .code()
        .map_or_else(|| "E_SIGNALED".to_owned(), |code| format!("E_EXIT_{code}"))
}

/// Standard error carries only diagnostic records, so logs go to standard
/// output or to the configured `log_file`.
fn init_tracing(
    log_format: LogFormat,
    config: &WatchdogConfig,
) -> toolbox_watchdog::Result<Option<WorkerGuard>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let (writer, guard) = match config.log_file.as_deref() {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(open_log_file(path)?);
            (BoxMakeWriter::new(writer), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stdout), None),
    };
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(writer)
        .with_ansi(guard.is_none());

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::config(format!("failed to init tracing: {err}")))?,
    }

    Ok(guard)
}

fn open_log_file(path: &Path) -> toolbox_watchdog::Result<RollingFileAppender> {
    let name = path
        .file_name()
        .ok_or_else(|| AppError::config("log_file must name a file"))?;
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name.to_string_lossy())
        .build(dir)
        .map_err(|err| {
            AppError::config(format!("failed to open log file {}: {err}", path.display()))
        })
}

//! Argument parsing, logging setup, and command dispatch.

use chrono::Utc;
use chrono_tz::Tz;
use clap::{Args, Parser, Subcommand};
use gatepass_core::FiringVerdict;
use gatepass_telemetry::{
    DEFAULT_LOG_LEVEL, GlobalContextGuard, LogFormat, LoggingConfig, init_logging,
    log_format_from_value,
};
use serde::Serialize;
use tracing::error;

use crate::bootstrap::{self, BootstrapDependencies};
use crate::error::{AppError, AppResult};

/// Exit code of a firing where at least one user was not submitted.
const EXIT_PARTIAL: i32 = 1;

#[derive(Parser)]
#[command(
    name = "gatepass",
    about = "Submit gatepass requests for every configured user at a precise daily instant"
)]
struct Cli {
    #[arg(long, global = true, env = "GATEPASS_LOG_FORMAT")]
    log_format: Option<String>,
    #[arg(long, global = true, env = "GATEPASS_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Run the daily scheduler until interrupted (default).
    Run,
    /// Fire once for every user now and print the firing report.
    Fire,
    /// Fetch and reconcile one user's payload without submitting it.
    Preview(PreviewArgs),
    /// Validate configuration and profiles.
    Check,
    /// Print upcoming trigger instants.
    Next(NextArgs),
}

impl Command {
    const fn label(&self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Fire => "fire",
            Self::Preview(_) => "preview",
            Self::Check => "check",
            Self::Next(_) => "next",
        }
    }
}

#[derive(Args, Debug, PartialEq, Eq)]
struct PreviewArgs {
    /// User id of the profile to preview.
    #[arg(long)]
    user: String,
}

#[derive(Args, Debug, PartialEq, Eq)]
struct NextArgs {
    /// Number of upcoming instants to print.
    #[arg(long, default_value_t = 1)]
    count: usize,
}

/// Parses arguments, installs logging, and runs the requested command.
/// Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Run);

    let logging = LoggingConfig {
        level: &cli.log_level,
        format: log_format_from_value(cli.log_format.as_deref()).unwrap_or_else(LogFormat::infer),
        ..LoggingConfig::default()
    };
    if let Err(err) = init_logging(&logging) {
        let err = AppError::telemetry("telemetry.init", err);
        eprintln!("error: {}", err.display_message());
        return err.exit_code();
    }
    let _context = GlobalContextGuard::new(command.label());

    match dispatch(command).await {
        Ok(code) => code,
        Err(err) => {
            let message = err.display_message();
            error!(error = %message, "command failed");
            eprintln!("error: {message}");
            err.exit_code()
        }
    }
}

async fn dispatch(command: Command) -> AppResult<i32> {
    let deps = BootstrapDependencies::from_env()?;
    match command {
        Command::Run => bootstrap::run_daemon(deps).await.map(|()| 0),
        Command::Fire => {
            let report = bootstrap::fire_once(&deps).await?;
            print_json(&report)?;
            Ok(verdict_exit_code(report.verdict()))
        }
        Command::Preview(args) => {
            let payload = bootstrap::preview(&deps.config, &args.user).await?;
            print_json(&payload)?;
            Ok(0)
        }
        Command::Check => {
            let summary = bootstrap::check(&deps.config, Utc::now()).await?;
            let timezone = deps.config.schedule.timezone;
            println!("configuration ok");
            println!("users: {} ({})", summary.users.len(), summary.users.join(", "));
            println!(
                "trigger: {} {}",
                deps.config.schedule.trigger,
                timezone.name()
            );
            println!("next firing: {}", render_instant(summary.next_fire, timezone));
            Ok(0)
        }
        Command::Next(args) => {
            let timezone = deps.config.schedule.timezone;
            for instant in bootstrap::next_fire_times(&deps.config, Utc::now(), args.count)? {
                println!("{}", render_instant(instant, timezone));
            }
            Ok(0)
        }
    }
}

const fn verdict_exit_code(verdict: FiringVerdict) -> i32 {
    match verdict {
        FiringVerdict::AllSucceeded | FiringVerdict::Empty => 0,
        FiringVerdict::Partial | FiringVerdict::AllFailed => EXIT_PARTIAL,
    }
}

fn render_instant(instant: chrono::DateTime<Utc>, timezone: Tz) -> String {
    format!(
        "{} ({})",
        instant.with_timezone(&timezone).format("%Y-%m-%d %H:%M:%S%.3f %Z"),
        instant.format("%Y-%m-%dT%H:%M:%S%.3fZ")
    )
}

fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    let rendered =
        serde_json::to_string_pretty(value).map_err(|err| AppError::json("output.render", err))?;
    println!("{rendered}");
    Ok(())
}

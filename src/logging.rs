use crate::lockdown::LockdownReport;
use crate::{COMMAND_TARGET, CONSOLE_TARGET, Context, Data, ERROR_TARGET, Error, LOCKDOWN_TARGET};
use dashmap::DashMap;
use poise::FrameworkError;
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Log directory name
pub const LOG_DIR: &str = "logs";
/// Lockdown and command log file name
pub const LOCKDOWN_LOG_FILE: &str = "lockdown";
const DEFAULT_FILTER: &str = "info,serenity=error";

/// Start times of running slash commands, by invocation id
static RUNNING_COMMANDS: LazyLock<DashMap<u64, Instant>> = LazyLock::new(DashMap::new);

/// Set up the console and JSON file subscribers. `RUST_LOG` overrides the
/// default filter.
pub fn init() -> Result<(), Error> {
    std::fs::create_dir_all(LOG_DIR)?;

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(DEFAULT_FILTER)?,
    };

    let console = fmt::layer().with_target(true).with_ansi(true);

    // One JSON line per event, for reviewing a raid after the fact
    let lockdown_file = RollingFileAppender::new(Rotation::DAILY, LOG_DIR, LOCKDOWN_LOG_FILE);
    let json_file = fmt::layer()
        .json()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_ansi(false)
        .with_writer(lockdown_file);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(json_file)
        .try_init()?;

    info!(log_dir = LOG_DIR, "Logging initialized");
    Ok(())
}

fn start_timer(invocation: u64) {
    RUNNING_COMMANDS.insert(invocation, Instant::now());
}

fn take_elapsed(invocation: u64) -> Option<Duration> {
    RUNNING_COMMANDS
        .remove(&invocation)
        .map(|(_, started)| started.elapsed())
}

/// Command name, guild (or `DM`) and author of an invocation
fn invocation_fields(ctx: Context<'_>) -> (String, String, String) {
    let guild = ctx
        .guild_id()
        .map_or_else(|| "DM".to_string(), |id| id.to_string());
    (
        ctx.command().qualified_name.clone(),
        guild,
        ctx.author().id.to_string(),
    )
}

/// Pre-command hook
pub fn log_command_start(ctx: Context<'_>) {
    start_timer(ctx.id());
    let (command, guild_id, user_id) = invocation_fields(ctx);
    info!(
        target: COMMAND_TARGET,
        %command,
        %guild_id,
        %user_id,
        event = "start",
        "Slash command started"
    );
}

/// Post-command hook
pub fn log_command_end(ctx: Context<'_>) {
    let duration_ms = take_elapsed(ctx.id())
        .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX));
    let (command, guild_id, user_id) = invocation_fields(ctx);
    info!(
        target: COMMAND_TARGET,
        %command,
        %guild_id,
        %user_id,
        duration_ms,
        event = "end",
        "Slash command finished"
    );
}

/// Framework error hook
pub fn log_command_error(error: &FrameworkError<'_, Data, Error>) {
    match error {
        FrameworkError::Command { error, ctx, .. } => {
            // The post-command hook does not run for failed commands
            take_elapsed(ctx.id());
            let (command, guild_id, user_id) = invocation_fields(*ctx);
            error!(
                target: ERROR_TARGET,
                %command,
                %guild_id,
                %user_id,
                %error,
                "Slash command failed"
            );
        }
        FrameworkError::MissingUserPermissions { ctx, .. } => {
            let (command, guild_id, user_id) = invocation_fields(*ctx);
            warn!(
                target: ERROR_TARGET,
                %command,
                %guild_id,
                %user_id,
                "Slash command refused, caller lacks permissions"
            );
        }
        other => {
            error!(target: ERROR_TARGET, error = ?other, "Framework error");
        }
    }
}

/// One event per lock or unlock batch, a warning when channels failed
pub fn log_lockdown_report(report: &LockdownReport) {
    let succeeded = report.succeeded.len();
    let failed = report.failed.len();

    if failed == 0 {
        info!(
            target: LOCKDOWN_TARGET,
            run_id = %report.run_id,
            mode = %report.mode,
            succeeded,
            failed,
            event = "batch_complete",
            "Lockdown batch completed"
        );
    } else {
        warn!(
            target: LOCKDOWN_TARGET,
            run_id = %report.run_id,
            mode = %report.mode,
            succeeded,
            failed,
            failed_channels = %report.failed.join(" "),
            event = "batch_complete",
            "Lockdown batch completed with failures"
        );
    }
}

/// Operator-facing status line
pub fn log_console(message: String) {
    info!(target: CONSOLE_TARGET, %message, event = "console");
}

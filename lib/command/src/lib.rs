use std::{path::Path, time::Duration};

use run_command::{CommandOutput, async_run_command};
use shipwright_types::{Log, ship_timestamp};

mod provider_cli;

pub use provider_cli::{CliOutput, run_provider_cli};

pub async fn run_shell_command(
  stage: &str,
  path: impl Into<Option<&Path>>,
  command: impl AsRef<str>,
) -> Log {
  let command = if let Some(path) = path.into() {
    format!("cd {} && {}", path.display(), command.as_ref())
  } else {
    command.as_ref().to_string()
  };
  let start_ts = ship_timestamp();
  let output = async_run_command(&command).await;
  output_into_log(stage, command, start_ts, output)
}

/// Parses commands out of a multiline string and chains them together
/// with `&&` via [shipwright_types::parsers::parse_multiline_command]
/// before running. Returns `None` if the command is empty once
/// comments are stripped.
pub async fn run_shell_command_multiline(
  stage: &str,
  path: impl Into<Option<&Path>>,
  command: impl AsRef<str>,
) -> Option<Log> {
  let command = shipwright_types::parsers::parse_multiline_command(command);
  if command.is_empty() {
    return None;
  }
  Some(run_shell_command(stage, path, command).await)
}

/// Runs the command and replaces any occurrence of `replacers.0` with
/// `replacers.1` in the recorded command / stdout / stderr, to avoid
/// leaking secrets (credentials, access tokens) into logs users may
/// paste into an issue tracker.
pub async fn run_shell_command_with_sanitization(
  stage: &str,
  path: impl Into<Option<&Path>>,
  command: impl AsRef<str>,
  replacers: &[(String, String)],
) -> Option<Log> {
  let mut log = run_shell_command_multiline(stage, path, command).await?;
  log.command = svi::replace_in_string(&log.command, replacers);
  log.stdout = svi::replace_in_string(&log.stdout, replacers);
  log.stderr = svi::replace_in_string(&log.stderr, replacers);
  Some(log)
}

pub fn output_into_log(
  stage: &str,
  command: String,
  start_ts: i64,
  output: CommandOutput,
) -> Log {
  let success = output.success();
  Log {
    stage: stage.to_string(),
    stdout: output.stdout,
    stderr: output.stderr,
    command,
    success,
    start_ts,
    end_ts: ship_timestamp(),
  }
}

pub const DEFAULT_MUTATING_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_DESCRIBE_TIMEOUT: Duration = Duration::from_secs(30);

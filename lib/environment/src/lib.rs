use std::path::{Path, PathBuf};

use formatting::format_serror;
use shipwright_types::{EnvironmentVar, Log};

/// Writes an `.env` file for a compose-based bootstrap, so generated
/// user-data scripts can `docker compose --env-file <path> up` rather
/// than inlining every required variable into the command line.
///
/// Returns the path written on success, pushing a failure [Log] and
/// returning `None` otherwise. Callers should treat a `None` return
/// here as equivalent to a missing hard-required env var.
pub async fn write_env_file(
  environment: &[EnvironmentVar],
  folder: &Path,
  env_file_name: &str,
  logs: &mut Vec<Log>,
) -> Option<PathBuf> {
  let env_file_path = folder.join(env_file_name).components().collect::<PathBuf>();

  if environment.is_empty() {
    return None;
  }

  let contents = environment
    .iter()
    .map(|env| format!("{}={}", env.variable, env.value))
    .collect::<Vec<_>>()
    .join("\n");

  if let Some(parent) = env_file_path.parent() {
    if let Err(e) = tokio::fs::create_dir_all(parent).await.map_err(anyhow::Error::from) {
      logs.push(Log::error(
        "Write Environment File",
        format!("failed to create {parent:?}: {e:#}"),
      ));
      return None;
    }
  }

  if let Err(e) = tokio::fs::write(&env_file_path, contents)
    .await
    .map_err(anyhow::Error::from)
  {
    logs.push(Log::error("Write Environment File", format!("{e:#}")));
    return None;
  }

  logs.push(Log::simple(
    "Write Environment File",
    format!("environment file written to {env_file_path:?}"),
  ));

  Some(env_file_path)
}

/// Deterministically checks `environment` for the names in
/// `hard_required`, returning the ones that are missing. Used by the
/// orchestrator's compose-bootstrap step before writing the `.env`
/// file, so an unresolved required variable surfaces as a
/// configuration error instead of a silent gap in the written file.
pub fn missing_required(
  environment: &[EnvironmentVar],
  hard_required: &[String],
) -> Vec<String> {
  hard_required
    .iter()
    .filter(|name| !environment.iter().any(|e| &&e.variable == name))
    .cloned()
    .collect()
}

pub fn log_error(stage: &str, err: anyhow::Error) -> Log {
  Log::error(stage, format_serror(&err.into()))
}

use std::path::Path;

use shipwright_types::{Log, ship_timestamp, update::all_logs_success};

use crate::{GitResult, get_commit_hash_log};

/// Shallow-clones `repo_url` into `dest_dir`, deleting any existing
/// directory there first, then reads back the latest commit hash and
/// message. Access tokens embedded in `repo_url` (for private repos)
/// are scrubbed from recorded logs before they're returned.
#[tracing::instrument(level = "debug", skip(access_token))]
pub async fn clone(
  repo_url: &str,
  branch: Option<&str>,
  commit: Option<&str>,
  dest_dir: &Path,
  access_token: Option<&str>,
) -> anyhow::Result<GitResult> {
  let mut logs = clone_inner(repo_url, branch, commit, dest_dir, access_token).await;

  if !all_logs_success(&logs) {
    tracing::warn!("failed to clone repo at {dest_dir:?} | {logs:?}");
    return Ok(GitResult { logs, hash: None, message: None });
  }

  tracing::debug!("repo at {dest_dir:?} cloned");

  let (hash, message) = match get_commit_hash_log(dest_dir).await {
    Ok((log, hash, message)) => {
      logs.push(log);
      (Some(hash), Some(message))
    }
    Err(e) => {
      logs.push(Log::error("Latest Commit", format!("{e:#}")));
      (None, None)
    }
  };

  Ok(GitResult { logs, hash, message })
}

async fn clone_inner(
  repo_url: &str,
  branch: Option<&str>,
  commit: Option<&str>,
  dest_dir: &Path,
  access_token: Option<&str>,
) -> Vec<Log> {
  let _ = std::fs::remove_dir_all(dest_dir);
  let mut command = format!("git clone {repo_url} {}", dest_dir.display());
  if let Some(branch) = branch {
    command.push_str(&format!(" -b {branch}"));
  }
  let start_ts = ship_timestamp();
  let output = run_command::async_run_command(&command).await;
  let success = output.success();
  let (command, stderr) = if let Some(token) = access_token {
    (
      command.replace(token, "<TOKEN>"),
      output.stderr.replace(token, "<TOKEN>"),
    )
  } else {
    (command, output.stderr)
  };
  let mut logs = vec![Log {
    stage: "clone repo".to_string(),
    command,
    success,
    stdout: output.stdout,
    stderr,
    start_ts,
    end_ts: ship_timestamp(),
  }];

  if !logs[0].success {
    return logs;
  }

  if let Some(commit) = commit {
    let reset_log = command::run_shell_command(
      "set commit",
      dest_dir,
      format!("git reset --hard {commit}"),
    )
    .await;
    logs.push(reset_log);
  }

  logs
}

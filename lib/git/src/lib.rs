use shipwright_types::Log;

mod clone;

pub use clone::clone;

#[derive(Debug, Clone, Default)]
pub struct GitResult {
  pub logs: Vec<Log>,
  pub hash: Option<String>,
  pub message: Option<String>,
}

impl GitResult {
  pub fn success(&self) -> bool {
    shipwright_types::update::all_logs_success(&self.logs)
  }
}

/// Reads the latest commit hash + message at `repo_dir` via a
/// `git log -1` probe.
pub(crate) async fn get_commit_hash_log(
  repo_dir: &std::path::Path,
) -> anyhow::Result<(Log, String, String)> {
  let log = command::run_shell_command(
    "Latest Commit",
    repo_dir,
    "git log -1 --pretty=%H%n%s",
  )
  .await;
  if !log.success {
    anyhow::bail!("git log failed: {}", log.stderr);
  }
  let mut lines = log.stdout.lines();
  let hash = lines
    .next()
    .ok_or_else(|| anyhow::anyhow!("no commit hash in git log output"))?
    .trim()
    .to_string();
  let message = lines.next().unwrap_or_default().trim().to_string();
  Ok((log, hash, message))
}

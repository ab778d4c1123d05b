use std::{collections::HashMap, time::Duration};

use anyhow::{Context, anyhow};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Captured result of one cloud-provider CLI invocation. Distinct
/// from [run_command::CommandOutput] because provider CLIs are
/// invoked with an explicit argv (no shell interpolation) and carry
/// an explicit exit code rather than a bool, so the validator /
/// executor can distinguish "not found" from "denied" from
/// "succeeded with warnings".
#[derive(Debug, Clone)]
pub struct CliOutput {
  pub stdout: String,
  pub stderr: String,
  pub exit_code: i32,
}

impl CliOutput {
  pub fn success(&self) -> bool {
    self.exit_code == 0
  }
}

/// Runs a cloud-provider CLI binary (`aws`, `gcloud`, `az`,
/// `wrangler`) with an explicit argument vector and environment
/// overlay. Never goes through a shell, so arguments containing
/// spaces or shell metacharacters are passed through literally.
///
/// `cancel` is observed cooperatively: if it fires before the command
/// exits, the child is killed and awaited so no zombie is left
/// behind, and the call returns a `Cancelled` error.
pub async fn run_provider_cli(
  program: &str,
  args: &[String],
  env: &HashMap<String, String>,
  timeout: Duration,
  cancel: &CancellationToken,
) -> anyhow::Result<CliOutput> {
  let mut command = Command::new(program);
  command.args(args).envs(env).kill_on_drop(true);

  let mut child = command
    .stdout(std::process::Stdio::piped())
    .stderr(std::process::Stdio::piped())
    .spawn()
    .with_context(|| format!("failed to spawn `{program}`"))?;

  let wait = async {
    let output = child.wait_with_output().await?;
    anyhow::Ok(output)
  };

  tokio::select! {
    res = tokio::time::timeout(timeout, wait) => {
      let output = res.map_err(|_| anyhow!("`{program}` timed out after {timeout:?}"))??;
      Ok(CliOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code: output.status.code().unwrap_or(-1),
      })
    }
    _ = cancel.cancelled() => {
      Err(anyhow!("cancelled while running `{program}`"))
    }
  }
}

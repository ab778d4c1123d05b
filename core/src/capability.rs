//! Collaborator capabilities the pipeline consumes but never
//! implements (§6.1). Each is a trait object injected at pipeline
//! construction, matching komodo's pattern of treating the LLM client
//! and CLI runner as capability values — this is what makes the
//! pipeline directly unit-testable against scripted transcripts
//! without ever shelling out or calling a model.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// `Ask(ctx, prompt) -> (text, error)`. Thread-safe; may be called
/// concurrently (Phase 1 fans out Deep Analyzer / Docker Analyzer /
/// Infra Scanner and only Deep Analyzer needs this capability, but
/// the File Explorer and every LLM-driven phase after it share the
/// same client).
#[async_trait]
pub trait LlmClient: Send + Sync {
  async fn ask(&self, prompt: &str, deadline: Duration) -> anyhow::Result<String>;
}

/// `RunCLI(ctx, program, args, env) -> (stdout, stderr, exit_code,
/// error)`. Used read-only by the Infra Scanner and read-write by the
/// Executor.
#[async_trait]
pub trait CliRunner: Send + Sync {
  async fn run(
    &self,
    program: &str,
    args: &[String],
    env: &HashMap<String, String>,
    timeout: Duration,
    cancel: &CancellationToken,
  ) -> anyhow::Result<command::CliOutput>;
}

/// `CloneRepo(url, destDir) -> error`.
#[async_trait]
pub trait RepoCloner: Send + Sync {
  async fn clone(
    &self,
    repo_url: &str,
    branch: Option<&str>,
    dest_dir: &std::path::Path,
  ) -> anyhow::Result<git::GitResult>;
}

/// Strips markdown code fences (`` ```json ... ``` ``) that LLMs
/// habitually wrap structured responses in, so every JSON parse site
/// doesn't need to special-case them. Also tolerates a leading/
/// trailing explanation line outside the fence by extracting the
/// first fenced block if one exists.
pub fn clean_json(text: &str) -> String {
  let trimmed = text.trim();
  if let Some(start) = trimmed.find("```") {
    let after_fence = &trimmed[start + 3..];
    let after_lang = after_fence.trim_start_matches(|c: char| c.is_alphanumeric());
    let after_lang = after_lang.strip_prefix('\n').unwrap_or(after_lang);
    if let Some(end) = after_lang.find("```") {
      return after_lang[..end].trim().to_string();
    }
    return after_lang.trim().to_string();
  }
  trimmed.to_string()
}

/// Production [CliRunner] backed by `lib/command`'s argv-based
/// subprocess runner.
#[derive(Default)]
pub struct SubprocessCliRunner;

#[async_trait]
impl CliRunner for SubprocessCliRunner {
  async fn run(
    &self,
    program: &str,
    args: &[String],
    env: &HashMap<String, String>,
    timeout: Duration,
    cancel: &CancellationToken,
  ) -> anyhow::Result<command::CliOutput> {
    command::run_provider_cli(program, args, env, timeout, cancel).await
  }
}

/// Production [RepoCloner] backed by `lib/git`.
#[derive(Default)]
pub struct GitRepoCloner {
  pub access_token: Option<String>,
}

#[async_trait]
impl RepoCloner for GitRepoCloner {
  async fn clone(
    &self,
    repo_url: &str,
    branch: Option<&str>,
    dest_dir: &std::path::Path,
  ) -> anyhow::Result<git::GitResult> {
    git::clone(repo_url, branch, None, dest_dir, self.access_token.as_deref()).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn clean_json_strips_fence() {
    let text = "Sure, here you go:\n```json\n{\"a\":1}\n```\n";
    assert_eq!(clean_json(text), "{\"a\":1}");
  }

  #[test]
  fn clean_json_passthrough_when_no_fence() {
    assert_eq!(clean_json("{\"a\":1}"), "{\"a\":1}");
  }
}

pub mod apply;
pub mod plan;

use std::collections::HashMap;

use anyhow::Context;
use credentials::CredentialBackend;
use shipwright_core::{DeployRequest, entities::Provider};
use tempfile::TempDir;

use crate::config::DeployArgs;

/// Resolves a [DeployArgs] into a pipeline [DeployRequest] and a
/// scratch directory the caller must keep alive for the duration of
/// the pipeline run (the clone lives there).
pub async fn build_request(
  args: &DeployArgs,
  credentials: &dyn CredentialBackend,
) -> anyhow::Result<(DeployRequest, TempDir)> {
  let provider = Provider::parse(&args.provider)
    .with_context(|| format!("unknown provider {:?}", args.provider))?;

  let branch = match &args.branch {
    Some(b) => Some(b.clone()),
    None => resolve_default_branch(&args.repo, credentials).await,
  };

  let mut env: HashMap<String, String> = credentials.env_for_provider(provider.as_str());
  if let Some(token) = credentials.github_access_token() {
    env.insert("GITHUB_TOKEN".to_string(), token);
  }

  let scratch_dir = tempfile::Builder::new().prefix("shipwright-").tempdir().context("failed to create scratch directory")?;

  let request = DeployRequest {
    repo_url: args.repo.clone(),
    branch,
    question: args.question.clone(),
    provider,
    target_override: args.target.clone(),
    env,
  };

  Ok((request, scratch_dir))
}

async fn resolve_default_branch(repo_url: &str, credentials: &dyn CredentialBackend) -> Option<String> {
  let (owner, name) = github_reader::parse_owner_repo(repo_url)?;
  match github_reader::fetch_repo_meta(&owner, &name, credentials.github_access_token().as_deref()).await {
    Ok(meta) => Some(meta.default_branch),
    Err(e) => {
      tracing::warn!("failed to fetch default branch from GitHub, letting git decide: {e:#}");
      None
    }
  }
}

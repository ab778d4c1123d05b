//! Read-only GitHub helper. Named in the spec as thin glue around the
//! core pipeline (§1): it fetches metadata the repo profiler can't
//! get from a shallow clone alone (default branch, repo description,
//! topics) and never writes back to GitHub.

use anyhow::Context;

pub struct RepoMeta {
  pub default_branch: String,
  pub description: Option<String>,
  pub topics: Vec<String>,
  pub archived: bool,
}

/// Parses `owner/name` out of a `https://github.com/owner/name(.git)`
/// URL. Returns `None` for anything else (e.g. non-GitHub remotes),
/// in which case the caller should skip this enrichment silently.
pub fn parse_owner_repo(url: &str) -> Option<(String, String)> {
  let trimmed = url
    .trim_end_matches('/')
    .trim_end_matches(".git")
    .trim_start_matches("https://github.com/")
    .trim_start_matches("http://github.com/")
    .trim_start_matches("git@github.com:");
  let mut parts = trimmed.rsplitn(2, '/');
  let name = parts.next()?;
  let owner = parts.next()?;
  if owner.is_empty() || name.is_empty() || owner.contains("github.com") {
    return None;
  }
  Some((owner.to_string(), name.to_string()))
}

pub async fn fetch_repo_meta(
  owner: &str,
  name: &str,
  access_token: Option<&str>,
) -> anyhow::Result<RepoMeta> {
  let credentials = access_token
    .map(|token| octorust::auth::Credentials::Token(token.to_string()));
  let client = octorust::Client::new(
    "shipwright-deploy-cli",
    credentials,
  )
  .context("failed to construct GitHub client")?;

  let repo = client
    .repos()
    .get(owner, name)
    .await
    .context("failed to fetch repo metadata")?
    .body;

  Ok(RepoMeta {
    default_branch: repo.default_branch,
    description: if repo.description.is_empty() { None } else { Some(repo.description) },
    topics: repo.topics,
    archived: repo.archived,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_https_url() {
    assert_eq!(
      parse_owner_repo("https://github.com/docker-library/wordpress"),
      Some(("docker-library".to_string(), "wordpress".to_string()))
    );
  }

  #[test]
  fn parses_dot_git_suffix() {
    assert_eq!(
      parse_owner_repo("https://github.com/openclaw/openclaw.git"),
      Some(("openclaw".to_string(), "openclaw".to_string()))
    );
  }

  #[test]
  fn rejects_non_github_url() {
    assert_eq!(parse_owner_repo("https://gitlab.com/foo/bar"), None);
  }
}

//! Credential backend: out of scope for the deploy intelligence
//! pipeline per the project spec (§1), which treats it as an external
//! collaborator with a named interface only. This crate supplies that
//! interface — nothing more — so the CLI front-end has something real
//! to hand the pipeline at construction time.

use std::collections::HashMap;

/// Capability the pipeline consumes: given a provider name
/// (`aws`/`gcp`/`azure`/`cloudflare`), return the environment
/// variables that should overlay the provider CLI invocation (auth
/// profile, region, API tokens), without ever logging the values.
pub trait CredentialBackend: Send + Sync {
  fn env_for_provider(&self, provider: &str) -> HashMap<String, String>;
  fn github_access_token(&self) -> Option<String>;
}

/// Reads provider credentials from environment variables already
/// present in the CLI's process environment. This is the only
/// backend shipped in-tree; a real deployment would likely swap it
/// for a secrets-manager-backed implementation, which is why it's
/// kept behind the [CredentialBackend] trait.
#[derive(Default)]
pub struct EnvCredentialBackend;

impl CredentialBackend for EnvCredentialBackend {
  fn env_for_provider(&self, provider: &str) -> HashMap<String, String> {
    let mut env = HashMap::new();
    let keys: &[&str] = match provider {
      "aws" => &["AWS_PROFILE", "AWS_REGION", "AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY"],
      "gcp" => &["GOOGLE_APPLICATION_CREDENTIALS", "CLOUDSDK_CORE_PROJECT"],
      "azure" => &["AZURE_CLIENT_ID", "AZURE_TENANT_ID", "AZURE_CLIENT_SECRET"],
      "cloudflare" => &["CLOUDFLARE_API_TOKEN", "CLOUDFLARE_ACCOUNT_ID"],
      _ => &[],
    };
    for key in keys {
      if let Ok(value) = std::env::var(key) {
        env.insert(key.to_string(), value);
      }
    }
    env
  }

  fn github_access_token(&self) -> Option<String> {
    std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty())
  }
}

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Immutable snapshot of a cloned repository, produced by the Repo
/// Profiler (C1) and enriched in place by the File Explorer (C2).
/// Everything downstream — docker analysis, deep analysis, the
/// architect, the planner prompts — reads from this rather than
/// re-walking the checkout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoProfile {
  pub repo_url: String,
  pub language: Option<String>,
  pub framework: Option<String>,
  pub package_manager: Option<String>,
  pub lock_files: Vec<String>,
  pub is_monorepo: bool,
  pub ports: Vec<u16>,
  pub env_vars: Vec<String>,
  pub db_hint: Option<String>,
  pub has_dockerfile: bool,
  pub has_compose: bool,
  pub bootstrap_scripts: Vec<String>,
  pub key_files: HashMap<String, String>,
  pub file_tree: String,
  pub deploy_hints: Vec<String>,
}

impl RepoProfile {
  pub fn summary(&self) -> String {
    format!(
      "language={:?} framework={:?} package_manager={:?} ports={:?} docker={} compose={} db_hint={:?}",
      self.language,
      self.framework,
      self.package_manager,
      self.ports,
      self.has_dockerfile,
      self.has_compose,
      self.db_hint,
    )
  }
}

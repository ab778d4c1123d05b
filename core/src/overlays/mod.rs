//! Project overlay registry (Design Notes, "Project overlays").
//! Deployment rules for recognizable one-click projects (OpenClaw,
//! WordPress) live here as implementations of [Overlay] rather than
//! as `if framework == "wordpress"` branches scattered through the
//! Architect and Validator — adding the next WordPress-like project
//! should mean adding a file here, not touching C6/C9.

mod openclaw;
mod wordpress;

use crate::entities::{ArchitectDecision, DeepAnalysis, Plan, RepoProfile};

pub use openclaw::{OpenClawOverlay, classify_ssm_script};
pub use wordpress::WordpressOverlay;

/// A recognized one-click project's deployment rules.
pub trait Overlay: Send + Sync {
  fn name(&self) -> &'static str;

  /// Whether this overlay applies to the profiled repository.
  fn matches(&self, profile: &RepoProfile, deep: &DeepAnalysis) -> bool;

  /// Mutates the Architect's decision in place. Runs unconditionally
  /// after the LLM response is parsed (§4.6) — this is what makes the
  /// override deterministic rather than advisory.
  fn apply_override(&self, arch: &mut ArchitectDecision);

  /// Additional `[HARD]`-prefixed or advisory issues this project
  /// requires of a plan, evaluated the same way C9's provider-agnostic
  /// invariants are (§4.8, "Project overlays add domain-specific
  /// invariants").
  fn requirements(&self, plan: &Plan) -> Vec<String>;

  /// Project-specific EC2 `--user-data` lint rules, folded into C9's
  /// user-data lint pass alongside the provider-agnostic ones.
  fn lint_user_data(&self, _user_data: &str) -> Vec<String> {
    Vec::new()
  }
}

fn registry() -> [&'static dyn Overlay; 2] {
  [&OpenClawOverlay, &WordpressOverlay]
}

/// Returns the first matching overlay, if any. At most one overlay is
/// expected to match a given repo; if more than one did, the first
/// registered wins.
pub fn find_overlay(profile: &RepoProfile, deep: &DeepAnalysis) -> Option<&'static dyn Overlay> {
  registry().into_iter().find(|o| o.matches(profile, deep))
}

use crate::entities::{ArchitectDecision, DeepAnalysis, Plan, Provider, RepoProfile};

use super::Overlay;

pub struct OpenClawOverlay;

impl Overlay for OpenClawOverlay {
  fn name(&self) -> &'static str {
    "openclaw"
  }

  fn matches(&self, profile: &RepoProfile, deep: &DeepAnalysis) -> bool {
    let repo = profile.repo_url.to_ascii_lowercase();
    repo.contains("openclaw") || deep.description.to_ascii_lowercase().contains("openclaw")
  }

  /// OpenClaw is an EC2 + CloudFront deploy regardless of what the
  /// architect's LLM call guessed (§4.6 project signature override).
  fn apply_override(&self, arch: &mut ArchitectDecision) {
    if arch.provider == Provider::Aws {
      arch.method = "ec2".to_string();
    }
  }

  fn requirements(&self, plan: &Plan) -> Vec<String> {
    let mut issues = Vec::new();

    if plan.position_of("ec2", "run-instances").is_none() {
      issues.push("[HARD] openclaw overlay: missing ec2 run-instances".to_string());
    }
    let has_distribution = plan.position_of("cloudfront", "create-distribution").is_some()
      || plan.position_of("cloudfront", "create-distribution-with-tags").is_some();
    if !has_distribution {
      issues.push("[HARD] openclaw overlay: missing cloudfront create-distribution".to_string());
    }
    if plan.position_of("cloudfront", "wait").is_none() {
      issues.push("[HARD] openclaw overlay: missing cloudfront wait distribution-deployed".to_string());
    }

    let produces_cloudfront_domain =
      plan.commands.iter().any(|c| c.produces.contains_key("CLOUDFRONT_DOMAIN"));
    if !produces_cloudfront_domain {
      issues.push("[HARD] openclaw overlay: no command produces CLOUDFRONT_DOMAIN".to_string());
    }

    let https_url_produced = plan.commands.iter().any(|c| {
      c.produces
        .keys()
        .any(|k| k == "HTTPS_URL")
    });
    if !https_url_produced {
      issues.push("[HARD] openclaw overlay: no command produces HTTPS_URL".to_string());
    }

    issues
  }

  /// OpenClaw's bootstrap script is re-run via SSM `send-command` for
  /// several distinct purposes; classify by content so Autofix (C15)
  /// can dedup by category rather than by exact text match.
  fn lint_user_data(&self, user_data: &str) -> Vec<String> {
    let lower = user_data.to_ascii_lowercase();
    let mut issues = Vec::new();
    if lower.contains("docker pull") && !lower.contains("ecr get-login") && !lower.contains("ecr-public get-login") {
      issues.push("[HARD] openclaw overlay: ecr pull without preceding ecr login".to_string());
    }
    issues
  }
}

/// Classifies an SSM `send-command` script body into the category
/// Autofix dedups by. Shared between the overlay lint pass and C15 so
/// both agree on what counts as "the same kind of step".
pub fn classify_ssm_script(body: &str) -> &'static str {
  let lower = body.to_ascii_lowercase();
  if lower.contains("onboard") {
    "onboard"
  } else if lower.contains("gateway") && lower.contains("start") {
    "gateway-start"
  } else if lower.contains("export ") || lower.contains(".env") {
    "env-setup"
  } else if lower.contains("ecr") && (lower.contains("pull") || lower.contains("login")) {
    "ecr-pull"
  } else if lower.contains("diagnostic") || lower.contains("healthcheck") {
    "diagnostics"
  } else {
    "other"
  }
}

//! Deterministic Validator (C9). Provider-agnostic plus project-overlay
//! invariant checks over a [Plan]. Pure function: same inputs yield
//! byte-identical output ("Validation stability" law, §8) so it's safe
//! to call repeatedly inside the paging and repair loops.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
  entities::{Command, DeepAnalysis, DockerAnalysis, Plan, PlanValidation, RepoProfile},
  overlays,
};

static AWS_ACCESS_KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(AKIA|ASIA)[0-9A-Z]{16}\b").unwrap());
static OPENAI_KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bsk-[A-Za-z0-9]{20,}\b").unwrap());
static PEM_HEADER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-----BEGIN [A-Z ]*PRIVATE KEY-----").unwrap());
static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<([A-Z0-9_]+)>").unwrap());
static SSH_INGRESS_RE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"--port[= ]22\b.*--cidr[= ]([^\s]+)|--cidr[= ]([^\s]+).*--port[= ]22\b").unwrap());

/// Placeholder names resolvable from the infra snapshot alias table
/// without an earlier `produces` entry (mirrors
/// [crate::entities::InfraSnapshot::to_bindings]).
fn is_infra_alias(name: &str) -> bool {
  matches!(name, "VPC_ID" | "REGION" | "ACCOUNT_ID" | "AMI_ID" | "SUBNET_ID" | "ALB_SG_ID" | "DEFAULT_SG_ID")
    || name.starts_with("SUBNET_")
}

/// `<ADMIN_CIDR>` is never auto-bound from infra; it is required
/// exactly where an SSH ingress rule would otherwise need a literal
/// CIDR (§4.8).
const ADMIN_CIDR_PLACEHOLDER: &str = "ADMIN_CIDR";

pub fn validate(
  plan: &Plan,
  profile: &RepoProfile,
  docker: &DockerAnalysis,
  deep: &DeepAnalysis,
) -> PlanValidation {
  let mut issues = Vec::new();
  let warnings = Vec::new();
  let mut unresolved_placeholders = Vec::new();

  if plan.commands.is_empty() {
    issues.push(hard("plan has no commands"));
  }
  if !plan.has_launch_operation() {
    issues.push(hard("plan contains no recognized launch operation"));
  }

  check_secrets(plan, &mut issues);
  check_placeholders(plan, &mut issues, &mut unresolved_placeholders);
  check_iam_instance_profile_ordering(plan, &mut issues);
  check_secrets_manager_ordering(plan, &mut issues);
  check_wait_ordering(plan, &mut issues);
  check_ssh_ingress(plan, &mut issues);
  check_user_data_lint(plan, profile, docker, &mut issues);
  check_cloudfront_tags(plan, &mut issues);

  if let Some(overlay) = overlays::find_overlay(profile, deep) {
    for issue in overlay.requirements(plan) {
      issues.push(issue);
    }
    for command in &plan.commands {
      if let Some(user_data) = user_data_value(command) {
        for issue in overlay.lint_user_data(&decode_user_data(user_data)) {
          issues.push(issue);
        }
      }
    }
  }

  let is_valid = !issues.iter().any(|i| i.starts_with(PlanValidation::HARD_PREFIX));

  PlanValidation { is_valid, issues, fixes: Vec::new(), warnings, unresolved_placeholders }
}

fn hard(msg: impl std::fmt::Display) -> String {
  format!("{} {msg}", PlanValidation::HARD_PREFIX)
}

fn check_secrets(plan: &Plan, issues: &mut Vec<String>) {
  for (i, command) in plan.commands.iter().enumerate() {
    let joined = command.joined_args();
    let decoded = decode_user_data(&joined);
    for (re, label) in [
      (&*AWS_ACCESS_KEY_RE, "AWS access key"),
      (&*OPENAI_KEY_RE, "API key"),
      (&*PEM_HEADER_RE, "PEM private key"),
    ] {
      if re.is_match(&joined) || re.is_match(&decoded) {
        issues.push(hard(format!("command {i} appears to contain an inlined {label}")));
      }
    }
  }
}

fn check_placeholders(plan: &Plan, issues: &mut Vec<String>, unresolved: &mut Vec<String>) {
  let mut produced_so_far: std::collections::HashSet<String> = std::collections::HashSet::new();
  for command in &plan.commands {
    let joined = command.joined_args();
    for cap in PLACEHOLDER_RE.captures_iter(&joined) {
      let name = cap[1].to_string();
      if produced_so_far.contains(&name) || is_infra_alias(&name) || name == ADMIN_CIDR_PLACEHOLDER {
        continue;
      }
      if !unresolved.contains(&name) {
        unresolved.push(name.clone());
      }
      issues.push(hard(format!("placeholder <{name}> has no producer and is not a known infra binding")));
    }
    for key in command.produces.keys() {
      produced_so_far.insert(key.clone());
    }
  }
}

fn check_iam_instance_profile_ordering(plan: &Plan, issues: &mut Vec<String>) {
  let Some(add_role) = plan.position_of("iam", "add-role-to-instance-profile") else { return };
  let Some(run_instances) = plan.position_of("ec2", "run-instances") else { return };
  let get_profile = plan.position_of("iam", "get-instance-profile");
  match get_profile {
    Some(pos) if pos > add_role && pos < run_instances => {}
    _ => issues.push(hard(
      "iam get-instance-profile must appear between add-role-to-instance-profile and ec2 run-instances",
    )),
  }
}

fn check_secrets_manager_ordering(plan: &Plan, issues: &mut Vec<String>) {
  let Some(run_instances) = plan.position_of("ec2", "run-instances") else { return };
  if let Some(pos) = plan.position_of("secretsmanager", "create-secret") {
    if pos > run_instances {
      issues.push(hard("secretsmanager create-secret must happen before the ec2 run-instances that consumes it"));
    }
  }
}

fn check_wait_ordering(plan: &Plan, issues: &mut Vec<String>) {
  if let (Some(create_lb), Some(create_listener)) = (
    plan.position_of("elbv2", "create-load-balancer"),
    plan.position_of("elbv2", "create-listener"),
  ) {
    match plan.position_of("elbv2", "wait") {
      Some(pos) if pos > create_lb && pos < create_listener => {}
      _ => issues.push(hard(
        "elbv2 wait load-balancer-available must sit between create-load-balancer and create-listener",
      )),
    }
  }

  if let (Some(run_instances), Some(register_targets)) =
    (plan.position_of("ec2", "run-instances"), plan.position_of("elbv2", "register-targets"))
  {
    match plan.position_of("ec2", "wait") {
      Some(pos) if pos > run_instances && pos < register_targets => {}
      _ => issues.push(hard("ec2 wait instance-running must sit between run-instances and register-targets")),
    }
  }
}

fn check_ssh_ingress(plan: &Plan, issues: &mut Vec<String>) {
  for command in &plan.commands {
    if command.args.first().map(String::as_str) != Some("ec2")
      || command.args.get(1).map(String::as_str) != Some("authorize-security-group-ingress")
    {
      continue;
    }
    let joined = command.joined_args();
    if let Some(cap) = SSH_INGRESS_RE.captures(&joined) {
      let cidr = cap.get(1).or_else(|| cap.get(2)).map(|m| m.as_str()).unwrap_or("");
      if cidr == "0.0.0.0/0" {
        issues.push(hard("SSH ingress on port 22 must not resolve to 0.0.0.0/0; use <ADMIN_CIDR>"));
      }
    }
  }
}

fn check_cloudfront_tags(plan: &Plan, issues: &mut Vec<String>) {
  for command in &plan.commands {
    if command.args.first().map(String::as_str) == Some("cloudfront")
      && command.args.get(1).map(String::as_str) == Some("create-distribution")
      && command.args.iter().any(|a| a == "--tags")
    {
      issues.push(hard("cloudfront create-distribution must not carry --tags; use create-distribution-with-tags"));
    }
  }
}

fn user_data_value(command: &Command) -> Option<&str> {
  command
    .args
    .iter()
    .position(|a| a == "--user-data")
    .and_then(|i| command.args.get(i + 1))
    .map(String::as_str)
}

/// Base64-decodes `value` if it looks like standard base64; otherwise
/// returns it unchanged. Used both for secret scanning and user-data
/// lint so encoded scripts aren't invisible to either.
fn decode_user_data(value: &str) -> String {
  use base64::{engine::general_purpose::STANDARD, Engine as _};
  let candidate = value.trim();
  if candidate.len() < 8 || !candidate.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=') {
    return value.to_string();
  }
  match STANDARD.decode(candidate) {
    Ok(bytes) => String::from_utf8(bytes).unwrap_or_else(|_| value.to_string()),
    Err(_) => value.to_string(),
  }
}

fn check_user_data_lint(plan: &Plan, profile: &RepoProfile, docker: &DockerAnalysis, issues: &mut Vec<String>) {
  for command in &plan.commands {
    let Some(raw) = user_data_value(command) else { continue };
    let script = decode_user_data(raw);
    let lower = script.to_ascii_lowercase();

    if lower.contains("amazon-linux-extras install docker") || lower.contains("amazon-linux-extras install  docker") {
      issues.push(hard("user-data uses amazon-linux-extras for Docker, which is unavailable on AL2023; use dnf"));
    }

    if lower.contains(".dkr.ecr.") && lower.contains("docker pull") && !lower.contains("ecr get-login") {
      issues.push(hard("user-data pulls from ECR without an ecr get-login-password step first"));
    }

    if profile.has_compose {
      for var in &docker.hard_required_env {
        let needle = var.to_ascii_lowercase();
        if !lower.contains(&needle) {
          issues.push(hard(format!("user-data must export required compose env var {var}")));
        }
      }
    }

    if profile.package_manager.as_deref() == Some("pnpm") && (lower.contains("npm ") || lower.contains("pnpm "))
      && !lower.contains("corepack enable")
    {
      issues.push(hard("user-data builds a pnpm project without `corepack enable` first"));
    }

    if (lower.contains("manage.py") || lower.contains("alembic") || lower.contains("knex")) && !lower.contains("migrate") {
      issues.push(hard("user-data appears to set up a migration-driven app without running migrations"));
    }

    for line in script.lines() {
      if has_unterminated_single_quote(line) {
        issues.push(hard("user-data script appears to contain an unterminated single-quoted string"));
        break;
      }
    }
  }
}

fn has_unterminated_single_quote(line: &str) -> bool {
  let mut count = 0;
  let mut chars = line.chars().peekable();
  while let Some(c) = chars.next() {
    if c == '\\' {
      chars.next();
      continue;
    }
    if c == '\'' {
      count += 1;
    }
  }
  count % 2 == 1
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::entities::Provider;

  fn cmd(args: &[&str]) -> Command {
    Command { args: args.iter().map(|s| s.to_string()).collect(), ..Default::default() }
  }

  #[test]
  fn flags_missing_launch_operation() {
    let plan = Plan::new(Provider::Aws, "deploy");
    let validation = validate(&plan, &RepoProfile::default(), &DockerAnalysis::default(), &DeepAnalysis::default());
    assert!(validation.has_hard_issues());
  }

  #[test]
  fn flags_ssh_open_to_world() {
    let mut plan = Plan::new(Provider::Aws, "deploy");
    plan.commands.push(cmd(&[
      "ec2",
      "authorize-security-group-ingress",
      "--port=22",
      "--cidr=0.0.0.0/0",
    ]));
    plan.commands.push(cmd(&["ec2", "run-instances"]));
    let validation = validate(&plan, &RepoProfile::default(), &DockerAnalysis::default(), &DeepAnalysis::default());
    assert!(validation.issues.iter().any(|i| i.contains("0.0.0.0/0")));
  }

  #[test]
  fn flags_unterminated_single_quote_in_user_data() {
    let mut plan = Plan::new(Provider::Aws, "deploy");
    plan.commands.push(cmd(&["ec2", "run-instances", "--user-data", "bash -c \"echo 'unterminated\""]));
    let validation = validate(&plan, &RepoProfile::default(), &DockerAnalysis::default(), &DeepAnalysis::default());
    assert!(validation.issues.iter().any(|i| i.contains("unterminated single-quoted")));
  }

  #[test]
  fn flags_cloudfront_tags_flag() {
    let mut plan = Plan::new(Provider::Aws, "deploy");
    plan.commands.push(cmd(&["ec2", "run-instances"]));
    plan
      .commands
      .push(cmd(&["cloudfront", "create-distribution", "--distribution-config", "x", "--tags", "Key=A,Value=B"]));
    let validation = validate(&plan, &RepoProfile::default(), &DockerAnalysis::default(), &DeepAnalysis::default());
    assert!(validation.issues.iter().any(|i| i.contains("create-distribution-with-tags")));
  }

  #[test]
  fn placeholder_with_prior_producer_is_not_flagged() {
    let mut plan = Plan::new(Provider::Aws, "deploy");
    let mut producer = cmd(&["ec2", "run-instances"]);
    producer.produces.insert("INSTANCE_ID".to_string(), "$.Instances[0].InstanceId".to_string());
    plan.commands.push(producer);
    plan.commands.push(cmd(&["ec2", "wait", "instance-running", "--instance-ids", "<INSTANCE_ID>"]));
    let validation = validate(&plan, &RepoProfile::default(), &DockerAnalysis::default(), &DeepAnalysis::default());
    assert!(!validation.issues.iter().any(|i| i.contains("INSTANCE_ID")));
  }

  #[test]
  fn validation_is_deterministic() {
    let mut plan = Plan::new(Provider::Aws, "deploy");
    plan.commands.push(cmd(&["ec2", "run-instances"]));
    let a = validate(&plan, &RepoProfile::default(), &DockerAnalysis::default(), &DeepAnalysis::default());
    let b = validate(&plan, &RepoProfile::default(), &DockerAnalysis::default(), &DeepAnalysis::default());
    assert_eq!(a.issues, b.issues);
  }
}

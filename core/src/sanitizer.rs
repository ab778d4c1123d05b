//! Conservative Sanitizer (C11). Deterministic, fail-open text
//! normalization of command args — never a source of repair-loop
//! churn because a sanitized plan that scores worse is discarded
//! ("Sanitizer monotonicity" law, §8).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::entities::{Command, DeepAnalysis, DockerAnalysis, Plan, RepoProfile};
use crate::validator;

// AWS-managed policies live under the reserved `aws` account, not the
// caller's own account. Models occasionally emit the customer account
// id (or `<ACCOUNT_ID>`) for a recognizably AWS-managed policy name;
// canonicalize those back to the `aws:policy/` form.
static MANAGED_POLICY_ARN_RE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"^arn:aws:iam::(?:<ACCOUNT_ID>|\d{12}):policy/(Amazon[A-Za-z0-9]+|AWS[A-Za-z0-9]+)$").unwrap());
const SHELL_OPERATORS: &[&str] = &["&&", "||", "|", ";"];
const SHELL_WRAPPERS: &[&[&str]] = &[&["bash", "-c"], &["sh", "-c"]];
const LEADING_PROGRAM_NAMES: &[&str] = &["aws", "gcloud", "az", "wrangler"];

pub fn sanitize(plan: &Plan) -> Plan {
  let mut sanitized = plan.clone();
  for command in &mut sanitized.commands {
    sanitize_command(command);
  }
  sanitized
}

fn sanitize_command(command: &mut Command) {
  strip_leading_program_name(&mut command.args);
  strip_shell_wrapper(&mut command.args);
  for arg in &mut command.args {
    *arg = trim_arg(arg);
    *arg = normalize_managed_policy_arn(arg);
  }
  command.args.retain(|arg| !SHELL_OPERATORS.contains(&arg.as_str()));
}

fn trim_arg(arg: &str) -> String {
  let trimmed = arg.trim();
  let trimmed = trimmed.trim_end_matches(',');
  let trimmed = trimmed
    .strip_prefix('"')
    .and_then(|s| s.strip_suffix('"'))
    .unwrap_or(trimmed);
  let trimmed = trimmed
    .strip_prefix('\'')
    .and_then(|s| s.strip_suffix('\''))
    .unwrap_or(trimmed);
  trimmed.to_string()
}

fn normalize_managed_policy_arn(arg: &str) -> String {
  if let Some(cap) = MANAGED_POLICY_ARN_RE.captures(arg) {
    format!("arn:aws:iam::aws:policy/{}", &cap[1])
  } else {
    arg.to_string()
  }
}

fn strip_leading_program_name(args: &mut Vec<String>) {
  if let Some(first) = args.first() {
    if LEADING_PROGRAM_NAMES.contains(&first.as_str()) {
      args.remove(0);
    }
  }
}

fn strip_shell_wrapper(args: &mut Vec<String>) {
  for wrapper in SHELL_WRAPPERS {
    if args.len() >= wrapper.len() && args[..wrapper.len()] == **wrapper {
      args.drain(..wrapper.len());
      return;
    }
  }
}

/// Fail-open adoption: sanitize, re-validate, and only keep the
/// sanitized plan if its deterministic issue count did not increase.
pub fn sanitize_fail_open(
  plan: Plan,
  profile: &RepoProfile,
  docker: &DockerAnalysis,
  deep: &DeepAnalysis,
) -> Plan {
  let before = validator::validate(&plan, profile, docker, deep).deterministic_issue_count();
  let candidate = sanitize(&plan);
  let after = validator::validate(&candidate, profile, docker, deep).deterministic_issue_count();
  if after <= before {
    candidate
  } else {
    plan
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::entities::Provider;

  fn cmd(args: &[&str]) -> Command {
    Command { args: args.iter().map(|s| s.to_string()).collect(), ..Default::default() }
  }

  #[test]
  fn strips_leading_program_name_and_shell_operators() {
    let mut plan = Plan::new(Provider::Aws, "deploy");
    plan.commands.push(cmd(&["aws", "ec2", "run-instances", "&&", "echo", "done"]));
    let sanitized = sanitize(&plan);
    assert_eq!(sanitized.commands[0].args, vec!["ec2", "run-instances", "echo", "done"]);
  }

  #[test]
  fn trims_quotes_and_trailing_commas() {
    let mut plan = Plan::new(Provider::Aws, "deploy");
    plan.commands.push(cmd(&["ec2", "run-instances", "--tag-specifications", "\"Key=Name,Value=app\","]));
    let sanitized = sanitize(&plan);
    assert_eq!(sanitized.commands[0].args[2], "Key=Name,Value=app");
  }

  #[test]
  fn normalizes_managed_policy_arn_with_account_id() {
    let mut plan = Plan::new(Provider::Aws, "deploy");
    plan.commands.push(cmd(&[
      "iam",
      "attach-role-policy",
      "--policy-arn",
      "arn:aws:iam::<ACCOUNT_ID>:policy/AmazonEC2ContainerRegistryReadOnly",
    ]));
    let sanitized = sanitize(&plan);
    assert_eq!(sanitized.commands[0].args[3], "arn:aws:iam::aws:policy/AmazonEC2ContainerRegistryReadOnly");
  }

  #[test]
  fn fail_open_discards_worse_sanitized_plan() {
    // Sanitizing a plan down to zero commands would only ever make
    // validation worse (missing launch op), so fail-open must keep
    // the original here.
    let mut plan = Plan::new(Provider::Aws, "deploy");
    plan.commands.push(cmd(&["ec2", "run-instances"]));
    let profile = RepoProfile::default();
    let docker = DockerAnalysis::default();
    let deep = DeepAnalysis::default();
    let result = sanitize_fail_open(plan.clone(), &profile, &docker, &deep);
    assert_eq!(result.commands.len(), plan.commands.len());
  }
}

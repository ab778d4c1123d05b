//! Autofix (C15). Deterministic cleanup that runs after the repair
//! loop and before the final sanitize/validate pass: collapses
//! duplicate launch cycles, dedups OpenClaw's semantically-equivalent
//! SSM `send-command` invocations, and patches known CloudFront
//! `produces` gaps (§4.13).

use std::collections::{HashMap, HashSet};

use crate::{
  entities::{Command, Plan},
  overlays::classify_ssm_script,
};

pub fn autofix(plan: &mut Plan) {
  collapse_duplicate_launches(plan);
  dedup_openclaw_ssm_commands(plan);
  patch_cloudfront_produces(plan);
}

/// If multiple `ec2 run-instances` exist, later ones are assumed more
/// refined (Design Notes open question (a)): keep the last, drop the
/// earlier ones along with their lifecycle cleanup commands scoped to
/// the dropped instance's produced placeholder.
fn collapse_duplicate_launches(plan: &mut Plan) {
  let launch_indices: Vec<usize> = plan
    .commands
    .iter()
    .enumerate()
    .filter(|(_, c)| c.args.first().map(String::as_str) == Some("ec2") && c.args.get(1).map(String::as_str) == Some("run-instances"))
    .map(|(i, _)| i)
    .collect();

  if launch_indices.len() <= 1 {
    return;
  }

  let keep = *launch_indices.last().unwrap();
  let dropped_placeholders: HashSet<String> = launch_indices[..launch_indices.len() - 1]
    .iter()
    .flat_map(|&i| plan.commands[i].produces.keys().cloned())
    .collect();

  let mut drop_set: HashSet<usize> = launch_indices[..launch_indices.len() - 1].iter().copied().collect();
  for (i, command) in plan.commands.iter().enumerate() {
    if i == keep || drop_set.contains(&i) {
      continue;
    }
    let references_dropped = command
      .args
      .iter()
      .any(|arg| dropped_placeholders.iter().any(|ph| arg.contains(&format!("<{ph}>"))));
    let is_lifecycle_cleanup = command.args.first().map(String::as_str) == Some("ec2")
      && matches!(
        command.args.get(1).map(String::as_str),
        Some("terminate-instances") | Some("wait")
      )
      || (command.args.first().map(String::as_str) == Some("elbv2")
        && command.args.get(1).map(String::as_str) == Some("deregister-targets"));
    if references_dropped && is_lifecycle_cleanup {
      drop_set.insert(i);
    }
  }

  let mut kept_commands = Vec::with_capacity(plan.commands.len());
  for (i, command) in plan.commands.drain(..).enumerate() {
    if !drop_set.contains(&i) {
      kept_commands.push(command);
    }
  }
  plan.commands = kept_commands;
}

/// OpenClaw re-runs the same bootstrap script through SSM
/// `send-command` for different purposes during planning; keep only
/// the last invocation per semantic category (Design Notes, C15).
fn dedup_openclaw_ssm_commands(plan: &mut Plan) {
  let ssm_indices: Vec<usize> = plan
    .commands
    .iter()
    .enumerate()
    .filter(|(_, c)| c.args.first().map(String::as_str) == Some("ssm") && c.args.get(1).map(String::as_str) == Some("send-command"))
    .map(|(i, _)| i)
    .collect();

  if ssm_indices.len() <= 1 {
    return;
  }

  let mut last_index_per_category: HashMap<&'static str, usize> = HashMap::new();
  for &i in &ssm_indices {
    let body = ssm_script_body(&plan.commands[i]);
    let category = classify_ssm_script(&body);
    last_index_per_category.insert(category, i);
  }

  let keep: HashSet<usize> = last_index_per_category.values().copied().collect();
  let drop_set: HashSet<usize> = ssm_indices.into_iter().filter(|i| !keep.contains(i)).collect();

  let mut kept_commands = Vec::with_capacity(plan.commands.len());
  for (i, command) in plan.commands.drain(..).enumerate() {
    if !drop_set.contains(&i) {
      kept_commands.push(command);
    }
  }
  plan.commands = kept_commands;
}

fn ssm_script_body(command: &Command) -> String {
  command
    .args
    .iter()
    .position(|a| a == "--parameters" || a == "commands")
    .and_then(|i| command.args.get(i + 1))
    .cloned()
    .unwrap_or_else(|| command.joined_args())
}

/// Ensures a `cloudfront create-distribution[-with-tags]` produces
/// `CLOUDFRONT_DOMAIN`, and that some command produces `HTTPS_URL`.
fn patch_cloudfront_produces(plan: &mut Plan) {
  let Some(idx) = plan
    .commands
    .iter()
    .position(|c| {
      c.args.first().map(String::as_str) == Some("cloudfront")
        && matches!(c.args.get(1).map(String::as_str), Some("create-distribution") | Some("create-distribution-with-tags"))
    })
  else {
    return;
  };

  let command = &mut plan.commands[idx];
  command
    .produces
    .entry("CLOUDFRONT_DOMAIN".to_string())
    .or_insert_with(|| "$.Distribution.DomainName".to_string());
  command
    .produces
    .entry("CLOUDFRONT_ID".to_string())
    .or_insert_with(|| "$.Distribution.Id".to_string());

  let has_https_url = plan.commands.iter().any(|c| c.produces.contains_key("HTTPS_URL"));
  if !has_https_url {
    plan.commands[idx]
      .produces
      .insert("HTTPS_URL".to_string(), "$.Distribution.DomainName".to_string());
    plan.commands[idx].reason.push_str(" (HTTPS_URL derived from CloudFront domain at resolution time)");
  }

  if plan.position_of("cloudfront", "wait").is_none() {
    plan.commands.insert(
      idx + 1,
      Command {
        args: vec![
          "cloudfront".to_string(),
          "wait".to_string(),
          "distribution-deployed".to_string(),
          "--id".to_string(),
          "<CLOUDFRONT_ID>".to_string(),
        ],
        reason: "wait for the CloudFront distribution to finish deploying".to_string(),
        produces: Default::default(),
      },
    );
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
  fn collapses_duplicate_launch_and_its_cleanup() {
    let mut plan = Plan::new(Provider::Aws, "deploy");
    let mut first = cmd(&["ec2", "run-instances"]);
    first.produces.insert("INSTANCE_ID".to_string(), "$.Instances[0].InstanceId".to_string());
    plan.commands.push(first);
    plan.commands.push(cmd(&["ec2", "terminate-instances", "--instance-ids", "<INSTANCE_ID>"]));
    plan.commands.push(cmd(&["ec2", "wait", "instance-terminated", "--instance-ids", "<INSTANCE_ID>"]));
    let mut second = cmd(&["ec2", "run-instances"]);
    second.produces.insert("NEW_INSTANCE_ID".to_string(), "$.Instances[0].InstanceId".to_string());
    plan.commands.push(second);

    autofix(&mut plan);

    assert_eq!(plan.commands.len(), 1);
    assert!(plan.commands[0].produces.contains_key("NEW_INSTANCE_ID"));
  }

  #[test]
  fn patches_missing_cloudfront_produces_and_wait() {
    let mut plan = Plan::new(Provider::Aws, "deploy");
    plan.commands.push(cmd(&["ec2", "run-instances"]));
    plan.commands.push(cmd(&["cloudfront", "create-distribution", "--distribution-config", "x"]));

    autofix(&mut plan);

    let cf = &plan.commands[1];
    assert_eq!(cf.produces.get("CLOUDFRONT_DOMAIN").unwrap(), "$.Distribution.DomainName");
    assert!(plan.position_of("cloudfront", "wait").is_some());
    assert!(plan.commands.iter().any(|c| c.produces.contains_key("HTTPS_URL")));
  }

  #[test]
  fn dedups_openclaw_ssm_send_command_by_category() {
    let mut plan = Plan::new(Provider::Aws, "deploy");
    plan.commands.push(cmd(&["ssm", "send-command", "--parameters", "systemctl start gateway.service"]));
    plan.commands.push(cmd(&["ssm", "send-command", "--parameters", "systemctl start gateway.service --again"]));
    plan.commands.push(cmd(&["ssm", "send-command", "--parameters", "aws ecr get-login-password | docker login"]));

    autofix(&mut plan);

    assert_eq!(plan.commands.len(), 2);
  }
}

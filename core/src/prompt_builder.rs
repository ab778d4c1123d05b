//! Prompt Builder (C7). Assembles the enriched deployment prompt the
//! Paged Planner (C8) repeats at the top of every page — the single
//! place where C1–C6's outputs are flattened into text the planning
//! LLM conditions on.

use crate::entities::{ArchitectDecision, DeepAnalysis, DockerAnalysis, InfraSnapshot, Provider, RepoProfile};

pub fn build(
  question: &str,
  provider: Provider,
  profile: &RepoProfile,
  docker: &DockerAnalysis,
  deep: &DeepAnalysis,
  infra: &InfraSnapshot,
  arch: &ArchitectDecision,
) -> String {
  let mut sections = Vec::new();

  sections.push(format!("Deployment request: {question}"));
  sections.push(format!("Target provider: {}", provider.as_str()));
  sections.push(format!("Architecture: method={} reasoning={}", arch.method, arch.reasoning));
  if arch.needs_alb {
    sections.push("Requires an application load balancer in front of the compute target.".to_string());
  }
  if arch.needs_db {
    sections.push(format!("Requires a database service: {:?}", arch.db_service));
  }
  sections.push(format!("Repository profile: {}", profile.summary()));
  if !profile.deploy_hints.is_empty() {
    sections.push(format!("Deploy hints: {:?}", profile.deploy_hints));
  }
  if docker.primary_port.is_some() || !docker.hard_required_env.is_empty() {
    sections.push(format!(
      "Docker analysis: primary_port={:?} hard_required_env={:?} build={:?} run={:?}",
      docker.primary_port, docker.hard_required_env, docker.build_command, docker.run_command
    ));
  }
  sections.push(format!(
    "Application description: {} (listening_port={:?}, health_path={:?}, exposes_http={})",
    deep.description, deep.listening_port, deep.health_path, deep.exposes_http
  ));
  if !deep.env_vars.is_empty() {
    let required: Vec<&str> = deep
      .env_vars
      .iter()
      .filter(|v| v.required)
      .map(|v| v.name.as_str())
      .collect();
    sections.push(format!("Required env vars: {required:?}"));
  }
  sections.push(format!(
    "Existing account inventory: account={:?} region={:?} default_vpc={:?} subnets={} security_groups={} \
     ecr_repos={:?} ecs_clusters={:?} albs={:?} rds={:?} cloudfront={:?} latest_ami={:?}",
    infra.account_id,
    infra.region,
    infra.default_vpc_id,
    infra.subnets.len(),
    infra.security_groups.len(),
    infra.ecr_repositories,
    infra.ecs_clusters,
    infra.albs,
    infra.rds_instances,
    infra.cloudfront_distributions,
    infra.latest_ami,
  ));
  sections.push(format!(
    "CLI program for this provider: `{}`. Args must never include the leading program name, and never \
     inject --profile or --region — those are added at invocation time.",
    provider.cli_program()
  ));
  sections.push("Placeholders use literal `<UPPER_SNAKE>` tokens only, never `${X}` or `$X`.".to_string());

  sections.join("\n\n")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn includes_provider_cli_program_and_placeholder_rule() {
    let profile = RepoProfile::default();
    let docker = DockerAnalysis::default();
    let deep = DeepAnalysis::default();
    let infra = InfraSnapshot::default();
    let arch = ArchitectDecision {
      provider: Provider::Cloudflare,
      method: "workers".to_string(),
      reasoning: String::new(),
      build_steps: Vec::new(),
      sizing: Default::default(),
      needs_alb: false,
      needs_db: false,
      db_service: None,
      estimated_monthly_cost: None,
      cost_breakdown: Vec::new(),
    };
    let prompt = build("deploy this", Provider::Cloudflare, &profile, &docker, &deep, &infra, &arch);
    assert!(prompt.contains("`wrangler`"));
    assert!(prompt.contains("<UPPER_SNAKE>"));
  }
}

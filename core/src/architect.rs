//! Architect (C6). One LLM call chooses provider-specific deployment
//! method and sizing; deterministic overrides then run unconditionally
//! so the final decision never depends on the model agreeing with
//! itself twice (§4.6).

use std::time::Duration;

use crate::{
  capability::{LlmClient, clean_json},
  entities::{ArchitectDecision, DeepAnalysis, DockerAnalysis, InfraSnapshot, Provider, RepoProfile},
  error::PipelineError,
  overlays,
};

const LLM_DEADLINE: Duration = Duration::from_secs(60);

/// User-specified deployment target, when the operator named one
/// explicitly in the request (e.g. "deploy to EKS"). Overrides both
/// the LLM's choice and any project overlay (§4.6, "User-specified
/// target overrides").
pub type TargetOverride = Option<String>;

pub async fn decide(
  llm: &dyn LlmClient,
  provider: Provider,
  profile: &RepoProfile,
  docker: &DockerAnalysis,
  deep: &DeepAnalysis,
  infra: &InfraSnapshot,
  target_override: TargetOverride,
) -> Result<ArchitectDecision, PipelineError> {
  let prompt = build_prompt(provider, profile, docker, deep, infra);
  let raw = llm
    .ask(&prompt, LLM_DEADLINE)
    .await
    .map_err(|source| PipelineError::TransientLlm { phase: "architect", source })?;
  let cleaned = clean_json(&raw);

  let mut decision: ArchitectDecision = serde_json::from_str(&cleaned).unwrap_or_else(|e| {
    tracing::warn!("architect: failed to parse response, defaulting method: {e}");
    ArchitectDecision {
      provider,
      method: ArchitectDecision::default_method(provider).to_string(),
      reasoning: String::new(),
      build_steps: Vec::new(),
      sizing: Default::default(),
      needs_alb: false,
      needs_db: false,
      db_service: None,
      estimated_monthly_cost: None,
      cost_breakdown: Vec::new(),
    }
  });
  decision.provider = provider;

  if !ArchitectDecision::allowed_methods(provider).contains(&decision.method.as_str()) {
    tracing::warn!(
      "architect: model returned unrecognized method {:?} for {provider:?}, clamping to default",
      decision.method
    );
    decision.method = ArchitectDecision::default_method(provider).to_string();
  }

  apply_deterministic_overrides(&mut decision, profile, docker, deep, target_override);

  Ok(decision)
}

fn apply_deterministic_overrides(
  decision: &mut ArchitectDecision,
  profile: &RepoProfile,
  docker: &DockerAnalysis,
  deep: &DeepAnalysis,
  target_override: TargetOverride,
) {
  // Known-project overrides run first; they're the most specific.
  if let Some(overlay) = overlays::find_overlay(profile, deep) {
    overlay.apply_override(decision);
  }

  // Static-site + default/unset target + AWS -> s3-cloudfront.
  let looks_static = !profile.has_dockerfile
    && !profile.has_compose
    && docker.primary_port.is_none()
    && matches!(profile.framework.as_deref(), Some("vite") | Some("astro") | Some("react") | Some("angular"))
    && !deep.exposes_http;
  if looks_static && decision.provider == Provider::Aws && target_override.is_none() {
    decision.method = "s3-cloudfront".to_string();
  }

  // Explicit user target wins over everything, including overlays.
  if let Some(target) = target_override {
    if ArchitectDecision::allowed_methods(decision.provider).contains(&target.as_str()) {
      decision.method = target;
    } else {
      tracing::warn!("architect: requested target {target:?} not valid for {:?}, ignoring", decision.provider);
    }
  }
}

fn build_prompt(
  provider: Provider,
  profile: &RepoProfile,
  docker: &DockerAnalysis,
  deep: &DeepAnalysis,
  infra: &InfraSnapshot,
) -> String {
  format!(
    "Choose a deployment architecture on {} for this repository.\n\
     Allowed methods: {:?}\n\
     Profile: {}\n\
     Docker: multi_stage={} primary_port={:?}\n\
     Deep analysis: description={:?} services={:?} listening_port={:?} exposes_http={}\n\
     Existing infra: account={:?} default_vpc={:?} ecs_clusters={:?}\n\
     Respond with JSON only matching ArchitectDecision: \
     {{\"provider\":\"{}\",\"method\":str,\"reasoning\":str,\"build_steps\":[str],\
     \"sizing\":{{\"cpu\":str|null,\"memory\":str|null,\"instance_type\":str|null}},\
     \"needs_alb\":bool,\"needs_db\":bool,\"db_service\":str|null,\
     \"estimated_monthly_cost\":number|null,\"cost_breakdown\":[[str,number]]}}",
    provider.as_str(),
    ArchitectDecision::allowed_methods(provider),
    profile.summary(),
    docker.multi_stage,
    docker.primary_port,
    deep.description,
    deep.services,
    deep.listening_port,
    deep.exposes_http,
    infra.account_id,
    infra.default_vpc_id,
    infra.ecs_clusters,
    provider.as_str(),
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use async_trait::async_trait;
  use std::sync::Mutex;

  struct ScriptedLlm {
    response: Mutex<Option<String>>,
  }

  #[async_trait]
  impl LlmClient for ScriptedLlm {
    async fn ask(&self, _prompt: &str, _deadline: Duration) -> anyhow::Result<String> {
      Ok(self.response.lock().unwrap().take().unwrap())
    }
  }

  #[tokio::test]
  async fn wordpress_profile_overrides_to_ec2_with_alb() {
    let llm = ScriptedLlm {
      response: Mutex::new(Some(
        r#"{"provider":"aws","method":"lambda","needs_alb":false}"#.to_string(),
      )),
    };
    let profile = RepoProfile { framework: Some("wordpress".to_string()), ..Default::default() };
    let docker = DockerAnalysis::default();
    let deep = DeepAnalysis::default();
    let infra = InfraSnapshot::default();
    let decision = decide(&llm, Provider::Aws, &profile, &docker, &deep, &infra, None).await.unwrap();
    assert_eq!(decision.method, "ec2");
    assert!(decision.needs_alb);
  }

  #[tokio::test]
  async fn static_site_defaults_to_s3_cloudfront() {
    let llm = ScriptedLlm {
      response: Mutex::new(Some(r#"{"provider":"aws","method":"ec2"}"#.to_string())),
    };
    let profile = RepoProfile { framework: Some("vite".to_string()), ..Default::default() };
    let docker = DockerAnalysis::default();
    let deep = DeepAnalysis::default();
    let infra = InfraSnapshot::default();
    let decision = decide(&llm, Provider::Aws, &profile, &docker, &deep, &infra, None).await.unwrap();
    assert_eq!(decision.method, "s3-cloudfront");
  }

  #[tokio::test]
  async fn explicit_target_override_wins() {
    let llm = ScriptedLlm {
      response: Mutex::new(Some(r#"{"provider":"aws","method":"ec2"}"#.to_string())),
    };
    let profile = RepoProfile::default();
    let docker = DockerAnalysis::default();
    let deep = DeepAnalysis::default();
    let infra = InfraSnapshot::default();
    let decision = decide(&llm, Provider::Aws, &profile, &docker, &deep, &infra, Some("eks".to_string()))
      .await
      .unwrap();
    assert_eq!(decision.method, "eks");
  }
}

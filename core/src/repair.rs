//! Plan Repair Agent (C10). Triages validator issues, then drives a
//! bounded LLM rewrite loop constrained to minimal diffs against the
//! current plan (§4.9).

use std::time::Duration;

use crate::{
  capability::{LlmClient, clean_json},
  entities::{DeepAnalysis, DockerAnalysis, Plan, PlanValidation, RepoProfile},
  validator,
};

pub const DEFAULT_MAX_ROUNDS: u32 = 3;
const LLM_DEADLINE: Duration = Duration::from_secs(90);

/// Claims the validate-by-LLM pass sometimes makes that are known to
/// be wrong often enough that sending them back into a repair prompt
/// just churns the plan without fixing anything real.
const NOISE_PATTERNS: &[&str] = &[
  "cloudfront does not support websocket",
  "s3 buckets cannot be used for static",
  "lambda cannot have a vpc",
];

#[derive(Debug, Default)]
pub struct Triage {
  pub hard_fixable: Vec<String>,
  pub likely_noise: Vec<String>,
  pub context_needed: Vec<String>,
}

pub fn triage(issues: &[String]) -> Triage {
  let mut out = Triage::default();
  for issue in issues {
    if issue.starts_with(PlanValidation::HARD_PREFIX) {
      out.hard_fixable.push(issue.clone());
      continue;
    }
    let lower = issue.to_ascii_lowercase();
    if NOISE_PATTERNS.iter().any(|p| lower.contains(p)) {
      out.likely_noise.push(issue.clone());
    } else {
      out.context_needed.push(issue.clone());
    }
  }
  out
}

pub struct RepairOutcome {
  pub plan: Plan,
  pub validation: PlanValidation,
  pub rounds_used: u32,
}

pub async fn repair(
  llm: &dyn LlmClient,
  base_prompt: &str,
  mut plan: Plan,
  mut validation: PlanValidation,
  profile: &RepoProfile,
  docker: &DockerAnalysis,
  deep: &DeepAnalysis,
  max_rounds: u32,
) -> anyhow::Result<RepairOutcome> {
  let mut rounds_used = 0;

  while validation.has_hard_issues() && rounds_used < max_rounds {
    rounds_used += 1;
    let tri = triage(&validation.issues);
    if tri.hard_fixable.is_empty() {
      // Only noise/context-needed issues remain; nothing repair can
      // act on deterministically.
      break;
    }

    let prompt = build_repair_prompt(base_prompt, &plan, &tri);
    let raw = match llm.ask(&prompt, LLM_DEADLINE).await {
      Ok(raw) => raw,
      Err(e) => {
        tracing::warn!("repair round {rounds_used}: LLM call failed: {e:#}");
        continue;
      }
    };
    let cleaned = clean_json(&raw);
    match serde_json::from_str::<Plan>(&cleaned) {
      Ok(candidate) => {
        plan = candidate;
        validation = validator::validate(&plan, profile, docker, deep);
      }
      Err(e) => {
        tracing::warn!("repair round {rounds_used}: failed to parse rewritten plan: {e}");
      }
    }
  }

  Ok(RepairOutcome { plan, validation, rounds_used })
}

fn build_repair_prompt(base_prompt: &str, plan: &Plan, tri: &Triage) -> String {
  format!(
    "{base_prompt}\n\n\
     The following plan has hard issues that must be fixed:\n{}\n\n\
     Current plan (rewrite it, preserving every valid command — address ONLY the \
     issues listed, never change the chosen architecture or provider):\n{}\n\n\
     Respond with the full corrected Plan as JSON only, matching the existing schema.",
    tri.hard_fixable.join("\n"),
    serde_json::to_string(plan).unwrap_or_default(),
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::entities::Provider;
  use async_trait::async_trait;
  use std::sync::Mutex;

  struct ScriptedLlm {
    responses: Mutex<Vec<String>>,
  }

  #[async_trait]
  impl LlmClient for ScriptedLlm {
    async fn ask(&self, _prompt: &str, _deadline: Duration) -> anyhow::Result<String> {
      Ok(self.responses.lock().unwrap().remove(0))
    }
  }

  #[test]
  fn triage_drops_known_noise() {
    let issues = vec![
      "[HARD] missing launch op".to_string(),
      "CloudFront does not support websocket connections".to_string(),
      "some unrelated advisory note".to_string(),
    ];
    let tri = triage(&issues);
    assert_eq!(tri.hard_fixable.len(), 1);
    assert_eq!(tri.likely_noise.len(), 1);
    assert_eq!(tri.context_needed.len(), 1);
  }

  #[tokio::test]
  async fn repair_stops_once_no_hard_issues_remain() {
    let mut plan = Plan::new(Provider::Aws, "deploy");
    plan.commands.push(crate::entities::Command {
      args: vec!["ec2".to_string(), "run-instances".to_string()],
      ..Default::default()
    });
    let profile = RepoProfile::default();
    let docker = DockerAnalysis::default();
    let deep = DeepAnalysis::default();
    let validation = validator::validate(&plan, &profile, &docker, &deep);
    let llm = ScriptedLlm { responses: Mutex::new(vec![]) };

    let outcome = repair(&llm, "base", plan, validation, &profile, &docker, &deep, DEFAULT_MAX_ROUNDS)
      .await
      .unwrap();
    assert_eq!(outcome.rounds_used, 0);
  }
}

//! Orchestrator. Owns the mutable [Plan] exclusively and wires
//! C1-C16 together per the documented control flow: `C1 -> C2 <-> C5
//! (parallel with C3, C4) -> C6 -> C7 -> loop{C8 -> C9 -> if hard: C10
//! -> C9} -> C15 -> C11 -> C9 -> loop{C9 -> C10} -> C12 -> C13 -> C14
//! -> C16`. Every other module in this crate is a pure or
//! capability-injected function this file calls in sequence; nothing
//! about sequencing lives anywhere else.

use std::{collections::HashMap, path::Path};

use tokio_util::sync::CancellationToken;

use crate::{
  architect, autofix,
  capability::{CliRunner, LlmClient, RepoCloner},
  deep_analyzer, docker_analyzer,
  entities::{
    Command, DeepAnalysis, DockerAnalysis, EnvVarSpec, InfraSnapshot, Plan, PlanValidation,
    Provider, RepoProfile,
  },
  error::PipelineError,
  executor::{self, ExecutionReport},
  explorer, infra_scanner, integrity,
  planner::{self, PageContext, PlanMode},
  placeholder, profiler, prompt_builder, repair, reviewer, sanitizer, validator,
};

const STUCK_THRESHOLD: u32 = 3;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
  pub max_explorer_rounds: u32,
  pub max_pages: usize,
  pub max_repair_rounds: u32,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    PipelineConfig {
      max_explorer_rounds: explorer::DEFAULT_MAX_ROUNDS,
      max_pages: planner::DEFAULT_MAX_PAGES,
      max_repair_rounds: repair::DEFAULT_MAX_ROUNDS,
    }
  }
}

pub struct DeployRequest {
  pub repo_url: String,
  pub branch: Option<String>,
  pub question: String,
  pub provider: Provider,
  pub target_override: Option<String>,
  pub env: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct PlanOutcome {
  pub plan: Plan,
  pub validation: PlanValidation,
  pub unresolved_placeholders: Vec<String>,
}

pub struct ApplyOutcome {
  pub plan_outcome: PlanOutcome,
  pub execution: ExecutionReport,
}

pub struct Pipeline<'a> {
  llm: &'a dyn LlmClient,
  cli: &'a dyn CliRunner,
  cloner: &'a dyn RepoCloner,
  config: PipelineConfig,
}

impl<'a> Pipeline<'a> {
  pub fn new(
    llm: &'a dyn LlmClient,
    cli: &'a dyn CliRunner,
    cloner: &'a dyn RepoCloner,
    config: PipelineConfig,
  ) -> Self {
    Pipeline { llm, cli, cloner, config }
  }

  /// Plan-only mode (§6.5): returns the best-effort Plan + validation
  /// report. Non-zero exit for the caller is reserved for phase
  /// failures that prevent producing any plan at all; hard issues and
  /// unresolved placeholders are surfaced, not fatal.
  pub async fn plan(
    &self,
    request: &DeployRequest,
    scratch_dir: &Path,
    cancel: &CancellationToken,
  ) -> Result<PlanOutcome, PipelineError> {
    let built = self.build(request, PlanMode::PlanOnly, scratch_dir, cancel).await?;
    Ok(PlanOutcome {
      plan: built.plan,
      validation: built.validation,
      unresolved_placeholders: built.unresolved,
    })
  }

  /// Apply mode (§6.5): fatal on unresolved hard issues, unresolved
  /// placeholders, execution failure the self-heal path can't
  /// recover from, or cancellation.
  pub async fn apply(
    &self,
    request: &DeployRequest,
    scratch_dir: &Path,
    cancel: &CancellationToken,
  ) -> Result<ApplyOutcome, PipelineError> {
    let built = self.build(request, PlanMode::Apply, scratch_dir, cancel).await?;

    if built.validation.has_hard_issues() {
      return Err(PipelineError::InvariantViolation(built.validation.hard_issues().into_iter().map(str::to_string).collect()));
    }
    if !built.unresolved.is_empty() {
      return Err(PipelineError::ConfigurationMissing(built.unresolved));
    }

    if built.has_compose && !built.hard_required_env.is_empty() {
      write_compose_env_file(&built.hard_required_env, &built.env_vars, &request.env, scratch_dir).await?;
    }

    let execution =
      executor::execute(self.cli, self.llm, &built.plan, &built.infra, &request.env, cancel).await?;

    Ok(ApplyOutcome {
      plan_outcome: PlanOutcome { plan: built.plan, validation: built.validation, unresolved_placeholders: Vec::new() },
      execution,
    })
  }

  async fn build(
    &self,
    request: &DeployRequest,
    mode: PlanMode,
    scratch_dir: &Path,
    cancel: &CancellationToken,
  ) -> Result<BuiltPlan, PipelineError> {
    if cancel.is_cancelled() {
      return Err(PipelineError::Cancellation);
    }

    let mut profile =
      profiler::profile_repo(self.cloner, &request.repo_url, request.branch.as_deref(), scratch_dir).await?;

    if let Err(e) = explorer::explore(self.llm, &mut profile, scratch_dir, self.config.max_explorer_rounds).await {
      tracing::warn!("file explorer failed, proceeding with the base profile: {e:#}");
    }

    // C3 is a pure, synchronous parse, so it runs eagerly rather than
    // occupying a join slot; C4 and C5 are the two suspension points
    // that actually benefit from Phase 1's join barrier.
    let docker = docker_analyzer::analyze(&profile);
    let (infra, deep_result) = tokio::join!(
      infra_scanner::scan(self.cli, request.provider, &request.env, cancel),
      deep_analyzer::analyze(self.llm, &profile, &docker),
    );
    let deep = deep_result?;

    if cancel.is_cancelled() {
      return Err(PipelineError::Cancellation);
    }

    let decision = architect::decide(
      self.llm,
      request.provider,
      &profile,
      &docker,
      &deep,
      &infra,
      request.target_override.clone(),
    )
    .await?;

    let base_prompt =
      prompt_builder::build(&request.question, request.provider, &profile, &docker, &deep, &infra, &decision);

    let mut plan = Plan::new(request.provider, request.question.clone());
    plan.summary = if decision.reasoning.is_empty() { deep.description.clone() } else { decision.reasoning.clone() };

    let required_launch_ops = launch_ops_for_method(&decision.method);
    let mut validation = PlanValidation::default();
    let mut consecutive_zero_progress = 0u32;

    for _ in 0..self.config.max_pages {
      if cancel.is_cancelled() {
        return Err(PipelineError::Cancellation);
      }

      let produced_bindings = produced_binding_names(&plan);
      let hard_issues: Vec<String> = validation.hard_issues().into_iter().map(str::to_string).collect();
      let ctx = PageContext {
        base_prompt: &base_prompt,
        required_launch_ops,
        produced_bindings: &produced_bindings,
        hard_issues: &hard_issues,
        force_not_done: validation.has_hard_issues(),
      };

      let page = planner::plan_page(self.llm, &plan, &ctx)
        .await
        .map_err(|source| PipelineError::TransientLlm { phase: "paged_planner", source })?;
      let added = planner::append_page(&mut plan, &page);
      consecutive_zero_progress = if added == 0 { consecutive_zero_progress + 1 } else { 0 };

      validation = validator::validate(&plan, &profile, &docker, &deep);
      if validation.has_hard_issues() {
        let outcome = repair::repair(
          self.llm,
          &base_prompt,
          plan.clone(),
          validation.clone(),
          &profile,
          &docker,
          &deep,
          self.config.max_repair_rounds,
        )
        .await
        .map_err(|source| PipelineError::TransientLlm { phase: "repair", source })?;
        plan = outcome.plan;
        validation = outcome.validation;
      }

      if consecutive_zero_progress >= STUCK_THRESHOLD {
        if mode == PlanMode::Apply && validation.has_hard_issues() {
          return Err(PipelineError::Stuck);
        }
        tracing::warn!("paged planner stuck after {STUCK_THRESHOLD} zero-progress pages, returning best-effort plan");
        break;
      }

      if page.done && !validation.has_hard_issues() {
        break;
      }
    }

    autofix::autofix(&mut plan);
    plan = sanitizer::sanitize_fail_open(plan, &profile, &docker, &deep);
    validation = validator::validate(&plan, &profile, &docker, &deep);

    // Second repair loop (control flow's `loop{C9 -> C10}`): autofix
    // and sanitizing can themselves introduce a hard issue (e.g. a
    // dropped cleanup command leaves a dangling reference), so run
    // the same deterministic-validator-driven repair once more,
    // bounded the same way, before moving on to the advisory passes.
    if validation.has_hard_issues() {
      let outcome = repair::repair(
        self.llm,
        &base_prompt,
        plan.clone(),
        validation.clone(),
        &profile,
        &docker,
        &deep,
        self.config.max_repair_rounds,
      )
      .await
      .map_err(|source| PipelineError::TransientLlm { phase: "repair", source })?;
      plan = outcome.plan;
      validation = outcome.validation;
    }

    plan = reviewer::review(self.llm, plan, &profile, &deep).await;
    plan = integrity::run(self.llm, plan).await;
    validation = validator::validate(&plan, &profile, &docker, &deep);

    let resolved = placeholder::resolve(self.llm, plan, &infra).await;

    Ok(BuiltPlan {
      plan: resolved.plan,
      validation,
      unresolved: resolved.unresolved,
      infra,
      has_compose: profile.has_compose,
      hard_required_env: docker.hard_required_env.clone(),
      env_vars: deep.env_vars.clone(),
    })
  }
}

/// Materializes a `.env` file on the executor's scratch directory for a
/// compose-based bootstrap (§4.19), so a generated user-data script can
/// `docker compose --env-file <path> up` rather than inlining every
/// variable on the command line. Each hard-required name is resolved
/// from the deploy request's env first, falling back to the Deep
/// Analyzer's declared default; a name resolved by neither is left out
/// of the file and reported via [PipelineError::ConfigurationMissing]
/// before the executor ever runs, rather than failing opaquely inside
/// the subprocess.
async fn write_compose_env_file(
  hard_required: &[String],
  specs: &[EnvVarSpec],
  request_env: &HashMap<String, String>,
  scratch_dir: &Path,
) -> Result<(), PipelineError> {
  let mut names: Vec<&str> = hard_required.iter().map(String::as_str).collect();
  names.extend(specs.iter().map(|s| s.name.as_str()));
  names.sort();
  names.dedup();

  let env_vars: Vec<shipwright_types::EnvironmentVar> = names
    .into_iter()
    .filter_map(|name| {
      let value = request_env
        .get(name)
        .cloned()
        .or_else(|| specs.iter().find(|s| s.name == name).and_then(|s| s.default.clone()))?;
      Some(shipwright_types::EnvironmentVar { variable: name.to_string(), value })
    })
    .collect();

  let missing = environment::missing_required(&env_vars, hard_required);
  if !missing.is_empty() {
    return Err(PipelineError::ConfigurationMissing(missing));
  }

  let mut logs = Vec::new();
  let written = environment::write_env_file(&env_vars, scratch_dir, ".env", &mut logs).await;
  for log in &logs {
    if log.success {
      tracing::info!("{}: {}", log.stage, log.stdout);
    } else {
      tracing::warn!("{}: {}", log.stage, log.stderr);
    }
  }

  if written.is_none() {
    return Err(PipelineError::ConfigurationMissing(hard_required.to_vec()));
  }
  Ok(())
}

struct BuiltPlan {
  plan: Plan,
  validation: PlanValidation,
  unresolved: Vec<String>,
  infra: InfraSnapshot,
  has_compose: bool,
  hard_required_env: Vec<String>,
  env_vars: Vec<EnvVarSpec>,
}

fn produced_binding_names(plan: &Plan) -> Vec<String> {
  let mut names: Vec<String> = plan.commands.iter().flat_map(|c: &Command| c.produces.keys().cloned()).collect();
  names.sort();
  names.dedup();
  names
}

/// Launch operations a page prompt should steer the model toward for
/// the chosen architecture method, from §4.8's closed set. `eks` and
/// `s3-cloudfront` have no member in that closed set (an ambiguity
/// already present in the source invariant list, not introduced
/// here); their plans are expected to satisfy C9 through whichever
/// closed-set op their provider-specific commands happen to include,
/// or to carry an advisory rather than a hard issue.
fn launch_ops_for_method(method: &str) -> &'static [&'static str] {
  match method {
    "ec2" => &["ec2 run-instances"],
    "ecs-fargate" => &["ecs create-service", "ecs run-task"],
    "apprunner" => &["apprunner create-service"],
    "lambda" => &["lambda create-function"],
    "lightsail" => &["lightsail create-container-service", "lightsail create-instances"],
    _ => &[],
  }
}

#[cfg(test)]
#[allow(dead_code)]
fn _use_repo_profile_and_docker_analysis(_p: &RepoProfile, _d: &DockerAnalysis, _a: &DeepAnalysis) {}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn writes_compose_env_file_from_request_env_and_defaults() {
    let scratch = tempfile::tempdir().unwrap();
    let hard_required = vec!["DB_HOST".to_string(), "DB_PASSWORD".to_string()];
    let specs = vec![EnvVarSpec { name: "DB_HOST".to_string(), default: Some("localhost".to_string()), ..Default::default() }];
    let mut request_env = HashMap::new();
    request_env.insert("DB_PASSWORD".to_string(), "changeme".to_string());

    write_compose_env_file(&hard_required, &specs, &request_env, scratch.path()).await.unwrap();

    let contents = std::fs::read_to_string(scratch.path().join(".env")).unwrap();
    assert!(contents.contains("DB_HOST=localhost"));
    assert!(contents.contains("DB_PASSWORD=changeme"));
  }

  #[tokio::test]
  async fn fails_fast_on_a_required_var_resolved_by_neither_request_nor_default() {
    let scratch = tempfile::tempdir().unwrap();
    let hard_required = vec!["DB_HOST".to_string()];
    let err = write_compose_env_file(&hard_required, &[], &HashMap::new(), scratch.path()).await.unwrap_err();
    assert!(matches!(err, PipelineError::ConfigurationMissing(names) if names == vec!["DB_HOST".to_string()]));
    assert!(!scratch.path().join(".env").exists());
  }
}

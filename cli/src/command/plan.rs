use credentials::{CredentialBackend, EnvCredentialBackend};
use shipwright_core::{CliRunner, GitRepoCloner, LlmClient, Pipeline, PipelineConfig, SubprocessCliRunner};
use tokio_util::sync::CancellationToken;

use crate::{config::DeployArgs, llm::HttpLlmClient};

pub async fn handle(args: &DeployArgs, cancel: &CancellationToken) -> anyhow::Result<()> {
  let credentials = EnvCredentialBackend;
  let (request, _scratch) = super::build_request(args, &credentials).await?;

  let llm = HttpLlmClient::new(crate::config::cli_config().llm.clone());
  let cli: SubprocessCliRunner = Default::default();
  let cloner = GitRepoCloner { access_token: credentials.github_access_token() };
  let pipeline = Pipeline::new(&llm as &dyn LlmClient, &cli as &dyn CliRunner, &cloner, pipeline_config());

  let outcome = pipeline.plan(&request, _scratch.path(), cancel).await?;

  let output = serde_json::json!({
    "plan": outcome.plan,
    "validation": outcome.validation,
    "unresolved_placeholders": outcome.unresolved_placeholders,
  });
  println!("{}", serde_json::to_string_pretty(&output)?);

  if outcome.validation.has_hard_issues() {
    eprintln!("warning: plan still has unresolved hard issues, inspect before applying");
  }

  Ok(())
}

pub(crate) fn pipeline_config() -> PipelineConfig {
  let knobs = &crate::config::cli_config().pipeline;
  let mut config = PipelineConfig::default();
  if let Some(v) = knobs.max_explorer_rounds {
    config.max_explorer_rounds = v;
  }
  if let Some(v) = knobs.max_pages {
    config.max_pages = v;
  }
  if let Some(v) = knobs.max_repair_rounds {
    config.max_repair_rounds = v;
  }
  config
}

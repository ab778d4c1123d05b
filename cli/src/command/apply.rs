use credentials::{CredentialBackend, EnvCredentialBackend};
use shipwright_core::{CliRunner, GitRepoCloner, LlmClient, Pipeline, SubprocessCliRunner};
use tokio_util::sync::CancellationToken;

use crate::{config::DeployArgs, llm::HttpLlmClient};

pub async fn handle(args: &DeployArgs, cancel: &CancellationToken) -> anyhow::Result<()> {
  let credentials = EnvCredentialBackend;
  let (request, _scratch) = super::build_request(args, &credentials).await?;

  let llm = HttpLlmClient::new(crate::config::cli_config().llm.clone());
  let cli: SubprocessCliRunner = Default::default();
  let cloner = GitRepoCloner { access_token: credentials.github_access_token() };
  let pipeline = Pipeline::new(&llm as &dyn LlmClient, &cli as &dyn CliRunner, &cloner, super::plan::pipeline_config());

  let outcome = pipeline.apply(&request, _scratch.path(), cancel).await?;

  let executed: Vec<_> = outcome
    .execution
    .executed
    .iter()
    .map(|c| {
      serde_json::json!({
        "args": c.args,
        "reason": c.reason,
        "exit_code": c.exit_code,
        "self_healed": c.self_healed,
      })
    })
    .collect();

  let output = serde_json::json!({
    "plan": outcome.plan_outcome.plan,
    "executed": executed,
    "bindings": outcome.execution.bindings.as_map(),
  });
  println!("{}", serde_json::to_string_pretty(&output)?);

  Ok(())
}

//! Integrity Pass (C13). Final non-blocking LLM pass for minimal-diff
//! command-shape fixes (e.g. a waiter command missing its required
//! subcommand, user-data accidentally swallowing a trailing CLI flag).
//! Same comparison-safety as the Reviewer: parse failure keeps the
//! prior plan (§4.11).

use std::time::Duration;

use crate::{
  capability::{LlmClient, clean_json},
  entities::Plan,
};

const LLM_DEADLINE: Duration = Duration::from_secs(60);

pub async fn run(llm: &dyn LlmClient, plan: Plan) -> Plan {
  let prompt = format!(
    "Review this deployment plan only for command-shape mistakes: a waiter command \
     missing its wait-condition subcommand, a `--user-data` value that looks like it \
     swallowed a trailing CLI flag (e.g. ends mid-flag or omits a flag the reason string \
     implies), or stray whitespace in an arg that would break CLI parsing. \
     Do not change architecture, add commands, or remove commands — only fix malformed \
     ones in place. If nothing needs fixing, return the plan unchanged.\n\n\
     Plan:\n{}\n\n\
     Respond with the full Plan JSON only.",
    serde_json::to_string(&plan).unwrap_or_default(),
  );

  let raw = match llm.ask(&prompt, LLM_DEADLINE).await {
    Ok(raw) => raw,
    Err(e) => {
      tracing::warn!("integrity pass: LLM call failed, keeping prior plan: {e:#}");
      return plan;
    }
  };
  let cleaned = clean_json(&raw);
  match serde_json::from_str::<Plan>(&cleaned) {
    Ok(revised) if revised.commands.len() >= plan.commands.len() => revised,
    Ok(revised) => {
      tracing::warn!(
        "integrity pass: response dropped commands ({} -> {}), keeping prior plan",
        plan.commands.len(),
        revised.commands.len()
      );
      plan
    }
    Err(e) => {
      tracing::warn!("integrity pass: failed to parse response, keeping prior plan: {e}");
      plan
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::entities::{Command, Provider};
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
  async fn rejects_response_that_drops_commands() {
    let mut plan = Plan::new(Provider::Aws, "deploy");
    plan.commands.push(Command { args: vec!["ec2".to_string(), "run-instances".to_string()], ..Default::default() });
    plan.commands.push(Command { args: vec!["ec2".to_string(), "wait".to_string()], ..Default::default() });
    let shrunk = serde_json::to_string(&Plan {
      commands: vec![plan.commands[0].clone()],
      ..plan.clone()
    })
    .unwrap();
    let llm = ScriptedLlm { response: Mutex::new(Some(shrunk)) };
    let result = run(&llm, plan.clone()).await;
    assert_eq!(result.commands.len(), plan.commands.len());
  }

  #[tokio::test]
  async fn accepts_equal_length_fix() {
    let mut plan = Plan::new(Provider::Aws, "deploy");
    plan.commands.push(Command { args: vec!["ec2".to_string(), "run-instances".to_string()], ..Default::default() });
    let mut fixed = plan.clone();
    fixed.commands[0].args.push("--image-id".to_string());
    fixed.commands[0].args.push("<AMI_ID>".to_string());
    let llm = ScriptedLlm { response: Mutex::new(Some(serde_json::to_string(&fixed).unwrap())) };
    let result = run(&llm, plan).await;
    assert_eq!(result.commands[0].args.len(), 4);
  }
}

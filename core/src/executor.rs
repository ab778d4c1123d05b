//! Executor (C16). Runs a finalized [Plan]'s commands sequentially,
//! threading `produces` bindings from each command's JSON stdout into
//! the args of every command after it. A failing command gets exactly
//! one self-heal attempt before the run aborts (§4.14).

use std::{collections::HashMap, time::Duration};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use interpolate::Binder;
use jsonpath_rust::JsonPathQuery;
use tokio_util::sync::CancellationToken;

use crate::{
  capability::{CliRunner, LlmClient, clean_json},
  entities::{Bindings, InfraSnapshot, Plan},
  error::PipelineError,
};

const SELF_HEAL_DEADLINE: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct ExecutedCommand {
  pub args: Vec<String>,
  pub reason: String,
  pub stdout: String,
  pub stderr: String,
  pub exit_code: i32,
  pub self_healed: bool,
}

pub struct ExecutionReport {
  pub executed: Vec<ExecutedCommand>,
  pub bindings: Bindings,
}

pub async fn execute(
  cli: &dyn CliRunner,
  llm: &dyn LlmClient,
  plan: &Plan,
  infra: &InfraSnapshot,
  env: &HashMap<String, String>,
  cancel: &CancellationToken,
) -> Result<ExecutionReport, PipelineError> {
  let mut bindings = Bindings::new(infra.to_bindings());
  let mut executed = Vec::with_capacity(plan.commands.len());
  let program = plan.provider.cli_program();

  for (index, command) in plan.commands.iter().enumerate() {
    if cancel.is_cancelled() {
      return Err(PipelineError::Cancellation);
    }

    let mut args = command.args.clone();
    {
      let mut binder = Binder::new(bindings.as_map());
      binder.bind_args(&mut args);
    }
    encode_user_data_if_needed(&mut args);

    let output = cli
      .run(program, &args, env, command::DEFAULT_MUTATING_TIMEOUT, cancel)
      .await
      .map_err(|e| PipelineError::ExecutionFailure { index, args: args.clone(), stderr: format!("{e:#}") })?;

    if output.success() {
      apply_produces(&output.stdout, &command.produces, &mut bindings);
      executed.push(ExecutedCommand {
        args,
        reason: command.reason.clone(),
        stdout: output.stdout,
        stderr: output.stderr,
        exit_code: output.exit_code,
        self_healed: false,
      });
      continue;
    }

    tracing::warn!("executor: command {index} failed (exit {}), attempting self-heal", output.exit_code);
    match self_heal(llm, cli, program, &args, &output.stderr, plan, env, cancel).await {
      Some(healed_output) if healed_output.success() => {
        apply_produces(&healed_output.stdout, &command.produces, &mut bindings);
        executed.push(ExecutedCommand {
          args,
          reason: command.reason.clone(),
          stdout: healed_output.stdout,
          stderr: healed_output.stderr,
          exit_code: healed_output.exit_code,
          self_healed: true,
        });
      }
      _ => {
        return Err(PipelineError::ExecutionFailure { index, args, stderr: output.stderr });
      }
    }
  }

  Ok(ExecutionReport { executed, bindings })
}

fn apply_produces(stdout: &str, produces: &std::collections::BTreeMap<String, String>, bindings: &mut Bindings) {
  if produces.is_empty() {
    return;
  }
  let Ok(value) = serde_json::from_str::<serde_json::Value>(stdout) else {
    tracing::warn!("executor: command produced non-JSON stdout but declares `produces`, skipping extraction");
    return;
  };
  for (placeholder, path) in produces {
    match value.clone().path(path) {
      Ok(found) => {
        if let Some(text) = json_to_bound_string(&found) {
          bindings.insert_if_absent(placeholder.clone(), text);
        }
      }
      Err(e) => tracing::warn!("executor: jsonpath {path} for <{placeholder}> failed: {e}"),
    }
  }
}

fn json_to_bound_string(value: &serde_json::Value) -> Option<String> {
  match value {
    serde_json::Value::Array(items) => items.first().and_then(json_to_bound_string),
    serde_json::Value::String(s) => Some(s.clone()),
    serde_json::Value::Number(n) => Some(n.to_string()),
    serde_json::Value::Bool(b) => Some(b.to_string()),
    _ => None,
  }
}

/// Auto-encodes an EC2 `--user-data` value that looks like a raw
/// script and isn't already base64 — operators routinely paste plain
/// scripts and the AWS CLI requires the encoded form.
fn encode_user_data_if_needed(args: &mut [String]) {
  let Some(idx) = args.iter().position(|a| a == "--user-data") else { return };
  let Some(value) = args.get(idx + 1).cloned() else { return };
  if looks_like_script(&value) && !is_already_base64(&value) {
    args[idx + 1] = STANDARD.encode(value.as_bytes());
  }
}

fn looks_like_script(value: &str) -> bool {
  value.trim_start().starts_with("#!") || value.contains('\n')
}

fn is_already_base64(value: &str) -> bool {
  let trimmed = value.trim();
  trimmed.len() % 4 == 0
    && !trimmed.is_empty()
    && trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=')
    && STANDARD.decode(trimmed).is_ok()
}

async fn self_heal(
  llm: &dyn LlmClient,
  cli: &dyn CliRunner,
  program: &str,
  failed_args: &[String],
  stderr: &str,
  plan: &Plan,
  env: &HashMap<String, String>,
  cancel: &CancellationToken,
) -> Option<command::CliOutput> {
  let prompt = format!(
    "A deployment command just failed while executing this plan: {}\n\
     Failing command: `{program} {}`\n\
     stderr: {stderr}\n\
     Respond with JSON only: {{\"args\": [str, ...]}}, a single corrective replacement \
     command (same shape as the original, no leading program name). This is your only \
     attempt; if you cannot fix it, return the original args unchanged.",
    plan.summary,
    failed_args.join(" "),
  );

  let raw = llm.ask(&prompt, SELF_HEAL_DEADLINE).await.ok()?;
  let cleaned = clean_json(&raw);
  #[derive(serde::Deserialize)]
  struct Corrective {
    args: Vec<String>,
  }
  let corrective: Corrective = serde_json::from_str(&cleaned).ok()?;
  if corrective.args.is_empty() {
    return None;
  }

  cli.run(program, &corrective.args, env, command::DEFAULT_MUTATING_TIMEOUT, cancel).await.ok()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::entities::{Command, Provider};
  use async_trait::async_trait;
  use std::sync::Mutex;

  struct ScriptedCli {
    outputs: Mutex<Vec<anyhow::Result<command::CliOutput>>>,
  }

  #[async_trait]
  impl CliRunner for ScriptedCli {
    async fn run(
      &self,
      _program: &str,
      _args: &[String],
      _env: &HashMap<String, String>,
      _timeout: Duration,
      _cancel: &CancellationToken,
    ) -> anyhow::Result<command::CliOutput> {
      self.outputs.lock().unwrap().remove(0)
    }
  }

  struct UnusedLlm;
  #[async_trait]
  impl LlmClient for UnusedLlm {
    async fn ask(&self, _prompt: &str, _deadline: Duration) -> anyhow::Result<String> {
      unreachable!("self-heal should not be invoked when every command succeeds")
    }
  }

  #[tokio::test]
  async fn threads_produces_into_later_commands() {
    let mut plan = Plan::new(Provider::Aws, "deploy");
    let mut launch = Command { args: vec!["ec2".to_string(), "run-instances".to_string()], ..Default::default() };
    launch.produces.insert("INSTANCE_ID".to_string(), "$.Instances[0].InstanceId".to_string());
    plan.commands.push(launch);
    plan.commands.push(Command {
      args: vec!["ec2".to_string(), "wait".to_string(), "instance-running".to_string(), "--instance-ids".to_string(), "<INSTANCE_ID>".to_string()],
      ..Default::default()
    });

    let cli = ScriptedCli {
      outputs: Mutex::new(vec![
        Ok(command::CliOutput { stdout: r#"{"Instances":[{"InstanceId":"i-0abc"}]}"#.to_string(), stderr: String::new(), exit_code: 0 }),
        Ok(command::CliOutput { stdout: "{}".to_string(), stderr: String::new(), exit_code: 0 }),
      ]),
    };
    let infra = InfraSnapshot::default();
    let cancel = CancellationToken::new();
    let report = execute(&cli, &UnusedLlm, &plan, &infra, &HashMap::new(), &cancel).await.unwrap();

    assert_eq!(report.executed[1].args[4], "i-0abc");
    assert_eq!(report.bindings.get("INSTANCE_ID").unwrap(), "i-0abc");
  }

  #[test]
  fn encodes_plain_script_user_data() {
    let mut args = vec!["ec2".to_string(), "run-instances".to_string(), "--user-data".to_string(), "#!/bin/bash\necho hi".to_string()];
    encode_user_data_if_needed(&mut args);
    assert_ne!(args[3], "#!/bin/bash\necho hi");
    assert!(STANDARD.decode(&args[3]).is_ok());
  }

  #[test]
  fn leaves_already_encoded_user_data_alone() {
    let encoded = STANDARD.encode(b"#!/bin/bash\necho hi");
    let mut args = vec!["ec2".to_string(), "run-instances".to_string(), "--user-data".to_string(), encoded.clone()];
    encode_user_data_if_needed(&mut args);
    assert_eq!(args[3], encoded);
  }
}

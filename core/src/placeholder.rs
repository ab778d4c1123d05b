//! Placeholder Resolver (C14). Applies infra-snapshot bindings to
//! every command's args, then asks the LLM to resolve whatever
//! `<TOKEN>`s remain and aren't produced by an earlier command in the
//! plan — those are left for the Executor's runtime bindings instead
//! (§4.12).

use std::{
  collections::{HashMap, HashSet},
  time::Duration,
};

use interpolate::{Binder, find_placeholders};

use crate::{
  capability::{LlmClient, clean_json},
  entities::{InfraSnapshot, Plan},
};

const LLM_DEADLINE: Duration = Duration::from_secs(45);

pub struct ResolveOutcome {
  pub plan: Plan,
  pub unresolved: Vec<String>,
}

pub async fn resolve(llm: &dyn LlmClient, mut plan: Plan, infra: &InfraSnapshot) -> ResolveOutcome {
  let produced_names: HashSet<String> =
    plan.commands.iter().flat_map(|c| c.produces.keys().cloned()).collect();

  let infra_bindings = infra.to_bindings();
  let mut still_unresolved: HashSet<String> = HashSet::new();
  {
    let mut binder = Binder::new(&infra_bindings);
    for command in &mut plan.commands {
      for name in binder.bind_args(&mut command.args) {
        still_unresolved.insert(name);
      }
    }
  }

  // Anything produced later in the plan is the Executor's job to
  // bind at runtime, not this static pass's.
  let needs_llm: Vec<String> =
    still_unresolved.iter().filter(|n| !produced_names.contains(*n)).cloned().collect();

  if needs_llm.is_empty() {
    let unresolved = finalize_unresolved(&plan, &produced_names);
    return ResolveOutcome { plan, unresolved };
  }

  let mut sorted_needs = needs_llm.clone();
  sorted_needs.sort();
  let prompt = format!(
    "These deployment plan placeholders could not be resolved from the existing cloud \
     account inventory: {sorted_needs:?}\n\
     Plan summary: {}\n\
     Provider: {}\n\
     Respond with JSON only: a flat object mapping each placeholder name to its resolved \
     string value, or an empty string if it must be left for the operator to fill in at \
     apply time. Example: {{\"ADMIN_CIDR\": \"\", \"REGION\": \"us-east-1\"}}",
    plan.summary, plan.provider.as_str(),
  );

  let extra_bindings: HashMap<String, String> = match llm.ask(&prompt, LLM_DEADLINE).await {
    Ok(raw) => {
      let cleaned = clean_json(&raw);
      match serde_json::from_str::<HashMap<String, String>>(&cleaned) {
        Ok(map) => map.into_iter().filter(|(_, v)| !v.is_empty()).collect(),
        Err(e) => {
          tracing::warn!("placeholder resolver: failed to parse LLM response: {e}");
          HashMap::new()
        }
      }
    }
    Err(e) => {
      tracing::warn!("placeholder resolver: LLM call failed: {e:#}");
      HashMap::new()
    }
  };

  if !extra_bindings.is_empty() {
    let mut binder = Binder::new(&extra_bindings);
    for command in &mut plan.commands {
      binder.bind_args(&mut command.args);
    }
  }

  let unresolved = finalize_unresolved(&plan, &produced_names);
  ResolveOutcome { plan, unresolved }
}

fn finalize_unresolved(plan: &Plan, produced_names: &HashSet<String>) -> Vec<String> {
  let mut remaining: Vec<String> = plan
    .commands
    .iter()
    .flat_map(|c| c.args.iter())
    .flat_map(|arg| find_placeholders(arg))
    .filter(|name| !produced_names.contains(name))
    .collect();
  remaining.sort();
  remaining.dedup();
  remaining
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::entities::{Command, Provider, SecurityGroupInfo};
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
  async fn resolves_infra_alias_without_calling_llm() {
    let mut plan = Plan::new(Provider::Aws, "deploy");
    plan.commands.push(Command {
      args: vec!["ec2".to_string(), "authorize-security-group-ingress".to_string(), "--group-id".to_string(), "<ALB_SG_ID>".to_string()],
      ..Default::default()
    });
    let infra = InfraSnapshot {
      security_groups: vec![SecurityGroupInfo { name: "app-alb-sg".to_string(), id: "sg-42".to_string() }],
      ..Default::default()
    };
    let llm = ScriptedLlm { response: Mutex::new(None) };
    let outcome = resolve(&llm, plan, &infra).await;
    assert_eq!(outcome.plan.commands[0].args[3], "sg-42");
    assert!(outcome.unresolved.is_empty());
  }

  #[tokio::test]
  async fn leaves_produced_placeholder_for_executor() {
    let mut plan = Plan::new(Provider::Aws, "deploy");
    let mut producer = Command {
      args: vec!["ec2".to_string(), "run-instances".to_string()],
      ..Default::default()
    };
    producer.produces.insert("INSTANCE_ID".to_string(), "$.Instances[0].InstanceId".to_string());
    plan.commands.push(producer);
    plan.commands.push(Command {
      args: vec!["ec2".to_string(), "wait".to_string(), "instance-running".to_string(), "--instance-ids".to_string(), "<INSTANCE_ID>".to_string()],
      ..Default::default()
    });
    let infra = InfraSnapshot::default();
    let llm = ScriptedLlm { response: Mutex::new(None) };
    let outcome = resolve(&llm, plan, &infra).await;
    assert_eq!(outcome.plan.commands[1].args[4], "<INSTANCE_ID>");
    assert!(outcome.unresolved.is_empty());
  }

  #[tokio::test]
  async fn falls_back_to_llm_for_truly_unbound_placeholder() {
    let mut plan = Plan::new(Provider::Aws, "deploy");
    plan.commands.push(Command {
      args: vec!["ec2".to_string(), "authorize-security-group-ingress".to_string(), "--cidr".to_string(), "<ADMIN_CIDR>".to_string()],
      ..Default::default()
    });
    let infra = InfraSnapshot::default();
    let llm = ScriptedLlm { response: Mutex::new(Some(r#"{"ADMIN_CIDR": "203.0.113.0/24"}"#.to_string())) };
    let outcome = resolve(&llm, plan, &infra).await;
    assert_eq!(outcome.plan.commands[0].args[3], "203.0.113.0/24");
    assert!(outcome.unresolved.is_empty());
  }

  #[tokio::test]
  async fn llm_empty_string_means_leave_unresolved() {
    let mut plan = Plan::new(Provider::Aws, "deploy");
    plan.commands.push(Command {
      args: vec!["ec2".to_string(), "authorize-security-group-ingress".to_string(), "--cidr".to_string(), "<ADMIN_CIDR>".to_string()],
      ..Default::default()
    });
    let infra = InfraSnapshot::default();
    let llm = ScriptedLlm { response: Mutex::new(Some(r#"{"ADMIN_CIDR": ""}"#.to_string())) };
    let outcome = resolve(&llm, plan, &infra).await;
    assert_eq!(outcome.unresolved, vec!["ADMIN_CIDR".to_string()]);
  }
}

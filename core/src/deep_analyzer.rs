//! Deep Analyzer (C5). One LLM call that reads the profile and the
//! docker analysis and produces a semantic description of the app:
//! services, external dependencies, the command that starts it, and
//! the env vars it actually needs. Runs in parallel with the Infra
//! Scanner and Docker Analyzer in Phase 1.

use std::time::Duration;

use crate::{
  capability::{LlmClient, clean_json},
  entities::{DeepAnalysis, DockerAnalysis, RepoProfile},
  error::PipelineError,
};

const MAX_ATTEMPTS: u32 = 2;
const LLM_DEADLINE: Duration = Duration::from_secs(90);
const MAX_KEY_FILE_CHARS: usize = 12_000;

pub async fn analyze(
  llm: &dyn LlmClient,
  profile: &RepoProfile,
  docker: &DockerAnalysis,
) -> Result<DeepAnalysis, PipelineError> {
  let prompt = build_prompt(profile, docker);

  let mut last_network_err = None;
  for attempt in 0..MAX_ATTEMPTS {
    let raw = match llm.ask(&prompt, LLM_DEADLINE).await {
      Ok(raw) => raw,
      Err(e) => {
        tracing::warn!("deep analyzer attempt {attempt}: LLM call failed: {e:#}");
        last_network_err = Some(e);
        continue;
      }
    };
    let cleaned = clean_json(&raw);
    match serde_json::from_str::<DeepAnalysis>(&cleaned) {
      Ok(analysis) => return Ok(analysis),
      Err(e) => {
        tracing::warn!("deep analyzer attempt {attempt}: failed to parse response: {e}");
      }
    }
  }

  if let Some(source) = last_network_err {
    tracing::warn!("deep analyzer exhausted retries, degrading to stub: {source:#}");
  }

  // Every attempt either failed outright or returned unparseable text.
  // This analyzer is best-effort, so degrade to a stub derived from the
  // profile rather than abort the run.
  Ok(DeepAnalysis::stub(profile))
}

fn build_prompt(profile: &RepoProfile, docker: &DockerAnalysis) -> String {
  let key_files: String = profile
    .key_files
    .iter()
    .map(|(path, contents)| {
      let truncated = if contents.len() > MAX_KEY_FILE_CHARS {
        &contents[..MAX_KEY_FILE_CHARS]
      } else {
        contents.as_str()
      };
      format!("--- {path} ---\n{truncated}\n")
    })
    .collect::<Vec<_>>()
    .join("\n");

  format!(
    "Analyze this repository for cloud deployment.\n\
     Profile: {}\n\
     Docker analysis: multi_stage={} primary_port={:?} hard_required_env={:?}\n\
     Key files:\n{key_files}\n\
     Respond with JSON only, matching this shape:\n\
     {{\"description\": str, \"services\": [str], \"external_dependencies\": [str], \
     \"listening_port\": int|null, \"build_command\": str|null, \"start_command\": str|null, \
     \"env_vars\": [{{\"name\": str, \"description\": str, \"required\": bool, \"default\": str|null, \"example\": str|null}}], \
     \"health_path\": str|null, \"exposes_http\": bool}}",
    profile.summary(),
    docker.multi_stage,
    docker.primary_port,
    docker.hard_required_env,
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use async_trait::async_trait;
  use std::sync::Mutex;

  struct ScriptedLlm {
    responses: Mutex<Vec<anyhow::Result<String>>>,
  }

  #[async_trait]
  impl LlmClient for ScriptedLlm {
    async fn ask(&self, _prompt: &str, _deadline: Duration) -> anyhow::Result<String> {
      self.responses.lock().unwrap().remove(0)
    }
  }

  #[tokio::test]
  async fn parses_well_formed_response() {
    let llm = ScriptedLlm {
      responses: Mutex::new(vec![Ok(
        "```json\n{\"description\":\"a web app\",\"listening_port\":3000,\"exposes_http\":true}\n```"
          .to_string(),
      )]),
    };
    let profile = RepoProfile::default();
    let docker = DockerAnalysis::default();
    let analysis = analyze(&llm, &profile, &docker).await.unwrap();
    assert_eq!(analysis.description, "a web app");
    assert_eq!(analysis.listening_port, Some(3000));
  }

  #[tokio::test]
  async fn falls_back_to_stub_after_unparseable_responses() {
    let llm = ScriptedLlm {
      responses: Mutex::new(vec![Ok("not json".to_string()), Ok("still not json".to_string())]),
    };
    let mut profile = RepoProfile::default();
    profile.ports.push(8080);
    let docker = DockerAnalysis::default();
    let analysis = analyze(&llm, &profile, &docker).await.unwrap();
    assert_eq!(analysis.listening_port, Some(8080));
  }

  #[tokio::test]
  async fn falls_back_to_stub_when_every_call_fails() {
    let llm = ScriptedLlm {
      responses: Mutex::new(vec![Err(anyhow::anyhow!("timeout")), Err(anyhow::anyhow!("timeout"))]),
    };
    let mut profile = RepoProfile::default();
    profile.ports.push(8080);
    let docker = DockerAnalysis::default();
    let analysis = analyze(&llm, &profile, &docker).await.unwrap();
    assert_eq!(analysis.listening_port, Some(8080));
  }
}

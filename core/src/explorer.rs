//! File Explorer (C2). LLM-directed agent loop that requests
//! additional files by relative path, enriching
//! [RepoProfile::key_files] beyond what the profiler's fixed
//! candidate list picked up.

use std::{path::Path, time::Duration};

use serde::Deserialize;

use crate::{capability::{LlmClient, clean_json}, entities::RepoProfile};

pub const DEFAULT_MAX_ROUNDS: u32 = 3;
const MAX_FILE_BYTES: usize = 32 * 1024;
const MAX_AGGREGATE_BYTES: usize = 256 * 1024;
const LLM_DEADLINE: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize, Default)]
struct ExplorerResponse {
  #[serde(default)]
  read: Vec<String>,
  #[serde(default)]
  done: bool,
}

pub async fn explore(
  llm: &dyn LlmClient,
  profile: &mut RepoProfile,
  checkout: &Path,
  max_rounds: u32,
) -> anyhow::Result<()> {
  let mut already_read: Vec<String> = profile.key_files.keys().cloned().collect();
  let mut aggregate_bytes: usize = profile.key_files.values().map(|v| v.len()).sum();
  let mut consecutive_empty = 0u32;

  for round in 0..max_rounds {
    let prompt = build_prompt(profile, &already_read, round);
    let raw = llm.ask(&prompt, LLM_DEADLINE).await?;
    let cleaned = clean_json(&raw);
    let response: ExplorerResponse = match serde_json::from_str(&cleaned) {
      Ok(r) => r,
      Err(e) => {
        tracing::warn!("file explorer round {round}: failed to parse response: {e}");
        continue;
      }
    };

    if response.read.is_empty() {
      consecutive_empty += 1;
      if response.done || consecutive_empty >= 2 {
        break;
      }
      continue;
    }
    consecutive_empty = 0;

    for rel_path in response.read {
      if already_read.contains(&rel_path) {
        continue;
      }
      let full = checkout.join(&rel_path);
      // Guard against the model requesting a path outside the checkout.
      let Ok(canonical) = full.canonicalize() else { continue };
      if !canonical.starts_with(checkout) {
        continue;
      }
      let Ok(contents) = std::fs::read_to_string(&canonical) else { continue };
      if aggregate_bytes >= MAX_AGGREGATE_BYTES {
        break;
      }
      let truncated = if contents.len() > MAX_FILE_BYTES {
        contents[..MAX_FILE_BYTES].to_string()
      } else {
        contents
      };
      aggregate_bytes += truncated.len();
      already_read.push(rel_path.clone());
      profile.key_files.insert(rel_path, truncated);
    }

    if response.done {
      break;
    }
  }

  Ok(())
}

fn build_prompt(profile: &RepoProfile, already_read: &[String], round: u32) -> String {
  format!(
    "You are exploring a repository to prepare it for cloud deployment.\n\
     Round {round}.\n\
     Profile summary: {}\n\
     File tree:\n{}\n\
     Files already read: {:?}\n\
     Respond with JSON only: {{\"read\": [\"relative/path\", ...], \"done\": bool}}.\n\
     Request at most 5 additional files per round, only ones not already read, \
     that would materially change how this repo should be deployed \
     (build configs, entrypoints, env samples, infra manifests). \
     Set done=true once you have enough to proceed.",
    profile.summary(),
    profile.file_tree,
    already_read,
  )
}

#[cfg(test)]
mod tests {
  use super::*;
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

  #[tokio::test]
  async fn stops_on_done_true() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("extra.txt"), "hello").unwrap();
    let llm = ScriptedLlm {
      responses: Mutex::new(vec![
        "```json\n{\"read\":[\"extra.txt\"],\"done\":true}\n```".to_string(),
      ]),
    };
    let mut profile = RepoProfile::default();
    explore(&llm, &mut profile, dir.path(), DEFAULT_MAX_ROUNDS).await.unwrap();
    assert_eq!(profile.key_files.get("extra.txt").unwrap(), "hello");
  }

  #[tokio::test]
  async fn stops_after_two_empty_rounds() {
    let dir = tempfile::tempdir().unwrap();
    let llm = ScriptedLlm {
      responses: Mutex::new(vec![
        "{\"read\":[],\"done\":false}".to_string(),
        "{\"read\":[],\"done\":false}".to_string(),
        "{\"read\":[\"never-seen.txt\"],\"done\":false}".to_string(),
      ]),
    };
    let mut profile = RepoProfile::default();
    explore(&llm, &mut profile, dir.path(), 5).await.unwrap();
    assert!(profile.key_files.is_empty());
  }
}

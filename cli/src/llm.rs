//! [LlmClient] production implementation: a thin REST client against
//! an OpenAI-chat-completions-shaped endpoint. The provider adapter
//! itself is out of scope for the pipeline (it only consumes
//! `Ask(prompt) -> text`); this is the one concrete adapter the CLI
//! ships so the pipeline has something real to call.

use std::{sync::OnceLock, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shipwright_core::LlmClient;

use crate::config::LlmConfig;

pub struct HttpLlmClient {
  config: LlmConfig,
  api_key: Option<String>,
}

impl HttpLlmClient {
  pub fn new(config: LlmConfig) -> Self {
    let api_key = std::env::var(&config.api_key_env).ok();
    HttpLlmClient { config, api_key }
  }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
  model: &'a str,
  messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
  role: &'a str,
  content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
  choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
  message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
  content: String,
}

#[async_trait]
impl LlmClient for HttpLlmClient {
  async fn ask(&self, prompt: &str, deadline: Duration) -> anyhow::Result<String> {
    let body = ChatRequest { model: &self.config.model, messages: vec![ChatMessage { role: "user", content: prompt }] };

    let mut request = http_client().post(&self.config.base_url).json(&body);
    if let Some(key) = &self.api_key {
      request = request.bearer_auth(key);
    }

    let response = tokio::time::timeout(deadline, request.send())
      .await
      .context("LLM request timed out")?
      .context("LLM request failed")?;

    let status = response.status();
    if !status.is_success() {
      let text = response.text().await.unwrap_or_default();
      anyhow::bail!("LLM endpoint returned {status}: {text}");
    }

    let parsed: ChatResponse = response.json().await.context("failed to parse LLM response body")?;
    parsed
      .choices
      .into_iter()
      .next()
      .map(|c| c.message.content)
      .context("LLM response had no choices")
  }
}

fn http_client() -> &'static reqwest::Client {
  static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
  CLIENT.get_or_init(reqwest::Client::new)
}

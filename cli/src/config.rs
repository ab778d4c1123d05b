use std::{path::PathBuf, sync::OnceLock};

use anyhow::Context;
use clap::Parser;
use serde::{Deserialize, Serialize};
use shipwright_types::logger::LogConfig;

#[derive(Debug, Parser)]
#[command(name = "shipwright", version, about = "Deploy Intelligence Pipeline CLI", author)]
pub struct CliArgs {
  #[command(subcommand)]
  pub command: Command,

  /// Sets the path of a config file or directory to use. Can be passed
  /// multiple times.
  #[arg(long, short = 'c', global = true)]
  pub config_path: Option<Vec<PathBuf>>,

  /// Whether to debug print on configuration load (on startup).
  #[arg(long, short = 'd', global = true)]
  pub debug_startup: Option<bool>,
}

#[derive(Debug, Clone, clap::Args)]
pub struct DeployArgs {
  /// The repository to deploy, eg. "https://github.com/openclaw/openclaw".
  pub repo: String,

  /// The plain-language deployment request, eg. "deploy this behind an
  /// ALB with a managed Postgres database".
  pub question: String,

  /// Target cloud provider.
  #[arg(long, short = 'p', default_value = "aws")]
  pub provider: String,

  /// Branch to check out. Defaults to the repository's default branch.
  #[arg(long, short = 'b')]
  pub branch: Option<String>,

  /// Force a specific deployment method (eg. "ec2", "eks"), overriding
  /// the Architect's own choice.
  #[arg(long, short = 't')]
  pub target: Option<String>,
}

#[derive(Debug, Clone, clap::Subcommand)]
pub enum Command {
  /// Produce a deployment plan without executing it.
  Plan(DeployArgs),
  /// Produce a deployment plan and execute it against the target provider.
  Apply(DeployArgs),
}

pub fn cli_args() -> &'static CliArgs {
  static CLI_ARGS: OnceLock<CliArgs> = OnceLock::new();
  CLI_ARGS.get_or_init(CliArgs::parse)
}

/// Environment variables read on top of (and overriding) the config
/// file. Mirrors the `SHIPWRIGHT_*` naming the rest of the ambient
/// stack uses for its own env-driven knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct Env {
  #[serde(default = "default_config_paths")]
  pub shipwright_config_paths: Vec<PathBuf>,
  #[serde(default = "default_config_keywords")]
  pub shipwright_config_keywords: Vec<String>,
  #[serde(default)]
  pub shipwright_debug_startup: bool,

  pub shipwright_logging_level: Option<shipwright_types::logger::LogLevel>,
  pub shipwright_logging_stdio: Option<shipwright_types::logger::StdioLogMode>,
  pub shipwright_logging_pretty: Option<bool>,

  /// Base URL of an OpenAI-chat-completions-shaped endpoint.
  pub shipwright_llm_base_url: Option<String>,
  pub shipwright_llm_model: Option<String>,
  /// Name of the environment variable holding the LLM API key, so the
  /// key itself never has to be written into a config file.
  pub shipwright_llm_api_key_env: Option<String>,
}

fn default_config_paths() -> Vec<PathBuf> {
  vec![PathBuf::from(".")]
}

fn default_config_keywords() -> Vec<String> {
  vec!["*shipwright*".to_string()]
}

pub fn cli_env() -> &'static Env {
  static ENV: OnceLock<Env> = OnceLock::new();
  ENV.get_or_init(|| envy::from_env().expect("failed to parse shipwright CLI environment"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
  #[serde(default = "default_llm_base_url")]
  pub base_url: String,
  #[serde(default = "default_llm_model")]
  pub model: String,
  #[serde(default = "default_llm_api_key_env")]
  pub api_key_env: String,
}

fn default_llm_base_url() -> String {
  "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_llm_model() -> String {
  "gpt-4o".to_string()
}

fn default_llm_api_key_env() -> String {
  "OPENAI_API_KEY".to_string()
}

impl Default for LlmConfig {
  fn default() -> Self {
    LlmConfig { base_url: default_llm_base_url(), model: default_llm_model(), api_key_env: default_llm_api_key_env() }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PipelineKnobs {
  pub max_explorer_rounds: Option<u32>,
  pub max_pages: Option<usize>,
  pub max_repair_rounds: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipwrightConfig {
  #[serde(default)]
  pub logging: LogConfig,
  #[serde(default)]
  pub llm: LlmConfig,
  #[serde(default)]
  pub pipeline: PipelineKnobs,
}

impl Default for ShipwrightConfig {
  fn default() -> Self {
    ShipwrightConfig { logging: LogConfig::default(), llm: LlmConfig::default(), pipeline: PipelineKnobs::default() }
  }
}

pub fn cli_config() -> &'static ShipwrightConfig {
  static CONFIG: OnceLock<ShipwrightConfig> = OnceLock::new();
  CONFIG.get_or_init(|| {
    let args = cli_args();
    let env = cli_env();
    let debug_startup = args.debug_startup.unwrap_or(env.shipwright_debug_startup);
    let config_paths = args.config_path.clone().unwrap_or_else(|| env.shipwright_config_paths.clone());
    let config_keywords = env.shipwright_config_keywords.iter().map(String::as_str).collect::<Vec<_>>();

    let loaded: serde_json::Value = config::ConfigLoader {
      paths: &config_paths.iter().map(PathBuf::as_path).collect::<Vec<_>>(),
      match_wildcards: &config_keywords,
      include_file_name: ".shipwrightinclude",
      merge_nested: true,
      extend_array: true,
      debug_print: debug_startup,
    }
    .load::<serde_json::Value>()
    .unwrap_or(serde_json::Value::Object(Default::default()));

    let mut config: ShipwrightConfig = serde_json::from_value(loaded)
      .context("failed to parse shipwright config")
      .unwrap_or_default();

    if let Some(level) = env.shipwright_logging_level {
      config.logging.level = level;
    }
    if let Some(stdio) = env.shipwright_logging_stdio {
      config.logging.stdio = stdio;
    }
    if let Some(pretty) = env.shipwright_logging_pretty {
      config.logging.pretty = pretty;
    }
    if let Some(base_url) = &env.shipwright_llm_base_url {
      config.llm.base_url = base_url.clone();
    }
    if let Some(model) = &env.shipwright_llm_model {
      config.llm.model = model.clone();
    }
    if let Some(api_key_env) = &env.shipwright_llm_api_key_env {
      config.llm.api_key_env = api_key_env.clone();
    }

    config
  })
}

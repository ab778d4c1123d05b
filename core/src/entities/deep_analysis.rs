use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvVarSpec {
  pub name: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub required: bool,
  #[serde(default)]
  pub default: Option<String>,
  #[serde(default)]
  pub example: Option<String>,
}

/// LLM-produced semantic view of the application, from the single
/// Deep Analyzer (C5) call. Parse failures downgrade to
/// [DeepAnalysis::stub], never abort the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeepAnalysis {
  pub description: String,
  #[serde(default)]
  pub services: Vec<String>,
  #[serde(default)]
  pub external_dependencies: Vec<String>,
  pub listening_port: Option<u16>,
  pub build_command: Option<String>,
  pub start_command: Option<String>,
  #[serde(default)]
  pub env_vars: Vec<EnvVarSpec>,
  pub health_path: Option<String>,
  #[serde(default)]
  pub exposes_http: bool,
}

impl DeepAnalysis {
  /// Minimal stub built from the profile summary when the LLM's JSON
  /// response fails to parse after retries (TransientLLM, §7).
  pub fn stub(profile: &super::RepoProfile) -> Self {
    DeepAnalysis {
      description: format!(
        "Repository at {} ({})",
        profile.repo_url,
        profile.language.as_deref().unwrap_or("unknown language"),
      ),
      services: Vec::new(),
      external_dependencies: Vec::new(),
      listening_port: profile.ports.first().copied(),
      build_command: None,
      start_command: None,
      env_vars: profile
        .env_vars
        .iter()
        .map(|name| EnvVarSpec {
          name: name.clone(),
          description: String::new(),
          required: false,
          default: None,
          example: None,
        })
        .collect(),
      health_path: None,
      exposes_http: !profile.ports.is_empty(),
    }
  }

  pub fn required_env_names(&self) -> Vec<String> {
    self
      .env_vars
      .iter()
      .filter(|v| v.required)
      .map(|v| v.name.clone())
      .collect()
  }
}

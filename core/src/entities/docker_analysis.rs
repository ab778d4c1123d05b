use serde::{Deserialize, Serialize};

/// Parsed Docker/compose topology, produced by the pure-function
/// Docker Analyzer (C3). Never touches the network or the LLM.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DockerAnalysis {
  pub multi_stage: bool,
  /// Tiebreak order applied while deriving this: published port >
  /// exposed port > profile-detected port, lowest wins within a tier.
  pub primary_port: Option<u16>,
  pub service_names: Vec<String>,
  pub has_healthcheck: bool,
  pub volume_mounts: Vec<String>,
  pub hard_required_env: Vec<String>,
  pub build_command: Option<String>,
  pub run_command: Option<String>,
  pub warnings: Vec<String>,
}

use serde::{Deserialize, Serialize};

use super::Provider;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sizing {
  pub cpu: Option<String>,
  pub memory: Option<String>,
  pub instance_type: Option<String>,
}

/// The architecture decision reached by the single Architect LLM call
/// (C6), then mutated *only* by the deterministic overrides that run
/// immediately after parsing (project signatures, static-site
/// defaults, explicit user target). After that point it's frozen for
/// the rest of the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchitectDecision {
  pub provider: Provider,
  pub method: String,
  #[serde(default)]
  pub reasoning: String,
  #[serde(default)]
  pub build_steps: Vec<String>,
  #[serde(default)]
  pub sizing: Sizing,
  #[serde(default)]
  pub needs_alb: bool,
  #[serde(default)]
  pub needs_db: bool,
  #[serde(default)]
  pub db_service: Option<String>,
  #[serde(default)]
  pub estimated_monthly_cost: Option<f64>,
  #[serde(default)]
  pub cost_breakdown: Vec<(String, f64)>,
}

impl ArchitectDecision {
  /// Valid method names per provider. The architect's LLM response
  /// and the deterministic overrides are both constrained to this
  /// set; an unrecognized method from the model is clamped to the
  /// provider's default.
  pub fn allowed_methods(provider: Provider) -> &'static [&'static str] {
    match provider {
      Provider::Aws => &[
        "ec2",
        "ecs-fargate",
        "apprunner",
        "lambda",
        "lightsail",
        "eks",
        "s3-cloudfront",
      ],
      Provider::Gcp => &["cloud-run", "gce", "gke", "app-engine"],
      Provider::Azure => &["container-apps", "app-service", "vm", "aks"],
      Provider::Cloudflare => &["workers", "pages"],
    }
  }

  pub fn default_method(provider: Provider) -> &'static str {
    match provider {
      Provider::Aws => "ec2",
      Provider::Gcp => "cloud-run",
      Provider::Azure => "container-apps",
      Provider::Cloudflare => "workers",
    }
  }
}

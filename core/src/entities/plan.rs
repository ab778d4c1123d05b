use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
  Aws,
  Gcp,
  Azure,
  Cloudflare,
}

impl Provider {
  pub fn as_str(&self) -> &'static str {
    match self {
      Provider::Aws => "aws",
      Provider::Gcp => "gcp",
      Provider::Azure => "azure",
      Provider::Cloudflare => "cloudflare",
    }
  }

  /// Program used to invoke this provider's CLI. Cloudflare plans use
  /// `wrangler` rather than a provider-branded binary.
  pub fn cli_program(&self) -> &'static str {
    match self {
      Provider::Aws => "aws",
      Provider::Gcp => "gcloud",
      Provider::Azure => "az",
      Provider::Cloudflare => "wrangler",
    }
  }

  pub fn parse(s: &str) -> Option<Provider> {
    match s.to_ascii_lowercase().as_str() {
      "aws" => Some(Provider::Aws),
      "gcp" | "google" => Some(Provider::Gcp),
      "azure" => Some(Provider::Azure),
      "cloudflare" | "cf" => Some(Provider::Cloudflare),
      _ => None,
    }
  }
}

/// One provider-CLI invocation. `args` never includes the leading
/// program name (`aws`, `gcloud`, ...) or profile/region flags — those
/// are injected by the executor at invocation time, not baked into
/// the plan (§4.14 / Design Notes).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Command {
  pub args: Vec<String>,
  #[serde(default)]
  pub reason: String,
  /// Maps a placeholder name to a JSONPath into this command's JSON
  /// stdout. Defines the dataflow edge other commands' placeholders
  /// can resolve against.
  #[serde(default)]
  pub produces: BTreeMap<String, String>,
}

impl Command {
  pub fn joined_args(&self) -> String {
    self.args.join(" ")
  }

  /// True if this is one of the closed-set launch operations from
  /// §4.8 — `service create` or `subcommand` pairs recognized
  /// regardless of provider, matched against the first two tokens.
  pub fn is_launch_operation(&self) -> bool {
    const LAUNCH_OPS: &[(&str, &str)] = &[
      ("ec2", "run-instances"),
      ("ecs", "create-service"),
      ("ecs", "run-task"),
      ("apprunner", "create-service"),
      ("lambda", "create-function"),
      ("lightsail", "create-container-service"),
      ("lightsail", "create-instances"),
    ];
    let (Some(a), Some(b)) = (self.args.first(), self.args.get(1)) else {
      return false;
    };
    LAUNCH_OPS.iter().any(|(x, y)| x == a && y == b)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
  pub version: i64,
  pub created_at: String,
  pub provider: Provider,
  pub question: String,
  #[serde(default)]
  pub summary: String,
  pub commands: Vec<Command>,
  #[serde(default)]
  pub notes: Vec<String>,
}

impl Plan {
  pub fn new(provider: Provider, question: impl Into<String>) -> Plan {
    Plan {
      version: 1,
      created_at: chrono::Utc::now().to_rfc3339(),
      provider,
      question: question.into(),
      summary: String::new(),
      commands: Vec::new(),
      notes: Vec::new(),
    }
  }

  pub fn has_launch_operation(&self) -> bool {
    self.commands.iter().any(Command::is_launch_operation)
  }

  /// Index of the first command matching `program, subcommand`, if
  /// any.
  pub fn position_of(&self, program: &str, subcommand: &str) -> Option<usize> {
    self.commands.iter().position(|c| {
      c.args.first().map(String::as_str) == Some(program)
        && c.args.get(1).map(String::as_str) == Some(subcommand)
    })
  }
}

/// One page produced by the Paged Planner (C8). The JSON parser
/// additionally tolerates a bare array of [Command], `{"page": ...}`
/// and `{"pages": [...]}` per §6.3 / Design Notes "JSON tolerance" —
/// see [crate::planner::parse_plan_page].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanPage {
  pub done: bool,
  #[serde(default)]
  pub summary: Option<String>,
  #[serde(default)]
  pub notes: Option<Vec<String>>,
  #[serde(default)]
  pub commands: Vec<Command>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanValidation {
  pub is_valid: bool,
  pub issues: Vec<String>,
  pub fixes: Vec<String>,
  pub warnings: Vec<String>,
  pub unresolved_placeholders: Vec<String>,
}

impl PlanValidation {
  pub const HARD_PREFIX: &'static str = "[HARD]";

  pub fn hard_issues(&self) -> Vec<&str> {
    self
      .issues
      .iter()
      .filter(|i| i.starts_with(Self::HARD_PREFIX))
      .map(String::as_str)
      .collect()
  }

  pub fn has_hard_issues(&self) -> bool {
    self.issues.iter().any(|i| i.starts_with(Self::HARD_PREFIX))
  }

  /// Deterministic issue count used by the sanitizer's fail-open
  /// comparison (§4.10, "Sanitizer monotonicity" law). Counts issues
  /// + unresolved placeholders; warnings are advisory and excluded so
  /// a sanitization pass that's merely noisier-but-not-worse isn't
  /// discarded.
  pub fn deterministic_issue_count(&self) -> usize {
    self.issues.len() + self.unresolved_placeholders.len()
  }
}

//! Docker Analyzer (C3). Pure-function parser over Dockerfile +
//! compose text already captured in [RepoProfile::key_files]. Never
//! touches the network or the LLM.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::entities::{DockerAnalysis, RepoProfile, parse_port};

static EXPOSE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?im)^\s*EXPOSE\s+(.+)$").unwrap());
static FROM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?im)^\s*FROM\s+").unwrap());
static HEALTHCHECK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?im)^\s*HEALTHCHECK\b").unwrap());
static COMPOSE_PORT_RE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r#"["']?(\d{1,5}):(\d{1,5})["']?"#).unwrap());
static COMPOSE_SERVICE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^  ([a-zA-Z0-9_.-]+):\s*$").unwrap());
static COMPOSE_VOLUME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"["']?([./~][^:"'\n]+):([^:"'\n]+)["']?"#).unwrap());
static COMPOSE_ENV_VAR_RE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"\$\{([A-Z][A-Z0-9_]*)(:-[^}]*)?\}").unwrap());

pub fn analyze(profile: &RepoProfile) -> DockerAnalysis {
  let mut analysis = DockerAnalysis::default();

  let dockerfile = profile
    .key_files
    .iter()
    .find(|(path, _)| path.ends_with("Dockerfile"))
    .map(|(_, contents)| contents.as_str());

  let mut published_ports = Vec::new();
  let mut exposed_ports = Vec::new();

  if let Some(dockerfile) = dockerfile {
    analysis.multi_stage = FROM_RE.find_iter(dockerfile).count() > 1;
    analysis.has_healthcheck = HEALTHCHECK_RE.is_match(dockerfile);
    for cap in EXPOSE_RE.captures_iter(dockerfile) {
      for token in cap[1].split_whitespace() {
        let token = token.split('/').next().unwrap_or(token);
        if let Some(port) = parse_port(token) {
          exposed_ports.push(port);
        }
      }
    }
  }

  let compose = profile
    .key_files
    .iter()
    .find(|(path, _)| path.ends_with("docker-compose.yml") || path.ends_with("docker-compose.yaml") || path.ends_with("compose.yml") || path.ends_with("compose.yaml"))
    .map(|(_, contents)| contents.as_str());

  if let Some(compose) = compose {
    for cap in COMPOSE_SERVICE_RE.captures_iter(compose) {
      analysis.service_names.push(cap[1].to_string());
    }
    for cap in COMPOSE_PORT_RE.captures_iter(compose) {
      if let (Some(host), Some(container)) = (parse_port(&cap[1]), parse_port(&cap[2])) {
        published_ports.push((host, container));
      }
    }
    for cap in COMPOSE_VOLUME_RE.captures_iter(compose) {
      analysis.volume_mounts.push(format!("{}:{}", &cap[1], &cap[2]));
    }
    analysis.has_healthcheck = analysis.has_healthcheck || compose.contains("healthcheck:");

    // Hard-required env vars: `${VAR}` without a `:-default` fallback.
    let mut required = HashSet::new();
    for cap in COMPOSE_ENV_VAR_RE.captures_iter(compose) {
      if cap.get(2).is_none() {
        required.insert(cap[1].to_string());
      }
    }
    let mut required: Vec<String> = required.into_iter().collect();
    required.sort();
    analysis.hard_required_env = required;
  }

  // Primary port tiebreak: published > exposed > profile ports,
  // lowest wins within tier.
  analysis.primary_port = published_ports
    .iter()
    .map(|(_, container)| *container)
    .min()
    .or_else(|| exposed_ports.iter().min().copied())
    .or_else(|| profile.ports.iter().min().copied());

  if dockerfile.is_some() || compose.is_some() {
    let build_cmd = if profile.has_compose { "docker compose build" } else { "docker build -t app ." };
    let run_cmd = if profile.has_compose {
      "docker compose up -d".to_string()
    } else if let Some(port) = analysis.primary_port {
      format!("docker run -d -p {port}:{port} app")
    } else {
      "docker run -d app".to_string()
    };
    analysis.build_command = Some(build_cmd.to_string());
    analysis.run_command = Some(run_cmd);
  }

  if analysis.primary_port.is_none() && (profile.has_dockerfile || profile.has_compose) {
    analysis.warnings.push("no exposed/published port found; defaulting is risky".to_string());
  }

  analysis
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn profile_with(files: &[(&str, &str)]) -> RepoProfile {
    let mut profile = RepoProfile::default();
    let mut key_files = HashMap::new();
    for (name, contents) in files {
      key_files.insert(name.to_string(), contents.to_string());
    }
    profile.key_files = key_files;
    profile.has_dockerfile = files.iter().any(|(n, _)| n.ends_with("Dockerfile"));
    profile.has_compose = files.iter().any(|(n, _)| n.contains("compose"));
    profile
  }

  #[test]
  fn multi_stage_and_expose_detected() {
    let profile = profile_with(&[(
      "Dockerfile",
      "FROM node:20 AS build\nRUN npm ci\nFROM node:20\nEXPOSE 8080\nHEALTHCHECK CMD curl -f http://localhost:8080/\n",
    )]);
    let analysis = analyze(&profile);
    assert!(analysis.multi_stage);
    assert!(analysis.has_healthcheck);
    assert_eq!(analysis.primary_port, Some(8080));
  }

  #[test]
  fn published_port_wins_over_exposed() {
    let profile = profile_with(&[
      ("Dockerfile", "FROM node:20\nEXPOSE 3000\n"),
      (
        "docker-compose.yml",
        "services:\n  web:\n    ports:\n      - \"80:3000\"\n",
      ),
    ]);
    let analysis = analyze(&profile);
    assert_eq!(analysis.primary_port, Some(3000));
  }

  #[test]
  fn hard_required_env_excludes_defaulted() {
    let profile = profile_with(&[(
      "docker-compose.yml",
      "services:\n  web:\n    environment:\n      - DATABASE_URL=${DATABASE_URL}\n      - PORT=${PORT:-3000}\n",
    )]);
    let analysis = analyze(&profile);
    assert_eq!(analysis.hard_required_env, vec!["DATABASE_URL".to_string()]);
  }
}

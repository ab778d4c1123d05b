//! Repo Profiler (C1). Clones the target repository shallowly and
//! walks the tree to classify language, framework, package manager,
//! ports, env vars and DB hints. Fails only on clone failure;
//! detection failures degrade to empty/unknown fields rather than
//! aborting the run (§4.1).

use std::{collections::HashSet, path::Path};

use once_cell::sync::Lazy;
use regex::Regex;
use walkdir::WalkDir;

use crate::{
  capability::RepoCloner,
  entities::{RepoProfile, parse_port},
  error::PipelineError,
};

mod detect;

const MAX_TREE_ENTRIES: usize = 2000;
const KEY_FILE_SIZE_CAP: usize = 64 * 1024;

pub async fn profile_repo(
  cloner: &dyn RepoCloner,
  repo_url: &str,
  branch: Option<&str>,
  scratch_dir: &Path,
) -> Result<RepoProfile, PipelineError> {
  let result = cloner
    .clone(repo_url, branch, scratch_dir)
    .await
    .map_err(|e| PipelineError::Profiler(format!("{e:#}")))?;

  if !result.success() {
    return Err(PipelineError::Profiler(format!(
      "clone reported failure: {:?}",
      result.logs.last().map(|l| l.stderr.clone())
    )));
  }

  Ok(profile_checkout(repo_url, scratch_dir))
}

/// Pure-function profiling of an already-checked-out tree. Split out
/// from [profile_repo] so tests can exercise detection against a
/// `tempfile` fixture without a network clone.
pub fn profile_checkout(repo_url: &str, checkout: &Path) -> RepoProfile {
  let mut profile = RepoProfile { repo_url: repo_url.to_string(), ..Default::default() };

  let mut entries = Vec::new();
  for entry in WalkDir::new(checkout)
    .max_depth(6)
    .into_iter()
    .filter_entry(|e| !is_ignored_dir(e.file_name().to_str().unwrap_or("")))
    .filter_map(|e| e.ok())
    .take(MAX_TREE_ENTRIES)
  {
    if entry.file_type().is_file() {
      if let Ok(rel) = entry.path().strip_prefix(checkout) {
        entries.push(rel.to_path_buf());
      }
    }
  }

  profile.file_tree = entries
    .iter()
    .map(|p| p.display().to_string())
    .collect::<Vec<_>>()
    .join("\n");

  let names: HashSet<String> =
    entries.iter().filter_map(|p| p.file_name()).map(|n| n.to_string_lossy().to_string()).collect();

  profile.has_dockerfile = names.contains("Dockerfile");
  profile.has_compose =
    names.iter().any(|n| n == "docker-compose.yml" || n == "docker-compose.yaml" || n == "compose.yml" || n == "compose.yaml");
  profile.is_monorepo = names.contains("pnpm-workspace.yaml")
    || names.contains("lerna.json")
    || names.contains("turbo.json")
    || names.contains("nx.json");

  profile.package_manager = detect::package_manager(&names);
  profile.lock_files = detect::lock_files(&names);
  profile.language = detect::language(&entries, &names);
  profile.db_hint = detect::db_hint(&names);

  for script in ["bootstrap.sh", "deploy.sh", "docker-entrypoint.sh", "start.sh"] {
    if names.contains(script) {
      profile.bootstrap_scripts.push(script.to_string());
    }
  }

  // Read the small set of key files that drive framework detection
  // and env-var scanning.
  let mut aggregate_bytes = 0usize;
  for candidate in detect::KEY_FILE_CANDIDATES {
    if !names.contains(*candidate) {
      continue;
    }
    let Some(path) = entries.iter().find(|p| p.file_name().map(|n| n == *candidate).unwrap_or(false))
    else {
      continue;
    };
    let full = checkout.join(path);
    let Ok(contents) = std::fs::read_to_string(&full) else { continue };
    if aggregate_bytes + contents.len() > 20 * KEY_FILE_SIZE_CAP {
      break;
    }
    aggregate_bytes += contents.len().min(KEY_FILE_SIZE_CAP);
    let truncated = if contents.len() > KEY_FILE_SIZE_CAP {
      contents[..KEY_FILE_SIZE_CAP].to_string()
    } else {
      contents
    };
    profile.key_files.insert(path.display().to_string(), truncated);
  }

  profile.framework = detect::framework(&profile.key_files, &names);
  profile.ports = detect_ports(&profile.key_files);
  profile.env_vars = detect_env_vars(&profile.key_files, checkout, &names);
  profile.deploy_hints = detect::deploy_hints(&profile);

  profile
}

fn is_ignored_dir(name: &str) -> bool {
  matches!(name, ".git" | "node_modules" | "target" | "dist" | "build" | ".next" | "vendor")
}

static LISTEN_RE: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r#"(?:listen|PORT)\D{0,12}(\d{2,5})"#).unwrap()
});

fn detect_ports(key_files: &std::collections::HashMap<String, String>) -> Vec<u16> {
  let mut ports = Vec::new();
  for contents in key_files.values() {
    for cap in LISTEN_RE.captures_iter(contents) {
      if let Some(port) = parse_port(&cap[1]) {
        if !ports.contains(&port) {
          ports.push(port);
        }
      }
    }
  }
  ports.sort_unstable();
  ports
}

static ENV_REF_RE: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"process\.env\.([A-Z][A-Z0-9_]*)|os\.environ(?:\.get)?\(['\"]([A-Z][A-Z0-9_]*)|std::env::var\(['\"]([A-Z][A-Z0-9_]*)").unwrap()
});

fn detect_env_vars(
  key_files: &std::collections::HashMap<String, String>,
  checkout: &Path,
  names: &HashSet<String>,
) -> Vec<String> {
  let mut vars = HashSet::new();

  for env_file in [".env", ".env.example", ".env.sample"] {
    if names.contains(env_file) {
      if let Ok(contents) = std::fs::read_to_string(checkout.join(env_file)) {
        if let Ok(parsed) = shipwright_types::parsers::parse_key_value_list(&contents) {
          for (key, _) in parsed {
            vars.insert(key);
          }
        }
      }
    }
  }

  for contents in key_files.values() {
    for cap in ENV_REF_RE.captures_iter(contents) {
      for group in [1, 2, 3] {
        if let Some(m) = cap.get(group) {
          vars.insert(m.as_str().to_string());
        }
      }
    }
  }

  let mut out: Vec<String> = vars.into_iter().collect();
  out.sort();
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;

  #[test]
  fn profiles_a_node_express_checkout() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
      dir.path().join("package.json"),
      r#"{"name":"app","dependencies":{"express":"^4.0.0"}}"#,
    )
    .unwrap();
    fs::write(dir.path().join("package-lock.json"), "{}").unwrap();
    fs::write(
      dir.path().join("index.js"),
      "const app = require('express')();\napp.listen(process.env.PORT || 3000);\n",
    )
    .unwrap();
    fs::write(dir.path().join("Dockerfile"), "FROM node:20\nEXPOSE 3000\n").unwrap();

    let profile = profile_checkout("https://github.com/example/app", dir.path());
    assert_eq!(profile.language.as_deref(), Some("javascript"));
    assert_eq!(profile.package_manager.as_deref(), Some("npm"));
    assert!(profile.has_dockerfile);
    assert!(profile.ports.contains(&3000));
    assert!(profile.env_vars.contains(&"PORT".to_string()));
  }
}

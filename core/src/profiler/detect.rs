use std::{collections::HashMap, collections::HashSet, path::PathBuf};

use crate::entities::RepoProfile;

/// Files read in full (size-capped) because framework/port/env
/// detection needs their contents, not just their names.
pub const KEY_FILE_CANDIDATES: &[&str] = &[
  "package.json",
  "requirements.txt",
  "pyproject.toml",
  "Pipfile",
  "go.mod",
  "Cargo.toml",
  "Gemfile",
  "composer.json",
  "pom.xml",
  "build.gradle",
  "index.js",
  "server.js",
  "app.js",
  "main.py",
  "app.py",
  "manage.py",
  "main.go",
  "main.rs",
  "Dockerfile",
  "docker-compose.yml",
  "docker-compose.yaml",
  "wp-config.php",
  "wp-config-sample.php",
];

pub fn package_manager(names: &HashSet<String>) -> Option<String> {
  if names.contains("pnpm-lock.yaml") {
    Some("pnpm".to_string())
  } else if names.contains("yarn.lock") {
    Some("yarn".to_string())
  } else if names.contains("bun.lockb") || names.contains("bun.lock") {
    Some("bun".to_string())
  } else if names.contains("package-lock.json") {
    Some("npm".to_string())
  } else if names.contains("poetry.lock") {
    Some("poetry".to_string())
  } else if names.contains("Pipfile.lock") {
    Some("pipenv".to_string())
  } else if names.contains("Cargo.lock") {
    Some("cargo".to_string())
  } else if names.contains("go.sum") {
    Some("go".to_string())
  } else if names.contains("Gemfile.lock") {
    Some("bundler".to_string())
  } else if names.contains("composer.lock") {
    Some("composer".to_string())
  } else {
    None
  }
}

pub fn lock_files(names: &HashSet<String>) -> Vec<String> {
  const KNOWN: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "bun.lockb",
    "bun.lock",
    "poetry.lock",
    "Pipfile.lock",
    "Cargo.lock",
    "go.sum",
    "Gemfile.lock",
    "composer.lock",
  ];
  KNOWN.iter().filter(|f| names.contains(**f)).map(|f| f.to_string()).collect()
}

pub fn language(entries: &[PathBuf], names: &HashSet<String>) -> Option<String> {
  if names.contains("Cargo.toml") {
    return Some("rust".to_string());
  }
  if names.contains("go.mod") {
    return Some("go".to_string());
  }
  if names.contains("package.json") {
    return Some(if entries.iter().any(|p| p.extension().map(|e| e == "ts" || e == "tsx").unwrap_or(false)) {
      "typescript".to_string()
    } else {
      "javascript".to_string()
    });
  }
  if names.contains("requirements.txt") || names.contains("pyproject.toml") || names.contains("Pipfile") {
    return Some("python".to_string());
  }
  if names.contains("Gemfile") {
    return Some("ruby".to_string());
  }
  if names.contains("composer.json") {
    return Some("php".to_string());
  }
  if names.contains("pom.xml") || names.contains("build.gradle") {
    return Some("java".to_string());
  }
  None
}

pub fn db_hint(names: &HashSet<String>) -> Option<String> {
  if names.contains("wp-config.php") || names.contains("wp-config-sample.php") {
    Some("mysql".to_string())
  } else {
    None
  }
}

pub fn framework(key_files: &HashMap<String, String>, names: &HashSet<String>) -> Option<String> {
  if names.contains("wp-config-sample.php") || names.contains("wp-config.php") {
    return Some("wordpress".to_string());
  }
  if let Some(pkg) = key_files.get("package.json") {
    for (dep, fw) in [
      ("\"next\"", "next.js"),
      ("\"nuxt\"", "nuxt"),
      ("\"@sveltejs/kit\"", "sveltekit"),
      ("\"astro\"", "astro"),
      ("\"express\"", "express"),
      ("\"fastify\"", "fastify"),
      ("\"vite\"", "vite"),
      ("\"react\"", "react"),
      ("\"@angular/core\"", "angular"),
    ] {
      if pkg.contains(dep) {
        return Some(fw.to_string());
      }
    }
  }
  if let Some(reqs) = key_files.get("requirements.txt") {
    if reqs.to_ascii_lowercase().contains("django") {
      return Some("django".to_string());
    }
    if reqs.to_ascii_lowercase().contains("flask") {
      return Some("flask".to_string());
    }
    if reqs.to_ascii_lowercase().contains("fastapi") {
      return Some("fastapi".to_string());
    }
  }
  None
}

pub fn deploy_hints(profile: &RepoProfile) -> Vec<String> {
  let mut hints = Vec::new();
  if profile.framework.as_deref() == Some("wordpress") {
    hints.push("wordpress: expects a MySQL/MariaDB backend and a writable wp-content".to_string());
  }
  if matches!(profile.framework.as_deref(), Some("vite") | Some("astro")) && !profile.has_dockerfile {
    hints.push("static build output: candidate for object storage + CDN hosting".to_string());
  }
  if profile.has_compose {
    hints.push("compose file present: multi-service bootstrap likely".to_string());
  }
  hints
}

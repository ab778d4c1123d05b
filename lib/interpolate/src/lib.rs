use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use shipwright_types::Log;

/// Matches a placeholder token: `<UPPER_SNAKE>`. Never `${X}` or `$X`
/// — those are left untouched, since a repo's own bootstrap scripts
/// may use shell variable syntax that must not be mistaken for a
/// plan placeholder.
static PLACEHOLDER: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"<([A-Z0-9_]+)>").unwrap());

/// Returns every distinct `<NAME>` placeholder referenced in `text`,
/// in first-seen order.
pub fn find_placeholders(text: &str) -> Vec<String> {
  let mut seen = HashSet::new();
  let mut out = Vec::new();
  for cap in PLACEHOLDER.captures_iter(text) {
    let name = cap[1].to_string();
    if seen.insert(name.clone()) {
      out.push(name);
    }
  }
  out
}

/// Resolves placeholder bindings into command argument tokens.
///
/// Unlike komodo's `Interpolator` (which expands `[[VAR]]` templates
/// recursively via `svi`), plan placeholders are resolved once, by
/// literal substring replacement, per §6.4: `<NAME>` is replaced with
/// its bound value verbatim, never re-expanded.
pub struct Binder<'a> {
  bindings: &'a HashMap<String, String>,
  applied: HashSet<(String, String)>,
}

impl<'a> Binder<'a> {
  pub fn new(bindings: &'a HashMap<String, String>) -> Self {
    Binder { bindings, applied: Default::default() }
  }

  /// Substitutes every bound placeholder appearing in `arg`. Returns
  /// the list of placeholder names still present afterward (i.e. not
  /// covered by `self.bindings`).
  pub fn bind_arg(&mut self, arg: &mut String) -> Vec<String> {
    let replacers: Vec<(String, String)> = self
      .bindings
      .iter()
      .map(|(name, value)| (format!("<{name}>"), value.clone()))
      .collect();
    let before = arg.clone();
    *arg = svi::replace_in_string(arg, &replacers);
    if *arg != before {
      for (name, value) in &self.bindings.clone() {
        let token = format!("<{name}>");
        if before.contains(&token) {
          self.applied.insert((name.clone(), value.clone()));
        }
      }
    }
    find_placeholders(arg)
  }

  pub fn bind_args(&mut self, args: &mut [String]) -> Vec<String> {
    let mut unresolved = HashSet::new();
    for arg in args.iter_mut() {
      for name in self.bind_arg(arg) {
        unresolved.insert(name);
      }
    }
    let mut out: Vec<String> = unresolved.into_iter().collect();
    out.sort();
    out
  }

  pub fn push_logs(&self, logs: &mut Vec<Log>) {
    if self.applied.is_empty() {
      return;
    }
    let mut applied: Vec<_> = self.applied.iter().collect();
    applied.sort();
    logs.push(Log::simple(
      "Resolve Placeholders",
      applied
        .iter()
        .map(|(name, value)| format!("<{name}> => {value}"))
        .collect::<Vec<_>>()
        .join("\n"),
    ));
  }
}

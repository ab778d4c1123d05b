use colored::Colorize;
use serror::Serror;

/// Renders an [anyhow::Error]-derived [Serror] for terminal output:
/// the pipeline runs as a one-shot CLI, not a web UI, so unlike most
/// of the ambient stack this module trades komodo's HTML `<span>`
/// wrapping for ANSI coloring via `colored`.
pub fn format_serror(Serror { error, trace }: &Serror) -> String {
  let trace = if !trace.is_empty() {
    let mut out = format!("\n\n{}:", "trace".dimmed());
    for (i, msg) in trace.iter().enumerate() {
      out.push_str(&format!("\n  {}: {msg}", (i + 1).to_string().dimmed()));
    }
    out
  } else {
    Default::default()
  };
  format!("{}: {error}{trace}", "ERROR".red().bold())
}

pub fn muted(content: impl std::fmt::Display) -> String {
  content.to_string().dimmed().to_string()
}

pub fn bold(content: impl std::fmt::Display) -> String {
  content.to_string().bold().to_string()
}

pub fn warn(content: impl std::fmt::Display) -> String {
  format!("{}: {content}", "WARN".yellow().bold())
}

pub fn hard_issue(content: impl std::fmt::Display) -> String {
  format!("{}: {content}", "[HARD]".red().bold())
}

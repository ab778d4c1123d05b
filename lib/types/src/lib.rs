/// Subtypes of [LogConfig][logger::LogConfig].
pub mod logger;
/// The [Log] struct produced by every shelled-out command.
pub mod update;
/// Free-function parsers shared across the repo profiler, docker
/// analyzer and command runner.
pub mod parsers;

pub use update::Log;

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EnvironmentVar {
  pub variable: String,
  pub value: String,
}

pub fn environment_vars_from_str(
  input: &str,
) -> anyhow::Result<Vec<EnvironmentVar>> {
  parsers::parse_key_value_list(input).map(|list| {
    list
      .into_iter()
      .map(|(variable, value)| EnvironmentVar { variable, value })
      .collect()
  })
}

/// Unix timestamp in milliseconds as i64.
pub fn ship_timestamp() -> i64 {
  chrono::Utc::now().timestamp_millis()
}

pub fn optional_string(string: impl Into<String>) -> Option<String> {
  let string = string.into();
  if string.is_empty() { None } else { Some(string) }
}

use thiserror::Error;

/// Domain error taxonomy (§7). These are kinds, not exhaustive
/// wrappers — most phases recover internally (see the asymmetric
/// recovery strategy: plan-time is permissive, apply-time is strict)
/// and only surface one of these when recovery is exhausted.
#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("repo clone failed: {0}")]
  Profiler(String),

  #[error("LLM call failed after retries in {phase}: {source}")]
  TransientLlm {
    phase: &'static str,
    #[source]
    source: anyhow::Error,
  },

  #[error("unresolved hard issues after repair: {0:?}")]
  InvariantViolation(Vec<String>),

  #[error("execution failed at command {index} ({args:?}): {stderr}")]
  ExecutionFailure { index: usize, args: Vec<String>, stderr: String },

  #[error("cancelled")]
  Cancellation,

  #[error("unresolved placeholder(s) at apply time: {0:?}")]
  ConfigurationMissing(Vec<String>),

  #[error("paged planner made no progress for 3 consecutive pages")]
  Stuck,
}

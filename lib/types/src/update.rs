use serde::{Deserialize, Serialize};

/// Record of a single shelled-out command: the command line itself,
/// its captured stdout/stderr, and whether it exited zero.
///
/// Every phase of the pipeline that shells out (repo clone, docker
/// analysis probes, infra scan queries, plan execution) produces a
/// `Vec<Log>` rather than bailing on the first failure, so a run can
/// be inspected after the fact even when a later step aborted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Log {
  pub stage: String,
  pub command: String,
  pub stdout: String,
  pub stderr: String,
  pub success: bool,
  pub start_ts: i64,
  pub end_ts: i64,
}

impl Log {
  pub fn simple(stage: impl Into<String>, msg: impl Into<String>) -> Log {
    let ts = crate::ship_timestamp();
    Log {
      stage: stage.into(),
      command: String::new(),
      stdout: msg.into(),
      stderr: String::new(),
      success: true,
      start_ts: ts,
      end_ts: ts,
    }
  }

  pub fn error(stage: impl Into<String>, msg: impl Into<String>) -> Log {
    let ts = crate::ship_timestamp();
    Log {
      stage: stage.into(),
      command: String::new(),
      stdout: String::new(),
      stderr: msg.into(),
      success: false,
      start_ts: ts,
      end_ts: ts,
    }
  }
}

pub fn all_logs_success(logs: &[Log]) -> bool {
  logs.iter().all(|log| log.success)
}

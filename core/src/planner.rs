//! Paged Planner (C8). Produces a plan's commands in bounded-size
//! pages, each prompt conditioned on the commands already accepted and
//! the hard issues the previous validation pass found (§4.7).

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::{
  capability::{LlmClient, clean_json},
  entities::{Command, Plan, PlanPage},
  error::PipelineError,
};

pub const DEFAULT_PAGE_SIZE: usize = 8;
pub const DEFAULT_MAX_PAGES: usize = 20;
const LLM_DEADLINE: Duration = Duration::from_secs(60);
const STUCK_THRESHOLD: u32 = 3;

/// Whether stuck detection (three consecutive zero-progress pages) is
/// fatal. Plan-only mode logs a warning and returns best-effort;
/// apply mode treats it as a fatal [PipelineError::Stuck] (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanMode {
  PlanOnly,
  Apply,
}

pub struct PageContext<'a> {
  pub base_prompt: &'a str,
  pub required_launch_ops: &'a [&'a str],
  pub produced_bindings: &'a [String],
  pub hard_issues: &'a [String],
  pub force_not_done: bool,
}

pub async fn plan_page(
  llm: &dyn LlmClient,
  plan: &Plan,
  ctx: &PageContext<'_>,
) -> anyhow::Result<PlanPage> {
  let prompt = build_page_prompt(plan, ctx);
  let raw = llm.ask(&prompt, LLM_DEADLINE).await?;
  let cleaned = clean_json(&raw);
  parse_plan_page(&cleaned)
}

fn build_page_prompt(plan: &Plan, ctx: &PageContext<'_>) -> String {
  let tail: Vec<&Command> = plan.commands.iter().rev().take(DEFAULT_PAGE_SIZE).rev().collect();
  format!(
    "{}\n\n\
     Commands accepted so far (tail): {:?}\n\
     Already-produced bindings: {:?}\n\
     Required launch operations still missing: {:?}\n\
     Hard issues that must be addressed this page: {:?}\n\
     Produce at most {DEFAULT_PAGE_SIZE} commands as JSON matching PlanPage: \
     {{\"done\": bool, \"summary\"?: str, \"notes\"?: [str], \"commands\": [\
     {{\"args\": [str], \"reason\": str, \"produces\": {{\"<PLACEHOLDER>\": \"<JSONPath>\"}}}}]}}\n\
     {}",
    ctx.base_prompt,
    tail.iter().map(|c| c.joined_args()).collect::<Vec<_>>(),
    ctx.produced_bindings,
    ctx.required_launch_ops,
    ctx.hard_issues,
    if ctx.force_not_done {
      "Hard issues remain unresolved from the prior page: you MUST set \"done\": false."
    } else {
      ""
    },
  )
}

/// Tolerant PlanPage parser (Design Notes, "JSON tolerance"): accepts
/// an object matching [PlanPage], a bare array of [Command], or a
/// wrapped `{"page": PlanPage}` / `{"pages": [PlanPage, ...]}`.
pub fn parse_plan_page(text: &str) -> anyhow::Result<PlanPage> {
  let value: Value = serde_json::from_str(text)?;

  if let Value::Array(_) = &value {
    let commands: Vec<Command> = serde_json::from_value(value)?;
    return Ok(PlanPage { done: false, summary: None, notes: None, commands });
  }

  if let Value::Object(map) = &value {
    if map.contains_key("pages") {
      #[derive(Deserialize)]
      struct Pages {
        pages: Vec<PlanPage>,
      }
      let wrapped: Pages = serde_json::from_value(value.clone())?;
      return Ok(merge_pages(wrapped.pages));
    }
    if let Some(page) = map.get("page") {
      let single: PlanPage = serde_json::from_value(page.clone())?;
      return Ok(single);
    }
  }

  Ok(serde_json::from_value(value)?)
}

fn merge_pages(pages: Vec<PlanPage>) -> PlanPage {
  let done = pages.last().map(|p| p.done).unwrap_or(false);
  let summary = pages.iter().rev().find_map(|p| p.summary.clone());
  let mut notes = Vec::new();
  let mut commands = Vec::new();
  for page in pages {
    if let Some(n) = page.notes {
      notes.extend(n);
    }
    commands.extend(page.commands);
  }
  PlanPage { done, summary, notes: if notes.is_empty() { None } else { Some(notes) }, commands }
}

/// Appends `page`'s commands onto `plan`, deduplicating by exact
/// arg-tuple ("Page idempotence" law, §8). Returns how many commands
/// were actually new.
pub fn append_page(plan: &mut Plan, page: &PlanPage) -> usize {
  let mut added = 0;
  for command in &page.commands {
    if plan.commands.iter().any(|existing| existing.args == command.args) {
      continue;
    }
    plan.commands.push(command.clone());
    added += 1;
  }
  added
}

/// Drives the paging loop until termination. `run_page` is injected so
/// callers can interleave C9 validation between pages without this
/// module depending on the validator directly.
pub async fn run_pages<F, Fut>(
  plan: &mut Plan,
  mode: PlanMode,
  max_pages: usize,
  mut run_page: F,
) -> Result<(), PipelineError>
where
  F: FnMut(&Plan) -> Fut,
  Fut: std::future::Future<Output = anyhow::Result<(PlanPage, bool)>>,
{
  let mut consecutive_zero_progress = 0u32;

  for _ in 0..max_pages {
    let (page, hard_issues_remain) = run_page(plan).await.map_err(|source| PipelineError::TransientLlm {
      phase: "paged_planner",
      source,
    })?;

    let added = append_page(plan, &page);
    if added == 0 {
      consecutive_zero_progress += 1;
    } else {
      consecutive_zero_progress = 0;
    }

    if consecutive_zero_progress >= STUCK_THRESHOLD {
      if mode == PlanMode::Apply {
        return Err(PipelineError::Stuck);
      }
      tracing::warn!("paged planner stuck after {STUCK_THRESHOLD} zero-progress pages, returning best-effort plan");
      return Ok(());
    }

    if page.done && !hard_issues_remain {
      return Ok(());
    }
  }

  Ok(())
}

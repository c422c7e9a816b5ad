// Copyright 2025 Chisomo Makombo Sakala
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Drives `run`, `sync` and `render` over the resolved scopes.
//!
//! Every scope is one unit of work on a bounded pool. A worker owns its
//! scope's harness process and record file, so workers share nothing but
//! the immutable settings; their outcomes are gathered once all are done.

use crate::cli::TargetArgs;
use crate::config::Settings;
use crate::error::BenchtrackError;
use crate::error::ScopeError;
use crate::harness::run_harness;
use crate::model::PackageData;
use crate::model::ParsedResult;
use crate::report::ReportRenderer;
use crate::report::derive;
use crate::store::HistoryStore;
use crate::store::merge;
use crate::target::Scope;
use crate::target::TargetResolver;
use crate::target::TargetSpec;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::Instrument;

/// What to do with each scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
  /// Invoke and parse only; results go to stdout as JSON lines.
  Run,
  /// Invoke, parse, merge as of the given day, save and render.
  Sync { as_of: NaiveDate },
  /// Load and render only.
  Render,
}

impl Mode {
  fn name(self) -> &'static str {
    match self {
      Mode::Run => "run",
      Mode::Sync { .. } => "sync",
      Mode::Render => "render",
    }
  }
}

#[derive(Debug)]
pub struct ScopeOutcome {
  pub scope: String,
  pub results: usize,
  pub report: Option<PathBuf>,
}

#[derive(Debug)]
pub struct ScopeFailure {
  pub scope: String,
  pub error: ScopeError,
}

/// Per-scope outcomes, in discovery order.
#[derive(Debug, Default)]
pub struct Summary {
  pub succeeded: Vec<ScopeOutcome>,
  pub failed: Vec<ScopeFailure>,
}

impl Summary {
  pub fn total(&self) -> usize {
    self.succeeded.len() + self.failed.len()
  }

  /// Logs every outcome, then turns any failure into an error.
  pub fn into_result(self) -> Result<Self, BenchtrackError> {
    for outcome in &self.succeeded {
      match &outcome.report {
        Some(report) => tracing::info!(
          scope = %outcome.scope,
          results = outcome.results,
          report = %report.display(),
          "Scope done"
        ),
        None => tracing::info!(scope = %outcome.scope, results = outcome.results, "Scope done"),
      }
    }
    for failure in &self.failed {
      tracing::error!(scope = %failure.scope, "{}", failure.error);
    }
    if self.failed.is_empty() {
      tracing::info!(scopes = self.total(), "All scopes completed");
      Ok(self)
    } else {
      Err(BenchtrackError::ScopesFailed {
        failed: self.failed.len(),
        total: self.total(),
      })
    }
  }
}

#[derive(Serialize)]
struct RunLine<'a> {
  scope: &'a str,
  #[serde(flatten)]
  result: &'a ParsedResult,
}

/// Resolves the target and processes every scope in `mode`.
pub async fn execute(settings: Settings, target: &TargetArgs, mode: Mode) -> Result<Summary, BenchtrackError> {
  let span = tracing::info_span!("execute", command = mode.name(), target = %target.target);

  async {
    let spec = TargetResolver::new(&settings.config, &settings.repo_root)?.resolve(
      &target.target,
      target.recursive,
      target.scope.as_deref(),
    )?;
    tracing::info!(scopes = spec.scopes.len(), filter = spec.harness_filter(), "Resolved target");

    let renderer = match mode {
      Mode::Run => None,
      Mode::Sync { .. } | Mode::Render => Some(Arc::new(ReportRenderer::new(&settings.config.report)?)),
    };

    Ok(process_scopes(Arc::new(settings), spec, mode, renderer).await)
  }
  .instrument(span)
  .await
}

/// Runs one worker per scope, at most `settings.jobs` at a time.
pub async fn process_scopes(
  settings: Arc<Settings>,
  spec: TargetSpec,
  mode: Mode,
  renderer: Option<Arc<ReportRenderer>>,
) -> Summary {
  let filter: Arc<str> = Arc::from(spec.harness_filter());
  let total = spec.scopes.len();
  let mut outcomes: Vec<Option<Result<ScopeOutcome, ScopeError>>> = (0..total).map(|_| None).collect();
  let ids: Vec<String> = spec.scopes.iter().map(|s| s.id.clone()).collect();

  let mut set: JoinSet<Result<ScopeOutcome, ScopeError>> = JoinSet::new();
  let mut task_index = HashMap::new();
  let mut pending = spec.scopes.into_iter().enumerate();

  let spawn = |set: &mut JoinSet<Result<ScopeOutcome, ScopeError>>, scope: Scope| {
    let span = tracing::info_span!("scope", scope = %scope.id);
    set
      .spawn(
        process_scope(
          Arc::clone(&settings),
          scope,
          Arc::clone(&filter),
          mode,
          renderer.clone(),
        )
        .instrument(span),
      )
      .id()
  };

  // Fill the pool, then refill as workers finish.
  for (index, scope) in pending.by_ref().take(settings.jobs.max(1)) {
    task_index.insert(spawn(&mut set, scope), index);
  }

  while let Some(joined) = set.join_next_with_id().await {
    let (id, outcome) = match joined {
      Ok((id, outcome)) => (id, outcome),
      Err(e) => {
        let id = e.id();
        let scope = task_index.get(&id).map(|&i| ids[i].clone()).unwrap_or_default();
        (id, Err(ScopeError::Worker { scope, source: e }))
      }
    };
    if let Some(&index) = task_index.get(&id) {
      outcomes[index] = Some(outcome);
    }
    if let Some((index, scope)) = pending.next() {
      task_index.insert(spawn(&mut set, scope), index);
    }
  }

  let mut summary = Summary::default();
  for (scope, outcome) in ids.into_iter().zip(outcomes) {
    match outcome {
      Some(Ok(outcome)) => summary.succeeded.push(outcome),
      Some(Err(error)) => summary.failed.push(ScopeFailure { scope, error }),
      None => {}
    }
  }
  summary
}

async fn process_scope(
  settings: Arc<Settings>,
  scope: Scope,
  filter: Arc<str>,
  mode: Mode,
  renderer: Option<Arc<ReportRenderer>>,
) -> Result<ScopeOutcome, ScopeError> {
  let config = &settings.config;
  let store = HistoryStore::new(config);

  match mode {
    Mode::Run => {
      let results = run_harness(&config.harness, &scope, &filter, &config.benchmark_prefix, |result| {
        let line = RunLine {
          scope: &scope.id,
          result,
        };
        match serde_json::to_string(&line) {
          Ok(json) => println!("{json}"),
          Err(e) => tracing::warn!(error = %e, "Failed to serialize result"),
        }
      })
      .await?;
      tracing::info!(results = results.len(), "Run complete");
      Ok(ScopeOutcome {
        scope: scope.id,
        results: results.len(),
        report: None,
      })
    }
    Mode::Sync { as_of } => {
      // Refuse to measure on top of a record we could not read.
      let existing = store.load(&scope)?;

      let results = run_harness(&config.harness, &scope, &filter, &config.benchmark_prefix, |result| {
        tracing::info!(name = %result.name, ns_per_op = result.ns_per_op, "Result");
      })
      .await?;

      let merged = merge(existing, as_of, &results);
      store.save(&merged, &scope)?;
      let report = write_report(renderer.as_deref(), &scope, &merged)?;

      tracing::info!(results = results.len(), %as_of, "Sync complete");
      Ok(ScopeOutcome {
        scope: scope.id,
        results: results.len(),
        report,
      })
    }
    Mode::Render => {
      let data = store.load(&scope)?;
      let report = write_report(renderer.as_deref(), &scope, &data)?;
      tracing::info!("Render complete");
      Ok(ScopeOutcome {
        scope: scope.id,
        results: 0,
        report,
      })
    }
  }
}

fn write_report(
  renderer: Option<&ReportRenderer>,
  scope: &Scope,
  data: &PackageData,
) -> Result<Option<PathBuf>, ScopeError> {
  let Some(renderer) = renderer else {
    return Ok(None);
  };
  let path = renderer.write(scope, data, &derive(data))?;
  tracing::debug!(path = %path.display(), "Report written");
  Ok(Some(path))
}

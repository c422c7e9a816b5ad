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

//! Spawning the benchmark harness for one scope and streaming its output.

use crate::command::CommandArgs;
use crate::error::HarnessError;
use crate::error::ParseError;
use crate::error::ScopeError;
use crate::model::ParsedResult;
use crate::parser::ResultParser;
use crate::target::Scope;
use std::process::Stdio;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncRead;
use tokio::io::BufReader;
use tokio::process::Command;
use tracing::Instrument;

/// Runs the harness in `scope` and decodes its stdout while it is still
/// running. `on_result` sees every result as soon as its line arrives.
///
/// A non-zero exit, or a failure marker in the output, becomes a
/// `BenchmarkCompileFailure` carrying the harness's stderr and the
/// offending output.
pub async fn run_harness<F>(
  harness: &CommandArgs,
  scope: &Scope,
  bench_filter: &str,
  benchmark_prefix: &str,
  mut on_result: F,
) -> Result<Vec<ParsedResult>, ScopeError>
where
  F: FnMut(&ParsedResult),
{
  let mut cmd = Command::new(&harness.command);
  cmd
    .args(harness.expand_args(bench_filter))
    .current_dir(&scope.dir)
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);

  tracing::debug!(cmd = ?cmd, "Spawning harness");
  let mut child = cmd.spawn().map_err(|source| HarnessError::Spawn {
    scope: scope.id.clone(),
    command: harness.command.display().to_string(),
    source,
  })?;

  let stdout = child.stdout.take().ok_or(HarnessError::PipeStdout)?;
  let stderr = child.stderr.take().ok_or(HarnessError::PipeStderr)?;

  let stderr_task = tokio::spawn(
    collect_stderr(stderr).instrument(tracing::debug_span!("stderr_handler", scope = %scope.id)),
  );

  let mut parser = ResultParser::new(&scope.id, benchmark_prefix);
  let mut results = Vec::new();
  let mut reader = BufReader::new(stdout).lines();
  while let Some(line) = reader
    .next_line()
    .await
    .map_err(|source| HarnessError::Read {
      stream: "stdout",
      source,
    })?
  {
    if let Some(result) = parser.feed(&line)? {
      on_result(&result);
      results.push(result);
    }
  }

  let status = child.wait().await.map_err(HarnessError::Wait)?;
  let stderr_lines = stderr_task.await.map_err(HarnessError::StderrTask)??;
  let stderr_text = stderr_lines.join("\n");

  match parser.finish() {
    Err(ParseError::BenchmarkCompileFailure { scope, diagnostics }) => {
      let diagnostics = if stderr_text.is_empty() {
        diagnostics
      } else {
        format!("{stderr_text}\n{diagnostics}")
      };
      return Err(ParseError::BenchmarkCompileFailure { scope, diagnostics }.into());
    }
    Err(other) => return Err(other.into()),
    Ok(()) => {}
  }

  if !status.success() {
    tracing::error!(scope = %scope.id, code = ?status.code(), "Harness process failed");
    let diagnostics = if stderr_text.is_empty() {
      format!("harness exited with {status}")
    } else {
      stderr_text
    };
    return Err(
      ParseError::BenchmarkCompileFailure {
        scope: scope.id.clone(),
        diagnostics,
      }
      .into(),
    );
  }

  Ok(results)
}

/// Reads lines from the harness's stderr, logging and keeping them.
async fn collect_stderr<R: AsyncRead + Unpin>(stream: R) -> Result<Vec<String>, HarnessError> {
  let mut reader = BufReader::new(stream).lines();
  let mut lines = Vec::new();

  while let Some(line) = reader
    .next_line()
    .await
    .map_err(|source| HarnessError::Read {
      stream: "stderr",
      source,
    })?
  {
    tracing::debug!(target: "harness", "{}", line);
    lines.push(line);
  }
  Ok(lines)
}

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
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error enum for the benchtrack library.
#[derive(Error, Debug)]
pub enum BenchtrackError {
  #[error("Configuration error")]
  Config(#[from] ConfigError),

  #[error("Target resolution failed")]
  Target(#[from] TargetError),

  #[error("Report setup failed")]
  Report(#[from] ReportError),

  #[error("{failed} of {total} scope(s) failed")]
  ScopesFailed { failed: usize, total: usize },
}

/// Errors related to configuration resolution (src/config.rs).
#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("Failed to load configuration: {0}")]
  Extract(#[from] Box<figment::Error>),

  #[error("`benchmark_prefix` must not be empty")]
  EmptyPrefix,

  #[error("`test_file_suffix` must not be empty")]
  EmptyTestSuffix,

  #[error("`jobs` must be at least 1")]
  ZeroJobs,

  #[error("Harness command must not be empty")]
  EmptyHarnessCommand,

  #[error("Repository root not found: {path}")]
  RepoRoot {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// Errors produced while turning a target expression into scopes (src/target.rs).
#[derive(Error, Debug)]
pub enum TargetError {
  #[error("TargetNotFound: no scope or benchmark matches '{token}'")]
  NotFound { token: String },

  #[error("AmbiguousTarget: '{token}' matches benchmarks in several scopes: {}. Pass --scope to pick one.", candidates.join(", "))]
  Ambiguous {
    token: String,
    candidates: Vec<String>,
  },

  #[error("Failed to scan {path}")]
  Scan {
    path: PathBuf,
    #[source]
    source: walkdir::Error,
  },

  #[error("Failed to read {path}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("Invalid benchmark declaration pattern")]
  Pattern(#[from] regex::Error),
}

/// Errors produced while decoding harness output (src/parser.rs).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
  #[error("BenchmarkCompileFailure in {scope}:\n{diagnostics}")]
  BenchmarkCompileFailure { scope: String, diagnostics: String },

  #[error("ParseFailure in {scope}: {reason}: {line:?}")]
  ParseFailure {
    scope: String,
    line: String,
    reason: String,
  },
}

/// Errors related to the persisted per-scope record (src/store.rs).
#[derive(Error, Debug)]
pub enum StoreError {
  #[error("Failed to read record {path}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("CorruptData: {path}: {reason}")]
  CorruptData { path: PathBuf, reason: String },

  #[error("WriteFailure: could not {stage} {path}")]
  WriteFailure {
    path: PathBuf,
    stage: &'static str,
    #[source]
    source: std::io::Error,
  },

  #[error("Failed to serialize record for {path}")]
  Serialize {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

/// Errors related to running the benchmark harness (src/harness.rs).
#[derive(Error, Debug)]
pub enum HarnessError {
  #[error("Failed to spawn harness `{command}` in {scope}")]
  Spawn {
    scope: String,
    command: String,
    #[source]
    source: std::io::Error,
  },

  #[error("Failed to take harness stdout pipe")]
  PipeStdout,

  #[error("Failed to take harness stderr pipe")]
  PipeStderr,

  #[error("Failed to read harness {stream}")]
  Read {
    stream: &'static str,
    #[source]
    source: std::io::Error,
  },

  #[error("Failed to wait for harness process")]
  Wait(#[source] std::io::Error),

  #[error("Harness stderr task failed")]
  StderrTask(#[source] tokio::task::JoinError),
}

/// Errors related to rendering the report (src/report.rs).
#[derive(Error, Debug)]
pub enum ReportError {
  #[error("Failed to read report template {path}")]
  ReadTemplate {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("Failed to render report template")]
  Template(#[from] minijinja::Error),

  #[error("Failed to write report")]
  Write(#[source] StoreError),
}

/// Everything that can make a single scope fail. One scope failing never
/// stops the others.
#[derive(Error, Debug)]
pub enum ScopeError {
  #[error(transparent)]
  Parse(#[from] ParseError),

  #[error(transparent)]
  Store(#[from] StoreError),

  #[error(transparent)]
  Harness(#[from] HarnessError),

  #[error(transparent)]
  Report(#[from] ReportError),

  #[error("Worker task for {scope} panicked or was cancelled")]
  Worker {
    scope: String,
    #[source]
    source: tokio::task::JoinError,
  },
}

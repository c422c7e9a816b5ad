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
use serde::Deserialize;
use serde::Serialize;
use std::path::PathBuf;

/// Placeholder in harness arguments replaced by the benchmark filter.
pub const BENCH_PLACEHOLDER: &str = "{bench}";

/// Holds the harness executable and its argument template.
///
/// The harness is always started with the scope directory as its working
/// directory, so the arguments never need to name the scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandArgs {
  /// The command to execute (e.g., "go" or "/usr/local/go/bin/go").
  pub command: PathBuf,

  /// Arguments; every `{bench}` is replaced by the benchmark filter.
  #[serde(default)]
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub args: Vec<String>,
}

impl Default for CommandArgs {
  fn default() -> Self {
    Self {
      command: PathBuf::from("go"),
      args: ["test", "-run=^$", "-bench={bench}", "-benchmem", "."]
        .into_iter()
        .map(String::from)
        .collect(),
    }
  }
}

impl CommandArgs {
  /// Arguments with the benchmark filter substituted in.
  pub fn expand_args(&self, bench_filter: &str) -> Vec<String> {
    self
      .args
      .iter()
      .map(|arg| arg.replace(BENCH_PLACEHOLDER, bench_filter))
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_runs_go_test_with_memory_profiling() {
    let args = CommandArgs::default().expand_args("^BenchmarkNewKey");
    assert_eq!(
      args,
      vec!["test", "-run=^$", "-bench=^BenchmarkNewKey", "-benchmem", "."]
    );
  }

  #[test]
  fn args_without_placeholder_pass_through() {
    let cmd = CommandArgs {
      command: PathBuf::from("cat"),
      args: vec!["bench_output.txt".into()],
    };
    assert_eq!(cmd.expand_args("."), vec!["bench_output.txt"]);
  }
}

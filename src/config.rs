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
use crate::cli::GlobalArgs;
use crate::command::CommandArgs;
use crate::error::ConfigError;
use figment::Figment;
use figment::providers::Env;
use figment::providers::Format;
use figment::providers::Serialized;
use figment::providers::Toml;
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use std::path::PathBuf;

/// Name of the optional configuration file at the repository root.
pub const CONFIG_FILE_NAME: &str = "benchtrack.toml";

/// Prefix for environment overrides, e.g. `BENCHTRACK_HARNESS__COMMAND=go1.22`.
pub const ENV_PREFIX: &str = "BENCHTRACK_";

// --- Default Values ---
fn default_skip_dirs() -> Vec<String> {
  ["vendor", "testdata", "node_modules"]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Where and how the report is rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
  /// File written next to the record in every scope.
  pub file_name: String,

  /// Optional MiniJinja template replacing the built-in one.
  pub template: Option<PathBuf>,
}

impl Default for ReportConfig {
  fn default() -> Self {
    Self {
      file_name: "BENCHMARKS.md".to_string(),
      template: None,
    }
  }
}

/// Immutable configuration shared by every scope in an invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Functions starting with this declare a benchmark.
  pub benchmark_prefix: String,

  /// Files ending with this are test files.
  pub test_file_suffix: String,

  /// Directory names never descended into.
  pub skip_dirs: Vec<String>,

  /// Per-scope record file name.
  pub record_file: String,

  /// Upper bound on scopes processed at once. Defaults to the number of CPUs.
  pub jobs: Option<usize>,

  pub harness: CommandArgs,

  pub report: ReportConfig,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      benchmark_prefix: "Benchmark".to_string(),
      test_file_suffix: "_test.go".to_string(),
      skip_dirs: default_skip_dirs(),
      record_file: "benchmarks.json".to_string(),
      jobs: None,
      harness: CommandArgs::default(),
      report: ReportConfig::default(),
    }
  }
}

impl Config {
  /// Layers defaults, the TOML file (when present) and `BENCHTRACK_*`
  /// environment variables.
  pub fn load(config_file: &Path) -> Result<Self, ConfigError> {
    Self::from_figment(
      Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(config_file))
        .merge(Env::prefixed(ENV_PREFIX).split("__")),
    )
  }

  pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
    let config: Config = figment
      .extract()
      .map_err(|e| ConfigError::Extract(Box::new(e)))?;
    config.validate()?;
    Ok(config)
  }

  fn validate(&self) -> Result<(), ConfigError> {
    if self.benchmark_prefix.is_empty() {
      return Err(ConfigError::EmptyPrefix);
    }
    if self.test_file_suffix.is_empty() {
      return Err(ConfigError::EmptyTestSuffix);
    }
    if self.jobs == Some(0) {
      return Err(ConfigError::ZeroJobs);
    }
    if self.harness.command.as_os_str().is_empty() {
      return Err(ConfigError::EmptyHarnessCommand);
    }
    Ok(())
  }

  pub fn skips_dir(&self, name: &str) -> bool {
    name.starts_with('.') || name.starts_with('_') || self.skip_dirs.iter().any(|d| d == name)
  }
}

/// Fully validated and resolved configuration for one invocation.
#[derive(Debug, Clone)]
pub struct Settings {
  /// Canonical repository root.
  pub repo_root: PathBuf,
  pub config: Config,
  pub jobs: usize,
}

impl TryFrom<GlobalArgs> for Settings {
  type Error = ConfigError;

  fn try_from(
    GlobalArgs {
      repo_root,
      config,
      jobs,
    }: GlobalArgs,
  ) -> Result<Self, Self::Error> {
    let repo_root = repo_root
      .canonicalize()
      .map_err(|source| ConfigError::RepoRoot {
        path: repo_root.clone(),
        source,
      })?;

    let config_file = config.unwrap_or_else(|| repo_root.join(CONFIG_FILE_NAME));
    let mut config = Config::load(&config_file)?;
    if jobs.is_some() {
      config.jobs = jobs;
      config.validate()?;
    }

    let jobs = config.jobs.unwrap_or_else(|| {
      std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
    });

    tracing::debug!(root = %repo_root.display(), config = %config_file.display(), jobs, "Resolved settings");

    Ok(Settings {
      repo_root,
      config,
      jobs,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_are_valid() {
    let config = Config::from_figment(Figment::from(Serialized::defaults(Config::default()))).unwrap();
    assert_eq!(config, Config::default());
  }

  #[test]
  fn toml_overrides_nested_keys() {
    let figment = Figment::from(Serialized::defaults(Config::default())).merge(Toml::string(
      r#"
      jobs = 2
      record_file = "bench.json"

      [harness]
      command = "cat"
      args = ["out.txt"]
      "#,
    ));
    let config = Config::from_figment(figment).unwrap();

    assert_eq!(config.jobs, Some(2));
    assert_eq!(config.record_file, "bench.json");
    assert_eq!(config.harness.command, PathBuf::from("cat"));
    assert_eq!(config.harness.args, vec!["out.txt"]);
    assert_eq!(config.benchmark_prefix, "Benchmark");
  }

  #[test]
  fn rejects_zero_jobs() {
    let figment = Figment::from(Serialized::defaults(Config::default())).merge(Toml::string("jobs = 0"));
    assert!(matches!(
      Config::from_figment(figment),
      Err(ConfigError::ZeroJobs)
    ));
  }

  #[test]
  fn skips_hidden_and_vendored_dirs() {
    let config = Config::default();
    assert!(config.skips_dir(".git"));
    assert!(config.skips_dir("_scratch"));
    assert!(config.skips_dir("vendor"));
    assert!(!config.skips_dir("keys"));
  }
}

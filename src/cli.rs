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
use chrono::NaiveDate;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about = "Keeps a dated history of Go benchmark results per package")]
pub struct Cli {
  #[command(flatten)]
  pub global: GlobalArgs,

  #[command(subcommand)]
  pub command: Commands,
}

/// Options shared by every command.
#[derive(Debug, Args)]
pub struct GlobalArgs {
  /// Root of the repository holding the benchmark packages.
  #[arg(long, global = true, default_value = ".")]
  pub repo_root: PathBuf,

  /// Configuration file. Defaults to `<repo-root>/benchtrack.toml`.
  #[arg(long, global = true, env = "BENCHTRACK_CONFIG")]
  pub config: Option<PathBuf>,

  /// Maximum number of packages processed at once.
  #[arg(short, long, global = true)]
  pub jobs: Option<usize>,
}

/// Which packages to operate on.
#[derive(Debug, Clone, Args)]
pub struct TargetArgs {
  /// `all`, a package path, `<path>/...`, or a benchmark name such as `BenchmarkNewKey`.
  #[arg(default_value = "all")]
  pub target: String,

  /// Treat a package path as `<path>/...`.
  #[arg(short, long)]
  pub recursive: bool,

  /// Restrict a benchmark-name lookup to this package subtree.
  #[arg(long)]
  pub scope: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
  /// Run benchmarks and print each result as a JSON line. Nothing is saved.
  Run(TargetArgs),

  /// Run benchmarks, merge the results into each package's history and re-render its report.
  Sync {
    #[command(flatten)]
    target: TargetArgs,

    /// Day the results are recorded under (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    date: Option<NaiveDate>,
  },

  /// Re-render reports from the saved histories without running anything.
  Render(TargetArgs),
}

#[cfg(test)]
mod tests {
  use super::*;
  use clap::CommandFactory;

  #[test]
  fn cli_definition_is_valid() {
    Cli::command().debug_assert();
  }

  #[test]
  fn parses_sync_with_date() {
    let cli = Cli::try_parse_from(["benchtrack", "sync", "keys/...", "--date", "2025-06-13", "-j", "4"]).unwrap();
    assert_eq!(cli.global.jobs, Some(4));
    match cli.command {
      Commands::Sync { target, date } => {
        assert_eq!(target.target, "keys/...");
        assert_eq!(date, "2025-06-13".parse().ok());
      }
      other => panic!("unexpected command: {other:?}"),
    }
  }

  #[test]
  fn target_defaults_to_all() {
    let cli = Cli::try_parse_from(["benchtrack", "render"]).unwrap();
    assert!(matches!(cli.command, Commands::Render(TargetArgs { ref target, .. }) if target == "all"));
  }
}

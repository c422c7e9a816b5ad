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
use anyhow::Result;
use benchtrack::cli::Cli;
use benchtrack::cli::Commands;
use benchtrack::config::Settings;
use benchtrack::logging::setup_tracing;
use benchtrack::pipeline::Mode;
use benchtrack::pipeline::execute;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
  let _log_guard = setup_tracing()?;

  let Cli { global, command } = Cli::parse();
  let settings = Settings::try_from(global)?;

  let (target, mode) = match command {
    Commands::Run(target) => (target, Mode::Run),
    Commands::Sync { target, date } => {
      let as_of = date.unwrap_or_else(|| chrono::Local::now().date_naive());
      (target, Mode::Sync { as_of })
    }
    Commands::Render(target) => (target, Mode::Render),
  };

  // Dropping the pipeline kills running harnesses; saves already published
  // stay whole and unpublished ones never reach the record file.
  tokio::select! {
    summary = execute(settings, &target, mode) => {
      summary?.into_result()?;
    }
    _ = tokio::signal::ctrl_c() => {
      tracing::warn!("Interrupted");
      anyhow::bail!("interrupted");
    }
  }

  Ok(())
}

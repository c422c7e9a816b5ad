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

//! # Benchtrack
//!
//! `benchtrack` keeps a dated history of `go test -bench` results for every
//! package in a repository. Each package owns a `benchmarks.json` record;
//! new runs are merged into it (same-day re-runs replace, earlier days stay
//! in order, hand-written notes are untouched) and a Markdown report with
//! period-over-period deltas is rendered next to it.
//!
//! ## Core Modules
//!
//! * [`target`]: Resolves `all`, `<path>`, `<path>/...` and benchmark names
//!   into package scopes.
//! * [`parser`]: Streaming decoder for harness output.
//! * [`store`]: Loads, merges and atomically saves per-scope records.
//! * [`report`]: Derives the delta view and renders it with MiniJinja.
//! * [`harness`]: Spawns the benchmark harness and feeds its output to the parser.
//! * [`pipeline`]: Runs the `run`, `sync` and `render` commands over a bounded
//!   worker pool, one unit of work per scope.
//! * [`model`]: The persisted record types.
//! * [`cli`]: Defines the `clap`-based command-line interface.
//! * [`command`]: Defines the harness `CommandArgs` struct.
//! * [`config`]: Layered configuration and the resolved `Settings`.
//! * [`error`]: Defines the custom error types for the library.
//! * [`logging`]: Provides the `setup_tracing` utility.

pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod harness;
pub mod logging;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod report;
pub mod store;
pub mod target;

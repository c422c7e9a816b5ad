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

//! Turns a target expression into the scopes to operate on.
//!
//! Accepted forms, tried in this order:
//!
//! * `all`: every scope in the repository.
//! * `<path>/...`: every scope under `<path>`.
//! * `<BenchmarkName>`: the single scope declaring or recording a matching
//!   benchmark.
//! * `<path>`: that directory, which must declare a benchmark.

use crate::config::Config;
use crate::error::TargetError;
use crate::store::HistoryStore;
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use walkdir::WalkDir;

pub const ALL_TOKEN: &str = "all";
pub const RECURSIVE_SUFFIX: &str = "/...";

/// A directory holding benchmarks, and owning one record file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
  /// Path relative to the repository root, `/`-separated, `.` for the root.
  pub id: String,
  /// Canonical directory.
  pub dir: PathBuf,
}

/// The resolved target: scopes in discovery order, plus the harness filter
/// when the target named a benchmark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
  pub scopes: Vec<Scope>,
  pub bench_filter: Option<String>,
}

impl TargetSpec {
  fn from_scopes(scopes: Vec<Scope>) -> Self {
    Self {
      scopes,
      bench_filter: None,
    }
  }

  /// Filter passed to the harness; `.` runs every benchmark.
  pub fn harness_filter(&self) -> &str {
    self.bench_filter.as_deref().unwrap_or(".")
  }
}

/// Strips a trailing `-<digits>` parallelism suffix from a benchmark name.
pub fn strip_parallelism_suffix(name: &str) -> &str {
  match name.rsplit_once('-') {
    Some((base, digits)) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => base,
    _ => name,
  }
}

/// Whether a recorded or declared benchmark name is selected by `token`.
pub fn name_matches(name: &str, token: &str) -> bool {
  name == token || strip_parallelism_suffix(name).starts_with(token)
}

pub struct TargetResolver<'a> {
  config: &'a Config,
  repo_root: &'a Path,
  declaration: Regex,
}

impl<'a> TargetResolver<'a> {
  pub fn new(config: &'a Config, repo_root: &'a Path) -> Result<Self, TargetError> {
    // A lowercase letter right after the prefix makes it an ordinary function.
    let declaration = Regex::new(&format!(
      r"(?m)^func\s+({}(?:[^\p{{Ll}}\W]\w*)?)\s*[\[(]",
      regex::escape(&config.benchmark_prefix)
    ))?;
    Ok(Self {
      config,
      repo_root,
      declaration,
    })
  }

  /// Resolves `token`. `scope_hint` narrows benchmark-name lookups to one
  /// subtree; `recursive` makes a plain path behave like `<path>/...`.
  pub fn resolve(
    &self,
    token: &str,
    recursive: bool,
    scope_hint: Option<&Path>,
  ) -> Result<TargetSpec, TargetError> {
    let not_found = || TargetError::NotFound {
      token: token.to_string(),
    };

    if token == ALL_TOKEN {
      let scopes = self.scan(self.repo_root)?;
      return non_empty(scopes, not_found).map(TargetSpec::from_scopes);
    }

    if let Some(root) = strip_recursive_suffix(token) {
      let root = self.existing_dir(root).ok_or_else(not_found)?;
      let scopes = self.scan(&root)?;
      return non_empty(scopes, not_found).map(TargetSpec::from_scopes);
    }

    if token.starts_with(self.config.benchmark_prefix.as_str()) {
      return self.resolve_benchmark(token, scope_hint);
    }

    let dir = self.existing_dir(token).ok_or_else(not_found)?;
    if recursive {
      let scopes = self.scan(&dir)?;
      return non_empty(scopes, not_found).map(TargetSpec::from_scopes);
    }
    if !self.qualifies(&dir)? {
      return Err(not_found());
    }
    Ok(TargetSpec::from_scopes(vec![self.scope_for(dir)]))
  }

  fn resolve_benchmark(&self, token: &str, scope_hint: Option<&Path>) -> Result<TargetSpec, TargetError> {
    let search_root = match scope_hint {
      Some(hint) => self
        .existing_dir(&hint.to_string_lossy())
        .ok_or_else(|| TargetError::NotFound {
          token: hint.display().to_string(),
        })?,
      None => self.repo_root.to_path_buf(),
    };

    let mut candidates = Vec::new();
    for scope in self.scan(&search_root)? {
      if self
        .benchmark_names(&scope)?
        .iter()
        .any(|name| name_matches(name, token))
      {
        candidates.push(scope);
      }
    }

    match candidates.len() {
      0 => Err(TargetError::NotFound {
        token: token.to_string(),
      }),
      1 => Ok(TargetSpec {
        scopes: candidates,
        bench_filter: Some(format!("^{}", regex::escape(strip_parallelism_suffix(token)))),
      }),
      _ => Err(TargetError::Ambiguous {
        token: token.to_string(),
        candidates: candidates.into_iter().map(|s| s.id).collect(),
      }),
    }
  }

  /// Walks `root` (inclusive) and returns every qualifying directory in
  /// traversal order. Siblings are visited by name so runs are reproducible.
  pub fn scan(&self, root: &Path) -> Result<Vec<Scope>, TargetError> {
    let walker = WalkDir::new(root)
      .follow_links(false)
      .sort_by_file_name()
      .into_iter()
      .filter_entry(|entry| {
        entry.depth() == 0
          || !entry.file_type().is_dir()
          || !self.config.skips_dir(&entry.file_name().to_string_lossy())
      });

    let mut seen = HashSet::new();
    let mut scopes = Vec::new();
    for entry in walker {
      let entry = entry.map_err(|source| TargetError::Scan {
        path: root.to_path_buf(),
        source,
      })?;
      if !entry.file_type().is_dir() || !self.qualifies(entry.path())? {
        continue;
      }
      let dir = canonical(entry.path());
      if seen.insert(dir.clone()) {
        scopes.push(self.scope_for(dir));
      }
    }

    tracing::debug!(root = %root.display(), found = scopes.len(), "Scanned for benchmark scopes");
    Ok(scopes)
  }

  /// A directory qualifies when one of its own test files declares a benchmark.
  pub fn qualifies(&self, dir: &Path) -> Result<bool, TargetError> {
    Ok(!self.declared_benchmarks(dir)?.is_empty())
  }

  fn declared_benchmarks(&self, dir: &Path) -> Result<Vec<String>, TargetError> {
    let read_err = |source| TargetError::Read {
      path: dir.to_path_buf(),
      source,
    };

    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
      let path = entry.map_err(read_err)?.path();
      let is_test_file = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(self.config.test_file_suffix.as_str()));
      if !is_test_file || !path.is_file() {
        continue;
      }
      let source = fs::read_to_string(&path).map_err(|source| TargetError::Read {
        path: path.clone(),
        source,
      })?;
      names.extend(
        self
          .declaration
          .captures_iter(&source)
          .map(|caps| caps[1].to_string()),
      );
    }
    Ok(names)
  }

  /// Declared names plus names already in the scope's record. An unreadable
  /// record only contributes nothing here; syncing it will report it.
  fn benchmark_names(&self, scope: &Scope) -> Result<Vec<String>, TargetError> {
    let mut names = self.declared_benchmarks(&scope.dir)?;
    match HistoryStore::new(self.config).load(scope) {
      Ok(data) => names.extend(data.benchmarks.into_keys()),
      Err(e) => tracing::warn!(scope = %scope.id, error = %e, "Ignoring unreadable record during lookup"),
    }
    Ok(names)
  }

  fn existing_dir(&self, path: &str) -> Option<PathBuf> {
    let dir = self.repo_root.join(path).canonicalize().ok()?;
    dir.is_dir().then_some(dir)
  }

  fn scope_for(&self, dir: PathBuf) -> Scope {
    Scope {
      id: scope_id(self.repo_root, &dir),
      dir,
    }
  }
}

fn strip_recursive_suffix(token: &str) -> Option<&str> {
  if token == "..." {
    return Some(".");
  }
  token
    .strip_suffix(RECURSIVE_SUFFIX)
    .map(|root| if root.is_empty() { "." } else { root })
}

fn non_empty(
  scopes: Vec<Scope>,
  not_found: impl FnOnce() -> TargetError,
) -> Result<Vec<Scope>, TargetError> {
  if scopes.is_empty() {
    Err(not_found())
  } else {
    Ok(scopes)
  }
}

fn canonical(path: &Path) -> PathBuf {
  path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// `dir` relative to `repo_root`, with `/` separators.
pub fn scope_id(repo_root: &Path, dir: &Path) -> String {
  let relative = pathdiff::diff_paths(dir, repo_root).unwrap_or_else(|| dir.to_path_buf());
  let parts: Vec<String> = relative
    .components()
    .map(|c| c.as_os_str().to_string_lossy().into_owned())
    .filter(|c| c != ".")
    .collect();
  if parts.is_empty() {
    ".".to_string()
  } else {
    parts.join("/")
  }
}

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

//! Loading, merging and saving the per-scope record file.

use crate::config::Config;
use crate::error::StoreError;
use crate::model::PackageData;
use crate::model::ParsedResult;
use crate::target::Scope;
use chrono::NaiveDate;
use std::fs;
use std::io::ErrorKind;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// Reads and writes `PackageData` for scopes. Each scope's file is only ever
/// touched by the worker handling that scope.
#[derive(Debug, Clone, Copy)]
pub struct HistoryStore<'a> {
  config: &'a Config,
}

impl<'a> HistoryStore<'a> {
  pub fn new(config: &'a Config) -> Self {
    Self { config }
  }

  pub fn record_path(&self, scope: &Scope) -> PathBuf {
    scope.dir.join(&self.config.record_file)
  }

  /// Loads the scope's record. A missing file is an empty record.
  pub fn load(&self, scope: &Scope) -> Result<PackageData, StoreError> {
    let path = self.record_path(scope);
    let content = match fs::read_to_string(&path) {
      Ok(content) => content,
      Err(e) if e.kind() == ErrorKind::NotFound => {
        tracing::debug!(scope = %scope.id, "No record yet");
        return Ok(PackageData::empty(&scope.id));
      }
      Err(source) => return Err(StoreError::Read { path, source }),
    };
    decode(&path, &content)
  }

  /// Writes the record atomically: the full content is staged next to the
  /// target and then renamed over it.
  pub fn save(&self, data: &PackageData, scope: &Scope) -> Result<(), StoreError> {
    let path = self.record_path(scope);
    let content = encode(&path, data)?;
    write_atomic(&path, content.as_bytes())?;
    tracing::debug!(scope = %scope.id, path = %path.display(), "Record saved");
    Ok(())
  }
}

/// Decodes and validates a record. Unknown fields are dropped; a known field
/// of the wrong type, or a history out of date order, is corrupt data.
pub fn decode(path: &Path, content: &str) -> Result<PackageData, StoreError> {
  let corrupt = |reason: String| StoreError::CorruptData {
    path: path.to_path_buf(),
    reason,
  };

  let data: PackageData = serde_json::from_str(content).map_err(|e| corrupt(e.to_string()))?;

  for (name, record) in &data.benchmarks {
    for pair in record.history.windows(2) {
      if pair[0].date >= pair[1].date {
        return Err(corrupt(format!(
          "history of {name} is not strictly ascending at {}",
          pair[1].date
        )));
      }
    }
    if let Some(m) = record
      .history
      .iter()
      .find(|m| !m.ns_per_op.is_finite() || m.ns_per_op < 0.0)
    {
      return Err(corrupt(format!(
        "history of {name} has invalid nsPerOp on {}",
        m.date
      )));
    }
  }

  Ok(data)
}

/// Pretty JSON with a trailing newline. Benchmarks are a sorted map, so
/// equal data always encodes to equal bytes.
pub fn encode(path: &Path, data: &PackageData) -> Result<String, StoreError> {
  let mut json = serde_json::to_string_pretty(data).map_err(|source| StoreError::Serialize {
    path: path.to_path_buf(),
    source,
  })?;
  json.push('\n');
  Ok(json)
}

/// Stages `content` in a temporary file in the target's directory, syncs it,
/// and persists it over `path` in one rename.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<(), StoreError> {
  let failure = |stage: &'static str| {
    let path = path.to_path_buf();
    move |source: std::io::Error| StoreError::WriteFailure {
      path,
      stage,
      source,
    }
  };

  let parent = path
    .parent()
    .filter(|p| !p.as_os_str().is_empty())
    .unwrap_or_else(|| Path::new("."));

  let mut staged = NamedTempFile::new_in(parent).map_err(failure("stage"))?;
  staged.write_all(content).map_err(failure("stage"))?;
  staged.as_file().sync_all().map_err(failure("sync"))?;
  staged
    .persist(path)
    .map_err(|e| failure("publish")(e.error))?;
  Ok(())
}

/// Folds one run's results into `existing`, dated `as_of`.
///
/// A result for a date already in the history replaces that entry, so
/// repeating a merge is a no-op. New dates are inserted in order, so
/// back-dated merges keep the history ascending. Manual sections are
/// passed through untouched.
pub fn merge(mut existing: PackageData, as_of: NaiveDate, results: &[ParsedResult]) -> PackageData {
  for result in results {
    let record = existing.benchmarks.entry(result.name.clone()).or_default();
    let measurement = result.at(as_of);
    match record.history.binary_search_by(|m| m.date.cmp(&as_of)) {
      Ok(index) => record.history[index] = measurement,
      Err(index) => record.history.insert(index, measurement),
    }
  }
  existing.last_updated = Some(as_of);
  existing
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::BenchmarkRecord;
  use crate::model::ManualSections;
  use crate::model::Measurement;
  use tempfile::TempDir;

  fn day(s: &str) -> NaiveDate {
    s.parse().unwrap()
  }

  fn result(name: &str, ns: f64) -> ParsedResult {
    ParsedResult {
      name: name.to_string(),
      ns_per_op: ns,
      bytes_per_op: None,
      allocs_per_op: None,
    }
  }

  fn with_history(name: &str, history: Vec<Measurement>) -> PackageData {
    let mut data = PackageData::empty("pkg/keys");
    data
      .benchmarks
      .insert(name.to_string(), BenchmarkRecord { history });
    data
  }

  fn sample(date: &str, ns: f64) -> Measurement {
    Measurement {
      date: day(date),
      ns_per_op: ns,
      bytes_per_op: None,
      allocs_per_op: None,
    }
  }

  fn scope_in(temp: &TempDir) -> Scope {
    Scope {
      id: "pkg/keys".to_string(),
      dir: temp.path().to_path_buf(),
    }
  }

  #[test]
  fn merge_appends_new_day() {
    let existing = with_history("BenchmarkNewKey-20", vec![sample("2025-06-07", 120.8)]);
    let merged = merge(existing, day("2025-06-13"), &[result("BenchmarkNewKey-20", 40.97)]);

    let history = &merged.benchmarks["BenchmarkNewKey-20"].history;
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].date, day("2025-06-13"));
    assert_eq!(history[1].ns_per_op, 40.97);
    assert_eq!(merged.last_updated, Some(day("2025-06-13")));
  }

  #[test]
  fn merge_same_day_replaces() {
    let existing = with_history("BenchmarkNewKey-20", vec![sample("2025-06-13", 88.44)]);
    let merged = merge(existing, day("2025-06-13"), &[result("BenchmarkNewKey-20", 85.0)]);

    let history = &merged.benchmarks["BenchmarkNewKey-20"].history;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].ns_per_op, 85.0);
  }

  #[test]
  fn merge_back_dated_keeps_order() {
    let existing = with_history(
      "BenchmarkA",
      vec![sample("2025-06-01", 10.0), sample("2025-06-20", 12.0)],
    );
    let merged = merge(existing, day("2025-06-10"), &[result("BenchmarkA", 11.0)]);
    let merged = merge(merged, day("2025-05-01"), &[result("BenchmarkA", 9.0)]);

    let dates: Vec<_> = merged.benchmarks["BenchmarkA"]
      .history
      .iter()
      .map(|m| m.date.to_string())
      .collect();
    assert_eq!(dates, vec!["2025-05-01", "2025-06-01", "2025-06-10", "2025-06-20"]);
  }

  #[test]
  fn merge_is_idempotent_byte_for_byte() {
    let existing = with_history("BenchmarkA", vec![sample("2025-06-01", 10.0)]);
    let results = vec![result("BenchmarkA", 11.5), result("BenchmarkB-8", 3.25)];
    let once = merge(existing, day("2025-06-02"), &results);
    let twice = merge(once.clone(), day("2025-06-02"), &results);

    let path = Path::new("benchmarks.json");
    assert_eq!(encode(path, &once).unwrap(), encode(path, &twice).unwrap());
  }

  #[test]
  fn merge_preserves_manual_sections() {
    let mut existing = PackageData::empty("pkg");
    existing.manual_sections = ManualSections {
      optimization_steps: vec!["Pooled the key buffer".into()],
      future_improvements: vec![],
      notes: "  keep the  spacing\n".into(),
    };
    let merged = merge(existing.clone(), day("2025-06-13"), &[result("BenchmarkA", 1.0)]);
    assert_eq!(merged.manual_sections, existing.manual_sections);
  }

  #[test]
  fn load_missing_is_empty() {
    let temp = TempDir::new().unwrap();
    let store_config = Config::default();
    let data = HistoryStore::new(&store_config).load(&scope_in(&temp)).unwrap();
    assert_eq!(data, PackageData::empty("pkg/keys"));
  }

  #[test]
  fn save_then_load_round_trips() {
    let temp = TempDir::new().unwrap();
    let config = Config::default();
    let store = HistoryStore::new(&config);
    let scope = scope_in(&temp);

    let data = merge(PackageData::empty("pkg/keys"), day("2025-06-13"), &[result("BenchmarkA", 2.5)]);
    store.save(&data, &scope).unwrap();
    assert_eq!(store.load(&scope).unwrap(), data);

    let leftovers: Vec<_> = fs::read_dir(temp.path()).unwrap().collect();
    assert_eq!(leftovers.len(), 1, "staging file must not be left behind");
  }

  #[test]
  fn load_rejects_type_mismatch() {
    let temp = TempDir::new().unwrap();
    let config = Config::default();
    let store = HistoryStore::new(&config);
    let scope = scope_in(&temp);
    fs::write(store.record_path(&scope), r#"{"packagePath": 42}"#).unwrap();

    assert!(matches!(store.load(&scope), Err(StoreError::CorruptData { .. })));
  }

  #[test]
  fn load_rejects_unordered_history() {
    let content = r#"{"benchmarks": {"BenchmarkA": {"history": [
      {"date": "2025-06-13", "nsPerOp": 1.0},
      {"date": "2025-06-13", "nsPerOp": 2.0}
    ]}}}"#;
    assert!(matches!(
      decode(Path::new("b.json"), content),
      Err(StoreError::CorruptData { .. })
    ));
  }

  #[test]
  fn load_rejects_negative_counts() {
    let content = r#"{"benchmarks": {"BenchmarkA": {"history": [
      {"date": "2025-06-13", "nsPerOp": 1.0, "bytesPerOp": -1, "allocsPerOp": 0}
    ]}}}"#;
    assert!(decode(Path::new("b.json"), content).is_err());
  }

  #[test]
  fn failed_save_keeps_previous_file() {
    let temp = TempDir::new().unwrap();
    let config = Config::default();
    let store = HistoryStore::new(&config);
    let scope = scope_in(&temp);
    let data = merge(PackageData::empty("pkg/keys"), day("2025-06-13"), &[result("BenchmarkA", 2.5)]);
    store.save(&data, &scope).unwrap();
    let before = fs::read(store.record_path(&scope)).unwrap();

    let missing = Scope {
      id: "gone".into(),
      dir: temp.path().join("does/not/exist"),
    };
    assert!(matches!(
      store.save(&data, &missing),
      Err(StoreError::WriteFailure { stage: "stage", .. })
    ));
    assert_eq!(fs::read(store.record_path(&scope)).unwrap(), before);
  }
}

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

//! The persisted per-scope record.
//!
//! Every field a file may omit carries `#[serde(default)]`; unknown fields
//! are dropped by serde, and a known field of the wrong type fails the
//! decode (which the store reports as corrupt data).

use chrono::NaiveDate;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;

/// One dated sample of a benchmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
  pub date: NaiveDate,
  pub ns_per_op: f64,

  /// Only present when the harness ran with memory profiling.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub bytes_per_op: Option<u64>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub allocs_per_op: Option<u64>,
}

/// The time series of one benchmark. Its name is the key it is stored
/// under in [`PackageData::benchmarks`].
///
/// Dates in `history` are strictly ascending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRecord {
  #[serde(default)]
  pub history: Vec<Measurement>,
}

impl BenchmarkRecord {
  pub fn latest(&self) -> Option<&Measurement> {
    self.history.last()
  }
}

/// Hand-written annotations. Never touched by merging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualSections {
  #[serde(default)]
  pub optimization_steps: Vec<String>,

  #[serde(default)]
  pub future_improvements: Vec<String>,

  #[serde(default)]
  pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageData {
  #[serde(default)]
  pub package_path: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_updated: Option<NaiveDate>,

  #[serde(default)]
  pub benchmarks: BTreeMap<String, BenchmarkRecord>,

  #[serde(default)]
  pub manual_sections: ManualSections,
}

impl PackageData {
  /// An empty record for a scope that has never been synced.
  pub fn empty(package_path: impl Into<String>) -> Self {
    Self {
      package_path: package_path.into(),
      ..Self::default()
    }
  }
}

/// A single decoded result line, before it is given a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedResult {
  pub name: String,
  pub ns_per_op: f64,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub bytes_per_op: Option<u64>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub allocs_per_op: Option<u64>,
}

impl ParsedResult {
  pub fn at(&self, date: NaiveDate) -> Measurement {
    Measurement {
      date,
      ns_per_op: self.ns_per_op,
      bytes_per_op: self.bytes_per_op,
      allocs_per_op: self.allocs_per_op,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn decodes_with_missing_and_unknown_fields() {
    let json = r#"{
      "packagePath": "pkg/keys",
      "someFutureField": {"nested": true},
      "benchmarks": {
        "BenchmarkNewKey-20": {
          "history": [{"date": "2025-06-07", "nsPerOp": 120.8, "extra": 1}]
        }
      }
    }"#;
    let data: PackageData = serde_json::from_str(json).unwrap();

    assert_eq!(data.package_path, "pkg/keys");
    assert_eq!(data.last_updated, None);
    assert_eq!(data.manual_sections, ManualSections::default());
    let record = &data.benchmarks["BenchmarkNewKey-20"];
    assert_eq!(record.history.len(), 1);
    assert_eq!(record.history[0].bytes_per_op, None);
  }

  #[test]
  fn rejects_type_mismatch_on_known_field() {
    let json = r#"{"packagePath": "pkg", "benchmarks": {"B": {"history": [{"date": "2025-06-07", "nsPerOp": "fast"}]}}}"#;
    assert!(serde_json::from_str::<PackageData>(json).is_err());
  }

  #[test]
  fn omits_absent_memory_metrics() {
    let m = Measurement {
      date: NaiveDate::from_ymd_opt(2025, 6, 13).unwrap(),
      ns_per_op: 40.97,
      bytes_per_op: None,
      allocs_per_op: None,
    };
    assert_eq!(
      serde_json::to_string(&m).unwrap(),
      r#"{"date":"2025-06-13","nsPerOp":40.97}"#
    );
  }
}

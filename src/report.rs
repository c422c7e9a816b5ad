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

//! The delta-annotated view of a record, and its Markdown rendering.

use crate::config::ReportConfig;
use crate::error::ReportError;
use crate::model::Measurement;
use crate::model::PackageData;
use crate::store::write_atomic;
use crate::target::Scope;
use minijinja::Environment;
use minijinja::context;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

const DEFAULT_TEMPLATE: &str = include_str!("../templates/report.md.j2");

/// Direction of a change. Lower is better for every metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
  Improvement,
  Regression,
  Unchanged,
}

/// Change of one metric between two consecutive samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricDelta {
  pub absolute: f64,
  /// `None` when the previous value was zero.
  pub percent: Option<f64>,
  pub trend: Trend,
}

impl MetricDelta {
  pub fn between(previous: f64, current: f64) -> Self {
    let absolute = current - previous;
    let percent = (previous != 0.0).then(|| absolute / previous * 100.0);
    let trend = match current.partial_cmp(&previous) {
      Some(Ordering::Less) => Trend::Improvement,
      Some(Ordering::Greater) => Trend::Regression,
      _ => Trend::Unchanged,
    };
    Self {
      absolute,
      percent,
      trend,
    }
  }

  #[allow(clippy::cast_precision_loss)]
  fn between_counts(previous: Option<u64>, current: Option<u64>) -> Option<Self> {
    Some(Self::between(previous? as f64, current? as f64))
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Delta {
  pub ns_per_op: MetricDelta,
  /// Only when both samples carry memory metrics.
  pub bytes_per_op: Option<MetricDelta>,
  pub allocs_per_op: Option<MetricDelta>,
}

impl Delta {
  pub fn between(previous: &Measurement, current: &Measurement) -> Self {
    Self {
      ns_per_op: MetricDelta::between(previous.ns_per_op, current.ns_per_op),
      bytes_per_op: MetricDelta::between_counts(previous.bytes_per_op, current.bytes_per_op),
      allocs_per_op: MetricDelta::between_counts(previous.allocs_per_op, current.allocs_per_op),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestEntry {
  pub name: String,
  pub measurement: Measurement,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailedEntry {
  pub measurement: Measurement,
  /// Absent for the first sample of a benchmark.
  pub delta: Option<Delta>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportView {
  /// Most recent sample per benchmark, by name.
  pub latest: Vec<LatestEntry>,
  pub detailed: BTreeMap<String, Vec<DetailedEntry>>,
}

/// Builds the view. Benchmarks without any sample are left out.
pub fn derive(data: &PackageData) -> ReportView {
  let mut view = ReportView::default();

  for (name, record) in &data.benchmarks {
    let Some(latest) = record.latest() else {
      continue;
    };
    view.latest.push(LatestEntry {
      name: name.clone(),
      measurement: latest.clone(),
    });

    let detailed = record
      .history
      .iter()
      .enumerate()
      .map(|(i, measurement)| DetailedEntry {
        measurement: measurement.clone(),
        delta: i
          .checked_sub(1)
          .map(|prev| Delta::between(&record.history[prev], measurement)),
      })
      .collect();
    view.detailed.insert(name.clone(), detailed);
  }

  view
}

fn signed(value: f64) -> String {
  format!("{value:+.2}")
}

fn percent(value: Option<f64>) -> String {
  match value {
    Some(p) => format!("{p:+.1}%"),
    None => "n/a".to_string(),
  }
}

/// Renders views with the built-in or a configured template.
pub struct ReportRenderer {
  env: Environment<'static>,
  template: String,
  file_name: String,
}

impl ReportRenderer {
  pub fn new(config: &ReportConfig) -> Result<Self, ReportError> {
    let template = match &config.template {
      Some(path) => fs::read_to_string(path).map_err(|source| ReportError::ReadTemplate {
        path: path.clone(),
        source,
      })?,
      None => DEFAULT_TEMPLATE.to_string(),
    };

    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.add_filter("signed", signed);
    env.add_filter("percent", percent);

    Ok(Self {
      env,
      template,
      file_name: config.file_name.clone(),
    })
  }

  pub fn render(&self, data: &PackageData, view: &ReportView) -> Result<String, ReportError> {
    let ctx = context! {
      package => data.package_path,
      last_updated => data.last_updated,
      latest => view.latest,
      detailed => view.detailed,
      manual => data.manual_sections,
    };
    Ok(self.env.render_str(&self.template, ctx)?)
  }

  pub fn report_path(&self, scope: &Scope) -> PathBuf {
    scope.dir.join(&self.file_name)
  }

  /// Renders and atomically writes the scope's report.
  pub fn write(&self, scope: &Scope, data: &PackageData, view: &ReportView) -> Result<PathBuf, ReportError> {
    let content = self.render(data, view)?;
    let path = self.report_path(scope);
    write_atomic(&path, content.as_bytes()).map_err(ReportError::Write)?;
    Ok(path)
  }
}

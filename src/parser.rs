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

//! Line-oriented decoder for `go test -bench` output.
//!
//! A result line is `<name> <iterations> <value> <unit> [<value> <unit>...]`.
//! `ns/op` is mandatory, `B/op` and `allocs/op` come as a pair or not at all,
//! and any other metric columns are skipped. Banner lines are dropped.
//! Once a failure marker is seen the remainder of the stream is kept as the
//! diagnostic text of a [`ParseError::BenchmarkCompileFailure`].

use crate::error::ParseError;
use crate::model::ParsedResult;

const NS_PER_OP: &str = "ns/op";
const BYTES_PER_OP: &str = "B/op";
const ALLOCS_PER_OP: &str = "allocs/op";

/// Incremental parser for one scope's harness output.
///
/// Feed it lines as they arrive with [`ResultParser::feed`], then call
/// [`ResultParser::finish`] once the stream is closed.
#[derive(Debug)]
pub struct ResultParser {
  scope: String,
  prefix: String,
  diagnostics: Option<Vec<String>>,
}

impl ResultParser {
  pub fn new(scope: impl Into<String>, benchmark_prefix: impl Into<String>) -> Self {
    Self {
      scope: scope.into(),
      prefix: benchmark_prefix.into(),
      diagnostics: None,
    }
  }

  /// Consumes one line. Returns the decoded result, if the line was one.
  pub fn feed(&mut self, line: &str) -> Result<Option<ParsedResult>, ParseError> {
    let line = line.trim_end_matches(['\r', '\n']);

    if let Some(diagnostics) = self.diagnostics.as_mut() {
      diagnostics.push(line.to_string());
      return Ok(None);
    }

    if is_failure_marker(line) {
      self.diagnostics = Some(vec![line.to_string()]);
      return Ok(None);
    }

    let fields: Vec<&str> = line.split_whitespace().collect();
    if !self.is_result_shaped(line, &fields) {
      return Ok(None);
    }

    self.decode(line, &fields).map(Some)
  }

  /// Ends the stream, surfacing any failure seen along the way.
  pub fn finish(self) -> Result<(), ParseError> {
    match self.diagnostics {
      Some(lines) => Err(ParseError::BenchmarkCompileFailure {
        scope: self.scope,
        diagnostics: lines.join("\n").trim_end().to_string(),
      }),
      None => Ok(()),
    }
  }

  /// A line starting (unindented) with a benchmark name followed by an
  /// iteration count. Name-only lines printed by `-v` runs do not qualify.
  fn is_result_shaped(&self, line: &str, fields: &[&str]) -> bool {
    line.starts_with(self.prefix.as_str())
      && fields.len() >= 2
      && fields[1].parse::<u64>().is_ok()
  }

  fn decode(&self, line: &str, fields: &[&str]) -> Result<ParsedResult, ParseError> {
    let fail = |reason: String| ParseError::ParseFailure {
      scope: self.scope.clone(),
      line: line.to_string(),
      reason,
    };

    let mut ns_per_op = None;
    let mut bytes_per_op = None;
    let mut allocs_per_op = None;

    // Unpaired trailing tokens belong to columns we do not know about.
    for pair in fields[2..].chunks_exact(2) {
      let (value, unit) = (pair[0], pair[1]);
      match unit {
        NS_PER_OP => {
          let ns: f64 = value
            .parse()
            .map_err(|_| fail(format!("invalid {NS_PER_OP} value '{value}'")))?;
          if !ns.is_finite() || ns < 0.0 {
            return Err(fail(format!("{NS_PER_OP} out of range: {value}")));
          }
          ns_per_op = Some(ns);
        }
        BYTES_PER_OP => {
          bytes_per_op = Some(
            value
              .parse::<u64>()
              .map_err(|_| fail(format!("invalid {BYTES_PER_OP} value '{value}'")))?,
          );
        }
        ALLOCS_PER_OP => {
          allocs_per_op = Some(
            value
              .parse::<u64>()
              .map_err(|_| fail(format!("invalid {ALLOCS_PER_OP} value '{value}'")))?,
          );
        }
        _ => {}
      }
    }

    let Some(ns_per_op) = ns_per_op else {
      return Err(fail(format!("missing {NS_PER_OP} column")));
    };

    if bytes_per_op.is_some() != allocs_per_op.is_some() {
      return Err(fail(format!(
        "{BYTES_PER_OP} and {ALLOCS_PER_OP} must appear together"
      )));
    }

    Ok(ParsedResult {
      name: fields[0].to_string(),
      ns_per_op,
      bytes_per_op,
      allocs_per_op,
    })
  }
}

fn is_failure_marker(line: &str) -> bool {
  line.starts_with("FAIL")
    || line.starts_with("--- FAIL")
    || line.starts_with("panic:")
    || line.starts_with("# ")
    || line.contains("[build failed]")
    || line.contains("[setup failed]")
}

/// Parses a complete stream of lines for one scope.
pub fn parse_lines<I, S>(
  scope: &str,
  benchmark_prefix: &str,
  lines: I,
) -> Result<Vec<ParsedResult>, ParseError>
where
  I: IntoIterator<Item = S>,
  S: AsRef<str>,
{
  let mut parser = ResultParser::new(scope, benchmark_prefix);
  let mut results = Vec::new();
  for line in lines {
    if let Some(result) = parser.feed(line.as_ref())? {
      results.push(result);
    }
  }
  parser.finish()?;
  Ok(results)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse(text: &str) -> Result<Vec<ParsedResult>, ParseError> {
    parse_lines("pkg/keys", "Benchmark", text.lines())
  }

  #[test]
  fn parses_line_with_memory_columns() {
    let results = parse("BenchmarkNewKey-20  1000000  40.97 ns/op  48 B/op  2 allocs/op").unwrap();
    assert_eq!(
      results,
      vec![ParsedResult {
        name: "BenchmarkNewKey-20".into(),
        ns_per_op: 40.97,
        bytes_per_op: Some(48),
        allocs_per_op: Some(2),
      }]
    );
  }

  #[test]
  fn parses_full_go_output_and_drops_banners() {
    let output = "goos: linux\n\
goarch: amd64\n\
pkg: example.com/keys\n\
cpu: 13th Gen Intel(R) Core(TM) i7-13700H\n\
BenchmarkNewKey-20         \t29302542\t        40.97 ns/op\n\
BenchmarkNewKey_Serial-20  \t 9850371\t       120.8 ns/op\n\
PASS\n\
coverage: 71.3% of statements\n\
ok  \texample.com/keys\t3.012s\n";

    let results = parse(output).unwrap();
    let names: Vec<_> = results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["BenchmarkNewKey-20", "BenchmarkNewKey_Serial-20"]);
    assert_eq!(results[1].ns_per_op, 120.8);
    assert_eq!(results[1].bytes_per_op, None);
  }

  #[test]
  fn skips_extra_columns() {
    let results =
      parse("BenchmarkHash-8 500000 2450 ns/op 417.96 MB/s 0 B/op 0 allocs/op 3.00 widgets/op").unwrap();
    assert_eq!(results[0].ns_per_op, 2450.0);
    assert_eq!(results[0].bytes_per_op, Some(0));
    assert_eq!(results[0].allocs_per_op, Some(0));
  }

  #[test]
  fn name_only_and_log_lines_are_noise() {
    let output = "BenchmarkNewKey\n    keys_test.go:12: warming up\nBenchmarkNewKey-20 100 5 ns/op\n";
    assert_eq!(parse(output).unwrap().len(), 1);
  }

  #[test]
  fn partial_memory_columns_fail() {
    let err = parse("BenchmarkNewKey-20 100 40.97 ns/op 48 B/op").unwrap_err();
    assert!(matches!(err, ParseError::ParseFailure { .. }));
  }

  #[test]
  fn missing_ns_per_op_fails() {
    let err = parse("BenchmarkNewKey-20 100 48 B/op 2 allocs/op").unwrap_err();
    match err {
      ParseError::ParseFailure { scope, line, .. } => {
        assert_eq!(scope, "pkg/keys");
        assert!(line.starts_with("BenchmarkNewKey-20"));
      }
      other => panic!("unexpected error: {other:?}"),
    }
  }

  #[test]
  fn undecodable_metric_fails() {
    assert!(parse("BenchmarkNewKey-20 100 fast ns/op").is_err());
    assert!(parse("BenchmarkNewKey-20 100 4.5 ns/op 1.5 B/op 2 allocs/op").is_err());
  }

  #[test]
  fn build_failure_collects_diagnostics() {
    let output = "# example.com/keys [example.com/keys.test]\n\
./keys_test.go:14:2: undefined: NewKey\n\
FAIL\texample.com/keys [build failed]\n";
    match parse(output).unwrap_err() {
      ParseError::BenchmarkCompileFailure { scope, diagnostics } => {
        assert_eq!(scope, "pkg/keys");
        assert!(diagnostics.contains("undefined: NewKey"));
        assert!(diagnostics.ends_with("[build failed]"));
      }
      other => panic!("unexpected error: {other:?}"),
    }
  }

  #[test]
  fn streams_results_before_stream_ends() {
    let mut parser = ResultParser::new("pkg", "Benchmark");
    assert_eq!(parser.feed("goos: linux").unwrap(), None);
    let first = parser.feed("BenchmarkA-4 10 1.5 ns/op").unwrap();
    assert_eq!(first.map(|r| r.name), Some("BenchmarkA-4".to_string()));
    parser.finish().unwrap();
  }
}

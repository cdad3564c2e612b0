//! Record extraction: turns one function folder's coverage file and
//! initial-iteration log into a normalized [`CoverageRecord`].
//!
//! Coverage payload keys:
//!   stmtCov | statementCoverage   final statement coverage (percent)
//!   branchCov | branchCoverage    final branch coverage (percent)
//!   totalStatements               number of statements in the function
//!   totalBranches                 number of branches in the function
//!
//! Initial payload keys:
//!   statementCoverage, branchCoverage
//!
//! Values may be numbers, numeric strings, "nan"/"n/a", empty strings or
//! null; see [`to_coverage_value`].
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::artifact::FunctionFolder;
use crate::error::{CovaggError, Result};
use crate::model::{Coverage, CoverageRecord, FunctionKey, Metrics};

#[derive(Debug, Deserialize)]
struct CoveragePayload {
    #[serde(rename = "stmtCov", default)]
    stmt_cov: Option<Value>,
    #[serde(rename = "statementCoverage", default)]
    statement_coverage: Option<Value>,
    #[serde(rename = "branchCov", default)]
    branch_cov: Option<Value>,
    #[serde(rename = "branchCoverage", default)]
    branch_coverage: Option<Value>,
    // An absent count is treated as zero; an explicit null is not.
    #[serde(rename = "totalStatements", default = "zero_count")]
    total_statements: Value,
    #[serde(rename = "totalBranches", default = "zero_count")]
    total_branches: Value,
}

#[derive(Debug, Deserialize)]
struct InitialPayload {
    #[serde(rename = "statementCoverage", default)]
    statement_coverage: Option<Value>,
    #[serde(rename = "branchCoverage", default)]
    branch_coverage: Option<Value>,
}

fn zero_count() -> Value {
    Value::from(0)
}

/// Coerce a raw JSON value into a coverage percentage.
///
/// - null / absent → 0
/// - "nan", "n/a" (any case) → Missing
/// - "" → 0
/// - numeric strings and numbers → their value
/// - anything else → 0
pub fn to_coverage_value(value: Option<&Value>) -> Coverage {
    match value {
        None | Some(Value::Null) => Some(0.0),
        Some(Value::Bool(b)) => Some(if *b { 1.0 } else { 0.0 }),
        Some(Value::Number(n)) => Some(n.as_f64().unwrap_or(0.0)),
        Some(Value::String(s)) => parse_coverage_str(s),
        Some(Value::Array(_)) | Some(Value::Object(_)) => Some(0.0),
    }
}

fn parse_coverage_str(s: &str) -> Coverage {
    let lower = s.to_lowercase();
    if lower == "nan" || lower == "n/a" {
        return None;
    }
    if s.is_empty() {
        return Some(0.0);
    }
    match s.trim().parse::<f64>() {
        Ok(v) if v.is_nan() => None,
        Ok(v) => Some(v),
        Err(_) => Some(0.0),
    }
}

/// True when a denominator count should be treated as zero.
fn is_zero_count(value: &Value) -> bool {
    value.as_f64() == Some(0.0)
}

/// Restore the source extension encoded in a file folder name:
/// `foo_cpp` → `foo.cpp`, `foo_h` → `foo.h`. Other names are unchanged.
pub fn normalize_file_name(folder: &str) -> String {
    if let Some(stem) = folder.strip_suffix("_cpp") {
        format!("{stem}.cpp")
    } else if let Some(stem) = folder.strip_suffix("_h") {
        format!("{stem}.h")
    } else {
        folder.to_string()
    }
}

/// Parse a payload, requiring a top-level JSON object.
fn parse_payload<T: DeserializeOwned>(text: &str, path: &Path) -> Result<T> {
    let malformed = |reason: String| CovaggError::ArtifactMalformed {
        path: path.to_path_buf(),
        reason,
    };
    let value: Value = serde_json::from_str(text).map_err(|e| malformed(e.to_string()))?;
    if !value.is_object() {
        return Err(malformed("expected a JSON object".to_string()));
    }
    serde_json::from_value(value).map_err(|e| malformed(e.to_string()))
}

/// Build a record from the two raw payloads. `path` is only used in errors.
pub fn extract(
    key: &FunctionKey,
    coverage: &[u8],
    initial: &[u8],
    path: &Path,
) -> Result<CoverageRecord> {
    let coverage_text = String::from_utf8_lossy(coverage);
    let initial_text = String::from_utf8_lossy(initial);
    let cov: CoveragePayload = parse_payload(&coverage_text, path)?;
    let init: InitialPayload = parse_payload(&initial_text, path)?;

    let mut total_statement =
        to_coverage_value(cov.stmt_cov.as_ref().or(cov.statement_coverage.as_ref()));
    let mut total_branch =
        to_coverage_value(cov.branch_cov.as_ref().or(cov.branch_coverage.as_ref()));
    let mut initial_statement = to_coverage_value(init.statement_coverage.as_ref());
    let mut initial_branch = to_coverage_value(init.branch_coverage.as_ref());

    // Nothing to cover means 0%, not undefined.
    if is_zero_count(&cov.total_statements) {
        initial_statement = Some(0.0);
        total_statement = Some(0.0);
    }
    if is_zero_count(&cov.total_branches) {
        initial_branch = Some(0.0);
        total_branch = Some(0.0);
    }

    Ok(CoverageRecord {
        function: key.function.clone(),
        file: normalize_file_name(&key.file_folder),
        project: key.project.clone(),
        variant: key.variant.clone(),
        metrics: Metrics::from_raw(initial_statement, total_statement, initial_branch, total_branch),
    })
}

/// Why a function folder produced no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipKind {
    Missing,
    Malformed,
}

/// A function folder that was skipped, with the error text.
#[derive(Debug, Clone)]
pub struct SkippedArtifact {
    pub key: FunctionKey,
    pub kind: SkipKind,
    pub message: String,
}

/// Result of extracting every scanned folder.
#[derive(Debug, Default)]
pub struct Extraction {
    pub records: Vec<CoverageRecord>,
    pub skipped: Vec<SkippedArtifact>,
}

impl Extraction {
    pub fn skipped_count(&self, kind: SkipKind) -> usize {
        self.skipped.iter().filter(|s| s.kind == kind).count()
    }
}

/// Load and extract one folder.
pub fn extract_folder(folder: &FunctionFolder) -> Result<CoverageRecord> {
    let (coverage, initial) = folder.load()?;
    extract(&folder.key, &coverage, &initial, &folder.path)
}

/// Extract every folder, skipping (and logging) those that fail.
pub fn extract_all(folders: &[FunctionFolder]) -> Extraction {
    let mut out = Extraction::default();
    for folder in folders {
        match extract_folder(folder) {
            Ok(record) => out.records.push(record),
            Err(e) => {
                let kind = match e {
                    CovaggError::ArtifactMissing { .. } => SkipKind::Missing,
                    _ => SkipKind::Malformed,
                };
                warn!("Error processing {}: {e}", folder.path.display());
                out.skipped.push(SkippedArtifact {
                    key: folder.key.clone(),
                    kind,
                    message: e.to_string(),
                });
            }
        }
    }
    out
}

/// Keep only records whose initial statement coverage is known and below 100.
pub fn filter_important(records: Vec<CoverageRecord>) -> Vec<CoverageRecord> {
    records
        .into_iter()
        .filter(|r| matches!(r.metrics.initial_statement, Some(v) if v < 100.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(file_folder: &str) -> FunctionKey {
        FunctionKey {
            variant: "full".to_string(),
            project: "proj".to_string(),
            file_folder: file_folder.to_string(),
            function: "parse".to_string(),
        }
    }

    fn run(coverage: Value, initial: Value) -> Result<CoverageRecord> {
        extract(
            &key("util_cpp"),
            coverage.to_string().as_bytes(),
            initial.to_string().as_bytes(),
            Path::new("full/proj/util_cpp/parse"),
        )
    }

    #[test]
    fn test_to_coverage_value() {
        assert_eq!(to_coverage_value(None), Some(0.0));
        assert_eq!(to_coverage_value(Some(&Value::Null)), Some(0.0));
        assert_eq!(to_coverage_value(Some(&json!("NaN"))), None);
        assert_eq!(to_coverage_value(Some(&json!("nan"))), None);
        assert_eq!(to_coverage_value(Some(&json!("N/A"))), None);
        assert_eq!(to_coverage_value(Some(&json!(""))), Some(0.0));
        assert_eq!(to_coverage_value(Some(&json!("42.5"))), Some(42.5));
        assert_eq!(to_coverage_value(Some(&json!(" 42.5 "))), Some(42.5));
        assert_eq!(to_coverage_value(Some(&json!("abc"))), Some(0.0));
        assert_eq!(to_coverage_value(Some(&json!(87))), Some(87.0));
        assert_eq!(to_coverage_value(Some(&json!([1, 2]))), Some(0.0));
    }

    #[test]
    fn test_normalize_file_name() {
        assert_eq!(normalize_file_name("parser_cpp"), "parser.cpp");
        assert_eq!(normalize_file_name("parser_h"), "parser.h");
        assert_eq!(normalize_file_name("parser_hpp"), "parser_hpp");
        assert_eq!(normalize_file_name("parser"), "parser");
    }

    #[test]
    fn test_extract_basic() {
        let record = run(
            json!({"stmtCov": 80.0, "branchCov": "50", "totalStatements": 10, "totalBranches": 4}),
            json!({"statementCoverage": 60.0, "branchCoverage": 25.0}),
        )
        .unwrap();
        assert_eq!(record.file, "util.cpp");
        assert_eq!(record.function, "parse");
        assert_eq!(record.metrics.total_statement, Some(80.0));
        assert_eq!(record.metrics.initial_statement, Some(60.0));
        assert_eq!(record.metrics.statement_change, Some(20.0));
        assert_eq!(record.metrics.branch_change, Some(25.0));
    }

    #[test]
    fn test_extract_alternate_key_names() {
        let record = run(
            json!({"statementCoverage": 70, "branchCoverage": 30, "totalStatements": 5, "totalBranches": 2}),
            json!({"statementCoverage": 70, "branchCoverage": 30}),
        )
        .unwrap();
        assert_eq!(record.metrics.total_statement, Some(70.0));
        assert_eq!(record.metrics.total_branch, Some(30.0));
        assert_eq!(record.metrics.statement_change, Some(0.0));
    }

    #[test]
    fn test_zero_denominator_overrides_nan() {
        let record = run(
            json!({"stmtCov": "nan", "branchCov": "nan", "totalStatements": 0, "totalBranches": 3}),
            json!({"statementCoverage": "nan", "branchCoverage": "nan"}),
        )
        .unwrap();
        assert_eq!(record.metrics.initial_statement, Some(0.0));
        assert_eq!(record.metrics.total_statement, Some(0.0));
        assert_eq!(record.metrics.statement_change, Some(0.0));
        assert_eq!(record.metrics.total_branch, None);
        assert_eq!(record.metrics.branch_change, None);
    }

    #[test]
    fn test_absent_count_counts_as_zero() {
        let record = run(
            json!({"stmtCov": 90, "branchCov": 40, "totalBranches": null}),
            json!({"statementCoverage": 10, "branchCoverage": 20}),
        )
        .unwrap();
        assert_eq!(record.metrics.total_statement, Some(0.0));
        assert_eq!(record.metrics.initial_statement, Some(0.0));
        // Explicit null is not a zero count.
        assert_eq!(record.metrics.total_branch, Some(40.0));
    }

    #[test]
    fn test_missing_propagates_into_change() {
        let record = run(
            json!({"stmtCov": 80, "branchCov": 50, "totalStatements": 10, "totalBranches": 2}),
            json!({"statementCoverage": "N/A", "branchCoverage": 50}),
        )
        .unwrap();
        assert_eq!(record.metrics.initial_statement, None);
        assert_eq!(record.metrics.statement_change, None);
        assert_eq!(record.metrics.branch_change, Some(0.0));
    }

    #[test]
    fn test_malformed_payload() {
        let err = extract(
            &key("a_h"),
            b"{not json",
            b"{}",
            Path::new("x"),
        )
        .unwrap_err();
        assert!(matches!(err, CovaggError::ArtifactMalformed { .. }));

        let err = run(json!("just a string"), json!({})).unwrap_err();
        assert!(matches!(err, CovaggError::ArtifactMalformed { .. }));

        let err = run(json!({}), json!([1, 2, 3, 4, 5, 6])).unwrap_err();
        assert!(matches!(err, CovaggError::ArtifactMalformed { .. }));
    }

    #[test]
    fn test_filter_important() {
        let mut a = run(
            json!({"stmtCov": 100, "totalStatements": 1, "totalBranches": 1}),
            json!({"statementCoverage": 100}),
        )
        .unwrap();
        a.function = "full".to_string();
        let mut b = a.clone();
        b.function = "partial".to_string();
        b.metrics.initial_statement = Some(99.99);
        let mut c = a.clone();
        c.function = "unknown".to_string();
        c.metrics.initial_statement = None;

        let kept = filter_important(vec![a, b, c]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].function, "partial");
    }
}

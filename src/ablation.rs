//! Ablation tables: per file, how much coverage each removed capability
//! (and the iterative refinement itself) contributes relative to the full
//! generator.

use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use crate::aggregate::cross_project_file_averages;
use crate::error::{CovaggError, Result};
use crate::index::GroupingIndex;
use crate::model::{difference, mean, round2, AggregateRecord, Coverage, CoverageKind};

/// Label of the synthetic "no refinement" row.
pub const WITHOUT_ITERATION_LABEL: &str = "W/o iteration";

/// The baseline variant and the two ablated variants, with row labels.
#[derive(Debug, Clone)]
pub struct AblationVariants {
    pub full: String,
    pub without_x: String,
    pub without_y: String,
    pub x_label: String,
    pub y_label: String,
}

impl Default for AblationVariants {
    fn default() -> Self {
        Self {
            full: "llm4cpp".to_string(),
            without_x: "no_reflect".to_string(),
            without_y: "no_context".to_string(),
            x_label: "W/o reflect".to_string(),
            y_label: "W/o context".to_string(),
        }
    }
}

/// One labelled row: a value per file plus the row average.
#[derive(Debug, Clone, PartialEq)]
pub struct AblationRow {
    pub label: String,
    pub values: Vec<Coverage>,
    pub average: Coverage,
}

impl AblationRow {
    fn new(label: &str, values: Vec<Coverage>) -> Self {
        let average = mean(values.iter().copied());
        Self {
            label: label.to_string(),
            values,
            average,
        }
    }
}

/// Wide table for one coverage kind: one column per file.
#[derive(Debug, Clone, PartialEq)]
pub struct AblationTable {
    pub kind: CoverageKind,
    pub files: Vec<String>,
    /// Rows in order: full, without iteration, without X, without Y.
    pub rows: Vec<AblationRow>,
}

type FileAverages = BTreeMap<String, AggregateRecord>;

fn averages_for(index: &GroupingIndex, variant: &str) -> FileAverages {
    match index.variant(variant) {
        Some(group) => cross_project_file_averages(group),
        None => {
            warn!("Ablation variant '{variant}' not found; its row will be empty");
            FileAverages::new()
        }
    }
}

fn total(avgs: &FileAverages, file: &str, kind: CoverageKind) -> Option<Coverage> {
    avgs.get(file).map(|a| a.metrics.total(kind))
}

/// `ablated.total - full.total`, Missing when either side is absent.
fn contribution(full: Option<Coverage>, ablated: Option<Coverage>) -> Coverage {
    match (full, ablated) {
        (Some(f), Some(a)) => difference(a, f).map(round2),
        _ => None,
    }
}

fn build_table(
    kind: CoverageKind,
    files: &[String],
    variants: &AblationVariants,
    full: &FileAverages,
    without_x: &FileAverages,
    without_y: &FileAverages,
) -> AblationTable {
    let mut full_row = Vec::with_capacity(files.len());
    let mut iter_row = Vec::with_capacity(files.len());
    let mut x_row = Vec::with_capacity(files.len());
    let mut y_row = Vec::with_capacity(files.len());

    for file in files {
        let full_total = total(full, file, kind);
        let full_initial = full.get(file.as_str()).and_then(|a| a.metrics.initial(kind));

        full_row.push(full_total.flatten().map(round2));
        iter_row.push(
            difference(full_total.flatten(), full_initial).map(|improvement| round2(-improvement)),
        );
        x_row.push(contribution(full_total, total(without_x, file, kind)));
        y_row.push(contribution(full_total, total(without_y, file, kind)));
    }

    AblationTable {
        kind,
        files: files.to_vec(),
        rows: vec![
            AblationRow::new(&variants.full, full_row),
            AblationRow::new(WITHOUT_ITERATION_LABEL, iter_row),
            AblationRow::new(&variants.x_label, x_row),
            AblationRow::new(&variants.y_label, y_row),
        ],
    }
}

/// Build the statement and branch ablation tables. Columns are the union of
/// file names across the three variants, sorted.
pub fn ablation_tables(
    index: &GroupingIndex,
    variants: &AblationVariants,
) -> Result<[AblationTable; 2]> {
    if index.variant(&variants.full).is_none() {
        return Err(CovaggError::VariantNotFound(variants.full.clone()));
    }

    let full = averages_for(index, &variants.full);
    let without_x = averages_for(index, &variants.without_x);
    let without_y = averages_for(index, &variants.without_y);

    let files: Vec<String> = full
        .keys()
        .chain(without_x.keys())
        .chain(without_y.keys())
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let table = |kind| build_table(kind, &files, variants, &full, &without_x, &without_y);
    Ok([table(CoverageKind::Statement), table(CoverageKind::Branch)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CoverageRecord, Metrics};

    fn record(variant: &str, project: &str, file: &str, initial: Option<f64>, total: Option<f64>) -> CoverageRecord {
        CoverageRecord {
            function: format!("{file}_fn"),
            file: file.to_string(),
            project: project.to_string(),
            variant: variant.to_string(),
            metrics: Metrics::from_raw(initial, total, initial, total),
        }
    }

    fn variants() -> AblationVariants {
        AblationVariants {
            full: "full".to_string(),
            without_x: "no_x".to_string(),
            without_y: "no_y".to_string(),
            x_label: "W/o x".to_string(),
            y_label: "W/o y".to_string(),
        }
    }

    #[test]
    fn test_single_function_example() {
        let index = GroupingIndex::from_records(vec![
            record("full", "p", "f1.cpp", Some(60.0), Some(80.0)),
            record("no_x", "p", "f1.cpp", Some(50.0), Some(70.0)),
        ]);
        let [stmt, branch] = ablation_tables(&index, &variants()).unwrap();

        assert_eq!(stmt.kind, CoverageKind::Statement);
        assert_eq!(branch.kind, CoverageKind::Branch);
        assert_eq!(stmt.files, vec!["f1.cpp".to_string()]);

        assert_eq!(stmt.rows[0].label, "full");
        assert_eq!(stmt.rows[0].values, vec![Some(80.0)]);
        assert_eq!(stmt.rows[1].label, WITHOUT_ITERATION_LABEL);
        assert_eq!(stmt.rows[1].values, vec![Some(-20.0)]);
        assert_eq!(stmt.rows[2].values, vec![Some(-10.0)]);
        assert_eq!(stmt.rows[2].average, Some(-10.0));
        // no_y is absent entirely.
        assert_eq!(stmt.rows[3].values, vec![None]);
        assert_eq!(stmt.rows[3].average, None);
    }

    #[test]
    fn test_file_columns_are_union() {
        let index = GroupingIndex::from_records(vec![
            record("full", "p", "b.cpp", Some(10.0), Some(40.0)),
            record("no_y", "p", "a.h", Some(10.0), Some(30.0)),
        ]);
        let [stmt, _] = ablation_tables(&index, &variants()).unwrap();
        assert_eq!(stmt.files, vec!["a.h".to_string(), "b.cpp".to_string()]);
        // a.h has no baseline.
        assert_eq!(stmt.rows[0].values, vec![None, Some(40.0)]);
        assert_eq!(stmt.rows[3].values, vec![None, None]);
        assert_eq!(stmt.rows[0].average, Some(40.0));
    }

    #[test]
    fn test_zero_initial_is_not_missing() {
        let index = GroupingIndex::from_records(vec![record(
            "full",
            "p",
            "a.cpp",
            Some(0.0),
            Some(55.5),
        )]);
        let [stmt, _] = ablation_tables(&index, &variants()).unwrap();
        assert_eq!(stmt.rows[1].values, vec![Some(-55.5)]);
    }

    #[test]
    fn test_missing_operand_propagates() {
        let index = GroupingIndex::from_records(vec![
            record("full", "p", "a.cpp", None, Some(50.0)),
            record("no_x", "p", "a.cpp", Some(1.0), None),
        ]);
        let [stmt, _] = ablation_tables(&index, &variants()).unwrap();
        assert_eq!(stmt.rows[1].values, vec![None]);
        assert_eq!(stmt.rows[2].values, vec![None]);
    }

    #[test]
    fn test_cross_project_average() {
        let index = GroupingIndex::from_records(vec![
            record("full", "p1", "a.cpp", Some(0.0), Some(80.0)),
            record("full", "p2", "a.cpp", Some(0.0), Some(60.0)),
            record("no_x", "p1", "a.cpp", Some(0.0), Some(50.0)),
        ]);
        let [stmt, _] = ablation_tables(&index, &variants()).unwrap();
        assert_eq!(stmt.rows[0].values, vec![Some(70.0)]);
        assert_eq!(stmt.rows[2].values, vec![Some(-20.0)]);
    }

    #[test]
    fn test_missing_full_variant_fails() {
        let index = GroupingIndex::from_records(vec![record("no_x", "p", "a.cpp", None, None)]);
        assert!(matches!(
            ablation_tables(&index, &variants()),
            Err(CovaggError::VariantNotFound(_))
        ));
    }
}

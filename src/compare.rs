//! Pairwise comparison of two variants at function, file or project level.

use std::collections::{BTreeMap, BTreeSet};

use clap::ValueEnum;

use crate::aggregate::aggregate;
use crate::error::{CovaggError, Result};
use crate::index::{GroupingIndex, VariantGroup};
use crate::model::{
    is_zero_or_missing, mean, ComparisonRow, Coverage, CoverageKind, CoverageRecord, GroupKey,
    Metrics, ZERO_TOLERANCE,
};

/// Granularity of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Level {
    Function,
    File,
    Project,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Function => "function",
            Level::File => "file",
            Level::Project => "project",
        }
    }

    /// Join key for a record at this level.
    pub fn key_of(&self, record: &CoverageRecord) -> GroupKey {
        match self {
            Level::Function => GroupKey::Function(record.function.clone()),
            Level::File => GroupKey::File {
                project: record.project.clone(),
                file: record.file.clone(),
            },
            Level::Project => GroupKey::Project(record.project.clone()),
        }
    }
}

/// Which rows survive into a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFilter {
    /// Keep everything.
    All,
    /// Drop rows whose statement and branch deltas are both zero or Missing.
    Changed,
    /// As `Changed`, and also drop rows whose first-variant statement
    /// coverage is zero.
    ChangedNonZeroBaseline,
}

impl RowFilter {
    pub fn keeps(&self, row: &ComparisonRow) -> bool {
        let changed =
            !(is_zero_or_missing(row.statement_delta) && is_zero_or_missing(row.branch_delta));
        match self {
            RowFilter::All => true,
            RowFilter::Changed => changed,
            RowFilter::ChangedNonZeroBaseline => {
                let zero_baseline = matches!(
                    row.first_total(CoverageKind::Statement),
                    Some(v) if v.abs() < ZERO_TOLERANCE
                );
                changed && !zero_baseline
            }
        }
    }
}

/// The pair compared when no names are given and both variants exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantPair {
    pub first: String,
    pub second: String,
}

impl Default for VariantPair {
    fn default() -> Self {
        Self {
            first: "no_reflect".to_string(),
            second: "llm4cpp".to_string(),
        }
    }
}

impl VariantPair {
    pub fn reversed(&self) -> Self {
        Self {
            first: self.second.clone(),
            second: self.first.clone(),
        }
    }
}

/// Resolve the pair of variants to compare.
///
/// A single given name is paired with the first other variant in sorted
/// order. With no names, `preferred` is used when both of its variants
/// exist, otherwise the first two variants in sorted order.
pub fn select_pair(
    index: &GroupingIndex,
    first: Option<&str>,
    second: Option<&str>,
    preferred: &VariantPair,
) -> Result<(String, String)> {
    let names = index.variant_names();
    let known = |name: &str| -> Result<String> {
        match index.variant(name) {
            Some(_) => Ok(name.to_string()),
            None => Err(CovaggError::VariantNotFound(name.to_string())),
        }
    };
    let other_than = |taken: &str| -> Result<String> {
        names
            .iter()
            .find(|n| **n != taken)
            .map(|s| s.to_string())
            .ok_or(CovaggError::InsufficientVariants { found: names.len() })
    };

    let (first, second) = match (first, second) {
        (Some(a), Some(b)) => (known(a)?, known(b)?),
        (Some(a), None) => {
            let a = known(a)?;
            let b = other_than(a.as_str())?;
            (a, b)
        }
        (None, Some(b)) => {
            let b = known(b)?;
            let a = other_than(b.as_str())?;
            (a, b)
        }
        (None, None) => {
            let has_preferred = preferred.first != preferred.second
                && index.variant(&preferred.first).is_some()
                && index.variant(&preferred.second).is_some();
            match names.as_slice() {
                _ if has_preferred => (preferred.first.clone(), preferred.second.clone()),
                [a, b, ..] => (a.to_string(), b.to_string()),
                _ => return Err(CovaggError::InsufficientVariants { found: names.len() }),
            }
        }
    };
    if first == second {
        return Err(CovaggError::SameVariant(first));
    }
    Ok((first, second))
}

/// Aggregate a variant's records by the level's join key.
fn aggregate_by_key(level: Level, group: &VariantGroup) -> BTreeMap<GroupKey, Metrics> {
    let mut buckets: BTreeMap<GroupKey, Vec<&CoverageRecord>> = BTreeMap::new();
    for record in group.records() {
        buckets.entry(level.key_of(record)).or_default().push(record);
    }
    buckets
        .into_iter()
        .filter_map(|(key, records)| aggregate(records).map(|m| (key, m)))
        .collect()
}

/// Join two variants on the level's key. Rows cover the union of keys,
/// sorted case-insensitively; a side without the key has no metrics and
/// yields Missing deltas.
pub fn compare(
    level: Level,
    index: &GroupingIndex,
    first: &str,
    second: &str,
) -> Result<Vec<ComparisonRow>> {
    let first_group = index
        .variant(first)
        .ok_or_else(|| CovaggError::VariantNotFound(first.to_string()))?;
    let second_group = index
        .variant(second)
        .ok_or_else(|| CovaggError::VariantNotFound(second.to_string()))?;

    let mut a = aggregate_by_key(level, first_group);
    let mut b = aggregate_by_key(level, second_group);

    let mut keys: Vec<GroupKey> = a
        .keys()
        .chain(b.keys())
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    keys.sort_by(GroupKey::sort_cmp);

    Ok(keys
        .into_iter()
        .map(|key| {
            let first = a.remove(&key);
            let second = b.remove(&key);
            ComparisonRow::new(key, first, second)
        })
        .collect())
}

/// Apply a filter, keeping order.
pub fn retain(rows: Vec<ComparisonRow>, filter: RowFilter) -> Vec<ComparisonRow> {
    rows.into_iter().filter(|r| filter.keeps(r)).collect()
}

/// Mean of the rows' deltas, skipping Missing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeltaAverage {
    pub statement: Coverage,
    pub branch: Coverage,
}

pub fn average_deltas(rows: &[ComparisonRow]) -> DeltaAverage {
    DeltaAverage {
        statement: mean(rows.iter().map(|r| r.statement_delta)),
        branch: mean(rows.iter().map(|r| r.branch_delta)),
    }
}

/// Function names present in only one of two variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSetDiff {
    pub first: String,
    pub second: String,
    pub first_count: usize,
    pub second_count: usize,
    pub only_first: Vec<String>,
    pub only_second: Vec<String>,
}

pub fn function_set_diff(index: &GroupingIndex, first: &str, second: &str) -> Result<FunctionSetDiff> {
    let names = |variant: &str| -> Result<BTreeSet<String>> {
        let group = index
            .variant(variant)
            .ok_or_else(|| CovaggError::VariantNotFound(variant.to_string()))?;
        Ok(group.records().map(|r| r.function.clone()).collect())
    };
    let a = names(first)?;
    let b = names(second)?;
    Ok(FunctionSetDiff {
        first: first.to_string(),
        second: second.to_string(),
        first_count: a.len(),
        second_count: b.len(),
        only_first: a.difference(&b).cloned().collect(),
        only_second: b.difference(&a).cloned().collect(),
    })
}

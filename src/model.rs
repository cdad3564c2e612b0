//! Uniform in-memory representation of coverage measurements, independent of
//! how the artifacts were laid out on disk. The extractor produces
//! `CoverageRecord`s which are then grouped, averaged and compared.

use std::cmp::Ordering;

/// Changes smaller than this are normalized to exactly zero.
pub const CHANGE_EPSILON: f64 = 1e-6;

/// Tolerance used by the comparison filters when testing for zero.
pub const ZERO_TOLERANCE: f64 = 1e-9;

/// A coverage percentage in `[0, 100]`. `None` means the coverage is
/// undefined for this record and must be skipped by every average.
pub type Coverage = Option<f64>;

/// Round to 2 decimal places the way a correctly-rounded decimal formatter
/// does, folding `-0.0` into `0.0`.
#[must_use]
pub fn round2(value: f64) -> f64 {
    let rounded: f64 = format!("{value:.2}").parse().unwrap_or(value);
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Snap values within [`CHANGE_EPSILON`] of zero to exactly zero.
#[must_use]
pub fn clamp_near_zero(value: f64) -> f64 {
    if value.abs() < CHANGE_EPSILON {
        0.0
    } else {
        value
    }
}

/// `minuend - subtrahend`, or Missing when either side is Missing.
#[must_use]
pub fn difference(minuend: Coverage, subtrahend: Coverage) -> Coverage {
    match (minuend, subtrahend) {
        (Some(a), Some(b)) => Some(clamp_near_zero(a - b)),
        _ => None,
    }
}

/// Difference rounded to 2 decimals and clamped, as emitted in comparison
/// reports.
#[must_use]
pub fn delta(second: Coverage, first: Coverage) -> Coverage {
    difference(second, first).map(|d| clamp_near_zero(round2(d)))
}

/// True when the value is Missing, NaN, or within [`ZERO_TOLERANCE`] of zero.
#[must_use]
pub fn is_zero_or_missing(value: Coverage) -> bool {
    match value {
        None => true,
        Some(v) => v.is_nan() || v.abs() < ZERO_TOLERANCE,
    }
}

/// Arithmetic mean of the non-Missing values, rounded to 2 decimals.
/// Missing when no value is present.
pub fn mean<I>(values: I) -> Coverage
where
    I: IntoIterator<Item = Coverage>,
{
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values.into_iter().flatten() {
        if v.is_nan() {
            continue;
        }
        sum += v;
        count += 1;
    }
    if count == 0 {
        None
    } else {
        Some(round2(sum / count as f64))
    }
}

/// The two kinds of coverage tracked per function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageKind {
    Statement,
    Branch,
}

impl CoverageKind {
    pub const ALL: [CoverageKind; 2] = [CoverageKind::Statement, CoverageKind::Branch];

    pub fn as_str(&self) -> &'static str {
        match self {
            CoverageKind::Statement => "Statement",
            CoverageKind::Branch => "Branch",
        }
    }
}

impl std::fmt::Display for CoverageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The six coverage fields shared by records and aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Metrics {
    pub initial_statement: Coverage,
    pub total_statement: Coverage,
    pub statement_change: Coverage,
    pub initial_branch: Coverage,
    pub total_branch: Coverage,
    pub branch_change: Coverage,
}

impl Metrics {
    /// Build metrics from raw (unrounded) values. Changes are derived from
    /// the raw values first, then every field is rounded to 2 decimals.
    #[must_use]
    pub fn from_raw(
        initial_statement: Coverage,
        total_statement: Coverage,
        initial_branch: Coverage,
        total_branch: Coverage,
    ) -> Self {
        let statement_change = difference(total_statement, initial_statement);
        let branch_change = difference(total_branch, initial_branch);
        Self {
            initial_statement: initial_statement.map(round2),
            total_statement: total_statement.map(round2),
            statement_change: statement_change.map(round2),
            initial_branch: initial_branch.map(round2),
            total_branch: total_branch.map(round2),
            branch_change: branch_change.map(round2),
        }
    }

    #[must_use]
    pub fn initial(&self, kind: CoverageKind) -> Coverage {
        match kind {
            CoverageKind::Statement => self.initial_statement,
            CoverageKind::Branch => self.initial_branch,
        }
    }

    #[must_use]
    pub fn total(&self, kind: CoverageKind) -> Coverage {
        match kind {
            CoverageKind::Statement => self.total_statement,
            CoverageKind::Branch => self.total_branch,
        }
    }

    #[must_use]
    pub fn change(&self, kind: CoverageKind) -> Coverage {
        match kind {
            CoverageKind::Statement => self.statement_change,
            CoverageKind::Branch => self.branch_change,
        }
    }

    /// Fields in report column order.
    #[must_use]
    pub fn fields(&self) -> [Coverage; 6] {
        [
            self.initial_statement,
            self.total_statement,
            self.statement_change,
            self.initial_branch,
            self.total_branch,
            self.branch_change,
        ]
    }
}

/// Anything that carries a set of coverage metrics.
pub trait HasMetrics {
    fn metrics(&self) -> &Metrics;
}

impl HasMetrics for Metrics {
    fn metrics(&self) -> &Metrics {
        self
    }
}

/// Location of one function folder in the artifact store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionKey {
    pub variant: String,
    pub project: String,
    /// The file folder name as found on disk (still encoded).
    pub file_folder: String,
    pub function: String,
}

/// One function's coverage snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageRecord {
    pub function: String,
    /// Source file name with its extension restored.
    pub file: String,
    pub project: String,
    pub variant: String,
    pub metrics: Metrics,
}

impl HasMetrics for CoverageRecord {
    fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

/// Key an aggregate or comparison row summarizes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupKey {
    Function(String),
    File { project: String, file: String },
    Project(String),
    Variant(String),
}

impl GroupKey {
    /// Case-insensitive ordering, falling back to the exact strings so that
    /// keys differing only by case still sort deterministically.
    #[must_use]
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        let (a1, a2) = self.parts();
        let (b1, b2) = other.parts();
        a1.to_lowercase()
            .cmp(&b1.to_lowercase())
            .then_with(|| a2.to_lowercase().cmp(&b2.to_lowercase()))
            .then_with(|| self.cmp(other))
    }

    /// (primary, secondary) key strings. File keys order by project first.
    fn parts(&self) -> (&str, &str) {
        match self {
            GroupKey::Function(name) | GroupKey::Project(name) | GroupKey::Variant(name) => {
                (name, "")
            }
            GroupKey::File { project, file } => (project, file),
        }
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupKey::Function(name) | GroupKey::Project(name) | GroupKey::Variant(name) => {
                f.write_str(name)
            }
            GroupKey::File { project, file } => write!(f, "{project}/{file}"),
        }
    }
}

/// Mean metrics over a group of records or aggregates.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRecord {
    pub key: GroupKey,
    pub metrics: Metrics,
    /// Number of inputs that were averaged.
    pub count: usize,
}

impl HasMetrics for AggregateRecord {
    fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

/// Side-by-side totals of two variants for one key.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub key: GroupKey,
    pub first: Option<Metrics>,
    pub second: Option<Metrics>,
    /// Second variant minus first.
    pub statement_delta: Coverage,
    pub branch_delta: Coverage,
}

impl ComparisonRow {
    #[must_use]
    pub fn new(key: GroupKey, first: Option<Metrics>, second: Option<Metrics>) -> Self {
        let total = |m: &Option<Metrics>, kind| m.as_ref().and_then(|m| m.total(kind));
        let statement_delta = delta(
            total(&second, CoverageKind::Statement),
            total(&first, CoverageKind::Statement),
        );
        let branch_delta = delta(
            total(&second, CoverageKind::Branch),
            total(&first, CoverageKind::Branch),
        );
        Self {
            key,
            first,
            second,
            statement_delta,
            branch_delta,
        }
    }

    #[must_use]
    pub fn first_total(&self, kind: CoverageKind) -> Coverage {
        self.first.as_ref().and_then(|m| m.total(kind))
    }

    #[must_use]
    pub fn second_total(&self, kind: CoverageKind) -> Coverage {
        self.second.as_ref().and_then(|m| m.total(kind))
    }

    #[must_use]
    pub fn delta(&self, kind: CoverageKind) -> Coverage {
        match kind {
            CoverageKind::Statement => self.statement_delta,
            CoverageKind::Branch => self.branch_delta,
        }
    }
}

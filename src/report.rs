//! Builds the tabular reports and formats coverage values for output.

use std::borrow::Cow;

use crate::ablation::AblationTable;
use crate::aggregate::{file_averages, project_average, project_averages, variant_average};
use crate::artifact::FunctionFolder;
use crate::compare::{average_deltas, FunctionSetDiff};
use crate::index::VariantGroup;
use crate::model::{AggregateRecord, ComparisonRow, Coverage, CoverageKind, GroupKey, HasMetrics};

/// The six coverage column headers, in order.
pub const METRIC_COLUMNS: [&str; 6] = [
    "Initial Statement Coverage",
    "Total Statement Coverage",
    "Statement Coverage Change",
    "Initial Branch Coverage",
    "Total Branch Coverage",
    "Branch Coverage Change",
];

/// A named table: header row plus data rows. The name is the output path
/// relative to the sink root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<S: Into<String>>(name: impl Into<String>, header: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            header: header.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        debug_assert_eq!(row.len(), self.header.len(), "row width must match header");
        self.rows.push(row);
    }

    pub fn format(&self, formatter: &dyn TableFormatter) -> String {
        formatter.format(self)
    }
}

/// Serializes a [`Table`] into text.
pub trait TableFormatter {
    fn format(&self, table: &Table) -> String;
}

/// Comma-separated values with `\r\n` line endings. Fields are quoted only
/// when they contain a delimiter, quote or line break.
pub struct CsvFormatter;

fn csv_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\r', '\n']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

impl TableFormatter for CsvFormatter {
    fn format(&self, table: &Table) -> String {
        let mut out = String::new();
        for row in std::iter::once(&table.header).chain(&table.rows) {
            let fields: Vec<Cow<'_, str>> = row.iter().map(|f| csv_field(f)).collect();
            out.push_str(&fields.join(","));
            out.push_str("\r\n");
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Value formatting
// ---------------------------------------------------------------------------

/// Plain record value: `NaN` when Missing, otherwise shortest round-trip form
/// with at least one fractional digit (`80.0`, `66.67`).
pub fn format_value(value: Coverage) -> String {
    match value {
        None => "NaN".to_string(),
        Some(v) if v.is_finite() && v.fract() == 0.0 => format!("{v:.1}"),
        Some(v) => format!("{v}"),
    }
}

/// Exactly two decimals; Missing is empty.
pub fn format_fixed(value: Coverage) -> String {
    match value {
        None => String::new(),
        Some(v) => format!("{v:.2}"),
    }
}

/// Two decimals with trailing zeros and a trailing point removed; Missing
/// is empty.
pub fn format_trimmed(value: Coverage) -> String {
    let Some(v) = value else {
        return String::new();
    };
    if v.is_nan() {
        return String::new();
    }
    let s = format!("{v:.2}");
    let s = if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s.as_str()
    };
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

/// Make a variant or project name safe for use in a file name.
pub fn safe_name(name: &str) -> String {
    name.replace(['/', '\\'], "_")
}

fn metric_cells<T: HasMetrics>(item: &T) -> impl Iterator<Item = String> {
    item.metrics().fields().into_iter().map(format_value)
}

// ---------------------------------------------------------------------------
// Per-variant reports
// ---------------------------------------------------------------------------

fn function_header() -> Vec<&'static str> {
    let mut header = vec!["Function Name", "File Name", "Project"];
    header.extend(METRIC_COLUMNS);
    header
}

fn average_row(label: String, project: &str, avg: &AggregateRecord) -> Vec<String> {
    let mut row = vec![label, String::new(), project.to_string()];
    row.extend(metric_cells(avg));
    row
}

/// One table per project listing every function plus the project average,
/// and a combined table for the whole variant.
pub fn function_tables(variant: &str, group: &VariantGroup) -> Vec<Table> {
    let dir = safe_name(variant);
    let mut tables = Vec::new();
    let mut combined = Table::new(
        format!("{dir}/coverage_all_{dir}.csv"),
        function_header(),
    );

    for (project, project_group) in &group.projects {
        let mut table = Table::new(
            format!("{dir}/coverage_{}.csv", safe_name(project)),
            function_header(),
        );
        for record in project_group.records() {
            let mut row = vec![
                record.function.clone(),
                record.file.clone(),
                record.project.clone(),
            ];
            row.extend(metric_cells(record));
            combined.push(row.clone());
            table.push(row);
        }
        if let Some(avg) = project_average(project, project_group) {
            table.push(average_row(format!("AVERAGE - {project}"), project, &avg));
        }
        tables.push(table);
    }

    if let Some(avg) = variant_average(variant, group) {
        combined.push(average_row(
            format!("AVERAGE - {}", variant.to_uppercase()),
            variant,
            &avg,
        ));
    }
    tables.push(combined);
    tables
}

fn file_header() -> Vec<&'static str> {
    let mut header = vec!["File Name", "Project"];
    header.extend(METRIC_COLUMNS);
    header
}

fn file_row(avg: &AggregateRecord) -> Vec<String> {
    let (project, file) = match &avg.key {
        GroupKey::File { project, file } => (project.clone(), file.clone()),
        other => (String::new(), other.to_string()),
    };
    let mut row = vec![file, project];
    row.extend(metric_cells(avg));
    row
}

/// Per-project tables of file averages and a combined table sorted by
/// (project, file).
pub fn file_tables(variant: &str, group: &VariantGroup) -> Vec<Table> {
    let dir = safe_name(variant);
    let mut tables = Vec::new();
    let mut all = Vec::new();

    for (project, project_group) in &group.projects {
        let mut table = Table::new(
            format!("{dir}/coverage_{}_by_file.csv", safe_name(project)),
            file_header(),
        );
        for avg in file_averages(project, project_group) {
            table.push(file_row(&avg));
            all.push(avg);
        }
        tables.push(table);
    }

    all.sort_by(|a, b| a.key.sort_cmp(&b.key));
    let mut combined = Table::new(
        format!("{dir}/coverage_all_by_file_{dir}.csv"),
        file_header(),
    );
    for avg in &all {
        combined.push(file_row(avg));
    }
    tables.push(combined);
    tables
}

fn project_header() -> Vec<&'static str> {
    let mut header = vec!["Project"];
    header.extend(METRIC_COLUMNS);
    header
}

fn project_row(project: &str, avg: &AggregateRecord) -> Vec<String> {
    let mut row = vec![project.to_string()];
    row.extend(metric_cells(avg));
    row
}

/// One single-row table per project and a combined table of all projects.
pub fn project_tables(variant: &str, group: &VariantGroup) -> Vec<Table> {
    let dir = safe_name(variant);
    let mut all = project_averages(group);
    let mut tables: Vec<Table> = all
        .iter()
        .map(|avg| {
            let project = avg.key.to_string();
            let mut table = Table::new(
                format!("{dir}/coverage_{}_project_avg.csv", safe_name(&project)),
                project_header(),
            );
            table.push(project_row(&project, avg));
            table
        })
        .collect();

    all.sort_by(|a, b| a.key.sort_cmp(&b.key));
    let mut combined = Table::new(
        format!("{dir}/coverage_all_projects_{dir}.csv"),
        project_header(),
    );
    for avg in &all {
        combined.push(project_row(&avg.key.to_string(), avg));
    }
    tables.push(combined);
    tables
}

// ---------------------------------------------------------------------------
// Comparison reports
// ---------------------------------------------------------------------------

fn totals_header(first: &str, second: &str) -> Vec<String> {
    vec![
        format!("{first} Total Statement Coverage"),
        format!("{second} Total Statement Coverage"),
        format!("{first} Total Branch Coverage"),
        format!("{second} Total Branch Coverage"),
    ]
}

/// Side-by-side file totals, keyed by file name and project.
pub fn file_comparison_table(rows: &[ComparisonRow], first: &str, second: &str) -> Table {
    let (a, b) = (safe_name(first), safe_name(second));
    totals_table(
        format!("coverage_compare_{a}_vs_{b}_by_file.csv"),
        &["File Name", "Project"],
        rows,
        first,
        second,
    )
}

/// Side-by-side project totals.
pub fn project_comparison_table(rows: &[ComparisonRow], first: &str, second: &str) -> Table {
    let (a, b) = (safe_name(first), safe_name(second));
    totals_table(
        format!("coverage_compare_projects_{a}_vs_{b}.csv"),
        &["Project"],
        rows,
        first,
        second,
    )
}

fn totals_table(
    name: String,
    key_columns: &[&str],
    rows: &[ComparisonRow],
    first: &str,
    second: &str,
) -> Table {
    let mut header: Vec<String> = key_columns.iter().map(|c| c.to_string()).collect();
    header.extend(totals_header(first, second));
    let mut table = Table::new(name, header);

    for row in rows {
        let mut cells = match &row.key {
            GroupKey::File { project, file } => vec![file.clone(), project.clone()],
            key => vec![key.to_string()],
        };
        cells.extend([
            format_fixed(row.first_total(CoverageKind::Statement)),
            format_fixed(row.second_total(CoverageKind::Statement)),
            format_fixed(row.first_total(CoverageKind::Branch)),
            format_fixed(row.second_total(CoverageKind::Branch)),
        ]);
        table.push(cells);
    }
    table
}

/// Function-level delta report. `strict` selects the non-zero-baseline
/// variant, which carries no AVERAGE row.
pub fn function_delta_table(rows: &[ComparisonRow], first: &str, second: &str, strict: bool) -> Table {
    let (a, b) = (safe_name(first), safe_name(second));
    let suffix = if strict { "_nonzero" } else { "" };
    let mut table = Table::new(
        format!("coverage_comparison_{a}_vs_{b}_by_function{suffix}.csv"),
        [
            "Function Name".to_string(),
            format!("Statement_{first}"),
            format!("Statement_{second}"),
            "Statement_Δ".to_string(),
            format!("Branch_{first}"),
            format!("Branch_{second}"),
            "Branch_Δ".to_string(),
        ],
    );

    for row in rows {
        table.push(vec![
            row.key.to_string(),
            format_trimmed(row.first_total(CoverageKind::Statement)),
            format_trimmed(row.second_total(CoverageKind::Statement)),
            format_trimmed(row.statement_delta),
            format_trimmed(row.first_total(CoverageKind::Branch)),
            format_trimmed(row.second_total(CoverageKind::Branch)),
            format_trimmed(row.branch_delta),
        ]);
    }

    if !strict {
        let avg = average_deltas(rows);
        table.push(vec![
            "AVERAGE".to_string(),
            String::new(),
            String::new(),
            format_trimmed(avg.statement),
            String::new(),
            String::new(),
            format_trimmed(avg.branch),
        ]);
    }
    table
}

// ---------------------------------------------------------------------------
// Ablation and audit reports
// ---------------------------------------------------------------------------

pub fn ablation_table(ablation: &AblationTable) -> Table {
    let name = match ablation.kind {
        CoverageKind::Statement => "ablation_statement.csv",
        CoverageKind::Branch => "ablation_branch.csv",
    };
    let mut header = vec![String::new()];
    header.extend(ablation.files.iter().cloned());
    header.push("Avg".to_string());

    let mut table = Table::new(name, header);
    for row in &ablation.rows {
        let mut cells = vec![row.label.clone()];
        cells.extend(row.values.iter().copied().map(format_trimmed));
        cells.push(format_trimmed(row.average));
        table.push(cells);
    }
    table
}

/// Function folders lacking one or both artifacts.
pub fn missing_artifacts_table(folders: &[FunctionFolder]) -> Table {
    let mut table = Table::new(
        "missing_artifacts.csv",
        ["Variant", "Project", "File", "Function", "Missing", "Path"],
    );
    for folder in folders.iter().filter(|f| !f.is_complete()) {
        let missing: Vec<&str> = folder.missing().iter().map(|k| k.as_str()).collect();
        table.push(vec![
            folder.key.variant.clone(),
            folder.key.project.clone(),
            folder.key.file_folder.clone(),
            folder.key.function.clone(),
            missing.join("; "),
            folder.path.display().to_string(),
        ]);
    }
    table
}

/// Plain-text listing of functions present in only one variant.
pub fn function_set_diff_text(diff: &FunctionSetDiff) -> String {
    let mut lines = vec![
        format!("{} found functions: {}", diff.first, diff.first_count),
        format!("{} found functions: {}", diff.second, diff.second_count),
        String::new(),
        format!(
            "Functions present only in {}: {}",
            diff.first,
            diff.only_first.len()
        ),
    ];
    lines.extend(diff.only_first.iter().cloned());
    lines.push(String::new());
    lines.push(format!(
        "Functions present only in {}: {}",
        diff.second,
        diff.only_second.len()
    ));
    lines.extend(diff.only_second.iter().cloned());
    lines.join("\n")
}

/// Name of the function-set diff text report.
pub fn function_set_diff_name(diff: &FunctionSetDiff) -> String {
    format!(
        "functions_diff_{}_vs_{}.txt",
        safe_name(&diff.first),
        safe_name(&diff.second)
    )
}

//! Command handler functions for the covagg CLI.
//!
//! Each `cmd_*` function writes its reports to a [`TableSink`] and returns a
//! run summary as a `String`, making them easy to test without capturing
//! stdout.

use std::fmt::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::ablation::{ablation_tables, AblationVariants};
use crate::artifact::{scan, ArtifactPatterns, FunctionFolder};
use crate::compare::{
    compare, function_set_diff, retain, select_pair, Level, RowFilter, VariantPair,
};
use crate::error::CovaggError;
use crate::extract::{extract_all, filter_important, SkipKind};
use crate::index::GroupingIndex;
use crate::report::{self, Table};
use crate::sink::TableSink;

/// Everything loaded from the artifact store for one run.
#[derive(Debug)]
pub struct Workspace {
    pub folders: Vec<FunctionFolder>,
    pub index: GroupingIndex,
    /// Records extracted before any filtering.
    pub processed: usize,
    pub skipped_missing: usize,
    pub skipped_malformed: usize,
}

impl Workspace {
    /// Scan, extract and index the store under `base`.
    pub fn load(base: &Path, patterns: &ArtifactPatterns, important: bool) -> Result<Self> {
        let folders = scan(base, patterns)
            .with_context(|| format!("Failed to scan {}", base.display()))?;
        let extraction = extract_all(&folders);
        let processed = extraction.records.len();
        let skipped_missing = extraction.skipped_count(SkipKind::Missing);
        let skipped_malformed = extraction.skipped_count(SkipKind::Malformed);

        let records = if important {
            filter_important(extraction.records)
        } else {
            extraction.records
        };
        let index = GroupingIndex::from_records(records);
        info!(
            processed,
            kept = index.len(),
            variants = index.variant_names().len(),
            "loaded artifact store"
        );

        Ok(Self {
            folders,
            index,
            processed,
            skipped_missing,
            skipped_malformed,
        })
    }
}

/// Report names written and reports that failed during one command.
#[derive(Debug, Default)]
struct RunLog {
    written: Vec<String>,
    failed: Vec<(String, String)>,
}

impl RunLog {
    fn emit(&mut self, sink: &mut dyn TableSink, tables: &[Table]) -> Result<()> {
        for table in tables {
            sink.write_table(table)
                .with_context(|| format!("Failed to write {}", table.name))?;
            self.written.push(table.name.clone());
        }
        Ok(())
    }

    fn emit_text(&mut self, sink: &mut dyn TableSink, name: &str, text: &str) -> Result<()> {
        sink.write_text(name, text)
            .with_context(|| format!("Failed to write {name}"))?;
        self.written.push(name.to_string());
        Ok(())
    }

    /// Record a failed report without aborting the run.
    fn isolate(&mut self, label: &str, result: Result<()>) {
        if let Err(e) = result {
            warn!("Report '{label}' failed: {e:#}");
            self.failed.push((label.to_string(), format!("{e:#}")));
        }
    }

    fn summary(&self, ws: &Workspace) -> String {
        let mut out = String::new();
        writeln!(out, "Functions processed: {}", ws.processed).unwrap();
        if ws.index.len() != ws.processed {
            writeln!(out, "Functions kept:      {}", ws.index.len()).unwrap();
        }
        writeln!(out, "Skipped (missing):   {}", ws.skipped_missing).unwrap();
        writeln!(out, "Skipped (malformed): {}", ws.skipped_malformed).unwrap();
        writeln!(out, "Files written:       {}", self.written.len()).unwrap();
        for name in &self.written {
            writeln!(out, "  {name}").unwrap();
        }
        if !self.failed.is_empty() {
            writeln!(out, "Failed reports:      {}", self.failed.len()).unwrap();
            for (label, message) in &self.failed {
                writeln!(out, "  {label}: {message}").unwrap();
            }
        }
        out
    }
}

fn write_functions(ws: &Workspace, sink: &mut dyn TableSink, log: &mut RunLog) -> Result<()> {
    for (variant, group) in ws.index.variants() {
        log.emit(sink, &report::function_tables(variant, group))?;
    }
    Ok(())
}

fn write_files(ws: &Workspace, sink: &mut dyn TableSink, log: &mut RunLog) -> Result<()> {
    for (variant, group) in ws.index.variants() {
        log.emit(sink, &report::file_tables(variant, group))?;
    }
    Ok(())
}

fn write_projects(ws: &Workspace, sink: &mut dyn TableSink, log: &mut RunLog) -> Result<()> {
    for (variant, group) in ws.index.variants() {
        log.emit(sink, &report::project_tables(variant, group))?;
    }
    Ok(())
}

fn write_compare(
    ws: &Workspace,
    sink: &mut dyn TableSink,
    log: &mut RunLog,
    level: Level,
    first: Option<&str>,
    second: Option<&str>,
    preferred: &VariantPair,
) -> Result<()> {
    let (first, second) = select_pair(&ws.index, first, second, preferred)?;
    let rows = compare(level, &ws.index, &first, &second)?;
    info!(level = level.as_str(), %first, %second, rows = rows.len(), "compared variants");

    let tables = match level {
        Level::Function => {
            let changed = retain(rows.clone(), RowFilter::Changed);
            let strict = retain(rows, RowFilter::ChangedNonZeroBaseline);
            vec![
                report::function_delta_table(&changed, &first, &second, false),
                report::function_delta_table(&strict, &first, &second, true),
            ]
        }
        Level::File => vec![report::file_comparison_table(&rows, &first, &second)],
        Level::Project => vec![report::project_comparison_table(&rows, &first, &second)],
    };
    log.emit(sink, &tables)
}

fn write_ablation(
    ws: &Workspace,
    sink: &mut dyn TableSink,
    log: &mut RunLog,
    variants: &AblationVariants,
) -> Result<()> {
    let tables = ablation_tables(&ws.index, variants)?;
    let tables: Vec<Table> = tables.iter().map(report::ablation_table).collect();
    log.emit(sink, &tables)
}

fn write_audit(
    ws: &Workspace,
    sink: &mut dyn TableSink,
    log: &mut RunLog,
    first: Option<&str>,
    second: Option<&str>,
    preferred: &VariantPair,
) -> Result<()> {
    log.emit(sink, &[report::missing_artifacts_table(&ws.folders)])?;

    let (first, second) = match select_pair(&ws.index, first, second, preferred) {
        Ok(pair) => pair,
        Err(CovaggError::InsufficientVariants { found }) => {
            warn!("Skipping function diff: only {found} variant(s) available");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    let diff = function_set_diff(&ws.index, &first, &second)?;
    log.emit_text(
        sink,
        &report::function_set_diff_name(&diff),
        &report::function_set_diff_text(&diff),
    )
}

pub fn cmd_functions(ws: &Workspace, sink: &mut dyn TableSink) -> Result<String> {
    let mut log = RunLog::default();
    write_functions(ws, sink, &mut log)?;
    Ok(log.summary(ws))
}

pub fn cmd_files(ws: &Workspace, sink: &mut dyn TableSink) -> Result<String> {
    let mut log = RunLog::default();
    write_files(ws, sink, &mut log)?;
    Ok(log.summary(ws))
}

pub fn cmd_projects(ws: &Workspace, sink: &mut dyn TableSink) -> Result<String> {
    let mut log = RunLog::default();
    write_projects(ws, sink, &mut log)?;
    Ok(log.summary(ws))
}

/// Compare two variants. The function level writes both the standard and
/// the non-zero-baseline report. `preferred` applies when no name is given.
pub fn cmd_compare(
    ws: &Workspace,
    sink: &mut dyn TableSink,
    level: Level,
    first: Option<&str>,
    second: Option<&str>,
    preferred: &VariantPair,
) -> Result<String> {
    let mut log = RunLog::default();
    write_compare(ws, sink, &mut log, level, first, second, preferred)?;
    Ok(log.summary(ws))
}

pub fn cmd_ablation(
    ws: &Workspace,
    sink: &mut dyn TableSink,
    variants: &AblationVariants,
) -> Result<String> {
    let mut log = RunLog::default();
    write_ablation(ws, sink, &mut log, variants)?;
    Ok(log.summary(ws))
}

pub fn cmd_audit(
    ws: &Workspace,
    sink: &mut dyn TableSink,
    first: Option<&str>,
    second: Option<&str>,
    preferred: &VariantPair,
) -> Result<String> {
    let mut log = RunLog::default();
    write_audit(ws, sink, &mut log, first, second, preferred)?;
    Ok(log.summary(ws))
}

/// Run every report with default settings. A failing report is listed in
/// the summary and does not stop the others.
///
/// Comparisons use `preferred` when both of its variants exist. The function
/// diff lists them in the opposite order.
pub fn cmd_all(
    ws: &Workspace,
    sink: &mut dyn TableSink,
    preferred: &VariantPair,
) -> Result<String> {
    let mut log = RunLog::default();

    let result = write_functions(ws, sink, &mut log);
    log.isolate("functions", result);
    let result = write_files(ws, sink, &mut log);
    log.isolate("files", result);
    let result = write_projects(ws, sink, &mut log);
    log.isolate("projects", result);
    for level in [Level::Function, Level::File, Level::Project] {
        let result = write_compare(ws, sink, &mut log, level, None, None, preferred);
        log.isolate(&format!("compare ({})", level.as_str()), result);
    }
    let result = write_ablation(ws, sink, &mut log, &AblationVariants::default());
    log.isolate("ablation", result);
    let result = write_audit(ws, sink, &mut log, None, None, &preferred.reversed());
    log.isolate("audit", result);

    Ok(log.summary(ws))
}

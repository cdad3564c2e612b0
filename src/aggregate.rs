//! NaN-skipping averages and the rollups built on them.
//!
//! Every level uses the same [`aggregate`] primitive. Rollups that average
//! averages (e.g. per-file across projects) are unweighted: groups of
//! different sizes contribute equally.

use std::collections::BTreeMap;

use crate::index::{ProjectGroup, VariantGroup};
use crate::model::{mean, AggregateRecord, Coverage, GroupKey, HasMetrics, Metrics};

/// Field-wise mean of the inputs, skipping Missing values. Returns `None`
/// for an empty input.
pub fn aggregate<'a, T, I>(items: I) -> Option<Metrics>
where
    T: HasMetrics + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let metrics: Vec<&Metrics> = items.into_iter().map(HasMetrics::metrics).collect();
    if metrics.is_empty() {
        return None;
    }
    let field = |f: fn(&Metrics) -> Coverage| mean(metrics.iter().map(|m| f(*m)));
    Some(Metrics {
        initial_statement: field(|m| m.initial_statement),
        total_statement: field(|m| m.total_statement),
        statement_change: field(|m| m.statement_change),
        initial_branch: field(|m| m.initial_branch),
        total_branch: field(|m| m.total_branch),
        branch_change: field(|m| m.branch_change),
    })
}

/// Aggregate and attach the key plus input count.
pub fn aggregate_as<'a, T, I>(key: GroupKey, items: I) -> Option<AggregateRecord>
where
    T: HasMetrics + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let items: Vec<&T> = items.into_iter().collect();
    let count = items.len();
    aggregate(items).map(|metrics| AggregateRecord {
        key,
        metrics,
        count,
    })
}

/// One average per file of a project.
pub fn file_averages(project: &str, group: &ProjectGroup) -> Vec<AggregateRecord> {
    group
        .files
        .iter()
        .filter_map(|(file, records)| {
            aggregate_as(
                GroupKey::File {
                    project: project.to_string(),
                    file: file.clone(),
                },
                records,
            )
        })
        .collect()
}

/// Average over all function records of a project.
pub fn project_average(project: &str, group: &ProjectGroup) -> Option<AggregateRecord> {
    aggregate_as(GroupKey::Project(project.to_string()), group.records())
}

/// One average per project of a variant.
pub fn project_averages(group: &VariantGroup) -> Vec<AggregateRecord> {
    group
        .projects
        .iter()
        .filter_map(|(name, project)| project_average(name, project))
        .collect()
}

/// Average over all function records of a variant.
pub fn variant_average(variant: &str, group: &VariantGroup) -> Option<AggregateRecord> {
    aggregate_as(GroupKey::Variant(variant.to_string()), group.records())
}

/// Per file name, the mean of that file's per-project averages.
pub fn cross_project_file_averages(group: &VariantGroup) -> BTreeMap<String, AggregateRecord> {
    let mut per_file: BTreeMap<String, Vec<AggregateRecord>> = BTreeMap::new();
    for (name, project) in &group.projects {
        for avg in file_averages(name, project) {
            if let GroupKey::File { file, .. } = &avg.key {
                per_file.entry(file.clone()).or_default().push(avg);
            }
        }
    }
    per_file
        .into_iter()
        .filter_map(|(file, avgs)| {
            let key = GroupKey::File {
                project: String::new(),
                file: file.clone(),
            };
            aggregate_as(key, &avgs).map(|agg| (file, agg))
        })
        .collect()
}

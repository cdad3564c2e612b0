//! Four-level grouping of records: variant → project → file → functions.

use std::collections::BTreeMap;

use crate::model::CoverageRecord;

/// Records of one source file, in insertion order.
pub type FileGroup = Vec<CoverageRecord>;

/// Files of one project, keyed by normalized file name.
#[derive(Debug, Clone, Default)]
pub struct ProjectGroup {
    pub files: BTreeMap<String, FileGroup>,
}

impl ProjectGroup {
    pub fn records(&self) -> impl Iterator<Item = &CoverageRecord> {
        self.files.values().flatten()
    }
}

/// Projects of one variant.
#[derive(Debug, Clone, Default)]
pub struct VariantGroup {
    pub projects: BTreeMap<String, ProjectGroup>,
}

impl VariantGroup {
    pub fn records(&self) -> impl Iterator<Item = &CoverageRecord> {
        self.projects.values().flat_map(|p| p.records())
    }

    pub fn len(&self) -> usize {
        self.records().count()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

/// The full hierarchy built from a flat record stream.
#[derive(Debug, Clone, Default)]
pub struct GroupingIndex {
    variants: BTreeMap<String, VariantGroup>,
}

impl GroupingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = CoverageRecord>,
    {
        let mut index = Self::new();
        for record in records {
            index.insert(record);
        }
        index
    }

    /// Insert a record. A record for the same (variant, project, file,
    /// function) replaces the earlier one in place.
    pub fn insert(&mut self, record: CoverageRecord) {
        let file = self
            .variants
            .entry(record.variant.clone())
            .or_default()
            .projects
            .entry(record.project.clone())
            .or_default()
            .files
            .entry(record.file.clone())
            .or_default();

        match file.iter_mut().find(|r| r.function == record.function) {
            Some(existing) => *existing = record,
            None => file.push(record),
        }
    }

    /// Variant names in sorted order.
    pub fn variant_names(&self) -> Vec<&str> {
        self.variants.keys().map(String::as_str).collect()
    }

    pub fn variant(&self, name: &str) -> Option<&VariantGroup> {
        self.variants.get(name)
    }

    pub fn variants(&self) -> impl Iterator<Item = (&str, &VariantGroup)> {
        self.variants.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Total number of records across all variants.
    pub fn len(&self) -> usize {
        self.variants.values().map(VariantGroup::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Metrics;

    fn record(variant: &str, project: &str, file: &str, function: &str, total: f64) -> CoverageRecord {
        CoverageRecord {
            function: function.to_string(),
            file: file.to_string(),
            project: project.to_string(),
            variant: variant.to_string(),
            metrics: Metrics::from_raw(Some(0.0), Some(total), Some(0.0), Some(total)),
        }
    }

    #[test]
    fn test_builds_hierarchy() {
        let index = GroupingIndex::from_records(vec![
            record("full", "p1", "a.cpp", "f1", 10.0),
            record("full", "p1", "a.cpp", "f2", 20.0),
            record("full", "p2", "b.h", "f1", 30.0),
            record("ablated", "p1", "a.cpp", "f1", 40.0),
        ]);

        assert_eq!(index.variant_names(), vec!["ablated", "full"]);
        assert_eq!(index.len(), 4);

        let full = index.variant("full").unwrap();
        assert_eq!(full.projects.len(), 2);
        assert_eq!(full.projects["p1"].files["a.cpp"].len(), 2);
        assert_eq!(full.len(), 3);
        assert!(index.variant("missing").is_none());
    }

    #[test]
    fn test_duplicate_last_wins() {
        let index = GroupingIndex::from_records(vec![
            record("full", "p1", "a.cpp", "f1", 10.0),
            record("full", "p1", "a.cpp", "f2", 20.0),
            record("full", "p1", "a.cpp", "f1", 99.0),
        ]);
        let file = &index.variant("full").unwrap().projects["p1"].files["a.cpp"];
        assert_eq!(file.len(), 2);
        assert_eq!(file[0].function, "f1");
        assert_eq!(file[0].metrics.total_statement, Some(99.0));
    }

    #[test]
    fn test_empty_index() {
        let index = GroupingIndex::new();
        assert!(index.is_empty());
        assert_eq!(index.len(), 0);
        assert!(index.variant_names().is_empty());
    }
}

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Builder for an artifact store laid out as
/// `<variant>/<project>/<file folder>/<function>/` in a temporary directory.
/// The caller must hold onto the returned `TempDir` to keep it alive.
pub struct Store {
    pub dir: TempDir,
}

impl Store {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    fn folder(&self, variant: &str, project: &str, file: &str, function: &str) -> PathBuf {
        let dir = self
            .path()
            .join(variant)
            .join(project)
            .join(file)
            .join(function);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Write both artifacts with raw JSON bodies.
    pub fn raw(
        &self,
        variant: &str,
        project: &str,
        file: &str,
        function: &str,
        coverage: Option<&str>,
        initial: Option<&str>,
    ) -> PathBuf {
        let dir = self.folder(variant, project, file, function);
        if let Some(body) = coverage {
            fs::write(dir.join(format!("coverage_{function}.json")), body).unwrap();
        }
        if let Some(body) = initial {
            fs::write(dir.join("ai_0_logs.json"), body).unwrap();
        }
        dir
    }

    /// Write a well-formed function folder. Coverage values are percentages;
    /// statement and branch counts are non-zero.
    pub fn function(
        &self,
        variant: &str,
        project: &str,
        file: &str,
        function: &str,
        initial: (f64, f64),
        total: (f64, f64),
    ) -> PathBuf {
        let coverage = format!(
            r#"{{"stmtCov": {}, "branchCov": {}, "totalStatements": 10, "totalBranches": 4}}"#,
            total.0, total.1
        );
        let initial = format!(
            r#"{{"statementCoverage": {}, "branchCoverage": {}}}"#,
            initial.0, initial.1
        );
        self.raw(variant, project, file, function, Some(&coverage), Some(&initial))
    }
}

/// Read a CSV file written by the sink into rows of fields. Only handles the
/// unquoted fields these tests produce.
pub fn read_csv(path: &Path) -> Vec<Vec<String>> {
    let text = fs::read_to_string(path).unwrap();
    assert!(text.ends_with("\r\n"), "CSV rows must end with CRLF");
    text.split("\r\n")
        .filter(|line| !line.is_empty())
        .map(|line| line.split(',').map(str::to_string).collect())
        .collect()
}

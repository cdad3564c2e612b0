//! Destinations for generated reports.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{CovaggError, Result};
use crate::report::{CsvFormatter, Table};

/// Receives named tables and text documents. Names are relative paths.
pub trait TableSink {
    fn write_table(&mut self, table: &Table) -> Result<()>;
    fn write_text(&mut self, name: &str, text: &str) -> Result<()>;
}

/// Writes CSV files below a root directory, creating parent directories on
/// demand.
#[derive(Debug)]
pub struct CsvDirSink {
    root: PathBuf,
    written: Vec<PathBuf>,
}

impl CsvDirSink {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if root.exists() && !root.is_dir() {
            return Err(CovaggError::Other(format!(
                "Output path {} is not a directory",
                root.display()
            )));
        }
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            written: Vec::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Paths written so far, in write order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn write(&mut self, name: &str, contents: &str) -> Result<()> {
        let path = self.root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        info!("Wrote {}", path.display());
        self.written.push(path);
        Ok(())
    }
}

impl TableSink for CsvDirSink {
    fn write_table(&mut self, table: &Table) -> Result<()> {
        self.write(&table.name, &table.format(&CsvFormatter))
    }

    fn write_text(&mut self, name: &str, text: &str) -> Result<()> {
        self.write(name, text)
    }
}

/// Keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub tables: Vec<Table>,
    pub texts: Vec<(String, String)>,
}

impl MemorySink {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.texts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t.as_str())
    }
}

impl TableSink for MemorySink {
    fn write_table(&mut self, table: &Table) -> Result<()> {
        self.tables.push(table.clone());
        Ok(())
    }

    fn write_text(&mut self, name: &str, text: &str) -> Result<()> {
        self.texts.push((name.to_string(), text.to_string()));
        Ok(())
    }
}

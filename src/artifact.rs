//! Discovery of per-function artifacts in the input store.
//!
//! Layout:
//!   <base>/<variant>/<project>/<file folder>/<function folder>/
//!
//! Each function folder is expected to hold one coverage file and one
//! initial-iteration log, both JSON. Folders missing either one are kept in
//! the scan result so they can be skipped and audited downstream.
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{ArtifactKind, CovaggError, Result};
use crate::model::FunctionKey;

/// Default pattern for the final coverage file name.
pub const DEFAULT_COVERAGE_PATTERN: &str = "^coverage_";

/// Default pattern for the first-iteration log file name.
pub const DEFAULT_INITIAL_PATTERN: &str = "ai_0_logs";

/// File-name conventions used to recognise the two artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactPatterns {
    pub coverage: Regex,
    pub initial: Regex,
}

impl ArtifactPatterns {
    pub fn new(coverage: &str, initial: &str) -> Result<Self> {
        Ok(Self {
            coverage: Regex::new(coverage)?,
            initial: Regex::new(initial)?,
        })
    }

    /// Classify a file name. The coverage pattern takes precedence.
    pub fn classify(&self, file_name: &str) -> Option<ArtifactKind> {
        if self.coverage.is_match(file_name) {
            Some(ArtifactKind::Coverage)
        } else if self.initial.is_match(file_name) {
            Some(ArtifactKind::InitialLog)
        } else {
            None
        }
    }
}

impl Default for ArtifactPatterns {
    fn default() -> Self {
        Self {
            coverage: Regex::new(DEFAULT_COVERAGE_PATTERN).expect("valid default pattern"),
            initial: Regex::new(DEFAULT_INITIAL_PATTERN).expect("valid default pattern"),
        }
    }
}

/// One function folder and whichever artifacts it contains.
#[derive(Debug, Clone)]
pub struct FunctionFolder {
    pub key: FunctionKey,
    pub path: PathBuf,
    pub coverage: Option<PathBuf>,
    pub initial: Option<PathBuf>,
}

impl FunctionFolder {
    /// Artifacts this folder lacks.
    pub fn missing(&self) -> Vec<ArtifactKind> {
        let mut kinds = Vec::new();
        if self.coverage.is_none() {
            kinds.push(ArtifactKind::Coverage);
        }
        if self.initial.is_none() {
            kinds.push(ArtifactKind::InitialLog);
        }
        kinds
    }

    pub fn is_complete(&self) -> bool {
        self.coverage.is_some() && self.initial.is_some()
    }

    /// Read both payloads. Errors with `ArtifactMissing` when either file is
    /// absent and `ArtifactMalformed` when a file cannot be read.
    pub fn load(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        let coverage = self.read(self.coverage.as_deref(), ArtifactKind::Coverage)?;
        let initial = self.read(self.initial.as_deref(), ArtifactKind::InitialLog)?;
        Ok((coverage, initial))
    }

    fn read(&self, path: Option<&Path>, kind: ArtifactKind) -> Result<Vec<u8>> {
        let path = path.ok_or_else(|| CovaggError::ArtifactMissing {
            kind,
            path: self.path.clone(),
        })?;
        std::fs::read(path).map_err(|e| CovaggError::ArtifactMalformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// Walk the store and return every function folder in name order.
pub fn scan(base: &Path, patterns: &ArtifactPatterns) -> Result<Vec<FunctionFolder>> {
    if !base.is_dir() {
        return Err(CovaggError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("artifact directory not found: {}", base.display()),
        )));
    }

    let mut folders = Vec::new();
    let walker = WalkDir::new(base)
        .follow_links(true)
        .min_depth(4)
        .max_depth(4)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Skipping unreadable path: {e}");
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let Some(key) = function_key(base, entry.path()) else {
            continue;
        };
        // An unreadable folder is kept with no artifacts so it is skipped
        // and audited like any other incomplete folder.
        let folder = match scan_function_folder(key.clone(), entry.path(), patterns) {
            Ok(folder) => folder,
            Err(e) => {
                warn!("Cannot list {}: {e}", entry.path().display());
                FunctionFolder {
                    key,
                    path: entry.path().to_path_buf(),
                    coverage: None,
                    initial: None,
                }
            }
        };
        debug!(
            path = %folder.path.display(),
            complete = folder.is_complete(),
            "found function folder"
        );
        folders.push(folder);
    }

    Ok(folders)
}

/// Build the key from the four path components below `base`. Names that are
/// not valid UTF-8 are converted lossily.
fn function_key(base: &Path, path: &Path) -> Option<FunctionKey> {
    let rel = path.strip_prefix(base).ok()?;
    if rel.to_str().is_none() {
        warn!("Non UTF-8 path name, using lossy conversion: {}", rel.display());
    }
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    match parts.as_slice() {
        [variant, project, file_folder, function] => Some(FunctionKey {
            variant: variant.clone(),
            project: project.clone(),
            file_folder: file_folder.clone(),
            function: function.clone(),
        }),
        _ => None,
    }
}

fn scan_function_folder(
    key: FunctionKey,
    path: &Path,
    patterns: &ArtifactPatterns,
) -> Result<FunctionFolder> {
    let mut names: Vec<(String, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let file_path = entry.path();
        // Follows symlinks.
        if !file_path.is_file() {
            continue;
        }
        let name = entry.file_name();
        if name.to_str().is_none() {
            warn!("Non UTF-8 file name, using lossy conversion: {}", file_path.display());
        }
        names.push((name.to_string_lossy().into_owned(), file_path));
    }
    names.sort();

    let mut folder = FunctionFolder {
        key,
        path: path.to_path_buf(),
        coverage: None,
        initial: None,
    };
    // Later names win when several files match.
    for (name, file_path) in names {
        match patterns.classify(&name) {
            Some(ArtifactKind::Coverage) => folder.coverage = Some(file_path),
            Some(ArtifactKind::InitialLog) => folder.initial = Some(file_path),
            None => {}
        }
    }
    Ok(folder)
}

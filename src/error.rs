use std::path::PathBuf;

use thiserror::Error;

/// Which of the two per-function artifacts is meant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Coverage,
    InitialLog,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Coverage => "coverage",
            ArtifactKind::InitialLog => "initial log",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum CovaggError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing {kind} artifact in {}", path.display())]
    ArtifactMissing { kind: ArtifactKind, path: PathBuf },

    #[error("Malformed artifact {}: {reason}", path.display())]
    ArtifactMalformed { path: PathBuf, reason: String },

    #[error("Need at least two variants to compare, found {found}")]
    InsufficientVariants { found: usize },

    #[error("Cannot compare variant {0} with itself")]
    SameVariant(String),

    #[error("Variant not found: {0}")]
    VariantNotFound(String),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, CovaggError>;

use std::path::PathBuf;

use thiserror::Error;

use crate::diagnostic::Diagnostic;
use crate::template::TemplateId;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("i/o failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} is not valid UTF-8", .0.display())]
    Encoding(PathBuf),
    #[error("failed to walk the input directory: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("invalid manifest: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error("invalid ignore pattern `{pattern}`: {source}")]
    IgnorePattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
    #[error("cache file could not be encoded: {0}")]
    Cache(#[from] bincode::Error),
    #[error("template {id:?} has no `{placeholder}` placeholder")]
    Template { id: TemplateId, placeholder: String },
    #[error("{} does not belong to any module", .0.display())]
    UnownedSource(PathBuf),
    #[error("{} error(s) reported", .0.len())]
    Diagnostics(Vec<Diagnostic>),
}

impl CoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CoreError::Io {
            path: path.into(),
            source,
        }
    }

    /// Diagnostics carried by a failed stage, if any.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            CoreError::Diagnostics(diagnostics) => diagnostics,
            _ => &[],
        }
    }
}

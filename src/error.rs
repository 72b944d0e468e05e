//! Error types for dependency acquisition.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading runtime dependencies.
#[derive(Debug, Error)]
pub enum DependencyError {
    /// The bundled manifest resource is absent
    #[error("Dependency manifest not found")]
    ManifestMissing,

    /// The manifest is not a valid list of `{name, url}` records
    #[error("Failed to parse dependency manifest: {0}")]
    ManifestParse(String),

    /// Fetching an artifact failed
    #[error("Failed to download {name}: {reason}")]
    Download { name: String, reason: String },

    /// The cache directory could not be created
    #[error("Failed to create directory {path:?}: {source}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A cached artifact could not be opened as a library
    #[error("Failed to load artifact {path:?}: {reason}")]
    ArtifactLoad { path: PathBuf, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DependencyError {
    pub(crate) fn download(name: &str, reason: impl ToString) -> Self {
        Self::Download {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Name of the artifact this error concerns, if any.
    pub fn artifact(&self) -> Option<&str> {
        match self {
            Self::Download { name, .. } => Some(name),
            Self::ArtifactLoad { path, .. } => path.file_name().and_then(|n| n.to_str()),
            _ => None,
        }
    }
}

/// Result type for dependency operations
pub type Result<T> = std::result::Result<T, DependencyError>;

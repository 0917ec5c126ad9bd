use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading project files
///
/// Only main-document problems are fatal to the caller; the mapper logs the
/// rest and skips the affected entry or subtree.
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("project [{0}] does not exist")]
    MissingDocument(String),

    #[error("{path}: malformed {format}: {reason}")]
    Malformed {
        path: String,
        format: &'static str,
        reason: String,
    },

    #[error("{path}: {}", problems.join("; "))]
    Invalid { path: String, problems: Vec<String> },

    #[error("base [{0}] does not exist")]
    MissingBase(String),

    #[error("path [{0}] does not exist")]
    MissingPath(String),

    #[error("stray meta file [{0}]")]
    StrayMeta(String),

    #[error("package {spec}: {reason}")]
    Package { spec: String, reason: String },

    #[error(transparent)]
    Ignore(#[from] tether_core::IgnoreError),
}

impl ProjectError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProjectError>;

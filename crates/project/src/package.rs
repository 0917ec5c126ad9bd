//! Downloadable package references and the resolver contract

use std::fmt;
use std::path::PathBuf;

use tether_core::PackageKind;

use crate::error::{ProjectError, Result};

/// Tag meaning "the newest release"
pub const LATEST: &str = "latest";

/// `owner/repo[@tag]` plus the requested asset kind
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageRef {
    pub owner: String,
    pub repo: String,
    /// `None` means latest
    pub tag: Option<String>,
    pub kind: PackageKind,
}

impl PackageRef {
    pub fn parse(spec: &str, kind: PackageKind) -> Result<Self> {
        let invalid = |reason: &str| ProjectError::Package {
            spec: spec.to_string(),
            reason: reason.to_string(),
        };

        let (repository, tag) = match spec.split_once('@') {
            Some((repository, tag)) if !tag.is_empty() => (repository, Some(tag)),
            Some(_) => return Err(invalid("empty tag")),
            None => (spec, None),
        };
        let (owner, repo) = repository
            .split_once('/')
            .ok_or_else(|| invalid("expected owner/repo"))?;
        if owner.is_empty() || repo.is_empty() || repo.contains('/') {
            return Err(invalid("expected owner/repo"));
        }

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            tag: tag.filter(|tag| *tag != LATEST).map(str::to_string),
            kind,
        })
    }

    pub fn is_latest(&self) -> bool {
        self.tag.is_none()
    }

    pub fn tag_or_latest(&self) -> &str {
        self.tag.as_deref().unwrap_or(LATEST)
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repo, self.tag_or_latest())
    }
}

/// Turns a package reference into a local asset path
///
/// Pinned tags may be served from a cache; latest must always be re-checked.
pub trait PackageResolver: Send {
    fn resolve(&self, package: &PackageRef) -> anyhow::Result<PathBuf>;
}

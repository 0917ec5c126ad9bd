//! Glob ignore filter
//!
//! Combines two sources of ignore patterns into one matcher:
//! 1. Built-in patterns (project document, sourcemap, lockfiles, VCS metadata,
//!    editor temp files - always active)
//! 2. Project-declared `globIgnorePaths`
//!
//! Patterns are matched against project-relative paths with `/` separators.
//! A path is ignored when it, or any of its ancestors, matches.

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::path::{file_name, relative_to};

/// Generated introspection file, always ignored
pub const SOURCEMAP_FILE: &str = "sourcemap.json";

/// Built-in patterns, relative to the project root
const BUILTIN_PATTERNS: &[&str] = &[".git", ".git/**", "**/*.lock", SOURCEMAP_FILE];

#[derive(Debug, Error)]
pub enum IgnoreError {
    #[error("invalid ignore pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

/// Compiled ignore matcher
pub struct IgnoreRules {
    /// Project root directory
    root: PathBuf,

    /// Every pattern compiled together
    set: GlobSet,

    config: IgnoreConfig,
}

impl IgnoreRules {
    /// Compile ignore rules for a project
    pub fn load(root: &Path, config: IgnoreConfig) -> Result<Self, IgnoreError> {
        let mut builder = GlobSetBuilder::new();

        let mut patterns: Vec<String> = BUILTIN_PATTERNS.iter().map(|p| p.to_string()).collect();
        if let Some(document) = &config.document {
            patterns.push(document.clone());
        }
        patterns.extend(config.patterns.iter().cloned());

        for pattern in &patterns {
            builder.add(compile(pattern)?);
        }
        let set = builder.build().map_err(|source| IgnoreError::InvalidPattern {
            pattern: patterns.join(","),
            source,
        })?;

        Ok(Self {
            root: root.to_path_buf(),
            set,
            config,
        })
    }

    /// Check if a project-relative slash path should be ignored
    pub fn should_ignore(&self, path: &str) -> bool {
        let path = path.trim_start_matches("./");
        if path.is_empty() {
            return false;
        }

        if self.config.editor_temp && matches_editor_temp(file_name(path)) {
            return true;
        }

        let mut current = path;
        loop {
            if self.set.is_match(current) {
                return true;
            }
            match current.rfind('/') {
                Some(idx) => current = &current[..idx],
                None => return false,
            }
        }
    }

    /// Check an absolute path; paths outside the project are never ignored
    pub fn should_ignore_path(&self, path: &Path) -> bool {
        match relative_to(path, &self.root) {
            Some(relative) => self.should_ignore(&relative),
            None => false,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &IgnoreConfig {
        &self.config
    }
}

fn compile(pattern: &str) -> Result<Glob, IgnoreError> {
    GlobBuilder::new(pattern.trim_start_matches("./"))
        .literal_separator(true)
        .build()
        .map_err(|source| IgnoreError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })
}

/// Editor swap, backup and OS metadata files
fn matches_editor_temp(filename: &str) -> bool {
    // Vim swap files
    if filename.ends_with(".swp") || filename.ends_with(".swo") {
        return true;
    }

    // Vim/Emacs backup files
    if filename.ends_with('~') {
        return true;
    }

    // Emacs lock files
    if filename.starts_with(".#") {
        return true;
    }

    filename == ".DS_Store" || filename.starts_with("._") || filename == "Thumbs.db"
}

/// Ignore configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IgnoreConfig {
    /// Main project document, relative to the root
    #[serde(default)]
    pub document: Option<String>,

    /// Ignore editor temp files (default: true)
    #[serde(default = "default_true")]
    pub editor_temp: bool,

    /// Project-declared patterns (`globIgnorePaths`)
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl Default for IgnoreConfig {
    fn default() -> Self {
        Self {
            document: None,
            editor_temp: true,
            patterns: vec![],
        }
    }
}

fn default_true() -> bool {
    true
}

//! Tether Project - resolving a project document into the map
//!
//! This crate provides:
//! - Project document parsing and validation
//! - Metadata, script directive and model descriptor handling
//! - The filesystem mapper and project tree resolver
//! - The content hard-link mirror
//! - The package resolution contract

pub mod data;
pub mod descriptor;
pub mod document;
pub mod error;
pub mod mapper;
pub mod meta;
pub mod mirror;
pub mod package;
pub mod resolver;
pub mod script;

mod schema;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tether_core::{path, IgnoreConfig, IgnoreRules, MapEntry, ProjectMap};
use tracing::{debug, info};

pub use document::{ProjectDocument, ProjectNode, SourcemapEnabled, DEFAULT_PORT};
pub use error::{ProjectError, Result};
pub use mapper::MapMode;
pub use mirror::Mirror;
pub use package::{PackageRef, PackageResolver};

/// Options that do not come from the project document
#[derive(Default)]
pub struct ProjectOptions {
    /// Editor content roots to mirror into once the mirror is activated
    pub content_roots: Vec<PathBuf>,

    /// Resolver for `$path` package references
    pub packages: Option<Box<dyn PackageResolver>>,
}

/// A loaded project: its document, ignore rules and map
///
/// Every component mutates the map through this value. It is owned by a single
/// thread; nothing here is shared.
pub struct Project {
    /// Directory holding the main document; local paths are relative to it
    root: PathBuf,

    /// `root` with symlinks resolved, when that differs; watchers may report either
    canonical_root: Option<PathBuf>,

    /// Main document path, relative to the root
    document_path: String,

    document: ProjectDocument,
    map: ProjectMap,
    ignore: IgnoreRules,

    /// Instance entries exactly as the documents declare them, by key
    declared: BTreeMap<String, MapEntry>,

    content_roots: Vec<PathBuf>,
    mirror: Option<Mirror>,
    packages: Option<Box<dyn PackageResolver>>,

    /// Mapper recursion depth; the mirror is refreshed at the outermost call
    depth: usize,
}

impl Project {
    /// Load the main document and prepare an empty map
    pub fn open(document: &Path, options: ProjectOptions) -> Result<Self> {
        let document = if document.is_absolute() {
            document.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|e| ProjectError::io(document, e))?
                .join(document)
        };
        let origin = path::file_name(&path::to_slash(&document)).to_string();
        let root = document
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let canonical_root = std::fs::canonicalize(&root).ok().filter(|canonical| *canonical != root);

        let parsed = ProjectDocument::load(&document, &origin)?;
        check_base(&root, &parsed)?;
        let ignore = build_ignore(&root, &origin, &parsed)?;

        Ok(Self {
            root,
            canonical_root,
            document_path: origin,
            document: parsed,
            map: ProjectMap::new(),
            ignore,
            declared: BTreeMap::new(),
            content_roots: options.content_roots,
            mirror: None,
            packages: options.packages,
            depth: 0,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn document(&self) -> &ProjectDocument {
        &self.document
    }

    /// Main document path, relative to the root
    pub fn document_path(&self) -> &str {
        &self.document_path
    }

    pub fn map(&self) -> &ProjectMap {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut ProjectMap {
        &mut self.map
    }

    pub fn ignore(&self) -> &IgnoreRules {
        &self.ignore
    }

    /// Absolute filesystem path of a local path
    pub fn abs(&self, local: &str) -> PathBuf {
        self.root.join(local)
    }

    /// Local path of an absolute filesystem path inside the project
    pub fn local_of(&self, path: &Path) -> Option<String> {
        path::relative_to(path, &self.root).or_else(|| {
            let canonical = self.canonical_root.as_deref()?;
            path::relative_to(path, canonical)
        })
    }

    /// Whether a local path is excluded; package paths outside the root never are
    pub fn is_ignored(&self, local: &str) -> bool {
        if Path::new(local).is_absolute() {
            self.ignore.should_ignore_path(Path::new(local))
        } else {
            self.ignore.should_ignore(local)
        }
    }

    /// Modification time of a local path, if it exists
    pub fn stat_mtime(&self, local: &str) -> Option<SystemTime> {
        std::fs::metadata(self.abs(local)).and_then(|m| m.modified()).ok()
    }

    pub fn mirror(&self) -> Option<&Mirror> {
        self.mirror.as_ref()
    }

    /// Rebuild the content mirror from scratch; refreshes follow every mapping
    pub fn activate_mirror(&mut self) {
        if self.content_roots.is_empty() {
            return;
        }
        let mirror = self
            .mirror
            .take()
            .unwrap_or_else(|| Mirror::new(&self.root, &self.content_roots, &self.document.name));
        mirror.rebuild(&self.ignore);
        self.mirror = Some(mirror);
    }

    /// Re-read the main document and rebuild the whole map
    ///
    /// Keys that no longer resolve are tombstoned. An invalid document leaves
    /// the current map untouched.
    pub fn reload(&mut self) -> Result<Vec<String>> {
        let document = ProjectDocument::load(&self.abs(&self.document_path), &self.document_path)?;
        check_base(&self.root, &document)?;
        let ignore = build_ignore(&self.root, &self.document_path, &document)?;

        let previous = self.map.keys();
        let renamed = document.name != self.document.name;
        self.document = document;
        self.ignore = ignore;
        self.resolve_all();

        let removed: Vec<String> = previous
            .into_iter()
            .filter(|key| !self.map.contains(key))
            .collect();
        for key in &removed {
            self.map.tombstone(key);
        }

        if renamed && self.mirror.is_some() {
            self.mirror = None;
        }
        if self.mirror.is_some() || renamed {
            self.activate_mirror();
        }
        info!("Reloaded {} ({} entries)", self.document_path, self.map.len());
        Ok(removed)
    }

    /// Re-map a directory or file subtree at `key`
    ///
    /// Entries under `key` that came from `local` are dropped first, so keys the
    /// subtree no longer produces end up tombstoned. Document entries stay.
    pub fn remap_subtree(&mut self, local: &str, key: &str) {
        let stale: Vec<String> = self
            .map
            .keys_under(key)
            .into_iter()
            .filter(|k| {
                self.map.get(k).is_some_and(|entry| {
                    !entry.is_document_origin() && entry.local().is_some_and(|l| path::is_within(l, local))
                })
            })
            .collect();
        for k in &stale {
            self.map.remove(k);
        }
        debug!("Remapping {} at {}", local, key);
        self.map_path(local, key, MapMode::Remap);
    }

    /// Drop every entry a document declared, plus the entries mapped from its directory
    ///
    /// Returns the key the document was mounted at, if it declared anything.
    pub fn forget_document(&mut self, document: &str) -> Option<String> {
        let mount = self.mount_of(document)?;
        let dir = path::parent(document).to_string();
        let doomed: Vec<String> = self
            .map
            .keys_under(&mount)
            .into_iter()
            .filter(|k| {
                self.map.get(k).is_some_and(|entry| {
                    entry.project_json.as_deref() == Some(document)
                        || entry.local().is_some_and(|l| path::is_within(l, &dir))
                })
            })
            .collect();
        for k in &doomed {
            self.map.remove(k);
        }
        self.declared.retain(|_, entry| entry.project_json.as_deref() != Some(document));
        Some(mount)
    }

    /// Shortest key declared by a document: where it is mounted
    pub fn mount_of(&self, document: &str) -> Option<String> {
        self.map
            .entries()
            .iter()
            .filter(|(_, entry)| entry.project_json.as_deref() == Some(document))
            .map(|(key, _)| key)
            .min_by_key(|key| key.len())
            .cloned()
    }
}

fn check_base(root: &Path, document: &ProjectDocument) -> Result<()> {
    if root.join(&document.base).exists() {
        Ok(())
    } else {
        Err(ProjectError::MissingBase(document.base.clone()))
    }
}

fn build_ignore(root: &Path, origin: &str, document: &ProjectDocument) -> Result<IgnoreRules> {
    let config = IgnoreConfig {
        document: Some(origin.to_string()),
        patterns: document.glob_ignore_paths.clone(),
        ..IgnoreConfig::default()
    };
    Ok(IgnoreRules::load(root, config)?)
}

#[cfg(test)]
pub(crate) mod testing;

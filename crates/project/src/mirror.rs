//! Content hard-link mirror
//!
//! Exposes project files to the editor's content roots without copying bytes.
//! Each root gets `<content root>/tether/<project name>/...` holding one hard
//! link per non-ignored project file. Link failures are logged and skipped:
//! the editor falls back to fetching the bytes over the sync protocol.

use std::fs;
use std::path::{Path, PathBuf};

use tether_core::IgnoreRules;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Namespace directory created inside each content root
pub const MIRROR_NAMESPACE: &str = "tether";

pub struct Mirror {
    /// Project root directory
    root: PathBuf,

    /// One mirror directory per content root
    targets: Vec<PathBuf>,
}

impl Mirror {
    pub fn new(root: &Path, content_roots: &[PathBuf], project_name: &str) -> Self {
        let targets = content_roots
            .iter()
            .map(|content| content.join(MIRROR_NAMESPACE).join(project_name))
            .collect();
        Self {
            root: root.to_path_buf(),
            targets,
        }
    }

    pub fn targets(&self) -> &[PathBuf] {
        &self.targets
    }

    /// Remove every mirror and link the whole project again
    pub fn rebuild(&self, ignore: &IgnoreRules) {
        for target in &self.targets {
            if target.exists() {
                if let Err(e) = fs::remove_dir_all(target) {
                    warn!("Hard link error: failed to clear {}: {}", target.display(), e);
                }
            }
            if let Err(e) = fs::create_dir_all(target) {
                warn!("Hard link error: failed to create {}: {}", target.display(), e);
                continue;
            }
            self.link_tree(&self.root, target, ignore);
        }
    }

    /// Relink one project-relative subtree in every mirror
    pub fn refresh(&self, local: &str, ignore: &IgnoreRules) {
        let source = self.root.join(local);
        if !source.starts_with(&self.root) || ignore.should_ignore_path(&source) {
            return;
        }
        for target in &self.targets {
            self.link_tree(&source, target, ignore);
        }
    }

    /// Drop a deleted project path from every mirror
    pub fn remove(&self, local: &str) {
        for target in &self.targets {
            let mirrored = target.join(local);
            let result = match fs::symlink_metadata(&mirrored) {
                Ok(meta) if meta.is_dir() => fs::remove_dir_all(&mirrored),
                Ok(_) => fs::remove_file(&mirrored),
                Err(_) => continue,
            };
            if let Err(e) = result {
                debug!("Hard link error: failed to remove {}: {}", mirrored.display(), e);
            }
        }
    }

    fn link_tree(&self, source: &Path, target: &Path, ignore: &IgnoreRules) {
        let walker = WalkDir::new(source)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| !ignore.should_ignore_path(entry.path()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Hard link error: {}", e);
                    continue;
                }
            };
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let destination = target.join(relative);

            let result = if entry.file_type().is_dir() {
                fs::create_dir_all(&destination)
            } else {
                link_file(entry.path(), &destination)
            };
            if let Err(e) = result {
                debug!("Hard link error: {} -> {}: {}", entry.path().display(), destination.display(), e);
            }
        }
    }
}

fn link_file(source: &Path, destination: &Path) -> std::io::Result<()> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    if fs::symlink_metadata(destination).is_ok() {
        fs::remove_file(destination)?;
    }
    fs::hard_link(source, destination)
}

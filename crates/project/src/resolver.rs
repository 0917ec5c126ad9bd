//! Project tree resolver
//!
//! Walks a document's tree depth-first. Every node becomes an Instance entry
//! that remembers which document declared it; nodes with a `$path` then hand
//! that path to the mapper in Declared mode. Children are resolved before the
//! node's own path so declared entries win over mapped ones on collision.

use std::path::Path;

use tether_core::{path, EntryKind, LocalPath, MapEntry, PackageKind, TREE_ROOT};
use tracing::{debug, error, info};

use crate::document::{self, ProjectNode};
use crate::error::{ProjectError, Result};
use crate::mapper::MapMode;
use crate::package::PackageRef;
use crate::Project;

impl Project {
    /// Rebuild the whole map from the main document
    pub fn resolve_all(&mut self) {
        self.map.clear();
        self.declared.clear();

        let document = self.document_path.clone();
        if let Some(mtime) = self.stat_mtime(&document) {
            self.map.record_mtime(&document, mtime);
        }

        let tree = self.document.tree.clone();
        for (name, node) in &tree.children {
            self.resolve_node(&document, node, TREE_ROOT, name, false, "");
        }
        info!("Resolved {} entries from {}", self.map.len(), document);
    }

    /// Resolve a sub-project document mounted at `mount`
    ///
    /// `prefix` is the document's directory with a trailing slash; its `$path`
    /// values are relative to it.
    pub fn resolve_sub_project(&mut self, document: &str, mount: &str, prefix: &str) {
        if let Some(mtime) = self.stat_mtime(document) {
            self.map.record_mtime(document, mtime);
        }

        match document::load_sub_project(&self.abs(document), document) {
            Ok(tree) => {
                debug!("Mounting {} at {}", document, mount);
                self.resolve_node(document, &tree, mount, "", true, prefix);
            }
            Err(e) => error!("Project error: {}", e),
        }
    }

    fn resolve_node(&mut self, document: &str, node: &ProjectNode, parent: &str, name: &str, mount: bool, prefix: &str) {
        let key = if mount {
            parent.to_string()
        } else {
            path::join(parent, name)
        };
        let directives = &node.directives;

        let class_name = if !mount && parent == TREE_ROOT {
            name.to_string()
        } else {
            directives.class_name.clone().unwrap_or_else(|| "Folder".to_string())
        };
        let local_path = directives.path.as_ref().map(|local| local.prefixed(prefix));

        let mut entry = MapEntry::new(EntryKind::Instance);
        entry.local_path = local_path.clone();
        entry.class_name = Some(class_name);
        entry.properties = directives.properties.clone();
        entry.attributes = directives.attributes.clone();
        entry.tags = directives.tags.clone();
        entry.clear_on_sync = directives.clear_on_sync;
        entry.terrain_region = directives.terrain_region.clone();
        entry.terrain_material_colors = directives.terrain_material_colors.clone();
        entry.project_json = Some(document.to_string());

        if mount {
            self.declared.entry(key.clone()).or_insert_with(|| entry.clone());
        } else {
            self.declared.insert(key.clone(), entry.clone());
        }
        self.map.assign(&key, entry);

        for (child_name, child) in &node.children {
            self.resolve_node(document, child, &key, child_name, false, prefix);
        }

        if let Some(local_path) = local_path {
            self.map_declared(&local_path, &key);
        }
    }

    fn map_declared(&mut self, local_path: &LocalPath, key: &str) {
        match local_path {
            LocalPath::Plain(local) => {
                if self.abs(local).exists() {
                    self.map_path(local, key, MapMode::Declared);
                } else {
                    error!("Project error: Path [{}] does not exist", local);
                }
            }
            LocalPath::Optional { optional } => {
                if self.abs(optional).exists() {
                    self.map_path(optional, key, MapMode::Declared);
                } else {
                    debug!("Optional path {} does not exist", optional);
                }
            }
            LocalPath::Package { package, kind } => match self.fetch_package(package, *kind) {
                Ok(local) => self.map_path(&local, key, MapMode::Declared),
                Err(e) => error!("Project error: {}", e),
            },
        }
    }

    /// Resolve a package to a local path; inside the root it is relative, otherwise absolute
    fn fetch_package(&self, spec: &str, kind: PackageKind) -> Result<String> {
        let package = PackageRef::parse(spec, kind)?;
        let Some(resolver) = &self.packages else {
            return Err(ProjectError::Package {
                spec: spec.to_string(),
                reason: "no package resolver configured".to_string(),
            });
        };

        let resolved = resolver.resolve(&package).map_err(|e| ProjectError::Package {
            spec: spec.to_string(),
            reason: format!("{e:#}"),
        })?;
        Ok(self
            .local_of(&resolved)
            .unwrap_or_else(|| path::to_slash(Path::new(&resolved))))
    }
}

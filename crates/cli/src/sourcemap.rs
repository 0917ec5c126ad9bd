//! Sourcemap writer
//!
//! Language tooling reads `sourcemap.json` to learn which instance each file
//! becomes. The tree is rebuilt from the whole map every time something
//! changed; decoded models are cached by modification time so unchanged
//! models are not decoded again.

use ahash::{AHashMap, AHashSet};
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tether_core::ignore::SOURCEMAP_FILE;
use tether_core::{path, EntryKind, MapEntry, ScriptContext};
use tether_project::Project;
use tether_rbxm::{DecodeError, ModelNode};
use tracing::{debug, error};

use crate::source::pretty_json;

/// Key whose Instance entry is always the terrain object
const TERRAIN_KEY: &str = "tree/Workspace/Terrain";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcemapNode {
    pub name: String,
    pub class_name: String,
    pub file_paths: Vec<String>,
    pub children: Vec<SourcemapNode>,
}

impl SourcemapNode {
    fn new(name: &str, class_name: &str) -> Self {
        Self {
            name: name.to_string(),
            class_name: class_name.to_string(),
            file_paths: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Child called `name`, created as a Folder when missing
    fn child_mut(&mut self, name: &str) -> &mut SourcemapNode {
        let index = match self.children.iter().position(|child| child.name == name) {
            Some(index) => index,
            None => {
                self.children.push(SourcemapNode::new(name, "Folder"));
                self.children.len() - 1
            }
        };
        &mut self.children[index]
    }

    /// Add model children, merging into existing ones with the same name
    fn merge_children(&mut self, children: Vec<SourcemapNode>) {
        for child in children {
            match self.children.iter_mut().find(|existing| existing.name == child.name) {
                Some(existing) => {
                    existing.class_name = child.class_name;
                    existing.merge_children(child.children);
                }
                None => self.children.push(child),
            }
        }
    }

    pub fn find(&self, name: &str) -> Option<&SourcemapNode> {
        self.children.iter().find(|child| child.name == name)
    }
}

impl From<ModelNode> for SourcemapNode {
    fn from(node: ModelNode) -> Self {
        Self {
            name: node.name,
            class_name: node.class_name,
            file_paths: Vec::new(),
            children: node.children.into_iter().map(SourcemapNode::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum ModelFormat {
    Binary,
    Xml,
}

impl ModelFormat {
    fn decode(self, bytes: &[u8]) -> Result<ModelNode, DecodeError> {
        match self {
            ModelFormat::Binary => tether_rbxm::decode(bytes),
            ModelFormat::Xml => {
                let text = std::str::from_utf8(bytes).map_err(|_| DecodeError::Utf8("XML model"))?;
                tether_rbxm::decode_xml(text)
            }
        }
    }
}

#[derive(Default)]
pub struct SourcemapWriter {
    /// Decoded models by absolute path
    models: AHashMap<PathBuf, (SystemTime, Option<ModelNode>)>,
}

impl SourcemapWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the tree and write it next to the main document
    pub fn write(&mut self, project: &Project) -> Result<PathBuf> {
        let tree = self.build(project);
        let target = project.root().join(SOURCEMAP_FILE);
        let json = pretty_json(&tree).context("Failed to serialize sourcemap")?;
        fs::write(&target, json).with_context(|| format!("Failed to write {}", target.display()))?;
        debug!("Wrote {}", target.display());
        Ok(target)
    }

    /// Sourcemap tree for the current map
    pub fn build(&mut self, project: &Project) -> SourcemapNode {
        let document = project.document();
        let mut root = SourcemapNode::new(&document.name, "DataModel");
        root.file_paths.push(project.document_path().to_string());

        let mut seen = AHashSet::new();
        for (key, entry) in project.map().entries() {
            let mut target = &mut root;
            for name in key.split('/').skip(1) {
                target = target.child_mut(name);
            }

            target.class_name = class_of(key, entry).to_string();
            match entry.kind {
                EntryKind::BinaryModel => {
                    if let Some(local) = entry.local() {
                        let enabled = &document.sourcemap_enabled;
                        let format = match path::extension(local).as_str() {
                            ".rbxm" if enabled.rbxm => Some(ModelFormat::Binary),
                            ".rbxmx" if enabled.rbxmx => Some(ModelFormat::Xml),
                            _ => None,
                        };
                        if let Some(format) = format {
                            let abs = project.abs(local);
                            if let Some(model) = self.model(&abs, format) {
                                target.class_name = model.class_name.clone();
                                target.merge_children(model.children.into_iter().map(SourcemapNode::from).collect());
                            }
                            seen.insert(abs);
                        }
                    }
                }
                EntryKind::JsonModel => {
                    if let Some(model) = entry.local().and_then(|local| read_json_model(&project.abs(local))) {
                        if let Some(class_name) = model.get("ClassName").and_then(Value::as_str) {
                            target.class_name = class_name.to_string();
                        }
                        target.merge_children(json_model_children(&model));
                    }
                }
                _ => {}
            }

            if let Some(local) = entry.local() {
                target.file_paths.push(local.to_string());
            }
            if let Some(document) = &entry.project_json {
                target.file_paths.push(document.clone());
            }
        }

        self.models.retain(|path, _| seen.contains(path));
        root
    }

    /// Decoded model at `abs`, re-decoded only when its mtime changed
    fn model(&mut self, abs: &Path, format: ModelFormat) -> Option<ModelNode> {
        let mtime = fs::metadata(abs).and_then(|m| m.modified()).ok()?;
        if let Some((cached, model)) = self.models.get(abs) {
            if *cached == mtime {
                return model.clone();
            }
        }

        let decoded = match fs::read(abs) {
            Ok(bytes) => format
                .decode(&bytes)
                .map_err(|e| error!("Sourcemap error: {}: {}", abs.display(), e))
                .ok(),
            Err(e) => {
                error!("Sourcemap error: {}: {}", abs.display(), e);
                None
            }
        };
        self.models.insert(abs.to_path_buf(), (mtime, decoded.clone()));
        decoded
    }
}

/// Class name of the instance an entry produces
fn class_of<'a>(key: &str, entry: &'a MapEntry) -> &'a str {
    match entry.kind {
        EntryKind::Instance if key == TERRAIN_KEY => "Terrain",
        EntryKind::Instance => entry.class_name.as_deref().unwrap_or("Folder"),
        EntryKind::Script => entry
            .context
            .unwrap_or(ScriptContext::ModuleScript)
            .class_name(),
        EntryKind::StructuredData | EntryKind::ExcelTable => "ModuleScript",
        EntryKind::PlainText => "StringValue",
        EntryKind::LocalizationTable => "LocalizationTable",
        EntryKind::BinaryModel | EntryKind::JsonModel => "Instance",
    }
}

fn read_json_model(abs: &Path) -> Option<Value> {
    let text = fs::read_to_string(abs).ok()?;
    serde_json::from_str(&text)
        .map_err(|e| error!("Sourcemap error: {}: {}", abs.display(), e))
        .ok()
}

fn json_model_children(model: &Value) -> Vec<SourcemapNode> {
    let Some(children) = model.get("Children").and_then(Value::as_array) else {
        return Vec::new();
    };
    children
        .iter()
        .map(|child| {
            let class_name = child.get("ClassName").and_then(Value::as_str).unwrap_or("Instance");
            let name = child.get("Name").and_then(Value::as_str).unwrap_or(class_name);
            let mut node = SourcemapNode::new(name, class_name);
            node.children = json_model_children(child);
            node
        })
        .collect()
}

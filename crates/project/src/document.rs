//! Declarative project documents
//!
//! A document's `tree` is parsed once into typed [`ProjectNode`]s: `$`-prefixed
//! keys become [`NodeDirectives`], object-valued keys become children, and
//! string or array values are leaf data that is never descended into.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::{Map, Value};
use tether_core::{LocalPath, PackageKind};

use crate::error::{ProjectError, Result};
use crate::schema::Problems;

/// Default sync port
pub const DEFAULT_PORT: u16 = 34873;

/// Manifest name that turns a directory into a sub-project
pub const SUB_PROJECT_MANIFEST: &str = "default.project.json";

/// Directives of one tree node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeDirectives {
    pub class_name: Option<String>,
    pub path: Option<LocalPath>,
    pub properties: Option<Map<String, Value>>,
    pub attributes: Option<Map<String, Value>>,
    pub tags: Option<Vec<String>>,
    pub clear_on_sync: Option<bool>,
    pub terrain_region: Option<Value>,
    pub terrain_material_colors: Option<Value>,
}

/// One node of a document tree
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectNode {
    pub directives: NodeDirectives,
    pub children: BTreeMap<String, ProjectNode>,
}

impl ProjectNode {
    fn parse(object: &Map<String, Value>, problems: &mut Problems) -> Self {
        let mut node = ProjectNode::default();
        let directives = &mut node.directives;

        for (key, value) in object {
            match key.as_str() {
                "$className" => directives.class_name = problems.string(key, value),
                "$path" => directives.path = parse_path(value, problems),
                "$properties" => directives.properties = problems.properties(key, value),
                "$attributes" => directives.attributes = problems.object(key, value),
                "$tags" => directives.tags = problems.tags(key, value),
                "$clearOnSync" => directives.clear_on_sync = problems.boolean(key, value),
                "$terrainRegion" => directives.terrain_region = Some(value.clone()),
                "$terrainMaterialColors" => directives.terrain_material_colors = Some(value.clone()),
                "$ignoreUnknownInstances" => problems
                    .warn("Unsupported key $ignoreUnknownInstances; must replace with $clearOnSync"),
                other if other.starts_with('$') => problems.warn(format_args!("Unexpected key {other}")),
                child => {
                    if let Some(child_object) = value.as_object() {
                        node.children
                            .insert(child.to_string(), ProjectNode::parse(child_object, problems));
                    }
                }
            }
        }

        node
    }
}

fn parse_path(value: &Value, problems: &mut Problems) -> Option<LocalPath> {
    match value {
        Value::String(path) => Some(LocalPath::Plain(path.clone())),
        Value::Object(object) => {
            match (object.get("optional"), object.get("package")) {
                (Some(_), Some(_)) => {
                    problems.error("$path cannot have both keys $path.optional and $path.package");
                    None
                }
                (Some(optional), None) => problems
                    .string("$path.optional", optional)
                    .map(|optional| LocalPath::Optional { optional }),
                (None, Some(package)) => {
                    let package = problems.string("$path.package", package);
                    let kind = object.get("type").and_then(Value::as_str).and_then(PackageKind::parse);
                    if kind.is_none() {
                        problems.error("$path.type must be repo, zip, lua, luau, rbxm, or rbxmx");
                    }
                    Some(LocalPath::Package {
                        package: package?,
                        kind: kind?,
                    })
                }
                (None, None) => {
                    problems.error("$path is missing key $path.optional or $path.package");
                    None
                }
            }
        }
        _ => {
            problems.error("$path must be a string or an object");
            None
        }
    }
}

/// Which sourcemap expansions are enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcemapEnabled {
    pub rbxm: bool,
    pub rbxmx: bool,
}

impl Default for SourcemapEnabled {
    fn default() -> Self {
        Self { rbxm: true, rbxmx: true }
    }
}

/// The main project document
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectDocument {
    pub name: String,
    pub base: String,
    pub build: String,
    pub port: u16,
    pub serve_place_ids: Option<Value>,
    pub glob_ignore_paths: Vec<String>,
    pub sourcemap_enabled: SourcemapEnabled,
    pub tree: ProjectNode,
}

impl ProjectDocument {
    /// Load and validate the main document
    pub fn load(path: &Path, origin: &str) -> Result<Self> {
        if !path.is_file() {
            return Err(ProjectError::MissingDocument(origin.to_string()));
        }
        let text = std::fs::read_to_string(path).map_err(|e| ProjectError::io(path, e))?;
        Self::parse(&text, origin)
    }

    pub fn parse(text: &str, origin: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).map_err(|e| ProjectError::Malformed {
            path: origin.to_string(),
            format: "JSON",
            reason: e.to_string(),
        })?;

        let mut problems = Problems::new(origin);
        let Some(object) = value.as_object() else {
            problems.error("project must be an object");
            return Err(problems.into_error());
        };

        let name = required(object, "name", &mut problems).and_then(|v| problems.string("name", v));
        let base = required(object, "base", &mut problems).and_then(|v| problems.string("base", v));
        let build = required(object, "build", &mut problems).and_then(|v| problems.string("build", v));
        if let Some(build) = &build {
            let ext = tether_core::path::extension(build);
            if ext != ".rbxl" && ext != ".rbxlx" {
                problems.error("build must point to an overwritable RBXL or RBXLX file");
            }
        }

        let port = required(object, "port", &mut problems).and_then(|v| match v.as_u64() {
            Some(port) if port <= u16::MAX as u64 => Some(port as u16),
            _ => {
                problems.error("port must be a number");
                None
            }
        });

        let glob_ignore_paths = match object.get("globIgnorePaths") {
            None => Vec::new(),
            Some(Value::String(pattern)) => vec![pattern.clone()],
            Some(Value::Array(patterns)) => {
                let patterns: Option<Vec<String>> =
                    patterns.iter().map(|p| p.as_str().map(str::to_string)).collect();
                patterns.unwrap_or_else(|| {
                    problems.error("globIgnorePaths must be a string or an array of strings");
                    Vec::new()
                })
            }
            Some(_) => {
                problems.error("globIgnorePaths must be a string or an array of strings");
                Vec::new()
            }
        };

        let mut sourcemap_enabled = SourcemapEnabled::default();
        if let Some(value) = object.get("sourcemapEnabled") {
            if let Some(flags) = problems.object("sourcemapEnabled", value) {
                for (key, value) in &flags {
                    match key.as_str() {
                        "RBXM" => sourcemap_enabled.rbxm = problems.boolean(key, value).unwrap_or(true),
                        "RBXMX" => sourcemap_enabled.rbxmx = problems.boolean(key, value).unwrap_or(true),
                        other => problems.warn(format_args!("Unexpected key sourcemapEnabled.{other}")),
                    }
                }
            }
        }

        let serve_place_ids = object.get("servePlaceIds").cloned();
        if serve_place_ids.as_ref().is_some_and(|ids| !ids.is_array()) {
            problems.error("servePlaceIds must be an array");
        }

        for key in object.keys() {
            if !matches!(
                key.as_str(),
                "name" | "base" | "build" | "port" | "servePlaceIds" | "globIgnorePaths" | "sourcemapEnabled" | "tree"
            ) {
                problems.warn(format_args!("Unexpected key {key}"));
            }
        }

        let tree = parse_tree(object, &mut problems);

        match (name, base, build, port, tree) {
            (Some(name), Some(base), Some(build), Some(port), Some(tree)) if problems.is_empty() => Ok(Self {
                name,
                base,
                build,
                port,
                serve_place_ids,
                glob_ignore_paths,
                sourcemap_enabled,
                tree,
            }),
            _ => {
                if problems.is_empty() {
                    problems.error("invalid project");
                }
                Err(problems.into_error())
            }
        }
    }
}

/// Load a sub-project document; only its `tree` is read
pub fn load_sub_project(path: &Path, origin: &str) -> Result<ProjectNode> {
    let text = std::fs::read_to_string(path).map_err(|e| ProjectError::io(path, e))?;
    let value: Value = serde_json::from_str(&text).map_err(|e| ProjectError::Malformed {
        path: origin.to_string(),
        format: "JSON",
        reason: e.to_string(),
    })?;

    let mut problems = Problems::new(origin);
    let tree = match value.as_object() {
        Some(object) => parse_tree(object, &mut problems),
        None => {
            problems.error("project must be an object");
            None
        }
    };
    let tree = problems.finish(tree)?;
    Ok(tree.unwrap_or_default())
}

fn required<'a>(object: &'a Map<String, Value>, key: &str, problems: &mut Problems) -> Option<&'a Value> {
    let value = object.get(key);
    if value.is_none() {
        problems.error(format!("Missing key {key}"));
    }
    value
}

fn parse_tree(object: &Map<String, Value>, problems: &mut Problems) -> Option<ProjectNode> {
    match required(object, "tree", problems)? {
        Value::Object(tree) => Some(ProjectNode::parse(tree, problems)),
        _ => {
            problems.error("tree must be an object");
            None
        }
    }
}

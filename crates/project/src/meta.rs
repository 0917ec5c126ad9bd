//! Sibling (`<stem>.meta.*`) and folder (`init.meta.*`) metadata files

use std::path::Path;

use serde_json::{Map, Value};
use tether_core::{path, DataFormat};

use crate::data;
use crate::error::Result;
use crate::schema::Problems;

/// Extensions probed for metadata, highest priority first
pub const META_EXTENSIONS: [(&str, DataFormat); 3] = [
    ("json", DataFormat::Json),
    ("yaml", DataFormat::Yaml),
    ("toml", DataFormat::Toml),
];

/// Instance-shaping fields a metadata file may carry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub class_name: Option<String>,
    pub properties: Option<Map<String, Value>>,
    pub attributes: Option<Map<String, Value>>,
    pub tags: Option<Vec<String>>,
    pub clear_on_sync: Option<bool>,
}

/// Whether a file name is a metadata file
pub fn is_meta_file(name: &str) -> bool {
    META_EXTENSIONS
        .iter()
        .any(|(ext, _)| name.len() > ext.len() + 6 && name.ends_with(&format!(".meta.{ext}")))
}

/// Stem a metadata file describes (`foo.meta.json` -> `foo`)
pub fn meta_subject(name: &str) -> Option<&str> {
    META_EXTENSIONS
        .iter()
        .find_map(|(ext, _)| name.strip_suffix(&format!(".meta.{ext}")))
        .filter(|stem| !stem.is_empty())
}

/// Every metadata file name for a stem, in priority order
pub fn meta_candidates(stem: &str) -> impl Iterator<Item = String> + '_ {
    META_EXTENSIONS.iter().map(move |(ext, _)| format!("{stem}.meta.{ext}"))
}

/// First existing metadata file for `stem` inside `dir`
///
/// Returns the project-relative path and its format.
pub fn find_meta(root: &Path, dir: &str, stem: &str) -> Option<(String, DataFormat)> {
    META_EXTENSIONS.iter().find_map(|(ext, format)| {
        let local = path::join(dir, &format!("{stem}.meta.{ext}"));
        root.join(&local).is_file().then_some((local, *format))
    })
}

/// Read and validate a metadata file
pub fn load_meta(root: &Path, local: &str, format: DataFormat) -> Result<Metadata> {
    let value = data::read(&root.join(local), format, local)?;
    validate(&value, local)
}

/// Validate a parsed metadata document
pub fn validate(value: &Value, origin: &str) -> Result<Metadata> {
    let mut problems = Problems::new(origin);
    let mut meta = Metadata::default();

    let Some(object) = value.as_object() else {
        problems.error("metadata must be an object");
        return problems.finish(meta);
    };

    for (key, value) in object {
        match key.as_str() {
            "className" => meta.class_name = problems.string(key, value),
            "properties" => meta.properties = problems.properties(key, value),
            "attributes" => meta.attributes = problems.object(key, value),
            "tags" => meta.tags = problems.tags(key, value),
            "clearOnSync" => meta.clear_on_sync = problems.boolean(key, value),
            "ignoreUnknownInstances" => {
                problems.warn("Unsupported key ignoreUnknownInstances; must replace with clearOnSync")
            }
            other => problems.warn(format_args!("Unexpected key {other}")),
        }
    }

    problems.finish(meta)
}

//! File access for the `Source` and `ReverseSync` requests
//!
//! `Source` converts structured data to JSON the editor plugin can decode
//! natively; everything else is returned byte for byte.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tether_core::path;
use thiserror::Error;

/// Extensions the editor may write back
pub const WRITABLE_EXTENSIONS: [&str; 7] = [".lua", ".luau", ".json", ".yaml", ".toml", ".txt", ".csv"];

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {reason}")]
    Convert { path: String, reason: String },

    #[error("{0} conversion is not supported")]
    Unsupported(String),
}

#[derive(Debug, Error)]
pub enum WriteBackError {
    #[error("File not located in project directory")]
    OutsideProject,

    #[error("File extension must be one of {}", WRITABLE_EXTENSIONS.join(", "))]
    Extension,

    #[error("{path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Conversion requested by the `datatype` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Yaml,
    Toml,
    Localization,
    Excel,
    Raw,
}

impl DataType {
    pub fn from_header(header: Option<&str>) -> Self {
        match header {
            Some("YAML") => DataType::Yaml,
            Some("TOML") => DataType::Toml,
            Some("Localization") => DataType::Localization,
            Some("Excel") => DataType::Excel,
            _ => DataType::Raw,
        }
    }
}

/// Read `local` (relative to `root`, or absolute for cached packages) and convert it
pub fn read_source(root: &Path, local: &str, datatype: DataType) -> Result<Vec<u8>, SourceError> {
    if datatype == DataType::Excel {
        return Err(SourceError::Unsupported("Excel".to_string()));
    }

    let bytes = fs::read(root.join(local)).map_err(|source| SourceError::Read {
        path: local.to_string(),
        source,
    })?;
    let convert = |reason: String| SourceError::Convert {
        path: local.to_string(),
        reason,
    };

    match datatype {
        DataType::Yaml => {
            let value: Value = serde_yaml::from_slice(&bytes).map_err(|e| convert(e.to_string()))?;
            pretty_json(&value).map_err(|e| convert(e.to_string()))
        }
        DataType::Toml => {
            let text = String::from_utf8(bytes).map_err(|e| convert(e.to_string()))?;
            let value: Value = toml::from_str(&text).map_err(|e| convert(e.to_string()))?;
            pretty_json(&value).map_err(|e| convert(e.to_string()))
        }
        DataType::Localization => localization_json(&bytes).map_err(convert),
        DataType::Excel | DataType::Raw => Ok(bytes),
    }
}

/// One localization table row
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct LocalizationEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    example: Option<String>,
    values: BTreeMap<String, String>,
}

/// Columns before the per-locale values
const LOCALIZATION_FIXED_COLUMNS: usize = 4;

/// CSV table (header row first) to a JSON array of rows
fn localization_json(bytes: &[u8]) -> Result<Vec<u8>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut records = reader.records();
    let header = match records.next() {
        Some(record) => record.map_err(|e| e.to_string())?,
        None => return Ok(b"[]".to_vec()),
    };

    let mut entries = Vec::new();
    for record in records {
        let record = record.map_err(|e| e.to_string())?;
        let field = |i: usize| record.get(i).map(str::to_string);
        let values = (LOCALIZATION_FIXED_COLUMNS..record.len())
            .filter_map(|i| Some((header.get(i)?.to_string(), record.get(i)?.to_string())))
            .collect();
        entries.push(LocalizationEntry {
            key: field(0),
            source: field(1),
            context: field(2),
            example: field(3),
            values,
        });
    }
    serde_json::to_vec(&entries).map_err(|e| e.to_string())
}

/// JSON with tab indentation
pub fn pretty_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"\t"));
    value.serialize(&mut serializer)?;
    Ok(out)
}

/// Project-relative spelling of a requested path, if it stays inside the root
pub fn resolve_inside(root: &Path, requested: &str) -> Option<String> {
    let requested_path = Path::new(requested);
    let relative = if requested_path.is_absolute() {
        path::relative_to(requested_path, root)?
    } else {
        requested.replace('\\', "/")
    };
    path::normalize_relative(&relative).filter(|local| !local.is_empty())
}

/// Write editor-side changes back into the project
pub fn write_back(root: &Path, requested: &str, body: &[u8]) -> Result<PathBuf, WriteBackError> {
    let local = resolve_inside(root, requested).ok_or(WriteBackError::OutsideProject)?;
    if !WRITABLE_EXTENSIONS.contains(&path::extension(&local).as_str()) {
        return Err(WriteBackError::Extension);
    }

    let target = root.join(&local);
    fs::write(&target, body).map_err(|source| WriteBackError::Write { path: local, source })?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_and_toml_become_tab_indented_json() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.yaml"), "speed: 5\nnames: [x, y]\n").unwrap();
        fs::write(temp_dir.path().join("b.toml"), "[spawn]\nx = 1\n").unwrap();

        let yaml = read_source(temp_dir.path(), "a.yaml", DataType::Yaml).unwrap();
        let text = String::from_utf8(yaml).unwrap();
        assert!(text.contains("\n\t\"speed\": 5"));
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["names"][1], "y");

        let toml = read_source(temp_dir.path(), "b.toml", DataType::Toml).unwrap();
        let value: Value = serde_json::from_slice(&toml).unwrap();
        assert_eq!(value["spawn"]["x"], 1);
    }

    #[test]
    fn test_localization_rows() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("strings.csv"),
            "Key,Source,Context,Example,es,fr\nGreet,Hello,,,Hola,Bonjour\nBye,Goodbye,Menu,\n",
        )
        .unwrap();

        let json = read_source(temp_dir.path(), "strings.csv", DataType::Localization).unwrap();
        let rows: Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(rows.as_array().unwrap().len(), 2);
        assert_eq!(rows[0]["Key"], "Greet");
        assert_eq!(rows[0]["Values"]["es"], "Hola");
        assert_eq!(rows[0]["Values"]["fr"], "Bonjour");
        assert_eq!(rows[1]["Context"], "Menu");
        assert!(rows[1]["Values"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_raw_missing_and_excel() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.lua"), "return 1").unwrap();

        assert_eq!(read_source(temp_dir.path(), "a.lua", DataType::Raw).unwrap(), b"return 1");
        assert!(matches!(
            read_source(temp_dir.path(), "gone.lua", DataType::Raw),
            Err(SourceError::Read { .. })
        ));
        assert!(matches!(
            read_source(temp_dir.path(), "a.lua", DataType::Excel),
            Err(SourceError::Unsupported(_))
        ));

        fs::write(temp_dir.path().join("bad.yaml"), "a: [1").unwrap();
        assert!(matches!(
            read_source(temp_dir.path(), "bad.yaml", DataType::Yaml),
            Err(SourceError::Convert { .. })
        ));
    }

    #[test]
    fn test_resolve_inside_root() {
        let root = Path::new("/work/game");
        assert_eq!(resolve_inside(root, "src/a.lua").as_deref(), Some("src/a.lua"));
        assert_eq!(resolve_inside(root, "src/../b.lua").as_deref(), Some("b.lua"));
        assert_eq!(resolve_inside(root, "/work/game/src/a.lua").as_deref(), Some("src/a.lua"));
        assert_eq!(resolve_inside(root, "../other/a.lua"), None);
        assert_eq!(resolve_inside(root, "/work/other/a.lua"), None);
        assert_eq!(resolve_inside(root, "/work/game/../other/a.lua"), None);
        assert_eq!(resolve_inside(root, "."), None);
    }

    #[test]
    fn test_write_back_rules() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("src")).unwrap();

        let written = write_back(temp_dir.path(), "src/a.lua", b"print(1)").unwrap();
        assert_eq!(fs::read_to_string(written).unwrap(), "print(1)");

        assert!(matches!(
            write_back(temp_dir.path(), "../escape.lua", b""),
            Err(WriteBackError::OutsideProject)
        ));
        assert!(matches!(
            write_back(temp_dir.path(), "src/a.exe", b""),
            Err(WriteBackError::Extension)
        ));
        assert!(matches!(
            write_back(temp_dir.path(), "missing/dir/a.lua", b""),
            Err(WriteBackError::Write { .. })
        ));
    }
}

//! JSON, YAML and TOML documents read into one value model

use std::path::Path;

use serde_json::Value;
use tether_core::DataFormat;

use crate::error::{ProjectError, Result};

/// Format of a structured file, from its extension
pub fn format_of(extension: &str) -> Option<DataFormat> {
    match extension {
        ".json" => Some(DataFormat::Json),
        ".yaml" => Some(DataFormat::Yaml),
        ".toml" => Some(DataFormat::Toml),
        _ => None,
    }
}

/// Parse structured text into a JSON value
pub fn parse(text: &str, format: DataFormat, origin: &str) -> Result<Value> {
    let parsed = match format {
        DataFormat::Json => serde_json::from_str::<Value>(text).map_err(|e| e.to_string()),
        DataFormat::Yaml => serde_yaml::from_str::<Value>(text).map_err(|e| e.to_string()),
        DataFormat::Toml => toml::from_str::<Value>(text).map_err(|e| e.to_string()),
    };
    parsed.map_err(|reason| ProjectError::Malformed {
        path: origin.to_string(),
        format: format_name(format),
        reason,
    })
}

/// Read and parse a structured file
pub fn read(path: &Path, format: DataFormat, origin: &str) -> Result<Value> {
    let text = std::fs::read_to_string(path).map_err(|e| ProjectError::io(path, e))?;
    parse(&text, format, origin)
}

pub fn format_name(format: DataFormat) -> &'static str {
    match format {
        DataFormat::Json => "JSON",
        DataFormat::Yaml => "YAML",
        DataFormat::Toml => "TOML",
    }
}

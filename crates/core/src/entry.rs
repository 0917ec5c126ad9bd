//! Map entries: the record describing one logical-path node

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Variant kind of a map entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    /// Folder or class-shaped instance
    Instance,
    /// Source code unit
    Script,
    /// Model file (`.rbxm`, or its XML twin `.rbxmx`)
    BinaryModel,
    /// `*.model.json` instance description
    JsonModel,
    /// JSON, YAML or TOML backed module
    StructuredData,
    /// `*.excel.json` spreadsheet descriptor
    ExcelTable,
    /// `.txt` string value
    PlainText,
    /// `.csv` localization table
    LocalizationTable,
}

/// Run context of a script entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScriptContext {
    Server,
    Client,
    LegacyScript,
    ModuleScript,
}

impl ScriptContext {
    /// Instance class the editor creates for this context
    pub fn class_name(self) -> &'static str {
        match self {
            ScriptContext::Server | ScriptContext::LegacyScript => "Script",
            ScriptContext::Client => "LocalScript",
            ScriptContext::ModuleScript => "ModuleScript",
        }
    }
}

/// Source format of a structured-data entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataFormat {
    #[serde(rename = "JSON")]
    Json,
    #[serde(rename = "YAML")]
    Yaml,
    #[serde(rename = "TOML")]
    Toml,
}

/// Asset kind requested from a package source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageKind {
    Repo,
    Zip,
    Lua,
    Luau,
    Rbxm,
    Rbxmx,
}

impl PackageKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "repo" => Some(PackageKind::Repo),
            "zip" => Some(PackageKind::Zip),
            "lua" => Some(PackageKind::Lua),
            "luau" => Some(PackageKind::Luau),
            "rbxm" => Some(PackageKind::Rbxm),
            "rbxmx" => Some(PackageKind::Rbxmx),
            _ => None,
        }
    }

    /// File extension of single-file assets
    pub fn extension(self) -> &'static str {
        match self {
            PackageKind::Repo => "",
            PackageKind::Zip => "zip",
            PackageKind::Lua => "lua",
            PackageKind::Luau => "luau",
            PackageKind::Rbxm => "rbxm",
            PackageKind::Rbxmx => "rbxmx",
        }
    }
}

/// Owning filesystem location of an entry
///
/// Declarative documents may defer resolution to an optional path or a
/// downloadable package; those keep their tagged shape on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocalPath {
    Plain(String),
    Optional {
        optional: String,
    },
    Package {
        package: String,
        #[serde(rename = "type")]
        kind: PackageKind,
    },
}

impl LocalPath {
    /// Project-relative path, if this location lives inside the project
    pub fn local(&self) -> Option<&str> {
        match self {
            LocalPath::Plain(path) | LocalPath::Optional { optional: path } => Some(path),
            LocalPath::Package { .. } => None,
        }
    }

    /// Prefix the local path with the directory of the document that declared it
    pub fn prefixed(&self, prefix: &str) -> Self {
        match self {
            LocalPath::Plain(path) => LocalPath::Plain(format!("{prefix}{path}")),
            LocalPath::Optional { optional } => LocalPath::Optional {
                optional: format!("{prefix}{optional}"),
            },
            LocalPath::Package { .. } => self.clone(),
        }
    }
}

impl From<&str> for LocalPath {
    fn from(path: &str) -> Self {
        LocalPath::Plain(path.to_string())
    }
}

/// Entry in the project map
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapEntry {
    #[serde(rename = "Type")]
    pub kind: EntryKind,
    #[serde(rename = "Path", skip_serializing_if = "Option::is_none")]
    pub local_path: Option<LocalPath>,
    #[serde(rename = "Meta", skip_serializing_if = "Option::is_none")]
    pub meta_path: Option<String>,
    #[serde(rename = "ClassName", skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(rename = "Properties", skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,
    #[serde(rename = "Attributes", skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Map<String, Value>>,
    #[serde(rename = "Tags", skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(rename = "ClearOnSync", skip_serializing_if = "Option::is_none")]
    pub clear_on_sync: Option<bool>,
    #[serde(rename = "Context", skip_serializing_if = "Option::is_none")]
    pub context: Option<ScriptContext>,
    #[serde(rename = "Disabled", skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
    #[serde(rename = "InitParent", skip_serializing_if = "Option::is_none")]
    pub init_parent: Option<String>,
    #[serde(rename = "ProjectJson", skip_serializing_if = "Option::is_none")]
    pub project_json: Option<String>,
    #[serde(rename = "TerrainRegion", skip_serializing_if = "Option::is_none")]
    pub terrain_region: Option<Value>,
    #[serde(rename = "TerrainMaterialColors", skip_serializing_if = "Option::is_none")]
    pub terrain_material_colors: Option<Value>,
    #[serde(rename = "Format", skip_serializing_if = "Option::is_none")]
    pub format: Option<DataFormat>,
}

impl MapEntry {
    /// Create a bare entry of the given kind
    pub fn new(kind: EntryKind) -> Self {
        Self {
            kind,
            local_path: None,
            meta_path: None,
            class_name: None,
            properties: None,
            attributes: None,
            tags: None,
            clear_on_sync: None,
            context: None,
            disabled: false,
            init_parent: None,
            project_json: None,
            terrain_region: None,
            terrain_material_colors: None,
            format: None,
        }
    }

    /// Create an entry backed by a plain project-relative path
    pub fn at(kind: EntryKind, local_path: &str) -> Self {
        Self {
            local_path: Some(LocalPath::from(local_path)),
            ..Self::new(kind)
        }
    }

    /// Project-relative data path, if any
    pub fn local(&self) -> Option<&str> {
        self.local_path.as_ref().and_then(LocalPath::local)
    }

    /// Whether a declarative document declared this entry
    pub fn is_document_origin(&self) -> bool {
        self.project_json.is_some()
    }
}

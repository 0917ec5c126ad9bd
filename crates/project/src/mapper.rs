//! Filesystem mapper: local paths -> map entries
//!
//! `map_path` inspects one local path and assigns the entries it produces,
//! recursing into directories. Three modes change how the logical key is
//! derived and whether a plain folder gets its own entry:
//!
//! | Mode     | Key                               | Plain folder entry |
//! |----------|-----------------------------------|--------------------|
//! | Declared | as given by the document          | no                 |
//! | Descend  | file name minus extension/suffix  | yes                |
//! | Remap    | as given (already resolved)       | yes                |

use std::collections::HashSet;
use std::fs;
use std::time::SystemTime;

use tether_core::{path, DataFormat, EntryKind, MapEntry, ScriptContext};
use tracing::{debug, error};

use crate::document::SUB_PROJECT_MANIFEST;
use crate::meta::{self, Metadata};
use crate::{data, descriptor, script, Project};

/// How the mapper was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapMode {
    /// `$path` of a document node
    Declared,
    /// Plain recursive descent into a directory
    Descend,
    /// Re-map of an existing key after a change
    Remap,
}

/// Extensions the mapper turns into entries
const MAPPABLE_EXTENSIONS: [&str; 9] = [
    ".rbxm", ".rbxmx", ".lua", ".luau", ".json", ".yaml", ".toml", ".txt", ".csv",
];

pub fn is_mappable(extension: &str) -> bool {
    MAPPABLE_EXTENSIONS.contains(&extension)
}

/// Key for a file: Descend derives it from the file name, the other modes keep it
fn logical_key(key: &str, mode: MapMode, title: &str) -> String {
    match mode {
        MapMode::Descend => path::join(path::parent(key), title),
        MapMode::Declared | MapMode::Remap => key.to_string(),
    }
}

/// Metadata file found for an entry; `meta` is `None` when it failed validation
struct FoundMeta {
    local: String,
    meta: Option<Metadata>,
}

impl FoundMeta {
    fn apply(&self, entry: &mut MapEntry) {
        entry.meta_path = Some(self.local.clone());
        if let Some(meta) = &self.meta {
            entry.properties = meta.properties.clone();
            entry.attributes = meta.attributes.clone();
            entry.tags = meta.tags.clone();
        }
    }
}

impl Project {
    /// Map one local path (file or directory) at `key`
    pub fn map_path(&mut self, local: &str, key: &str, mode: MapMode) {
        if self.is_ignored(local) {
            debug!("Ignoring {}", local);
            return;
        }

        if self.depth == 0 {
            if let Some(mirror) = &self.mirror {
                mirror.refresh(local, &self.ignore);
            }
        }

        self.depth += 1;
        self.map_inner(local, key, mode);
        self.depth -= 1;
    }

    fn map_inner(&mut self, local: &str, key: &str, mode: MapMode) {
        let metadata = match fs::metadata(self.abs(local)) {
            Ok(metadata) => metadata,
            Err(e) => {
                debug!("Skipping {}: {}", local, e);
                return;
            }
        };
        let mtime = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);

        if metadata.is_dir() {
            self.map_dir(local, key, mode, mtime);
        } else if metadata.is_file() {
            self.map_file(local, key, mode, mtime);
        }
    }

    fn map_file(&mut self, local: &str, key: &str, mode: MapMode, mtime: SystemTime) {
        let ext = path::extension(local);
        if !is_mappable(&ext) {
            if mode == MapMode::Declared {
                error!("Project error: File [{}] is not a mappable file type", local);
            }
            return;
        }

        let name = path::file_name(local).to_string();
        let stem = path::stem(local).to_string();
        let dir = path::parent(local).to_string();

        let mapped = match ext.as_str() {
            ".lua" | ".luau" => {
                let (title, _) = script::split_context(&stem);
                let key = logical_key(key, mode, title);
                let meta = self.find_meta(&dir, title);
                self.map_script(local, &key, None, meta.as_ref())
            }
            ".rbxm" | ".rbxmx" => {
                let key = logical_key(key, mode, &stem);
                self.map.assign(&key, MapEntry::at(EntryKind::BinaryModel, local));
                true
            }
            ".txt" | ".csv" => {
                let kind = if ext == ".txt" {
                    EntryKind::PlainText
                } else {
                    EntryKind::LocalizationTable
                };
                let key = logical_key(key, mode, &stem);
                let mut entry = MapEntry::at(kind, local);
                if let Some(found) = self.find_meta(&dir, &stem) {
                    found.apply(&mut entry);
                }
                self.map.assign(&key, entry);
                true
            }
            // Metadata is recorded by the entry it describes
            _ if meta::is_meta_file(&name) => false,
            _ => match data::format_of(&ext) {
                Some(format) => self.map_data_file(local, key, mode, &stem, format),
                None => false,
            },
        };

        // Files that produced nothing stay unknown, so fixing one reads as an addition
        if mapped {
            self.map.record_mtime(local, mtime);
        }
    }

    fn map_data_file(&mut self, local: &str, key: &str, mode: MapMode, stem: &str, format: DataFormat) -> bool {
        let abs = self.abs(local);

        if format == DataFormat::Json {
            if let Some(title) = stem.strip_suffix(".project") {
                let mount = logical_key(key, mode, title);
                let dir = path::parent(local);
                let prefix = if dir.is_empty() {
                    String::new()
                } else {
                    format!("{dir}/")
                };
                self.resolve_sub_project(local, &mount, &prefix);
                return true;
            }

            if let Some(title) = stem.strip_suffix(".model") {
                let validated = data::read(&abs, format, local)
                    .and_then(|value| descriptor::validate_model(&value, local));
                return match validated {
                    Ok(()) => {
                        let key = logical_key(key, mode, title);
                        self.map.assign(&key, MapEntry::at(EntryKind::JsonModel, local));
                        true
                    }
                    Err(e) => {
                        error!("Project error: {}", e);
                        false
                    }
                };
            }

            if let Some(title) = stem.strip_suffix(".excel") {
                let validated = data::read(&abs, format, local)
                    .and_then(|value| descriptor::validate_excel(&value, &abs, local));
                return match validated {
                    Ok(()) => {
                        let key = logical_key(key, mode, title);
                        self.map.assign(&key, MapEntry::at(EntryKind::ExcelTable, local));
                        true
                    }
                    Err(e) => {
                        error!("Project error: {}", e);
                        false
                    }
                };
            }
        }

        match data::read(&abs, format, local) {
            Ok(_) => {
                let key = logical_key(key, mode, stem);
                let mut entry = MapEntry::at(EntryKind::StructuredData, local);
                entry.format = Some(format);
                self.map.assign(&key, entry);
                true
            }
            Err(e) => {
                error!("Project error: {}", e);
                false
            }
        }
    }

    fn map_script(&mut self, local: &str, key: &str, init_parent: Option<&str>, meta: Option<&FoundMeta>) -> bool {
        let stem = path::stem(local);
        let (_, file_context) = script::split_context(stem);

        let source = match fs::read(self.abs(local)) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                debug!("Skipping {}: {}", local, e);
                return false;
            }
        };
        let directives = script::scan_directives(&source, local);
        let (context, disabled) = script::resolve_context(file_context, directives, local);

        let mut entry = MapEntry::at(EntryKind::Script, local);
        entry.context = Some(context);
        entry.disabled = disabled && context != ScriptContext::ModuleScript;
        entry.init_parent = init_parent.map(str::to_string);
        if let Some(found) = meta {
            found.apply(&mut entry);
        }
        self.map.assign(key, entry);
        true
    }

    fn map_dir(&mut self, local: &str, key: &str, mode: MapMode, mtime: SystemTime) {
        self.map.record_mtime(local, mtime);

        let manifest = path::join(local, SUB_PROJECT_MANIFEST);
        if self.abs(&manifest).is_file() {
            let prefix = if local.is_empty() {
                String::new()
            } else {
                format!("{local}/")
            };
            self.resolve_sub_project(&manifest, key, &prefix);
            return;
        }

        let folder = self.folder_name(local);
        let folder_meta = self.find_meta(local, "init");
        let init_names = script::init_candidates(&folder);

        let init = init_names
            .iter()
            .map(|name| path::join(local, name))
            .find(|candidate| self.abs(candidate).is_file());

        match init {
            Some(init) => {
                if self.map_script(&init, key, Some(local), folder_meta.as_ref()) {
                    if let Some(mtime) = self.stat_mtime(&init) {
                        self.map.record_mtime(&init, mtime);
                    }
                }
            }
            None if mode != MapMode::Declared => {
                // Folders the document declares never take init metadata
                let declared = self.declared.contains_key(key);
                let mut entry = self.declared.get(key).cloned().unwrap_or_else(|| {
                    let mut entry = MapEntry::at(EntryKind::Instance, local);
                    entry.class_name = Some("Folder".to_string());
                    entry
                });
                if let Some(found) = folder_meta.as_ref().filter(|_| !declared) {
                    found.apply(&mut entry);
                    if let Some(meta) = &found.meta {
                        if meta.class_name.is_some() {
                            entry.class_name = meta.class_name.clone();
                        }
                        entry.clear_on_sync = meta.clear_on_sync;
                    }
                }
                self.map.assign(key, entry);
            }
            None => {}
        }

        let skip: HashSet<String> = init_names
            .into_iter()
            .chain(meta::meta_candidates("init"))
            .collect();

        let mut names: Vec<String> = match fs::read_dir(self.abs(local)) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .filter(|name| !skip.contains(name))
                .collect(),
            Err(e) => {
                debug!("Skipping {}: {}", local, e);
                return;
            }
        };
        names.sort();

        for name in names {
            self.map_path(&path::join(local, &name), &path::join(key, &name), MapMode::Descend);
        }
    }

    /// First metadata file for `stem` in `dir`, loaded and validated
    fn find_meta(&mut self, dir: &str, stem: &str) -> Option<FoundMeta> {
        let (local, format) = meta::find_meta(self.root(), dir, stem)?;
        if let Some(mtime) = self.stat_mtime(&local) {
            self.map.record_mtime(&local, mtime);
        }
        let meta = match meta::load_meta(self.root(), &local, format) {
            Ok(meta) => Some(meta),
            Err(e) => {
                error!("Project error: {}", e);
                None
            }
        };
        Some(FoundMeta { local, meta })
    }

    fn folder_name(&self, local: &str) -> String {
        match path::file_name(local) {
            "" | "." => self
                .root()
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            name => name.to_string(),
        }
    }
}

//! Incremental synchronizer
//!
//! Each filesystem event is classified against the modification-time cache
//! and then applied to the smallest affected subtree of the map:
//!
//! - **Deleted**: a known path no longer exists
//! - **Changed**: a known file exists with a different mtime
//! - **Added**: an unknown path exists under a mapped directory
//!
//! Events must be processed one at a time in arrival order. Classification
//! of a later event depends on the mtime cache updates of earlier ones.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

use tether_core::path;
use tether_project::document::SUB_PROJECT_MANIFEST;
use tether_project::mapper::is_mappable;
use tether_project::{meta, script, MapMode, Project};
use tracing::{debug, error, info};

/// What an event turned out to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Added,
    Changed,
    Deleted,
    /// The main document changed and the whole map was rebuilt
    Reloaded,
}

/// Sibling extensions a metadata file may describe, in lookup order
const META_SUBJECT_EXTENSIONS: [&str; 4] = [".lua", ".luau", ".txt", ".csv"];

/// Apply one filesystem event at an absolute path
///
/// Returns what happened, or `None` when the event did not concern the map.
pub fn process(project: &mut Project, abs: &Path) -> Option<Change> {
    let local = project.local_of(abs)?;
    if local.is_empty() {
        return None;
    }

    if local == project.document_path() {
        return reload_document(project);
    }
    if project.is_ignored(&local) {
        return None;
    }

    let change = classify(project, &local)?;
    match change {
        Change::Deleted => {
            info!("D {}", local);
            apply_deleted(project, &local);
        }
        Change::Changed => {
            info!("M {}", local);
            apply_changed(project, &local);
        }
        Change::Added => {
            info!("A {}", local);
            apply_added(project, &local);
        }
        Change::Reloaded => {}
    }
    Some(change)
}

/// Classify an event by re-stating the path
pub fn classify(project: &Project, local: &str) -> Option<Change> {
    let known = project.map().is_known(local);
    let stat = fs::metadata(project.abs(local));

    match (known, stat) {
        (true, Err(_)) => Some(Change::Deleted),
        (true, Ok(metadata)) => {
            if !metadata.is_file() {
                return None;
            }
            let mtime = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            (project.map().mtime(local) != Some(mtime)).then_some(Change::Changed)
        }
        (false, Ok(metadata)) => {
            let parent_known = project.map().is_known(path::parent(local));
            let mappable = metadata.is_dir() || is_mappable(&path::extension(local));
            (parent_known && mappable).then_some(Change::Added)
        }
        (false, Err(_)) => None,
    }
}

fn reload_document(project: &mut Project) -> Option<Change> {
    let local = project.document_path().to_string();
    let Some(mtime) = project.stat_mtime(&local) else {
        error!("Project error: {} was removed; keeping the current map", local);
        return None;
    };
    if project.map().mtime(&local) == Some(mtime) {
        return None;
    }

    info!("M {}", local);
    match project.reload() {
        Ok(removed) => {
            debug!("Reload removed {} keys", removed.len());
            Some(Change::Reloaded)
        }
        Err(e) => {
            error!("Project error: {}", e);
            project.map_mut().record_mtime(&local, mtime);
            None
        }
    }
}

fn is_sub_project_document(local: &str) -> bool {
    let name = path::file_name(local);
    name == SUB_PROJECT_MANIFEST || name.ends_with(".project.json")
}

/// Re-resolve a sub-project document at its mount point
fn remount(project: &mut Project, document: &str, mount: &str) {
    let dir = path::parent(document);
    if path::file_name(document) == SUB_PROJECT_MANIFEST {
        if project.abs(dir).is_dir() {
            project.remap_subtree(dir, mount);
        }
    } else if project.abs(document).is_file() {
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{dir}/")
        };
        project.resolve_sub_project(document, mount, &prefix);
    }
}

fn apply_deleted(project: &mut Project, local: &str) {
    let gone = project.map().known_under(local);
    for known in &gone {
        project.map_mut().forget_mtime(known);
    }
    if let Some(mirror) = project.mirror() {
        mirror.remove(local);
    }

    for document in gone.iter().filter(|known| is_sub_project_document(known)) {
        if let Some(mount) = project.forget_document(document) {
            remount(project, document, &mount);
        }
    }

    let mut removals = Vec::new();
    let mut modified = Vec::new();
    let mut remaps = BTreeSet::new();

    for (key, entry) in project.map().entries() {
        if let Some(meta_path) = &entry.meta_path {
            if path::is_within(meta_path, local) {
                let data = entry.init_parent.as_deref().or(entry.local()).unwrap_or_default();
                if !path::is_within(data, local) {
                    remaps.insert((data.to_string(), key.clone()));
                    continue;
                }
            }
        }

        let Some(data) = entry.local() else {
            continue;
        };
        if !path::is_within(data, local) {
            continue;
        }

        match &entry.init_parent {
            Some(parent) if !path::is_within(parent, local) => {
                remaps.insert((parent.clone(), key.clone()));
            }
            _ if entry.is_document_origin() => modified.push(key.clone()),
            _ => removals.push(key.clone()),
        }
    }

    for key in &removals {
        project.map_mut().remove(key);
    }
    for key in &modified {
        project.map_mut().mark_modified(key);
    }
    for (data, key) in remaps {
        if project.abs(&data).exists() {
            project.remap_subtree(&data, &key);
        } else if project.map().get(&key).is_some_and(|e| !e.is_document_origin()) {
            project.map_mut().remove(&key);
        }
    }
}

fn apply_changed(project: &mut Project, local: &str) {
    if is_sub_project_document(local) {
        if let Some(mount) = project.forget_document(local) {
            remount(project, local, &mount);
            return;
        }
    }

    let targets: BTreeSet<(String, String)> = project
        .map()
        .entries()
        .iter()
        .filter(|(_, entry)| entry.local() == Some(local) || entry.meta_path.as_deref() == Some(local))
        .map(|(key, entry)| {
            let data = entry.init_parent.as_deref().or(entry.local()).unwrap_or(local);
            (data.to_string(), key.clone())
        })
        .collect();

    if targets.is_empty() {
        // Known but unmapped, e.g. a data file that failed to parse: map it as new
        debug!("No entry references {}", local);
        apply_added(project, local);
    }
    for (data, key) in targets {
        project.remap_subtree(&data, &key);
    }

    if let Some(mtime) = project.stat_mtime(local) {
        project.map_mut().record_mtime(local, mtime);
    }
}

fn apply_added(project: &mut Project, local: &str) {
    let name = path::file_name(local).to_string();
    let parent = path::parent(local).to_string();

    // A directory mounted at several keys is updated at each of them
    let parent_keys = keys_of_dir(project, &parent);
    if parent_keys.is_empty() {
        debug!("Parent of {} is not mapped", local);
        return;
    }

    if let Some(subject) = meta::meta_subject(&name).filter(|subject| *subject != "init") {
        let Some(sibling) = find_meta_subject(project, &parent, subject) else {
            error!("Sync error: Stray meta file [{}]", local);
            return;
        };
        let sibling_keys = keys_of_file(project, &sibling);
        if sibling_keys.is_empty() {
            for parent_key in &parent_keys {
                let key = path::join(parent_key, path::file_name(&sibling));
                project.map_path(&sibling, &key, MapMode::Descend);
            }
        } else {
            for key in &sibling_keys {
                project.remap_subtree(&sibling, key);
            }
        }
        return;
    }

    let folder_level = script::is_init_name(&name)
        || meta::meta_subject(&name) == Some("init")
        || name == SUB_PROJECT_MANIFEST;
    for parent_key in &parent_keys {
        if folder_level {
            project.remap_subtree(&parent, parent_key);
        } else {
            project.map_path(local, &path::join(parent_key, &name), MapMode::Descend);
        }
    }
}

/// Script, text or localization file a metadata stem describes
fn find_meta_subject(project: &Project, dir: &str, subject: &str) -> Option<String> {
    META_SUBJECT_EXTENSIONS.iter().find_map(|ext| {
        let suffixes: &[&str] = if script::is_script_extension(ext) {
            &script::CONTEXT_SUFFIXES
        } else {
            &[""]
        };
        suffixes
            .iter()
            .map(|suffix| path::join(dir, &format!("{subject}{suffix}{ext}")))
            .find(|candidate| project.abs(candidate).is_file())
    })
}

/// Keys of the entries a mapped directory produced, as a folder or through its init script
fn keys_of_dir(project: &Project, dir: &str) -> Vec<String> {
    project
        .map()
        .entries()
        .iter()
        .filter(|(_, entry)| entry.init_parent.as_deref() == Some(dir) || entry.local() == Some(dir))
        .map(|(key, _)| key.clone())
        .collect()
}

/// Keys of the entries a file produced directly
fn keys_of_file(project: &Project, local: &str) -> Vec<String> {
    project
        .map()
        .entries()
        .iter()
        .filter(|(_, entry)| entry.local() == Some(local))
        .map(|(key, _)| key.clone())
        .collect()
}

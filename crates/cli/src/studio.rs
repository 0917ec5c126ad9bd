//! Default editor content roots
//!
//! The editor resolves `rbxasset://` URLs against its install's `content`
//! directory, so the mirror is placed there. Only directories that already
//! exist are returned.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Executable marking a versions subdirectory as an editor install
const STUDIO_EXECUTABLE: &str = "RobloxStudioBeta.exe";

/// Content roots of every editor install found on this machine
pub fn discover_content_roots() -> Vec<PathBuf> {
    let roots = platform_content_roots();
    debug!("Found {} editor content roots", roots.len());
    roots
}

#[cfg(target_os = "windows")]
fn platform_content_roots() -> Vec<PathBuf> {
    let Some(local) = dirs::data_local_dir() else {
        return Vec::new();
    };
    let mut roots = versioned_content_roots(&local.join("Roblox").join("Versions"));

    // Mod manager installs keep a single content directory
    let mod_manager = local.join("Roblox Studio").join("content");
    if mod_manager.is_dir() {
        roots.push(mod_manager);
    }
    roots
}

#[cfg(target_os = "macos")]
fn platform_content_roots() -> Vec<PathBuf> {
    let content = PathBuf::from("/Applications/RobloxStudio.app/Contents/Resources/content");
    if content.is_dir() {
        vec![content]
    } else {
        Vec::new()
    }
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn platform_content_roots() -> Vec<PathBuf> {
    Vec::new()
}

/// `<versions>/<version>/content` for every version holding the editor executable
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
fn versioned_content_roots(versions: &Path) -> Vec<PathBuf> {
    let Ok(dir) = fs::read_dir(versions) else {
        return Vec::new();
    };

    let mut roots: Vec<PathBuf> = dir
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|version| version.join(STUDIO_EXECUTABLE).is_file())
        .map(|version| version.join("content"))
        .collect();
    roots.sort();
    roots
}

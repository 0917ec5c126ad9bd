//! Common utilities for synchronizer scenario tests
//!
//! `TestProject` owns a temporary project directory and drives the
//! synchronizer the way the engine does: mutate the filesystem, then feed
//! the touched path through `tether_watcher::process`.

use anyhow::Result;
use filetime::FileTime;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use tether_project::{Project, ProjectOptions};
use tether_watcher::Change;

pub struct TestProject {
    dir: TempDir,
    /// Monotonic clock for forced mtimes, so every write looks like a change
    tick: u64,
}

impl TestProject {
    /// Project named `Game` with the given document tree
    pub fn new(tree: Value) -> Result<Self> {
        let project = Self {
            dir: TempDir::new()?,
            tick: 0,
        };
        fs::write(project.path().join("base.rbxl"), b"")?;
        project.write_document(tree)?;
        Ok(project)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn abs(&self, local: &str) -> PathBuf {
        self.path().join(local)
    }

    pub fn write_document(&self, tree: Value) -> Result<()> {
        let document = json!({
            "name": "Game",
            "base": "base.rbxl",
            "build": "build.rbxl",
            "port": 34873,
            "tree": tree,
        });
        fs::write(self.abs("default.project.json"), document.to_string())?;
        Ok(())
    }

    /// Write a file (creating parents) with a fresh, distinct mtime
    pub fn write(&mut self, local: &str, contents: &str) -> Result<()> {
        let path = self.abs(local);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        self.bump(local)
    }

    pub fn mkdir(&self, local: &str) -> Result<()> {
        fs::create_dir_all(self.abs(local))?;
        Ok(())
    }

    pub fn remove(&self, local: &str) -> Result<()> {
        let path = self.abs(local);
        if path.is_dir() {
            fs::remove_dir_all(path)?;
        } else {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn rename(&self, from: &str, to: &str) -> Result<()> {
        fs::rename(self.abs(from), self.abs(to))?;
        Ok(())
    }

    /// Move a path's mtime forward without touching its contents
    pub fn bump(&mut self, local: &str) -> Result<()> {
        self.tick += 10;
        let mtime = SystemTime::now() + Duration::from_secs(self.tick);
        filetime::set_file_mtime(self.abs(local), FileTime::from_system_time(mtime))?;
        Ok(())
    }

    /// Open the project without resolving it
    pub fn open(&self) -> Result<Project> {
        Ok(Project::open(&self.abs("default.project.json"), ProjectOptions::default())?)
    }

    /// Open and fully resolve, as the engine does at startup
    pub fn resolve(&self) -> Result<Project> {
        let mut project = self.open()?;
        project.resolve_all();
        Ok(project)
    }

    /// Feed one event through the synchronizer
    pub fn event(&self, project: &mut Project, local: &str) -> Option<Change> {
        tether_watcher::process(project, &self.abs(local))
    }

    /// Serialized entries of `project` next to those of a from-scratch resolve
    pub fn converged(&self, project: &Project) -> Result<(String, String)> {
        let fresh = self.resolve()?;
        Ok((
            serde_json::to_string_pretty(project.map().entries())?,
            serde_json::to_string_pretty(fresh.map().entries())?,
        ))
    }
}

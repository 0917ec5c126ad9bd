//! Temporary project directories for unit tests

use std::fs;
use std::path::Path;

use serde_json::{json, Value};
use tempfile::TempDir;

use crate::{Project, ProjectOptions};

pub(crate) struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    /// Project named `Game` whose document tree is `tree`
    pub fn new(tree: Value) -> Self {
        Self::with_document(json!({
            "name": "Game",
            "base": "base.rbxl",
            "build": "build.rbxl",
            "port": 34873,
            "tree": tree,
        }))
    }

    pub fn with_document(document: Value) -> Self {
        let fixture = Self {
            dir: TempDir::new().unwrap(),
        };
        fixture.write("base.rbxl", "");
        fixture.write("default.project.json", &document.to_string());
        fixture
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, local: &str, contents: &str) {
        let path = self.path().join(local);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    pub fn mkdir(&self, local: &str) {
        fs::create_dir_all(self.path().join(local)).unwrap();
    }

    pub fn open_with(&self, options: ProjectOptions) -> Project {
        Project::open(&self.path().join("default.project.json"), options).unwrap()
    }

    /// Opened and fully resolved
    pub fn resolved(&self) -> Project {
        let mut project = self.open_with(ProjectOptions::default());
        project.resolve_all();
        project
    }
}

//! CLI command implementations

pub mod serve;
pub mod sourcemap;

use anyhow::{Context, Result};
use std::path::Path;
use tether_cli::packages::GitHubPackages;
use tether_cli::{studio, Settings};
use tether_project::{Project, ProjectOptions};

/// Open the project document with the resolvers and content roots the settings ask for
fn open_project(document: &Path, settings: &Settings) -> Result<Project> {
    let mut content_roots = settings.content_roots.clone();
    if settings.discover_studio_content {
        content_roots.extend(studio::discover_content_roots());
    }

    let options = ProjectOptions {
        content_roots,
        packages: Some(Box::new(GitHubPackages::new(&settings.package_cache))),
    };
    Project::open(document, options).context("Project error")
}

//! Layered settings
//!
//! Sources, lowest priority first:
//! 1. Built-in defaults
//! 2. `tether.toml` next to the project document (optional)
//! 3. `TETHER_*` environment variables
//! 4. Command-line flags

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Settings file looked up beside the project document
pub const SETTINGS_FILE: &str = "tether.toml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "TETHER";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Sync port; the document's `port` when unset
    pub port: Option<u16>,

    /// Verbose logging, also reported to the editor in `Map`
    pub debug: bool,

    /// Write `sourcemap.json` next to the document
    pub generate_sourcemap: bool,

    /// Extra editor content roots for the hard-link mirror
    pub content_roots: Vec<PathBuf>,

    /// Probe the platform's default editor install for content roots
    pub discover_studio_content: bool,

    /// Downloaded packages are unpacked here
    pub package_cache: PathBuf,

    /// Directory for daily-rolling log files
    pub log_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: None,
            debug: false,
            generate_sourcemap: true,
            content_roots: Vec::new(),
            discover_studio_content: true,
            package_cache: default_package_cache(),
            log_dir: None,
        }
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub port: Option<u16>,
    pub debug: bool,
}

impl Settings {
    /// Load every layer for the project whose document is `document`
    pub fn load(document: &Path, overrides: Overrides) -> Result<Self> {
        let dir = document.parent().unwrap_or_else(|| Path::new("."));
        let file = dir.join(SETTINGS_FILE);

        let mut builder = config::Config::builder()
            .add_source(config::File::from(file.clone()).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        if let Some(port) = overrides.port {
            builder = builder.set_override("port", i64::from(port))?;
        }
        if overrides.debug {
            builder = builder.set_override("debug", true)?;
        }

        let settings = builder
            .build()
            .with_context(|| format!("Failed to read settings from {}", file.display()))?
            .try_deserialize()
            .context("Invalid settings")?;
        Ok(settings)
    }

    /// Port to bind, given the document's own
    pub fn port_or(&self, document_port: u16) -> u16 {
        self.port.unwrap_or(document_port)
    }
}

fn default_package_cache() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("tether")
        .join("packages")
}

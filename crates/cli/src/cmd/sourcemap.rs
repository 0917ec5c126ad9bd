//! Write sourcemap.json once and exit

use anyhow::Result;
use std::path::Path;
use tether_cli::sourcemap::SourcemapWriter;
use tether_cli::{logging, Overrides, Settings};

pub fn run(document: &Path, debug: bool) -> Result<()> {
    let settings = Settings::load(document, Overrides { port: None, debug })?;
    let _guard = logging::init(settings.debug, settings.log_dir.as_deref())?;

    let mut project = super::open_project(document, &settings)?;
    project.resolve_all();

    let written = SourcemapWriter::new().write(&project)?;
    logging::print_sourcemap_written(&written);
    Ok(())
}

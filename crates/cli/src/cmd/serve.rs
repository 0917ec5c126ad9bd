//! Serve the project to the editor plugin

use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::sync::Arc;
use tether_cli::{logging, server, Engine, EngineOptions, Overrides, ServerState, Settings};
use tether_watcher::FsWatcher;
use tracing::info;

pub fn run(document: &Path, port: Option<u16>, debug: bool) -> Result<()> {
    let settings = Settings::load(document, Overrides { port, debug })?;
    let _guard = logging::init(settings.debug, settings.log_dir.as_deref())?;

    let project = super::open_project(document, &settings)?;
    let name = project.document().name.clone();
    let root = project.root().to_path_buf();
    let port = settings.port_or(project.document().port);

    let engine = Engine::new(
        project,
        EngineOptions {
            debug: settings.debug,
            generate_sourcemap: settings.generate_sourcemap,
        },
    );
    let (handle, engine_thread) = engine.spawn()?;

    let sink = handle.clone();
    let _watcher = FsWatcher::start(&root, move |event| sink.notify(event))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let state = Arc::new(ServerState::new(handle.clone(), root));
    let served = runtime.block_on(async {
        let listener = server::bind(port).await?;
        logging::print_banner(&name, port);
        server::serve(listener, state).await
    });

    info!("Stopping engine");
    handle.shutdown();
    engine_thread
        .join()
        .map_err(|_| anyhow!("Engine thread panicked"))?;
    served
}

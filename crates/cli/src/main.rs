//! Tether CLI - tether command

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

/// Tether - map a game project onto the filesystem and keep the editor in sync
#[derive(Parser)]
#[command(name = "tether")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Map the project and serve it to the editor plugin
    Serve {
        /// Project document (default: default.project.json)
        #[arg(default_value = "default.project.json")]
        project: PathBuf,

        /// Port to listen on (default: the document's port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Verbose logging
        #[arg(long)]
        debug: bool,
    },
    /// Map the project once and write sourcemap.json
    Sourcemap {
        /// Project document (default: default.project.json)
        #[arg(default_value = "default.project.json")]
        project: PathBuf,

        /// Verbose logging
        #[arg(long)]
        debug: bool,
    },
}

// Not async: package downloads use a blocking HTTP client on the engine
// thread, so the runtime is built only around the server.
fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { project, port, debug } => cmd::serve::run(&project, port, debug),
        Commands::Sourcemap { project, debug } => cmd::sourcemap::run(&project, debug),
    }
}

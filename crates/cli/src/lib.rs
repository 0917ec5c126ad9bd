//! Tether CLI library
//!
//! Everything the `tether` binary wires together:
//! - Layered settings and logging setup
//! - The engine actor that owns the project map
//! - The HTTP sync protocol and its file access helpers
//! - The sourcemap writer
//! - GitHub package resolution and editor content root discovery

pub mod config;
pub mod engine;
pub mod logging;
pub mod packages;
pub mod server;
pub mod source;
pub mod sourcemap;
pub mod studio;

pub use config::{Overrides, Settings};
pub use engine::{Engine, EngineHandle, EngineOptions, Message};
pub use server::ServerState;

//! Engine actor
//!
//! The [`Project`] (map, mtime cache and delta buckets) is owned by one
//! dedicated thread. Filesystem events and protocol requests arrive as
//! [`Message`]s on a single unbounded channel and are handled one at a time,
//! in arrival order, each to completion. Nothing else touches the map.

use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::thread::{self, JoinHandle};
use tether_core::Audience;
use tether_project::Project;
use tether_watcher::{sync, WatchEvent};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use crate::sourcemap::SourcemapWriter;

/// Reported to the editor in every `Map` response
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub enum Message {
    /// Filesystem notification for one path
    Fs(WatchEvent),

    /// Full map plus engine metadata; drains the audience's bucket
    Map {
        playtest: bool,
        reply: oneshot::Sender<Result<String>>,
    },

    /// Changes since the audience's last drain
    Modified {
        playtest: bool,
        reply: oneshot::Sender<Result<String>>,
    },

    Shutdown,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EngineOptions {
    /// Reported as `Debug` in `Map`
    pub debug: bool,

    /// Keep `sourcemap.json` up to date
    pub generate_sourcemap: bool,
}

pub struct Engine {
    project: Project,
    options: EngineOptions,
    sourcemap: SourcemapWriter,
}

impl Engine {
    pub fn new(project: Project, options: EngineOptions) -> Self {
        Self {
            project,
            options,
            sourcemap: SourcemapWriter::new(),
        }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    /// Resolve the whole project and write the first sourcemap
    pub fn start(&mut self) {
        self.project.resolve_all();
        self.flush_introspection();
    }

    /// Handle one message; `false` once the engine should stop
    pub fn handle(&mut self, message: Message) -> bool {
        match message {
            Message::Fs(event) => {
                debug!("{:?} {}", event.kind, event.path.display());
                if sync::process(&mut self.project, &event.path).is_some() {
                    self.flush_introspection();
                }
            }
            Message::Map { playtest, reply } => {
                // Requester gone; nothing to answer
                let _ = reply.send(self.map_response(playtest));
            }
            Message::Modified { playtest, reply } => {
                let _ = reply.send(self.modified_response(playtest));
            }
            Message::Shutdown => return false,
        }
        true
    }

    /// Current map with `Version`, `Debug` and `ServePlaceIds` added
    pub fn map_response(&mut self, playtest: bool) -> Result<String> {
        self.project.activate_mirror();

        let mut response = match serde_json::to_value(self.project.map().entries())? {
            Value::Object(map) => map,
            _ => return Err(anyhow!("map did not serialize to an object")),
        };
        response.insert("Version".to_string(), Value::from(VERSION));
        response.insert("Debug".to_string(), Value::from(self.options.debug));
        if let Some(place_ids) = &self.project.document().serve_place_ids {
            response.insert("ServePlaceIds".to_string(), place_ids.clone());
        }

        let json = serde_json::to_string(&response).context("Failed to serialize map")?;
        self.project.map_mut().drain(audience(playtest));
        Ok(json)
    }

    /// Drain and serialize one audience's bucket
    pub fn modified_response(&mut self, playtest: bool) -> Result<String> {
        let bucket = self.project.map_mut().drain(audience(playtest));
        serde_json::to_string(&bucket).context("Failed to serialize changes")
    }

    /// Rewrite the sourcemap if anything changed since the last write
    fn flush_introspection(&mut self) {
        let changed = self.project.map_mut().drain(Audience::Introspection);
        if changed.is_empty() || !self.options.generate_sourcemap {
            return;
        }
        if let Err(e) = self.sourcemap.write(&self.project) {
            error!("Sourcemap error: {:#}", e);
        }
    }

    /// Run on a dedicated thread until [`Message::Shutdown`] or every sender is gone
    pub fn spawn(mut self) -> Result<(EngineHandle, JoinHandle<()>)> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let thread = thread::Builder::new()
            .name("tether-engine".to_string())
            .spawn(move || {
                self.start();
                while let Some(message) = rx.blocking_recv() {
                    if !self.handle(message) {
                        break;
                    }
                }
                debug!("Engine stopped");
            })
            .context("Failed to spawn engine thread")?;
        Ok((EngineHandle { tx }, thread))
    }
}

fn audience(playtest: bool) -> Audience {
    if playtest {
        Audience::Playtest
    } else {
        Audience::Live
    }
}

/// Sending side of the engine's queue
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<Message>,
}

impl EngineHandle {
    /// Queue a filesystem event; dropped silently once the engine has stopped
    pub fn notify(&self, event: WatchEvent) {
        let _ = self.tx.send(Message::Fs(event));
    }

    pub async fn map(&self, playtest: bool) -> Result<String> {
        self.request(|reply| Message::Map { playtest, reply }).await
    }

    pub async fn modified(&self, playtest: bool) -> Result<String> {
        self.request(|reply| Message::Modified { playtest, reply }).await
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(Message::Shutdown);
    }

    async fn request<F>(&self, message: F) -> Result<String>
    where
        F: FnOnce(oneshot::Sender<Result<String>>) -> Message,
    {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(message(reply))
            .map_err(|_| anyhow!("engine is not running"))?;
        response.await.context("engine dropped the request")?
    }
}

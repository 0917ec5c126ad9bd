//! Common utilities for integration tests
//!
//! [`TestServer`] runs the real engine thread and HTTP server against a
//! project in a temporary directory, on an ephemeral loopback port.

use serde_json::{json, Value};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tether_cli::{server, Engine, EngineHandle, EngineOptions, ServerState};
use tether_project::{Project, ProjectOptions};

/// Key every request sends unless a test says otherwise
pub const SESSION_KEY: &str = "session-key";

pub struct TestServer {
    pub dir: TempDir,
    pub addr: SocketAddr,
    pub engine: EngineHandle,
    terminations: Arc<AtomicUsize>,
    client: reqwest::Client,
}

impl TestServer {
    /// Write `files`, then serve a project named `Game` whose document tree is `tree`
    pub async fn start(tree: Value, files: &[(&str, &str)]) -> Self {
        let dir = TempDir::new().unwrap();
        let document = json!({
            "name": "Game",
            "base": "base.rbxl",
            "build": "build.rbxl",
            "port": 34873,
            "tree": tree,
        });
        write(dir.path(), "base.rbxl", "");
        write(dir.path(), "default.project.json", &document.to_string());
        for (local, contents) in files {
            write(dir.path(), local, contents);
        }

        let project = Project::open(&dir.path().join("default.project.json"), ProjectOptions::default()).unwrap();
        let root = project.root().to_path_buf();
        let (engine, _thread) = Engine::new(project, EngineOptions::default()).spawn().unwrap();

        let terminations = Arc::new(AtomicUsize::new(0));
        let counter = terminations.clone();
        let state = Arc::new(ServerState::with_terminate(
            engine.clone(),
            root,
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        ));

        let listener = server::bind(0).await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(server::serve(listener, state));

        Self {
            dir,
            addr,
            engine,
            terminations,
            client: reqwest::Client::new(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, local: &str, contents: &str) {
        write(self.path(), local, contents);
    }

    /// Request of the given `type` carrying the session key
    pub fn request(&self, kind: &str) -> reqwest::RequestBuilder {
        self.bare().header("type", kind).header("key", SESSION_KEY)
    }

    /// Request without any headers
    pub fn bare(&self) -> reqwest::RequestBuilder {
        self.client.post(format!("http://{}/", self.addr))
    }

    /// Send a request and return status and body
    pub async fn send(&self, request: reqwest::RequestBuilder) -> (u16, String) {
        let response = request.send().await.unwrap();
        let status = response.status().as_u16();
        (status, response.text().await.unwrap())
    }

    /// Send a request whose body is JSON
    pub async fn json(&self, request: reqwest::RequestBuilder) -> Value {
        let (status, body) = self.send(request).await;
        assert_eq!(status, 200, "unexpected response: {}", body);
        serde_json::from_str(&body).unwrap()
    }

    pub fn terminations(&self) -> usize {
        self.terminations.load(Ordering::SeqCst)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.engine.shutdown();
    }
}

pub fn write(root: &Path, local: &str, contents: &str) {
    let path = root.join(local);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

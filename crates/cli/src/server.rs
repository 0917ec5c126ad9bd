//! HTTP sync protocol
//!
//! One endpoint; the `type` header selects the operation:
//!
//! | type          | response                                       |
//! |---------------|------------------------------------------------|
//! | `Map`         | full map plus engine metadata                  |
//! | `Modified`    | changes since the caller's last drain          |
//! | `Source`      | file bytes, structured data converted to JSON  |
//! | `ReverseSync` | writes the body back into the project          |
//!
//! Only loopback peers are served. The first request's `key` header becomes
//! the session key; any later mismatch terminates the process.

use anyhow::{Context, Result};
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use bytes::Bytes;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::engine::EngineHandle;
use crate::source::{self, DataType, SourceError, WriteBackError};

/// Called after a session key mismatch has been answered
pub type Terminate = Arc<dyn Fn() + Send + Sync>;

pub struct ServerState {
    engine: EngineHandle,
    root: PathBuf,
    session_key: OnceLock<String>,
    terminate: Terminate,
}

impl ServerState {
    pub fn new(engine: EngineHandle, root: PathBuf) -> Self {
        Self::with_terminate(engine, root, Arc::new(exit_soon))
    }

    pub fn with_terminate(engine: EngineHandle, root: PathBuf, terminate: Terminate) -> Self {
        Self {
            engine,
            root,
            session_key: OnceLock::new(),
            terminate,
        }
    }
}

/// Exit once the rejection has had time to reach the peer
fn exit_soon() {
    std::thread::spawn(|| {
        std::thread::sleep(Duration::from_millis(100));
        std::process::exit(1);
    });
}

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new().fallback(handle).with_state(state)
}

/// Bind the loopback listener
pub async fn bind(port: u16) -> Result<TcpListener> {
    TcpListener::bind((Ipv4Addr::LOCALHOST, port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))
}

/// Serve until Ctrl-C
pub async fn serve(listener: TcpListener, state: Arc<ServerState>) -> Result<()> {
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            // A failed handler install means we simply never shut down gracefully
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("Server error")
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback(),
        IpAddr::V6(v6) => v6.is_loopback() || v6.to_ipv4_mapped().is_some_and(|v4| v4.is_loopback()),
    }
}

async fn handle(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !is_loopback(peer.ip()) {
        return (
            StatusCode::FORBIDDEN,
            format!("Network traffic must originate from the local host. (IP = {})", peer.ip()),
        )
            .into_response();
    }

    let key = header(&headers, "key").unwrap_or_default();
    let session_key = state.session_key.get_or_init(|| {
        debug!("Client connected");
        key.to_string()
    });
    if key != session_key {
        let message = format!(
            "Security key mismatch. The current session will now be terminated. (Key = {})\n\
             Please check for any malicious plugins or scripts and try again.",
            key
        );
        error!("Server error: {}", message);
        (state.terminate)();
        return (StatusCode::FORBIDDEN, message).into_response();
    }

    let playtest = headers.contains_key("playtest");
    match header(&headers, "type") {
        Some("Map") => engine_reply(state.engine.map(playtest).await),
        Some("Modified") => engine_reply(state.engine.modified(playtest).await),
        Some("Source") => source_reply(&state, &headers),
        Some("ReverseSync") => reverse_sync_reply(&state, &headers, &body),
        _ => (StatusCode::BAD_REQUEST, "Missing / invalid type header").into_response(),
    }
}

fn engine_reply(result: Result<String>) -> Response {
    match result {
        Ok(json) => (StatusCode::OK, json).into_response(),
        Err(e) => {
            error!("Server error: {:#}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")).into_response()
        }
    }
}

fn source_reply(state: &ServerState, headers: &HeaderMap) -> Response {
    let Some(path) = header(headers, "path") else {
        return (StatusCode::NOT_FOUND, "Missing path header").into_response();
    };
    let datatype = DataType::from_header(header(headers, "datatype"));

    match source::read_source(&state.root, path, datatype) {
        Ok(bytes) => (StatusCode::OK, bytes).into_response(),
        Err(e @ SourceError::Unsupported(_)) => (StatusCode::NOT_IMPLEMENTED, e.to_string()).into_response(),
        Err(e) => {
            error!("Server error: {}", e);
            (StatusCode::NOT_FOUND, e.to_string()).into_response()
        }
    }
}

fn reverse_sync_reply(state: &ServerState, headers: &HeaderMap, body: &[u8]) -> Response {
    let Some(path) = header(headers, "path") else {
        return (StatusCode::FORBIDDEN, WriteBackError::OutsideProject.to_string()).into_response();
    };

    match source::write_back(&state.root, path, body) {
        Ok(written) => {
            debug!("Reverse synced {}", written.display());
            StatusCode::OK.into_response()
        }
        Err(e @ WriteBackError::Write { .. }) => {
            error!("Server error: {}", e);
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
        Err(e) => (StatusCode::FORBIDDEN, e.to_string()).into_response(),
    }
}

//! Sync protocol over real HTTP

mod common;

use common::{TestServer, SESSION_KEY};
use serde_json::json;
use std::fs;
use tether_watcher::{EventKind, WatchEvent};

fn shared_tree() -> serde_json::Value {
    json!({ "ReplicatedStorage": { "$path": "src" } })
}

#[tokio::test]
async fn test_map_returns_entries_and_metadata() {
    let server = TestServer::start(shared_tree(), &[("src/Util.lua", "return {}")]).await;

    let map = server.json(server.request("Map")).await;
    assert_eq!(map["Version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(map["Debug"], false);
    assert!(map.get("ServePlaceIds").is_none());
    assert_eq!(map["tree/ReplicatedStorage"]["ClassName"], "ReplicatedStorage");
    assert_eq!(map["tree/ReplicatedStorage/Util"]["Path"], "src/Util.lua");
}

#[tokio::test]
async fn test_map_drains_only_the_requesting_audience() {
    let server = TestServer::start(shared_tree(), &[("src/Util.lua", "return {}")]).await;

    server.json(server.request("Map")).await;
    let live = server.json(server.request("Modified")).await;
    assert_eq!(live, json!({}));

    let playtest = server.json(server.request("Modified").header("playtest", "")).await;
    assert_eq!(playtest["tree/ReplicatedStorage/Util"]["Type"], "Script");
    let playtest = server.json(server.request("Modified").header("playtest", "")).await;
    assert_eq!(playtest, json!({}));
}

#[tokio::test]
async fn test_filesystem_changes_reach_modified() {
    let server = TestServer::start(shared_tree(), &[("src/Util.lua", "return {}")]).await;
    server.json(server.request("Map")).await;

    server.write("src/Boot.client.lua", "");
    server.engine.notify(WatchEvent {
        path: server.path().join("src/Boot.client.lua"),
        kind: EventKind::Create,
    });
    fs::remove_file(server.path().join("src/Util.lua")).unwrap();
    server.engine.notify(WatchEvent {
        path: server.path().join("src/Util.lua"),
        kind: EventKind::Delete,
    });

    let modified = server.json(server.request("Modified")).await;
    assert_eq!(modified["tree/ReplicatedStorage/Boot"]["Context"], "Client");
    assert_eq!(modified["tree/ReplicatedStorage/Util"], false);
}

#[tokio::test]
async fn test_missing_type_is_rejected() {
    let server = TestServer::start(shared_tree(), &[]).await;

    let (status, body) = server.send(server.bare().header("key", SESSION_KEY)).await;
    assert_eq!(status, 400);
    assert_eq!(body, "Missing / invalid type header");

    let (status, _) = server.send(server.request("Explode")).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_key_mismatch_terminates_session() {
    let server = TestServer::start(shared_tree(), &[]).await;

    server.json(server.request("Modified")).await;
    assert_eq!(server.terminations(), 0);

    let (status, body) = server
        .send(server.bare().header("type", "Modified").header("key", "intruder"))
        .await;
    assert_eq!(status, 403);
    assert!(body.starts_with("Security key mismatch"));
    assert_eq!(server.terminations(), 1);
}

#[tokio::test]
async fn test_source_conversions() {
    let server = TestServer::start(
        shared_tree(),
        &[
            ("src/Config.yaml", "speed: 5\n"),
            ("src/Settings.toml", "[round]\nlength = 90\n"),
            ("src/Strings.csv", "Key,Source,Context,Example,es\nHi,Hello,,,Hola\n"),
            ("src/Util.lua", "return 42"),
        ],
    )
    .await;

    let yaml = server
        .json(server.request("Source").header("path", "src/Config.yaml").header("datatype", "YAML"))
        .await;
    assert_eq!(yaml, json!({ "speed": 5 }));

    let toml = server
        .json(server.request("Source").header("path", "src/Settings.toml").header("datatype", "TOML"))
        .await;
    assert_eq!(toml["round"]["length"], 90);

    let csv = server
        .json(server.request("Source").header("path", "src/Strings.csv").header("datatype", "Localization"))
        .await;
    assert_eq!(csv, json!([{ "Key": "Hi", "Source": "Hello", "Context": "", "Example": "", "Values": { "es": "Hola" } }]));

    let (status, body) = server.send(server.request("Source").header("path", "src/Util.lua")).await;
    assert_eq!((status, body.as_str()), (200, "return 42"));
}

#[tokio::test]
async fn test_source_failures() {
    let server = TestServer::start(shared_tree(), &[("src/Sheet.excel.json", "{}")]).await;

    let (status, _) = server.send(server.request("Source").header("path", "src/Missing.lua")).await;
    assert_eq!(status, 404);

    let (status, _) = server
        .send(server.request("Source").header("path", "src/Sheet.excel.json").header("datatype", "Excel"))
        .await;
    assert_eq!(status, 501);
}

#[tokio::test]
async fn test_reverse_sync() {
    let server = TestServer::start(shared_tree(), &[("src/Util.lua", "return {}")]).await;

    let (status, _) = server
        .send(server.request("ReverseSync").header("path", "src/Util.lua").body("return 1"))
        .await;
    assert_eq!(status, 200);
    assert_eq!(fs::read_to_string(server.path().join("src/Util.lua")).unwrap(), "return 1");

    let (status, body) = server
        .send(server.request("ReverseSync").header("path", "../outside.lua").body(""))
        .await;
    assert_eq!(status, 403);
    assert_eq!(body, "File not located in project directory");

    let (status, _) = server
        .send(server.request("ReverseSync").header("path", "src/run.sh").body(""))
        .await;
    assert_eq!(status, 403);
    assert!(!server.path().join("src/run.sh").exists());

    let (status, _) = server
        .send(server.request("ReverseSync").header("path", "src/nested/missing/a.lua").body(""))
        .await;
    assert_eq!(status, 400);
}

//! Synchronizer scenarios
//!
//! Each test resolves a project, mutates the filesystem, feeds the touched
//! paths through the synchronizer and checks the map and the delta buckets.

mod common;

use anyhow::Result;
use common::TestProject;
use serde_json::json;
use tether_core::{Audience, Delta, EntryKind, ScriptContext};
use tether_watcher::Change;

fn src_project() -> Result<TestProject> {
    let fixture = TestProject::new(json!({
        "ReplicatedStorage": { "$path": "src" },
    }))?;
    fixture.mkdir("src")?;
    Ok(fixture)
}

#[test]
fn test_added_file_is_mapped_under_parent_key() -> Result<()> {
    let mut fixture = src_project()?;
    fixture.write("src/a.lua", "return 1")?;
    let mut project = fixture.resolve()?;

    fixture.write("src/Gui.client.lua", "")?;
    assert_eq!(fixture.event(&mut project, "src/Gui.client.lua"), Some(Change::Added));

    let gui = project.map().get("tree/ReplicatedStorage/Gui").unwrap();
    assert_eq!(gui.context, Some(ScriptContext::Client));

    // The same event again is a no-op: the mtime is now cached
    assert_eq!(fixture.event(&mut project, "src/Gui.client.lua"), None);
    Ok(())
}

#[test]
fn test_event_for_unmapped_parent_is_ignored() -> Result<()> {
    let mut fixture = src_project()?;
    let mut project = fixture.resolve()?;

    fixture.write("elsewhere/a.lua", "")?;
    assert_eq!(fixture.event(&mut project, "elsewhere/a.lua"), None);
    fixture.write("src/notes.md", "")?;
    assert_eq!(fixture.event(&mut project, "src/notes.md"), None);
    Ok(())
}

#[test]
fn test_changed_script_is_remapped() -> Result<()> {
    let mut fixture = src_project()?;
    fixture.write("src/a.server.lua", "print('hi')")?;
    let mut project = fixture.resolve()?;

    fixture.write("src/a.server.lua", "--@script:client\nprint('hi')")?;
    assert_eq!(fixture.event(&mut project, "src/a.server.lua"), Some(Change::Changed));

    let a = project.map().get("tree/ReplicatedStorage/a").unwrap();
    assert_eq!(a.context, Some(ScriptContext::Client));
    Ok(())
}

#[test]
fn test_touch_with_same_mtime_is_not_a_change() -> Result<()> {
    let mut fixture = src_project()?;
    fixture.write("src/a.lua", "")?;
    let mut project = fixture.resolve()?;
    project.map_mut().drain(Audience::Live);

    assert_eq!(fixture.event(&mut project, "src/a.lua"), None);
    assert!(project.map_mut().drain(Audience::Live).is_empty());
    Ok(())
}

#[test]
fn test_deleted_file_is_tombstoned_in_every_bucket() -> Result<()> {
    let mut fixture = src_project()?;
    fixture.write("src/a.lua", "")?;
    let mut project = fixture.resolve()?;
    for audience in [Audience::Live, Audience::Playtest, Audience::Introspection] {
        project.map_mut().drain(audience);
    }

    fixture.remove("src/a.lua")?;
    assert_eq!(fixture.event(&mut project, "src/a.lua"), Some(Change::Deleted));

    assert!(!project.map().contains("tree/ReplicatedStorage/a"));
    assert!(!project.map().is_known("src/a.lua"));
    for audience in [Audience::Live, Audience::Playtest, Audience::Introspection] {
        let bucket = project.map_mut().drain(audience);
        assert_eq!(bucket.get("tree/ReplicatedStorage/a"), Some(&Delta::Removed));
    }
    Ok(())
}

#[test]
fn test_document_entries_are_not_deletable() -> Result<()> {
    let mut fixture = TestProject::new(json!({
        "StarterPlayer": {
            "Boot": { "$path": "boot.client.lua" },
        },
    }))?;
    fixture.write("boot.client.lua", "")?;
    let mut project = fixture.resolve()?;
    project.map_mut().drain(Audience::Live);

    fixture.remove("boot.client.lua")?;
    assert_eq!(fixture.event(&mut project, "boot.client.lua"), Some(Change::Deleted));

    let boot = project.map().get("tree/StarterPlayer/Boot").unwrap();
    assert_eq!(boot.project_json.as_deref(), Some("default.project.json"));
    let live = project.map_mut().drain(Audience::Live);
    assert!(matches!(live.get("tree/StarterPlayer/Boot"), Some(Delta::Updated(_))));
    Ok(())
}

#[test]
fn test_draining_live_leaves_other_buckets() -> Result<()> {
    let mut fixture = src_project()?;
    let mut project = fixture.resolve()?;
    for audience in [Audience::Live, Audience::Playtest, Audience::Introspection] {
        project.map_mut().drain(audience);
    }

    fixture.write("src/a.lua", "")?;
    fixture.event(&mut project, "src/a.lua");

    let live = project.map_mut().drain(Audience::Live);
    assert!(live.contains_key("tree/ReplicatedStorage/a"));
    assert!(project.map_mut().drain(Audience::Live).is_empty());

    assert!(project.map().deltas().bucket(Audience::Playtest).contains_key("tree/ReplicatedStorage/a"));
    assert!(project
        .map()
        .deltas()
        .bucket(Audience::Introspection)
        .contains_key("tree/ReplicatedStorage/a"));
    Ok(())
}

#[test]
fn test_added_meta_maps_sibling_with_metadata() -> Result<()> {
    let mut fixture = src_project()?;
    fixture.write("src/foo.lua", "return {}")?;
    let mut project = fixture.resolve()?;
    assert_eq!(project.map().get("tree/ReplicatedStorage/foo").unwrap().tags, None);

    fixture.write("src/foo.meta.json", r#"{"tags": ["Tagged"], "attributes": {"Level": 3}}"#)?;
    assert_eq!(fixture.event(&mut project, "src/foo.meta.json"), Some(Change::Added));

    let foo = project.map().get("tree/ReplicatedStorage/foo").unwrap();
    assert_eq!(foo.kind, EntryKind::Script);
    assert_eq!(foo.tags, Some(vec!["Tagged".to_string()]));
    assert_eq!(foo.meta_path.as_deref(), Some("src/foo.meta.json"));
    assert!(project.map().get("tree/ReplicatedStorage/foo.meta").is_none());

    let (incremental, fresh) = fixture.converged(&project)?;
    assert_eq!(incremental, fresh);
    Ok(())
}

#[test]
fn test_meta_for_context_suffixed_script() -> Result<()> {
    let mut fixture = src_project()?;
    fixture.write("src/Main.server.luau", "")?;
    let mut project = fixture.resolve()?;

    fixture.write("src/Main.meta.toml", "tags = [\"Boot\"]\n")?;
    fixture.event(&mut project, "src/Main.meta.toml");

    let main = project.map().get("tree/ReplicatedStorage/Main").unwrap();
    assert_eq!(main.tags, Some(vec!["Boot".to_string()]));
    Ok(())
}

#[test]
fn test_stray_meta_maps_nothing() -> Result<()> {
    let mut fixture = src_project()?;
    let mut project = fixture.resolve()?;
    let before = project.map().len();

    fixture.write("src/ghost.meta.json", "{}")?;
    fixture.event(&mut project, "src/ghost.meta.json");
    assert_eq!(project.map().len(), before);
    Ok(())
}

#[test]
fn test_changed_and_deleted_meta_remap_entry() -> Result<()> {
    let mut fixture = src_project()?;
    fixture.write("src/foo.lua", "")?;
    fixture.write("src/foo.meta.json", r#"{"tags": ["One"]}"#)?;
    let mut project = fixture.resolve()?;

    fixture.write("src/foo.meta.json", r#"{"tags": ["Two"]}"#)?;
    assert_eq!(fixture.event(&mut project, "src/foo.meta.json"), Some(Change::Changed));
    let foo = project.map().get("tree/ReplicatedStorage/foo").unwrap();
    assert_eq!(foo.tags, Some(vec!["Two".to_string()]));

    fixture.remove("src/foo.meta.json")?;
    assert_eq!(fixture.event(&mut project, "src/foo.meta.json"), Some(Change::Deleted));
    let foo = project.map().get("tree/ReplicatedStorage/foo").unwrap();
    assert_eq!(foo.tags, None);
    assert_eq!(foo.meta_path, None);
    assert_eq!(foo.local(), Some("src/foo.lua"));
    Ok(())
}

#[test]
fn test_init_deletion_falls_back_then_becomes_folder() -> Result<()> {
    let mut fixture = src_project()?;
    fixture.write("src/Foo/Foo.init.luau", "return 'named'")?;
    fixture.write("src/Foo/init.lua", "return 'plain'")?;
    fixture.write("src/Foo/Child.lua", "")?;
    let mut project = fixture.resolve()?;
    assert_eq!(
        project.map().get("tree/ReplicatedStorage/Foo").unwrap().local(),
        Some("src/Foo/Foo.init.luau")
    );

    fixture.remove("src/Foo/Foo.init.luau")?;
    fixture.event(&mut project, "src/Foo/Foo.init.luau");
    let foo = project.map().get("tree/ReplicatedStorage/Foo").unwrap();
    assert_eq!(foo.kind, EntryKind::Script);
    assert_eq!(foo.local(), Some("src/Foo/init.lua"));

    fixture.remove("src/Foo/init.lua")?;
    fixture.event(&mut project, "src/Foo/init.lua");
    let foo = project.map().get("tree/ReplicatedStorage/Foo").unwrap();
    assert_eq!(foo.kind, EntryKind::Instance);
    assert_eq!(foo.class_name.as_deref(), Some("Folder"));
    assert!(project.map().contains("tree/ReplicatedStorage/Foo/Child"));

    let (incremental, fresh) = fixture.converged(&project)?;
    assert_eq!(incremental, fresh);
    Ok(())
}

#[test]
fn test_added_init_collapses_folder() -> Result<()> {
    let mut fixture = src_project()?;
    fixture.write("src/Foo/Child.lua", "")?;
    let mut project = fixture.resolve()?;
    assert_eq!(
        project.map().get("tree/ReplicatedStorage/Foo").unwrap().kind,
        EntryKind::Instance
    );

    fixture.write("src/Foo/init.server.lua", "")?;
    assert_eq!(fixture.event(&mut project, "src/Foo/init.server.lua"), Some(Change::Added));

    let foo = project.map().get("tree/ReplicatedStorage/Foo").unwrap();
    assert_eq!(foo.kind, EntryKind::Script);
    assert_eq!(foo.context, Some(ScriptContext::Server));
    assert_eq!(foo.init_parent.as_deref(), Some("src/Foo"));
    assert!(project.map().get("tree/ReplicatedStorage/Foo/init.server").is_none());
    Ok(())
}

#[test]
fn test_added_init_meta_changes_folder_class() -> Result<()> {
    let mut fixture = src_project()?;
    fixture.write("src/Settings/Speed.txt", "5")?;
    let mut project = fixture.resolve()?;

    fixture.write("src/Settings/init.meta.yaml", "className: Configuration\n")?;
    fixture.event(&mut project, "src/Settings/init.meta.yaml");

    let settings = project.map().get("tree/ReplicatedStorage/Settings").unwrap();
    assert_eq!(settings.class_name.as_deref(), Some("Configuration"));
    Ok(())
}

#[test]
fn test_directory_rename_converges() -> Result<()> {
    let mut fixture = src_project()?;
    fixture.write("src/Old/a.lua", "")?;
    fixture.write("src/Old/Deep/b.lua", "")?;
    let mut project = fixture.resolve()?;

    fixture.rename("src/Old", "src/New")?;
    assert_eq!(fixture.event(&mut project, "src/Old"), Some(Change::Deleted));
    assert_eq!(fixture.event(&mut project, "src/New"), Some(Change::Added));

    assert!(project.map().keys_under("tree/ReplicatedStorage/Old").is_empty());
    assert!(project.map().contains("tree/ReplicatedStorage/New/Deep/b"));
    assert!(project.map().known_under("src/Old").is_empty());

    let (incremental, fresh) = fixture.converged(&project)?;
    assert_eq!(incremental, fresh);
    Ok(())
}

#[test]
fn test_mixed_edit_sequence_converges() -> Result<()> {
    let mut fixture = src_project()?;
    fixture.write("src/Lib/init.lua", "return {}")?;
    fixture.write("src/Lib/Util.lua", "")?;
    fixture.write("src/data.json", "{}")?;
    let mut project = fixture.resolve()?;

    fixture.write("src/Lib/Extra.luau", "")?;
    fixture.event(&mut project, "src/Lib/Extra.luau");
    fixture.write("src/data.json", "[1]")?;
    fixture.event(&mut project, "src/data.json");
    fixture.remove("src/Lib/Util.lua")?;
    fixture.event(&mut project, "src/Lib/Util.lua");
    fixture.write("src/strings.csv", "Key,Source,Context,Example,en\n")?;
    fixture.event(&mut project, "src/strings.csv");
    fixture.write("src/Lib/Extra.meta.json", r#"{"attributes": {"A": 1}}"#)?;
    fixture.event(&mut project, "src/Lib/Extra.meta.json");

    let (incremental, fresh) = fixture.converged(&project)?;
    assert_eq!(incremental, fresh);
    Ok(())
}

#[test]
fn test_sub_project_change_is_remounted() -> Result<()> {
    let mut fixture = src_project()?;
    fixture.write(
        "src/Lib/default.project.json",
        &json!({ "tree": { "Core": { "$path": "core" } } }).to_string(),
    )?;
    fixture.write("src/Lib/core/a.lua", "")?;
    fixture.write("src/Lib/other/b.lua", "")?;
    let mut project = fixture.resolve()?;
    assert!(project.map().contains("tree/ReplicatedStorage/Lib/Core/a"));

    fixture.write(
        "src/Lib/default.project.json",
        &json!({ "tree": { "Other": { "$path": "other" } } }).to_string(),
    )?;
    assert_eq!(
        fixture.event(&mut project, "src/Lib/default.project.json"),
        Some(Change::Changed)
    );
    assert!(!project.map().contains("tree/ReplicatedStorage/Lib/Core"));
    assert!(project.map().contains("tree/ReplicatedStorage/Lib/Other/b"));

    fixture.remove("src/Lib/default.project.json")?;
    assert_eq!(
        fixture.event(&mut project, "src/Lib/default.project.json"),
        Some(Change::Deleted)
    );
    // Without its manifest the directory is a plain folder again
    assert!(project.map().contains("tree/ReplicatedStorage/Lib/other/b"));
    assert!(!project.map().contains("tree/ReplicatedStorage/Lib/Other"));

    let (incremental, fresh) = fixture.converged(&project)?;
    assert_eq!(incremental, fresh);
    Ok(())
}

#[test]
fn test_main_document_change_reloads() -> Result<()> {
    let mut fixture = src_project()?;
    fixture.write("src/a.lua", "")?;
    let mut project = fixture.resolve()?;
    project.map_mut().drain(Audience::Live);

    fixture.write_document(json!({ "Lighting": {} }))?;
    fixture.bump("default.project.json")?;
    assert_eq!(
        fixture.event(&mut project, "default.project.json"),
        Some(Change::Reloaded)
    );

    assert!(project.map().contains("tree/Lighting"));
    let live = project.map_mut().drain(Audience::Live);
    assert_eq!(live.get("tree/ReplicatedStorage"), Some(&Delta::Removed));
    assert_eq!(live.get("tree/ReplicatedStorage/a"), Some(&Delta::Removed));
    Ok(())
}

#[test]
fn test_invalid_main_document_keeps_map() -> Result<()> {
    let mut fixture = src_project()?;
    fixture.write("src/a.lua", "")?;
    let mut project = fixture.resolve()?;

    fixture.write("default.project.json", "{ broken")?;
    assert_eq!(fixture.event(&mut project, "default.project.json"), None);
    assert!(project.map().contains("tree/ReplicatedStorage/a"));
    Ok(())
}

#[test]
fn test_added_meta_maps_unmapped_sibling() -> Result<()> {
    let mut fixture = src_project()?;
    let mut project = fixture.resolve()?;

    // Written without an event of its own
    fixture.write("src/foo.lua", "return {}")?;
    assert!(project.map().get("tree/ReplicatedStorage/foo").is_none());

    fixture.write("src/foo.meta.json", r#"{"tags": ["Tagged"]}"#)?;
    assert_eq!(fixture.event(&mut project, "src/foo.meta.json"), Some(Change::Added));

    let foo = project.map().get("tree/ReplicatedStorage/foo").unwrap();
    assert_eq!(foo.kind, EntryKind::Script);
    assert_eq!(foo.tags, Some(vec!["Tagged".to_string()]));
    assert_eq!(foo.meta_path.as_deref(), Some("src/foo.meta.json"));

    let (incremental, fresh) = fixture.converged(&project)?;
    assert_eq!(incremental, fresh);
    Ok(())
}

#[test]
fn test_fixed_malformed_files_are_mapped() -> Result<()> {
    let mut fixture = src_project()?;
    fixture.write("src/config.json", "{")?;
    fixture.write("src/Car.model.json", r#"{"ClassName": 1}"#)?;
    let mut project = fixture.resolve()?;
    assert!(project.map().get("tree/ReplicatedStorage/config").is_none());
    assert!(project.map().get("tree/ReplicatedStorage/Car").is_none());

    fixture.write("src/config.json", r#"{"speed": 5}"#)?;
    fixture.write("src/Car.model.json", r#"{"ClassName": "Model"}"#)?;
    assert!(fixture.event(&mut project, "src/config.json").is_some());
    assert!(fixture.event(&mut project, "src/Car.model.json").is_some());

    assert_eq!(
        project.map().get("tree/ReplicatedStorage/config").unwrap().kind,
        EntryKind::StructuredData
    );
    assert_eq!(
        project.map().get("tree/ReplicatedStorage/Car").unwrap().kind,
        EntryKind::JsonModel
    );
    let (incremental, fresh) = fixture.converged(&project)?;
    assert_eq!(incremental, fresh);
    Ok(())
}

#[test]
fn test_data_file_broken_then_fixed() -> Result<()> {
    let mut fixture = src_project()?;
    fixture.write("src/config.json", r#"{"speed": 5}"#)?;
    let mut project = fixture.resolve()?;
    project.map_mut().drain(Audience::Live);

    fixture.write("src/config.json", "{")?;
    assert_eq!(fixture.event(&mut project, "src/config.json"), Some(Change::Changed));
    assert!(project.map().get("tree/ReplicatedStorage/config").is_none());
    let live = project.map_mut().drain(Audience::Live);
    assert_eq!(live.get("tree/ReplicatedStorage/config"), Some(&Delta::Removed));

    fixture.write("src/config.json", r#"{"speed": 6}"#)?;
    assert_eq!(fixture.event(&mut project, "src/config.json"), Some(Change::Changed));
    assert!(project.map().get("tree/ReplicatedStorage/config").is_some());
    let live = project.map_mut().drain(Audience::Live);
    assert!(matches!(live.get("tree/ReplicatedStorage/config"), Some(Delta::Updated(_))));

    let (incremental, fresh) = fixture.converged(&project)?;
    assert_eq!(incremental, fresh);
    Ok(())
}

#[test]
fn test_init_meta_in_declared_folder_keeps_declared_shape() -> Result<()> {
    let mut fixture = src_project()?;
    fixture.write("src/a.lua", "")?;
    let mut project = fixture.resolve()?;

    fixture.write("src/init.meta.json", r#"{"className": "Model"}"#)?;
    assert!(fixture.event(&mut project, "src/init.meta.json").is_some());

    let storage = project.map().get("tree/ReplicatedStorage").unwrap();
    assert_eq!(storage.kind, EntryKind::Instance);
    assert_eq!(storage.class_name.as_deref(), Some("ReplicatedStorage"));
    assert_eq!(storage.meta_path, None);
    assert!(project.map().get("tree/ReplicatedStorage/a").is_some());

    let (incremental, fresh) = fixture.converged(&project)?;
    assert_eq!(incremental, fresh);
    Ok(())
}

#[test]
fn test_directory_mounted_twice_updates_both_keys() -> Result<()> {
    let mut fixture = TestProject::new(json!({
        "ReplicatedStorage": { "$path": "src" },
        "ServerStorage": { "$path": "src" },
    }))?;
    fixture.write("src/a.lua", "")?;
    let mut project = fixture.resolve()?;

    fixture.write("src/b.lua", "")?;
    assert_eq!(fixture.event(&mut project, "src/b.lua"), Some(Change::Added));

    assert!(project.map().get("tree/ReplicatedStorage/b").is_some());
    assert!(project.map().get("tree/ServerStorage/b").is_some());
    let (incremental, fresh) = fixture.converged(&project)?;
    assert_eq!(incremental, fresh);
    Ok(())
}

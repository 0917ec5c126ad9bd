//! Tether Core - the shared data model of the project mapping
//!
//! This crate provides the state every other component mutates:
//! - Map entries and their variant kinds
//! - The project map with its modification-time cache
//! - Delta buckets (live, playtest, introspection)
//! - Glob ignore rules
//! - Slash-delimited path helpers

pub mod delta;
pub mod entry;
pub mod ignore;
pub mod map;
pub mod path;

// Re-export main types for convenience
pub use delta::{Audience, Delta, DeltaBucket, DeltaBuckets};
pub use entry::{DataFormat, EntryKind, LocalPath, MapEntry, PackageKind, ScriptContext};
pub use ignore::{IgnoreConfig, IgnoreError, IgnoreRules};
pub use map::{ProjectMap, TREE_ROOT};

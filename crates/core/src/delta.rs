//! Delta buckets: per-audience accumulators of changed logical paths
//!
//! Every mutation is recorded in all three buckets. Each audience drains
//! its own bucket on its own schedule; a drain never touches the others.

use std::collections::BTreeMap;

use serde::ser::{Serialize, Serializer};

use crate::entry::MapEntry;

/// Consumer of a delta bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Audience {
    /// Editor session in edit mode
    Live,
    /// Editor session in a play test
    Playtest,
    /// Sourcemap writer
    Introspection,
}

/// Latest state of one logical path since the last drain
#[derive(Debug, Clone, PartialEq)]
pub enum Delta {
    Updated(MapEntry),
    Removed,
}

impl Serialize for Delta {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Delta::Updated(entry) => entry.serialize(serializer),
            Delta::Removed => serializer.serialize_bool(false),
        }
    }
}

/// Changed keys mapped to their latest state
pub type DeltaBucket = BTreeMap<String, Delta>;

/// The three independent buckets
#[derive(Debug, Default, Clone)]
pub struct DeltaBuckets {
    live: DeltaBucket,
    playtest: DeltaBucket,
    introspection: DeltaBucket,
}

impl DeltaBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mutation for every audience
    pub fn record(&mut self, key: &str, delta: Delta) {
        self.live.insert(key.to_string(), delta.clone());
        self.playtest.insert(key.to_string(), delta.clone());
        self.introspection.insert(key.to_string(), delta);
    }

    /// Take and clear one audience's bucket
    pub fn drain(&mut self, audience: Audience) -> DeltaBucket {
        std::mem::take(self.bucket_mut(audience))
    }

    /// Peek at one audience's bucket
    pub fn bucket(&self, audience: Audience) -> &DeltaBucket {
        match audience {
            Audience::Live => &self.live,
            Audience::Playtest => &self.playtest,
            Audience::Introspection => &self.introspection,
        }
    }

    fn bucket_mut(&mut self, audience: Audience) -> &mut DeltaBucket {
        match audience {
            Audience::Live => &mut self.live,
            Audience::Playtest => &mut self.playtest,
            Audience::Introspection => &mut self.introspection,
        }
    }

    pub fn clear(&mut self) {
        self.live.clear();
        self.playtest.clear();
        self.introspection.clear();
    }
}

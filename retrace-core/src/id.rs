//! Node identity.
//!
//! Every host node observed during recording is given a [`SyntheticId`] that
//! stays stable for the node's lifetime. Patches, interaction targets and
//! child lists refer to nodes only through these ids.

use std::fmt;
use std::hash::Hash;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Opaque string identifier for a recorded node.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyntheticId(String);

impl SyntheticId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SyntheticId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SyntheticId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for SyntheticId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ───────────────────────────────────────────────────────────────────
// IdRegistry
// ───────────────────────────────────────────────────────────────────

/// Side table from host node handles to synthetic ids.
///
/// The registry never observes host node lifetimes on its own. Whoever owns
/// it calls [`IdRegistry::remove`] when a node is disposed, otherwise the
/// entry lives as long as the registry.
#[derive(Debug)]
pub struct IdRegistry<H> {
    ids: FxHashMap<H, SyntheticId>,
    next: u64,
    prefix: String,
}

impl<H: Hash + Eq> IdRegistry<H> {
    pub fn new() -> Self {
        Self::with_prefix("n")
    }

    /// Minted ids take the form `{prefix}{counter}`.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            ids: FxHashMap::default(),
            next: 1,
            prefix: prefix.into(),
        }
    }

    /// Existing id for `handle`, or a freshly minted one.
    pub fn id_for(&mut self, handle: H) -> SyntheticId {
        if let Some(id) = self.ids.get(&handle) {
            return id.clone();
        }
        let id = SyntheticId(format!("{}{}", self.prefix, self.next));
        self.next += 1;
        self.ids.insert(handle, id.clone());
        id
    }

    pub fn get(&self, handle: &H) -> Option<&SyntheticId> {
        self.ids.get(handle)
    }

    /// Forget a disposed node. Its id is never reissued.
    pub fn remove(&mut self, handle: &H) -> Option<SyntheticId> {
        self.ids.remove(handle)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<H: Hash + Eq> Default for IdRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

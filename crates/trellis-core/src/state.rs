//! Shared application state with snapshot-on-read semantics.
//!
//! Handlers never see the live state container. A [`StateSnapshot`] is taken
//! once per resolution, so mutations by the handler cannot reach the shared
//! original and concurrent requests each see one consistent view.

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;

/// The application-wide mutable state container.
///
/// Owned by the application for its whole lifetime and shared with every
/// connection through an `Arc`. Resolution only ever reads it, via
/// [`snapshot`](Self::snapshot).
#[derive(Debug, Default)]
pub struct AppState {
    entries: RwLock<IndexMap<String, Value>>,
}

impl AppState {
    /// Creates an empty state container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value under the given key, replacing any previous value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.write().insert(key.into(), value.into());
    }

    /// Returns a clone of the value stored under the given key.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().get(key).cloned()
    }

    /// Removes and returns the value stored under the given key.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.entries.write().shift_remove(key)
    }

    /// Takes an immutable copy of the current entries.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            entries: self.entries.read().clone(),
        }
    }
}

/// An immutable-after-copy view of the application state.
///
/// This is what a `state` kwarg resolves to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateSnapshot {
    entries: IndexMap<String, Value>,
}

impl StateSnapshot {
    /// Returns the value stored under the given key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the snapshot holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

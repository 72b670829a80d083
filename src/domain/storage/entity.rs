//! Storage entity traits

use std::fmt::Debug;

use serde::{de::DeserializeOwned, Serialize};

/// Key types usable by any storage backend. Backends address rows by the string form.
pub trait StorageKey: Clone + Debug + Send + Sync + Eq + std::hash::Hash {
    fn as_str(&self) -> &str;
}

/// An aggregate that is persisted as a single record
pub trait StorageEntity: Clone + Debug + Send + Sync + Serialize + DeserializeOwned {
    type Key: StorageKey;

    fn key(&self) -> &Self::Key;

    /// Counter bumped by every change, for entities edited with
    /// read-modify-write. `None` opts out of conflict checks.
    fn revision(&self) -> Option<u64> {
        None
    }
}

//! In-process store backed by a concurrent map

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value;

use super::{KeyValueStore, StoreResult};

/// Concurrent in-memory store. Contents are lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Value>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn put(&self, key: &str, value: Value) -> StoreResult<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.entries.remove(key).map(|(_, value)| value))
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&Value>,
        replacement: Option<Value>,
    ) -> StoreResult<bool> {
        // The entry guard holds the shard lock for the whole comparison
        let swapped = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if expected != Some(occupied.get()) {
                    return Ok(false);
                }
                match replacement {
                    Some(value) => {
                        occupied.insert(value);
                    }
                    None => {
                        occupied.remove();
                    }
                }
                true
            }
            Entry::Vacant(vacant) => {
                if expected.is_some() {
                    return Ok(false);
                }
                if let Some(value) = replacement {
                    vacant.insert(value);
                }
                true
            }
        };
        Ok(swapped)
    }
}

//! Simple key-value persistence for queue, lock and bulk-run state
//!
//! Values are `serde_json::Value`. Every backend offers an atomic
//! compare-and-swap so that lock acquisition and queue pops never lose a
//! concurrent writer's update.

pub mod errors;
pub mod json_file;
pub mod memory;

pub use errors::{StoreError, StoreResult};
pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Attempts before [`update`] gives up on a contended key
const MAX_CAS_ATTEMPTS: usize = 64;

/// Minimal key-value storage
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<Value>>;

    fn put(&self, key: &str, value: Value) -> StoreResult<()>;

    /// Remove a key, returning the value it held
    fn remove(&self, key: &str) -> StoreResult<Option<Value>>;

    /// Atomically replace the value at `key` if it currently equals
    /// `expected` (`None` meaning absent). A `None` replacement deletes the
    /// key. Returns whether the swap happened.
    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&Value>,
        replacement: Option<Value>,
    ) -> StoreResult<bool>;
}

/// Read and deserialize a typed value.
///
/// # Errors
///
/// Returns an error if the backend fails or the value has the wrong shape.
pub fn load<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> StoreResult<Option<T>> {
    store
        .get(key)?
        .map(serde_json::from_value)
        .transpose()
        .map_err(StoreError::from)
}

/// Serialize and write a typed value.
///
/// # Errors
///
/// Returns an error if serialization or the backend fails.
pub fn save<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> StoreResult<()> {
    store.put(key, serde_json::to_value(value)?)
}

/// Read-modify-write loop over [`KeyValueStore::compare_and_swap`].
///
/// `apply` receives the current value and returns the replacement plus a
/// result to hand back once the swap succeeds. It may run more than once.
///
/// # Errors
///
/// Returns [`StoreError::Contention`] if the swap keeps failing, or any
/// backend error.
pub fn update<R>(
    store: &dyn KeyValueStore,
    key: &str,
    mut apply: impl FnMut(Option<&Value>) -> StoreResult<(Option<Value>, R)>,
) -> StoreResult<R> {
    for _ in 0..MAX_CAS_ATTEMPTS {
        let current = store.get(key)?;
        let (replacement, result) = apply(current.as_ref())?;
        if store.compare_and_swap(key, current.as_ref(), replacement)? {
            return Ok(result);
        }
        log::debug!("Compare-and-swap on '{key}' lost a race, retrying");
    }

    Err(StoreError::Contention {
        key: key.to_string(),
    })
}

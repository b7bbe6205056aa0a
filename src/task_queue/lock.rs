//! Time-bounded named locks over a key-value store
//!
//! State per key: `UNLOCKED → LOCKED(token) → UNLOCKED`. A lock record is
//! `{token, expires_at}` stored under `lock:{key}`. An expired record counts
//! as absent and is overwritten by the next acquisition. Every transition is
//! a compare-and-swap against the record that was read, so two workers
//! racing for the same key cannot both win.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use super::errors::QueueResult;
use crate::runtime::Clock;
use crate::storage::KeyValueStore;
use crate::utils::MAX_LOCK_TTL_SECS;

/// Opaque proof of lock ownership
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockToken(String);

impl LockToken {
    fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LockToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stored lock state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub token: LockToken,
    pub expires_at: DateTime<Utc>,
}

impl LockRecord {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// What a successful [`LockManager::release`] cleared
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Released by its holder; carries the cleared token
    Released(LockToken),
    /// Cleared by key alone (administrative override)
    ForceReleased,
}

/// Lock TTL covering the worst case of one batch:
/// `max(task_timeout, batch_size * per_item_time_budget) + safety_margin`,
/// never less than one second.
#[must_use]
pub fn calculate_lock_ttl(
    task_timeout_secs: u64,
    batch_size: usize,
    per_item_time_budget_secs: u64,
    safety_margin_secs: u64,
) -> u64 {
    let batch_secs = (batch_size as u64).saturating_mul(per_item_time_budget_secs);
    task_timeout_secs
        .max(batch_secs)
        .saturating_add(safety_margin_secs)
        .max(1)
}

fn ttl_duration(ttl_secs: u64) -> chrono::Duration {
    let secs = ttl_secs.clamp(1, MAX_LOCK_TTL_SECS);
    chrono::Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX))
}

fn storage_key(key: &str) -> String {
    format!("lock:{key}")
}

pub struct LockManager {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for LockManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockManager").finish_non_exhaustive()
    }
}

impl LockManager {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Current record for `key`, expired or not. Unreadable records are
    /// reported as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn current(&self, key: &str) -> QueueResult<Option<LockRecord>> {
        Ok(self
            .store
            .get(&storage_key(key))?
            .and_then(|value| decode_record(key, &value)))
    }

    /// Take the lock if no unexpired holder exists.
    ///
    /// Returns the new token, or `None` when another holder is active.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn acquire(&self, key: &str, ttl_secs: u64) -> QueueResult<Option<LockToken>> {
        let storage_key = storage_key(key);
        let now = self.clock.now();
        let current = self.store.get(&storage_key)?;

        if let Some(record) = current.as_ref().and_then(|v| decode_record(key, v))
            && !record.is_expired(now)
        {
            log::debug!("Lock '{key}' is held until {}", record.expires_at);
            return Ok(None);
        }

        let token = LockToken::generate();
        let record = LockRecord {
            token: token.clone(),
            expires_at: now + ttl_duration(ttl_secs),
        };

        let swapped = self.store.compare_and_swap(
            &storage_key,
            current.as_ref(),
            Some(serde_json::to_value(&record)?),
        )?;

        Ok(swapped.then_some(token))
    }

    /// Extend the lock held with `token` to `now + ttl`.
    ///
    /// Returns the token on success, `None` if the lock is gone or owned by
    /// someone else.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn refresh(
        &self,
        key: &str,
        token: &LockToken,
        ttl_secs: u64,
    ) -> QueueResult<Option<LockToken>> {
        let storage_key = storage_key(key);
        let Some(current) = self.store.get(&storage_key)? else {
            return Ok(None);
        };
        match decode_record(key, &current) {
            Some(record) if record.token == *token => {}
            _ => return Ok(None),
        }

        let record = LockRecord {
            token: token.clone(),
            expires_at: self.clock.now() + ttl_duration(ttl_secs),
        };
        let swapped = self.store.compare_and_swap(
            &storage_key,
            Some(&current),
            Some(serde_json::to_value(&record)?),
        )?;

        Ok(swapped.then(|| token.clone()))
    }

    /// Release the lock.
    ///
    /// With a token, only the matching holder's lock is cleared. Without one
    /// the lock is cleared unconditionally. Returns `None` when nothing was
    /// released.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn release(
        &self,
        key: &str,
        token: Option<&LockToken>,
    ) -> QueueResult<Option<ReleaseOutcome>> {
        let storage_key = storage_key(key);

        let Some(token) = token else {
            self.store.remove(&storage_key)?;
            log::info!("Lock '{key}' force-released");
            return Ok(Some(ReleaseOutcome::ForceReleased));
        };

        let Some(current) = self.store.get(&storage_key)? else {
            return Ok(None);
        };
        match decode_record(key, &current) {
            Some(record) if record.token == *token => {}
            _ => return Ok(None),
        }

        let swapped = self
            .store
            .compare_and_swap(&storage_key, Some(&current), None)?;
        Ok(swapped.then(|| ReleaseOutcome::Released(token.clone())))
    }

    /// Acquire and wrap the lock in a guard that releases it on drop.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn acquire_guard(&self, key: &str, ttl_secs: u64) -> QueueResult<Option<LockGuard<'_>>> {
        Ok(self.acquire(key, ttl_secs)?.map(|token| LockGuard {
            manager: self,
            key: key.to_string(),
            token: Some(token),
        }))
    }
}

fn decode_record(key: &str, value: &serde_json::Value) -> Option<LockRecord> {
    match serde_json::from_value(value.clone()) {
        Ok(record) => Some(record),
        Err(e) => {
            log::warn!("Ignoring unreadable lock record for '{key}': {e}");
            None
        }
    }
}

/// Held lock. Dropping the guard without calling [`LockGuard::release`]
/// (early return, panic unwinding) still releases the lock it holds.
#[derive(Debug)]
pub struct LockGuard<'a> {
    manager: &'a LockManager,
    key: String,
    token: Option<LockToken>,
}

impl LockGuard<'_> {
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn token(&self) -> Option<&LockToken> {
        self.token.as_ref()
    }

    /// Heartbeat. Returns `false` when the lock was lost.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn refresh(&self, ttl_secs: u64) -> QueueResult<bool> {
        match &self.token {
            Some(token) => Ok(self
                .manager
                .refresh(&self.key, token, ttl_secs)?
                .is_some()),
            None => Ok(false),
        }
    }

    /// Release explicitly. Returns whether this holder's lock was cleared.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn release(mut self) -> QueueResult<bool> {
        match self.token.take() {
            Some(token) => Ok(self.manager.release(&self.key, Some(&token))?.is_some()),
            None => Ok(false),
        }
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        let Some(token) = self.token.take() else {
            return;
        };
        match self.manager.release(&self.key, Some(&token)) {
            Ok(Some(_)) => log::warn!("Lock '{}' released by guard after abnormal exit", self.key),
            Ok(None) => {}
            Err(e) => log::error!("Failed to release lock '{}' on exit: {e}", self.key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ManualClock;
    use crate::storage::MemoryStore;
    use std::time::Duration;

    fn manager() -> (LockManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let manager = LockManager::new(Arc::new(MemoryStore::new()), clock.clone());
        (manager, clock)
    }

    #[test]
    fn test_ttl_formula() {
        assert_eq!(calculate_lock_ttl(2, 2, 1, 1), 3);
        assert_eq!(calculate_lock_ttl(120, 5, 10, 5), 125);
        assert_eq!(calculate_lock_ttl(10, 5, 10, 0), 50);
        assert_eq!(calculate_lock_ttl(0, 0, 0, 0), 1);
    }

    #[test]
    fn test_expired_lock_is_taken_over() {
        let (manager, clock) = manager();
        let first = manager.acquire("k", 10).unwrap().unwrap();

        clock.advance(Duration::from_secs(11));
        let second = manager.acquire("k", 10).unwrap().unwrap();

        assert_ne!(first, second);
        assert!(manager.refresh("k", &first, 10).unwrap().is_none());
        assert!(manager.release("k", Some(&first)).unwrap().is_none());
    }

    #[test]
    fn test_force_release() {
        let (manager, _) = manager();
        manager.acquire("k", 10).unwrap().unwrap();
        assert_eq!(
            manager.release("k", None).unwrap(),
            Some(ReleaseOutcome::ForceReleased)
        );
        assert!(manager.acquire("k", 10).unwrap().is_some());
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let (manager, _) = manager();
        {
            let guard = manager.acquire_guard("k", 60).unwrap().unwrap();
            assert!(guard.refresh(60).unwrap());
            assert!(manager.acquire("k", 60).unwrap().is_none());
        }
        assert!(manager.current("k").unwrap().is_none());
    }

    #[test]
    fn test_guard_does_not_release_a_stolen_lock() {
        let (manager, clock) = manager();
        let guard = manager.acquire_guard("k", 5).unwrap().unwrap();

        clock.advance(Duration::from_secs(6));
        let thief = manager.acquire("k", 60).unwrap().unwrap();

        assert!(!guard.refresh(5).unwrap());
        drop(guard);
        assert_eq!(manager.current("k").unwrap().unwrap().token, thief);
    }
}

//! Snapshot holder for the live configuration
//!
//! Readers take an `Arc<SeoConfig>` snapshot at a well-defined boundary (the
//! start of a queue tick, the start of an optimize call) and keep using it
//! even if the configuration is replaced meanwhile.

use parking_lot::RwLock;
use std::sync::Arc;

use super::types::SeoConfig;

#[derive(Debug, Clone)]
pub struct SharedConfig {
    current: Arc<RwLock<Arc<SeoConfig>>>,
}

impl SharedConfig {
    #[must_use]
    pub fn new(config: SeoConfig) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    /// The configuration in effect right now
    #[must_use]
    pub fn snapshot(&self) -> Arc<SeoConfig> {
        self.current.read().clone()
    }

    /// Install a new configuration for subsequent snapshots
    pub fn replace(&self, config: SeoConfig) {
        *self.current.write() = Arc::new(config);
        log::info!("Configuration updated");
    }
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self::new(SeoConfig::default())
    }
}

impl From<SeoConfig> for SharedConfig {
    fn from(config: SeoConfig) -> Self {
        Self::new(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshots_are_stable_across_replace() {
        let shared = SharedConfig::default();
        let before = shared.snapshot();

        shared.replace(SeoConfig::builder().batch_size(9).build().unwrap());

        assert_eq!(before.batch_size(), 5);
        assert_eq!(shared.snapshot().batch_size(), 9);
    }
}

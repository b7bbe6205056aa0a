//! Configuration module
//!
//! This module provides the `SeoConfig` struct, its fluent builder, the JSON
//! settings file format it is normally loaded from, and the shared snapshot
//! holder used by long-running components.

// Sub-modules
pub mod builder;
pub mod getters;
pub mod methods;
pub mod settings;
pub mod shared;
pub mod types;

// Re-exports for public API
pub use builder::SeoConfigBuilder;
pub use settings::{Settings, load_config};
pub use shared::SharedConfig;
pub use types::{DefaultTexts, FeatureToggles, LockLossPolicy, SeoConfig};

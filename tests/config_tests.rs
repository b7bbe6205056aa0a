//! Tests for the configuration builder and the settings file format

use seo_autolink::config::{LockLossPolicy, SeoConfig, Settings, SharedConfig, load_config};
use std::fs;
use tempfile::TempDir;

mod common;
use common::rule;

#[test]
fn test_builder_defaults() {
    let config = SeoConfig::builder().build().unwrap();

    assert!(config.rules().is_empty());
    assert_eq!(config.paragraph_link_cap(), 2);
    assert_eq!(config.batch_size(), 5);
    assert_eq!(config.batch_delay_secs(), 5);
    assert_eq!(config.task_timeout_secs(), 120);
    assert_eq!(config.per_item_time_budget_secs(), 10);
    assert_eq!(config.lock_safety_margin_secs(), 5);
    assert_eq!(config.queries_per_minute(), 120);
    assert_eq!(config.lock_loss_policy(), LockLossPolicy::Abort);
    assert_eq!(config.link_target(), "_self");
    assert_eq!(config.link_rel(), "noopener");
    assert!(config.background_processing());
    assert!(config.protected_block_types().iter().any(|t| t == "shortcode"));
    assert_eq!(config.site_url(), None);
}

#[test]
fn test_builder_validation() {
    assert!(SeoConfig::builder().batch_size(0).build().is_err());
    assert!(SeoConfig::builder().site_url("not a url").build().is_err());
    assert!(
        SeoConfig::builder()
            .protect_block_type("Acme/Widget")
            .build()
            .unwrap()
            .protected_block_types()
            .iter()
            .any(|t| t == "acme/widget")
    );
}

#[test]
fn test_protected_block_types_are_deduplicated_in_order() {
    let config = SeoConfig::builder()
        .protected_block_types(["code", "acme/widget", "Code", "html", "acme/widget"])
        .build()
        .unwrap();

    assert_eq!(config.protected_block_types(), &["code", "acme/widget", "html"]);
}

#[test]
fn test_settings_file_with_structured_rules() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");
    fs::write(
        &path,
        r#"{
            "internal_link_rules": [
                {"keyword": "أكياس النيكوتين", "url": "https://shop.test/pouches", "repeats": 2},
                {"keyword": "", "url": "https://shop.test/empty"},
                {"keyword": "broken", "url": "notaurl"}
            ],
            "paragraph_link_cap": "1",
            "batch_size": 0,
            "task_timeout": "0",
            "enable_background_processing": "0",
            "site_url": "https://shop.test"
        }"#,
    )
    .unwrap();

    let config = load_config(Some(&path)).unwrap();

    assert_eq!(config.rules().len(), 1);
    assert_eq!(config.rules()[0].keyword(), "أكياس النيكوتين");
    assert_eq!(config.rules()[0].repeats(), 2);
    assert_eq!(config.paragraph_link_cap(), 1);
    assert_eq!(config.batch_size(), 5);
    assert_eq!(config.task_timeout_secs(), 120);
    assert!(!config.background_processing());
    assert_eq!(config.site_url(), Some("https://shop.test"));
}

#[test]
fn test_legacy_map_rules() {
    let settings = Settings::from_json_str(
        r#"{"internal_link_rules": {"dates": "https://shop.test/dates", "figs": ""}}"#,
    )
    .unwrap();

    let config = settings.into_config().unwrap();

    assert_eq!(config.rules(), &[rule("dates", "https://shop.test/dates")]);
}

#[test]
fn test_missing_settings_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    assert!(load_config(Some(&dir.path().join("absent.json"))).is_err());
    assert_eq!(load_config(None).unwrap(), SeoConfig::default());
}

#[test]
fn test_shared_config_snapshots_are_stable() {
    let shared = SharedConfig::new(SeoConfig::default());
    let before = shared.snapshot();

    shared.replace(SeoConfig::builder().batch_size(9).build().unwrap());

    assert_eq!(before.batch_size(), 5);
    assert_eq!(shared.snapshot().batch_size(), 9);
}

//! Test utilities shared by the seo_autolink integration tests

use std::sync::Arc;

use seo_autolink::config::{SeoConfig, SharedConfig};
use seo_autolink::link_rules::LinkRule;
use seo_autolink::optimizer::{ContentItem, MemoryContentStore, SeoOptimizer};
use seo_autolink::runtime::ManualClock;
use seo_autolink::storage::MemoryStore;
use seo_autolink::task_queue::QueueProcessor;

/// Build a rule, panicking on invalid test input
#[allow(dead_code)]
pub fn rule(keyword: &str, url: &str) -> LinkRule {
    LinkRule::new(keyword, url).expect("test rule is valid")
}

/// Count `<a ` openings whose href is exactly `url`
#[allow(dead_code)]
pub fn anchors_to(html: &str, url: &str) -> usize {
    html.matches(&format!("href=\"{url}\"")).count()
}

/// Total anchors in `html`
#[allow(dead_code)]
pub fn anchor_count(html: &str) -> usize {
    html.matches("<a ").count()
}

/// Everything a queue test needs, sharing one store and one manual clock
#[allow(dead_code)]
pub struct QueueHarness {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub content: Arc<MemoryContentStore>,
    pub config: SharedConfig,
    pub processor: QueueProcessor,
}

#[allow(dead_code)]
pub fn queue_harness(config: SeoConfig, items: Vec<ContentItem>) -> QueueHarness {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::starting_now());
    let content = Arc::new(MemoryContentStore::with_items(items));
    let config = SharedConfig::new(config);
    let optimizer = Arc::new(SeoOptimizer::new(content.clone(), config.clone(), clock.clone()));
    let processor = QueueProcessor::new(store.clone(), clock.clone(), config.clone(), optimizer);

    QueueHarness {
        store,
        clock,
        content,
        config,
        processor,
    }
}

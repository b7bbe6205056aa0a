// seo-autolink: command-line entry point
//
// Every command builds its collaborators here from the settings file, the
// state store and the content catalog, then calls into the library.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

use seo_autolink::optimizer::ItemFilter;
use seo_autolink::runtime::{Clock, SystemClock, run_tick_async, run_worker};
use seo_autolink::storage::{JsonFileStore, KeyValueStore};
use seo_autolink::task_queue::{QueueProcessor, TickOutcome};
use seo_autolink::utils::QUEUE_HOOK;
use seo_autolink::{
    BulkAction, BulkLinkRun, ContentStore, JsonCatalogStore, OptimizeOptions, OptimizeSource,
    SeoOptimizer, SharedConfig, load_config,
};

#[derive(Parser)]
#[command(name = "seo-autolink", version)]
#[command(about = "Internal linking and SEO autofill for catalog content")]
struct Cli {
    /// Settings file (JSON)
    #[arg(long, global = true, env = "SEO_AUTOLINK_SETTINGS")]
    settings: Option<PathBuf>,

    /// Queue, lock and bulk-run state file
    #[arg(long, global = true, default_value = "seo-autolink-state.json")]
    state: PathBuf,

    /// Content catalog file (JSON array of items)
    #[arg(long, global = true, default_value = "catalog.json")]
    catalog: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply link rules to HTML and print the result
    Link {
        /// Read HTML from this file instead of stdin
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Strip internal links from HTML and print the result
    Unlink {
        /// Site root; defaults to `site_url` from the settings
        #[arg(long)]
        site_url: Option<String>,
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Optimize published items of one type, newest first
    Autofill {
        #[arg(long, default_value = "product")]
        posts: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Report changes without saving them
        #[arg(long)]
        dry_run: bool,
    },

    /// Print rules that could still be linked in one item
    LinkSuggest {
        #[arg(long)]
        item: u64,
    },

    /// Queue one item for background optimization
    Enqueue { item: u64 },

    /// Run a single queue tick
    ProcessQueue,

    /// Keep processing the queue until Ctrl-C
    Worker,

    /// Show queue length, last tick and lock state
    Status,

    /// Clear the queue lock regardless of its holder
    ReleaseLock,

    /// Apply or remove links across all published items in chunks
    Bulk {
        #[arg(long, value_enum)]
        action: BulkActionArg,
        /// Item types to include
        #[arg(long, default_values = ["post", "product"])]
        posts: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum BulkActionArg {
    ApplyLinks,
    RemoveLinks,
}

impl From<BulkActionArg> for BulkAction {
    fn from(value: BulkActionArg) -> Self {
        match value {
            BulkActionArg::ApplyLinks => Self::ApplyLinks,
            BulkActionArg::RemoveLinks => Self::RemoveLinks,
        }
    }
}

/// Collaborators shared by the commands
struct App {
    config: SharedConfig,
    store: Arc<dyn KeyValueStore>,
    content: Arc<dyn ContentStore>,
    clock: Arc<dyn Clock>,
}

impl App {
    fn from_cli(cli: &Cli) -> Result<Self> {
        let config = load_config(cli.settings.as_deref())?;
        Ok(Self {
            config: SharedConfig::new(config),
            store: Arc::new(JsonFileStore::new(&cli.state)),
            content: Arc::new(JsonCatalogStore::new(&cli.catalog)),
            clock: Arc::new(SystemClock),
        })
    }

    fn optimizer(&self) -> Arc<SeoOptimizer> {
        Arc::new(SeoOptimizer::new(
            self.content.clone(),
            self.config.clone(),
            self.clock.clone(),
        ))
    }

    fn processor(&self) -> QueueProcessor {
        QueueProcessor::new(
            self.store.clone(),
            self.clock.clone(),
            self.config.clone(),
            self.optimizer(),
        )
    }

    fn bulk_run(&self) -> BulkLinkRun {
        BulkLinkRun::new(
            self.store.clone(),
            self.clock.clone(),
            self.content.clone(),
            self.config.clone(),
        )
    }
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            Ok(buffer)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let app = App::from_cli(&cli)?;

    match cli.command {
        Commands::Link { input } => {
            let content = read_input(input.as_deref())?;
            let config = app.config.snapshot();
            print!("{}", config.link_engine().apply_rules(&content, config.rules()));
        }

        Commands::Unlink { site_url, input } => {
            let config = app.config.snapshot();
            let site_url = site_url
                .or_else(|| config.site_url().map(str::to_string))
                .ok_or_else(|| anyhow!("No site URL given; pass --site-url or set site_url"))?;
            let content = read_input(input.as_deref())?;
            let unlinked = config.link_engine().remove_internal_links(&content, &site_url);
            log::info!("Removed {} internal link(s)", unlinked.removed);
            print!("{}", unlinked.content);
        }

        Commands::Autofill {
            posts,
            limit,
            dry_run,
        } => {
            let filter = ItemFilter::published(posts).with_limit(limit.max(1));
            let items = app.content.list_items(&filter)?;
            if items.is_empty() {
                log::warn!("No items matched the provided criteria");
                return Ok(());
            }

            let optimizer = app.optimizer();
            let options = OptimizeOptions::from_source(OptimizeSource::Cli).dry_run(dry_run);
            for item in items {
                match optimizer.optimize_item(item.id, options) {
                    Ok(report) if dry_run => {
                        println!("Dry-run for {}: {} changes detected.", item.id, report.changes.len());
                    }
                    Ok(report) => {
                        println!("Optimized {} with {} updates.", item.id, report.changes.len());
                    }
                    Err(e) => log::error!("Failed to optimize item {}: {e}", item.id),
                }
            }
            println!(
                "{}",
                if dry_run { "Dry-run completed." } else { "Optimization completed." }
            );
        }

        Commands::LinkSuggest { item } => {
            let suggestions = app.optimizer().suggest_links(item)?;
            if suggestions.is_empty() {
                log::warn!("No suggestions available for item {item}");
            }
            for suggestion in suggestions {
                println!("{} → {}", suggestion.keyword, suggestion.url);
            }
        }

        Commands::Enqueue { item } => {
            let processor = app.processor();
            if processor.queue().enqueue(item, serde_json::Map::new())? {
                println!("Queued item {item}.");
            } else {
                println!("Item {item} is already queued or invalid.");
            }
        }

        Commands::ProcessQueue => match run_tick_async(Arc::new(app.processor())).await? {
            TickOutcome::Skipped => println!("Another worker holds the queue lock; skipped."),
            TickOutcome::Completed(report) => {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        },

        Commands::Worker => {
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    log::error!("Failed to listen for Ctrl-C: {e}");
                }
                let _ = shutdown_tx.send(true);
            });
            let summary = run_worker(Arc::new(app.processor()), shutdown_rx).await;
            println!(
                "Worker stopped: {} tick(s), {} item(s) processed, {} skipped, {} failed tick(s).",
                summary.ticks, summary.processed, summary.skipped, summary.failed_ticks
            );
        }

        Commands::Status => {
            let status = app.processor().status()?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }

        Commands::ReleaseLock => {
            app.processor().locks().release(QUEUE_HOOK, None)?;
            println!("Queue lock released.");
        }

        Commands::Bulk { action, posts } => {
            let action = BulkAction::from(action);
            let config = app.config.snapshot();
            if action == BulkAction::ApplyLinks && config.rules().is_empty() {
                return Err(anyhow!("No internal link rules configured"));
            }
            if action == BulkAction::RemoveLinks && config.site_url().is_none() {
                return Err(anyhow!("Link removal needs site_url in the settings"));
            }

            let mut ids = Vec::new();
            for item_type in posts {
                ids.extend(
                    app.content
                        .list_items(&ItemFilter::published(item_type))?
                        .into_iter()
                        .map(|item| item.id),
                );
            }

            let bulk = app.bulk_run();
            let total = bulk.prepare(ids)?;
            if total == 0 {
                log::warn!("No items to process");
                return Ok(());
            }

            loop {
                let progress = bulk.next_batch(action)?;
                for message in &progress.messages {
                    println!("{message}");
                }
                println!(
                    "{}/{} handled, {} changed in this batch.",
                    progress.total - progress.remaining,
                    progress.total,
                    progress.processed_count
                );
                if progress.done {
                    break;
                }
            }
        }
    }

    Ok(())
}

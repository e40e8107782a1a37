//! `swarmlink push` — bulk upsert of the local tree into the remote store.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use swarmlink_core::{store, Category, Config, DispatchOutcome};
use swarmlink_sync::{HttpStore, RetryPolicy, UpsertSink};

use super::selected_categories;

/// Arguments for `swarmlink push`.
#[derive(Args, Debug)]
pub struct PushArgs {
    /// Push a single category (directory name, e.g. `messages`).
    #[arg(long)]
    pub category: Option<String>,

    /// List what would be pushed without contacting the remote store.
    #[arg(long)]
    pub dry_run: bool,
}

impl PushArgs {
    pub fn run(self) -> Result<()> {
        let config = Config::from_env().context("incomplete configuration")?;
        let categories = selected_categories(self.category.as_deref())?;
        let sink = UpsertSink::new(
            Arc::new(HttpStore::new(&config.store)),
            RetryPolicy::default(),
        );

        for category in categories {
            let summary = push_category(&config, &sink, category, self.dry_run)
                .with_context(|| format!("push failed for '{}'", category.dir_name()))?;

            let prefix = if self.dry_run { "[dry-run] " } else { "" };
            println!(
                "{prefix}{} {} ({} pushed, {} skipped, {} failed)",
                "✓".green(),
                category.dir_name(),
                summary.pushed,
                summary.skipped,
                summary.failed
            );
        }

        Ok(())
    }
}

#[derive(Default)]
struct PushSummary {
    pushed: usize,
    skipped: usize,
    failed: usize,
}

fn push_category(
    config: &Config,
    sink: &UpsertSink,
    category: Category,
    dry_run: bool,
) -> Result<PushSummary> {
    let mut summary = PushSummary::default();

    for path in store::list_record_paths_at(&config.data_root, category)? {
        let record = match store::read_record(category, &path) {
            Ok(record) => record,
            Err(err) => {
                println!("  {} {}: {err}", "!".yellow(), path.display());
                summary.skipped += 1;
                continue;
            }
        };

        if dry_run {
            println!("  ~  {} → {}", record.id, category.table_name());
            summary.pushed += 1;
            continue;
        }

        match sink.push(&record, false) {
            DispatchOutcome::Success => summary.pushed += 1,
            DispatchOutcome::RetryableFailure(detail) | DispatchOutcome::FatalFailure(detail) => {
                println!("  {} {}: {detail}", "✗".red(), record.id);
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}

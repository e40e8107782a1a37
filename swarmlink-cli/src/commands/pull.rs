//! `swarmlink pull` — download remote collections into the local tree.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use swarmlink_core::{store, Category, Config, RecordId};
use swarmlink_sync::{HttpStore, RemoteTable};

use super::selected_categories;

/// Arguments for `swarmlink pull`.
#[derive(Args, Debug)]
pub struct PullArgs {
    /// Pull a single category (directory name, e.g. `messages`).
    #[arg(long)]
    pub category: Option<String>,
}

impl PullArgs {
    pub fn run(self) -> Result<()> {
        let config = Config::from_env().context("incomplete configuration")?;
        let store_client = HttpStore::new(&config.store);
        let categories = selected_categories(self.category.as_deref())?;

        for category in categories {
            let summary = pull_category(&config, &store_client, category)
                .with_context(|| format!("pull failed for '{}'", category.dir_name()))?;
            println!(
                "{} {} ({} written, {} skipped)",
                "✓".green(),
                category.dir_name(),
                summary.written,
                summary.skipped
            );
        }

        Ok(())
    }
}

struct PullSummary {
    written: usize,
    skipped: usize,
}

fn pull_category(
    config: &Config,
    store_client: &dyn RemoteTable,
    category: Category,
) -> Result<PullSummary> {
    let id_field = category.id_field();
    let remote = store_client.list_all(category.table_name())?;

    let mut summary = PullSummary {
        written: 0,
        skipped: 0,
    };

    for record in remote {
        let Some(id) = record.fields.get(id_field).and_then(|v| v.as_str()) else {
            // A remote row without the keyed identifier has no local file name.
            println!(
                "  {} {} record {} has no '{}' field",
                "!".yellow(),
                category.dir_name(),
                record.handle,
                id_field
            );
            summary.skipped += 1;
            continue;
        };

        store::save_record_at(
            &config.data_root,
            category,
            &RecordId::from(id),
            &record.fields,
        )?;
        summary.written += 1;
    }

    Ok(summary)
}

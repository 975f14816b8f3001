//! `dexlab fetch`: replace the working set with a fresh catalog ingestion.

use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use dexlab_ingest::{IngestConfig, IngestProgress, IngestSummary, Ingestor};
use dexlab_store::WorkingSet;
use std::io::{self, Write};

/// Flag overrides on top of `IngestConfig::from_env`.
#[derive(Debug, Default, Clone)]
pub struct FetchOverrides {
    pub base_url: Option<String>,
    pub batch_size: Option<usize>,
    pub limit: Option<usize>,
}

pub fn resolve_config(overrides: &FetchOverrides) -> Result<IngestConfig> {
    let mut config = IngestConfig::from_env().context("reading DEXLAB_* settings")?;
    if let Some(url) = &overrides.base_url {
        config.base_url = url.clone();
    }
    if let Some(n) = overrides.batch_size {
        config.batch_size = n;
    }
    if let Some(n) = overrides.limit {
        config.index_limit = n;
    }
    config.validate()?;
    Ok(config)
}

pub fn cmd_fetch(set: &WorkingSet, config: &IngestConfig) -> Result<IngestSummary> {
    let ingestor = Ingestor::http(config)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| anyhow!("failed to initialize tokio runtime: {e}"))?;

    println!(
        "{} {}",
        "Fetching catalog from".cyan(),
        config.base_url.bold()
    );

    // previous rows go; declared columns stay
    set.replace_all(Vec::new());
    let summary = rt.block_on(ingestor.ingest(
        |rows| {
            set.append_batch(rows);
        },
        print_progress,
    ));
    eprintln!();
    let summary = summary?;

    println!(
        "{} {} rows ({} dropped, {} batches, {} classification lookups)",
        "Fetched".green().bold(),
        summary.fetched,
        summary.dropped,
        summary.batches,
        summary.classification_lookups
    );
    Ok(summary)
}

fn print_progress(progress: IngestProgress) {
    let percent = if progress.total == 0 {
        100
    } else {
        progress.done * 100 / progress.total
    };
    eprint!("\r  {:>3}% ({}/{})", percent, progress.done, progress.total);
    let _ = io::stderr().flush();
}

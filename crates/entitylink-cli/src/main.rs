#![forbid(unsafe_code)]
//! `entitylink`: a thin example binary wiring the matching engine, a JSON
//! lines record source, and the ambient config/logging stack together.
//! CLI parsing and input adapters are an explicit Non-goal of the core; this
//! binary exists only to make the workspace runnable end to end.

mod records;
mod sink;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use entitylink_classes::{EquivalenceClassStore, MemoryClassStore, SqliteClassStore};
use entitylink_index::{InvertedIndex, QueryResultTracker};
use entitylink_index::memory::MemoryIndex;
use entitylink_index::sqlite::SqliteIndex;
use entitylink_match::{MatchingEngine, MatchSink};
use entitylink_strings::ComparatorRegistry;

use sink::PrintingSink;

#[derive(Parser, Debug)]
#[command(author, version, about = "Probabilistic record deduplication and record-linkage engine", long_about = None)]
struct Cli {
    /// Path to the TOML configuration (properties, thresholds, retrieval tuning).
    #[arg(short, long, global = true)]
    config: PathBuf,

    /// Durable equivalence-class store path; an in-memory store is used if absent.
    #[arg(long, global = true)]
    classes: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Deduplicate a batch of records against itself (§4.6).
    Dedup {
        /// Line-delimited JSON record source.
        records: PathBuf,
    },
    /// Match probe records against an already-indexed reference corpus (§4.9).
    Link {
        /// Line-delimited JSON reference corpus, indexed before matching begins.
        reference: PathBuf,
        /// Line-delimited JSON probe records to match one at a time.
        probes: PathBuf,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = entitylink_core::config::from_path(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    let registry = ComparatorRegistry::new();
    let engine = MatchingEngine::new(&config, &registry);

    let mut index = open_index(config.path.as_deref())?;
    let mut classes = open_classes(cli.classes.as_deref())?;
    let mut tracker = QueryResultTracker::with_expansion_factor(config.max_search_hits, config.min_relevance, config.expansion_factor);

    match cli.command {
        Commands::Dedup { records: path } => run_dedup(&engine, &mut *index, &mut tracker, &mut *classes, &path),
        Commands::Link { reference, probes } => {
            run_link(&engine, &config, &mut *index, &mut tracker, &mut *classes, &reference, &probes)
        }
    }?;

    classes.commit().context("flushing equivalence classes")?;
    Ok(())
}

fn run_dedup(
    engine: &MatchingEngine<'_>,
    index: &mut dyn InvertedIndex,
    tracker: &mut QueryResultTracker,
    classes: &mut dyn EquivalenceClassStore,
    path: &std::path::Path,
) -> Result<()> {
    let batch = records::read_jsonl(path)?;
    info!(batch_size = batch.len(), "running deduplication");
    let mut sink = PrintingSink::new(vec![&batch]);
    engine.run_deduplication(index, tracker, classes, &batch, &mut sink as &mut dyn MatchSink)?;
    Ok(())
}

fn run_link(
    engine: &MatchingEngine<'_>,
    config: &entitylink_core::Configuration,
    index: &mut dyn InvertedIndex,
    tracker: &mut QueryResultTracker,
    classes: &mut dyn EquivalenceClassStore,
    reference_path: &std::path::Path,
    probes_path: &std::path::Path,
) -> Result<()> {
    let reference = records::read_jsonl(reference_path)?;
    info!(reference_size = reference.len(), "indexing reference corpus");
    for (doc_id, record) in &reference {
        index.index(doc_id, record, config)?;
    }
    index.commit()?;

    let probes = records::read_jsonl(probes_path)?;
    info!(probe_count = probes.len(), "matching probes against reference corpus");
    let mut sink = PrintingSink::new(vec![&probes, &reference]);
    for (probe_id, probe) in &probes {
        engine.run_linkage(index, tracker, classes, probe_id, probe, &mut sink as &mut dyn MatchSink)?;
    }
    Ok(())
}

fn open_index(path: Option<&std::path::Path>) -> Result<Box<dyn InvertedIndex>> {
    Ok(match path {
        Some(path) => Box::new(SqliteIndex::open(path).with_context(|| format!("opening index at {}", path.display()))?),
        None => Box::new(MemoryIndex::new()),
    })
}

fn open_classes(path: Option<&std::path::Path>) -> Result<Box<dyn EquivalenceClassStore>> {
    Ok(match path {
        Some(path) => Box::new(SqliteClassStore::open(path).with_context(|| format!("opening class store at {}", path.display()))?),
        None => Box::new(MemoryClassStore::new()),
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("ENTITYLINK_LOG")
        .unwrap_or_else(|_| EnvFilter::new("entitylink=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

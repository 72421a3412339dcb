//! hfs-index
//!
//! Projects FHIR JSON documents into search index entries and writes them
//! as JSON lines.

mod config;
mod input;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use helios_index::{
    BatchIndexer, BatchStatus, EntrySink, FileSystemLookup, Indexer, JsonLinesSink, SchemaLoader,
    SchemaTable,
};
use tracing::info;

use crate::config::CliConfig;

/// Installs the tracing subscriber. `RUST_LOG` overrides `level`.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("helios_index={},helios_index_cli={}", level, level))
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_schema(config: &CliConfig) -> anyhow::Result<SchemaTable> {
    let mut table = SchemaTable::builtin().context("building the built-in schema")?;
    let loader = SchemaLoader::new();
    for path in &config.schema {
        let extra = loader
            .load_file(path)
            .with_context(|| format!("loading schema {}", path.display()))?;
        info!(path = %path.display(), resource_types = extra.len(), "Loaded schema");
        table.merge(extra);
    }
    Ok(table)
}

fn open_output(config: &CliConfig) -> anyhow::Result<Box<dyn Write + Send>> {
    Ok(match &config.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(std::io::stdout())),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    let schema = Arc::new(load_schema(&config)?);
    let mut indexer = Indexer::new(schema, config.indexer_config())
        .map_err(|errors| anyhow::anyhow!("Invalid indexer configuration: {}", errors.join("; ")))?;
    if let (true, Some(dir)) = (config.chaining(), &config.lookup_dir) {
        info!(lookup_dir = %dir.display(), max_chain_depth = config.max_chain_depth, "Chaining enabled");
        indexer = indexer.with_lookup(Arc::new(FileSystemLookup::new(dir)));
    }

    let mut documents = Vec::new();
    for file in input::collect_files(&config.inputs)? {
        documents.extend(input::read_documents(&file).await?);
    }
    info!(documents = documents.len(), base_url = %config.base_url, "Indexing");

    let sink: Arc<dyn EntrySink> = Arc::new(JsonLinesSink::new(open_output(&config)?));
    let batch = BatchIndexer::new(Arc::new(indexer), sink).with_concurrency(config.concurrency);
    let progress = batch.run(documents).await;

    for error in &progress.errors {
        eprintln!("{}: {}", error.source, error.error);
    }
    eprintln!(
        "Indexed {} of {} documents ({} entries, {} skipped values, {} chain failures)",
        progress.processed,
        progress.total,
        progress.entries_written,
        progress.skipped_values,
        progress.chain_failures
    );

    if progress.status == BatchStatus::Failed || progress.failed > 0 {
        std::process::exit(2);
    }
    Ok(())
}

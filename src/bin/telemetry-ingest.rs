//! Outer driver: loads an `IngestConfig`, processes every file directly
//! under `input_directory` serially, and logs a throughput summary.
//!
//! Deliberately no inotify/signal handling or thread-pool fan-out here —
//! those belong to the external process that watches `storage_path` and
//! `upload_path` (spec.md §1 Non-goals). One invocation is one batch pass.

use std::fs::File;
use std::io::BufReader;
use std::time::Instant;

use anyhow::{Context, Result};
use walkdir::WalkDir;

use telemetry_ingest::{
    init_tracing_once, DimensionSchema, FileRecordWriter, HistogramCache, IngestConfig, IngestMetrics, Pipeline,
    TcpSchemaFetcher,
};

const MAX_OPEN_PARTITION_HANDLES: usize = 64;

fn main() -> Result<()> {
    init_tracing_once();

    let config_path = std::env::args().nth(1).ok_or_else(|| anyhow::anyhow!("usage: telemetry-ingest <config.json>"))?;
    let config = IngestConfig::load(&config_path).with_context(|| format!("load config {config_path}"))?;

    let schema_bytes = std::fs::read(&config.telemetry_schema)
        .with_context(|| format!("read dimension schema {}", config.telemetry_schema.display()))?;
    let schema_value: serde_json::Value = serde_json::from_slice(&schema_bytes).context("parse dimension schema")?;
    let dimension_schema = DimensionSchema::parse(&schema_value).context("load dimension schema")?;

    let (host, port) = config.schema_server_addr();
    let cache = HistogramCache::new(host, port, TcpSchemaFetcher);
    let writer = FileRecordWriter::new(&config.storage_path, MAX_OPEN_PARTITION_HANDLES);
    let mut pipeline = Pipeline::new(cache, dimension_schema, writer);

    let mut metrics = IngestMetrics::default();
    let started = Instant::now();

    let entries: Vec<_> = WalkDir::new(&config.input_directory)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .collect();

    tracing::info!(count = entries.len(), directory = %config.input_directory.display(), "discovered input files");

    for entry in entries {
        let path = entry.path();
        tracing::debug!(file = %path.display(), "processing file");
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        pipeline.process_reader(BufReader::new(file), &mut metrics).with_context(|| format!("process {}", path.display()))?;
    }

    metrics.finish(started.elapsed()).log("batch");
    Ok(())
}

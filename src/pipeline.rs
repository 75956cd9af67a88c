//! Glue between framing, schema-driven conversion, partitioning, and
//! output (SPEC_FULL.md's pipeline module). Mirrors `original_source/`'s
//! `ProcessFile`: read, convert, write, one record at a time, counting
//! throughput as it goes.

use std::io::Read;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::converter::{convert, ConversionOutcome};
use crate::dimension_schema::DimensionSchema;
use crate::frame::{DecodeOutcome, FrameDecoder, TelemetryRecord};
use crate::histogram_cache::{HistogramCache, SchemaFetcher};
use crate::metrics::IngestMetrics;
use crate::record_writer::RecordWriter;

const READ_CHUNK: usize = 64 * 1024;

/// Ties one schema cache, one dimension schema, and one output sink
/// together to process whole byte streams of concatenated telemetry
/// frames.
pub struct Pipeline<F: SchemaFetcher, W: RecordWriter> {
    cache: HistogramCache<F>,
    dimension_schema: DimensionSchema,
    writer: W,
}

impl<F: SchemaFetcher, W: RecordWriter> Pipeline<F, W> {
    pub fn new(cache: HistogramCache<F>, dimension_schema: DimensionSchema, writer: W) -> Self {
        Self { cache, dimension_schema, writer }
    }

    /// Read `reader` to EOF, decoding, converting, and writing every
    /// record it frames. Returns once the writer has been flushed.
    pub fn process_reader<R: Read>(&mut self, mut reader: R, metrics: &mut IngestMetrics) -> Result<()> {
        let mut decoder = FrameDecoder::new();
        let mut buf = vec![0u8; READ_CHUNK];

        loop {
            let n = reader.read(&mut buf).context("read input stream")?;
            if n == 0 {
                decoder.finish();
            } else {
                decoder.feed(&buf[..n]);
            }

            loop {
                match decoder.next_record() {
                    DecodeOutcome::Record(record) => self.handle_record(record, metrics)?,
                    DecodeOutcome::NeedMoreData => break,
                    DecodeOutcome::Eof => {
                        self.writer.flush().context("flush output writer")?;
                        return Ok(());
                    }
                }
            }

            if n == 0 {
                break;
            }
        }

        self.writer.flush().context("flush output writer")?;
        Ok(())
    }

    fn handle_record(&mut self, record: TelemetryRecord, metrics: &mut IngestMetrics) -> Result<()> {
        let in_bytes = serde_json::to_vec(&record.document).map(|v| v.len() as u64).unwrap_or(0);
        let mut doc = record.document;

        match convert(&mut doc, &mut self.cache) {
            ConversionOutcome::Failed => {
                metrics.record_failure(in_bytes);
                return Ok(());
            }
            ConversionOutcome::Converted | ConversionOutcome::NoOp => {}
        }

        let metadata = doc.get("info").cloned().unwrap_or(Value::Null);
        let partition_path = self.dimension_schema.path_for(&metadata);

        // Handoff format (spec.md §6): "<uuid>\t<json>", uuid being the
        // record's path up to its first '/'.
        let uuid_len = record.path.iter().position(|&b| b == b'/').unwrap_or(record.path.len());
        let mut line = record.path[..uuid_len].to_vec();
        line.push(b'\t');
        line.extend_from_slice(&serde_json::to_vec(&doc).context("serialize record")?);

        let out_bytes = line.len() as u64;
        self.writer.write(&partition_path, &line).context("write record")?;
        metrics.record_ok(in_bytes, out_bytes);
        Ok(())
    }
}

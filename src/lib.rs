mod config;
mod converter;
mod dimension_schema;
mod error;
mod frame;
mod histogram;
mod histogram_cache;
mod metrics;
mod payload;
mod pipeline;
mod record_writer;
mod util;

pub use crate::config::IngestConfig;
pub use crate::converter::{convert, ConversionOutcome};
pub use crate::dimension_schema::{Dimension, DimensionSchema};
pub use crate::error::{DecodeError, FetchError, SchemaError};
pub use crate::frame::{DecodeOutcome, FrameDecoder, TelemetryRecord, MAX_TELEMETRY_DATA, MAX_TELEMETRY_PATH, RECORD_SEPARATOR};
pub use crate::histogram::{Histogram, HistogramDefinition};
pub use crate::histogram_cache::{FetchOutcome, HistogramCache, SchemaFetcher, TcpSchemaFetcher};
pub use crate::metrics::{IngestMetrics, MetricsSummary};
pub use crate::payload::decode_payload;
pub use crate::pipeline::Pipeline;
pub use crate::record_writer::{FileRecordWriter, RecordWriter};
pub use crate::util::init_tracing_once;

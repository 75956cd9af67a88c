//! Typed error kinds for the decode/schema/convert layers (spec.md §7).
//!
//! These are deliberately narrow, per-stage error types. Glue code at
//! higher levels (pipeline, driver) wraps them in `anyhow::Result` with
//! `.context(...)`, the way the teacher's modules do.

use thiserror::Error;

/// Failure decoding one frame's payload into a JSON document.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed frame header")]
    BadFrame,
    #[error("gzip inflate failed")]
    InflateFailed,
    #[error("payload JSON parse failed: {0}")]
    JsonParseError(#[from] serde_json::Error),
}

/// Failure loading a histogram definition or schema set (spec.md §4.2).
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("bad schema: {0}")]
    BadSchema(String),
    #[error("histograms element must be an object")]
    NotAnObject,
    #[error("buckets array should contain {declared} elements; {actual} were specified")]
    LengthMismatch { declared: i64, actual: usize },
}

/// Transport failure fetching a schema set for one revision key (spec.md
/// §4.3). A non-canonical revision URL is handled by the cache itself
/// before any fetch is attempted, so it has no variant here; a non-200
/// response is `FetchOutcome::NotFound`, not an error either — only
/// connection-level failures reach this type.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("connection failed: {0}")]
    Connection(#[from] std::io::Error),
}

//! Record framing (spec.md §4.1): locates, validates, and decompresses
//! variable-length records from an arbitrarily chunked byte stream.
//!
//! The wire format (spec.md §3): a `0x1E` separator, then little-endian
//! `path_length: u16`, `data_length: u32`, `timestamp: u64`, then `path`
//! and `data` bytes.

use serde_json::Value;

use crate::payload::decode_payload;

/// Record separator byte.
pub const RECORD_SEPARATOR: u8 = 0x1E;
/// `path` ceiling (spec.md §3).
pub const MAX_TELEMETRY_PATH: usize = 10 * 1024;
/// `data` ceiling (spec.md §3).
pub const MAX_TELEMETRY_DATA: usize = 200 * 1024;
/// path_length(2) + data_length(4) + timestamp(8).
pub const HEADER_SIZE: usize = 2 + 4 + 8;
/// Largest a single frame (header + path + data) can legally be.
pub const MAX_RECORD_SIZE: usize = HEADER_SIZE + MAX_TELEMETRY_PATH + MAX_TELEMETRY_DATA;

/// One decoded submission (spec.md §3 `TelemetryRecord`).
#[derive(Debug, Clone)]
pub struct TelemetryRecord {
    pub timestamp: u64,
    pub path: Vec<u8>,
    pub document: Value,
}

/// Result of asking the decoder for the next record.
#[derive(Debug)]
pub enum DecodeOutcome {
    /// A record was fully framed, decompressed, and parsed.
    Record(TelemetryRecord),
    /// Not enough bytes are buffered yet to complete a frame; feed more and retry.
    NeedMoreData,
    /// No more frames will ever be produced (the stream ended and nothing is pending).
    Eof,
}

/// Stream-framed record extractor. Non-blocking: `next_record` never waits
/// on I/O, it only inspects whatever has already been handed to `feed`.
///
/// State machine (spec.md §4.1):
/// ```text
/// SEEKING_SEP ── 0x1E found ──▶ READING_HDR
/// READING_HDR ── valid hdr ──▶ READING_BODY
/// READING_HDR ── invalid hdr ──▶ SEEKING_SEP (cursor += 1)
/// READING_BODY ── complete ──▶ DECODING
/// DECODING   ── ok ──▶ EMIT (back to SEEKING_SEP)
/// DECODING   ── fail ──▶ SEEKING_SEP
/// ANY        ── EOF mid-frame ──▶ SEEKING_SEP (preserve partial buffer)
/// ```
pub struct FrameDecoder {
    buf: Vec<u8>,
    cursor: usize,
    eof: bool,
    /// Count of records discarded due to a bad frame, inflate failure, or JSON parse error.
    pub records_failed: u64,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self { buf: Vec::with_capacity(MAX_RECORD_SIZE), cursor: 0, eof: false, records_failed: 0 }
    }

    /// Append newly-read bytes. Compacts already-consumed bytes out of the
    /// buffer first so it never grows past roughly `MAX_RECORD_SIZE` plus
    /// whatever is handed in by one `feed` call.
    pub fn feed(&mut self, bytes: &[u8]) {
        if self.cursor > 0 {
            self.buf.drain(0..self.cursor);
            self.cursor = 0;
        }
        self.buf.extend_from_slice(bytes);
    }

    /// Signal that no more bytes will ever arrive. After this, a partial
    /// frame that can never complete resolves to `Eof` instead of
    /// `NeedMoreData` forever.
    pub fn finish(&mut self) {
        self.eof = true;
    }

    /// Extract the next valid record, or report why none is available yet.
    pub fn next_record(&mut self) -> DecodeOutcome {
        loop {
            let Some(sep_offset) = self.buf[self.cursor..].iter().position(|&b| b == RECORD_SEPARATOR) else {
                self.cursor = self.buf.len();
                return if self.eof { DecodeOutcome::Eof } else { DecodeOutcome::NeedMoreData };
            };
            let sep_pos = self.cursor + sep_offset;
            let header_start = sep_pos + 1;

            if self.buf.len() < header_start + HEADER_SIZE {
                self.cursor = sep_pos;
                return if self.eof { DecodeOutcome::Eof } else { DecodeOutcome::NeedMoreData };
            }

            let path_length = u16::from_le_bytes([self.buf[header_start], self.buf[header_start + 1]]) as usize;
            let data_length = u32::from_le_bytes([
                self.buf[header_start + 2],
                self.buf[header_start + 3],
                self.buf[header_start + 4],
                self.buf[header_start + 5],
            ]) as usize;

            if path_length > MAX_TELEMETRY_PATH || data_length > MAX_TELEMETRY_DATA {
                // Spurious separator: resync by one byte and keep scanning.
                self.cursor = sep_pos + 1;
                continue;
            }

            let timestamp = u64::from_le_bytes([
                self.buf[header_start + 6],
                self.buf[header_start + 7],
                self.buf[header_start + 8],
                self.buf[header_start + 9],
                self.buf[header_start + 10],
                self.buf[header_start + 11],
                self.buf[header_start + 12],
                self.buf[header_start + 13],
            ]);

            let body_start = header_start + HEADER_SIZE;
            let body_end = body_start + path_length + data_length;
            if self.buf.len() < body_end {
                self.cursor = sep_pos;
                return if self.eof { DecodeOutcome::Eof } else { DecodeOutcome::NeedMoreData };
            }

            let path = self.buf[body_start..body_start + path_length].to_vec();
            let data = &self.buf[body_start + path_length..body_end];

            let decoded = decode_payload(data, MAX_RECORD_SIZE);
            self.cursor = body_end;

            match decoded {
                Ok(document) => return DecodeOutcome::Record(TelemetryRecord { timestamp, path, document }),
                Err(e) => {
                    tracing::debug!(error = %e, "discarding record: payload decode failed");
                    self.records_failed += 1;
                    continue;
                }
            }
        }
    }
}

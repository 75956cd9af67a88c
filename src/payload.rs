//! Payload decompression and parsing (spec.md §4.1.1): a frame's `data`
//! bytes are either a raw JSON document or a gzip-compressed one.

use std::io::Read;

use flate2::read::GzDecoder;
use serde_json::Value;

use crate::error::DecodeError;

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
/// Chunk size for the bounded inflate loop below.
const INFLATE_CHUNK: usize = 8 * 1024;

/// Decode one frame's `data` bytes into a JSON document.
///
/// If the bytes begin with the gzip magic, they are inflated first, capped
/// at `max_output_size` to guard against a decompression bomb outgrowing
/// the largest payload the wire format could legitimately carry. Hitting
/// that cap before the stream ends is treated the same as any other
/// inflate failure — the record is undecodable, not retried.
pub fn decode_payload(data: &[u8], max_output_size: usize) -> Result<Value, DecodeError> {
    if data.len() >= 2 && data[..2] == GZIP_MAGIC {
        let inflated = inflate_bounded(data, max_output_size)?;
        Ok(serde_json::from_slice(&inflated)?)
    } else {
        Ok(serde_json::from_slice(data)?)
    }
}

fn inflate_bounded(data: &[u8], max_output_size: usize) -> Result<Vec<u8>, DecodeError> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::with_capacity(INFLATE_CHUNK.min(max_output_size));
    let mut chunk = [0u8; INFLATE_CHUNK];
    loop {
        let n = decoder.read(&mut chunk).map_err(|_| DecodeError::InflateFailed)?;
        if n == 0 {
            break;
        }
        if out.len() + n > max_output_size {
            return Err(DecodeError::InflateFailed);
        }
        out.extend_from_slice(&chunk[..n]);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(bytes).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn plain_json_decodes() {
        let v = decode_payload(br#"{"a":1}"#, 1024).unwrap();
        assert_eq!(v["a"], 1);
    }

    #[test]
    fn gzip_json_decodes() {
        let compressed = gzip(br#"{"b":2}"#);
        let v = decode_payload(&compressed, 1024).unwrap();
        assert_eq!(v["b"], 2);
    }

    #[test]
    fn invalid_json_fails() {
        assert!(decode_payload(b"not json", 1024).is_err());
    }

    #[test]
    fn oversized_gzip_output_fails() {
        let big = vec![b'a'; 10_000];
        let compressed = gzip(&big);
        assert!(decode_payload(&compressed, 100).is_err());
    }

    #[test]
    fn truncated_gzip_fails() {
        let mut compressed = gzip(br#"{"c":3}"#);
        compressed.truncate(compressed.len() - 4);
        assert!(decode_payload(&compressed, 1024).is_err());
    }
}

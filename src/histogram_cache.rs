//! Schema fetch and caching (spec.md §4.3): revision keys map to parsed
//! `Histogram` schema sets, content-addressed by an MD5 digest so two
//! revisions that happen to serve byte-identical schemas share one parsed
//! copy. A revision that 404s is remembered as missing so it isn't
//! re-fetched on every subsequent record.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

use crate::error::FetchError;
use crate::histogram::Histogram;

/// Result of attempting to fetch one revision's schema bytes.
pub enum FetchOutcome {
    Ok(Vec<u8>),
    NotFound,
}

/// Network boundary between `HistogramCache` and wherever schema bytes
/// actually come from. Lets tests substitute a canned in-memory fetcher.
pub trait SchemaFetcher {
    fn fetch(&mut self, host: &str, port: u16, revision_key: &str) -> Result<FetchOutcome, FetchError>;
}

/// Fetches schema bytes over a plain HTTP/1.0 GET on a raw `TcpStream`.
/// The histogram server's protocol is one verb, no redirects, no chunked
/// transfer-encoding, `Connection: close` — a general-purpose HTTP client
/// buys nothing here that a direct socket read-to-EOF doesn't already give.
pub struct TcpSchemaFetcher;

impl SchemaFetcher for TcpSchemaFetcher {
    fn fetch(&mut self, host: &str, port: u16, revision_key: &str) -> Result<FetchOutcome, FetchError> {
        let mut stream = TcpStream::connect((host, port))?;
        let request = format!(
            "GET /histogram_buckets?revision={revision_key} HTTP/1.0\r\n\
             Host: {host}\r\n\
             Accept: */*\r\n\
             Connection: close\r\n\r\n"
        );
        stream.write_all(request.as_bytes())?;

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw)?;

        let Some(header_end) = find_header_end(&raw) else {
            return Ok(FetchOutcome::NotFound);
        };
        let status_line = String::from_utf8_lossy(&raw[..header_end]);
        let status_code = status_line.lines().next().and_then(parse_status_code);

        match status_code {
            Some(200) => Ok(FetchOutcome::Ok(raw[header_end + 4..].to_vec())),
            _ => Ok(FetchOutcome::NotFound),
        }
    }
}

fn find_header_end(raw: &[u8]) -> Option<usize> {
    raw.windows(4).position(|w| w == b"\r\n\r\n")
}

fn parse_status_code(status_line: &str) -> Option<u16> {
    status_line.split_whitespace().nth(1)?.parse().ok()
}

enum RevisionEntry {
    Found(Arc<Histogram>),
    Missing,
}

/// Two-map cache (spec.md §4.3): `by_digest` dedupes identical schema
/// bodies across revisions; `by_revision` remembers, per revision key,
/// whether a schema is known-present, known-missing, or not yet asked
/// about.
pub struct HistogramCache<F: SchemaFetcher> {
    host: String,
    port: u16,
    fetcher: F,
    by_digest: HashMap<[u8; 16], Arc<Histogram>>,
    by_revision: HashMap<String, RevisionEntry>,
}

impl<F: SchemaFetcher> HistogramCache<F> {
    pub fn new(host: impl Into<String>, port: u16, fetcher: F) -> Self {
        Self { host: host.into(), port, fetcher, by_digest: HashMap::new(), by_revision: HashMap::new() }
    }

    /// The last `/`-separated path segment of a revision URL, used as the
    /// cache key and the query parameter sent to the schema server.
    pub fn revision_key(revision_url: &str) -> &str {
        revision_url.rsplit('/').next().unwrap_or(revision_url)
    }

    /// Look up (fetching and parsing on a cache miss) the schema set for a
    /// submission's `info.revision` URL. Returns `None` if the URL isn't
    /// canonical, the schema couldn't be fetched, or it couldn't be
    /// parsed — none of those are retried differently from one another
    /// except that a confirmed-missing revision is remembered.
    pub fn find(&mut self, revision_url: &str) -> Option<Arc<Histogram>> {
        if !revision_url.starts_with("http") {
            return None;
        }

        let key = Self::revision_key(revision_url).to_string();
        if let Some(entry) = self.by_revision.get(&key) {
            return match entry {
                RevisionEntry::Found(hist) => Some(hist.clone()),
                RevisionEntry::Missing => None,
            };
        }

        match self.fetcher.fetch(&self.host, self.port, &key) {
            Ok(FetchOutcome::Ok(body)) => self.ingest(key, &body),
            Ok(FetchOutcome::NotFound) => {
                self.by_revision.insert(key, RevisionEntry::Missing);
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, revision = %key, "schema fetch failed");
                self.by_revision.insert(key, RevisionEntry::Missing);
                None
            }
        }
    }

    fn ingest(&mut self, key: String, body: &[u8]) -> Option<Arc<Histogram>> {
        let digest = md5::compute(body).0;
        if let Some(existing) = self.by_digest.get(&digest) {
            let hist = existing.clone();
            self.by_revision.insert(key, RevisionEntry::Found(hist.clone()));
            return Some(hist);
        }

        let parsed = serde_json::from_slice(body)
            .map_err(|e| tracing::warn!(error = %e, revision = %key, "schema body is not valid JSON"))
            .ok()
            .and_then(|v| Histogram::parse(&v).map_err(|e| tracing::warn!(error = %e, revision = %key, "schema is malformed")).ok());

        match parsed {
            Some(hist) => {
                let hist = Arc::new(hist);
                self.by_digest.insert(digest, hist.clone());
                self.by_revision.insert(key, RevisionEntry::Found(hist.clone()));
                Some(hist)
            }
            None => {
                // Parse failures are not negatively cached: a corrected
                // schema at the same revision key should be picked up
                // on the next attempt.
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct MapFetcher {
        responses: HashMap<String, Vec<u8>>,
        calls: Rc<RefCell<u32>>,
    }

    impl SchemaFetcher for MapFetcher {
        fn fetch(&mut self, _host: &str, _port: u16, revision_key: &str) -> Result<FetchOutcome, FetchError> {
            *self.calls.borrow_mut() += 1;
            match self.responses.get(revision_key) {
                Some(body) => Ok(FetchOutcome::Ok(body.clone())),
                None => Ok(FetchOutcome::NotFound),
            }
        }
    }

    fn schema_bytes() -> Vec<u8> {
        br#"{"histograms":{"GC_MS":{"kind":"4","min":1,"max":100,"bucket_count":2,"buckets":[0,1]}}}"#.to_vec()
    }

    #[test]
    fn fetches_and_caches_by_revision() {
        let calls = Rc::new(RefCell::new(0));
        let mut responses = HashMap::new();
        responses.insert("abc123".to_string(), schema_bytes());
        let fetcher = MapFetcher { responses, calls: calls.clone() };
        let mut cache = HistogramCache::new("schema.example", 80, fetcher);

        let first = cache.find("http://schema.example/revisions/abc123");
        assert!(first.is_some());
        let second = cache.find("http://schema.example/revisions/abc123");
        assert!(second.is_some());
        assert_eq!(*calls.borrow(), 1, "second lookup should be served from cache");
    }

    #[test]
    fn dedupes_identical_bodies_across_revisions() {
        let calls = Rc::new(RefCell::new(0));
        let mut responses = HashMap::new();
        responses.insert("rev-a".to_string(), schema_bytes());
        responses.insert("rev-b".to_string(), schema_bytes());
        let fetcher = MapFetcher { responses, calls };
        let mut cache = HistogramCache::new("schema.example", 80, fetcher);

        let a = cache.find("http://schema.example/revisions/rev-a").unwrap();
        let b = cache.find("http://schema.example/revisions/rev-b").unwrap();
        assert!(Arc::ptr_eq(&a, &b), "identical schema bodies should share one parsed Histogram");
    }

    #[test]
    fn negative_cache_avoids_repeat_fetches() {
        let calls = Rc::new(RefCell::new(0));
        let fetcher = MapFetcher { responses: HashMap::new(), calls: calls.clone() };
        let mut cache = HistogramCache::new("schema.example", 80, fetcher);

        assert!(cache.find("http://schema.example/revisions/missing").is_none());
        assert!(cache.find("http://schema.example/revisions/missing").is_none());
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn non_canonical_revision_url_short_circuits() {
        let calls = Rc::new(RefCell::new(0));
        let fetcher = MapFetcher { responses: HashMap::new(), calls: calls.clone() };
        let mut cache = HistogramCache::new("schema.example", 80, fetcher);

        assert!(cache.find("file:///local/schema.json").is_none());
        assert_eq!(*calls.borrow(), 0, "no network I/O for a non-http revision url");
    }

    #[test]
    fn revision_key_is_last_path_segment() {
        assert_eq!(HistogramCache::<TcpSchemaFetcher>::revision_key("http://x/y/z/rev42"), "rev42");
        assert_eq!(HistogramCache::<TcpSchemaFetcher>::revision_key("rev42"), "rev42");
    }
}

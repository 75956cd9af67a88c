//! Histogram rewriting (spec.md §4.4): expands a submission's compact
//! `histograms` object — bucket lower bound → count — into fixed-length
//! arrays indexed by bucket position, with five trailing summary fields.

use serde_json::Value;

use crate::histogram::{Histogram, HistogramDefinition};
use crate::histogram_cache::{HistogramCache, SchemaFetcher};

/// Trailing summary fields appended after the bucket counts, in this order.
const SUMMARY_FIELDS: [&str; 5] = ["sum", "log_sum", "log_sum_squares", "sum_squares_lo", "sum_squares_hi"];

/// What happened to one submission document.
#[derive(Debug, PartialEq, Eq)]
pub enum ConversionOutcome {
    /// `ver == 1` on input; histograms were rewritten and `ver` set to `2`.
    Converted,
    /// `ver == 2` on input already; left untouched (spec.md's documented
    /// legacy no-op case — not re-validated or re-converted).
    NoOp,
    /// Conversion could not proceed; `ver` was set to `-1`.
    Failed,
}

/// Convert `doc` in place against the schema resolved from its
/// `info.revision` field, using `cache` to fetch/parse the schema.
pub fn convert<F: SchemaFetcher>(doc: &mut Value, cache: &mut HistogramCache<F>) -> ConversionOutcome {
    match doc.get("ver").and_then(Value::as_i64) {
        Some(2) => return ConversionOutcome::NoOp,
        Some(1) => {}
        _ => {
            set_ver(doc, -1);
            return ConversionOutcome::Failed;
        }
    }

    let revision = doc.get("info").and_then(|info| info.get("revision")).and_then(Value::as_str).map(str::to_string);
    let Some(revision) = revision else {
        set_ver(doc, -1);
        return ConversionOutcome::Failed;
    };

    let schema = match cache.find(&revision) {
        Some(schema) => schema,
        None => {
            tracing::warn!(revision = %revision, "no histogram schema available for revision");
            set_ver(doc, -1);
            return ConversionOutcome::Failed;
        }
    };

    let has_histograms_obj = doc.get("histograms").map(|v| v.is_object()).unwrap_or(false);
    if !has_histograms_obj {
        set_ver(doc, -1);
        return ConversionOutcome::Failed;
    }
    let histograms = doc.get_mut("histograms").expect("checked above");

    match rewrite_histograms(histograms, &schema) {
        Ok(()) => {
            set_ver(doc, 2);
            ConversionOutcome::Converted
        }
        Err(()) => {
            set_ver(doc, -1);
            ConversionOutcome::Failed
        }
    }
}

fn set_ver(doc: &mut Value, v: i64) {
    if let Some(obj) = doc.as_object_mut() {
        obj.insert("ver".to_string(), Value::from(v));
    }
}

/// Rewrite every histogram entry in place. Returns `Err(())` on a
/// record-fatal condition (spec.md §4.4: `BadBucketLowerBound` and
/// malformed entry shapes); an unknown histogram name is left as-is and
/// is not fatal.
fn rewrite_histograms(histograms: &mut Value, schema: &Histogram) -> Result<(), ()> {
    let obj = histograms.as_object_mut().ok_or(())?;
    let names: Vec<String> = obj.keys().cloned().collect();

    for name in names {
        let resolved = resolve_definition(schema, &name);
        let Some((target_name, definition)) = resolved else {
            tracing::debug!(histogram = %name, "unknown histogram name, leaving unconverted");
            continue;
        };

        let submission = obj.get(&name).cloned().ok_or(())?;
        let array = build_bucket_array(&submission, definition)?;

        obj.remove(&name);
        obj.insert(target_name, Value::Array(array.into_iter().map(Value::from).collect()));
    }

    Ok(())
}

/// Resolve a submitted histogram name against the schema, falling back to
/// the name with a `STARTUP_` prefix stripped when (and only when) the
/// full name isn't found and the name actually starts with `STARTUP_`.
fn resolve_definition<'a>(schema: &'a Histogram, name: &str) -> Option<(String, &'a HistogramDefinition)> {
    if let Some(def) = schema.get(name) {
        return Some((name.to_string(), def));
    }
    let stripped = name.strip_prefix("STARTUP_")?;
    schema.get(stripped).map(|def| (stripped.to_string(), def))
}

fn build_bucket_array(submission: &Value, definition: &HistogramDefinition) -> Result<Vec<f64>, ()> {
    let bucket_count = definition.bucket_count() as usize;
    let mut out = vec![0.0f64; bucket_count + SUMMARY_FIELDS.len()];

    let values = submission.get("values").and_then(Value::as_object).ok_or(())?;
    for (key, count) in values {
        let lower_bound: i64 = key.parse().map_err(|_| ())?;
        let count = count.as_i64().ok_or(())?;
        let index = definition.index_for(lower_bound).ok_or(())?; // BadBucketLowerBound
        out[index] = count as f64;
    }

    for (i, field) in SUMMARY_FIELDS.iter().enumerate() {
        out[bucket_count + i] = submission.get(*field).and_then(Value::as_f64).unwrap_or(-1.0);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram_cache::FetchOutcome;
    use crate::error::FetchError;
    use serde_json::json;
    use std::collections::HashMap;

    struct StaticFetcher(HashMap<String, Vec<u8>>);

    impl SchemaFetcher for StaticFetcher {
        fn fetch(&mut self, _host: &str, _port: u16, key: &str) -> Result<FetchOutcome, FetchError> {
            match self.0.get(key) {
                Some(body) => Ok(FetchOutcome::Ok(body.clone())),
                None => Ok(FetchOutcome::NotFound),
            }
        }
    }

    fn cache_with_schema() -> HistogramCache<StaticFetcher> {
        let schema = br#"{"histograms":{"GC_MS":{"kind":"4","min":1,"max":1000,"bucket_count":3,"buckets":[0,1,2]}}}"#;
        let mut responses = HashMap::new();
        responses.insert("rev1".to_string(), schema.to_vec());
        HistogramCache::new("schema.example", 80, StaticFetcher(responses))
    }

    #[test]
    fn converts_ver_one_submission() {
        let mut doc = json!({
            "ver": 1,
            "info": { "revision": "http://schema.example/rev1" },
            "histograms": {
                "GC_MS": { "values": { "0": 5, "1": 2 }, "sum": 12.0 }
            }
        });
        let mut cache = cache_with_schema();
        let outcome = convert(&mut doc, &mut cache);
        assert_eq!(outcome, ConversionOutcome::Converted);
        assert_eq!(doc["ver"], 2);
        let arr = doc["histograms"]["GC_MS"].as_array().unwrap();
        assert_eq!(arr.len(), 3 + 5);
        assert_eq!(arr[0], 5.0);
        assert_eq!(arr[1], 2.0);
        assert_eq!(arr[2], 0.0);
        assert_eq!(arr[3], 12.0); // sum
        assert_eq!(arr[4], -1.0); // log_sum missing
    }

    #[test]
    fn ver_two_is_noop() {
        let mut doc = json!({ "ver": 2, "histograms": { "whatever": [1, 2, 3] } });
        let mut cache = cache_with_schema();
        let outcome = convert(&mut doc, &mut cache);
        assert_eq!(outcome, ConversionOutcome::NoOp);
        assert_eq!(doc["histograms"]["whatever"], json!([1, 2, 3]));
    }

    #[test]
    fn unknown_revision_fails() {
        let mut doc = json!({
            "ver": 1,
            "info": { "revision": "http://schema.example/missing" },
            "histograms": {}
        });
        let mut cache = cache_with_schema();
        assert_eq!(convert(&mut doc, &mut cache), ConversionOutcome::Failed);
        assert_eq!(doc["ver"], -1);
    }

    #[test]
    fn bad_bucket_lower_bound_fails_whole_record() {
        let mut doc = json!({
            "ver": 1,
            "info": { "revision": "http://schema.example/rev1" },
            "histograms": {
                "GC_MS": { "values": { "999": 1 } }
            }
        });
        let mut cache = cache_with_schema();
        assert_eq!(convert(&mut doc, &mut cache), ConversionOutcome::Failed);
        assert_eq!(doc["ver"], -1);
    }

    #[test]
    fn startup_prefix_fallback_only_when_full_name_misses() {
        let mut doc = json!({
            "ver": 1,
            "info": { "revision": "http://schema.example/rev1" },
            "histograms": {
                "STARTUP_GC_MS": { "values": { "0": 1 } }
            }
        });
        let mut cache = cache_with_schema();
        assert_eq!(convert(&mut doc, &mut cache), ConversionOutcome::Converted);
        assert!(doc["histograms"].get("GC_MS").is_some());
        assert!(doc["histograms"].get("STARTUP_GC_MS").is_none());
    }

    #[test]
    fn unknown_histogram_name_is_left_unconverted_not_fatal() {
        let mut doc = json!({
            "ver": 1,
            "info": { "revision": "http://schema.example/rev1" },
            "histograms": {
                "NOT_A_REAL_HISTOGRAM": { "values": { "0": 1 } }
            }
        });
        let mut cache = cache_with_schema();
        assert_eq!(convert(&mut doc, &mut cache), ConversionOutcome::Converted);
        assert_eq!(doc["histograms"]["NOT_A_REAL_HISTOGRAM"], json!({ "values": { "0": 1 } }));
    }
}

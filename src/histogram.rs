//! Histogram schema shapes (spec.md §4.2): a `HistogramDefinition` maps a
//! bucket's declared lower bound to its positional index; a `Histogram` is
//! a named set of those definitions, as parsed from one schema JSON file.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::SchemaError;

/// One histogram's shape: kind, range, and the lower-bound → index map.
#[derive(Debug, Clone)]
pub struct HistogramDefinition {
    pub kind: i64,
    pub min: i64,
    pub max: i64,
    bucket_count: i64,
    buckets: HashMap<i64, usize>,
}

impl HistogramDefinition {
    fn parse(value: &Value) -> Result<Self, SchemaError> {
        let kind = value
            .get("kind")
            .and_then(Value::as_str)
            .ok_or_else(|| SchemaError::BadSchema("kind element is missing".into()))?
            .parse::<i64>()
            .map_err(|_| SchemaError::BadSchema("kind element is not an integer".into()))?;
        let min = value
            .get("min")
            .and_then(Value::as_i64)
            .ok_or_else(|| SchemaError::BadSchema("min element is missing".into()))?;
        let max = value
            .get("max")
            .and_then(Value::as_i64)
            .ok_or_else(|| SchemaError::BadSchema("max element is missing".into()))?;
        let bucket_count = value
            .get("bucket_count")
            .and_then(Value::as_i64)
            .ok_or_else(|| SchemaError::BadSchema("bucket_count element is missing".into()))?;
        let bucket_values = value
            .get("buckets")
            .and_then(Value::as_array)
            .ok_or_else(|| SchemaError::BadSchema("buckets element must be an array".into()))?;

        if bucket_values.len() as i64 != bucket_count {
            return Err(SchemaError::LengthMismatch { declared: bucket_count, actual: bucket_values.len() });
        }

        let mut buckets = HashMap::with_capacity(bucket_values.len());
        for (index, b) in bucket_values.iter().enumerate() {
            let lower_bound = b
                .as_i64()
                .ok_or_else(|| SchemaError::BadSchema("buckets element must be an integer".into()))?;
            buckets.insert(lower_bound, index);
        }

        Ok(Self { kind, min, max, bucket_count, buckets })
    }

    /// Index of the bucket whose declared lower bound is `lower_bound`, or
    /// `None` if no such bucket exists in this definition.
    pub fn index_for(&self, lower_bound: i64) -> Option<usize> {
        self.buckets.get(&lower_bound).copied()
    }

    pub fn bucket_count(&self) -> i64 {
        self.bucket_count
    }
}

/// A named set of histogram definitions, parsed from a schema file's
/// top-level `histograms` object.
#[derive(Debug, Clone, Default)]
pub struct Histogram {
    definitions: HashMap<String, HistogramDefinition>,
}

impl Histogram {
    pub fn parse(value: &Value) -> Result<Self, SchemaError> {
        let histograms = value
            .get("histograms")
            .ok_or_else(|| SchemaError::BadSchema("histograms element is missing".into()))?;
        let object = histograms.as_object().ok_or(SchemaError::NotAnObject)?;

        let mut definitions = HashMap::with_capacity(object.len());
        for (name, def) in object {
            definitions.insert(name.clone(), HistogramDefinition::parse(def)?);
        }
        Ok(Self { definitions })
    }

    pub fn get(&self, name: &str) -> Option<&HistogramDefinition> {
        self.definitions.get(name)
    }
}

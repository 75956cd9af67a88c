//! Output partitioning (spec.md §4.5): an ordered list of dimensions turns
//! a converted record's metadata into a filesystem path, one segment per
//! dimension, falling back to `"other"` on a predicate miss.

use std::collections::HashSet;
use std::path::PathBuf;

use serde_json::Value;

use crate::error::SchemaError;

const OTHER_SEGMENT: &str = "other";

/// A dimension's allowed-value predicate.
#[derive(Debug, Clone)]
pub enum Dimension {
    /// A single allowed string, or `"*"` to accept anything.
    Value(String),
    /// A finite set of allowed strings.
    Set(HashSet<String>),
    /// An inclusive numeric range.
    Range(f64, f64),
}

#[derive(Debug, Clone)]
struct DimensionField {
    field_name: String,
    dimension: Dimension,
}

/// An ordered set of dimensions, parsed from a schema file's `dimensions`
/// array, used to build one path per record.
#[derive(Debug, Clone)]
pub struct DimensionSchema {
    pub version: i64,
    fields: Vec<DimensionField>,
}

impl DimensionSchema {
    pub fn parse(value: &Value) -> Result<Self, SchemaError> {
        let version = value
            .get("version")
            .and_then(Value::as_i64)
            .ok_or_else(|| SchemaError::BadSchema("version element is missing".into()))?;
        let dims = value
            .get("dimensions")
            .and_then(Value::as_array)
            .ok_or_else(|| SchemaError::BadSchema("dimensions element must be an array".into()))?;

        let mut fields = Vec::with_capacity(dims.len());
        for d in dims {
            let field_name = d
                .get("field_name")
                .and_then(Value::as_str)
                .ok_or_else(|| SchemaError::BadSchema("missing field_name element".into()))?
                .to_string();
            let allowed = d
                .get("allowed_values")
                .ok_or_else(|| SchemaError::BadSchema("missing allowed_values element".into()))?;

            let dimension = match allowed {
                Value::String(s) => Dimension::Value(s.clone()),
                Value::Array(values) => {
                    let mut set = HashSet::with_capacity(values.len());
                    for v in values {
                        let s = v.as_str().ok_or_else(|| SchemaError::BadSchema("allowed_values must be strings".into()))?;
                        set.insert(s.to_string());
                    }
                    Dimension::Set(set)
                }
                Value::Object(_) => {
                    let min = allowed
                        .get("min")
                        .and_then(Value::as_f64)
                        .ok_or_else(|| SchemaError::BadSchema("allowed_values range is missing min".into()))?;
                    let max = allowed
                        .get("max")
                        .and_then(Value::as_f64)
                        .ok_or_else(|| SchemaError::BadSchema("allowed_values range is missing max".into()))?;
                    Dimension::Range(min, max)
                }
                _ => return Err(SchemaError::BadSchema("invalid allowed_values element".into())),
            };

            fields.push(DimensionField { field_name, dimension });
        }

        Ok(Self { version, fields })
    }

    /// Build the partition path for one record's metadata, one path
    /// segment per dimension in schema order.
    pub fn path_for(&self, metadata: &Value) -> PathBuf {
        let mut path = PathBuf::new();
        for field in &self.fields {
            let segment = match (metadata.get(&field.field_name), &field.dimension) {
                (Some(Value::String(s)), Dimension::Value(allowed)) => {
                    if allowed == "*" || allowed == s {
                        sanitize(s)
                    } else {
                        OTHER_SEGMENT.to_string()
                    }
                }
                (Some(Value::String(s)), Dimension::Set(set)) => {
                    if set.contains(s.as_str()) {
                        sanitize(s)
                    } else {
                        OTHER_SEGMENT.to_string()
                    }
                }
                (Some(Value::Number(n)), Dimension::Range(min, max)) => match n.as_f64() {
                    Some(d) if d >= *min && d <= *max => format_number(d),
                    Some(_) => OTHER_SEGMENT.to_string(),
                    None => OTHER_SEGMENT.to_string(),
                },
                (Some(_), _) => {
                    tracing::debug!(field = %field.field_name, "dimension value type mismatch, skipping segment");
                    continue;
                }
                (None, _) => continue,
            };
            path.push(segment);
        }
        path
    }
}

/// Replace any byte outside `[A-Za-z0-9_./]` with `_`.
fn sanitize(s: &str) -> String {
    s.bytes()
        .map(|b| if b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'/') { b as char } else { '_' })
        .collect()
}

fn format_number(d: f64) -> String {
    if d.fract() == 0.0 && d.abs() < 1e15 {
        format!("{}", d as i64)
    } else {
        format!("{d}")
    }
}

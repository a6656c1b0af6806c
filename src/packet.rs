//! Typed field access over raw packet mappings.
//!
//! Packets arrive from the retrieval layer as JSON objects whose numeric
//! fields may be encoded as numbers or as decimal strings, depending on the
//! store they were fetched from. [`RawPacket`] wraps one such object and
//! offers accessors that normalise both encodings to `f64`/`i64`, reporting
//! the offending key when a field is absent or unreadable.

use crate::error::{PipelineError, PipelineResult};
use serde_json::{Map, Value};

/// A borrowed view over one raw packet mapping.
#[derive(Clone, Copy, Debug)]
pub struct RawPacket<'a> {
    fields: &'a Map<String, Value>,
}

impl<'a> RawPacket<'a> {
    /// Wraps a JSON value, failing unless it is an object.
    pub fn new(value: &'a Value) -> PipelineResult<Self> {
        match value.as_object() {
            Some(fields) => Ok(Self { fields }),
            None => Err(PipelineError::PacketNotObject),
        }
    }

    /// Returns the device identifier (`id`).
    pub fn device_id(&self) -> PipelineResult<String> {
        let value = self.required("id")?;
        match value {
            Value::String(s) => Ok(s.clone()),
            other => Err(malformed("id", other, "expected a string")),
        }
    }

    /// Reads a required numeric field.
    pub fn f64_field(&self, key: &str) -> PipelineResult<f64> {
        number_from(self.required(key)?, key)
    }

    /// Reads an optional numeric field, falling back to `default`.
    pub fn f64_field_or(&self, key: &str, default: f64) -> PipelineResult<f64> {
        match self.fields.get(key) {
            Some(Value::Null) | None => Ok(default),
            Some(value) => number_from(value, key),
        }
    }

    /// Reads a required integer field (truncating a fractional encoding).
    pub fn i64_field(&self, key: &str) -> PipelineResult<i64> {
        Ok(number_from(self.required(key)?, key)? as i64)
    }

    /// Reads an optional integer field, falling back to `default`.
    pub fn i64_field_or(&self, key: &str, default: i64) -> PipelineResult<i64> {
        match self.fields.get(key) {
            Some(Value::Null) | None => Ok(default),
            Some(value) => Ok(number_from(value, key)? as i64),
        }
    }

    /// Reads a required flat numeric sample array.
    pub fn samples(&self, key: &str) -> PipelineResult<Vec<f64>> {
        samples_from(self.required(key)?, key)
    }

    /// Reads an optional sample array, falling back to empty.
    pub fn samples_or_empty(&self, key: &str) -> PipelineResult<Vec<f64>> {
        match self.fields.get(key) {
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(value) => samples_from(value, key),
        }
    }

    /// Reads a sample array only when the field is actually an array; any
    /// other encoding (absent, null, scalar) reads as `None`. Elements of a
    /// present array must still parse.
    pub fn samples_if_array(&self, key: &str) -> PipelineResult<Option<Vec<f64>>> {
        match self.fields.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| number_from(item, key))
                .collect::<PipelineResult<Vec<f64>>>()
                .map(Some),
            _ => Ok(None),
        }
    }

    fn required(&self, key: &str) -> PipelineResult<&'a Value> {
        match self.fields.get(key) {
            Some(value) if !value.is_null() => Ok(value),
            _ => Err(PipelineError::MissingField(key.to_string())),
        }
    }
}

fn number_from(value: &Value, key: &str) -> PipelineResult<f64> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| malformed(key, value, "number is not representable as f64")),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| malformed(key, value, "string is not a decimal number")),
        other => Err(malformed(key, other, "expected a number")),
    }
}

fn samples_from(value: &Value, key: &str) -> PipelineResult<Vec<f64>> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| number_from(item, key))
            .collect::<PipelineResult<Vec<f64>>>(),
        other => Err(malformed(key, other, "expected an array of numbers")),
    }
}

fn malformed(key: &str, value: &Value, reason: &str) -> PipelineError {
    PipelineError::MalformedField {
        field: key.to_string(),
        reason: format!("{reason} (got {value})"),
    }
}

//! Output rendering: canonical records to caller-requested shapes.
//!
//! Every vector field is held internally as an ordered `Vec<TimePoint>`; the
//! renderer re-expresses each one in the requested external shape without
//! re-deriving any numeric value. Shapes:
//!
//! - `map`: object keyed by a zero-left-padded decimal string of the
//!   timestamp/frequency, lexically sortable and therefore chronological;
//! - `tuple_array`: array of `[index, value]` pairs;
//! - `dict_array`: array of `{index-label: .., value-label: ..}` objects;
//! - `combined_tuple` / `combined_dict`: the fixed axis groups (accel xyz,
//!   gyro xyz, analog-in ab, spectral xyz) merged row-wise, one shared index
//!   plus one value per axis. A group whose members are absent or
//!   length-misaligned falls back to individual fields in the sub-format.
//!
//! All object keys are emitted in sorted order for determinism.

use crate::error::PipelineError;
use crate::record::{CanonicalRecord, TimePoint};
use chrono::{SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::str::FromStr;

/// The closed set of output shapes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Mapping keyed by padded decimal index strings.
    Map,
    /// Array of `[index, value]` pairs.
    TupleArray,
    /// Array of labeled point objects (the canonical external shape).
    DictArray,
    /// Axis groups combined into rows of `[index, v1, v2, ..]`.
    CombinedTuple,
    /// Axis groups combined into rows of `{index-label, axis-label: v, ..}`.
    CombinedDict,
}

impl OutputFormat {
    /// The wire selector for this format.
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Map => "map",
            OutputFormat::TupleArray => "tuple_array",
            OutputFormat::DictArray => "dict_array",
            OutputFormat::CombinedTuple => "combined_tuple",
            OutputFormat::CombinedDict => "combined_dict",
        }
    }

    /// The per-field shape used for fields outside a combined group.
    fn sub_format(self) -> OutputFormat {
        match self {
            OutputFormat::CombinedTuple => OutputFormat::TupleArray,
            OutputFormat::CombinedDict => OutputFormat::DictArray,
            other => other,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "map" => Ok(OutputFormat::Map),
            "tuple_array" => Ok(OutputFormat::TupleArray),
            "dict_array" => Ok(OutputFormat::DictArray),
            "combined_tuple" => Ok(OutputFormat::CombinedTuple),
            "combined_dict" => Ok(OutputFormat::CombinedDict),
            other => Err(PipelineError::UnknownFormat(other.to_string())),
        }
    }
}

/// Whether packet metadata accompanies the rendered fields.
///
/// Unmerged output keeps sequence/rate/scale and gains a `datetime` string;
/// merged output strips them, matching the hour-merge contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetaPolicy {
    /// Emit `time`, `seq`, `odr`, `scale`, and a derived `datetime`.
    Full,
    /// Emit only the device id and the data fields.
    Stripped,
}

/// Per-field rendering parameters: index/value labels, key pad width, and
/// the optional prefix mode used by the trailing wind average in `map` form.
struct FieldSchema {
    index_label: &'static str,
    value_label: &'static str,
    pad: usize,
    prefix: Option<&'static str>,
}

fn schema_for(field: &str) -> FieldSchema {
    if field == "w_s_avg" {
        FieldSchema {
            index_label: "time",
            value_label: "val",
            pad: 0,
            prefix: Some("w_s_avg_"),
        }
    } else if field.starts_with("fft") {
        FieldSchema {
            index_label: "freq",
            value_label: "val",
            pad: 3,
            prefix: None,
        }
    } else {
        FieldSchema {
            index_label: "time",
            value_label: "val",
            pad: 5,
            prefix: None,
        }
    }
}

/// A fixed axis group eligible for combined rendering.
struct AxisGroup {
    name: &'static str,
    members: &'static [&'static str],
    labels: &'static [&'static str],
}

const AXIS_GROUPS: &[AxisGroup] = &[
    AxisGroup {
        name: "acc",
        members: &["acc_x", "acc_y", "acc_z"],
        labels: &["x", "y", "z"],
    },
    AxisGroup {
        name: "gyr",
        members: &["gyr_x", "gyr_y", "gyr_z"],
        labels: &["x", "y", "z"],
    },
    AxisGroup {
        name: "ain",
        members: &["ain_a", "ain_b"],
        labels: &["a", "b"],
    },
    AxisGroup {
        name: "fft",
        members: &["fft_x", "fft_y", "fft_z"],
        labels: &["x", "y", "z"],
    },
];

/// Renders one record into the requested shape, with top-level keys sorted.
pub fn render_record(rec: &CanonicalRecord, format: OutputFormat, meta: MetaPolicy) -> Value {
    let mut fields: BTreeMap<String, Value> = BTreeMap::new();

    fields.insert("id".into(), Value::String(rec.device_id.clone()));
    if meta == MetaPolicy::Full {
        fields.insert("time".into(), json!(rec.anchor_ms));
        fields.insert("scale".into(), json_number(rec.scale));
        fields.insert("odr".into(), json_number(rec.odr));
        if let Some(seq) = rec.seq {
            fields.insert("seq".into(), json!(seq));
        }
        // Axis codes travel as strings on the wire.
        if let Some(axis) = rec.axis {
            fields.insert("axis".into(), Value::String(axis.to_string()));
        }
        fields.insert("datetime".into(), Value::String(datetime_string(rec.anchor_ms)));
    }

    for (name, value) in &rec.scalars {
        fields.insert(name.clone(), json_number(*value));
    }

    let mut grouped: Vec<&str> = Vec::new();
    if matches!(
        format,
        OutputFormat::CombinedTuple | OutputFormat::CombinedDict
    ) {
        for group in AXIS_GROUPS {
            if let Some(rows) = render_group(rec, group, format) {
                fields.insert(group.name.to_string(), rows);
                grouped.extend(group.members);
            }
        }
    }

    let sub_format = format.sub_format();
    for (name, points) in &rec.vectors {
        if grouped.contains(&name.as_str()) {
            continue;
        }
        fields.insert(name.clone(), render_series(points, &schema_for(name), sub_format));
    }

    Value::Object(fields.into_iter().collect::<Map<String, Value>>())
}

/// Renders one vector field in a non-combined shape.
fn render_series(points: &[TimePoint], schema: &FieldSchema, format: OutputFormat) -> Value {
    match format {
        OutputFormat::Map => {
            let mut map = BTreeMap::new();
            for (i, point) in points.iter().enumerate() {
                let key = match schema.prefix {
                    // Prefix mode keys by the slot index, not the timestamp.
                    Some(prefix) => format!("{prefix}{i}"),
                    None => padded_decimal(point.timestamp, schema.pad),
                };
                map.insert(key, json_number(point.value));
            }
            Value::Object(map.into_iter().collect::<Map<String, Value>>())
        }
        OutputFormat::TupleArray => Value::Array(
            points
                .iter()
                .map(|p| json!([p.timestamp, p.value]))
                .collect(),
        ),
        _ => Value::Array(
            points
                .iter()
                .map(|p| {
                    let mut row = Map::new();
                    row.insert(schema.index_label.to_string(), json_number(p.timestamp));
                    row.insert(schema.value_label.to_string(), json_number(p.value));
                    Value::Object(row)
                })
                .collect(),
        ),
    }
}

/// Renders a combined axis group, or `None` when the group's members are not
/// all present and length-aligned (the caller then falls back to individual
/// fields).
fn render_group(rec: &CanonicalRecord, group: &AxisGroup, format: OutputFormat) -> Option<Value> {
    let members: Vec<&Vec<TimePoint>> = group
        .members
        .iter()
        .map(|name| rec.vectors.get(*name))
        .collect::<Option<Vec<_>>>()?;

    let len = members[0].len();
    if members.iter().any(|points| points.len() != len) {
        return None;
    }

    let index_label = schema_for(group.members[0]).index_label;
    let rows = (0..len)
        .map(|i| {
            let index = members[0][i].timestamp;
            if format == OutputFormat::CombinedTuple {
                let mut row = vec![json_number(index)];
                row.extend(members.iter().map(|points| json_number(points[i].value)));
                Value::Array(row)
            } else {
                let mut row = Map::new();
                row.insert(index_label.to_string(), json_number(index));
                for (label, points) in group.labels.iter().zip(&members) {
                    row.insert((*label).to_string(), json_number(points[i].value));
                }
                Value::Object(row)
            }
        })
        .collect();
    Some(Value::Array(rows))
}

/// Encodes an index value as a decimal string with the integer part
/// left-padded with zeros, so lexical order matches numeric order for
/// non-negative values of equal magnitude class.
pub fn padded_decimal(value: f64, pad: usize) -> String {
    let mut s = format!("{value}");
    let negative = s.starts_with('-');
    if negative {
        s.remove(0);
    }
    if !s.contains('.') {
        s.push_str(".0");
    }
    let dot = s.find('.').unwrap_or(s.len());
    let mut out = String::with_capacity(s.len() + pad + 1);
    if negative {
        out.push('-');
    }
    for _ in dot..pad {
        out.push('0');
    }
    out.push_str(&s);
    out
}

/// ISO-8601 UTC string for a millisecond timestamp.
pub fn datetime_string(timestamp_ms: i64) -> String {
    match Utc.timestamp_millis_opt(timestamp_ms).single() {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        None => String::new(),
    }
}

fn json_number(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

//! Canonical in-memory representation of decoded telemetry.
//!
//! A [`CanonicalRecord`] is the decoded form of one raw packet: physically
//! scaled values with reconstructed per-sample timestamps. Every later stage
//! (correction, merging, rendering) operates on this shape; nothing after the
//! decoders re-derives a numeric value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single reconstructed sample: a (timestamp, value) pair.
///
/// `timestamp` is milliseconds since the Unix epoch for time-domain channels.
/// Spectral channels reuse the field to carry the bin frequency in Hz; the
/// renderer labels it accordingly, so the overload never leaks to callers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimePoint {
    /// Sample timestamp in ms (or bin frequency in Hz for spectral data).
    pub timestamp: f64,
    /// Physically scaled sample value.
    pub value: f64,
}

impl TimePoint {
    /// Creates a point from a timestamp/value pair.
    pub fn new(timestamp: f64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// The decoded form of one packet.
///
/// Vector fields hold chronologically ordered samples (strictly increasing
/// timestamps by construction). A record owns its vectors exclusively; the
/// corrector relies on this when it shifts timestamps in place.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// Device identifier the packet was reported for.
    pub device_id: String,
    /// Packet anchor time in ms: the timestamp of the last contained sample.
    pub anchor_ms: i64,
    /// Scale factor as decoded/derived for this topic.
    pub scale: f64,
    /// Sampling rate in Hz.
    pub odr: f64,
    /// Packet sequence number, 1-based. Absent for topics that do not carry one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<i64>,
    /// Spectral axis code (0/1/2) carried until hour-merge recombination.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub axis: Option<i64>,
    /// Named scalar fields (aggregate-topic quantities).
    pub scalars: BTreeMap<String, f64>,
    /// Named vector fields, each an ordered sample sequence.
    pub vectors: BTreeMap<String, Vec<TimePoint>>,
}

impl CanonicalRecord {
    /// Creates an empty record with the shared packet metadata filled in.
    pub fn new(device_id: String, anchor_ms: i64, scale: f64, odr: f64) -> Self {
        Self {
            device_id,
            anchor_ms,
            scale,
            odr,
            seq: None,
            axis: None,
            scalars: BTreeMap::new(),
            vectors: BTreeMap::new(),
        }
    }

    /// Shifts the record anchor and every contained sample by `offset_ms`.
    ///
    /// Internal relative spacing is preserved; the corrector uses this to
    /// repair a mis-timestamped packet atomically before the next comparison
    /// reads it.
    pub fn shift_ms(&mut self, offset_ms: i64) {
        self.anchor_ms += offset_ms;
        for points in self.vectors.values_mut() {
            for point in points.iter_mut() {
                point.timestamp += offset_ms as f64;
            }
        }
    }
}

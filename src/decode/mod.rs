//! Per-topic packet decoders.
//!
//! Each supported topic is one variant of [`Topic`], and decoding dispatches
//! to one decode function per variant: the high-frequency motion channels
//! (accelerometer, gyroscope, analog input) share the interleaved fan-out in
//! [`motion`], frequency-domain snapshots decode in [`spectral`], and the
//! fixed-interval summary packets decode in [`aggregate`].
//!
//! Decoding is all-or-nothing per batch: the first malformed packet aborts
//! with a [`PipelineError`](crate::error::PipelineError) naming the offending
//! field, so callers can tell "no data in range" from "bad data".

pub mod aggregate;
pub mod motion;
pub mod spectral;

use crate::error::{PipelineError, PipelineResult};
use crate::packet::RawPacket;
use crate::record::CanonicalRecord;
use log::debug;
use serde_json::Value;
use std::str::FromStr;

/// The closed set of packet topics this pipeline understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topic {
    /// 3-axis accelerometer batches (`acc`).
    Accel,
    /// 3-axis gyroscope batches (`gyr`).
    Gyro,
    /// 2-channel analog input batches (`ain`).
    AnalogIn,
    /// Single-axis frequency-domain snapshots (`fft`).
    Spectral,
    /// Fixed-interval aggregated summaries (`data`).
    Aggregate,
}

impl Topic {
    /// The wire identifier for this topic.
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Accel => "acc",
            Topic::Gyro => "gyr",
            Topic::AnalogIn => "ain",
            Topic::Spectral => "fft",
            Topic::Aggregate => "data",
        }
    }

    /// Whether packets of this topic carry a high-frequency time-domain
    /// sample stream. Timestamp correction only applies to these.
    pub fn is_high_frequency(self) -> bool {
        matches!(self, Topic::Accel | Topic::Gyro | Topic::AnalogIn)
    }
}

impl FromStr for Topic {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "acc" => Ok(Topic::Accel),
            "gyr" => Ok(Topic::Gyro),
            "ain" => Ok(Topic::AnalogIn),
            "fft" => Ok(Topic::Spectral),
            "data" => Ok(Topic::Aggregate),
            other => Err(PipelineError::UnknownTopic(other.to_string())),
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decodes one raw packet into a canonical record.
pub fn decode_packet(topic: Topic, value: &Value) -> PipelineResult<CanonicalRecord> {
    let packet = RawPacket::new(value)?;
    match topic {
        Topic::Accel => motion::decode_accel(&packet),
        Topic::Gyro => motion::decode_gyro(&packet),
        Topic::AnalogIn => motion::decode_analog_in(&packet),
        Topic::Spectral => spectral::decode_spectral(&packet),
        Topic::Aggregate => aggregate::decode_aggregate(&packet),
    }
}

/// Decodes a whole batch, aborting on the first malformed packet.
pub fn decode_batch(topic: Topic, packets: &[Value]) -> PipelineResult<Vec<CanonicalRecord>> {
    let records = packets
        .iter()
        .map(|value| decode_packet(topic, value))
        .collect::<PipelineResult<Vec<CanonicalRecord>>>()?;
    debug!("decoded {} '{}' packets", records.len(), topic);
    Ok(records)
}

/// Inter-sample period in ms for a sampling rate in Hz.
///
/// A degenerate rate (zero or negative) yields a period of 0 so every sample
/// collapses to the packet anchor instead of faulting.
pub(crate) fn sample_period_ms(odr: f64) -> f64 {
    if odr > 0.0 {
        1000.0 / odr
    } else {
        0.0
    }
}

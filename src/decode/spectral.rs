//! Decoder for spectral (FFT) snapshot packets.
//!
//! One packet carries one axis's frequency-domain snapshot for a time window,
//! so there is no timestamp fan-out: every point lives in the frequency
//! domain, with bin `i` at `i / 1024 * 50` Hz. The axis code rides along as
//! metadata until the hour merger recombines the per-axis packets.

use crate::error::PipelineResult;
use crate::packet::RawPacket;
use crate::record::{CanonicalRecord, TimePoint};

const FIXED_POINT_Q15: f64 = 1.0 / 32768.0; // 2^-15
const BIN_HZ: f64 = 50.0 / 1024.0;

/// Decodes a single-axis spectral packet.
pub fn decode_spectral(packet: &RawPacket<'_>) -> PipelineResult<CanonicalRecord> {
    let bins = packet.samples("fft")?;
    let scale = packet.f64_field("scale")?;
    let odr = packet.f64_field("odr")?;
    let axis = packet.i64_field("axis")?;
    let device_id = packet.device_id()?;
    let anchor_ms = packet.i64_field("time")?;

    let mut rec = CanonicalRecord::new(device_id, anchor_ms, scale, odr);
    rec.axis = Some(axis);

    let factor = scale * FIXED_POINT_Q15;
    let points = bins
        .iter()
        .enumerate()
        .map(|(i, &raw)| TimePoint::new(i as f64 * BIN_HZ, raw * factor))
        .collect();
    rec.vectors.insert("fft".into(), points);
    Ok(rec)
}

//! Decoders for the high-frequency motion topics (accel, gyro, analog-in).
//!
//! All three share the same timestamp reconstruction: the packet anchor time
//! is the timestamp of the *last* sample, and sample `i` (oldest first) sits
//! `(count - 1 - i)` periods before it, with the period derived from the
//! declared sampling rate. They differ only in the sample-array key, the axis
//! count, and how the physical scale factor is obtained.

use crate::decode::sample_period_ms;
use crate::error::PipelineResult;
use crate::packet::RawPacket;
use crate::record::{CanonicalRecord, TimePoint};

const FIXED_POINT_Q15: f64 = 1.0 / 32768.0; // 2^-15

/// Decodes a 3-axis accelerometer packet.
///
/// Values scale by `scale * 2^-15`. The optional ambient-temperature and wind
/// channels are recorded once per packet, at the anchor time.
pub fn decode_accel(packet: &RawPacket<'_>) -> PipelineResult<CanonicalRecord> {
    let samples = packet.samples("axyz")?;
    let scale = packet.f64_field("scale")?;
    let odr = packet.f64_field("odr")?;

    let mut rec = base_record(packet, scale, odr)?;
    rec.seq = Some(packet.i64_field_or("seq", 1)?);

    let anchor = rec.anchor_ms as f64;
    let tamb = packet.f64_field_or("tamb", 0.0)?;
    let w_s = packet.f64_field_or("w_s", 0.0)? * 0.01;
    let w_d = packet.f64_field_or("w_d", 0.0)? * 360.0 / 16.0;
    rec.vectors.insert("tamb".into(), vec![TimePoint::new(anchor, tamb)]);
    rec.vectors.insert("w_s".into(), vec![TimePoint::new(anchor, w_s)]);
    rec.vectors.insert("w_d".into(), vec![TimePoint::new(anchor, w_d)]);

    fan_out(
        &mut rec,
        &samples,
        &["acc_x", "acc_y", "acc_z"],
        scale * FIXED_POINT_Q15,
        sample_period_ms(odr),
    );
    Ok(rec)
}

/// Decodes a 3-axis gyroscope packet.
///
/// The packet's scale field is a coded range value; see [`gyro_range_scale`].
pub fn decode_gyro(packet: &RawPacket<'_>) -> PipelineResult<CanonicalRecord> {
    let samples = packet.samples("gxyz")?;
    let range_code = packet.i64_field("scale")?;
    let odr = packet.f64_field("odr")?;
    let scale = gyro_range_scale(range_code);

    let mut rec = base_record(packet, scale, odr)?;
    rec.seq = Some(packet.i64_field_or("seq", 1)?);

    fan_out(
        &mut rec,
        &samples,
        &["gyr_x", "gyr_y", "gyr_z"],
        scale * FIXED_POINT_Q15,
        sample_period_ms(odr),
    );
    Ok(rec)
}

/// Decodes a 2-channel analog-input packet.
///
/// Samples scale directly by the packet scale (no fixed-point shift). The
/// sample array, scale, and rate are all defaulted when absent, matching the
/// device's sparse encoding of idle channels.
pub fn decode_analog_in(packet: &RawPacket<'_>) -> PipelineResult<CanonicalRecord> {
    let samples = packet.samples_or_empty("ain")?;
    let scale = packet.f64_field_or("scale", 1.0)?;
    let odr = packet.f64_field_or("odr", 1.0)?;

    let mut rec = base_record(packet, scale, odr)?;
    rec.seq = Some(packet.i64_field_or("seq", 1)?);

    fan_out(
        &mut rec,
        &samples,
        &["ain_a", "ain_b"],
        scale,
        sample_period_ms(odr),
    );
    Ok(rec)
}

/// Maps the gyroscope range code to a full-scale value in deg/s.
///
/// Codes below 14 select `2000 / 2^code`; 15 and 31 are firmware aliases for
/// `2000 / 2^7` and `2000 / 2^6`. Codes 14 and 16..=30 are undefined upstream
/// and pass through numerically unchanged.
pub fn gyro_range_scale(code: i64) -> f64 {
    if code < 14 {
        2000.0 / 2f64.powi(code as i32)
    } else if code == 15 {
        2000.0 / 2f64.powi(7)
    } else if code == 31 {
        2000.0 / 2f64.powi(6)
    } else {
        code as f64
    }
}

fn base_record(packet: &RawPacket<'_>, scale: f64, odr: f64) -> PipelineResult<CanonicalRecord> {
    let device_id = packet.device_id()?;
    let anchor_ms = packet.i64_field("time")?;
    Ok(CanonicalRecord::new(device_id, anchor_ms, scale, odr))
}

/// De-interleaves a flat sample array into per-axis vectors with
/// reconstructed timestamps ending exactly at the record anchor.
fn fan_out(
    rec: &mut CanonicalRecord,
    samples: &[f64],
    fields: &[&str],
    factor: f64,
    period_ms: f64,
) {
    let axis_count = fields.len();
    let per_axis = samples.len() / axis_count;
    let anchor = rec.anchor_ms as f64;

    for (axis, name) in fields.iter().enumerate() {
        let mut points = Vec::with_capacity(per_axis);
        for i in 0..per_axis {
            let steps_back = (per_axis - 1 - i) as f64;
            let t = anchor - steps_back * period_ms;
            points.push(TimePoint::new(t, samples[i * axis_count + axis] * factor));
        }
        rec.vectors.insert((*name).to_string(), points);
    }
}

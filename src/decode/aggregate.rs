//! Decoder for aggregated summary packets.
//!
//! One packet already represents one fixed-duration summary interval, so
//! decoding is a set of independent fixed-point conversions: acceleration
//! statistics scale by `scale * 2^-24`, inclination angles by `2^-24`,
//! spectral-domain indices by `odr / 1024`, magnetic components by
//! `scale * 2^-15`, and the wind channels by the same factors the motion
//! decoders use. The trailing wind-speed average array is exposed as six
//! 10-minute-spaced points ending at the packet's own UTC hour floor.

use crate::error::PipelineResult;
use crate::merge::hour_floor_ms;
use crate::packet::RawPacket;
use crate::record::{CanonicalRecord, TimePoint};

const FIXED_POINT_Q15: f64 = 1.0 / 32768.0; // 2^-15
const FIXED_POINT_Q24: f64 = 1.0 / 16_777_216.0; // 2^-24
const WIND_AVG_SLOTS: usize = 6;
const WIND_AVG_STEP_MS: i64 = 10 * 60 * 1000;

/// Decodes an aggregate ("data") packet. Absent numeric fields default to 0.
pub fn decode_aggregate(packet: &RawPacket<'_>) -> PipelineResult<CanonicalRecord> {
    let device_id = packet.device_id()?;
    let anchor_ms = packet.i64_field("time")?;
    let scale = packet.f64_field("scale")?;
    let odr = packet.f64_field("odr")?;

    let mut rec = CanonicalRecord::new(device_id, anchor_ms, scale, odr);

    let f_acc = scale * FIXED_POINT_Q24;
    let f_inc = FIXED_POINT_Q24;
    let f_spec = odr / 1024.0;
    let f_mag = scale * FIXED_POINT_Q15;

    let scaled: &[(&str, f64)] = &[
        ("aavgx", f_acc),
        ("aavgy", f_acc),
        ("aavgz", f_acc),
        ("amaxx", f_acc),
        ("amaxy", f_acc),
        ("amaxz", f_acc),
        ("aminx", f_acc),
        ("aminy", f_acc),
        ("aminz", f_acc),
        ("theta", f_inc),
        ("phi", f_inc),
        ("nx1", f_spec),
        ("nx2", f_spec),
        ("ny1", f_spec),
        ("ny2", f_spec),
        ("nz1", f_spec),
        ("nz2", f_spec),
        ("mx1", f_mag),
        ("mx2", f_mag),
        ("my1", f_mag),
        ("my2", f_mag),
        ("mz1", f_mag),
        ("mz2", f_mag),
        ("in_a", 1.0),
        ("in_b", 1.0),
        ("lat", 1.0),
        ("long", 1.0),
        ("tamb", 1.0),
        ("w_s", 0.01),
        ("w_d", 360.0 / 16.0),
    ];
    for &(name, factor) in scaled {
        let raw = packet.f64_field_or(name, 0.0)?;
        rec.scalars.insert(name.to_string(), raw * factor);
    }

    rec.vectors
        .insert("w_s_avg".into(), wind_avg_points(packet, anchor_ms)?);
    Ok(rec)
}

/// Builds the trailing wind-speed-average vector.
///
/// The last slot sits at the packet's UTC hour floor and earlier slots step
/// back 10 minutes each. A missing or non-array field yields six zero slots.
fn wind_avg_points(packet: &RawPacket<'_>, anchor_ms: i64) -> PipelineResult<Vec<TimePoint>> {
    let raw = packet
        .samples_if_array("w_s_avg")?
        .unwrap_or_else(|| vec![0.0; WIND_AVG_SLOTS]);

    let base_hour_ms = hour_floor_ms(anchor_ms);
    let len = raw.len();
    Ok(raw
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            let steps_back = (len - 1 - i) as i64;
            let t = base_hour_ms - steps_back * WIND_AVG_STEP_MS;
            TimePoint::new(t as f64, value * 0.01)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // 2023-11-14T22:13:20Z; hour floor is 22:00:00 UTC.
    const ANCHOR: i64 = 1_700_000_000_000;
    const HOUR_FLOOR: i64 = 1_699_999_200_000;

    fn aggregate_packet() -> serde_json::Value {
        json!({
            "id": "DEV01",
            "time": ANCHOR,
            "scale": 16.0,
            "odr": 50.0,
            "aavgx": 16_777_216,
            "theta": 8_388_608,
            "nx1": 512,
            "mx1": 32768,
            "w_s": 250,
            "w_d": 8,
            "lat": 59.33,
            "w_s_avg": [100, 200, 300, 400, 500, 600],
        })
    }

    #[test]
    fn applies_per_quantity_fixed_point_factors() {
        let value = aggregate_packet();
        let packet = RawPacket::new(&value).expect("object");
        let rec = decode_aggregate(&packet).expect("decode");

        assert_eq!(rec.scalars["aavgx"], 16.0); // 2^24 * 16 * 2^-24
        assert_eq!(rec.scalars["theta"], 0.5); // 2^23 * 2^-24
        assert_eq!(rec.scalars["nx1"], 25.0); // 512 * 50 / 1024
        assert_eq!(rec.scalars["mx1"], 16.0); // 2^15 * 16 * 2^-15
        assert_eq!(rec.scalars["w_s"], 2.5);
        assert_eq!(rec.scalars["w_d"], 180.0);
        assert_eq!(rec.scalars["lat"], 59.33);
        // Absent fields default to zero.
        assert_eq!(rec.scalars["amaxz"], 0.0);
    }

    #[test]
    fn wind_average_ends_at_hour_floor_with_ten_minute_steps() {
        let value = aggregate_packet();
        let packet = RawPacket::new(&value).expect("object");
        let rec = decode_aggregate(&packet).expect("decode");

        let points = &rec.vectors["w_s_avg"];
        assert_eq!(points.len(), 6);
        assert_eq!(points[5].timestamp, HOUR_FLOOR as f64);
        assert_eq!(points[0].timestamp, (HOUR_FLOOR - 50 * 60 * 1000) as f64);
        for pair in points.windows(2) {
            assert_eq!(pair[1].timestamp - pair[0].timestamp, 600_000.0);
        }
        assert!((points[0].value - 1.0).abs() < 1e-12);
        assert!((points[5].value - 6.0).abs() < 1e-12);
    }

    #[test]
    fn missing_wind_average_yields_zero_slots() {
        let value = json!({"id": "DEV01", "time": ANCHOR, "scale": 1.0, "odr": 50.0});
        let packet = RawPacket::new(&value).expect("object");
        let rec = decode_aggregate(&packet).expect("decode");

        let points = &rec.vectors["w_s_avg"];
        assert_eq!(points.len(), 6);
        assert!(points.iter().all(|p| p.value == 0.0));
    }
}

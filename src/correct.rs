//! Timestamp anomaly repair and sample-rate recalibration.
//!
//! Field devices occasionally stamp a packet with the time it was *sent*
//! rather than the time its last sample was taken. In a chronologically
//! sorted sequence this shows up as a signature delta pair: the gap into the
//! glitched packet is too long and the gap out of it is too short.
//! [`repair_glitches`] detects that signature and shifts the glitched record
//! (anchor and every nested sample together) backward onto the grid.
//!
//! Independently, the device crystal may run slightly fast or slow, so the
//! nominal ODR-derived sample spacing drifts from the truth.
//! [`recalibrate_rate`] re-derives each packet's intra-packet spacing from
//! the observed inter-packet delta when that delta plausibly spans exactly
//! one packet.
//!
//! Both passes mutate the record list in place; this is the one documented
//! side effect in the pipeline, so callers must own the slice exclusively.

use crate::record::CanonicalRecord;
use log::{debug, info};

/// Nominal inter-packet spacing for the primary deployment, in ms
/// (64 samples at 50 Hz).
pub const NOMINAL_PACKET_PERIOD_MS: f64 = 1280.0;

/// Relative tolerance around the median delta for the short/long thresholds.
const THRESHOLD_TOLERANCE: f64 = 0.015;

/// Deltas above this multiple of the nominal period are multi-packet gaps
/// and are excluded from the median.
const GAP_FACTOR: f64 = 1.1;

/// Plausible single-packet delta window for rate recalibration, in ms.
const RECAL_MIN_DELTA_MS: f64 = 1000.0;
const RECAL_MAX_DELTA_MS: f64 = 1500.0;

/// Detects and repairs the late-timestamp glitch signature.
///
/// Requires at least 3 records; shorter sequences are returned unmodified.
/// The scan is a single forward pass with a 2-step lookback, and each fix is
/// applied before the next comparison, so a repaired record participates in
/// subsequent deltas with its corrected anchor. Returns the number of records
/// repaired.
pub fn repair_glitches(records: &mut [CanonicalRecord]) -> usize {
    if records.len() < 3 {
        return 0;
    }

    let median = median_packet_delta(records);
    let short_threshold = median * (1.0 - THRESHOLD_TOLERANCE);
    let long_threshold = median * (1.0 + THRESHOLD_TOLERANCE);
    debug!(
        "glitch scan: median delta {:.1} ms, thresholds [{:.1}, {:.1}]",
        median, short_threshold, long_threshold
    );

    let mut fixed = 0;
    for i in 2..records.len() {
        let delta_curr = (records[i].anchor_ms - records[i - 1].anchor_ms) as f64;
        let delta_prev = (records[i - 1].anchor_ms - records[i - 2].anchor_ms) as f64;

        if delta_curr <= short_threshold && delta_prev >= long_threshold {
            // Record i-1 was stamped late: pull it back so the gap into
            // record i matches the median spacing.
            let offset = (median - delta_curr).round() as i64;
            records[i - 1].shift_ms(-offset);
            fixed += 1;
        }
    }

    if fixed > 0 {
        info!("timestamp correction: repaired {fixed} anomalies");
    }
    fixed
}

/// Recalibrates intra-packet sample spacing to the observed packet delta.
///
/// For every record with both a predecessor and a successor, when the delta
/// to its predecessor falls in the plausible one-packet window, each vector's
/// period becomes `delta / sample_count` and sample timestamps are
/// regenerated backward from the record anchor. Records outside the window
/// keep their nominal spacing (a multi-packet gap must not stretch samples),
/// and so does the final record.
pub fn recalibrate_rate(records: &mut [CanonicalRecord]) {
    let len = records.len();
    if len < 2 {
        return;
    }

    let mut recalibrated = 0;
    for i in 1..len - 1 {
        let delta = (records[i].anchor_ms - records[i - 1].anchor_ms) as f64;
        if !(RECAL_MIN_DELTA_MS..=RECAL_MAX_DELTA_MS).contains(&delta) {
            continue;
        }

        let anchor = records[i].anchor_ms as f64;
        for points in records[i].vectors.values_mut() {
            let count = points.len();
            if count == 0 {
                continue;
            }
            let period = delta / count as f64;
            for (j, point) in points.iter_mut().enumerate() {
                let steps_back = (count - 1 - j) as f64;
                point.timestamp = anchor - steps_back * period;
            }
        }
        recalibrated += 1;
    }

    if recalibrated > 0 {
        debug!("auto-rate: recalibrated {recalibrated} of {len} records");
    }
}

/// Median of adjacent anchor deltas, ignoring obvious multi-packet gaps.
/// Falls back to the nominal period when every delta is a gap.
fn median_packet_delta(records: &[CanonicalRecord]) -> f64 {
    let mut deltas: Vec<f64> = records
        .windows(2)
        .map(|pair| (pair[1].anchor_ms - pair[0].anchor_ms) as f64)
        .filter(|&d| d <= NOMINAL_PACKET_PERIOD_MS * GAP_FACTOR)
        .collect();

    if deltas.is_empty() {
        return NOMINAL_PACKET_PERIOD_MS;
    }

    deltas.sort_by(f64::total_cmp);
    let mid = deltas.len() / 2;
    if deltas.len() % 2 == 1 {
        deltas[mid]
    } else {
        (deltas[mid - 1] + deltas[mid]) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TimePoint;

    /// A record with one vector of `count` samples at 20 ms nominal spacing,
    /// last sample at the anchor.
    fn packet(anchor_ms: i64, count: usize) -> CanonicalRecord {
        let mut rec = CanonicalRecord::new("DEV01".into(), anchor_ms, 4.0, 50.0);
        let points = (0..count)
            .map(|i| {
                let steps_back = (count - 1 - i) as f64;
                TimePoint::new(anchor_ms as f64 - steps_back * 20.0, 1.0)
            })
            .collect();
        rec.vectors.insert("acc_x".into(), points);
        rec
    }

    #[test]
    fn standard_glitch_is_pulled_onto_the_grid() {
        // Deltas 1280, 1305, 1255: median 1280, thresholds [1260.8, 1299.2].
        // Record 2 was stamped 25 ms late.
        let mut records = vec![packet(0, 1), packet(1280, 1), packet(2585, 1), packet(3840, 1)];
        let fixed = repair_glitches(&mut records);

        assert_eq!(fixed, 1);
        assert_eq!(records[2].anchor_ms, 2560);
        assert_eq!(records[2].anchor_ms - records[1].anchor_ms, 1280);
        assert_eq!(records[3].anchor_ms - records[2].anchor_ms, 1280);
        // The nested samples moved with the anchor.
        assert_eq!(records[2].vectors["acc_x"][0].timestamp, 2560.0);
    }

    #[test]
    fn massive_gap_is_excluded_from_the_median() {
        // Median established at 1280 by the first three records; the huge
        // delta is filtered out, then the catch-up short delta triggers.
        let mut records = vec![
            packet(0, 1),
            packet(1280, 1),
            packet(2560, 1),
            packet(1_000_000, 1),
            packet(1_001_260, 1),
        ];
        repair_glitches(&mut records);

        assert_eq!(records[3].anchor_ms, 999_980);
        assert_eq!(records[4].anchor_ms - records[3].anchor_ms, 1280);
    }

    #[test]
    fn short_delta_without_preceding_long_is_left_alone() {
        // Delta 1260 is short, but the previous delta is nominal: no fix.
        let mut records = vec![packet(0, 1), packet(1280, 1), packet(2540, 1)];
        let fixed = repair_glitches(&mut records);

        assert_eq!(fixed, 0);
        assert_eq!(records[2].anchor_ms, 2540);
    }

    #[test]
    fn sequences_below_the_window_are_untouched() {
        let mut records = vec![packet(0, 1), packet(900, 1)];
        assert_eq!(repair_glitches(&mut records), 0);
        assert_eq!(records[1].anchor_ms, 900);
    }

    #[test]
    fn fallback_median_applies_when_all_deltas_are_gaps() {
        // Every delta exceeds 1.1x nominal, so the scan runs against the
        // 1280 ms fallback and finds nothing to fix.
        let mut records = vec![packet(0, 1), packet(5000, 1), packet(10_000, 1)];
        assert_eq!(repair_glitches(&mut records), 0);
    }

    #[test]
    fn recalibration_compresses_to_observed_delta() {
        let mut records = vec![packet(0, 64), packet(1250, 64), packet(2500, 64)];
        recalibrate_rate(&mut records);

        let samples = &records[1].vectors["acc_x"];
        // Last sample stays at the anchor.
        assert_eq!(samples[63].timestamp, 1250.0);
        let spacing = samples[1].timestamp - samples[0].timestamp;
        assert!((spacing - 1250.0 / 64.0).abs() < 1e-9);
        // First sample no longer overlaps the previous packet.
        assert!(samples[0].timestamp > 0.0);
    }

    #[test]
    fn recalibration_guardrail_ignores_multi_packet_gaps() {
        let mut records = vec![packet(0, 64), packet(2000, 64), packet(4000, 64)];
        recalibrate_rate(&mut records);

        let samples = &records[1].vectors["acc_x"];
        assert_eq!(samples[1].timestamp - samples[0].timestamp, 20.0);
    }

    #[test]
    fn final_record_keeps_nominal_spacing() {
        let mut records = vec![packet(0, 64), packet(1250, 64), packet(2500, 64)];
        recalibrate_rate(&mut records);

        let samples = &records[2].vectors["acc_x"];
        assert_eq!(samples[1].timestamp - samples[0].timestamp, 20.0);
    }

    #[test]
    fn glitch_repair_then_recalibration_compose() {
        // Fast crystal (1250 ms) plus one late timestamp at index 2.
        let mut records = vec![
            packet(0, 64),
            packet(1250, 64),
            packet(2520, 64),
            packet(3750, 64),
        ];
        repair_glitches(&mut records);
        recalibrate_rate(&mut records);

        assert_eq!(records[2].anchor_ms, 2500);
        let samples = &records[2].vectors["acc_x"];
        let spacing = samples[1].timestamp - samples[0].timestamp;
        assert!((spacing - 1250.0 / 64.0).abs() < 1e-9);
    }
}

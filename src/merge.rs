//! Hour-bucket folding of canonical records.
//!
//! A chronological record sequence is split whenever the UTC hour floor of
//! the anchor time changes, and each bucket folds into one record: the
//! earliest anchor is kept, vectors concatenate in sequence-number order, and
//! scalar/meta fields come from the first record that defines them. The
//! merger never reorders samples within a vector; it only concatenates
//! already-ordered groups.
//!
//! Spectral packets get a preliminary rename before the generic fold: the
//! single `fft` vector becomes axis-qualified (`fft_x`/`fft_y`/`fft_z`) and
//! the axis metadata is dropped, so one bucket recombines the per-axis
//! snapshots into a single record.

use crate::record::CanonicalRecord;
use chrono::{TimeZone, Timelike, Utc};
use log::debug;

/// Floors a millisecond timestamp to its UTC hour. Out-of-range timestamps
/// floor to 0 rather than faulting.
pub fn hour_floor_ms(timestamp_ms: i64) -> i64 {
    let Some(dt) = Utc.timestamp_millis_opt(timestamp_ms).single() else {
        return 0;
    };
    dt.with_minute(0)
        .and_then(|d| d.with_second(0))
        .and_then(|d| d.with_nanosecond(0))
        .map(|d| d.timestamp_millis())
        .unwrap_or(0)
}

/// Folds a chronological record sequence into one record per UTC hour.
pub fn merge_by_hour(records: Vec<CanonicalRecord>) -> Vec<CanonicalRecord> {
    merge_buckets(records, fold_group)
}

/// Spectral variant of [`merge_by_hour`]: recombines per-axis snapshot
/// packets into axis-qualified vectors before folding.
pub fn merge_spectral_by_hour(records: Vec<CanonicalRecord>) -> Vec<CanonicalRecord> {
    let relabeled = records.into_iter().map(qualify_spectral_axis).collect();
    merge_buckets(relabeled, fold_group)
}

/// Moves a record's `fft` vector to its axis-qualified name and drops the
/// axis metadata. An unknown axis code leaves the vector unqualified.
fn qualify_spectral_axis(mut rec: CanonicalRecord) -> CanonicalRecord {
    let qualified = match rec.axis.take() {
        Some(0) => Some("fft_x"),
        Some(1) => Some("fft_y"),
        Some(2) => Some("fft_z"),
        _ => None,
    };
    if let Some(name) = qualified {
        if let Some(points) = rec.vectors.remove("fft") {
            rec.vectors.insert(name.to_string(), points);
        }
    }
    rec
}

fn merge_buckets(
    records: Vec<CanonicalRecord>,
    fold: fn(Vec<CanonicalRecord>) -> Option<CanonicalRecord>,
) -> Vec<CanonicalRecord> {
    let mut merged = Vec::new();
    let mut current_hour = None;
    let mut group: Vec<CanonicalRecord> = Vec::new();

    for rec in records {
        let hour = hour_floor_ms(rec.anchor_ms);
        if current_hour != Some(hour) {
            merged.extend(fold(std::mem::take(&mut group)));
            current_hour = Some(hour);
        }
        group.push(rec);
    }
    merged.extend(fold(group));

    debug!("hour merge produced {} buckets", merged.len());
    merged
}

/// Folds one bucket, or `None` for an empty group. The group arrives in
/// chronological order; folding re-orders it by sequence number (records
/// without one go last) so vector concatenation stays chronological even
/// when anchor times tie.
fn fold_group(mut group: Vec<CanonicalRecord>) -> Option<CanonicalRecord> {
    // Earliest record's anchor is the bucket anchor.
    let anchor_ms = group.iter().map(|r| r.anchor_ms).min()?;

    group.sort_by_key(|r| (r.seq.is_none(), r.seq));

    let mut iter = group.into_iter();
    let mut merged = iter.next()?;
    merged.anchor_ms = anchor_ms;

    for rec in iter {
        for (name, mut points) in rec.vectors {
            merged
                .vectors
                .entry(name)
                .or_default()
                .append(&mut points);
        }
        for (name, value) in rec.scalars {
            merged.scalars.entry(name).or_insert(value);
        }
        if merged.seq.is_none() {
            merged.seq = rec.seq;
        }
    }
    Some(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TimePoint;

    const HOUR_MS: i64 = 3_600_000;

    fn record(anchor_ms: i64, seq: Option<i64>, field: &str, values: &[f64]) -> CanonicalRecord {
        let mut rec = CanonicalRecord::new("DEV01".into(), anchor_ms, 4.0, 50.0);
        rec.seq = seq;
        rec.vectors.insert(
            field.into(),
            values
                .iter()
                .enumerate()
                .map(|(i, &v)| TimePoint::new(anchor_ms as f64 + i as f64, v))
                .collect(),
        );
        rec
    }

    #[test]
    fn hour_floor_truncates_to_the_utc_hour() {
        // 2023-11-14T22:13:20Z -> 22:00:00Z
        assert_eq!(hour_floor_ms(1_700_000_000_000), 1_699_999_200_000);
        assert_eq!(hour_floor_ms(1_699_999_200_000), 1_699_999_200_000);
    }

    #[test]
    fn empty_input_merges_to_nothing() {
        assert!(merge_by_hour(Vec::new()).is_empty());
        assert!(merge_spectral_by_hour(Vec::new()).is_empty());
    }

    #[test]
    fn records_in_one_hour_fold_to_one_bucket() {
        let records = vec![
            record(HOUR_MS + 1000, Some(1), "acc_x", &[1.0]),
            record(HOUR_MS + 2280, Some(2), "acc_x", &[2.0]),
            record(2 * HOUR_MS + 500, Some(3), "acc_x", &[3.0]),
        ];
        let merged = merge_by_hour(records);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].anchor_ms, HOUR_MS + 1000);
        let values: Vec<f64> = merged[0].vectors["acc_x"].iter().map(|p| p.value).collect();
        assert_eq!(values, vec![1.0, 2.0]);
        assert_eq!(merged[1].vectors["acc_x"][0].value, 3.0);
    }

    #[test]
    fn fold_orders_by_sequence_with_missing_seq_last() {
        // Anchor ties cannot order these; seq must.
        let records = vec![
            record(HOUR_MS, None, "acc_x", &[9.0]),
            record(HOUR_MS, Some(2), "acc_x", &[2.0]),
            record(HOUR_MS, Some(1), "acc_x", &[1.0]),
        ];
        let merged = merge_by_hour(records);

        let values: Vec<f64> = merged[0].vectors["acc_x"].iter().map(|p| p.value).collect();
        assert_eq!(values, vec![1.0, 2.0, 9.0]);
    }

    #[test]
    fn scalars_take_the_first_defined_value() {
        let mut a = record(HOUR_MS, Some(1), "acc_x", &[1.0]);
        a.scalars.insert("tamb".into(), 20.0);
        let mut b = record(HOUR_MS + 1280, Some(2), "acc_x", &[2.0]);
        b.scalars.insert("tamb".into(), 99.0);
        b.scalars.insert("lat".into(), 59.33);

        let merged = merge_by_hour(vec![a, b]);
        assert_eq!(merged[0].scalars["tamb"], 20.0);
        assert_eq!(merged[0].scalars["lat"], 59.33);
    }

    #[test]
    fn concatenating_chronological_vectors_preserves_order() {
        let records = vec![
            record(HOUR_MS, Some(1), "acc_x", &[1.0, 2.0]),
            record(HOUR_MS + 1280, Some(2), "acc_x", &[3.0, 4.0]),
        ];
        let merged = merge_by_hour(records);

        let timestamps: Vec<f64> = merged[0].vectors["acc_x"]
            .iter()
            .map(|p| p.timestamp)
            .collect();
        let mut sorted = timestamps.clone();
        sorted.sort_by(f64::total_cmp);
        assert_eq!(timestamps, sorted);
    }

    #[test]
    fn spectral_axes_recombine_within_an_hour() {
        let mut axes = Vec::new();
        for (axis, value) in [(0, 1.0), (1, 2.0), (2, 3.0)] {
            let mut rec = record(HOUR_MS + axis, None, "fft", &[value]);
            rec.axis = Some(axis);
            axes.push(rec);
        }
        let merged = merge_spectral_by_hour(axes);

        assert_eq!(merged.len(), 1);
        let rec = &merged[0];
        assert!(rec.axis.is_none());
        assert!(!rec.vectors.contains_key("fft"));
        assert_eq!(rec.vectors["fft_x"][0].value, 1.0);
        assert_eq!(rec.vectors["fft_y"][0].value, 2.0);
        assert_eq!(rec.vectors["fft_z"][0].value, 3.0);
    }

    #[test]
    fn unknown_spectral_axis_stays_unqualified() {
        let mut rec = record(HOUR_MS, None, "fft", &[1.0]);
        rec.axis = Some(7);
        let merged = merge_spectral_by_hour(vec![rec]);

        assert!(merged[0].vectors.contains_key("fft"));
    }
}

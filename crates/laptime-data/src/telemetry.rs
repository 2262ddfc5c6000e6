//! Per-lap aggregation of raw telemetry samples.

use laptime_core::models::{LapKey, PerLapSummary, TelemetrySample};
use laptime_core::stats::{mean, sample_std_dev};
use serde::Serialize;
use tracing::debug;

/// Samples a lap needs before its steering smoothness is defined: three
/// readings give two successive differences.
pub const MIN_SAMPLES_PER_LAP: usize = 3;

/// A telemetry sample with its zero-based position among the samples that
/// share its `(driver, lap)` key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndexedSample<'a> {
    pub index_within_lap: usize,
    pub sample: &'a TelemetrySample,
}

/// Order samples by `(driver, lap, timestamp)` and number them within each lap.
///
/// Samples with identical timestamps keep their input order.
pub fn index_within_lap(samples: &[TelemetrySample]) -> Vec<IndexedSample<'_>> {
    let mut ordered: Vec<&TelemetrySample> = samples.iter().collect();
    ordered.sort_by_key(|s| (s.key(), s.timestamp));

    let mut indexed = Vec::with_capacity(ordered.len());
    let mut current: Option<LapKey> = None;
    let mut index = 0usize;
    for sample in ordered {
        if current == Some(sample.key()) {
            index += 1;
        } else {
            current = Some(sample.key());
            index = 0;
        }
        indexed.push(IndexedSample {
            index_within_lap: index,
            sample,
        });
    }
    indexed
}

/// Build one [`PerLapSummary`] per `(driver, lap)`, ordered by key.
///
/// * `mean_throttle` / `mean_brake` average the readings present on the lap.
/// * `steering_smoothness` is the sample standard deviation of successive
///   steering-angle changes; a steady hand scores low.
///
/// A lap is left out when it has no throttle or brake readings, or fewer than
/// [`MIN_SAMPLES_PER_LAP`] steering readings.
pub fn summarize_laps(samples: &[TelemetrySample]) -> Vec<PerLapSummary> {
    let mut laps: Vec<Vec<&TelemetrySample>> = Vec::new();
    for indexed in index_within_lap(samples) {
        match laps.last_mut() {
            Some(lap) if indexed.index_within_lap > 0 => lap.push(indexed.sample),
            _ => laps.push(vec![indexed.sample]),
        }
    }

    let mut summaries = Vec::with_capacity(laps.len());
    for lap_samples in &laps {
        let key = lap_samples[0].key();
        match summarize_lap(key, lap_samples) {
            Some(summary) => summaries.push(summary),
            None => debug!(
                "Lap {} has too little telemetry to summarize ({} samples)",
                key,
                lap_samples.len()
            ),
        }
    }

    debug!("Summarized {} laps of telemetry", summaries.len());
    summaries
}

fn summarize_lap(key: LapKey, samples: &[&TelemetrySample]) -> Option<PerLapSummary> {
    let throttle: Vec<f64> = samples.iter().filter_map(|s| s.throttle).collect();
    let brake: Vec<f64> = samples.iter().filter_map(|s| s.brake).collect();
    let steering: Vec<f64> = samples.iter().filter_map(|s| s.steering_angle).collect();

    if steering.len() < MIN_SAMPLES_PER_LAP {
        return None;
    }
    let deltas: Vec<f64> = steering.windows(2).map(|w| w[1] - w[0]).collect();

    Some(PerLapSummary {
        driver: key.driver,
        lap: key.lap,
        mean_throttle: mean(&throttle)?,
        mean_brake: mean(&brake)?,
        steering_smoothness: sample_std_dev(&deltas)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};

    fn base_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-04-26T18:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn sample(driver: u32, lap: u32, offset_ms: i64, steering: f64) -> TelemetrySample {
        TelemetrySample {
            driver,
            lap,
            timestamp: base_time() + Duration::milliseconds(offset_ms),
            speed: Some(150.0),
            steering_angle: Some(steering),
            accel_longitudinal: None,
            accel_lateral: None,
            throttle: Some(80.0),
            brake: Some(5.0),
            rpm: None,
            gear: Some(4),
        }
    }

    #[test]
    fn test_index_within_lap_orders_and_restarts() {
        let samples = vec![
            sample(2, 1, 100, 0.0),
            sample(1, 2, 0, 0.0),
            sample(1, 1, 200, 0.0),
            sample(1, 1, 0, 0.0),
            sample(1, 1, 100, 0.0),
        ];

        let indexed = index_within_lap(&samples);
        let keys: Vec<(u32, u32, usize)> = indexed
            .iter()
            .map(|s| (s.sample.driver, s.sample.lap, s.index_within_lap))
            .collect();
        assert_eq!(
            keys,
            vec![(1, 1, 0), (1, 1, 1), (1, 1, 2), (1, 2, 0), (2, 1, 0)]
        );
        assert!(indexed[0].sample.timestamp < indexed[1].sample.timestamp);
    }

    #[test]
    fn test_index_within_lap_empty() {
        assert!(index_within_lap(&[]).is_empty());
    }

    #[test]
    fn test_summarize_laps_smoothness_uses_time_order() {
        // In time order the steering trace is 0, 2, 4, 6: constant deltas.
        let samples = vec![
            sample(7, 1, 300, 6.0),
            sample(7, 1, 0, 0.0),
            sample(7, 1, 200, 4.0),
            sample(7, 1, 100, 2.0),
        ];

        let summaries = summarize_laps(&samples);
        assert_eq!(summaries.len(), 1);
        let s = &summaries[0];
        assert_eq!((s.driver, s.lap), (7, 1));
        assert!((s.mean_throttle - 80.0).abs() < 1e-12);
        assert!((s.mean_brake - 5.0).abs() < 1e-12);
        assert!(s.steering_smoothness.abs() < 1e-12);
    }

    #[test]
    fn test_summarize_laps_jerky_steering_scores_higher() {
        let smooth = vec![
            sample(1, 1, 0, 0.0),
            sample(1, 1, 100, 1.0),
            sample(1, 1, 200, 2.0),
            sample(1, 1, 300, 3.5),
        ];
        let jerky = vec![
            sample(1, 2, 0, 0.0),
            sample(1, 2, 100, 10.0),
            sample(1, 2, 200, -10.0),
            sample(1, 2, 300, 5.0),
        ];
        let all: Vec<TelemetrySample> = smooth.into_iter().chain(jerky).collect();

        let summaries = summarize_laps(&all);
        assert_eq!(summaries.len(), 2);
        assert!(summaries[1].steering_smoothness > summaries[0].steering_smoothness);
    }

    #[test]
    fn test_summarize_laps_skips_short_laps() {
        let samples = vec![sample(1, 1, 0, 0.0), sample(1, 1, 100, 1.0)];
        assert!(summarize_laps(&samples).is_empty());
    }

    #[test]
    fn test_summarize_laps_requires_pedal_readings() {
        let mut samples = vec![
            sample(1, 1, 0, 0.0),
            sample(1, 1, 100, 1.0),
            sample(1, 1, 200, 2.0),
        ];
        for s in &mut samples {
            s.throttle = None;
        }
        assert!(summarize_laps(&samples).is_empty());
    }

    #[test]
    fn test_summarize_laps_follows_lap_index_order() {
        // Interleaved input from two drivers; equal timestamps keep input order.
        let samples = vec![
            sample(3, 1, 0, 0.0),
            sample(1, 4, 100, 5.0),
            sample(3, 1, 100, 1.0),
            sample(1, 4, 100, 9.0),
            sample(3, 1, 200, 2.0),
            sample(1, 4, 0, 1.0),
        ];

        let summaries = summarize_laps(&samples);
        let keys: Vec<(u32, u32)> = summaries.iter().map(|s| (s.driver, s.lap)).collect();
        assert_eq!(keys, vec![(1, 4), (3, 1)]);

        // Driver 1 trace is 1, 5, 9: two equal deltas.
        assert!(summaries[0].steering_smoothness.abs() < 1e-12);
        assert!(summaries[1].steering_smoothness.abs() < 1e-12);
    }
}

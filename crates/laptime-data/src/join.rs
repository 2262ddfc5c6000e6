//! Inner join of lap records with per-lap telemetry summaries.

use std::collections::{BTreeMap, BTreeSet};

use laptime_core::error::{AnalysisError, Result};
use laptime_core::models::{JoinedLapRow, LapKey, LapRecord, PerLapSummary};
use serde::Serialize;
use tracing::debug;

/// Result of joining lap records with telemetry summaries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinOutcome {
    /// Joined rows, in the order of the lap records.
    pub rows: Vec<JoinedLapRow>,
    /// Keys of lap records with no telemetry summary, in lap-record order.
    pub unmatched: Vec<LapKey>,
    /// Summaries whose key matched no lap record.
    pub orphaned_summaries: usize,
    /// Number of lap records given to the join.
    pub lap_records: usize,
}

impl JoinOutcome {
    pub fn unmatched_count(&self) -> usize {
        self.unmatched.len()
    }

    /// Share of lap records that found a telemetry summary, in `[0, 1]`.
    ///
    /// `None` when there were no lap records at all.
    pub fn coverage(&self) -> Option<f64> {
        if self.lap_records == 0 {
            return None;
        }
        Some(self.rows.len() as f64 / self.lap_records as f64)
    }
}

/// Pairs lap records with telemetry summaries on `(driver, lap)`.
pub struct JoinEngine;

impl JoinEngine {
    /// Inner-join `laps` with `summaries`.
    ///
    /// A key repeated within either input is an integrity error
    /// ([`AnalysisError::DuplicateKey`]); neither side is silently
    /// overwritten. Lap records without a summary are dropped from `rows` and
    /// listed in `unmatched`.
    pub fn join(laps: &[LapRecord], summaries: &[PerLapSummary]) -> Result<JoinOutcome> {
        let mut by_key: BTreeMap<LapKey, &PerLapSummary> = BTreeMap::new();
        for summary in summaries {
            let key = summary.key();
            if by_key.insert(key, summary).is_some() {
                return Err(AnalysisError::DuplicateKey {
                    table: "telemetry summaries",
                    driver: key.driver,
                    lap: key.lap,
                });
            }
        }

        let mut seen: BTreeSet<LapKey> = BTreeSet::new();
        let mut rows = Vec::with_capacity(laps.len().min(by_key.len()));
        let mut unmatched = Vec::new();

        for lap in laps {
            let key = lap.key();
            if !seen.insert(key) {
                return Err(AnalysisError::DuplicateKey {
                    table: "lap records",
                    driver: key.driver,
                    lap: key.lap,
                });
            }
            match by_key.get(&key) {
                Some(summary) => rows.push(JoinedLapRow {
                    lap: lap.clone(),
                    telemetry: (*summary).clone(),
                }),
                None => unmatched.push(key),
            }
        }

        let orphaned_summaries = by_key.keys().filter(|k| !seen.contains(k)).count();

        debug!(
            "Join: {} lap records, {} summaries -> {} rows, {} unmatched laps, {} orphaned summaries",
            laps.len(),
            summaries.len(),
            rows.len(),
            unmatched.len(),
            orphaned_summaries
        );

        Ok(JoinOutcome {
            rows,
            unmatched,
            orphaned_summaries,
            lap_records: laps.len(),
        })
    }
}

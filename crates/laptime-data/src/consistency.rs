//! Per-driver lap-time dispersion and consistency rankings.

use std::cmp::Ordering;

use laptime_core::config::DEFAULT_MIN_LAPS;
use laptime_core::error::Result;
use laptime_core::models::{DriverNumber, LapRecord, Sector};
use laptime_core::stats::{mean, sample_std_dev};
use laptime_core::table::{DriverKeyed, DriverTable, DriverTableBuilder};
use serde::Serialize;
use tracing::debug;

use crate::group_by_driver;

/// Dispersion statistics for one driver.
///
/// Every standard deviation is `None` when the driver has a single lap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsistencyScore {
    pub driver: DriverNumber,
    pub lap_count: usize,
    pub lap_time_std: Option<f64>,
    pub s1_std: Option<f64>,
    pub s2_std: Option<f64>,
    pub s3_std: Option<f64>,
    pub top_speed_std: Option<f64>,
    pub mean_lap_time: Option<f64>,
    pub mean_top_speed: Option<f64>,
    /// Whether the driver has enough laps to be ranked.
    pub eligible: bool,
    /// `1 / (1 + lap_time_std)`; higher is more consistent.
    pub consistency_index: Option<f64>,
}

impl ConsistencyScore {
    pub fn sector_std(&self, sector: Sector) -> Option<f64> {
        match sector {
            Sector::S1 => self.s1_std,
            Sector::S2 => self.s2_std,
            Sector::S3 => self.s3_std,
        }
    }
}

impl DriverKeyed for ConsistencyScore {
    fn driver(&self) -> DriverNumber {
        self.driver
    }
}

/// Raw per-driver statistics plus the rankings of eligible drivers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsistencyReport {
    pub min_laps: usize,
    /// Every driver, eligible or not, ordered by driver number.
    pub scores: DriverTable<ConsistencyScore>,
    /// Eligible drivers, most consistent lap time first.
    pub ranking: Vec<DriverNumber>,
    /// Eligible drivers, most consistent top speed first.
    pub speed_ranking: Vec<DriverNumber>,
}

impl ConsistencyReport {
    /// Eligible drivers ordered by ascending lap-time standard deviation.
    pub fn ranked(&self) -> Vec<&ConsistencyScore> {
        self.resolve(&self.ranking)
    }

    /// Eligible drivers ordered by ascending top-speed standard deviation.
    pub fn ranked_by_top_speed(&self) -> Vec<&ConsistencyScore> {
        self.resolve(&self.speed_ranking)
    }

    fn resolve(&self, drivers: &[DriverNumber]) -> Vec<&ConsistencyScore> {
        drivers.iter().filter_map(|&d| self.scores.get(d)).collect()
    }
}

/// Computes [`ConsistencyScore`]s and ranks drivers that meet a lap minimum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsistencyAnalyzer {
    min_laps: usize,
}

impl Default for ConsistencyAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_LAPS)
    }
}

impl ConsistencyAnalyzer {
    pub fn new(min_laps: usize) -> Self {
        Self { min_laps }
    }

    pub fn min_laps(&self) -> usize {
        self.min_laps
    }

    /// Score every driver in `laps`.
    ///
    /// Drivers below the lap minimum stay in [`ConsistencyReport::scores`] but
    /// are left out of both rankings, as are drivers whose deviation is
    /// undefined. Ties rank the lower driver number first.
    pub fn analyze<'a>(&self, laps: impl IntoIterator<Item = &'a LapRecord>) -> Result<ConsistencyReport> {
        let mut builder = DriverTableBuilder::new();
        for (driver, driver_laps) in group_by_driver(laps) {
            builder.push(self.score(driver, &driver_laps))?;
        }
        let scores = builder.build();

        let ranking = rank_by(&scores, |s| s.lap_time_std);
        let speed_ranking = rank_by(&scores, |s| s.top_speed_std);

        debug!(
            "Consistency: {} drivers scored, {} ranked (min {} laps)",
            scores.len(),
            ranking.len(),
            self.min_laps
        );

        Ok(ConsistencyReport {
            min_laps: self.min_laps,
            scores,
            ranking,
            speed_ranking,
        })
    }

    fn score(&self, driver: DriverNumber, laps: &[&LapRecord]) -> ConsistencyScore {
        let field = |f: fn(&LapRecord) -> f64| -> Vec<f64> { laps.iter().map(|l| f(l)).collect() };
        let lap_times = field(|l| l.lap_time);
        let top_speeds = field(|l| l.top_speed);
        let lap_time_std = sample_std_dev(&lap_times);

        ConsistencyScore {
            driver,
            lap_count: laps.len(),
            lap_time_std,
            s1_std: sample_std_dev(&field(|l| l.sectors.s1)),
            s2_std: sample_std_dev(&field(|l| l.sectors.s2)),
            s3_std: sample_std_dev(&field(|l| l.sectors.s3)),
            top_speed_std: sample_std_dev(&top_speeds),
            mean_lap_time: mean(&lap_times),
            mean_top_speed: mean(&top_speeds),
            eligible: laps.len() >= self.min_laps,
            consistency_index: lap_time_std.map(|s| 1.0 / (1.0 + s)),
        }
    }
}

/// Eligible drivers with a defined `key`, ascending, ties by driver number.
fn rank_by(
    scores: &DriverTable<ConsistencyScore>,
    key: impl Fn(&ConsistencyScore) -> Option<f64>,
) -> Vec<DriverNumber> {
    let mut ranked: Vec<(f64, DriverNumber)> = scores
        .iter()
        .filter(|s| s.eligible)
        .filter_map(|s| key(s).map(|v| (v, s.driver)))
        .collect();
    ranked.sort_by(|a, b| match a.0.total_cmp(&b.0) {
        Ordering::Equal => a.1.cmp(&b.1),
        other => other,
    });
    ranked.into_iter().map(|(_, driver)| driver).collect()
}

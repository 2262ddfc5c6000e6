//! Per-driver pace summary and field-level highlights.

use laptime_core::error::Result;
use laptime_core::models::{DriverNumber, LapRecord, Sector, SectorTimes};
use laptime_core::stats::{mean, median};
use laptime_core::table::{DriverKeyed, DriverTable, DriverTableBuilder};
use serde::Serialize;
use tracing::debug;

use crate::group_by_driver;

/// Pace figures for one driver.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverPerformance {
    pub driver: DriverNumber,
    pub lap_count: usize,
    pub best_lap: f64,
    pub mean_lap: f64,
    pub median_lap: f64,
    pub sector_means: SectorTimes,
    pub sector_bests: SectorTimes,
    /// Sum of the driver's best sector times.
    pub theoretical_best: f64,
    /// `theoretical_best / best_lap`; 1.0 means the best lap held every best
    /// sector.
    pub efficiency: f64,
}

impl DriverKeyed for DriverPerformance {
    fn driver(&self) -> DriverNumber {
        self.driver
    }
}

/// Best-lap comparison across all drivers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSummary {
    pub driver_count: usize,
    pub fastest_driver: Option<DriverNumber>,
    pub fastest_lap: Option<f64>,
    pub slowest_best_lap: Option<f64>,
    pub average_best_lap: Option<f64>,
    /// Drivers ordered by best lap, ties by driver number.
    pub ranking: Vec<DriverNumber>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceReport {
    pub drivers: DriverTable<DriverPerformance>,
    pub field: FieldSummary,
}

impl PerformanceReport {
    /// Drivers ordered by best lap.
    pub fn ranked(&self) -> Vec<&DriverPerformance> {
        self.field
            .ranking
            .iter()
            .filter_map(|&d| self.drivers.get(d))
            .collect()
    }
}

/// Summarize every driver's pace.
pub fn summarize_performance<'a>(
    laps: impl IntoIterator<Item = &'a LapRecord>,
) -> Result<PerformanceReport> {
    let mut builder = DriverTableBuilder::new();
    for (driver, driver_laps) in group_by_driver(laps) {
        if let Some(perf) = driver_performance(driver, &driver_laps) {
            builder.push(perf)?;
        }
    }
    let drivers = builder.build();
    let field = field_summary(&drivers);

    debug!("Performance: {} drivers summarized", drivers.len());
    Ok(PerformanceReport { drivers, field })
}

/// The `n` fastest laps overall, ties broken by driver then lap number.
pub fn fastest_laps(laps: &[LapRecord], n: usize) -> Vec<&LapRecord> {
    let mut ordered: Vec<&LapRecord> = laps.iter().collect();
    ordered.sort_by(|a, b| {
        a.lap_time
            .total_cmp(&b.lap_time)
            .then_with(|| a.key().cmp(&b.key()))
    });
    ordered.truncate(n);
    ordered
}

fn driver_performance(driver: DriverNumber, laps: &[&LapRecord]) -> Option<DriverPerformance> {
    let lap_times: Vec<f64> = laps.iter().map(|l| l.lap_time).collect();
    let sector = |s: Sector| -> Vec<f64> { laps.iter().map(|l| l.sectors.get(s)).collect() };
    let min = |values: &[f64]| values.iter().copied().min_by(f64::total_cmp);

    let best_lap = min(&lap_times)?;
    let (s1, s2, s3) = (sector(Sector::S1), sector(Sector::S2), sector(Sector::S3));
    let sector_bests = SectorTimes::new(min(&s1)?, min(&s2)?, min(&s3)?);
    let theoretical_best = sector_bests.sum();

    Some(DriverPerformance {
        driver,
        lap_count: laps.len(),
        best_lap,
        mean_lap: mean(&lap_times)?,
        median_lap: median(&lap_times)?,
        sector_means: SectorTimes::new(mean(&s1)?, mean(&s2)?, mean(&s3)?),
        sector_bests,
        theoretical_best,
        efficiency: theoretical_best / best_lap,
    })
}

fn field_summary(drivers: &DriverTable<DriverPerformance>) -> FieldSummary {
    let mut ranked: Vec<&DriverPerformance> = drivers.iter().collect();
    ranked.sort_by(|a, b| {
        a.best_lap
            .total_cmp(&b.best_lap)
            .then_with(|| a.driver.cmp(&b.driver))
    });
    let bests: Vec<f64> = ranked.iter().map(|p| p.best_lap).collect();

    FieldSummary {
        driver_count: drivers.len(),
        fastest_driver: ranked.first().map(|p| p.driver),
        fastest_lap: bests.first().copied(),
        slowest_best_lap: bests.last().copied(),
        average_best_lap: mean(&bests),
        ranking: ranked.iter().map(|p| p.driver).collect(),
    }
}

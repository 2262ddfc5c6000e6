//! Lap-time trend per driver: least-squares fit of lap time on lap number.

use std::cmp::Ordering;

use laptime_core::error::{AnalysisError, Result};
use laptime_core::models::{DriverNumber, LapRecord};
use laptime_core::stats::{linear_regression, MIN_PAIRED_OBSERVATIONS};
use laptime_core::table::{DriverKeyed, DriverTable, DriverTableBuilder};
use serde::Serialize;
use tracing::{debug, warn};

use crate::group_by_driver;

/// Sign of the fitted slope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    /// Lap times fall as the session goes on.
    Improving,
    /// Lap times rise as the session goes on.
    Degrading,
    Flat,
}

impl TrendDirection {
    pub fn from_slope(slope: f64) -> Self {
        if slope < 0.0 {
            TrendDirection::Improving
        } else if slope > 0.0 {
            TrendDirection::Degrading
        } else {
            TrendDirection::Flat
        }
    }
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TrendDirection::Improving => "improving",
            TrendDirection::Degrading => "degrading",
            TrendDirection::Flat => "flat",
        };
        f.write_str(label)
    }
}

/// Fitted lap-time trend for one driver.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendResult {
    pub driver: DriverNumber,
    /// Seconds gained (negative) or lost (positive) per lap.
    pub slope: f64,
    pub intercept: f64,
    /// `None` when every lap time is identical.
    pub r_squared: Option<f64>,
    /// Two-tailed probability that the slope is zero; `None` when every lap
    /// time is identical.
    pub p_value: Option<f64>,
    pub lap_count: usize,
    pub first_lap_time: f64,
    pub last_lap_time: f64,
    /// First lap time minus last lap time, independent of the fit.
    pub improvement: f64,
    pub direction: TrendDirection,
}

impl DriverKeyed for TrendResult {
    fn driver(&self) -> DriverNumber {
        self.driver
    }
}

/// Trends for every driver with enough laps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendReport {
    pub trends: DriverTable<TrendResult>,
    /// Drivers left out because no line could be fitted, in driver order.
    pub insufficient: Vec<DriverNumber>,
}

impl TrendReport {
    /// Improving drivers, steepest improvement first.
    pub fn improving(&self) -> Vec<&TrendResult> {
        self.view(TrendDirection::Improving, |a, b| a.slope.total_cmp(&b.slope))
    }

    /// Degrading drivers, steepest degradation first.
    pub fn degrading(&self) -> Vec<&TrendResult> {
        self.view(TrendDirection::Degrading, |a, b| b.slope.total_cmp(&a.slope))
    }

    fn view(
        &self,
        direction: TrendDirection,
        order: impl Fn(&TrendResult, &TrendResult) -> Ordering,
    ) -> Vec<&TrendResult> {
        let mut view: Vec<&TrendResult> = self
            .trends
            .iter()
            .filter(|t| t.direction == direction)
            .collect();
        view.sort_by(|a, b| order(a, b).then_with(|| a.driver.cmp(&b.driver)));
        view
    }
}

/// Fits a lap-time trend for each driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendAnalyzer {
    min_laps: usize,
}

impl Default for TrendAnalyzer {
    fn default() -> Self {
        Self::new(MIN_PAIRED_OBSERVATIONS)
    }
}

impl TrendAnalyzer {
    /// `min_laps` is raised to three if lower; a line through two points has
    /// no residual to test.
    pub fn new(min_laps: usize) -> Self {
        Self {
            min_laps: min_laps.max(MIN_PAIRED_OBSERVATIONS),
        }
    }

    /// Fit one driver's laps, which may be in any order.
    pub fn fit_driver(&self, driver: DriverNumber, laps: &[&LapRecord]) -> Result<TrendResult> {
        if laps.len() < self.min_laps {
            return Err(AnalysisError::InsufficientData {
                required: self.min_laps,
                actual: laps.len(),
            });
        }

        let mut ordered = laps.to_vec();
        ordered.sort_by_key(|l| l.lap_number);

        let x: Vec<f64> = ordered.iter().map(|l| f64::from(l.lap_number)).collect();
        let y: Vec<f64> = ordered.iter().map(|l| l.lap_time).collect();
        let fit = linear_regression(&x, &y)?;

        let first_lap_time = y[0];
        let last_lap_time = y[y.len() - 1];

        Ok(TrendResult {
            driver,
            slope: fit.slope,
            intercept: fit.intercept,
            r_squared: fit.r_squared,
            p_value: fit.p_value,
            lap_count: ordered.len(),
            first_lap_time,
            last_lap_time,
            improvement: first_lap_time - last_lap_time,
            direction: TrendDirection::from_slope(fit.slope),
        })
    }

    /// Fit every driver in `laps`.
    ///
    /// Drivers with too few laps, or whose laps all carry one lap number, are
    /// absent from the trend table and listed in `insufficient`.
    pub fn analyze<'a>(&self, laps: impl IntoIterator<Item = &'a LapRecord>) -> Result<TrendReport> {
        let mut builder = DriverTableBuilder::new();
        let mut insufficient = Vec::new();

        for (driver, driver_laps) in group_by_driver(laps) {
            match self.fit_driver(driver, &driver_laps) {
                Ok(trend) => builder.push(trend)?,
                Err(AnalysisError::InsufficientData { required, actual }) => {
                    debug!(
                        "Driver {} has {} laps, trend needs {}",
                        driver, actual, required
                    );
                    insufficient.push(driver);
                }
                Err(e) if e.is_not_applicable() => {
                    warn!("No lap-time trend for driver {}: {}", driver, e);
                    insufficient.push(driver);
                }
                Err(e) => return Err(e),
            }
        }

        let trends = builder.build();
        debug!(
            "Trends: {} drivers fitted, {} without a trend",
            trends.len(),
            insufficient.len()
        );
        Ok(TrendReport {
            trends,
            insufficient,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use laptime_core::models::SectorTimes;

    fn lap(driver: u32, lap_number: u32, lap_time: f64) -> LapRecord {
        LapRecord::new(
            driver,
            "Race 1",
            lap_number,
            lap_time,
            SectorTimes::new(30.0, 35.0, lap_time - 65.0),
            180.0,
            "GF",
        )
        .unwrap()
    }

    fn driver_laps(driver: u32, times: &[f64]) -> Vec<LapRecord> {
        times
            .iter()
            .enumerate()
            .map(|(i, &t)| lap(driver, i as u32 + 1, t))
            .collect()
    }

    #[test]
    fn test_perfect_improvement() {
        let laps = driver_laps(1, &[100.0, 99.0, 98.0]);
        let report = TrendAnalyzer::default().analyze(&laps).unwrap();
        let trend = report.trends.get(1).unwrap();

        assert!((trend.slope + 1.0).abs() < 1e-12);
        assert!((trend.intercept - 101.0).abs() < 1e-12);
        assert!((trend.r_squared.unwrap() - 1.0).abs() < 1e-12);
        assert!(trend.p_value.unwrap() < 1e-9);
        assert_eq!(trend.direction, TrendDirection::Improving);
        assert!((trend.improvement - 2.0).abs() < 1e-12);
        assert_eq!(trend.lap_count, 3);
    }

    #[test]
    fn test_unordered_laps_are_sorted_by_lap_number() {
        let laps = vec![lap(1, 3, 98.0), lap(1, 1, 100.0), lap(1, 2, 99.0)];
        let report = TrendAnalyzer::default().analyze(&laps).unwrap();
        let trend = report.trends.get(1).unwrap();
        assert_eq!(trend.first_lap_time, 100.0);
        assert_eq!(trend.last_lap_time, 98.0);
        assert!((trend.slope + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_improvement_is_independent_of_slope() {
        // Degrading overall, but the last lap beats the first.
        let laps = driver_laps(1, &[100.0, 103.0, 104.0, 99.9]);
        let trend = TrendAnalyzer::default()
            .analyze(&laps)
            .unwrap()
            .trends
            .get(1)
            .cloned()
            .unwrap();
        assert!(trend.slope > 0.0);
        assert_eq!(trend.direction, TrendDirection::Degrading);
        assert!((trend.improvement - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_constant_lap_times_are_flat() {
        let laps = driver_laps(4, &[100.0, 100.0, 100.0, 100.0]);
        let report = TrendAnalyzer::default().analyze(&laps).unwrap();
        let trend = report.trends.get(4).unwrap();
        assert_eq!(trend.slope, 0.0);
        assert_eq!(trend.direction, TrendDirection::Flat);
        assert_eq!(trend.r_squared, None);
        assert_eq!(trend.p_value, None);
    }

    #[test]
    fn test_too_few_laps_is_absence_not_error() {
        let mut laps = driver_laps(1, &[100.0, 99.0]);
        laps.extend(driver_laps(2, &[100.0, 99.0, 98.5]));

        let report = TrendAnalyzer::default().analyze(&laps).unwrap();
        assert!(report.trends.get(1).is_none());
        assert!(report.trends.get(2).is_some());
        assert_eq!(report.insufficient, vec![1]);
    }

    #[test]
    fn test_fit_driver_insufficient_data_error() {
        let laps = driver_laps(1, &[100.0, 99.0]);
        let refs: Vec<&LapRecord> = laps.iter().collect();
        assert!(matches!(
            TrendAnalyzer::default().fit_driver(1, &refs),
            Err(AnalysisError::InsufficientData {
                required: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_single_lap_number_is_excluded() {
        let laps = vec![lap(6, 2, 100.0)];
        let refs: Vec<&LapRecord> = vec![&laps[0], &laps[0], &laps[0]];
        assert!(matches!(
            TrendAnalyzer::default().fit_driver(6, &refs),
            Err(AnalysisError::DegenerateInput(_))
        ));
    }

    #[test]
    fn test_minimum_is_at_least_three() {
        let laps = driver_laps(1, &[100.0, 99.0]);
        let report = TrendAnalyzer::new(1).analyze(&laps).unwrap();
        assert!(report.trends.is_empty());
    }

    #[test]
    fn test_views_are_ordered_by_slope() {
        let mut laps = driver_laps(1, &[100.0, 99.5, 99.0]);
        laps.extend(driver_laps(2, &[100.0, 98.0, 96.0]));
        laps.extend(driver_laps(3, &[100.0, 101.0, 102.0]));
        laps.extend(driver_laps(4, &[100.0, 103.0, 106.0]));
        laps.extend(driver_laps(5, &[100.0, 100.0, 100.0]));

        let report = TrendAnalyzer::default().analyze(&laps).unwrap();
        let improving: Vec<u32> = report.improving().iter().map(|t| t.driver).collect();
        let degrading: Vec<u32> = report.degrading().iter().map(|t| t.driver).collect();
        assert_eq!(improving, vec![2, 1]);
        assert_eq!(degrading, vec![4, 3]);
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(TrendDirection::Improving.to_string(), "improving");
        assert_eq!(TrendDirection::from_slope(0.0), TrendDirection::Flat);
        assert_eq!(TrendDirection::from_slope(0.3), TrendDirection::Degrading);
    }
}

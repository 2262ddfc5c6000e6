//! Lap times and speeds grouped by track condition, with a pairwise test.

use std::collections::BTreeMap;

use laptime_core::config::ConditionPair;
use laptime_core::error::{AnalysisError, Result};
use laptime_core::models::{DriverNumber, LapRecord};
use laptime_core::stats::{mean, welch_t_test, SummaryStats, WelchTest, MIN_GROUP_OBSERVATIONS};
use serde::Serialize;
use tracing::debug;

/// Lap-time and top-speed statistics for one condition code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionGroupStats {
    pub code: String,
    pub count: usize,
    pub lap_time: SummaryStats,
    pub top_speed: SummaryStats,
}

/// One driver's laps under one condition code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverConditionStats {
    pub driver: DriverNumber,
    pub code: String,
    pub lap_count: usize,
    pub mean_lap_time: f64,
    pub mean_top_speed: f64,
}

/// Welch's t-test of lap times under two condition codes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionComparison {
    pub baseline: String,
    pub other: String,
    pub baseline_count: usize,
    pub other_count: usize,
    /// `mean_difference` is baseline minus other.
    pub test: WelchTest,
}

/// Outcome of the pairwise test.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ComparisonOutcome {
    Computed(ConditionComparison),
    /// A group is absent or too small, or both groups are constant.
    NotApplicable {
        baseline: String,
        other: String,
        reason: String,
    },
}

impl ComparisonOutcome {
    pub fn comparison(&self) -> Option<&ConditionComparison> {
        match self {
            ComparisonOutcome::Computed(c) => Some(c),
            ComparisonOutcome::NotApplicable { .. } => None,
        }
    }
}

/// Everything the condition analysis produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionReport {
    /// One entry per code, ordered by code.
    pub groups: Vec<ConditionGroupStats>,
    /// `None` when no condition pair was requested.
    pub comparison: Option<ComparisonOutcome>,
    /// Ordered by driver, then code.
    pub by_driver: Vec<DriverConditionStats>,
}

impl ConditionReport {
    pub fn group(&self, code: &str) -> Option<&ConditionGroupStats> {
        self.groups.iter().find(|g| g.code == code)
    }
}

/// Groups lap records by condition code.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionAnalyzer {
    pair: Option<ConditionPair>,
    min_observations: usize,
}

impl Default for ConditionAnalyzer {
    fn default() -> Self {
        Self::new(Some(ConditionPair::default()), MIN_GROUP_OBSERVATIONS)
    }
}

impl ConditionAnalyzer {
    /// `min_observations` is raised to two if lower.
    pub fn new(pair: Option<ConditionPair>, min_observations: usize) -> Self {
        Self {
            pair,
            min_observations: min_observations.max(MIN_GROUP_OBSERVATIONS),
        }
    }

    pub fn analyze(&self, laps: &[LapRecord]) -> ConditionReport {
        let by_code = group_by_code(laps);

        let groups: Vec<ConditionGroupStats> = by_code
            .iter()
            .map(|(code, group)| ConditionGroupStats {
                code: (*code).to_string(),
                count: group.len(),
                lap_time: SummaryStats::from_values(&lap_times(group)),
                top_speed: SummaryStats::from_values(&top_speeds(group)),
            })
            .collect();

        let comparison = self.pair.as_ref().map(|pair| {
            match compare_groups(&by_code, pair, self.min_observations) {
                Ok(c) => ComparisonOutcome::Computed(c),
                Err(e) => {
                    debug!(
                        "Condition comparison {} vs {} not applicable: {}",
                        pair.baseline, pair.other, e
                    );
                    ComparisonOutcome::NotApplicable {
                        baseline: pair.baseline.clone(),
                        other: pair.other.clone(),
                        reason: e.to_string(),
                    }
                }
            }
        });

        let by_driver = driver_breakdown(laps);

        debug!(
            "Conditions: {} groups, {} driver/condition cells",
            groups.len(),
            by_driver.len()
        );

        ConditionReport {
            groups,
            comparison,
            by_driver,
        }
    }

    /// Test the lap times under `pair.baseline` against those under
    /// `pair.other`.
    ///
    /// Fails with `MissingGroup` when a code has no laps and
    /// `InsufficientData` when a group is below the observation minimum.
    pub fn compare(&self, laps: &[LapRecord], pair: &ConditionPair) -> Result<ConditionComparison> {
        compare_groups(&group_by_code(laps), pair, self.min_observations)
    }
}

fn compare_groups(
    by_code: &BTreeMap<&str, Vec<&LapRecord>>,
    pair: &ConditionPair,
    min_observations: usize,
) -> Result<ConditionComparison> {
    let missing: Vec<&str> = [pair.baseline.as_str(), pair.other.as_str()]
        .into_iter()
        .filter(|code| !by_code.contains_key(code))
        .collect();
    if !missing.is_empty() {
        return Err(AnalysisError::MissingGroup(format!(
            "no laps under condition {}",
            missing.join(", ")
        )));
    }

    let baseline = lap_times(&by_code[pair.baseline.as_str()]);
    let other = lap_times(&by_code[pair.other.as_str()]);
    let smallest = baseline.len().min(other.len());
    if smallest < min_observations {
        return Err(AnalysisError::InsufficientData {
            required: min_observations,
            actual: smallest,
        });
    }

    Ok(ConditionComparison {
        baseline: pair.baseline.clone(),
        other: pair.other.clone(),
        baseline_count: baseline.len(),
        other_count: other.len(),
        test: welch_t_test(&baseline, &other)?,
    })
}

fn group_by_code(laps: &[LapRecord]) -> BTreeMap<&str, Vec<&LapRecord>> {
    let mut by_code: BTreeMap<&str, Vec<&LapRecord>> = BTreeMap::new();
    for lap in laps {
        by_code.entry(lap.condition.as_str()).or_default().push(lap);
    }
    by_code
}

fn driver_breakdown(laps: &[LapRecord]) -> Vec<DriverConditionStats> {
    let mut cells: BTreeMap<(DriverNumber, &str), Vec<&LapRecord>> = BTreeMap::new();
    for lap in laps {
        cells
            .entry((lap.driver, lap.condition.as_str()))
            .or_default()
            .push(lap);
    }

    cells
        .into_iter()
        .filter_map(|((driver, code), group)| {
            Some(DriverConditionStats {
                driver,
                code: code.to_string(),
                lap_count: group.len(),
                mean_lap_time: mean(&lap_times(&group))?,
                mean_top_speed: mean(&top_speeds(&group))?,
            })
        })
        .collect()
}

fn lap_times(laps: &[&LapRecord]) -> Vec<f64> {
    laps.iter().map(|l| l.lap_time).collect()
}

fn top_speeds(laps: &[&LapRecord]) -> Vec<f64> {
    laps.iter().map(|l| l.top_speed).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use laptime_core::models::SectorTimes;

    fn lap(driver: u32, lap_number: u32, lap_time: f64, top_speed: f64, code: &str) -> LapRecord {
        LapRecord::new(
            driver,
            "Race 1",
            lap_number,
            lap_time,
            SectorTimes::new(30.0, 35.0, lap_time - 65.0),
            top_speed,
            code,
        )
        .unwrap()
    }

    fn session() -> Vec<LapRecord> {
        vec![
            lap(1, 1, 101.0, 180.0, "GF"),
            lap(1, 2, 102.0, 182.0, "GF"),
            lap(1, 3, 103.0, 184.0, "GF"),
            lap(2, 1, 104.0, 170.0, "FF"),
            lap(2, 2, 105.0, 171.0, "FF"),
            lap(2, 3, 106.0, 172.0, "FF"),
            lap(2, 4, 130.0, 120.0, "FCY"),
        ]
    }

    #[test]
    fn test_groups_sorted_by_code_with_stats() {
        let report = ConditionAnalyzer::default().analyze(&session());
        let codes: Vec<&str> = report.groups.iter().map(|g| g.code.as_str()).collect();
        assert_eq!(codes, vec!["FCY", "FF", "GF"]);

        let gf = report.group("GF").unwrap();
        assert_eq!(gf.count, 3);
        assert!((gf.lap_time.mean.unwrap() - 102.0).abs() < 1e-12);
        assert!((gf.lap_time.std_dev.unwrap() - 1.0).abs() < 1e-12);
        assert!((gf.top_speed.mean.unwrap() - 182.0).abs() < 1e-12);

        let fcy = report.group("FCY").unwrap();
        assert_eq!(fcy.count, 1);
        assert_eq!(fcy.lap_time.std_dev, None);
    }

    #[test]
    fn test_comparison_computed() {
        let report = ConditionAnalyzer::default().analyze(&session());
        let comparison = report.comparison.as_ref().unwrap().comparison().unwrap();
        assert_eq!(comparison.baseline, "GF");
        assert_eq!(comparison.other, "FF");
        assert_eq!((comparison.baseline_count, comparison.other_count), (3, 3));
        assert!((comparison.test.mean_difference + 3.0).abs() < 1e-12);
        assert!((comparison.test.degrees_of_freedom - 4.0).abs() < 1e-9);
        assert!((0.0..=1.0).contains(&comparison.test.p_value));
        assert!(comparison.test.p_value < 0.05);
    }

    #[test]
    fn test_missing_group_is_not_applicable() {
        let laps: Vec<LapRecord> = session()
            .into_iter()
            .filter(|l| l.condition != "FF")
            .collect();
        let report = ConditionAnalyzer::default().analyze(&laps);
        match report.comparison {
            Some(ComparisonOutcome::NotApplicable { reason, .. }) => {
                assert!(reason.contains("FF"), "reason = {reason}");
            }
            other => panic!("expected not applicable, got {other:?}"),
        }
        assert_eq!(report.groups.len(), 2);
    }

    #[test]
    fn test_compare_reports_missing_group_error() {
        let analyzer = ConditionAnalyzer::default();
        let err = analyzer
            .compare(&session(), &ConditionPair::new("GF", "RED"))
            .unwrap_err();
        assert!(matches!(err, AnalysisError::MissingGroup(_)));
        assert!(err.is_not_applicable());
    }

    #[test]
    fn test_single_observation_group_is_insufficient() {
        let analyzer = ConditionAnalyzer::default();
        let err = analyzer
            .compare(&session(), &ConditionPair::new("GF", "FCY"))
            .unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InsufficientData {
                required: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_no_pair_skips_comparison() {
        let report = ConditionAnalyzer::new(None, 2).analyze(&session());
        assert!(report.comparison.is_none());
        assert_eq!(report.groups.len(), 3);
    }

    #[test]
    fn test_driver_breakdown() {
        let report = ConditionAnalyzer::default().analyze(&session());
        let cells: Vec<(u32, &str, usize)> = report
            .by_driver
            .iter()
            .map(|c| (c.driver, c.code.as_str(), c.lap_count))
            .collect();
        assert_eq!(cells, vec![(1, "GF", 3), (2, "FCY", 1), (2, "FF", 3)]);
        assert!((report.by_driver[2].mean_lap_time - 105.0).abs() < 1e-12);
        assert!((report.by_driver[2].mean_top_speed - 171.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_input() {
        let report = ConditionAnalyzer::default().analyze(&[]);
        assert!(report.groups.is_empty());
        assert!(report.by_driver.is_empty());
        assert!(report.comparison.unwrap().comparison().is_none());
    }
}

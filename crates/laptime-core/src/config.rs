use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};
use crate::models::MetricPair;
use crate::stats::{MIN_GROUP_OBSERVATIONS, MIN_PAIRED_OBSERVATIONS};

/// Default minimum lap count for a driver to be ranked for consistency.
pub const DEFAULT_MIN_LAPS: usize = 5;

/// Default significance threshold for reporting correlations.
pub const DEFAULT_SIGNIFICANCE: f64 = 0.05;

/// Condition codes compared by default: green flag vs. finish flag.
pub const DEFAULT_CONDITION_PAIR: (&str, &str) = ("GF", "FF");

/// The two condition codes whose lap times are tested against each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionPair {
    pub baseline: String,
    pub other: String,
}

impl ConditionPair {
    pub fn new(baseline: impl Into<String>, other: impl Into<String>) -> Self {
        Self {
            baseline: baseline.into(),
            other: other.into(),
        }
    }

    /// Parse `"GF,FF"` into a pair. Whitespace around codes is ignored.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut parts = spec.split(',').map(str::trim);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(b), None) if !a.is_empty() && !b.is_empty() => {
                if a == b {
                    return Err(AnalysisError::Config(format!(
                        "condition pair must name two different codes, got \"{spec}\""
                    )));
                }
                Ok(Self::new(a, b))
            }
            _ => Err(AnalysisError::Config(format!(
                "condition pair must look like \"GF,FF\", got \"{spec}\""
            ))),
        }
    }
}

impl Default for ConditionPair {
    fn default() -> Self {
        Self::new(DEFAULT_CONDITION_PAIR.0, DEFAULT_CONDITION_PAIR.1)
    }
}

/// Parameters for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Drivers with fewer laps are left out of the consistency ranking.
    pub min_laps: usize,
    /// Correlations with a p-value below this are reported as significant.
    pub significance: f64,
    /// Metric pairs examined by the correlation engine.
    pub metric_pairs: Vec<MetricPair>,
    /// Condition codes for the pairwise lap-time test; `None` skips it.
    pub condition_pair: Option<ConditionPair>,
    /// Drivers with fewer laps get no trend line.
    pub min_trend_laps: usize,
    /// Observations each condition group needs for the pairwise test.
    pub min_group_observations: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_laps: DEFAULT_MIN_LAPS,
            significance: DEFAULT_SIGNIFICANCE,
            metric_pairs: MetricPair::all(),
            condition_pair: Some(ConditionPair::default()),
            min_trend_laps: MIN_PAIRED_OBSERVATIONS,
            min_group_observations: MIN_GROUP_OBSERVATIONS,
        }
    }
}

impl AnalysisConfig {
    /// Reject values no analyzer can work with.
    pub fn validate(&self) -> Result<()> {
        if !(self.significance > 0.0 && self.significance < 1.0) {
            return Err(AnalysisError::Config(format!(
                "significance must lie strictly between 0 and 1, got {}",
                self.significance
            )));
        }
        if self.min_laps == 0 {
            return Err(AnalysisError::Config(
                "min_laps must be at least 1".to_string(),
            ));
        }
        if self.min_trend_laps < MIN_PAIRED_OBSERVATIONS {
            return Err(AnalysisError::Config(format!(
                "min_trend_laps must be at least {MIN_PAIRED_OBSERVATIONS}"
            )));
        }
        if self.min_group_observations < MIN_GROUP_OBSERVATIONS {
            return Err(AnalysisError::Config(format!(
                "min_group_observations must be at least {MIN_GROUP_OBSERVATIONS}"
            )));
        }
        if self.metric_pairs.is_empty() {
            return Err(AnalysisError::Config(
                "at least one metric pair is required".to_string(),
            ));
        }
        Ok(())
    }
}

//! Pearson correlation between telemetry metrics and lap performance.

use laptime_core::error::Result;
use laptime_core::models::{JoinedLapRow, MetricPair};
use laptime_core::stats::pearson;
use serde::Serialize;
use tracing::debug;

/// Correlation of one named pair of series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationResult {
    /// Pair name, e.g. `LAP_TIME_vs_mean_throttle`.
    pub pair: String,
    /// Pearson coefficient in `[-1, 1]`.
    pub coefficient: f64,
    /// Two-tailed probability of a correlation this strong with no linear
    /// relationship.
    pub p_value: f64,
    /// Paired observations used.
    pub n: usize,
}

impl CorrelationResult {
    pub fn is_significant(&self, threshold: f64) -> bool {
        self.p_value < threshold
    }
}

/// What the engine produced for one metric pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PairOutcome {
    Computed(CorrelationResult),
    /// The correlation is undefined for this data, e.g. too few joined laps
    /// or a metric that never varies.
    NotApplicable { pair: String, reason: String },
}

impl PairOutcome {
    pub fn pair(&self) -> &str {
        match self {
            PairOutcome::Computed(result) => &result.pair,
            PairOutcome::NotApplicable { pair, .. } => pair,
        }
    }

    pub fn result(&self) -> Option<&CorrelationResult> {
        match self {
            PairOutcome::Computed(result) => Some(result),
            PairOutcome::NotApplicable { .. } => None,
        }
    }
}

/// One outcome per configured metric pair, in configuration order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationReport {
    pub outcomes: Vec<PairOutcome>,
}

impl CorrelationReport {
    /// Results whose p-value is below `threshold`, strongest first.
    ///
    /// The full outcome list is left untouched.
    pub fn significant(&self, threshold: f64) -> Vec<&CorrelationResult> {
        let mut hits: Vec<&CorrelationResult> = self
            .computed()
            .filter(|r| r.is_significant(threshold))
            .collect();
        hits.sort_by(|a, b| {
            b.coefficient
                .abs()
                .total_cmp(&a.coefficient.abs())
                .then_with(|| a.pair.cmp(&b.pair))
        });
        hits
    }

    pub fn computed(&self) -> impl Iterator<Item = &CorrelationResult> {
        self.outcomes.iter().filter_map(PairOutcome::result)
    }

    pub fn not_applicable_count(&self) -> usize {
        self.outcomes.len() - self.computed().count()
    }
}

/// Correlates performance metrics with telemetry metrics over joined laps.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationEngine {
    pairs: Vec<MetricPair>,
}

impl Default for CorrelationEngine {
    fn default() -> Self {
        Self::new(MetricPair::all())
    }
}

impl CorrelationEngine {
    pub fn new(pairs: Vec<MetricPair>) -> Self {
        Self { pairs }
    }

    pub fn pairs(&self) -> &[MetricPair] {
        &self.pairs
    }

    /// Correlate two paired series under the given name.
    ///
    /// Fails with `InvalidInput` for unequal lengths, `InsufficientData` below
    /// three pairs and `DegenerateInput` when either series is constant.
    pub fn correlate(name: impl Into<String>, x: &[f64], y: &[f64]) -> Result<CorrelationResult> {
        let c = pearson(x, y)?;
        Ok(CorrelationResult {
            pair: name.into(),
            coefficient: c.coefficient,
            p_value: c.p_value,
            n: c.n,
        })
    }

    /// Correlate one metric pair over joined rows.
    pub fn correlate_rows(rows: &[JoinedLapRow], pair: MetricPair) -> Result<CorrelationResult> {
        let performance: Vec<f64> = rows.iter().map(|r| r.performance(pair.performance)).collect();
        let telemetry: Vec<f64> = rows
            .iter()
            .map(|r| r.telemetry_value(pair.telemetry))
            .collect();
        Self::correlate(pair.name(), &performance, &telemetry)
    }

    /// Run every configured pair.
    ///
    /// Statistical edge cases become [`PairOutcome::NotApplicable`]; any other
    /// error is returned.
    pub fn analyze(&self, rows: &[JoinedLapRow]) -> Result<CorrelationReport> {
        let mut outcomes = Vec::with_capacity(self.pairs.len());
        for &pair in &self.pairs {
            let outcome = match Self::correlate_rows(rows, pair) {
                Ok(result) => PairOutcome::Computed(result),
                Err(e) if e.is_not_applicable() => {
                    debug!("Correlation {} not applicable: {}", pair, e);
                    PairOutcome::NotApplicable {
                        pair: pair.name(),
                        reason: e.to_string(),
                    }
                }
                Err(e) => return Err(e),
            };
            outcomes.push(outcome);
        }

        let report = CorrelationReport { outcomes };
        debug!(
            "Correlations: {} computed, {} not applicable over {} rows",
            report.computed().count(),
            report.not_applicable_count(),
            rows.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use laptime_core::error::AnalysisError;
    use laptime_core::models::{
        LapRecord, PerLapSummary, PerformanceMetric, SectorTimes, TelemetryMetric,
    };

    fn row(lap_number: u32, lap_time: f64, throttle: f64, brake: f64) -> JoinedLapRow {
        JoinedLapRow {
            lap: LapRecord::new(
                1,
                "Race 1",
                lap_number,
                lap_time,
                SectorTimes::new(30.0, 35.0, lap_time - 65.0),
                180.0,
                "GF",
            )
            .unwrap(),
            telemetry: PerLapSummary {
                driver: 1,
                lap: lap_number,
                mean_throttle: throttle,
                mean_brake: brake,
                steering_smoothness: 1.0,
            },
        }
    }

    fn rows() -> Vec<JoinedLapRow> {
        vec![
            row(1, 101.0, 2.0, 5.0),
            row(2, 102.0, 1.0, 4.0),
            row(3, 103.0, 4.0, 3.0),
            row(4, 104.0, 3.0, 2.0),
            row(5, 105.0, 5.0, 1.0),
        ]
    }

    #[test]
    fn test_correlate_known_value() {
        let r = CorrelationEngine::correlate(
            "x_vs_y",
            &[1.0, 2.0, 3.0, 4.0, 5.0],
            &[2.0, 1.0, 4.0, 3.0, 5.0],
        )
        .unwrap();
        assert_eq!(r.pair, "x_vs_y");
        assert!((r.coefficient - 0.8).abs() < 1e-12);
        assert!((r.p_value - 0.1041).abs() < 1e-3, "p = {}", r.p_value);
        assert_eq!(r.n, 5);
    }

    #[test]
    fn test_correlate_is_symmetric_and_bounded() {
        let x = [3.1, 4.7, 1.2, 9.9, 5.5, 2.0];
        let y = [10.0, 12.5, 8.0, 20.1, 13.0, 7.5];
        let xy = CorrelationEngine::correlate("xy", &x, &y).unwrap();
        let yx = CorrelationEngine::correlate("yx", &y, &x).unwrap();
        assert_eq!(xy.coefficient, yx.coefficient);
        assert_eq!(xy.p_value, yx.p_value);
        assert!((-1.0..=1.0).contains(&xy.coefficient));
        assert!((0.0..=1.0).contains(&xy.p_value));
    }

    #[test]
    fn test_correlate_too_few_pairs() {
        assert!(matches!(
            CorrelationEngine::correlate("p", &[1.0, 2.0], &[2.0, 3.0]),
            Err(AnalysisError::InsufficientData {
                required: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_correlate_constant_series_is_degenerate() {
        assert!(matches!(
            CorrelationEngine::correlate("p", &[1.0, 2.0, 3.0], &[4.0, 4.0, 4.0]),
            Err(AnalysisError::DegenerateInput(_))
        ));
    }

    #[test]
    fn test_correlate_unequal_lengths() {
        assert!(matches!(
            CorrelationEngine::correlate("p", &[1.0, 2.0, 3.0], &[1.0, 2.0]),
            Err(AnalysisError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_correlate_rows_uses_selected_fields() {
        let pair = MetricPair::new(PerformanceMetric::LapTime, TelemetryMetric::MeanBrake);
        let r = CorrelationEngine::correlate_rows(&rows(), pair).unwrap();
        assert_eq!(r.pair, "LAP_TIME_vs_mean_brake");
        assert!((r.coefficient + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_analyze_returns_one_outcome_per_pair() {
        let report = CorrelationEngine::default().analyze(&rows()).unwrap();
        assert_eq!(report.outcomes.len(), 12);

        // S1, S2 and steering smoothness never vary in the fixture.
        assert!(report
            .outcomes
            .iter()
            .filter(|o| o.pair().ends_with("steering_smoothness") || o.pair().starts_with("S1"))
            .all(|o| o.result().is_none()));
        assert_eq!(report.computed().count(), 4);

        let lap_vs_throttle = report
            .outcomes
            .iter()
            .find(|o| o.pair() == "LAP_TIME_vs_mean_throttle")
            .and_then(PairOutcome::result)
            .unwrap();
        assert!((lap_vs_throttle.coefficient - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_analyze_with_too_few_rows_is_all_not_applicable() {
        let report = CorrelationEngine::default().analyze(&rows()[..2]).unwrap();
        assert_eq!(report.not_applicable_count(), 12);
        assert!(report.significant(0.05).is_empty());
    }

    #[test]
    fn test_significant_is_a_filtered_view() {
        let report = CorrelationEngine::default().analyze(&rows()).unwrap();
        let total = report.outcomes.len();

        let significant = report.significant(0.05);
        assert!(significant.iter().all(|r| r.p_value < 0.05));
        assert!(significant.iter().any(|r| r.pair == "LAP_TIME_vs_mean_brake"));
        assert!(!significant.iter().any(|r| r.pair == "LAP_TIME_vs_mean_throttle"));
        assert_eq!(report.outcomes.len(), total);
    }

    #[test]
    fn test_outcomes_serialize_with_status_tag() {
        let report = CorrelationEngine::default().analyze(&rows()[..2]).unwrap();
        let json = serde_json::to_value(&report).unwrap();

        let first = &json["outcomes"][0];
        assert_eq!(first["status"], "not_applicable");
        assert_eq!(first["pair"], "LAP_TIME_vs_mean_throttle");
        assert!(first["reason"].is_string());

        let report = CorrelationEngine::default().analyze(&rows()).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcomes"][0]["status"], "computed");
        assert_eq!(json["outcomes"][0]["n"], 5);
    }
}

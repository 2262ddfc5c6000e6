use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AnalysisError, Result};

/// Car / driver number as printed on the timing sheet.
pub type DriverNumber = u32;

/// One-based lap counter within a session.
pub type LapNumber = u32;

/// The `(driver, lap)` key on which lap records and telemetry are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LapKey {
    pub driver: DriverNumber,
    pub lap: LapNumber,
}

impl LapKey {
    pub fn new(driver: DriverNumber, lap: LapNumber) -> Self {
        Self { driver, lap }
    }
}

impl fmt::Display for LapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} L{}", self.driver, self.lap)
    }
}

// ── Lap records ───────────────────────────────────────────────────────────────

/// The three timed sectors of a lap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Sector {
    S1,
    S2,
    S3,
}

impl Sector {
    pub const ALL: [Sector; 3] = [Sector::S1, Sector::S2, Sector::S3];
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Sector::S1 => "S1",
            Sector::S2 => "S2",
            Sector::S3 => "S3",
        };
        f.write_str(name)
    }
}

/// Sector split times in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectorTimes {
    pub s1: f64,
    pub s2: f64,
    pub s3: f64,
}

impl SectorTimes {
    pub fn new(s1: f64, s2: f64, s3: f64) -> Self {
        Self { s1, s2, s3 }
    }

    pub fn get(&self, sector: Sector) -> f64 {
        match sector {
            Sector::S1 => self.s1,
            Sector::S2 => self.s2,
            Sector::S3 => self.s3,
        }
    }

    pub fn sum(&self) -> f64 {
        self.s1 + self.s2 + self.s3
    }
}

/// One completed lap's timing and track-condition data for one driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LapRecord {
    /// Car number of the driver.
    pub driver: DriverNumber,
    /// Session the lap belongs to (e.g. `"COTA Race 1"`).
    pub session: String,
    /// One-based lap number.
    pub lap_number: LapNumber,
    /// Lap time in seconds.
    pub lap_time: f64,
    /// Sector splits in seconds.
    pub sectors: SectorTimes,
    /// Highest speed reached on the lap (km/h).
    pub top_speed: f64,
    /// Flag state at the finish line, e.g. `"GF"` (green) or `"FF"` (finish).
    pub condition: String,
}

impl LapRecord {
    /// Build a validated lap record.
    ///
    /// Fails with [`AnalysisError::InvalidRecord`] when the lap number is zero,
    /// a time is not a positive finite number, or the top speed is not finite.
    pub fn new(
        driver: DriverNumber,
        session: impl Into<String>,
        lap_number: LapNumber,
        lap_time: f64,
        sectors: SectorTimes,
        top_speed: f64,
        condition: impl Into<String>,
    ) -> Result<Self> {
        let record = Self {
            driver,
            session: session.into(),
            lap_number,
            lap_time,
            sectors,
            top_speed,
            condition: condition.into(),
        };
        record.validate()?;
        Ok(record)
    }

    /// Check the record's field invariants.
    pub fn validate(&self) -> Result<()> {
        if self.lap_number == 0 {
            return Err(AnalysisError::InvalidRecord(format!(
                "driver {}: lap number must be positive",
                self.driver
            )));
        }
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.lap_time) {
            return Err(AnalysisError::InvalidRecord(format!(
                "{}: lap time {} is not a positive number",
                self.key(),
                self.lap_time
            )));
        }
        for sector in Sector::ALL {
            let t = self.sectors.get(sector);
            if !positive(t) {
                return Err(AnalysisError::InvalidRecord(format!(
                    "{}: {sector} time {t} is not a positive number",
                    self.key()
                )));
            }
        }
        if !self.top_speed.is_finite() {
            return Err(AnalysisError::InvalidRecord(format!(
                "{}: top speed is not finite",
                self.key()
            )));
        }
        Ok(())
    }

    pub fn key(&self) -> LapKey {
        LapKey::new(self.driver, self.lap_number)
    }

    /// Sum of the three sector times.
    pub fn sector_sum(&self) -> f64 {
        self.sectors.sum()
    }

    /// Absolute difference between the sector sum and the lap time.
    pub fn sector_gap(&self) -> f64 {
        (self.sector_sum() - self.lap_time).abs()
    }
}

// ── Telemetry ─────────────────────────────────────────────────────────────────

/// One timestamped sensor reading taken during a lap.
///
/// Sensor channels are optional because the logger does not record every
/// channel at every timestamp; a missing reading is absent, not zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub driver: DriverNumber,
    pub lap: LapNumber,
    pub timestamp: DateTime<Utc>,
    /// Vehicle speed (km/h).
    pub speed: Option<f64>,
    /// Steering wheel angle (degrees).
    pub steering_angle: Option<f64>,
    /// Longitudinal acceleration (g).
    pub accel_longitudinal: Option<f64>,
    /// Lateral acceleration (g).
    pub accel_lateral: Option<f64>,
    /// Throttle pedal position (%).
    pub throttle: Option<f64>,
    /// Brake pressure / pedal (%).
    pub brake: Option<f64>,
    /// Engine speed (rpm).
    pub rpm: Option<f64>,
    pub gear: Option<i32>,
}

impl TelemetrySample {
    pub fn key(&self) -> LapKey {
        LapKey::new(self.driver, self.lap)
    }
}

/// Aggregated telemetry statistics for exactly one lap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerLapSummary {
    pub driver: DriverNumber,
    pub lap: LapNumber,
    /// Mean throttle position over the lap (%).
    pub mean_throttle: f64,
    /// Mean brake pressure over the lap.
    pub mean_brake: f64,
    /// Variability of steering input; lower is smoother.
    pub steering_smoothness: f64,
}

impl PerLapSummary {
    pub fn key(&self) -> LapKey {
        LapKey::new(self.driver, self.lap)
    }
}

/// A lap record paired with the telemetry summary for the same lap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedLapRow {
    pub lap: LapRecord,
    pub telemetry: PerLapSummary,
}

impl JoinedLapRow {
    pub fn key(&self) -> LapKey {
        self.lap.key()
    }

    pub fn performance(&self, metric: PerformanceMetric) -> f64 {
        metric.value(&self.lap)
    }

    pub fn telemetry_value(&self, metric: TelemetryMetric) -> f64 {
        metric.value(&self.telemetry)
    }
}

// ── Metric selectors ──────────────────────────────────────────────────────────

/// Lap-timing fields usable as the performance side of a correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PerformanceMetric {
    LapTime,
    Sector(Sector),
}

impl PerformanceMetric {
    pub const ALL: [PerformanceMetric; 4] = [
        PerformanceMetric::LapTime,
        PerformanceMetric::Sector(Sector::S1),
        PerformanceMetric::Sector(Sector::S2),
        PerformanceMetric::Sector(Sector::S3),
    ];

    pub fn value(&self, lap: &LapRecord) -> f64 {
        match self {
            PerformanceMetric::LapTime => lap.lap_time,
            PerformanceMetric::Sector(sector) => lap.sectors.get(*sector),
        }
    }
}

impl fmt::Display for PerformanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PerformanceMetric::LapTime => f.write_str("LAP_TIME"),
            PerformanceMetric::Sector(sector) => write!(f, "{sector}_SEC"),
        }
    }
}

/// Per-lap telemetry fields usable as the driving-style side of a correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TelemetryMetric {
    MeanThrottle,
    MeanBrake,
    SteeringSmoothness,
}

impl TelemetryMetric {
    pub const ALL: [TelemetryMetric; 3] = [
        TelemetryMetric::MeanThrottle,
        TelemetryMetric::MeanBrake,
        TelemetryMetric::SteeringSmoothness,
    ];

    pub fn value(&self, summary: &PerLapSummary) -> f64 {
        match self {
            TelemetryMetric::MeanThrottle => summary.mean_throttle,
            TelemetryMetric::MeanBrake => summary.mean_brake,
            TelemetryMetric::SteeringSmoothness => summary.steering_smoothness,
        }
    }
}

impl fmt::Display for TelemetryMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TelemetryMetric::MeanThrottle => "mean_throttle",
            TelemetryMetric::MeanBrake => "mean_brake",
            TelemetryMetric::SteeringSmoothness => "steering_smoothness",
        };
        f.write_str(name)
    }
}

/// A (performance, telemetry) pair examined by the correlation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MetricPair {
    pub performance: PerformanceMetric,
    pub telemetry: TelemetryMetric,
}

impl MetricPair {
    pub fn new(performance: PerformanceMetric, telemetry: TelemetryMetric) -> Self {
        Self {
            performance,
            telemetry,
        }
    }

    /// Every performance metric crossed with every telemetry metric.
    pub fn all() -> Vec<MetricPair> {
        PerformanceMetric::ALL
            .iter()
            .flat_map(|&p| TelemetryMetric::ALL.iter().map(move |&t| MetricPair::new(p, t)))
            .collect()
    }

    /// Display name, e.g. `"LAP_TIME_vs_mean_throttle"`.
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MetricPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_vs_{}", self.performance, self.telemetry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sectors() -> SectorTimes {
        SectorTimes::new(40.0, 55.0, 35.5)
    }

    #[test]
    fn test_lap_record_new_valid() {
        let lap = LapRecord::new(13, "R1", 4, 130.6, sectors(), 210.3, "GF").unwrap();
        assert_eq!(lap.key(), LapKey::new(13, 4));
        assert!((lap.sector_sum() - 130.5).abs() < 1e-9);
        assert!((lap.sector_gap() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_lap_record_rejects_zero_lap_number() {
        let err = LapRecord::new(13, "R1", 0, 130.0, sectors(), 210.0, "GF").unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidRecord(_)));
    }

    #[test]
    fn test_lap_record_rejects_non_positive_times() {
        assert!(LapRecord::new(13, "R1", 1, 0.0, sectors(), 210.0, "GF").is_err());
        assert!(LapRecord::new(13, "R1", 1, f64::NAN, sectors(), 210.0, "GF").is_err());
        let bad = SectorTimes::new(40.0, -1.0, 35.0);
        assert!(LapRecord::new(13, "R1", 1, 130.0, bad, 210.0, "GF").is_err());
    }

    #[test]
    fn test_lap_record_rejects_infinite_speed() {
        assert!(LapRecord::new(13, "R1", 1, 130.0, sectors(), f64::INFINITY, "GF").is_err());
    }

    #[test]
    fn test_metric_pair_names() {
        let pair = MetricPair::new(PerformanceMetric::LapTime, TelemetryMetric::MeanThrottle);
        assert_eq!(pair.name(), "LAP_TIME_vs_mean_throttle");
        let pair = MetricPair::new(
            PerformanceMetric::Sector(Sector::S2),
            TelemetryMetric::SteeringSmoothness,
        );
        assert_eq!(pair.name(), "S2_SEC_vs_steering_smoothness");
    }

    #[test]
    fn test_metric_pair_all_is_full_cross_product() {
        let pairs = MetricPair::all();
        assert_eq!(pairs.len(), 12);
        assert_eq!(
            pairs[0],
            MetricPair::new(PerformanceMetric::LapTime, TelemetryMetric::MeanThrottle)
        );
    }

    #[test]
    fn test_joined_row_selectors() {
        let lap = LapRecord::new(7, "R1", 2, 131.0, sectors(), 200.0, "GF").unwrap();
        let telemetry = PerLapSummary {
            driver: 7,
            lap: 2,
            mean_throttle: 62.5,
            mean_brake: 11.0,
            steering_smoothness: 3.2,
        };
        let row = JoinedLapRow { lap, telemetry };
        assert_eq!(row.performance(PerformanceMetric::LapTime), 131.0);
        assert_eq!(row.performance(PerformanceMetric::Sector(Sector::S3)), 35.5);
        assert_eq!(row.telemetry_value(TelemetryMetric::MeanBrake), 11.0);
    }

    #[test]
    fn test_lap_key_ordering() {
        let mut keys = vec![LapKey::new(2, 1), LapKey::new(1, 5), LapKey::new(1, 2)];
        keys.sort();
        assert_eq!(
            keys,
            vec![LapKey::new(1, 2), LapKey::new(1, 5), LapKey::new(2, 1)]
        );
    }
}

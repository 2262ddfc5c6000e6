//! Data and analysis layer for lap-time analytics.
//!
//! Responsible for reading lap, telemetry and telemetry-summary CSV files,
//! joining laps with telemetry, and running the correlation, consistency,
//! trend, condition and performance analyzers through the top-level pipeline.

use std::collections::BTreeMap;

use laptime_core::models::{DriverNumber, LapRecord};

pub mod analysis;
pub mod conditions;
pub mod consistency;
pub mod correlation;
pub mod join;
pub mod performance;
pub mod reader;
pub mod telemetry;
pub mod trend;

pub use laptime_core as core;

/// Group lap records by driver, keeping input order within each driver.
pub fn group_by_driver<'a>(
    laps: impl IntoIterator<Item = &'a LapRecord>,
) -> BTreeMap<DriverNumber, Vec<&'a LapRecord>> {
    let mut by_driver: BTreeMap<DriverNumber, Vec<&'a LapRecord>> = BTreeMap::new();
    for lap in laps {
        by_driver.entry(lap.driver).or_default().push(lap);
    }
    by_driver
}

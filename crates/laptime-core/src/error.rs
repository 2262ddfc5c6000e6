use std::path::PathBuf;
use thiserror::Error;

use crate::models::{DriverNumber, LapNumber};

/// All errors produced by the lap-time analytics crates.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Two input rows share the same `(driver, lap)` join key.
    #[error("Duplicate key in {table}: driver {driver}, lap {lap}")]
    DuplicateKey {
        table: &'static str,
        driver: DriverNumber,
        lap: LapNumber,
    },

    /// A per-driver result table received a second entry for one driver.
    #[error("Duplicate result for driver {0}")]
    DuplicateDriver(DriverNumber),

    /// Fewer observations than the statistic needs.
    #[error("Insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// An input series has zero variance, so the statistic is undefined.
    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    /// A categorical group required for a pairwise comparison is absent.
    #[error("Missing group: {0}")]
    MissingGroup(String),

    /// A record failed validation when it was constructed.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Caller-supplied input is malformed (e.g. paired series of unequal length).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A CSV line could not be split into the expected fields.
    #[error("Failed to parse {path} line {line}: {message}")]
    CsvParse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// A CSV header lacks a column the loader requires.
    #[error("Missing column {column} in {path}")]
    MissingColumn { path: PathBuf, column: String },

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AnalysisError {
    /// Whether the error marks a statistic as "not computable" rather than a
    /// broken input.
    ///
    /// Statistical edge cases are rendered as "insufficient data" or "n/a" by
    /// callers; everything else aborts the offending computation.
    pub fn is_not_applicable(&self) -> bool {
        matches!(
            self,
            AnalysisError::InsufficientData { .. }
                | AnalysisError::DegenerateInput(_)
                | AnalysisError::MissingGroup(_)
        )
    }
}

/// Convenience alias used throughout the analytics crates.
pub type Result<T> = std::result::Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_duplicate_key() {
        let err = AnalysisError::DuplicateKey {
            table: "lap records",
            driver: 13,
            lap: 4,
        };
        assert_eq!(
            err.to_string(),
            "Duplicate key in lap records: driver 13, lap 4"
        );
    }

    #[test]
    fn test_error_display_insufficient_data() {
        let err = AnalysisError::InsufficientData {
            required: 3,
            actual: 2,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient data: need at least 3 observations, got 2"
        );
    }

    #[test]
    fn test_error_display_missing_column() {
        let err = AnalysisError::MissingColumn {
            path: PathBuf::from("/data/laps.csv"),
            column: "LAP_TIME_SEC".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("LAP_TIME_SEC"));
        assert!(msg.contains("/data/laps.csv"));
    }

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = AnalysisError::FileRead {
            path: PathBuf::from("/some/laps.csv"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: AnalysisError = io_err.into();
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_not_applicable_classification() {
        assert!(AnalysisError::InsufficientData {
            required: 3,
            actual: 1
        }
        .is_not_applicable());
        assert!(AnalysisError::DegenerateInput("flat".to_string()).is_not_applicable());
        assert!(AnalysisError::MissingGroup("FF".to_string()).is_not_applicable());
        assert!(!AnalysisError::DuplicateDriver(7).is_not_applicable());
        assert!(!AnalysisError::Config("bad".to_string()).is_not_applicable());
    }
}

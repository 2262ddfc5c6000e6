//! Core types for lap-time analytics.
//!
//! Holds the record model shared by every analyzer, the error taxonomy, the
//! statistical primitives (Pearson correlation, least-squares trend, Welch's
//! t-test), typed per-driver result tables, analysis parameters and the
//! command-line settings of the `laptime-analyzer` binary.

pub mod config;
pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
pub mod stats;
pub mod table;
pub mod timestamps;

pub use error::{AnalysisError, Result};

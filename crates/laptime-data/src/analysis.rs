//! Main analysis pipeline for lap-time analytics.
//!
//! Loads one session's lap and telemetry tables, joins them and runs every
//! analyzer, returning an [`AnalysisReport`] ready for rendering.

use std::path::PathBuf;

use chrono::Utc;
use laptime_core::config::AnalysisConfig;
use laptime_core::error::Result;
use laptime_core::formatting::percentage;
use laptime_core::models::{LapRecord, PerLapSummary};
use serde::Serialize;
use tracing::{debug, info};

use crate::conditions::{ConditionAnalyzer, ConditionReport};
use crate::consistency::{ConsistencyAnalyzer, ConsistencyReport};
use crate::correlation::{CorrelationEngine, CorrelationReport};
use crate::join::{JoinEngine, JoinOutcome};
use crate::performance::{summarize_performance, PerformanceReport};
use crate::reader::{load_laps, load_per_lap_summaries, load_telemetry_samples, LoadReport};
use crate::telemetry::summarize_laps;
use crate::trend::{TrendAnalyzer, TrendReport};

// ── Public types ──────────────────────────────────────────────────────────────

/// Files making up one session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSources {
    /// A lap-time CSV or a directory of `driver_<n>.csv` files.
    pub laps: PathBuf,
    /// Precomputed per-lap telemetry summaries.
    pub telemetry_summary: Option<PathBuf>,
    /// Raw telemetry samples, summarized when no summary file is given.
    pub telemetry: Option<PathBuf>,
    /// Session name for lap rows that do not carry one.
    pub session: String,
}

/// Where the per-lap telemetry summaries came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SummarySource {
    File,
    Telemetry,
    None,
}

/// One session's records, ready for [`analyze_session`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionData {
    pub session: String,
    pub laps: Vec<LapRecord>,
    pub summaries: Vec<PerLapSummary>,
    pub summary_source: SummarySource,
    /// One report per table read.
    pub loads: Vec<LoadReport>,
}

impl SessionData {
    /// Wrap records that are already in memory.
    pub fn new(session: impl Into<String>, laps: Vec<LapRecord>, summaries: Vec<PerLapSummary>) -> Self {
        let summary_source = if summaries.is_empty() {
            SummarySource::None
        } else {
            SummarySource::File
        };
        Self {
            session: session.into(),
            laps,
            summaries,
            summary_source,
            loads: Vec::new(),
        }
    }
}

/// Counts describing one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisMetadata {
    /// ISO-8601 timestamp when this report was generated.
    pub generated_at: String,
    pub session: String,
    pub laps_loaded: usize,
    pub summaries_loaded: usize,
    pub summary_source: SummarySource,
    /// Input rows dropped by the CSV reader.
    pub rows_skipped: usize,
    pub joined_rows: usize,
    pub unmatched_rows: usize,
    pub orphaned_summaries: usize,
    /// Joined rows as a percentage of lap records; `None` without laps.
    pub coverage_percent: Option<f64>,
    pub driver_count: usize,
    /// Wall-clock seconds spent in the analyzers.
    pub analysis_time_seconds: f64,
}

/// The complete output of [`analyze_session`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub metadata: AnalysisMetadata,
    pub config: AnalysisConfig,
    pub join: JoinOutcome,
    pub correlations: CorrelationReport,
    pub consistency: ConsistencyReport,
    pub trends: TrendReport,
    pub conditions: ConditionReport,
    pub performance: PerformanceReport,
}

// ── Public functions ──────────────────────────────────────────────────────────

/// Read every table named in `sources`.
///
/// Summaries come from `telemetry_summary` when given, otherwise they are
/// derived from `telemetry`; with neither, the session has no summaries and
/// every lap is reported as unmatched.
pub fn load_session(sources: &SessionSources) -> Result<SessionData> {
    let laps = load_laps(&sources.laps, &sources.session)?;
    let mut loads = vec![laps.report];

    let (summaries, summary_source) = match (&sources.telemetry_summary, &sources.telemetry) {
        (Some(path), _) => {
            let loaded = load_per_lap_summaries(path)?;
            loads.push(loaded.report);
            (loaded.records, SummarySource::File)
        }
        (None, Some(path)) => {
            let loaded = load_telemetry_samples(path)?;
            loads.push(loaded.report);
            (summarize_laps(&loaded.records), SummarySource::Telemetry)
        }
        (None, None) => {
            info!("No telemetry given; correlations will be not applicable");
            (Vec::new(), SummarySource::None)
        }
    };

    debug!(
        "Session {}: {} laps, {} telemetry summaries ({:?})",
        sources.session,
        laps.records.len(),
        summaries.len(),
        summary_source
    );

    Ok(SessionData {
        session: sources.session.clone(),
        laps: laps.records,
        summaries,
        summary_source,
        loads,
    })
}

/// Run the full analysis pipeline.
///
/// 1. Validate `config`.
/// 2. Join laps with telemetry summaries via [`JoinEngine`].
/// 3. Correlate joined rows via [`CorrelationEngine`].
/// 4. Score consistency, fit trends, group by condition and summarize pace
///    over all lap records.
///
/// Statistical edge cases surface as "not applicable" entries in the
/// report. Duplicate join keys and invalid configuration are errors.
pub fn analyze_session(data: &SessionData, config: &AnalysisConfig) -> Result<AnalysisReport> {
    config.validate()?;
    let start = std::time::Instant::now();

    // ── Step 1: Join ──────────────────────────────────────────────────────────
    let join = JoinEngine::join(&data.laps, &data.summaries)?;

    // ── Step 2: Correlations ──────────────────────────────────────────────────
    let correlations = CorrelationEngine::new(config.metric_pairs.clone()).analyze(&join.rows)?;

    // ── Step 3: Per-driver analyzers ──────────────────────────────────────────
    let consistency = ConsistencyAnalyzer::new(config.min_laps).analyze(&data.laps)?;
    let trends = TrendAnalyzer::new(config.min_trend_laps).analyze(&data.laps)?;
    let conditions = ConditionAnalyzer::new(
        config.condition_pair.clone(),
        config.min_group_observations,
    )
    .analyze(&data.laps);
    let performance = summarize_performance(&data.laps)?;

    // ── Step 4: Build report ──────────────────────────────────────────────────
    let metadata = AnalysisMetadata {
        generated_at: Utc::now().to_rfc3339(),
        session: data.session.clone(),
        laps_loaded: data.laps.len(),
        summaries_loaded: data.summaries.len(),
        summary_source: data.summary_source,
        rows_skipped: data.loads.iter().map(|r| r.rows_skipped).sum(),
        joined_rows: join.rows.len(),
        unmatched_rows: join.unmatched_count(),
        orphaned_summaries: join.orphaned_summaries,
        coverage_percent: percentage(join.rows.len() as f64, data.laps.len() as f64, 1),
        driver_count: performance.drivers.len(),
        analysis_time_seconds: start.elapsed().as_secs_f64(),
    };

    info!(
        "Analyzed {} laps from {} drivers ({} joined with telemetry)",
        metadata.laps_loaded, metadata.driver_count, metadata.joined_rows
    );

    Ok(AnalysisReport {
        metadata,
        config: config.clone(),
        join,
        correlations,
        consistency,
        trends,
        conditions,
        performance,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

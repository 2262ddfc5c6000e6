use std::ffi::OsString;
use std::path::{Path, PathBuf};

use clap::parser::ValueSource;
use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};

use crate::config::{AnalysisConfig, ConditionPair};
use crate::error::Result;

// ── Command line ──────────────────────────────────────────────────────────────

/// Lap-time, telemetry and track-condition analytics for race sessions
#[derive(Parser, Debug, Clone)]
#[command(
    name = "laptime-analyzer",
    about = "Lap-time, telemetry and track-condition analytics for race sessions",
    version
)]
pub struct Settings {
    /// Lap-time CSV file, or a directory of driver_<n>.csv files
    #[arg(long)]
    pub laps: Option<PathBuf>,

    /// Per-lap telemetry summary CSV
    #[arg(long)]
    pub telemetry_summary: Option<PathBuf>,

    /// Per-timestamp telemetry CSV (summarised per lap when no summary file is given)
    #[arg(long)]
    pub telemetry: Option<PathBuf>,

    /// Session label for lap files without a session column
    #[arg(long, default_value = "session")]
    pub session: String,

    /// Minimum laps for a driver to be ranked for consistency
    #[arg(long, default_value = "5", value_parser = clap::value_parser!(u32).range(1..))]
    pub min_laps: u32,

    /// p-value below which a correlation is reported as significant
    #[arg(long, default_value = "0.05")]
    pub significance: f64,

    /// Condition codes to compare, e.g. "GF,FF"
    #[arg(long, default_value = "GF,FF")]
    pub compare: String,

    /// Rows shown per ranked table
    #[arg(long, default_value = "10")]
    pub top: usize,

    /// Output format
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Forget the parameters remembered from earlier runs
    #[arg(long)]
    pub clear: bool,
}

// ── Saved parameters ──────────────────────────────────────────────────────────

/// Analysis parameters remembered between runs in
/// `~/.laptime-analyzer/last_used.json`.
///
/// Logging and presentation flags other than `--format` are not remembered.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct LastUsedParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub laps: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telemetry_summary: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_laps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub significance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

const APP_DIR: &str = ".laptime-analyzer";
const SAVED_FILE: &str = "last_used.json";

impl LastUsedParams {
    /// `~/.laptime-analyzer/last_used.json`, or the same path under the
    /// working directory when no home directory is known.
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::path_under(&home)
    }

    pub fn path_under(home: &Path) -> PathBuf {
        home.join(APP_DIR).join(SAVED_FILE)
    }

    /// Saved parameters at `path`. A missing or unreadable file yields the
    /// empty set.
    pub fn read(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                tracing::debug!("Ignoring unreadable {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Replace the file at `path`. Content goes to a sibling `.tmp` file
    /// first and is renamed into place.
    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let body = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        let staging = path.with_extension("json.tmp");
        std::fs::write(&staging, body)?;
        std::fs::rename(&staging, path)
    }

    pub fn remove(path: &Path) -> std::io::Result<()> {
        match std::fs::remove_file(path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    fn capture(settings: &Settings) -> Self {
        LastUsedParams {
            laps: settings.laps.clone(),
            telemetry_summary: settings.telemetry_summary.clone(),
            telemetry: settings.telemetry.clone(),
            min_laps: Some(settings.min_laps),
            significance: Some(settings.significance),
            compare: Some(settings.compare.clone()),
            format: Some(settings.format.clone()),
        }
    }
}

// ── Settings loading ──────────────────────────────────────────────────────────

impl Settings {
    /// Parse the process arguments, fill unset analysis parameters from the
    /// previous run, and remember the result for the next one.
    pub fn load_with_last_used() -> Self {
        Self::from_args_with_saved(std::env::args_os().collect(), &LastUsedParams::default_path())
    }

    /// [`Settings::load_with_last_used`] with explicit arguments and saved-file
    /// location.
    pub fn from_args_with_saved(args: Vec<OsString>, saved: &Path) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }

        if settings.clear {
            if let Err(e) = LastUsedParams::remove(saved) {
                tracing::warn!("Could not clear {}: {}", saved.display(), e);
            }
            return settings;
        }

        let last = LastUsedParams::read(saved);

        // Path options have no default, so absence means "not given".
        settings.laps = settings.laps.take().or(last.laps);
        settings.telemetry_summary = settings.telemetry_summary.take().or(last.telemetry_summary);
        settings.telemetry = settings.telemetry.take().or(last.telemetry);

        // Options with defaults are only replaced when not typed on the command
        // line. Clap ids are field names, with underscores.
        let typed = |id: &str| matches.value_source(id) == Some(ValueSource::CommandLine);
        if let Some(v) = last.min_laps.filter(|_| !typed("min_laps")) {
            settings.min_laps = v;
        }
        if let Some(v) = last.significance.filter(|_| !typed("significance")) {
            settings.significance = v;
        }
        if let Some(v) = last.compare.filter(|_| !typed("compare")) {
            settings.compare = v;
        }
        if let Some(v) = last.format.filter(|_| !typed("format")) {
            settings.format = v;
        }

        // Rejected values are left for `analysis_config` to report, and are not
        // carried into the next run.
        if let Err(e) = settings.analysis_config() {
            tracing::debug!("Not saving parameters: {}", e);
        } else if let Err(e) = LastUsedParams::capture(&settings).write(saved) {
            tracing::warn!("Could not save {}: {}", saved.display(), e);
        }

        settings
    }

    /// Build the analysis parameters described by these settings.
    ///
    /// An empty `--compare` value disables the pairwise condition test.
    pub fn analysis_config(&self) -> Result<AnalysisConfig> {
        let condition_pair = if self.compare.trim().is_empty() {
            None
        } else {
            Some(ConditionPair::parse(&self.compare)?)
        };
        let config = AnalysisConfig {
            min_laps: self.min_laps as usize,
            significance: self.significance,
            condition_pair,
            ..AnalysisConfig::default()
        };
        config.validate()?;
        Ok(config)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

//! CSV discovery and loading for lap-time analytics.
//!
//! Reads lap timing tables, per-timestamp telemetry logs and per-lap telemetry
//! summaries into the typed records of [`laptime_core::models`]. Headers are
//! matched case-insensitively against a short alias list per column; a row
//! with a bad value is skipped (and counted) rather than aborting the load.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use laptime_core::error::{AnalysisError, Result};
use laptime_core::models::{
    DriverNumber, LapRecord, PerLapSummary, SectorTimes, TelemetrySample,
};
use laptime_core::timestamps::TimestampProcessor;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

// ── Column aliases ────────────────────────────────────────────────────────────

const DRIVER_COLUMNS: &[&str] = &["NUMBER", "DRIVER_NUMBER", "DRIVER_NUM", "vehicle_number"];
const SESSION_COLUMNS: &[&str] = &["SESSION", "SOURCE_DIR"];
const LAP_COLUMNS: &[&str] = &["LAP_NUMBER", "LAP"];
const LAP_TIME_COLUMNS: &[&str] = &["LAP_TIME_SEC", "LAP_TIME"];
const S1_COLUMNS: &[&str] = &["S1_SEC", "S1"];
const S2_COLUMNS: &[&str] = &["S2_SEC", "S2"];
const S3_COLUMNS: &[&str] = &["S3_SEC", "S3"];
const TOP_SPEED_COLUMNS: &[&str] = &["TOP_SPEED", "KPH"];
const FLAG_COLUMNS: &[&str] = &["FLAG_AT_FL", "FLAG"];

const TIMESTAMP_COLUMNS: &[&str] = &["timestamp", "meta_time"];
const SPEED_COLUMNS: &[&str] = &["speed"];
const STEERING_COLUMNS: &[&str] = &["Steering_Angle", "steering_angle"];
const ACCEL_X_COLUMNS: &[&str] = &["accx_can", "accel_longitudinal"];
const ACCEL_Y_COLUMNS: &[&str] = &["accy_can", "accel_lateral"];
const THROTTLE_COLUMNS: &[&str] = &["aps", "ath", "throttle"];
const BRAKE_COLUMNS: &[&str] = &["pbrake_f", "brake"];
const RPM_COLUMNS: &[&str] = &["nmot", "rpm"];
const GEAR_COLUMNS: &[&str] = &["gear"];

const MEAN_THROTTLE_COLUMNS: &[&str] = &["mean_throttle"];
const MEAN_BRAKE_COLUMNS: &[&str] = &["mean_brake"];
const SMOOTHNESS_COLUMNS: &[&str] = &["steering_smoothness"];

// ── Load results ──────────────────────────────────────────────────────────────

/// Row counts for one load call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// File or directory that was read.
    pub path: PathBuf,
    /// Number of CSV files read.
    pub files: usize,
    /// Data rows seen, including skipped ones.
    pub rows_read: usize,
    /// Rows dropped because a value was missing or invalid.
    pub rows_skipped: usize,
}

impl LoadReport {
    fn empty(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            files: 0,
            rows_read: 0,
            rows_skipped: 0,
        }
    }

    /// Rows that became records.
    pub fn rows_loaded(&self) -> usize {
        self.rows_read - self.rows_skipped
    }
}

/// Typed records plus the counts describing how they were read.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    pub records: Vec<T>,
    pub report: LoadReport,
}

impl<T> Loaded<T> {
    fn absorb(&mut self, other: Loaded<T>) {
        self.records.extend(other.records);
        self.report.files += other.report.files;
        self.report.rows_read += other.report.rows_read;
        self.report.rows_skipped += other.report.rows_skipped;
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Load lap records from either a single CSV file or a directory of
/// `driver_<n>.csv` files.
pub fn load_laps(path: &Path, default_session: &str) -> Result<Loaded<LapRecord>> {
    if path.is_dir() {
        load_lap_directory(path, default_session)
    } else {
        load_lap_records(path, default_session)
    }
}

/// Find the `driver_<n>.csv` files directly inside `dir`, sorted by path.
///
/// Subdirectories are not searched: every file found is labelled with one
/// session, so a directory per session must be loaded on its own. Aggregate
/// files such as `driver_session_stats.csv` do not match.
pub fn find_driver_lap_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        warn!("Lap directory does not exist: {}", dir.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && driver_from_file_name(entry.path()).is_some())
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Load and concatenate every per-driver lap file under `dir`.
pub fn load_lap_directory(dir: &Path, default_session: &str) -> Result<Loaded<LapRecord>> {
    let files = find_driver_lap_files(dir);
    let mut loaded = Loaded {
        records: Vec::new(),
        report: LoadReport::empty(dir),
    };
    if files.is_empty() {
        warn!("No driver lap files found in {}", dir.display());
        return Ok(loaded);
    }

    for file in &files {
        loaded.absorb(load_lap_records(file, default_session)?);
    }

    debug!(
        "Loaded {} lap records from {} files in {}",
        loaded.records.len(),
        files.len(),
        dir.display()
    );
    Ok(loaded)
}

/// Load one lap-time CSV.
///
/// The driver number comes from the `NUMBER` column when present, otherwise
/// from a `driver_<n>.csv` file name. Rows without a session column are
/// assigned `default_session`.
pub fn load_lap_records(path: &Path, default_session: &str) -> Result<Loaded<LapRecord>> {
    let table = CsvTable::read(path)?;

    let driver_source = match (table.find(DRIVER_COLUMNS), driver_from_file_name(path)) {
        (Some(col), _) => DriverSource::Column(col),
        (None, Some(driver)) => DriverSource::FileName(driver),
        (None, None) => return Err(table.missing(DRIVER_COLUMNS)),
    };
    let session_col = table.find(SESSION_COLUMNS);
    let lap_col = table.require(LAP_COLUMNS)?;
    let time_col = table.require(LAP_TIME_COLUMNS)?;
    let s1_col = table.require(S1_COLUMNS)?;
    let s2_col = table.require(S2_COLUMNS)?;
    let s3_col = table.require(S3_COLUMNS)?;
    let speed_col = table.require(TOP_SPEED_COLUMNS)?;
    let flag_col = table.require(FLAG_COLUMNS)?;

    let loaded = table.collect_rows(|row| {
        let driver = match driver_source {
            DriverSource::Column(col) => parse_count(cell(row, col), DRIVER_COLUMNS[0])?,
            DriverSource::FileName(driver) => driver,
        };
        let session = session_col
            .map(|col| cell(row, col))
            .filter(|s| !s.is_empty())
            .unwrap_or(default_session);
        let flag = cell(row, flag_col);
        if flag.is_empty() {
            return Err(format!("{} is empty", FLAG_COLUMNS[0]));
        }

        LapRecord::new(
            driver,
            session,
            parse_count(cell(row, lap_col), LAP_COLUMNS[0])?,
            parse_duration(cell(row, time_col), LAP_TIME_COLUMNS[0])?,
            SectorTimes::new(
                parse_duration(cell(row, s1_col), S1_COLUMNS[0])?,
                parse_duration(cell(row, s2_col), S2_COLUMNS[0])?,
                parse_duration(cell(row, s3_col), S3_COLUMNS[0])?,
            ),
            parse_number(cell(row, speed_col), TOP_SPEED_COLUMNS[0])?,
            flag,
        )
        .map_err(|e| e.to_string())
    });

    debug!(
        "File {}: {} rows read, {} skipped",
        path.display(),
        loaded.report.rows_read,
        loaded.report.rows_skipped
    );
    Ok(loaded)
}

/// Load a per-lap telemetry summary CSV.
///
/// All three summary columns are required; a row with an empty summary cell
/// is skipped so that a lap without telemetry is never read as zero.
pub fn load_per_lap_summaries(path: &Path) -> Result<Loaded<PerLapSummary>> {
    let table = CsvTable::read(path)?;
    let driver_col = table.require(DRIVER_COLUMNS)?;
    let lap_col = table.require(LAP_COLUMNS)?;
    let throttle_col = table.require(MEAN_THROTTLE_COLUMNS)?;
    let brake_col = table.require(MEAN_BRAKE_COLUMNS)?;
    let smoothness_col = table.require(SMOOTHNESS_COLUMNS)?;

    let loaded = table.collect_rows(|row| {
        Ok(PerLapSummary {
            driver: parse_count(cell(row, driver_col), DRIVER_COLUMNS[0])?,
            lap: parse_lap(cell(row, lap_col))?,
            mean_throttle: parse_number(cell(row, throttle_col), MEAN_THROTTLE_COLUMNS[0])?,
            mean_brake: parse_number(cell(row, brake_col), MEAN_BRAKE_COLUMNS[0])?,
            steering_smoothness: parse_number(cell(row, smoothness_col), SMOOTHNESS_COLUMNS[0])?,
        })
    });

    debug!(
        "File {}: {} summaries loaded, {} skipped",
        path.display(),
        loaded.records.len(),
        loaded.report.rows_skipped
    );
    Ok(loaded)
}

/// Load a wide-format telemetry log: one row per timestamp, one column per
/// sensor channel.
///
/// Sensor channels are optional columns; an absent column or empty cell
/// leaves the reading as `None`.
pub fn load_telemetry_samples(path: &Path) -> Result<Loaded<TelemetrySample>> {
    let table = CsvTable::read(path)?;
    let driver_col = table.require(DRIVER_COLUMNS)?;
    let lap_col = table.require(LAP_COLUMNS)?;
    let ts_col = table.require(TIMESTAMP_COLUMNS)?;

    let speed_col = table.find(SPEED_COLUMNS);
    let steering_col = table.find(STEERING_COLUMNS);
    let accx_col = table.find(ACCEL_X_COLUMNS);
    let accy_col = table.find(ACCEL_Y_COLUMNS);
    let throttle_col = table.find(THROTTLE_COLUMNS);
    let brake_col = table.find(BRAKE_COLUMNS);
    let rpm_col = table.find(RPM_COLUMNS);
    let gear_col = table.find(GEAR_COLUMNS);

    let channel = |row: &[String], col: Option<usize>| -> std::result::Result<Option<f64>, String> {
        match col {
            Some(col) => parse_optional(cell(row, col)),
            None => Ok(None),
        }
    };

    let loaded = table.collect_rows(|row| {
        let raw_ts = cell(row, ts_col);
        let timestamp = TimestampProcessor::parse(raw_ts)
            .ok_or_else(|| format!("unparseable timestamp \"{raw_ts}\""))?;
        let gear = match gear_col {
            Some(col) => parse_optional(cell(row, col))?
                .map(|g| to_integer(g).ok_or_else(|| format!("gear {g} is not an integer")))
                .transpose()?
                .map(|g| g as i32),
            None => None,
        };

        Ok(TelemetrySample {
            driver: parse_count(cell(row, driver_col), DRIVER_COLUMNS[0])?,
            lap: parse_lap(cell(row, lap_col))?,
            timestamp,
            speed: channel(row, speed_col)?,
            steering_angle: channel(row, steering_col)?,
            accel_longitudinal: channel(row, accx_col)?,
            accel_lateral: channel(row, accy_col)?,
            throttle: channel(row, throttle_col)?,
            brake: channel(row, brake_col)?,
            rpm: channel(row, rpm_col)?,
            gear,
        })
    });

    debug!(
        "File {}: {} telemetry samples loaded, {} skipped",
        path.display(),
        loaded.records.len(),
        loaded.report.rows_skipped
    );
    Ok(loaded)
}

/// Where a lap file's driver number comes from.
#[derive(Clone, Copy)]
enum DriverSource {
    Column(usize),
    FileName(DriverNumber),
}

// ── CSV table ─────────────────────────────────────────────────────────────────

/// A delimited text file split into a header and raw string rows.
struct CsvTable {
    path: PathBuf,
    headers: Vec<String>,
    /// `(line number, fields or split error)` per data line.
    rows: Vec<(usize, std::result::Result<Vec<String>, String>)>,
}

impl CsvTable {
    fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| AnalysisError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &content)
    }

    fn parse(path: &Path, content: &str) -> Result<Self> {
        let mut lines = content
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim_end_matches('\r')))
            .filter(|(_, line)| !line.trim().is_empty());

        let (header_line, header) = lines.next().ok_or_else(|| AnalysisError::CsvParse {
            path: path.to_path_buf(),
            line: 1,
            message: "file has no header row".to_string(),
        })?;

        let delimiter = detect_delimiter(header);
        let headers = split_fields(header.trim_start_matches('\u{feff}'), delimiter)
            .map_err(|message| AnalysisError::CsvParse {
                path: path.to_path_buf(),
                line: header_line,
                message,
            })?;

        let rows = lines
            .map(|(line_no, line)| (line_no, split_fields(line, delimiter)))
            .collect();

        Ok(Self {
            path: path.to_path_buf(),
            headers,
            rows,
        })
    }

    /// Index of the first header matching one of `aliases`, ignoring case.
    fn find(&self, aliases: &[&str]) -> Option<usize> {
        aliases.iter().find_map(|alias| {
            self.headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(alias))
        })
    }

    fn require(&self, aliases: &[&str]) -> Result<usize> {
        self.find(aliases).ok_or_else(|| self.missing(aliases))
    }

    fn missing(&self, aliases: &[&str]) -> AnalysisError {
        AnalysisError::MissingColumn {
            path: self.path.clone(),
            column: aliases.first().copied().unwrap_or_default().to_string(),
        }
    }

    /// Convert every row with `convert`, skipping and counting failures.
    fn collect_rows<T>(
        &self,
        mut convert: impl FnMut(&[String]) -> std::result::Result<T, String>,
    ) -> Loaded<T> {
        let mut records = Vec::with_capacity(self.rows.len());
        let mut skipped = 0usize;

        for (line_no, fields) in &self.rows {
            let outcome = fields.as_deref().map_err(Clone::clone).and_then(&mut convert);
            match outcome {
                Ok(record) => records.push(record),
                Err(reason) => {
                    warn!(
                        "Skipping {} line {}: {}",
                        self.path.display(),
                        line_no,
                        reason
                    );
                    skipped += 1;
                }
            }
        }

        Loaded {
            records,
            report: LoadReport {
                path: self.path.clone(),
                files: 1,
                rows_read: self.rows.len(),
                rows_skipped: skipped,
            },
        }
    }
}

/// Semicolon when the header uses semicolons and no commas, comma otherwise.
fn detect_delimiter(header: &str) -> char {
    if header.contains(';') && !header.contains(',') {
        ';'
    } else {
        ','
    }
}

/// Split one line into fields, honouring double-quoted fields and `""`
/// escapes inside them.
fn split_fields(line: &str, delimiter: char) -> std::result::Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if current.trim().is_empty() => {
                current.clear();
                in_quotes = true;
            }
            c if c == delimiter && !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            c => current.push(c),
        }
    }

    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(current.trim().to_string());
    Ok(fields)
}

// ── Cell parsing ──────────────────────────────────────────────────────────────

/// The cell at `index`, or `""` for a short row.
fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map(String::as_str).unwrap_or("")
}

fn parse_number(raw: &str, column: &str) -> std::result::Result<f64, String> {
    parse_optional(raw)?.ok_or_else(|| format!("{column} is empty"))
}

fn parse_optional(raw: &str) -> std::result::Result<Option<f64>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("\"{raw}\" is not a number"))?;
    if !value.is_finite() {
        return Err(format!("\"{raw}\" is not a finite number"));
    }
    Ok(Some(value))
}

/// Seconds written either as a plain number or as `m:ss.fff`.
fn parse_duration(raw: &str, column: &str) -> std::result::Result<f64, String> {
    match raw.trim().split_once(':') {
        Some((minutes, seconds)) => {
            let minutes: u32 = minutes
                .trim()
                .parse()
                .map_err(|_| format!("{column}: \"{raw}\" is not a lap time"))?;
            let seconds = parse_number(seconds, column)?;
            Ok(f64::from(minutes) * 60.0 + seconds)
        }
        None => parse_number(raw, column),
    }
}

/// A non-negative whole number, accepting `"7"` as well as `"7.0"`.
fn parse_count(raw: &str, column: &str) -> std::result::Result<u32, String> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<u32>() {
        return Ok(n);
    }
    let value = parse_number(raw, column)?;
    to_integer(value)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| format!("{column}: \"{raw}\" is not a non-negative whole number"))
}

fn parse_lap(raw: &str) -> std::result::Result<u32, String> {
    let lap = parse_count(raw, LAP_COLUMNS[0])?;
    if lap == 0 {
        return Err("lap number must be positive".to_string());
    }
    Ok(lap)
}

fn to_integer(value: f64) -> Option<i64> {
    (value.fract() == 0.0 && value.abs() < i64::MAX as f64).then_some(value as i64)
}

/// Driver number encoded in a `driver_<n>.csv` file name.
fn driver_from_file_name(path: &Path) -> Option<DriverNumber> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| Regex::new(r"^driver_(\d+)\.csv$").expect("regex is valid"));
    let name = path.file_name()?.to_str()?;
    re.captures(name)?.get(1)?.as_str().parse().ok()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

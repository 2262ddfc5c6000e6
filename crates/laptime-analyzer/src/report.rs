//! Text and JSON rendering of an [`AnalysisReport`].

use std::fmt::Write;

use laptime_core::formatting::{
    format_lap_time, format_number, format_optional, format_p_value, format_signed,
    NOT_APPLICABLE,
};
use laptime_core::models::LapRecord;
use laptime_data::analysis::AnalysisReport;
use laptime_data::conditions::ComparisonOutcome;
use laptime_data::performance::fastest_laps;
use serde::Serialize;

/// Printed where a driver or group has too few observations for a figure.
const INSUFFICIENT: &str = "insufficient data";

/// Presentation choices that do not affect the analysis itself.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Rows shown per ranked table.
    pub top: usize,
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    report: &'a AnalysisReport,
    fastest_laps: Vec<&'a LapRecord>,
}

/// Pretty-printed JSON of the full report plus the fastest laps.
pub fn render_json(
    report: &AnalysisReport,
    laps: &[LapRecord],
    options: RenderOptions,
) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonOutput {
        report,
        fastest_laps: fastest_laps(laps, options.top),
    })
}

/// Human-readable report.
pub fn render_text(
    report: &AnalysisReport,
    laps: &[LapRecord],
    options: RenderOptions,
) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    write_summary(&mut out, report)?;
    write_fastest_laps(&mut out, laps, options)?;
    write_pace(&mut out, report, options)?;
    write_consistency(&mut out, report, options)?;
    write_trends(&mut out, report, options)?;
    write_conditions(&mut out, report)?;
    write_correlations(&mut out, report)?;
    Ok(out)
}

// ── Sections ──────────────────────────────────────────────────────────────────

fn heading(out: &mut String, title: &str) -> std::fmt::Result {
    writeln!(out)?;
    writeln!(out, "{title}")?;
    writeln!(out, "{}", "─".repeat(title.chars().count()))
}

fn write_summary(out: &mut String, report: &AnalysisReport) -> std::fmt::Result {
    let m = &report.metadata;
    writeln!(out, "Lap-time analysis: {}", m.session)?;
    writeln!(
        out,
        "  Laps: {} ({} rows skipped)   Drivers: {}   Telemetry summaries: {} ({:?})",
        m.laps_loaded, m.rows_skipped, m.driver_count, m.summaries_loaded, m.summary_source
    )?;
    writeln!(
        out,
        "  Joined with telemetry: {}   Without telemetry: {}   Coverage: {}",
        m.joined_rows,
        m.unmatched_rows,
        format_optional(m.coverage_percent, |p| format!("{}%", format_number(p, 1)))
    )?;
    if m.orphaned_summaries > 0 {
        writeln!(
            out,
            "  Telemetry summaries with no matching lap: {}",
            m.orphaned_summaries
        )?;
    }
    Ok(())
}

fn write_fastest_laps(out: &mut String, laps: &[LapRecord], options: RenderOptions) -> std::fmt::Result {
    heading(out, "Fastest laps")?;
    let fastest = fastest_laps(laps, options.top);
    if fastest.is_empty() {
        return writeln!(out, "  no laps");
    }
    writeln!(out, "  {:>3}  {:>6}  {:>4}  {:>10}  {:<5}", "#", "Driver", "Lap", "Time", "Flag")?;
    for (i, lap) in fastest.iter().enumerate() {
        writeln!(
            out,
            "  {:>3}  {:>6}  {:>4}  {:>10}  {:<5}",
            i + 1,
            lap.driver,
            lap.lap_number,
            format_lap_time(lap.lap_time),
            lap.condition
        )?;
    }
    Ok(())
}

fn write_pace(out: &mut String, report: &AnalysisReport, options: RenderOptions) -> std::fmt::Result {
    heading(out, "Driver pace (by best lap)")?;
    let ranked = report.performance.ranked();
    if ranked.is_empty() {
        return writeln!(out, "  no drivers");
    }
    writeln!(
        out,
        "  {:>6}  {:>4}  {:>10}  {:>10}  {:>10}  {:>11}  {:>10}",
        "Driver", "Laps", "Best", "Mean", "Median", "Theoretical", "Efficiency"
    )?;
    for p in ranked.iter().take(options.top) {
        writeln!(
            out,
            "  {:>6}  {:>4}  {:>10}  {:>10}  {:>10}  {:>11}  {:>9}%",
            p.driver,
            p.lap_count,
            format_lap_time(p.best_lap),
            format_lap_time(p.mean_lap),
            format_lap_time(p.median_lap),
            format_lap_time(p.theoretical_best),
            format_number(p.efficiency * 100.0, 2)
        )?;
    }
    if let Some(avg) = report.performance.field.average_best_lap {
        writeln!(out, "  Field average best lap: {}", format_lap_time(avg))?;
    }
    Ok(())
}

fn write_consistency(out: &mut String, report: &AnalysisReport, options: RenderOptions) -> std::fmt::Result {
    let consistency = &report.consistency;
    heading(
        out,
        &format!("Consistency (drivers with at least {} laps)", consistency.min_laps),
    )?;

    let sd = |v: Option<f64>| format_optional(v, |s| format_number(s, 3));
    let ranked = consistency.ranked();
    if ranked.is_empty() {
        writeln!(out, "  {INSUFFICIENT}")?;
    } else {
        writeln!(
            out,
            "  {:>4}  {:>6}  {:>4}  {:>8}  {:>8}  {:>8}  {:>8}  {:>9}  {:>6}",
            "Rank", "Driver", "Laps", "Lap σ", "S1 σ", "S2 σ", "S3 σ", "Speed σ", "Index"
        )?;
        for (i, s) in ranked.iter().take(options.top).enumerate() {
            writeln!(
                out,
                "  {:>4}  {:>6}  {:>4}  {:>8}  {:>8}  {:>8}  {:>8}  {:>9}  {:>6}",
                i + 1,
                s.driver,
                s.lap_count,
                sd(s.lap_time_std),
                sd(s.s1_std),
                sd(s.s2_std),
                sd(s.s3_std),
                sd(s.top_speed_std),
                format_optional(s.consistency_index, |c| format_number(c, 3))
            )?;
        }
    }

    let speed = consistency.ranked_by_top_speed();
    if !speed.is_empty() {
        let list: Vec<String> = speed
            .iter()
            .take(options.top)
            .map(|s| format!("#{} ({} km/h σ)", s.driver, sd(s.top_speed_std)))
            .collect();
        writeln!(out, "  Most consistent top speed: {}", list.join(", "))?;
    }

    let unranked: Vec<String> = consistency
        .scores
        .iter()
        .filter(|s| !s.eligible)
        .map(|s| format!("#{} ({} laps)", s.driver, s.lap_count))
        .collect();
    if !unranked.is_empty() {
        writeln!(out, "  Not ranked, too few laps: {}", unranked.join(", "))?;
    }
    Ok(())
}

fn write_trends(out: &mut String, report: &AnalysisReport, options: RenderOptions) -> std::fmt::Result {
    heading(out, "Lap-time trends")?;
    let trends = &report.trends;

    for (title, view) in [("Improving", trends.improving()), ("Degrading", trends.degrading())] {
        writeln!(out, "  {title}:")?;
        if view.is_empty() {
            writeln!(out, "    none")?;
            continue;
        }
        for t in view.iter().take(options.top) {
            writeln!(
                out,
                "    #{:<5} {:>8} s/lap   R² {:>6}   p {:>8}   first→last {:>8} s over {} laps",
                t.driver,
                format_signed(t.slope, 3),
                format_optional(t.r_squared, |r| format_number(r, 3)),
                format_optional(t.p_value, format_p_value),
                format_signed(t.improvement, 3),
                t.lap_count
            )?;
        }
    }

    let flat: Vec<String> = trends
        .trends
        .iter()
        .filter(|t| t.direction == laptime_data::trend::TrendDirection::Flat)
        .map(|t| format!("#{}", t.driver))
        .collect();
    if !flat.is_empty() {
        writeln!(out, "  Flat: {}", flat.join(", "))?;
    }
    if !trends.insufficient.is_empty() {
        let list: Vec<String> = trends.insufficient.iter().map(|d| format!("#{d}")).collect();
        writeln!(out, "  {}: {}", capitalize(INSUFFICIENT), list.join(", "))?;
    }
    Ok(())
}

fn write_conditions(out: &mut String, report: &AnalysisReport) -> std::fmt::Result {
    heading(out, "Track conditions")?;
    let conditions = &report.conditions;
    if conditions.groups.is_empty() {
        return writeln!(out, "  no laps");
    }

    writeln!(
        out,
        "  {:<6}  {:>5}  {:>10}  {:>8}  {:>10}",
        "Code", "Laps", "Mean lap", "Lap σ", "Top speed"
    )?;
    for g in &conditions.groups {
        writeln!(
            out,
            "  {:<6}  {:>5}  {:>10}  {:>8}  {:>10}",
            g.code,
            g.count,
            format_optional(g.lap_time.mean, format_lap_time),
            format_optional(g.lap_time.std_dev, |s| format_number(s, 3)),
            format_optional(g.top_speed.mean, |s| format_number(s, 1))
        )?;
    }

    match &conditions.comparison {
        Some(ComparisonOutcome::Computed(c)) => writeln!(
            out,
            "  {} vs {}: Δ mean {} s, t = {}, df = {}, p = {}",
            c.baseline,
            c.other,
            format_signed(c.test.mean_difference, 3),
            format_number(c.test.t_statistic, 3),
            format_number(c.test.degrees_of_freedom, 1),
            format_p_value(c.test.p_value)
        )?,
        Some(ComparisonOutcome::NotApplicable {
            baseline,
            other,
            reason,
        }) => writeln!(out, "  {baseline} vs {other}: {NOT_APPLICABLE} ({reason})")?,
        None => {}
    }
    Ok(())
}

fn write_correlations(out: &mut String, report: &AnalysisReport) -> std::fmt::Result {
    let threshold = report.config.significance;
    heading(
        out,
        &format!("Telemetry correlations (p < {})", format_number(threshold, 3)),
    )?;
    let correlations = &report.correlations;

    let significant = correlations.significant(threshold);
    if significant.is_empty() {
        writeln!(out, "  none significant")?;
    }
    for r in significant {
        writeln!(
            out,
            "  {:<36}  r = {:>7}  p = {:>8}  n = {}",
            r.pair,
            format_signed(r.coefficient, 3),
            format_p_value(r.p_value),
            r.n
        )?;
    }

    let not_applicable = correlations.not_applicable_count();
    if not_applicable > 0 {
        writeln!(
            out,
            "  {} of {} metric pairs {NOT_APPLICABLE} ({INSUFFICIENT} or constant metric)",
            not_applicable,
            correlations.outcomes.len()
        )?;
    }
    Ok(())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

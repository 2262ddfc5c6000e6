mod bootstrap;
mod report;

use anyhow::{bail, Context, Result};
use laptime_core::settings::Settings;
use laptime_data::analysis::{analyze_session, load_session, SessionSources};

use crate::report::RenderOptions;

fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("Lap-time analyzer v{} starting", env!("CARGO_PKG_VERSION"));

    let Some(laps) = settings.laps.clone() else {
        if settings.clear {
            tracing::info!("Saved parameters cleared");
            return Ok(());
        }
        bail!("no lap data given; pass --laps <file or directory>");
    };

    let config = settings
        .analysis_config()
        .context("invalid analysis parameters")?;
    tracing::info!(
        "Min laps: {}, significance: {}, compare: {}",
        config.min_laps,
        config.significance,
        settings.compare
    );

    let sources = SessionSources {
        laps: laps.clone(),
        telemetry_summary: settings.telemetry_summary.clone(),
        telemetry: settings.telemetry.clone(),
        session: settings.session.clone(),
    };
    let data = load_session(&sources)
        .with_context(|| format!("failed to load session data from {}", laps.display()))?;

    let analysis = analyze_session(&data, &config)?;

    let options = RenderOptions { top: settings.top };
    match settings.format.as_str() {
        "json" => println!("{}", report::render_json(&analysis, &data.laps, options)?),
        _ => print!("{}", report::render_text(&analysis, &data.laps, options)?),
    }

    Ok(())
}

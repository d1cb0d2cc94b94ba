use super::CliError;
use anyhow::Context;
use serde::Serialize;
use sparkmec_core::common::{load_config, DiagnosticConfig};
use sparkmec_core::domain::{DiagnosticError, Spectrum};
use sparkmec_core::modules::serialization::{
    render_corrected_spectrum, render_peak_table, render_saha_boltzmann_plot,
    write_text_artifact,
};
use sparkmec_core::modules::{PeakTableEntry, SahaBoltzmannPlot};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub(super) const REPORT_FILE_NAME: &str = "report.json";
pub(super) const CORRECTED_SPECTRUM_FILE_NAME: &str = "corrected_spectrum.dat";
pub(super) const PEAK_TABLE_FILE_NAME: &str = "peak_table.dat";

/// Logs go to stderr so stdout stays a clean summary.
pub(super) fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

pub(super) fn load_diagnostic_config(path: &Path) -> Result<DiagnosticConfig, CliError> {
    load_config(path).map_err(|error| CliError::Compute(error.into()))
}

pub(super) fn ensure_output_dir(path: &Path) -> Result<(), CliError> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create output directory '{}'", path.display()))?;
    Ok(())
}

pub(super) fn write_spectrum_artifacts(
    output: &Path,
    corrected: &Spectrum,
    baseline: &[f64],
    peak_table: &[PeakTableEntry],
) -> Result<(), CliError> {
    write_artifact(
        &output.join(CORRECTED_SPECTRUM_FILE_NAME),
        &render_corrected_spectrum(corrected, baseline),
    )?;
    write_artifact(
        &output.join(PEAK_TABLE_FILE_NAME),
        &render_peak_table(peak_table),
    )
}

/// One `saha_boltzmann_<label>.dat` per species that has a plot.
pub(super) fn write_saha_boltzmann_artifact(
    output: &Path,
    label: &str,
    plot: &SahaBoltzmannPlot,
) -> Result<PathBuf, CliError> {
    let path = output.join(format!("saha_boltzmann_{label}.dat"));
    write_artifact(&path, &render_saha_boltzmann_plot(plot))?;
    Ok(path)
}

pub(super) fn write_json_report<T: Serialize>(
    output: &Path,
    report: &T,
) -> Result<PathBuf, CliError> {
    let path = output.join(REPORT_FILE_NAME);
    let content = serde_json::to_string_pretty(report).map_err(|source| {
        CliError::Compute(DiagnosticError::internal(
            "INTERNAL.REPORT_SERIALIZE",
            format!("failed to serialize diagnostic report: {}", source),
        ))
    })?;
    write_artifact(&path, &content)?;
    Ok(path)
}

fn write_artifact(path: &Path, content: &str) -> Result<(), CliError> {
    write_text_artifact(path, content)
        .with_context(|| format!("failed to write artifact '{}'", path.display()))?;
    Ok(())
}

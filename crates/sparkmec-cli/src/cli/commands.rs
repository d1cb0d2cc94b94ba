use super::CliError;
use super::helpers::*;
use sparkmec_core::modules::{AsciiSpectrumReader, TabulatedReferenceData};
use sparkmec_core::pipeline::DiagnosticPipeline;
use std::path::PathBuf;
use tracing::info;

#[derive(clap::Args)]
pub(super) struct RunArgs {
    /// Diagnostic configuration (JSON)
    #[arg(long, default_value = "sparkmec.json")]
    config: PathBuf,

    /// Tabulated atomic reference data (JSON)
    #[arg(long)]
    reference: PathBuf,

    /// Directory receiving report.json and the spectrum artifacts
    #[arg(long, default_value = "sparkmec-output")]
    output: PathBuf,
}

#[derive(clap::Args)]
pub(super) struct PrepareArgs {
    /// Diagnostic configuration (JSON)
    #[arg(long, default_value = "sparkmec.json")]
    config: PathBuf,

    /// Directory receiving the corrected spectrum and peak table
    #[arg(long, default_value = "sparkmec-output")]
    output: PathBuf,
}

pub(super) fn run_diagnostic_command(args: RunArgs) -> Result<i32, CliError> {
    let config = load_diagnostic_config(&args.config)?;
    let reference = TabulatedReferenceData::load(&args.reference)
        .map_err(|error| CliError::Compute(error.into()))?;

    let report = DiagnosticPipeline::new(config, &reference, &AsciiSpectrumReader).run()?;

    ensure_output_dir(&args.output)?;
    write_spectrum_artifacts(
        &args.output,
        &report.corrected,
        &report.baseline,
        &report.peak_table,
    )?;
    let mut saha_paths = Vec::new();
    for (label, species) in [
        ("first", &report.first_species),
        ("second", &report.second_species),
    ] {
        if let Some(plot) = &species.saha_boltzmann_plot {
            saha_paths.push((
                species.atom_name.as_str(),
                plot,
                write_saha_boltzmann_artifact(&args.output, label, plot)?,
            ));
        }
    }
    let report_path = write_json_report(&args.output, &report)?;
    info!(output = %args.output.display(), "wrote diagnostic artifacts");

    println!("Temperature: {:.3} K", report.temperature.kelvin());
    println!("Electron concentration: {:.6e} cm^-3", report.electron_concentration);
    println!(
        "Total concentration {} / {}: {:.6}",
        report.first_species.atom_name,
        report.second_species.atom_name,
        report.total_concentration
    );
    for (atom_name, plot, path) in &saha_paths {
        println!(
            "Saha-Boltzmann {}: {:.3} K, {:.6e} cm^-3 ({})",
            atom_name,
            plot.temperature.kelvin(),
            plot.electron_concentration,
            path.display()
        );
    }
    for warning in &report.warnings {
        println!(
            "Warning [{}]: {} after {} iterations",
            warning.stage, warning.detail, warning.iterations
        );
    }
    println!("JSON report: {}", report_path.display());
    Ok(0)
}

pub(super) fn run_prepare_command(args: PrepareArgs) -> Result<i32, CliError> {
    let config = load_diagnostic_config(&args.config)?;
    let reference = TabulatedReferenceData::new(Default::default());
    let prepared = DiagnosticPipeline::new(config, &reference, &AsciiSpectrumReader).prepare()?;

    ensure_output_dir(&args.output)?;
    write_spectrum_artifacts(
        &args.output,
        &prepared.correction.corrected,
        &prepared.correction.baseline,
        &prepared.peak_table,
    )?;
    info!(output = %args.output.display(), "wrote spectrum artifacts");

    println!(
        "Baseline: {} iterations, converged: {}",
        prepared.correction.iterations, prepared.correction.converged
    );
    println!("Peaks: {}", prepared.peaks.len());
    println!("Output directory: {}", args.output.display());
    Ok(0)
}

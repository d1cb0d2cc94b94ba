use sparkmec_core::common::{
    CarrierConfig, DiagnosticConfig, SpeciesConfig, SpectrumConfig,
};
use sparkmec_core::domain::{DiagnosticErrorCategory, PipelineStage};
use sparkmec_core::modules::{AsciiSpectrumReader, TabulatedReferenceData};
use sparkmec_core::pipeline::DiagnosticPipeline;
use std::path::PathBuf;

fn workspace_root() -> PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .to_path_buf()
}

fn scenario_config() -> DiagnosticConfig {
    let mut spectrum = SpectrumConfig::new(workspace_root().join("tasks/synthetic-shot.asc"));
    spectrum.intensity_column_index = 2;
    DiagnosticConfig {
        spectrum,
        first_species: SpeciesConfig::new("Au I", "Au II", vec![312.278, 406.507, 479.26]),
        second_species: SpeciesConfig::new("Ag I", "Ag II", vec![338.29, 520.9078, 546.54]),
        carrier_species: CarrierConfig::new("Ar I", "Ar II"),
        spectrum_correction: Default::default(),
        peak_finding: Default::default(),
        line_integration: Default::default(),
    }
}

fn reference() -> TabulatedReferenceData {
    TabulatedReferenceData::load(workspace_root().join("tasks/synthetic-shot-reference.json"))
        .expect("reference fixture should load")
}

fn assert_relative(actual: f64, expected: f64, tolerance: f64, label: &str) {
    let relative = (actual - expected).abs() / expected.abs();
    assert!(
        relative <= tolerance,
        "{label}: expected {expected}, got {actual} (relative {relative:.3e})"
    );
}

#[test]
fn synthetic_shot_reproduces_reference_temperature_and_total_concentration() {
    let reference = reference();
    let report = DiagnosticPipeline::new(scenario_config(), &reference, &AsciiSpectrumReader)
        .run()
        .expect("scenario should run");

    assert_relative(report.temperature.kelvin(), 12_770.740, 1.0e-3, "temperature");
    assert_relative(report.total_concentration, 1.11428, 1.0e-3, "total concentration");

    assert_eq!(report.peaks.len(), 9);
    assert_eq!(report.intensity_ratios.points.len(), 9);
    assert!(report.intensity_ratios.fit.r_squared > 0.999_999);
    assert!(report.electron_concentration > 1.0e17 && report.electron_concentration < 1.5e17);
    assert!(report.debye_length > 0.0);

    let matched: Vec<f64> = report
        .first_species
        .lines
        .iter()
        .map(|line| line.record.wavelength)
        .collect();
    assert_eq!(matched, vec![312.278, 406.507, 479.258]);
    assert_eq!(report.carrier_species.partition_functions.ion, 5.7);
    assert_eq!(report.second_species.ionization_energy, 61_106.45);
    assert!(report.unconverged_line_fits.is_empty());
    assert!(report.first_species.saha_boltzmann_plot.is_none());
    assert!(report.first_species.ion_lines.is_empty());
}

#[test]
fn synthetic_shot_lines_are_self_consistent() {
    let reference = reference();
    let report = DiagnosticPipeline::new(scenario_config(), &reference, &AsciiSpectrumReader)
        .run()
        .expect("scenario should run");

    for species in [&report.first_species, &report.second_species] {
        assert_eq!(species.line_pair_deviations.size(), 3);
        assert!(
            species.line_pair_deviations.max_abs_deviation() < 1.0e-3,
            "{} deviations {:?}",
            species.atom_name,
            species.line_pair_deviations.rows
        );
        let plot = species
            .boltzmann_plot
            .as_ref()
            .expect("three lines with distinct energies give a plot");
        assert_relative(plot.temperature.kelvin(), 12_770.740, 1.0e-3, "single-species temperature");
        assert!(species.fits.iter().all(|fit| fit.fit_converged));
    }

    assert!(
        report
            .warnings
            .iter()
            .any(|warning| warning.stage == PipelineStage::SpectrumCorrection)
    );
    assert_eq!(report.baseline.len(), report.spectrum.len());
}

#[test]
fn missing_carrier_data_is_an_external_data_error() {
    let reference = reference();
    let mut config = scenario_config();
    config.carrier_species = CarrierConfig::new("Ne I", "Ne II");

    let error = DiagnosticPipeline::new(config, &reference, &AsciiSpectrumReader)
        .run()
        .expect_err("carrier is not in the table");
    assert_eq!(error.category(), DiagnosticErrorCategory::ExternalDataError);
    assert_eq!(error.exit_code(), 5);
}

#[test]
fn ion_targets_add_a_saha_boltzmann_plot() {
    let reference = reference();
    let mut config = scenario_config();
    config.first_species = config
        .first_species
        .with_ion_target_peaks(vec![365.24, 438.16, 498.62]);

    let report = DiagnosticPipeline::new(config, &reference, &AsciiSpectrumReader)
        .run()
        .expect("scenario with ion lines should run");

    let species = &report.first_species;
    assert_eq!(species.ion_lines.len(), 3);
    assert!(species.ion_fits.iter().all(|fit| fit.fit_converged));
    let plot = species
        .saha_boltzmann_plot
        .as_ref()
        .expect("three ion lines against three atom lines give a plot");
    assert_eq!(plot.points.len(), 9);
    assert!(plot.fit.slope < 0.0);
    assert_relative(plot.temperature.kelvin(), 12_770.740, 1.0e-3, "Saha-Boltzmann temperature");
    assert_relative(plot.electron_concentration, 1.2379e17, 1.0e-2, "Saha-Boltzmann density");
    assert_relative(
        plot.electron_concentration,
        report.electron_concentration,
        1.0e-2,
        "density against the carrier balance",
    );

    assert!(report.second_species.saha_boltzmann_plot.is_none());
    assert_relative(report.total_concentration, 1.11428, 1.0e-3, "total concentration");
}

#[test]
fn fits_stopped_at_the_iteration_limit_are_reported() {
    let reference = reference();
    let mut config = scenario_config();
    config.line_integration.fit_iteration_limit = 1;

    let report = DiagnosticPipeline::new(config, &reference, &AsciiSpectrumReader)
        .run()
        .expect("one fit step still yields usable integrals");

    assert_eq!(report.unconverged_line_fits.len(), 6);
    let first = &report.unconverged_line_fits[0];
    assert_eq!(first.species, "Au I");
    assert_eq!(first.target_wavelength, 312.278);
    assert_eq!(first.iterations, 1);
    assert!(report.unconverged_line_fits[3..].iter().all(|fit| fit.species == "Ag I"));

    let line_warnings = report
        .warnings
        .iter()
        .filter(|warning| warning.stage == PipelineStage::LineIntegration)
        .count();
    assert_eq!(line_warnings, 6);
    assert_relative(report.temperature.kelvin(), 12_770.740, 1.0e-3, "temperature");
}

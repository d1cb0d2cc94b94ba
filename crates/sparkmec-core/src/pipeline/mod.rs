//! End-to-end diagnostic run: spectrum correction, peak search, line integration for
//! both species, Boltzmann ratio fit, temperature, concentrations and line-pair checks.
//! Species configured with ion target peaks also get a Saha-Boltzmann plot.

use crate::common::config::{CarrierConfig, DiagnosticConfig, SpeciesConfig};
use crate::common::constants::PhysicalConstants;
use crate::domain::{
    ConvergenceWarning, DiagnosticError, DiagnosticResult, IntegratedLine, PipelineStage,
    Spectrum, Temperature,
};
use crate::modules::boltzmann::{
    build_intensity_ratios, classical_boltzmann_plot, saha_boltzmann_plot, solve_temperature,
    BoltzmannError, BoltzmannPlot, IntensityRatios, SahaBoltzmannPlot,
};
use crate::modules::concentration::{
    atom_concentration_ratio, check_temperature_range, debye_length, electron_concentration,
    ion_atom_concentration_ratio, total_concentration, PartitionFunctions,
};
use crate::modules::{
    build_peak_table, check_line_pairs, correct_spectrum, detect_peaks, line_search_range,
    BaselineCorrection, DeviationMatrix, LineIntegral, LineIntegrator, LineMatcher,
    PeakTableEntry, ReferenceDataSource, SpectrumSource,
};
use serde::Serialize;
use tracing::{info, warn};

/// Corrected spectrum and its peaks, without any reference data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedSpectrum {
    #[serde(skip)]
    pub spectrum: Spectrum,
    #[serde(skip)]
    pub correction: BaselineCorrection,
    pub peaks: Vec<usize>,
    pub peak_table: Vec<PeakTableEntry>,
    pub warnings: Vec<ConvergenceWarning>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeciesReport {
    pub atom_name: String,
    pub ion_name: String,
    pub lines: Vec<IntegratedLine>,
    pub fits: Vec<LineIntegral>,
    pub partition_functions: PartitionFunctions,
    pub ionization_energy: f64,
    pub ion_atom_ratio: f64,
    pub line_pair_deviations: DeviationMatrix,
    pub boltzmann_plot: Option<BoltzmannPlot>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ion_lines: Vec<IntegratedLine>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ion_fits: Vec<LineIntegral>,
    pub saha_boltzmann_plot: Option<SahaBoltzmannPlot>,
}

/// A line fit that stopped at its iteration limit; its last estimate is still used.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnconvergedLineFit {
    pub species: String,
    pub target_wavelength: f64,
    pub peak_wavelength: f64,
    pub iterations: usize,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CarrierReport {
    pub atom_name: String,
    pub ion_name: String,
    pub partition_functions: PartitionFunctions,
    pub ionization_energy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticReport {
    #[serde(skip)]
    pub spectrum: Spectrum,
    #[serde(skip)]
    pub corrected: Spectrum,
    #[serde(skip)]
    pub baseline: Vec<f64>,
    pub peaks: Vec<usize>,
    pub peak_table: Vec<PeakTableEntry>,
    pub intensity_ratios: IntensityRatios,
    pub temperature: Temperature,
    pub atom_concentration_ratio: f64,
    pub electron_concentration: f64,
    pub total_concentration: f64,
    pub debye_length: f64,
    pub first_species: SpeciesReport,
    pub second_species: SpeciesReport,
    pub carrier_species: CarrierReport,
    pub unconverged_line_fits: Vec<UnconvergedLineFit>,
    pub warnings: Vec<ConvergenceWarning>,
}

/// Lines of one species before the temperature is known.
struct IntegratedSpecies {
    lines: Vec<IntegratedLine>,
    fits: Vec<LineIntegral>,
    ion_lines: Vec<IntegratedLine>,
    ion_fits: Vec<LineIntegral>,
}

pub struct DiagnosticPipeline<'a, R, S> {
    config: DiagnosticConfig,
    reference: &'a R,
    spectrum_source: &'a S,
    constants: PhysicalConstants,
}

impl<'a, R, S> DiagnosticPipeline<'a, R, S>
where
    R: ReferenceDataSource,
    S: SpectrumSource,
{
    pub fn new(config: DiagnosticConfig, reference: &'a R, spectrum_source: &'a S) -> Self {
        Self {
            config,
            reference,
            spectrum_source,
            constants: PhysicalConstants::CGS,
        }
    }

    pub fn prepare(&self) -> DiagnosticResult<PreparedSpectrum> {
        let spectrum = self.spectrum_source.read_spectrum(&self.config.spectrum)?;
        info!(
            stage = %PipelineStage::SpectrumCorrection,
            samples = spectrum.len(),
            "read spectrum"
        );

        let correction = correct_spectrum(&spectrum, &self.config.spectrum_correction)?;
        info!(
            stage = %PipelineStage::SpectrumCorrection,
            iterations = correction.iterations,
            converged = correction.converged,
            "estimated baseline"
        );

        let peaks = detect_peaks(&correction.corrected, &self.config.peak_finding)?;
        let peak_table = build_peak_table(
            &correction.corrected,
            &peaks,
            self.config.line_integration.prominence_window_length,
        )?;
        info!(stage = %PipelineStage::PeakFinding, peaks = peaks.len(), "detected peaks");

        let warnings = correction.warning.iter().cloned().collect();
        Ok(PreparedSpectrum {
            spectrum,
            correction,
            peaks,
            peak_table,
            warnings,
        })
    }

    pub fn run(&self) -> DiagnosticResult<DiagnosticReport> {
        self.config.validate()?;
        let prepared = self.prepare()?;
        let mut warnings = prepared.warnings.clone();
        let corrected = &prepared.correction.corrected;

        let integrator = LineIntegrator::pseudo_voigt(&self.config.line_integration);
        let first = self.integrate_species(
            &integrator,
            corrected,
            &prepared.peaks,
            &self.config.first_species,
            &mut warnings,
        )?;
        let second = self.integrate_species(
            &integrator,
            corrected,
            &prepared.peaks,
            &self.config.second_species,
            &mut warnings,
        )?;

        let intensity_ratios = build_intensity_ratios(&first.lines, &second.lines, &self.constants)?;
        info!(
            stage = %PipelineStage::IntensityRatios,
            points = intensity_ratios.points.len(),
            slope = intensity_ratios.fit.slope,
            intercept = intensity_ratios.fit.intercept,
            r_squared = intensity_ratios.fit.r_squared,
            "fitted intensity ratios"
        );

        let temperature = solve_temperature(&intensity_ratios.fit, &self.constants)?;
        check_temperature_range(temperature);
        info!(stage = %PipelineStage::Temperature, temperature = temperature.kelvin(), "solved temperature");

        let first_partitions = self.partition_functions(
            &self.config.first_species.atom_name,
            &self.config.first_species.ion_name,
            temperature,
        )?;
        let second_partitions = self.partition_functions(
            &self.config.second_species.atom_name,
            &self.config.second_species.ion_name,
            temperature,
        )?;
        let carrier = self.carrier_report(&self.config.carrier_species, temperature)?;
        let first_ionization = self
            .reference
            .fetch_ionization_energy(&self.config.first_species.atom_name)?;
        let second_ionization = self
            .reference
            .fetch_ionization_energy(&self.config.second_species.atom_name)?;

        let atom_ratio = atom_concentration_ratio(
            intensity_ratios.fit.intercept,
            first_partitions.atom,
            second_partitions.atom,
        )?;
        let electron_density = electron_concentration(
            temperature,
            carrier.ionization_energy,
            carrier.partition_functions,
            &self.constants,
        )?;
        let first_ion_ratio = ion_atom_concentration_ratio(
            electron_density,
            temperature,
            first_ionization,
            first_partitions,
            &self.constants,
        )?;
        let second_ion_ratio = ion_atom_concentration_ratio(
            electron_density,
            temperature,
            second_ionization,
            second_partitions,
            &self.constants,
        )?;
        let total = total_concentration(atom_ratio, first_ion_ratio, second_ion_ratio)?;
        let debye = debye_length(temperature, electron_density, &self.constants)?;
        info!(
            stage = %PipelineStage::Concentrations,
            atom_ratio,
            electron_concentration = electron_density,
            first_ion_ratio,
            second_ion_ratio,
            total_concentration = total,
            "computed concentrations"
        );

        let first_species = self.species_report(
            &self.config.first_species,
            first,
            first_partitions,
            first_ionization,
            first_ion_ratio,
            temperature,
        )?;
        let second_species = self.species_report(
            &self.config.second_species,
            second,
            second_partitions,
            second_ionization,
            second_ion_ratio,
            temperature,
        )?;
        let unconverged_line_fits = unconverged_line_fits(&[&first_species, &second_species]);

        Ok(DiagnosticReport {
            spectrum: prepared.spectrum,
            corrected: prepared.correction.corrected,
            baseline: prepared.correction.baseline,
            peaks: prepared.peaks,
            peak_table: prepared.peak_table,
            intensity_ratios,
            temperature,
            atom_concentration_ratio: atom_ratio,
            electron_concentration: electron_density,
            total_concentration: total,
            debye_length: debye,
            first_species,
            second_species,
            carrier_species: carrier,
            unconverged_line_fits,
            warnings,
        })
    }

    fn integrate_species(
        &self,
        integrator: &LineIntegrator,
        corrected: &Spectrum,
        peaks: &[usize],
        species: &SpeciesConfig,
        warnings: &mut Vec<ConvergenceWarning>,
    ) -> DiagnosticResult<IntegratedSpecies> {
        let (lines, fits) = self.integrate_lines(
            integrator,
            corrected,
            peaks,
            &species.atom_name,
            &species.target_peaks,
            warnings,
        )?;
        let (ion_lines, ion_fits) = if species.ion_target_peaks.is_empty() {
            (Vec::new(), Vec::new())
        } else {
            self.integrate_lines(
                integrator,
                corrected,
                peaks,
                &species.ion_name,
                &species.ion_target_peaks,
                warnings,
            )?
        };
        Ok(IntegratedSpecies {
            lines,
            fits,
            ion_lines,
            ion_fits,
        })
    }

    fn integrate_lines(
        &self,
        integrator: &LineIntegrator,
        corrected: &Spectrum,
        peaks: &[usize],
        species: &str,
        targets: &[f64],
        warnings: &mut Vec<ConvergenceWarning>,
    ) -> DiagnosticResult<(Vec<IntegratedLine>, Vec<LineIntegral>)> {
        let matcher = LineMatcher::new(species);
        let range = line_search_range(targets, self.config.line_integration.line_search_margin)
            .ok_or_else(|| {
                DiagnosticError::input(
                    "INPUT.EMPTY_TARGET_PEAKS",
                    format!("no target peaks were given for {species}"),
                )
            })?;
        let candidates = self.reference.fetch_atomic_lines(species, range)?;
        let records = matcher.match_lines(&candidates, targets)?;

        let fits = integrator.integrate(corrected, peaks, targets)?;
        for fit in &fits {
            if let Some(warning) = fit.convergence_warning() {
                warn!(
                    species,
                    target_wavelength = fit.target_wavelength,
                    peak_wavelength = fit.peak_wavelength,
                    iterations = fit.fit_iterations,
                    "line fit hit its iteration limit; keeping the last estimate"
                );
                warnings.push(warning);
            }
        }

        let lines: Vec<IntegratedLine> = fits
            .iter()
            .zip(records)
            .map(|(fit, record)| IntegratedLine {
                target_wavelength: fit.target_wavelength,
                peak_index: fit.peak_index,
                peak_wavelength: fit.peak_wavelength,
                record,
                integral: fit.integral,
            })
            .collect();
        info!(
            stage = %PipelineStage::LineIntegration,
            species,
            lines = lines.len(),
            "integrated lines"
        );

        Ok((lines, fits))
    }

    fn partition_functions(
        &self,
        atom_name: &str,
        ion_name: &str,
        temperature: Temperature,
    ) -> DiagnosticResult<PartitionFunctions> {
        Ok(PartitionFunctions::new(
            self.reference
                .fetch_partition_function(atom_name, temperature)?,
            self.reference.fetch_partition_function(ion_name, temperature)?,
        ))
    }

    fn carrier_report(
        &self,
        carrier: &CarrierConfig,
        temperature: Temperature,
    ) -> DiagnosticResult<CarrierReport> {
        let partition_functions =
            self.partition_functions(&carrier.atom_name, &carrier.ion_name, temperature)?;
        let ionization_energy = self.reference.fetch_ionization_energy(&carrier.atom_name)?;
        Ok(CarrierReport {
            atom_name: carrier.atom_name.clone(),
            ion_name: carrier.ion_name.clone(),
            partition_functions,
            ionization_energy,
        })
    }

    fn species_report(
        &self,
        species: &SpeciesConfig,
        integrated: IntegratedSpecies,
        partition_functions: PartitionFunctions,
        ionization_energy: f64,
        ion_atom_ratio: f64,
        temperature: Temperature,
    ) -> DiagnosticResult<SpeciesReport> {
        let line_pair_deviations = check_line_pairs(&integrated.lines, temperature, &self.constants)?;
        info!(
            stage = %PipelineStage::LinePairCheck,
            species = %species.atom_name,
            max_deviation = line_pair_deviations.max_abs_deviation(),
            "checked line pairs"
        );

        let saha_boltzmann_plot = if integrated.ion_lines.is_empty() {
            None
        } else {
            self.saha_plot(
                &species.atom_name,
                &integrated.lines,
                &integrated.ion_lines,
                ionization_energy,
            )?
        };

        Ok(SpeciesReport {
            atom_name: species.atom_name.clone(),
            ion_name: species.ion_name.clone(),
            boltzmann_plot: self.boltzmann_plot(&species.atom_name, &integrated.lines)?,
            lines: integrated.lines,
            fits: integrated.fits,
            partition_functions,
            ionization_energy,
            ion_atom_ratio,
            line_pair_deviations,
            ion_lines: integrated.ion_lines,
            ion_fits: integrated.ion_fits,
            saha_boltzmann_plot,
        })
    }

    /// Needs at least two distinct ion/atom energy gaps. A slope or intercept that gives
    /// no physical temperature or density only drops the plot.
    fn saha_plot(
        &self,
        species: &str,
        atom_lines: &[IntegratedLine],
        ion_lines: &[IntegratedLine],
        ionization_energy: f64,
    ) -> DiagnosticResult<Option<SahaBoltzmannPlot>> {
        let gaps: Vec<f64> = ion_lines
            .iter()
            .flat_map(|ion| {
                atom_lines
                    .iter()
                    .map(move |atom| ion.record.upper_energy - atom.record.upper_energy)
            })
            .collect();
        let Some(first_gap) = gaps.first() else {
            return Ok(None);
        };
        if gaps.iter().all(|gap| gap == first_gap) {
            return Ok(None);
        }

        match saha_boltzmann_plot(atom_lines, ion_lines, ionization_energy, &self.constants) {
            Ok(plot) => {
                info!(
                    stage = %PipelineStage::Temperature,
                    species,
                    temperature = plot.temperature.kelvin(),
                    electron_concentration = plot.electron_concentration,
                    "fitted Saha-Boltzmann plot"
                );
                Ok(Some(plot))
            }
            Err(
                BoltzmannError::NonPhysicalSlope { .. } | BoltzmannError::NonFiniteDensity { .. },
            ) => {
                warn!(
                    species,
                    "Saha-Boltzmann plot does not give a physical temperature or density"
                );
                Ok(None)
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Single-species plot when at least two distinct upper energies are available. A
    /// non-physical slope only drops the plot.
    fn boltzmann_plot(
        &self,
        species: &str,
        lines: &[IntegratedLine],
    ) -> DiagnosticResult<Option<BoltzmannPlot>> {
        let Some(first) = lines.first() else {
            return Ok(None);
        };
        if lines
            .iter()
            .all(|line| line.record.upper_energy == first.record.upper_energy)
        {
            return Ok(None);
        }

        match classical_boltzmann_plot(lines, &self.constants) {
            Ok(plot) => Ok(Some(plot)),
            Err(BoltzmannError::NonPhysicalSlope { slope }) => {
                warn!(species, slope, "single-species Boltzmann plot has a non-physical slope");
                Ok(None)
            }
            Err(error) => Err(error.into()),
        }
    }
}

fn unconverged_line_fits(species: &[&SpeciesReport]) -> Vec<UnconvergedLineFit> {
    species
        .iter()
        .flat_map(|report| {
            report
                .fits
                .iter()
                .map(|fit| (&report.atom_name, fit))
                .chain(report.ion_fits.iter().map(|fit| (&report.ion_name, fit)))
        })
        .filter(|(_, fit)| !fit.fit_converged)
        .map(|(name, fit)| UnconvergedLineFit {
            species: name.clone(),
            target_wavelength: fit.target_wavelength,
            peak_wavelength: fit.peak_wavelength,
            iterations: fit.fit_iterations,
            cost: fit.fit_cost,
        })
        .collect()
}

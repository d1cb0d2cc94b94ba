use crate::common::constants::PhysicalConstants;
use crate::domain::{
    DiagnosticError, IntegratedLine, IntensityRatioPoint, LinearFit, Temperature,
};
use crate::numerics::{linear_regression, RegressionError};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BoltzmannError {
    #[error("{label} line set is empty")]
    EmptyLines { label: &'static str },
    #[error("normalized intensity of the {wavelength} nm line is not positive and finite: {value}")]
    NonPositiveIntensity { wavelength: f64, value: f64 },
    #[error("Boltzmann slope {slope} does not give a physical temperature")]
    NonPhysicalSlope { slope: f64 },
    #[error("Saha-Boltzmann intercept {intercept} does not give a finite electron density")]
    NonFiniteDensity { intercept: f64 },
    #[error("intensity ratio regression failed: {0}")]
    Regression(#[from] RegressionError),
}

impl From<BoltzmannError> for DiagnosticError {
    fn from(error: BoltzmannError) -> Self {
        match error {
            BoltzmannError::EmptyLines { .. } => {
                DiagnosticError::input("INPUT.EMPTY_LINE_SET", error.to_string())
            }
            BoltzmannError::Regression(
                RegressionError::InsufficientPoints { .. } | RegressionError::ZeroVariance,
            ) => DiagnosticError::input("INPUT.RATIO_POINTS", error.to_string()),
            BoltzmannError::NonPositiveIntensity { .. } => {
                DiagnosticError::numeric("NUMERIC.LOG_RATIO", error.to_string())
            }
            BoltzmannError::NonPhysicalSlope { .. } => {
                DiagnosticError::numeric("NUMERIC.TEMPERATURE", error.to_string())
            }
            BoltzmannError::NonFiniteDensity { .. } => {
                DiagnosticError::numeric("NUMERIC.ELECTRON_DENSITY", error.to_string())
            }
            BoltzmannError::Regression(_) => {
                DiagnosticError::numeric("NUMERIC.REGRESSION", error.to_string())
            }
        }
    }
}

/// `integral * wavelength / (g * A)` with the wavelength converted to cm.
pub fn normalized_intensity(line: &IntegratedLine, constants: &PhysicalConstants) -> f64 {
    line.integral * line.record.wavelength * constants.wavelength_scale
        / (line.record.upper_statistical_weight * line.record.transition_probability)
}

fn positive_normalized_intensity(
    line: &IntegratedLine,
    constants: &PhysicalConstants,
) -> Result<f64, BoltzmannError> {
    let value = normalized_intensity(line, constants);
    if !value.is_finite() || value <= 0.0 {
        return Err(BoltzmannError::NonPositiveIntensity {
            wavelength: line.record.wavelength,
            value,
        });
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntensityRatios {
    pub points: Vec<IntensityRatioPoint>,
    pub fit: LinearFit,
}

/// Cross product of two species' lines, first-species major:
/// `(E_second - E_first, ln(value_first / value_second))`, fitted by least squares.
pub fn build_intensity_ratios(
    first: &[IntegratedLine],
    second: &[IntegratedLine],
    constants: &PhysicalConstants,
) -> Result<IntensityRatios, BoltzmannError> {
    if first.is_empty() {
        return Err(BoltzmannError::EmptyLines { label: "first species" });
    }
    if second.is_empty() {
        return Err(BoltzmannError::EmptyLines {
            label: "second species",
        });
    }

    let first_values = first
        .iter()
        .map(|line| positive_normalized_intensity(line, constants))
        .collect::<Result<Vec<_>, _>>()?;
    let second_values = second
        .iter()
        .map(|line| positive_normalized_intensity(line, constants))
        .collect::<Result<Vec<_>, _>>()?;

    let mut points = Vec::with_capacity(first.len() * second.len());
    for (first_line, first_value) in first.iter().zip(&first_values) {
        for (second_line, second_value) in second.iter().zip(&second_values) {
            points.push(IntensityRatioPoint {
                energy_difference: second_line.record.upper_energy
                    - first_line.record.upper_energy,
                log_ratio: (first_value / second_value).ln(),
            });
        }
    }

    let fit = fit_points(&points)?;
    debug!(
        points = points.len(),
        slope = fit.slope,
        intercept = fit.intercept,
        r_squared = fit.r_squared,
        "intensity ratio fit"
    );
    Ok(IntensityRatios { points, fit })
}

fn fit_points(points: &[IntensityRatioPoint]) -> Result<LinearFit, RegressionError> {
    let x: Vec<f64> = points.iter().map(|point| point.energy_difference).collect();
    let y: Vec<f64> = points.iter().map(|point| point.log_ratio).collect();
    linear_regression(&x, &y)
}

/// `T = 1 / (k * slope)` with `k` in cm^-1/K; the slope must be positive.
pub fn solve_temperature(
    fit: &LinearFit,
    constants: &PhysicalConstants,
) -> Result<Temperature, BoltzmannError> {
    let slope = fit.slope;
    if !slope.is_finite() || slope <= 0.0 {
        return Err(BoltzmannError::NonPhysicalSlope { slope });
    }
    let kelvin = 1.0 / (constants.boltzmann_plot_wavenumber_per_kelvin * slope);
    Temperature::new(kelvin).map_err(|_| BoltzmannError::NonPhysicalSlope { slope })
}

fn temperature_from_magnitude(
    slope: f64,
    constants: &PhysicalConstants,
) -> Result<Temperature, BoltzmannError> {
    let kelvin = (1.0 / (constants.boltzmann_plot_wavenumber_per_kelvin * slope)).abs();
    Temperature::new(kelvin).map_err(|_| BoltzmannError::NonPhysicalSlope { slope })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoltzmannPlotPoint {
    pub upper_energy: f64,
    pub log_intensity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoltzmannPlot {
    pub points: Vec<BoltzmannPlotPoint>,
    pub fit: LinearFit,
    pub temperature: Temperature,
}

/// Single-species plot of `ln(I * lambda / (h * c * g * A))` against the upper level
/// energy, `T = -1 / (k * slope)`.
pub fn classical_boltzmann_plot(
    lines: &[IntegratedLine],
    constants: &PhysicalConstants,
) -> Result<BoltzmannPlot, BoltzmannError> {
    if lines.is_empty() {
        return Err(BoltzmannError::EmptyLines { label: "species" });
    }
    let photon_scale = constants.planck * constants.speed_of_light;
    let points = lines
        .iter()
        .map(|line| {
            let value = positive_normalized_intensity(line, constants)? / photon_scale;
            Ok(BoltzmannPlotPoint {
                upper_energy: line.record.upper_energy,
                log_intensity: value.ln(),
            })
        })
        .collect::<Result<Vec<_>, BoltzmannError>>()?;

    let x: Vec<f64> = points.iter().map(|point| point.upper_energy).collect();
    let y: Vec<f64> = points.iter().map(|point| point.log_intensity).collect();
    let fit = linear_regression(&x, &y)?;
    // populations fall with energy, so only a negative slope is physical here
    if fit.slope >= 0.0 {
        return Err(BoltzmannError::NonPhysicalSlope { slope: fit.slope });
    }
    let temperature = temperature_from_magnitude(fit.slope, constants)?;

    Ok(BoltzmannPlot {
        points,
        fit,
        temperature,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SahaBoltzmannPlot {
    pub points: Vec<IntensityRatioPoint>,
    pub fit: LinearFit,
    pub temperature: Temperature,
    pub electron_concentration: f64,
}

/// Atom/ion line pairs of one element, ion major:
/// `(E_ion + E_ionization - E_atom, ln(value_ion / value_atom))`.
/// The electron density is `2 * (X * T)^1.5 / exp(intercept)`.
pub fn saha_boltzmann_plot(
    atom_lines: &[IntegratedLine],
    ion_lines: &[IntegratedLine],
    ionization_energy: f64,
    constants: &PhysicalConstants,
) -> Result<SahaBoltzmannPlot, BoltzmannError> {
    if atom_lines.is_empty() {
        return Err(BoltzmannError::EmptyLines { label: "atom" });
    }
    if ion_lines.is_empty() {
        return Err(BoltzmannError::EmptyLines { label: "ion" });
    }

    let atom_values = atom_lines
        .iter()
        .map(|line| positive_normalized_intensity(line, constants))
        .collect::<Result<Vec<_>, _>>()?;

    let mut points = Vec::with_capacity(atom_lines.len() * ion_lines.len());
    for ion_line in ion_lines {
        let ion_value = positive_normalized_intensity(ion_line, constants)?;
        for (atom_line, atom_value) in atom_lines.iter().zip(&atom_values) {
            points.push(IntensityRatioPoint {
                energy_difference: ion_line.record.upper_energy + ionization_energy
                    - atom_line.record.upper_energy,
                log_ratio: (ion_value / atom_value).ln(),
            });
        }
    }

    let fit = fit_points(&points)?;
    let temperature = temperature_from_magnitude(fit.slope, constants)?;

    // ln n_e = ln 2 + 1.5 ln(X T) - intercept
    let log_density = std::f64::consts::LN_2
        + 1.5 * (constants.saha_constant() * temperature.kelvin()).ln()
        - fit.intercept;
    let electron_concentration = log_density.exp();
    if !electron_concentration.is_finite() || electron_concentration <= 0.0 {
        return Err(BoltzmannError::NonFiniteDensity {
            intercept: fit.intercept,
        });
    }

    Ok(SahaBoltzmannPlot {
        points,
        fit,
        temperature,
        electron_concentration,
    })
}

#[cfg(test)]
mod tests {
    use super::{
        build_intensity_ratios, classical_boltzmann_plot, normalized_intensity,
        saha_boltzmann_plot, solve_temperature, BoltzmannError,
    };
    use crate::common::constants::PhysicalConstants;
    use crate::domain::{AtomicLineRecord, DiagnosticError, IntegratedLine, LinearFit};

    fn line(wavelength: f64, a: f64, g: f64, energy: f64, integral: f64) -> IntegratedLine {
        IntegratedLine {
            target_wavelength: wavelength,
            peak_index: 0,
            peak_wavelength: wavelength,
            record: AtomicLineRecord::new(wavelength, a, g, energy),
            integral,
        }
    }

    /// Integral that puts the line exactly on a Boltzmann distribution at `kelvin`.
    fn boltzmann_integral(
        wavelength: f64,
        a: f64,
        g: f64,
        energy: f64,
        population: f64,
        kelvin: f64,
    ) -> f64 {
        population * g * a / wavelength * (-energy / (0.695_035 * kelvin)).exp()
    }

    #[test]
    fn normalized_intensity_uses_centimetre_wavelength() {
        let constants = PhysicalConstants::CGS;
        let value = normalized_intensity(&line(500.0, 2.0e7, 4.0, 0.0, 8.0e8), &constants);
        assert!((value - 8.0e8 * 500.0e-7 / 8.0e7).abs() < 1.0e-12);
    }

    #[test]
    fn cross_species_ratios_recover_temperature_and_population_ratio() {
        let constants = PhysicalConstants::CGS;
        let kelvin = 11_500.0;
        let first_spec = [
            (312.278, 1.9e7, 4.0, 41_174.613),
            (406.507, 8.5e7, 4.0, 61_951.6),
            (479.258, 8.9e7, 6.0, 62_033.7),
        ];
        let second_spec = [
            (338.2887, 1.3e8, 2.0, 29_552.0574),
            (520.9078, 7.5e7, 4.0, 48_743.969),
            (546.5497, 8.6e7, 6.0, 48_764.219),
        ];
        let first: Vec<IntegratedLine> = first_spec
            .iter()
            .map(|(w, a, g, e)| line(*w, *a, *g, *e, boltzmann_integral(*w, *a, *g, *e, 3.0, kelvin)))
            .collect();
        let second: Vec<IntegratedLine> = second_spec
            .iter()
            .map(|(w, a, g, e)| line(*w, *a, *g, *e, boltzmann_integral(*w, *a, *g, *e, 1.5, kelvin)))
            .collect();

        let ratios = build_intensity_ratios(&first, &second, &constants).expect("ratios");
        assert_eq!(ratios.points.len(), 9);
        assert!(
            (ratios.points[1].energy_difference - (48_743.969 - 41_174.613)).abs() < 1.0e-9
        );
        assert!((ratios.fit.intercept - 2.0_f64.ln()).abs() < 1.0e-9);
        assert!((ratios.fit.r_squared - 1.0).abs() < 1.0e-12);

        let temperature = solve_temperature(&ratios.fit, &constants).expect("temperature");
        assert!((temperature.kelvin() - kelvin).abs() < 1.0e-6 * kelvin);
    }

    #[test]
    fn non_positive_slope_is_a_numeric_error() {
        let constants = PhysicalConstants::CGS;
        let fit = LinearFit {
            slope: -1.0e-4,
            intercept: 0.0,
            r_squared: 1.0,
        };
        let error = solve_temperature(&fit, &constants).expect_err("negative slope");
        assert_eq!(error, BoltzmannError::NonPhysicalSlope { slope: -1.0e-4 });
        assert_eq!(DiagnosticError::from(error).exit_code(), 4);
    }

    #[test]
    fn empty_or_degenerate_line_sets_are_input_errors() {
        let constants = PhysicalConstants::CGS;
        let lonely = [line(500.0, 1.0e7, 2.0, 20_000.0, 10.0)];
        let error = build_intensity_ratios(&[], &lonely, &constants).expect_err("empty");
        assert_eq!(DiagnosticError::from(error).placeholder(), "INPUT.EMPTY_LINE_SET");

        let error = build_intensity_ratios(&lonely, &lonely, &constants).expect_err("one point");
        assert_eq!(DiagnosticError::from(error).placeholder(), "INPUT.RATIO_POINTS");

        let dark = [line(500.0, 1.0e7, 2.0, 20_000.0, 0.0)];
        let error = build_intensity_ratios(&dark, &lonely, &constants).expect_err("zero integral");
        assert_eq!(DiagnosticError::from(error).placeholder(), "NUMERIC.LOG_RATIO");
    }

    #[test]
    fn classical_plot_recovers_single_species_temperature() {
        let constants = PhysicalConstants::CGS;
        let kelvin = 9_000.0;
        let lines: Vec<IntegratedLine> = [
            (312.278, 1.9e7, 4.0, 41_174.613),
            (406.507, 8.5e7, 4.0, 61_951.6),
            (479.258, 8.9e7, 6.0, 62_033.7),
        ]
        .iter()
        .map(|(w, a, g, e)| line(*w, *a, *g, *e, boltzmann_integral(*w, *a, *g, *e, 1.0e6, kelvin)))
        .collect();

        let plot = classical_boltzmann_plot(&lines, &constants).expect("plot");
        assert!(plot.fit.slope < 0.0);
        assert!((plot.temperature.kelvin() - kelvin).abs() < 1.0e-6 * kelvin);
    }

    #[test]
    fn saha_boltzmann_plot_recovers_density_from_intercept() {
        let constants = PhysicalConstants::CGS;
        let kelvin = 12_000.0;
        let ionization = 61_106.45;
        let density: f64 = 2.0e16;
        // ion/atom value ratio = 2 (X T)^1.5 / n_e * exp(-(E_ion + E_ionization - E_atom) / kT)
        let prefactor = 2.0 * (constants.saha_constant() * kelvin).powf(1.5) / density;

        let atom_lines: Vec<IntegratedLine> = [(520.9078, 7.5e7, 4.0, 48_743.969), (546.5497, 8.6e7, 6.0, 48_764.219), (338.2887, 1.3e8, 2.0, 29_552.0574)]
            .iter()
            .map(|(w, a, g, e)| line(*w, *a, *g, *e, boltzmann_integral(*w, *a, *g, *e, 1.0, kelvin)))
            .collect();
        let ion_lines: Vec<IntegratedLine> = [(224.6412, 2.0e8, 6.0, 87_761.0), (243.7791, 1.0e8, 4.0, 86_140.0)]
            .iter()
            .map(|(w, a, g, e)| {
                line(*w, *a, *g, *e, boltzmann_integral(*w, *a, *g, *e + ionization, prefactor, kelvin))
            })
            .collect();

        let plot = saha_boltzmann_plot(&atom_lines, &ion_lines, ionization, &constants)
            .expect("plot");
        assert_eq!(plot.points.len(), 6);
        assert!((plot.temperature.kelvin() - kelvin).abs() < 1.0e-6 * kelvin);
        let relative = (plot.electron_concentration - density).abs() / density;
        assert!(relative < 1.0e-6, "n_e = {}", plot.electron_concentration);
    }
}

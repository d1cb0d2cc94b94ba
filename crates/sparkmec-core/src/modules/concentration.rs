use crate::common::constants::{PhysicalConstants, PLASMA_TEMPERATURE_RANGE_K};
use crate::domain::{DiagnosticError, Temperature};
use serde::Serialize;
use std::f64::consts::LN_2;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConcentrationError {
    #[error("{quantity} is not a positive finite number: {value}")]
    NonPositive { quantity: &'static str, value: f64 },
    #[error("electron concentration must be positive before it is used as a divisor, got {value}")]
    NonPositiveElectronConcentration { value: f64 },
}

impl From<ConcentrationError> for DiagnosticError {
    fn from(error: ConcentrationError) -> Self {
        match error {
            ConcentrationError::NonPositiveElectronConcentration { .. } => {
                DiagnosticError::numeric("NUMERIC.ELECTRON_DENSITY", error.to_string())
            }
            ConcentrationError::NonPositive { .. } => {
                DiagnosticError::numeric("NUMERIC.CONCENTRATION", error.to_string())
            }
        }
    }
}

/// Atom and first-ion partition functions of one element at the plasma temperature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionFunctions {
    pub atom: f64,
    pub ion: f64,
}

impl PartitionFunctions {
    pub fn new(atom: f64, ion: f64) -> Self {
        Self { atom, ion }
    }

    fn log_ion_to_atom(&self) -> Result<f64, ConcentrationError> {
        positive("atom partition function", self.atom)?;
        positive("ion partition function", self.ion)?;
        Ok(self.ion.ln() - self.atom.ln())
    }
}

fn positive(quantity: &'static str, value: f64) -> Result<f64, ConcentrationError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConcentrationError::NonPositive { quantity, value })
    }
}

/// Logs a warning when `temperature` lies outside the range the Saha formulas are
/// calibrated for. Returns whether it is inside.
pub fn check_temperature_range(temperature: Temperature) -> bool {
    let (lower, upper) = PLASMA_TEMPERATURE_RANGE_K;
    let kelvin = temperature.kelvin();
    let inside = (lower..=upper).contains(&kelvin);
    if !inside {
        warn!(
            temperature = kelvin,
            lower, upper, "temperature is outside the calibrated Saha range"
        );
    }
    inside
}

/// `ln(2 * (X * T)^1.5 * exp(-E_ion / (k * T)))`
fn log_saha_factor(
    temperature: Temperature,
    ionization_energy: f64,
    constants: &PhysicalConstants,
) -> f64 {
    let kelvin = temperature.kelvin();
    LN_2 + 1.5 * (constants.saha_constant() * kelvin).ln()
        - ionization_energy / (constants.saha_wavenumber_per_kelvin * kelvin)
}

/// `exp(intercept) * Z_atom(first) / Z_atom(second)`
pub fn atom_concentration_ratio(
    intercept: f64,
    first_atom_partition: f64,
    second_atom_partition: f64,
) -> Result<f64, ConcentrationError> {
    positive("first atom partition function", first_atom_partition)?;
    positive("second atom partition function", second_atom_partition)?;
    let ratio = (intercept + first_atom_partition.ln() - second_atom_partition.ln()).exp();
    positive("atom concentration ratio", ratio)
}

/// Electron density of the carrier species from charge balance and the Saha equation.
///
/// The positive root `(-B + sqrt(B^2 + 4C)) / 2` is evaluated as
/// `2C / (B + sqrt(B^2 + 4C))` to avoid cancellation when `C << B^2`.
pub fn electron_concentration(
    temperature: Temperature,
    ionization_energy: f64,
    partitions: PartitionFunctions,
    constants: &PhysicalConstants,
) -> Result<f64, ConcentrationError> {
    let log_ratio = partitions.log_ion_to_atom()?;
    let kelvin = temperature.kelvin();
    let log_saha = log_saha_factor(temperature, ionization_energy, constants) + log_ratio;

    let b = 4.0 * log_saha.exp();
    let c = 2.0 * (log_saha + constants.pressure_scale.ln()
        - (kelvin * constants.boltzmann).ln())
    .exp();
    let root = (b * b + 4.0 * c).sqrt();
    let density = 2.0 * c / (b + root);

    if !density.is_finite() || density <= 0.0 {
        return Err(ConcentrationError::NonPositiveElectronConcentration { value: density });
    }
    Ok(density)
}

/// `2 / n_e * (X * T)^1.5 * exp(-E_ion / (k * T)) * Z_ion / Z_atom`
pub fn ion_atom_concentration_ratio(
    electron_concentration: f64,
    temperature: Temperature,
    ionization_energy: f64,
    partitions: PartitionFunctions,
    constants: &PhysicalConstants,
) -> Result<f64, ConcentrationError> {
    if !electron_concentration.is_finite() || electron_concentration <= 0.0 {
        return Err(ConcentrationError::NonPositiveElectronConcentration {
            value: electron_concentration,
        });
    }
    let log_ratio = log_saha_factor(temperature, ionization_energy, constants)
        - electron_concentration.ln()
        + partitions.log_ion_to_atom()?;
    positive("ion/atom concentration ratio", log_ratio.exp())
}

/// `(ion_first + 1) / (ion_second + 1) * atom_ratio`
pub fn total_concentration(
    atom_ratio: f64,
    first_ion_atom_ratio: f64,
    second_ion_atom_ratio: f64,
) -> Result<f64, ConcentrationError> {
    let total = (first_ion_atom_ratio + 1.0) / (second_ion_atom_ratio + 1.0) * atom_ratio;
    if total.is_finite() && total >= 0.0 {
        Ok(total)
    } else {
        Err(ConcentrationError::NonPositive {
            quantity: "total concentration",
            value: total,
        })
    }
}

/// Debye length in cm, `743 * sqrt(T[eV] / n_e)`.
pub fn debye_length(
    temperature: Temperature,
    electron_concentration: f64,
    constants: &PhysicalConstants,
) -> Result<f64, ConcentrationError> {
    if !electron_concentration.is_finite() || electron_concentration <= 0.0 {
        return Err(ConcentrationError::NonPositiveElectronConcentration {
            value: electron_concentration,
        });
    }
    let electronvolts = temperature.kelvin() * constants.electronvolt_per_kelvin;
    positive(
        "Debye length",
        constants.debye_length_prefactor * (electronvolts / electron_concentration).sqrt(),
    )
}

pub mod errors;

pub use errors::{DiagnosticError, DiagnosticErrorCategory, DiagnosticResult};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// The second-difference operator of the baseline smoother needs `L - 2 >= 1`.
pub const MIN_SPECTRUM_SAMPLES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStage {
    SpectrumCorrection,
    PeakFinding,
    LineIntegration,
    IntensityRatios,
    Temperature,
    Concentrations,
    LinePairCheck,
}

impl PipelineStage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SpectrumCorrection => "SPECTRUM_CORRECTION",
            Self::PeakFinding => "PEAK_FINDING",
            Self::LineIntegration => "LINE_INTEGRATION",
            Self::IntensityRatios => "INTENSITY_RATIOS",
            Self::Temperature => "TEMPERATURE",
            Self::Concentrations => "CONCENTRATIONS",
            Self::LinePairCheck => "LINE_PAIR_CHECK",
        }
    }
}

impl Display for PipelineStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Wavelength/intensity samples sorted ascending by wavelength.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Spectrum {
    wavelengths: Vec<f64>,
    intensities: Vec<f64>,
}

impl Spectrum {
    pub fn new(wavelengths: Vec<f64>, intensities: Vec<f64>) -> DiagnosticResult<Self> {
        if wavelengths.len() != intensities.len() {
            return Err(DiagnosticError::input(
                "INPUT.SPECTRUM_SHAPE",
                format!(
                    "spectrum column length mismatch: wavelengths={}, intensities={}",
                    wavelengths.len(),
                    intensities.len()
                ),
            ));
        }
        if wavelengths.len() < MIN_SPECTRUM_SAMPLES {
            return Err(DiagnosticError::input(
                "INPUT.SPECTRUM_TOO_SHORT",
                format!(
                    "spectrum requires at least {} samples, got {}",
                    MIN_SPECTRUM_SAMPLES,
                    wavelengths.len()
                ),
            ));
        }

        for (index, (wavelength, intensity)) in wavelengths.iter().zip(&intensities).enumerate() {
            if !wavelength.is_finite() || !intensity.is_finite() {
                return Err(DiagnosticError::input(
                    "INPUT.SPECTRUM_NON_FINITE",
                    format!(
                        "spectrum sample {index} is not finite: ({wavelength}, {intensity})"
                    ),
                ));
            }
        }

        if let Some(index) = wavelengths
            .windows(2)
            .position(|window| window[1] < window[0])
        {
            return Err(DiagnosticError::input(
                "INPUT.SPECTRUM_ORDER",
                format!(
                    "spectrum wavelengths must be ascending, index {} has {} after {}",
                    index + 1,
                    wavelengths[index + 1],
                    wavelengths[index]
                ),
            ));
        }

        Ok(Self {
            wavelengths,
            intensities,
        })
    }

    pub fn len(&self) -> usize {
        self.wavelengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavelengths.is_empty()
    }

    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    pub fn intensities(&self) -> &[f64] {
        &self.intensities
    }

    /// Same wavelength axis, new intensity column. Callers keep the lengths aligned.
    pub(crate) fn with_intensities(&self, intensities: Vec<f64>) -> Self {
        debug_assert_eq!(intensities.len(), self.wavelengths.len());
        Self {
            wavelengths: self.wavelengths.clone(),
            intensities,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WavelengthRange {
    pub lower: f64,
    pub upper: f64,
}

impl WavelengthRange {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, wavelength: f64) -> bool {
        wavelength >= self.lower && wavelength <= self.upper
    }
}

/// One reference transition: wavelength in nm, Einstein A in s^-1, upper-level
/// statistical weight and upper-level energy in cm^-1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtomicLineRecord {
    pub wavelength: f64,
    pub transition_probability: f64,
    pub upper_statistical_weight: f64,
    pub upper_energy: f64,
}

impl AtomicLineRecord {
    pub fn new(
        wavelength: f64,
        transition_probability: f64,
        upper_statistical_weight: f64,
        upper_energy: f64,
    ) -> Self {
        Self {
            wavelength,
            transition_probability,
            upper_statistical_weight,
            upper_energy,
        }
    }

    pub fn is_usable(&self) -> bool {
        self.wavelength.is_finite()
            && self.wavelength > 0.0
            && self.transition_probability.is_finite()
            && self.transition_probability > 0.0
            && self.upper_statistical_weight.is_finite()
            && self.upper_statistical_weight > 0.0
            && self.upper_energy.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegratedLine {
    pub target_wavelength: f64,
    pub peak_index: usize,
    pub peak_wavelength: f64,
    pub record: AtomicLineRecord,
    pub integral: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntensityRatioPoint {
    pub energy_difference: f64,
    pub log_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

impl LinearFit {
    pub fn evaluate(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Excitation temperature in Kelvin; strictly positive and finite.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Temperature(f64);

impl Temperature {
    pub fn new(kelvin: f64) -> DiagnosticResult<Self> {
        if !kelvin.is_finite() || kelvin <= 0.0 {
            return Err(DiagnosticError::numeric(
                "NUMERIC.TEMPERATURE",
                format!("temperature must be finite and > 0 K, got {kelvin}"),
            ));
        }
        Ok(Self(kelvin))
    }

    pub const fn kelvin(self) -> f64 {
        self.0
    }
}

impl Display for Temperature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3} K", self.0)
    }
}

/// An iterative stage stopped at its cap; the last estimate was kept.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvergenceWarning {
    pub stage: PipelineStage,
    pub detail: String,
    pub iterations: usize,
    pub criterion: f64,
}

use crate::common::config::SpectrumCorrectionConfig;
use crate::domain::{
    ConvergenceWarning, DiagnosticError, DiagnosticResult, PipelineStage, Spectrum,
    MIN_SPECTRUM_SAMPLES,
};
use crate::numerics::{
    euclidean_norm, mean, population_std_dev, solve_pentadiagonal, BandedSolveError,
    SymmetricPentadiagonal,
};
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaselineInput<'a> {
    pub intensities: &'a [f64],
    pub ratio: f64,
    pub lambda: f64,
    pub iteration_limit: usize,
}

impl<'a> BaselineInput<'a> {
    pub fn new(intensities: &'a [f64], ratio: f64, lambda: f64, iteration_limit: usize) -> Self {
        Self {
            intensities,
            ratio,
            lambda,
            iteration_limit,
        }
    }

    pub fn from_config(intensities: &'a [f64], config: &SpectrumCorrectionConfig) -> Self {
        Self::new(
            intensities,
            config.ratio,
            config.lam,
            config.iteration_limit,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BaselineEstimate {
    pub baseline: Vec<f64>,
    pub iterations: usize,
    pub criterion: f64,
    pub converged: bool,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BaselineError {
    #[error("baseline estimation requires at least {minimum} samples, got {actual}")]
    TooShort { minimum: usize, actual: usize },
    #[error("intensity sample {index} is not finite: {value}")]
    NonFiniteIntensity { index: usize, value: f64 },
    #[error("baseline parameter '{field}' must be finite and > 0, got {value}")]
    InvalidParameter { field: &'static str, value: f64 },
    #[error("baseline iteration limit must be >= 1")]
    ZeroIterationLimit,
    #[error("baseline linear solve failed: {0}")]
    Solve(#[from] BandedSolveError),
}

impl From<BaselineError> for DiagnosticError {
    fn from(error: BaselineError) -> Self {
        match error {
            BaselineError::TooShort { .. } => {
                DiagnosticError::input("INPUT.SPECTRUM_TOO_SHORT", error.to_string())
            }
            BaselineError::NonFiniteIntensity { .. } => {
                DiagnosticError::input("INPUT.SPECTRUM_NON_FINITE", error.to_string())
            }
            BaselineError::InvalidParameter { .. } | BaselineError::ZeroIterationLimit => {
                DiagnosticError::input("INPUT.BASELINE_PARAMETER", error.to_string())
            }
            BaselineError::Solve(_) => {
                DiagnosticError::numeric("NUMERIC.BASELINE_SOLVE", error.to_string())
            }
        }
    }
}

/// Runs arPLS: solve `(W + lambda * D * D^T) z = W y`, reweight samples with a
/// logistic of the residual relative to the negative-residual statistics, and
/// repeat until the relative weight change drops below `ratio`.
///
/// Flat input returns itself as the baseline. A negative-residual set that is empty
/// or has zero spread stops the iteration with the current estimate.
pub fn estimate_baseline(input: BaselineInput<'_>) -> Result<BaselineEstimate, BaselineError> {
    validate_input(input)?;
    let y = input.intensities;
    let length = y.len();

    if y.iter().all(|value| *value == y[0]) {
        return Ok(BaselineEstimate {
            baseline: y.to_vec(),
            iterations: 0,
            criterion: 0.0,
            converged: true,
        });
    }

    let penalty = SymmetricPentadiagonal::second_difference_penalty(length, input.lambda);
    let mut weights = vec![1.0; length];
    let mut baseline = Vec::new();
    let mut criterion = f64::INFINITY;

    for iteration in 1..=input.iteration_limit {
        let system = penalty.with_added_diagonal(&weights)?;
        let weighted: Vec<f64> = weights.iter().zip(y).map(|(w, y)| w * y).collect();
        baseline = solve_pentadiagonal(&system, &weighted)?;

        let residuals: Vec<f64> = y.iter().zip(&baseline).map(|(y, z)| y - z).collect();
        let negative: Vec<f64> = residuals.iter().copied().filter(|d| *d < 0.0).collect();
        let (Some(negative_mean), Some(negative_spread)) =
            (mean(&negative), population_std_dev(&negative))
        else {
            debug!(iteration, "no negative residuals, stopping baseline reweighting");
            return Ok(BaselineEstimate {
                baseline,
                iterations: iteration,
                criterion: 0.0,
                converged: true,
            });
        };
        if !(negative_spread.is_finite() && negative_spread > 0.0) {
            debug!(
                iteration,
                negative_spread, "degenerate negative residual spread, stopping baseline reweighting"
            );
            return Ok(BaselineEstimate {
                baseline,
                iterations: iteration,
                criterion: 0.0,
                converged: true,
            });
        }

        let offset = 2.0 * negative_spread - negative_mean;
        let next_weights: Vec<f64> = residuals
            .iter()
            .map(|d| logistic_weight(*d, offset, negative_spread))
            .collect();

        let difference: Vec<f64> = next_weights
            .iter()
            .zip(&weights)
            .map(|(next, previous)| next - previous)
            .collect();
        criterion = euclidean_norm(&difference) / euclidean_norm(&weights);
        weights = next_weights;
        debug!(iteration, criterion, "baseline reweighting step");

        if criterion < input.ratio {
            return Ok(BaselineEstimate {
                baseline,
                iterations: iteration,
                criterion,
                converged: true,
            });
        }
        if euclidean_norm(&weights) == 0.0 {
            return Ok(BaselineEstimate {
                baseline,
                iterations: iteration,
                criterion,
                converged: true,
            });
        }
    }

    Ok(BaselineEstimate {
        baseline,
        iterations: input.iteration_limit,
        criterion,
        converged: false,
    })
}

fn logistic_weight(residual: f64, offset: f64, spread: f64) -> f64 {
    let exponent = 2.0 * (residual - offset) / spread;
    // exp overflows to +inf for large exponents, giving a zero weight
    1.0 / (1.0 + exponent.exp())
}

fn validate_input(input: BaselineInput<'_>) -> Result<(), BaselineError> {
    if input.intensities.len() < MIN_SPECTRUM_SAMPLES {
        return Err(BaselineError::TooShort {
            minimum: MIN_SPECTRUM_SAMPLES,
            actual: input.intensities.len(),
        });
    }
    if let Some((index, value)) = input
        .intensities
        .iter()
        .enumerate()
        .find(|(_, value)| !value.is_finite())
    {
        return Err(BaselineError::NonFiniteIntensity {
            index,
            value: *value,
        });
    }
    for (field, value) in [("ratio", input.ratio), ("lambda", input.lambda)] {
        if !value.is_finite() || value <= 0.0 {
            return Err(BaselineError::InvalidParameter { field, value });
        }
    }
    if input.iteration_limit == 0 {
        return Err(BaselineError::ZeroIterationLimit);
    }
    Ok(())
}

/// Baseline plus the spectrum with that baseline subtracted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineCorrection {
    pub baseline: Vec<f64>,
    pub corrected: Spectrum,
    pub iterations: usize,
    pub criterion: f64,
    pub converged: bool,
    pub warning: Option<ConvergenceWarning>,
}

pub fn correct_spectrum(
    spectrum: &Spectrum,
    config: &SpectrumCorrectionConfig,
) -> DiagnosticResult<BaselineCorrection> {
    let estimate = estimate_baseline(BaselineInput::from_config(spectrum.intensities(), config))?;

    let corrected_intensities: Vec<f64> = spectrum
        .intensities()
        .iter()
        .zip(&estimate.baseline)
        .map(|(y, z)| y - z)
        .collect();

    let warning = (!estimate.converged).then(|| {
        warn!(
            iterations = estimate.iterations,
            criterion = estimate.criterion,
            ratio = config.ratio,
            "baseline correction hit its iteration limit; keeping the last estimate"
        );
        ConvergenceWarning {
            stage: PipelineStage::SpectrumCorrection,
            detail: format!(
                "weight change {:.3e} still above ratio {:.3e}",
                estimate.criterion, config.ratio
            ),
            iterations: estimate.iterations,
            criterion: estimate.criterion,
        }
    });

    Ok(BaselineCorrection {
        baseline: estimate.baseline,
        corrected: spectrum.with_intensities(corrected_intensities),
        iterations: estimate.iterations,
        criterion: estimate.criterion,
        converged: estimate.converged,
        warning,
    })
}

#[cfg(test)]
mod tests {
    use super::{correct_spectrum, estimate_baseline, BaselineError, BaselineInput};
    use crate::common::config::SpectrumCorrectionConfig;
    use crate::domain::{PipelineStage, Spectrum};

    #[test]
    fn flat_input_is_its_own_baseline() {
        let intensities = vec![42.5; 64];
        let estimate =
            estimate_baseline(BaselineInput::new(&intensities, 1.0e-5, 1.0e6, 50)).expect("flat");
        assert_eq!(estimate.baseline, intensities);
        assert_eq!(estimate.iterations, 0);
        assert!(estimate.converged);
    }

    #[test]
    fn single_spike_is_dropped_after_one_reweighting() {
        let estimate = estimate_baseline(BaselineInput::new(&[0.0, 1.0, 0.0], 1.0e-5, 1.0e6, 50))
            .expect("three samples");
        assert_eq!(estimate.baseline, vec![0.0, 0.0, 0.0]);
        assert_eq!(estimate.iterations, 2);
        assert_eq!(estimate.criterion, 0.0);
        assert!(estimate.converged);
    }

    #[test]
    fn short_or_non_finite_input_is_rejected() {
        let error = estimate_baseline(BaselineInput::new(&[1.0, 2.0], 1.0e-5, 1.0e6, 50))
            .expect_err("two samples");
        assert_eq!(
            error,
            BaselineError::TooShort {
                minimum: 3,
                actual: 2
            }
        );

        let error = estimate_baseline(BaselineInput::new(
            &[1.0, f64::INFINITY, 2.0],
            1.0e-5,
            1.0e6,
            50,
        ))
        .expect_err("infinite sample");
        assert!(matches!(error, BaselineError::NonFiniteIntensity { index: 1, .. }));
    }

    #[test]
    fn straight_background_is_reproduced() {
        let intensities: Vec<f64> = (0..80).map(|index| 50.0 + 0.5 * index as f64).collect();
        let estimate = estimate_baseline(BaselineInput::new(&intensities, 1.0e-5, 1.0e6, 50))
            .expect("linear background");
        for (baseline, intensity) in estimate.baseline.iter().zip(&intensities) {
            assert!((baseline - intensity).abs() < 1.0e-6);
        }
    }

    #[test]
    fn capped_iterations_produce_a_warning_not_an_error() {
        let wavelengths: Vec<f64> = (0..200).map(|index| 400.0 + 0.05 * index as f64).collect();
        let intensities: Vec<f64> = wavelengths
            .iter()
            .map(|x| 100.0 + 2_000.0 * (-((x - 405.0) / 0.1).powi(2)).exp() + 3.0 * (x * 7.0).sin())
            .collect();
        let spectrum = Spectrum::new(wavelengths, intensities).expect("valid spectrum");
        let config = SpectrumCorrectionConfig {
            ratio: 1.0e-300,
            lam: 1.0e6,
            iteration_limit: 2,
        };

        let correction = correct_spectrum(&spectrum, &config).expect("capped run still succeeds");
        assert!(!correction.converged);
        assert_eq!(correction.iterations, 2);
        let warning = correction.warning.expect("warning recorded");
        assert_eq!(warning.stage, PipelineStage::SpectrumCorrection);
        assert_eq!(correction.corrected.len(), spectrum.len());
        assert_eq!(correction.corrected.wavelengths(), spectrum.wavelengths());
    }
}

use super::lineshape::{LineShapeModel, PseudoVoigt};
use super::peaks::{peak_prominence, PeakError};
use crate::common::config::LineIntegrationConfig;
use crate::domain::{ConvergenceWarning, DiagnosticError, PipelineStage, Spectrum};
use crate::numerics::{
    fit_levenberg_marquardt, nearest_index, trapezoid, LevenbergMarquardtError,
    LevenbergMarquardtInput, LevenbergMarquardtOptions,
};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IntegrationError {
    #[error("no peaks were detected, cannot match target {target} nm")]
    NoPeaks { target: f64 },
    #[error(
        "nearest peak to target {target} nm is at {nearest} nm ({distance:.4} nm away, tolerance {tolerance} nm)"
    )]
    PeakTooFar {
        target: f64,
        nearest: f64,
        distance: f64,
        tolerance: f64,
    },
    #[error("integration window [{start}, {end}] around peak {peak_index} has too few samples to fit")]
    WindowTooSmall {
        peak_index: usize,
        start: usize,
        end: usize,
    },
    #[error("no initial {model} parameters could be estimated for peak {peak_index}")]
    NoUsableGuess {
        peak_index: usize,
        model: &'static str,
    },
    #[error("{model} fit failed for peak {peak_index}: {source}")]
    Fit {
        peak_index: usize,
        model: &'static str,
        source: LevenbergMarquardtError,
    },
    #[error("fitted area for peak {peak_index} is not a positive finite number: {area}")]
    InvalidArea { peak_index: usize, area: f64 },
    #[error(transparent)]
    Peak(#[from] PeakError),
}

impl From<IntegrationError> for DiagnosticError {
    fn from(error: IntegrationError) -> Self {
        match error {
            IntegrationError::NoPeaks { .. } => {
                DiagnosticError::input("INPUT.EMPTY_PEAK_SET", error.to_string())
            }
            IntegrationError::PeakTooFar { .. } => {
                DiagnosticError::input("INPUT.PEAK_NOT_FOUND", error.to_string())
            }
            IntegrationError::Peak(source) => source.into(),
            _ => DiagnosticError::numeric("NUMERIC.LINE_FIT", error.to_string()),
        }
    }
}

/// Integral of one target line together with the fit that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineIntegral {
    pub target_wavelength: f64,
    pub peak_index: usize,
    pub peak_wavelength: f64,
    pub window_start: usize,
    pub window_end: usize,
    pub parameters: Vec<f64>,
    pub integral: f64,
    pub fit_cost: f64,
    pub fit_iterations: usize,
    pub fit_converged: bool,
}

impl LineIntegral {
    pub fn convergence_warning(&self) -> Option<ConvergenceWarning> {
        (!self.fit_converged).then(|| ConvergenceWarning {
            stage: PipelineStage::LineIntegration,
            detail: format!(
                "line fit for target {} nm (peak at {:.4} nm) stopped at its iteration limit",
                self.target_wavelength, self.peak_wavelength
            ),
            iterations: self.fit_iterations,
            criterion: self.fit_cost,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineIntegrator<M = PseudoVoigt> {
    model: M,
    window_length: usize,
    match_tolerance: f64,
    options: LevenbergMarquardtOptions,
}

impl LineIntegrator<PseudoVoigt> {
    pub fn pseudo_voigt(config: &LineIntegrationConfig) -> Self {
        Self::new(PseudoVoigt, config)
    }
}

impl<M: LineShapeModel> LineIntegrator<M> {
    pub fn new(model: M, config: &LineIntegrationConfig) -> Self {
        Self {
            model,
            window_length: config.prominence_window_length,
            match_tolerance: config.peak_match_tolerance,
            options: LevenbergMarquardtOptions {
                max_iterations: config.fit_iteration_limit,
                ..LevenbergMarquardtOptions::default()
            },
        }
    }

    /// One integral per target, in target order.
    pub fn integrate(
        &self,
        spectrum: &Spectrum,
        peaks: &[usize],
        targets: &[f64],
    ) -> Result<Vec<LineIntegral>, IntegrationError> {
        check_peak_indices(spectrum, peaks)?;
        targets
            .iter()
            .map(|target| self.integrate_target(spectrum, peaks, *target))
            .collect()
    }

    pub fn integrate_target(
        &self,
        spectrum: &Spectrum,
        peaks: &[usize],
        target: f64,
    ) -> Result<LineIntegral, IntegrationError> {
        check_peak_indices(spectrum, peaks)?;
        let wavelengths = spectrum.wavelengths();
        let intensities = spectrum.intensities();

        let peak_wavelengths: Vec<f64> = peaks.iter().map(|peak| wavelengths[*peak]).collect();
        let nearest =
            nearest_index(&peak_wavelengths, target).ok_or(IntegrationError::NoPeaks { target })?;
        let peak_index = peaks[nearest];
        let peak_wavelength = peak_wavelengths[nearest];
        let distance = (peak_wavelength - target).abs();
        if distance > self.match_tolerance {
            return Err(IntegrationError::PeakTooFar {
                target,
                nearest: peak_wavelength,
                distance,
                tolerance: self.match_tolerance,
            });
        }

        let prominence = peak_prominence(intensities, peak_index, Some(self.window_length))?;
        // Mirror the left base around the peak rather than using the right base.
        let window_start = prominence.left_base;
        let window_end = (2 * peak_index - window_start).min(spectrum.len() - 1);
        let x = &wavelengths[window_start..=window_end];
        let y = &intensities[window_start..=window_end];
        if x.len() <= self.model.parameter_count() {
            return Err(IntegrationError::WindowTooSmall {
                peak_index,
                start: window_start,
                end: window_end,
            });
        }

        let initial = self
            .model
            .guess(x, y)
            .ok_or(IntegrationError::NoUsableGuess {
                peak_index,
                model: self.model.name(),
            })?;
        let fit = fit_levenberg_marquardt(
            &self.model,
            LevenbergMarquardtInput::new(x, y, &initial),
            self.options,
        )
        .map_err(|source| IntegrationError::Fit {
            peak_index,
            model: self.model.name(),
            source,
        })?;

        let fitted: Vec<f64> = x
            .iter()
            .map(|point| self.model.value(*point, &fit.parameters))
            .collect();
        let area = trapezoid(x, &fitted).unwrap_or(f64::NAN);
        if !area.is_finite() || area <= 0.0 {
            return Err(IntegrationError::InvalidArea { peak_index, area });
        }

        debug!(
            target,
            peak_wavelength,
            window_start,
            window_end,
            area,
            iterations = fit.iterations,
            "integrated line"
        );

        Ok(LineIntegral {
            target_wavelength: target,
            peak_index,
            peak_wavelength,
            window_start,
            window_end,
            parameters: fit.parameters,
            integral: area,
            fit_cost: fit.cost,
            fit_iterations: fit.iterations,
            fit_converged: fit.converged,
        })
    }
}

fn check_peak_indices(spectrum: &Spectrum, peaks: &[usize]) -> Result<(), PeakError> {
    match peaks.iter().find(|peak| **peak >= spectrum.len()) {
        Some(peak) => Err(PeakError::PeakOutOfRange {
            peak: *peak,
            length: spectrum.len(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::{IntegrationError, LineIntegrator};
    use crate::common::config::LineIntegrationConfig;
    use crate::domain::{DiagnosticError, DiagnosticErrorCategory, Spectrum};
    use crate::modules::lineshape::PseudoVoigt;
    use crate::modules::peaks::PeakError;

    fn single_line_spectrum() -> Spectrum {
        let wavelengths: Vec<f64> = (0..30).map(|index| 400.0 + 0.1 * index as f64).collect();
        let intensities: Vec<f64> = (0..30)
            .map(|index| {
                let offset = index as f64 - 15.0;
                PseudoVoigt::profile(offset, 500.0, 0.0, 2.0, 0.3)
            })
            .collect();
        Spectrum::new(wavelengths, intensities).expect("valid spectrum")
    }

    #[test]
    fn empty_peak_set_is_an_input_error() {
        let integrator = LineIntegrator::pseudo_voigt(&LineIntegrationConfig::default());
        let error = integrator
            .integrate_target(&single_line_spectrum(), &[], 401.5)
            .expect_err("no peaks");
        assert_eq!(error, IntegrationError::NoPeaks { target: 401.5 });
        assert_eq!(DiagnosticError::from(error).placeholder(), "INPUT.EMPTY_PEAK_SET");
    }

    #[test]
    fn distant_peak_is_rejected() {
        let integrator = LineIntegrator::pseudo_voigt(&LineIntegrationConfig::default());
        let error = integrator
            .integrate_target(&single_line_spectrum(), &[15], 410.0)
            .expect_err("peak too far");
        assert!(matches!(error, IntegrationError::PeakTooFar { .. }));
        assert_eq!(DiagnosticError::from(error).exit_code(), 2);
    }

    #[test]
    fn window_is_mirrored_around_the_peak() {
        let integrator = LineIntegrator::pseudo_voigt(&LineIntegrationConfig::default());
        let line = integrator
            .integrate_target(&single_line_spectrum(), &[15], 401.52)
            .expect("line integrates");
        assert_eq!(line.peak_index, 15);
        assert_eq!(line.window_start, 0);
        assert_eq!(line.window_end, 29);
        assert!(line.integral > 0.0);
    }

    #[test]
    fn peak_index_past_the_spectrum_is_an_internal_error() {
        let integrator = LineIntegrator::pseudo_voigt(&LineIntegrationConfig::default());
        let spectrum = single_line_spectrum();
        let error = integrator
            .integrate_target(&spectrum, &[99], 401.5)
            .expect_err("index 99 is outside 30 samples");
        assert_eq!(
            error,
            IntegrationError::Peak(PeakError::PeakOutOfRange {
                peak: 99,
                length: 30
            })
        );

        let error = integrator
            .integrate(&spectrum, &[15, 30], &[401.5])
            .expect_err("index 30 is one past the end");
        let error = DiagnosticError::from(error);
        assert_eq!(error.category(), DiagnosticErrorCategory::InternalError);
        assert_eq!(error.placeholder(), "INTERNAL.PEAK_INDEX");
        assert_eq!(error.exit_code(), 6);
    }

    #[test]
    fn fit_iteration_limit_comes_from_the_config() {
        let config = LineIntegrationConfig {
            fit_iteration_limit: 1,
            ..LineIntegrationConfig::default()
        };
        let line = LineIntegrator::pseudo_voigt(&config)
            .integrate_target(&single_line_spectrum(), &[15], 401.52)
            .expect("a single step still yields an estimate");
        assert_eq!(line.fit_iterations, 1);
        assert!(!line.fit_converged);
        assert!(line.convergence_warning().is_some());
        assert!(line.integral > 0.0);
    }
}

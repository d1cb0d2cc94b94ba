use crate::numerics::ResidualModel;
use std::f64::consts::{LN_2, PI};

const MIN_SIGMA: f64 = 1.0e-9;

/// A line profile that can be fitted by least squares and seeded from the windowed data.
pub trait LineShapeModel: ResidualModel {
    fn name(&self) -> &'static str;

    /// Initial parameters estimated from the windowed samples, or `None` when the
    /// window carries no usable shape.
    fn guess(&self, x: &[f64], y: &[f64]) -> Option<Vec<f64>>;
}

/// Pseudo-Voigt with parameters `[amplitude, center, sigma, fraction]`.
///
/// `amplitude` is the area, `sigma` is the Lorentzian half width and the Gaussian
/// component shares the same FWHM. `fraction` is the Lorentzian weight in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PseudoVoigt;

impl PseudoVoigt {
    pub const AMPLITUDE: usize = 0;
    pub const CENTER: usize = 1;
    pub const SIGMA: usize = 2;
    pub const FRACTION: usize = 3;

    fn gaussian_sigma(sigma: f64) -> f64 {
        sigma / (2.0 * LN_2).sqrt()
    }

    pub fn profile(x: f64, amplitude: f64, center: f64, sigma: f64, fraction: f64) -> f64 {
        let offset = x - center;
        let sigma_g = Self::gaussian_sigma(sigma);
        let gaussian = (-(offset * offset) / (2.0 * sigma_g * sigma_g)).exp()
            / (sigma_g * (2.0 * PI).sqrt());
        let lorentzian = sigma / (PI * (offset * offset + sigma * sigma));
        amplitude * ((1.0 - fraction) * gaussian + fraction * lorentzian)
    }
}

impl ResidualModel for PseudoVoigt {
    fn parameter_count(&self) -> usize {
        4
    }

    fn value(&self, x: f64, parameters: &[f64]) -> f64 {
        Self::profile(
            x,
            parameters[Self::AMPLITUDE],
            parameters[Self::CENTER],
            parameters[Self::SIGMA],
            parameters[Self::FRACTION],
        )
    }

    fn gradient(&self, x: f64, parameters: &[f64], gradient: &mut [f64]) {
        let amplitude = parameters[Self::AMPLITUDE];
        let center = parameters[Self::CENTER];
        let sigma = parameters[Self::SIGMA];
        let fraction = parameters[Self::FRACTION];

        let offset = x - center;
        let offset_sq = offset * offset;
        let scale = (2.0 * LN_2).sqrt();
        let sigma_g = sigma / scale;

        let gaussian =
            (-offset_sq / (2.0 * sigma_g * sigma_g)).exp() / (sigma_g * (2.0 * PI).sqrt());
        let gaussian_d_center = gaussian * offset / (sigma_g * sigma_g);
        let gaussian_d_sigma =
            gaussian * (offset_sq / (sigma_g * sigma_g * sigma_g) - 1.0 / sigma_g) / scale;

        let denominator = offset_sq + sigma * sigma;
        let lorentzian = sigma / (PI * denominator);
        let lorentzian_d_center = 2.0 * sigma * offset / (PI * denominator * denominator);
        let lorentzian_d_sigma = (offset_sq - sigma * sigma) / (PI * denominator * denominator);

        gradient[Self::AMPLITUDE] = (1.0 - fraction) * gaussian + fraction * lorentzian;
        gradient[Self::CENTER] =
            amplitude * ((1.0 - fraction) * gaussian_d_center + fraction * lorentzian_d_center);
        gradient[Self::SIGMA] =
            amplitude * ((1.0 - fraction) * gaussian_d_sigma + fraction * lorentzian_d_sigma);
        gradient[Self::FRACTION] = amplitude * (lorentzian - gaussian);
    }

    fn constrain(&self, parameters: &mut [f64]) {
        parameters[Self::SIGMA] = parameters[Self::SIGMA].abs().max(MIN_SIGMA);
        parameters[Self::FRACTION] = parameters[Self::FRACTION].clamp(0.0, 1.0);
    }
}

impl LineShapeModel for PseudoVoigt {
    fn name(&self) -> &'static str {
        "pseudo-voigt"
    }

    /// Height from the data range, center and half width from the samples above half
    /// maximum, and an even Gaussian/Lorentzian mix.
    fn guess(&self, x: &[f64], y: &[f64]) -> Option<Vec<f64>> {
        if x.len() != y.len() || x.len() < 2 {
            return None;
        }

        let (mut max_index, mut max_y, mut min_y) = (0, f64::NEG_INFINITY, f64::INFINITY);
        for (index, value) in y.iter().enumerate() {
            if *value > max_y {
                max_y = *value;
                max_index = index;
            }
            min_y = min_y.min(*value);
        }
        let min_x = x.iter().copied().fold(f64::INFINITY, f64::min);
        let max_x = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let height = (max_y - min_y) * 3.0;
        let mut center = x[max_index];
        let mut sigma = (max_x - min_x) / 6.0;

        let half_maximum = (max_y + min_y) / 2.0;
        let above: Vec<f64> = x
            .iter()
            .zip(y)
            .filter(|(_, y)| **y > half_maximum)
            .map(|(x, _)| *x)
            .collect();
        if above.len() > 2 {
            let lower = above.iter().copied().fold(f64::INFINITY, f64::min);
            let upper = above.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            sigma = (upper - lower) / 2.0;
            center = above.iter().sum::<f64>() / above.len() as f64;
        }

        let amplitude = height * sigma * 1.25;
        let guess = vec![amplitude, center, sigma.max(MIN_SIGMA), 0.5];
        guess.iter().all(|value| value.is_finite()).then_some(guess)
    }
}

#[cfg(test)]
mod tests {
    use super::{LineShapeModel, PseudoVoigt};
    use crate::numerics::{trapezoid, ResidualModel};

    #[test]
    fn profile_area_equals_amplitude() {
        let x: Vec<f64> = (0..20_001).map(|index| -500.0 + 0.05 * index as f64).collect();
        let y: Vec<f64> = x
            .iter()
            .map(|x| PseudoVoigt::profile(*x, 7.5, 0.0, 0.4, 0.0))
            .collect();
        let gaussian_area = trapezoid(&x, &y).expect("grid");
        assert!((gaussian_area - 7.5).abs() < 1.0e-9);

        let y: Vec<f64> = x
            .iter()
            .map(|x| PseudoVoigt::profile(*x, 7.5, 0.0, 0.4, 1.0))
            .collect();
        let lorentzian_area = trapezoid(&x, &y).expect("grid");
        // the Lorentzian tails beyond +/-500 hold 2/pi * atan(0.4/500) of the area
        assert!((lorentzian_area - 7.5).abs() < 7.5 * 1.0e-3);
    }

    #[test]
    fn analytic_gradient_matches_finite_differences() {
        let parameters = [120.0, 404.3, 0.07, 0.35];
        let model = PseudoVoigt;
        for x in [404.1, 404.28, 404.3, 404.45] {
            let mut analytic = [0.0; 4];
            model.gradient(x, &parameters, &mut analytic);
            for index in 0..4 {
                let step = 1.0e-7 * parameters[index].abs().max(1.0e-3);
                let mut forward = parameters;
                forward[index] += step;
                let mut backward = parameters;
                backward[index] -= step;
                let numeric = (model.value(x, &forward) - model.value(x, &backward)) / (2.0 * step);
                let scale = analytic[index].abs().max(1.0);
                assert!(
                    (analytic[index] - numeric).abs() < 1.0e-4 * scale,
                    "parameter {index} at x={x}: {} vs {numeric}",
                    analytic[index]
                );
            }
        }
    }

    #[test]
    fn guess_uses_half_maximum_span() {
        let x: Vec<f64> = (0..41).map(|index| 500.0 + 0.01 * index as f64).collect();
        let y: Vec<f64> = x
            .iter()
            .map(|x| PseudoVoigt::profile(*x, 2.0, 500.2, 0.03, 0.5))
            .collect();
        let guess = PseudoVoigt.guess(&x, &y).expect("usable window");
        assert!((guess[PseudoVoigt::CENTER] - 500.2).abs() < 1.0e-9);
        assert!(guess[PseudoVoigt::SIGMA] > 0.0 && guess[PseudoVoigt::SIGMA] < 0.05);
        assert_eq!(guess[PseudoVoigt::FRACTION], 0.5);
        assert!(guess[PseudoVoigt::AMPLITUDE] > 0.0);
    }

    #[test]
    fn constrain_keeps_width_positive_and_fraction_bounded() {
        let mut parameters = [1.0, 2.0, -0.5, 1.7];
        PseudoVoigt.constrain(&mut parameters);
        assert_eq!(parameters[PseudoVoigt::SIGMA], 0.5);
        assert_eq!(parameters[PseudoVoigt::FRACTION], 1.0);
    }
}

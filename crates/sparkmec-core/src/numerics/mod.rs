pub mod banded;
pub mod levenberg;
pub mod linalg;
pub mod regression;

pub use banded::{solve_pentadiagonal, BandedSolveError, SymmetricPentadiagonal};
pub use levenberg::{
    fit_levenberg_marquardt, LevenbergMarquardtInput, LevenbergMarquardtOptions,
    LevenbergMarquardtResult, LevenbergMarquardtError, ResidualModel,
};
pub use linalg::{lu_factorize, lu_solve, DenseMatrix, LuDecomposition, LuError};
pub use regression::{linear_regression, RegressionError};

fn kahan_add(sum: &mut f64, correction: &mut f64, value: f64) {
    let corrected = value - *correction;
    let next = *sum + corrected;
    *correction = (next - *sum) - corrected;
    *sum = next;
}

pub fn stable_sum(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut correction = 0.0;

    for &value in values {
        kahan_add(&mut sum, &mut correction, value);
    }

    sum
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(stable_sum(values) / values.len() as f64)
}

/// Population standard deviation (divides by `n`, not `n - 1`).
pub fn population_std_dev(values: &[f64]) -> Option<f64> {
    let center = mean(values)?;
    let mut sum = 0.0;
    let mut correction = 0.0;
    for &value in values {
        let delta = value - center;
        kahan_add(&mut sum, &mut correction, delta * delta);
    }
    Some((sum / values.len() as f64).sqrt())
}

pub fn euclidean_norm(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut correction = 0.0;
    for &value in values {
        kahan_add(&mut sum, &mut correction, value * value);
    }
    sum.sqrt()
}

/// Trapezoidal rule over a possibly non-uniform grid.
pub fn trapezoid(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }

    let mut sum = 0.0;
    let mut correction = 0.0;
    for index in 1..x.len() {
        let step = x[index] - x[index - 1];
        kahan_add(&mut sum, &mut correction, 0.5 * step * (y[index] + y[index - 1]));
    }
    Some(sum)
}

/// Index of the value closest to `target`; ties resolve to the lower index.
pub fn nearest_index(values: &[f64], target: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, value) in values.iter().enumerate() {
        let distance = (value - target).abs();
        if !distance.is_finite() {
            continue;
        }
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((index, distance)),
        }
    }
    best.map(|(index, _)| index)
}

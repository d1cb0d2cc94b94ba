use super::{mean, stable_sum};
use crate::domain::LinearFit;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegressionError {
    #[error("regression input length mismatch: x={x}, y={y}")]
    LengthMismatch { x: usize, y: usize },
    #[error("regression requires at least 2 points, got {actual}")]
    InsufficientPoints { actual: usize },
    #[error("regression point {index} is not finite: ({x}, {y})")]
    NonFinitePoint { index: usize, x: f64, y: f64 },
    #[error("regression abscissae have zero variance")]
    ZeroVariance,
}

/// Ordinary least squares `y = slope * x + intercept` with the coefficient of
/// determination. A constant `y` that is fitted exactly reports `r_squared = 1`.
pub fn linear_regression(x: &[f64], y: &[f64]) -> Result<LinearFit, RegressionError> {
    if x.len() != y.len() {
        return Err(RegressionError::LengthMismatch {
            x: x.len(),
            y: y.len(),
        });
    }
    if x.len() < 2 {
        return Err(RegressionError::InsufficientPoints { actual: x.len() });
    }
    if let Some(index) = x
        .iter()
        .zip(y)
        .position(|(x, y)| !x.is_finite() || !y.is_finite())
    {
        return Err(RegressionError::NonFinitePoint {
            index,
            x: x[index],
            y: y[index],
        });
    }

    let x_mean = mean(x).ok_or(RegressionError::InsufficientPoints { actual: 0 })?;
    let y_mean = mean(y).ok_or(RegressionError::InsufficientPoints { actual: 0 })?;

    let sxx = stable_sum(
        &x.iter()
            .map(|value| (value - x_mean) * (value - x_mean))
            .collect::<Vec<_>>(),
    );
    if sxx <= 0.0 {
        return Err(RegressionError::ZeroVariance);
    }
    let sxy = stable_sum(
        &x.iter()
            .zip(y)
            .map(|(x, y)| (x - x_mean) * (y - y_mean))
            .collect::<Vec<_>>(),
    );

    let slope = sxy / sxx;
    let mut fit = LinearFit {
        slope,
        intercept: y_mean - slope * x_mean,
        r_squared: 1.0,
    };

    let ss_tot = stable_sum(
        &y.iter()
            .map(|value| (value - y_mean) * (value - y_mean))
            .collect::<Vec<_>>(),
    );
    let ss_res = stable_sum(
        &x.iter()
            .zip(y)
            .map(|(x, y)| {
                let residual = y - fit.evaluate(*x);
                residual * residual
            })
            .collect::<Vec<_>>(),
    );
    if ss_tot > 0.0 {
        fit.r_squared = 1.0 - ss_res / ss_tot;
    }
    Ok(fit)
}

#[cfg(test)]
mod tests {
    use super::{linear_regression, RegressionError};

    #[test]
    fn exact_line_is_recovered_with_unit_r_squared() {
        let x = [1.0, 2.0, 4.0, 7.0];
        let y: Vec<f64> = x.iter().map(|value| -1.5 * value + 0.25).collect();
        let fit = linear_regression(&x, &y).expect("fit");
        assert!((fit.slope + 1.5).abs() < 1.0e-12);
        assert!((fit.intercept - 0.25).abs() < 1.0e-12);
        assert!((fit.r_squared - 1.0).abs() < 1.0e-12);
    }

    #[test]
    fn noisy_points_match_closed_form_least_squares() {
        // y = [1, 3, 2, 5] on x = [0, 1, 2, 3]: slope 1.1, intercept 1.1, SS_res 2.7, SS_tot 8.75
        let fit = linear_regression(&[0.0, 1.0, 2.0, 3.0], &[1.0, 3.0, 2.0, 5.0]).expect("fit");
        assert!((fit.slope - 1.1).abs() < 1.0e-12);
        assert!((fit.intercept - 1.1).abs() < 1.0e-12);
        assert!((fit.r_squared - (1.0 - 2.7 / 8.75)).abs() < 1.0e-12);
    }

    #[test]
    fn degenerate_inputs_are_rejected() {
        assert_eq!(
            linear_regression(&[1.0], &[2.0]).expect_err("one point"),
            RegressionError::InsufficientPoints { actual: 1 }
        );
        assert_eq!(
            linear_regression(&[2.0, 2.0, 2.0], &[1.0, 2.0, 3.0]).expect_err("vertical"),
            RegressionError::ZeroVariance
        );
        assert!(matches!(
            linear_regression(&[0.0, 1.0], &[f64::NAN, 1.0]),
            Err(RegressionError::NonFinitePoint { index: 0, .. })
        ));
    }
}

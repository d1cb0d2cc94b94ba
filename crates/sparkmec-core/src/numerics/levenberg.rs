use super::linalg::{lu_solve, DenseMatrix, LuError};

const MAX_DAMPING: f64 = 1.0e16;
const MIN_DAMPING: f64 = 1.0e-12;
const FINITE_DIFFERENCE_STEP: f64 = 1.0e-7;

/// A curve `y = f(x; p)` with a fixed number of parameters.
pub trait ResidualModel {
    fn parameter_count(&self) -> usize;

    fn value(&self, x: f64, parameters: &[f64]) -> f64;

    /// Partial derivatives of `value` with respect to each parameter at `x`.
    /// Central differences unless the model overrides it.
    fn gradient(&self, x: f64, parameters: &[f64], gradient: &mut [f64]) {
        let mut shifted = parameters.to_vec();
        for (index, slot) in gradient.iter_mut().enumerate() {
            let step = FINITE_DIFFERENCE_STEP * parameters[index].abs().max(1.0);
            shifted[index] = parameters[index] + step;
            let forward = self.value(x, &shifted);
            shifted[index] = parameters[index] - step;
            let backward = self.value(x, &shifted);
            shifted[index] = parameters[index];
            *slot = (forward - backward) / (2.0 * step);
        }
    }

    /// Projects parameters back into their admissible box after each step.
    fn constrain(&self, _parameters: &mut [f64]) {}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevenbergMarquardtInput<'a> {
    pub x: &'a [f64],
    pub y: &'a [f64],
    pub initial: &'a [f64],
}

impl<'a> LevenbergMarquardtInput<'a> {
    pub fn new(x: &'a [f64], y: &'a [f64], initial: &'a [f64]) -> Self {
        Self { x, y, initial }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevenbergMarquardtOptions {
    pub max_iterations: usize,
    pub initial_damping: f64,
    pub cost_tolerance: f64,
    pub step_tolerance: f64,
    pub gradient_tolerance: f64,
}

impl Default for LevenbergMarquardtOptions {
    fn default() -> Self {
        Self {
            max_iterations: 400,
            initial_damping: 1.0e-3,
            cost_tolerance: 1.0e-12,
            step_tolerance: 1.0e-10,
            gradient_tolerance: 1.0e-14,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LevenbergMarquardtResult {
    pub parameters: Vec<f64>,
    pub cost: f64,
    pub iterations: usize,
    pub converged: bool,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LevenbergMarquardtError {
    #[error("fit input length mismatch: x={x}, y={y}")]
    LengthMismatch { x: usize, y: usize },
    #[error("fit requires at least {parameters} points, got {points}")]
    InsufficientPoints { points: usize, parameters: usize },
    #[error("initial parameter vector has {actual} entries, model expects {expected}")]
    ParameterCountMismatch { expected: usize, actual: usize },
    #[error("model produced non-finite values at iteration {iteration}")]
    NonFiniteModel { iteration: usize },
    #[error("normal equations are singular: {0}")]
    Singular(#[from] LuError),
}

pub fn fit_levenberg_marquardt<M: ResidualModel>(
    model: &M,
    input: LevenbergMarquardtInput<'_>,
    options: LevenbergMarquardtOptions,
) -> Result<LevenbergMarquardtResult, LevenbergMarquardtError> {
    let parameter_count = validate_input(model, input)?;

    let mut parameters = input.initial.to_vec();
    model.constrain(&mut parameters);
    let mut residuals = vec![0.0; input.x.len()];
    let mut cost = evaluate_cost(model, input, &parameters, &mut residuals)
        .ok_or(LevenbergMarquardtError::NonFiniteModel { iteration: 0 })?;

    let mut damping = options.initial_damping;
    let mut gradient_row = vec![0.0; parameter_count];
    let mut trial_residuals = vec![0.0; input.x.len()];

    for iteration in 1..=options.max_iterations {
        let mut normal = DenseMatrix::zeros(parameter_count, parameter_count);
        let mut steepest = vec![0.0; parameter_count];
        for (point, residual) in input.x.iter().zip(&residuals) {
            model.gradient(*point, &parameters, &mut gradient_row);
            if gradient_row.iter().any(|value| !value.is_finite()) {
                return Err(LevenbergMarquardtError::NonFiniteModel { iteration });
            }
            for row in 0..parameter_count {
                steepest[row] += gradient_row[row] * residual;
                for col in 0..parameter_count {
                    normal[(row, col)] += gradient_row[row] * gradient_row[col];
                }
            }
        }

        if steepest
            .iter()
            .all(|value| value.abs() <= options.gradient_tolerance * cost.max(1.0))
        {
            return Ok(LevenbergMarquardtResult {
                parameters,
                cost,
                iterations: iteration,
                converged: true,
            });
        }

        let diagonal_floor = (0..parameter_count)
            .map(|index| normal[(index, index)])
            .fold(0.0_f64, f64::max)
            * 1.0e-15;

        loop {
            let mut damped = normal.clone();
            for index in 0..parameter_count {
                damped[(index, index)] += damping * normal[(index, index)].max(diagonal_floor);
            }

            let step = match lu_solve(&damped, &steepest) {
                Ok(step) => step,
                Err(error) => {
                    damping *= 10.0;
                    if damping > MAX_DAMPING {
                        return Err(LevenbergMarquardtError::Singular(error));
                    }
                    continue;
                }
            };

            let mut trial: Vec<f64> = parameters
                .iter()
                .zip(&step)
                .map(|(value, delta)| value + delta)
                .collect();
            model.constrain(&mut trial);

            let trial_cost = evaluate_cost(model, input, &trial, &mut trial_residuals);
            match trial_cost {
                Some(trial_cost) if trial_cost < cost => {
                    let step_norm = trial
                        .iter()
                        .zip(&parameters)
                        .map(|(lhs, rhs)| (lhs - rhs) * (lhs - rhs))
                        .sum::<f64>()
                        .sqrt();
                    let parameter_norm = parameters.iter().map(|value| value * value).sum::<f64>().sqrt();
                    let cost_change = cost - trial_cost;

                    parameters = trial;
                    std::mem::swap(&mut residuals, &mut trial_residuals);
                    let previous_cost = cost;
                    cost = trial_cost;
                    damping = (damping / 10.0).max(MIN_DAMPING);

                    if cost_change <= options.cost_tolerance * previous_cost
                        || step_norm <= options.step_tolerance * (parameter_norm + options.step_tolerance)
                    {
                        return Ok(LevenbergMarquardtResult {
                            parameters,
                            cost,
                            iterations: iteration,
                            converged: true,
                        });
                    }
                    break;
                }
                _ => {
                    damping *= 10.0;
                    if damping > MAX_DAMPING {
                        // No descent direction left: the current point is a local minimum.
                        return Ok(LevenbergMarquardtResult {
                            parameters,
                            cost,
                            iterations: iteration,
                            converged: true,
                        });
                    }
                }
            }
        }
    }

    Ok(LevenbergMarquardtResult {
        parameters,
        cost,
        iterations: options.max_iterations,
        converged: false,
    })
}

fn validate_input<M: ResidualModel>(
    model: &M,
    input: LevenbergMarquardtInput<'_>,
) -> Result<usize, LevenbergMarquardtError> {
    if input.x.len() != input.y.len() {
        return Err(LevenbergMarquardtError::LengthMismatch {
            x: input.x.len(),
            y: input.y.len(),
        });
    }
    let parameter_count = model.parameter_count();
    if input.initial.len() != parameter_count {
        return Err(LevenbergMarquardtError::ParameterCountMismatch {
            expected: parameter_count,
            actual: input.initial.len(),
        });
    }
    if input.x.len() < parameter_count {
        return Err(LevenbergMarquardtError::InsufficientPoints {
            points: input.x.len(),
            parameters: parameter_count,
        });
    }
    Ok(parameter_count)
}

fn evaluate_cost<M: ResidualModel>(
    model: &M,
    input: LevenbergMarquardtInput<'_>,
    parameters: &[f64],
    residuals: &mut [f64],
) -> Option<f64> {
    let mut cost = 0.0;
    for ((slot, x), y) in residuals.iter_mut().zip(input.x).zip(input.y) {
        let residual = y - model.value(*x, parameters);
        if !residual.is_finite() {
            return None;
        }
        *slot = residual;
        cost += residual * residual;
    }
    cost.is_finite().then_some(cost)
}

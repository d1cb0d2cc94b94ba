const PIVOT_RELATIVE_EPSILON: f64 = 1.0e-14;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BandedSolveError {
    #[error("banded solve requires a non-empty system")]
    EmptySystem,
    #[error("band '{band}' length mismatch: expected {expected}, got {actual}")]
    BandLengthMismatch {
        band: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("right-hand side length mismatch: expected {expected}, got {actual}")]
    RhsLengthMismatch { expected: usize, actual: usize },
    #[error("matrix is not positive definite at pivot index {pivot_index} (pivot {pivot})")]
    NotPositiveDefinite { pivot_index: usize, pivot: f64 },
}

/// Main diagonal plus the first and second super-diagonals; the sub-diagonals mirror them.
#[derive(Debug, Clone, PartialEq)]
pub struct SymmetricPentadiagonal {
    diagonal: Vec<f64>,
    first: Vec<f64>,
    second: Vec<f64>,
}

impl SymmetricPentadiagonal {
    pub fn new(
        diagonal: Vec<f64>,
        first: Vec<f64>,
        second: Vec<f64>,
    ) -> Result<Self, BandedSolveError> {
        let dimension = diagonal.len();
        if dimension == 0 {
            return Err(BandedSolveError::EmptySystem);
        }
        let expected_first = dimension.saturating_sub(1);
        if first.len() != expected_first {
            return Err(BandedSolveError::BandLengthMismatch {
                band: "first",
                expected: expected_first,
                actual: first.len(),
            });
        }
        let expected_second = dimension.saturating_sub(2);
        if second.len() != expected_second {
            return Err(BandedSolveError::BandLengthMismatch {
                band: "second",
                expected: expected_second,
                actual: second.len(),
            });
        }

        Ok(Self {
            diagonal,
            first,
            second,
        })
    }

    /// `lambda * D * D^T` where `D` is the `n x (n - 2)` operator with column stencil
    /// `[1, -2, 1]`.
    pub fn second_difference_penalty(dimension: usize, lambda: f64) -> Self {
        let mut diagonal = vec![0.0; dimension];
        let mut first = vec![0.0; dimension.saturating_sub(1)];
        let mut second = vec![0.0; dimension.saturating_sub(2)];
        const STENCIL: [f64; 3] = [1.0, -2.0, 1.0];

        for column in 0..dimension.saturating_sub(2) {
            for (row_offset, row_weight) in STENCIL.iter().enumerate() {
                let row = column + row_offset;
                diagonal[row] += lambda * row_weight * row_weight;
                for (col_offset, col_weight) in STENCIL.iter().enumerate().skip(row_offset + 1) {
                    let value = lambda * row_weight * col_weight;
                    match col_offset - row_offset {
                        1 => first[row] += value,
                        _ => second[row] += value,
                    }
                }
            }
        }

        Self {
            diagonal,
            first,
            second,
        }
    }

    pub fn dimension(&self) -> usize {
        self.diagonal.len()
    }

    pub fn diagonal(&self) -> &[f64] {
        &self.diagonal
    }

    pub fn first_off_diagonal(&self) -> &[f64] {
        &self.first
    }

    pub fn second_off_diagonal(&self) -> &[f64] {
        &self.second
    }

    /// Copy with `weights` added to the main diagonal.
    pub fn with_added_diagonal(&self, weights: &[f64]) -> Result<Self, BandedSolveError> {
        if weights.len() != self.dimension() {
            return Err(BandedSolveError::BandLengthMismatch {
                band: "diagonal",
                expected: self.dimension(),
                actual: weights.len(),
            });
        }
        let mut shifted = self.clone();
        for (value, weight) in shifted.diagonal.iter_mut().zip(weights) {
            *value += weight;
        }
        Ok(shifted)
    }

    pub fn multiply(&self, vector: &[f64]) -> Result<Vec<f64>, BandedSolveError> {
        let dimension = self.dimension();
        if vector.len() != dimension {
            return Err(BandedSolveError::RhsLengthMismatch {
                expected: dimension,
                actual: vector.len(),
            });
        }

        let mut product = vec![0.0; dimension];
        for row in 0..dimension {
            let mut value = self.diagonal[row] * vector[row];
            if row + 1 < dimension {
                value += self.first[row] * vector[row + 1];
            }
            if row + 2 < dimension {
                value += self.second[row] * vector[row + 2];
            }
            if row >= 1 {
                value += self.first[row - 1] * vector[row - 1];
            }
            if row >= 2 {
                value += self.second[row - 2] * vector[row - 2];
            }
            product[row] = value;
        }
        Ok(product)
    }
}

/// Solves `A x = rhs` for symmetric positive definite pentadiagonal `A` by an
/// in-band `L D L^T` factorization.
pub fn solve_pentadiagonal(
    matrix: &SymmetricPentadiagonal,
    rhs: &[f64],
) -> Result<Vec<f64>, BandedSolveError> {
    let dimension = matrix.dimension();
    if rhs.len() != dimension {
        return Err(BandedSolveError::RhsLengthMismatch {
            expected: dimension,
            actual: rhs.len(),
        });
    }

    let scale = matrix
        .diagonal
        .iter()
        .fold(0.0_f64, |acc, value| acc.max(value.abs()));

    let mut pivots = vec![0.0; dimension];
    let mut lower_first = vec![0.0; dimension.saturating_sub(1)];
    let mut lower_second = vec![0.0; dimension.saturating_sub(2)];

    for index in 0..dimension {
        let mut pivot = matrix.diagonal[index];
        if index >= 1 {
            pivot -= lower_first[index - 1] * lower_first[index - 1] * pivots[index - 1];
        }
        if index >= 2 {
            pivot -= lower_second[index - 2] * lower_second[index - 2] * pivots[index - 2];
        }
        if !pivot.is_finite() || pivot <= scale * PIVOT_RELATIVE_EPSILON {
            return Err(BandedSolveError::NotPositiveDefinite {
                pivot_index: index,
                pivot,
            });
        }
        pivots[index] = pivot;

        if index + 1 < dimension {
            let mut coupling = matrix.first[index];
            if index >= 1 {
                coupling -= lower_second[index - 1] * lower_first[index - 1] * pivots[index - 1];
            }
            lower_first[index] = coupling / pivot;
        }
        if index + 2 < dimension {
            lower_second[index] = matrix.second[index] / pivot;
        }
    }

    let mut solution = rhs.to_vec();
    for index in 0..dimension {
        if index >= 1 {
            solution[index] -= lower_first[index - 1] * solution[index - 1];
        }
        if index >= 2 {
            solution[index] -= lower_second[index - 2] * solution[index - 2];
        }
    }
    for (value, pivot) in solution.iter_mut().zip(&pivots) {
        *value /= pivot;
    }
    for index in (0..dimension).rev() {
        if index + 1 < dimension {
            solution[index] -= lower_first[index] * solution[index + 1];
        }
        if index + 2 < dimension {
            solution[index] -= lower_second[index] * solution[index + 2];
        }
    }

    Ok(solution)
}

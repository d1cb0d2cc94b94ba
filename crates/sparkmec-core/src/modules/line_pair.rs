use crate::common::constants::PhysicalConstants;
use crate::domain::{DiagnosticError, IntegratedLine, Temperature};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LinePairError {
    #[error("line-pair check needs at least one line")]
    EmptyLines,
    #[error("integral of the {wavelength} nm line is not positive and finite: {integral}")]
    NonPositiveIntegral { wavelength: f64, integral: f64 },
    #[error(
        "predicted ratio of the {first} nm and {second} nm lines is not positive and finite: {ratio}"
    )]
    InvalidPredictedRatio { first: f64, second: f64, ratio: f64 },
}

impl From<LinePairError> for DiagnosticError {
    fn from(error: LinePairError) -> Self {
        match error {
            LinePairError::EmptyLines => {
                DiagnosticError::input("INPUT.EMPTY_LINE_SET", error.to_string())
            }
            LinePairError::NonPositiveIntegral { .. }
            | LinePairError::InvalidPredictedRatio { .. } => {
                DiagnosticError::numeric("NUMERIC.LINE_PAIR", error.to_string())
            }
        }
    }
}

/// Relative deviation of measured from Boltzmann-predicted intensity ratios.
/// Entry `(i, j)` compares line `i` against line `j`; the diagonal is zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviationMatrix {
    pub wavelengths: Vec<f64>,
    pub rows: Vec<Vec<f64>>,
}

impl DeviationMatrix {
    pub fn size(&self) -> usize {
        self.wavelengths.len()
    }

    pub fn get(&self, row: usize, column: usize) -> Option<f64> {
        self.rows.get(row).and_then(|values| values.get(column)).copied()
    }

    /// Largest absolute deviation off the diagonal, zero for a single line.
    pub fn max_abs_deviation(&self) -> f64 {
        self.rows
            .iter()
            .flatten()
            .fold(0.0_f64, |current, value| current.max(value.abs()))
    }
}

pub fn check_line_pairs(
    lines: &[IntegratedLine],
    temperature: Temperature,
    constants: &PhysicalConstants,
) -> Result<DeviationMatrix, LinePairError> {
    if lines.is_empty() {
        return Err(LinePairError::EmptyLines);
    }
    if let Some(line) = lines
        .iter()
        .find(|line| !line.integral.is_finite() || line.integral <= 0.0)
    {
        return Err(LinePairError::NonPositiveIntegral {
            wavelength: line.record.wavelength,
            integral: line.integral,
        });
    }

    let kt = constants.boltzmann_plot_wavenumber_per_kelvin * temperature.kelvin();
    let strength = |line: &IntegratedLine| {
        line.record.upper_statistical_weight * line.record.transition_probability
            / line.record.wavelength
    };

    let rows = lines
        .iter()
        .enumerate()
        .map(|(i, first)| {
            lines
                .iter()
                .enumerate()
                .map(|(j, second)| {
                    if i == j {
                        return Ok(0.0);
                    }
                    let theoretical = strength(first) / strength(second)
                        * (-(first.record.upper_energy - second.record.upper_energy) / kt).exp();
                    if !theoretical.is_finite() || theoretical <= 0.0 {
                        return Err(LinePairError::InvalidPredictedRatio {
                            first: first.record.wavelength,
                            second: second.record.wavelength,
                            ratio: theoretical,
                        });
                    }
                    let measured = first.integral / second.integral;
                    Ok((theoretical - measured) / theoretical)
                })
                .collect()
        })
        .collect::<Result<Vec<Vec<f64>>, _>>()?;

    Ok(DeviationMatrix {
        wavelengths: lines.iter().map(|line| line.record.wavelength).collect(),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::{check_line_pairs, LinePairError};
    use crate::common::constants::PhysicalConstants;
    use crate::domain::{AtomicLineRecord, DiagnosticError, IntegratedLine, Temperature};

    fn boltzmann_line(record: AtomicLineRecord, kelvin: f64) -> IntegratedLine {
        let integral = 1.0e5 * record.upper_statistical_weight * record.transition_probability
            / record.wavelength
            * (-record.upper_energy / (0.695_035 * kelvin)).exp();
        IntegratedLine {
            target_wavelength: record.wavelength,
            peak_index: 0,
            peak_wavelength: record.wavelength,
            record,
            integral,
        }
    }

    #[test]
    fn lines_on_the_distribution_have_no_deviation() {
        let kelvin = 12_770.74;
        let lines: Vec<IntegratedLine> = [
            AtomicLineRecord::new(338.2887, 1.3e8, 2.0, 29_552.0574),
            AtomicLineRecord::new(520.9078, 7.5e7, 4.0, 48_743.969),
            AtomicLineRecord::new(546.5497, 8.6e7, 6.0, 48_764.219),
        ]
        .into_iter()
        .map(|record| boltzmann_line(record, kelvin))
        .collect();

        let matrix = check_line_pairs(
            &lines,
            Temperature::new(kelvin).expect("temperature"),
            &PhysicalConstants::CGS,
        )
        .expect("matrix");
        assert_eq!(matrix.size(), 3);
        for i in 0..3 {
            assert_eq!(matrix.get(i, i), Some(0.0));
        }
        assert!(matrix.max_abs_deviation() < 1.0e-12);
    }

    #[test]
    fn doubled_integral_shows_up_in_its_row_and_column() {
        let kelvin = 10_000.0;
        let mut lines: Vec<IntegratedLine> = [
            AtomicLineRecord::new(312.278, 1.9e7, 4.0, 41_174.613),
            AtomicLineRecord::new(406.507, 8.5e7, 4.0, 61_951.6),
        ]
        .into_iter()
        .map(|record| boltzmann_line(record, kelvin))
        .collect();
        lines[0].integral *= 2.0;

        let matrix = check_line_pairs(
            &lines,
            Temperature::new(kelvin).expect("temperature"),
            &PhysicalConstants::CGS,
        )
        .expect("matrix");
        assert!((matrix.get(0, 1).expect("entry") + 1.0).abs() < 1.0e-12);
        assert!((matrix.get(1, 0).expect("entry") - 0.5).abs() < 1.0e-12);
    }

    #[test]
    fn empty_and_zero_integrals_are_rejected() {
        let temperature = Temperature::new(10_000.0).expect("temperature");
        assert_eq!(
            check_line_pairs(&[], temperature, &PhysicalConstants::CGS).expect_err("empty"),
            LinePairError::EmptyLines
        );

        let mut line = boltzmann_line(AtomicLineRecord::new(312.278, 1.9e7, 4.0, 41_174.613), 1.0e4);
        line.integral = 0.0;
        assert!(matches!(
            check_line_pairs(&[line], temperature, &PhysicalConstants::CGS),
            Err(LinePairError::NonPositiveIntegral { .. })
        ));
    }

    #[test]
    fn overflowing_predicted_ratio_is_a_numeric_error() {
        let line = |record: AtomicLineRecord| IntegratedLine {
            target_wavelength: record.wavelength,
            peak_index: 0,
            peak_wavelength: record.wavelength,
            record,
            integral: 1.0,
        };
        let lines = [
            line(AtomicLineRecord::new(500.0, 1.0e7, 2.0, 0.0)),
            line(AtomicLineRecord::new(510.0, 1.0e7, 2.0, 1.0e6)),
        ];

        let error = check_line_pairs(
            &lines,
            Temperature::new(1_000.0).expect("temperature"),
            &PhysicalConstants::CGS,
        )
        .expect_err("exp(1e6 / kT) overflows");
        assert!(matches!(
            error,
            LinePairError::InvalidPredictedRatio { first, second, ratio }
                if first == 500.0 && second == 510.0 && ratio == f64::INFINITY
        ));
        let error = DiagnosticError::from(error);
        assert_eq!(error.placeholder(), "NUMERIC.LINE_PAIR");
        assert_eq!(error.exit_code(), 4);
    }
}

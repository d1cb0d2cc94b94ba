use crate::common::config::PeakFindingConfig;
use crate::domain::{DiagnosticError, DiagnosticResult, Spectrum};
use crate::numerics::trapezoid;
use serde::Serialize;
use tracing::debug;

/// Width is measured at this fraction of the prominence below the peak top.
pub const WIDTH_RELATIVE_HEIGHT: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakSearchInput<'a> {
    pub intensities: &'a [f64],
    pub minimum_height: f64,
    pub threshold: f64,
    pub minimum_width: f64,
}

impl<'a> PeakSearchInput<'a> {
    pub fn new(
        intensities: &'a [f64],
        minimum_height: f64,
        threshold: f64,
        minimum_width: f64,
    ) -> Self {
        Self {
            intensities,
            minimum_height,
            threshold,
            minimum_width,
        }
    }

    pub fn from_config(intensities: &'a [f64], config: &PeakFindingConfig) -> Self {
        Self::new(
            intensities,
            config.minimum_required_height,
            config.threshold,
            config.minimum_width,
        )
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PeakError {
    #[error("peak search requires a non-empty signal")]
    EmptySignal,
    #[error("signal sample {index} is not finite: {value}")]
    NonFiniteSample { index: usize, value: f64 },
    #[error("peak index {peak} is outside a signal of length {length}")]
    PeakOutOfRange { peak: usize, length: usize },
    #[error("prominence window length must be > 1, got {window_length}")]
    InvalidWindowLength { window_length: usize },
}

impl From<PeakError> for DiagnosticError {
    fn from(error: PeakError) -> Self {
        match error {
            PeakError::PeakOutOfRange { .. } => {
                DiagnosticError::internal("INTERNAL.PEAK_INDEX", error.to_string())
            }
            _ => DiagnosticError::input("INPUT.PEAK_SEARCH", error.to_string()),
        }
    }
}

/// Prominence of a peak and the lowest points on either side that bound it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeakProminence {
    pub peak: usize,
    pub prominence: f64,
    pub left_base: usize,
    pub right_base: usize,
}

/// Indices of local maxima that pass the height, threshold and width filters, ascending.
/// Flat tops resolve to their middle sample (rounded down).
pub fn find_peaks(input: PeakSearchInput<'_>) -> Result<Vec<usize>, PeakError> {
    let x = input.intensities;
    validate_signal(x)?;

    let candidates = local_maxima(x);
    let candidate_count = candidates.len();

    let peaks: Vec<usize> = candidates
        .into_iter()
        .filter(|&peak| x[peak] >= input.minimum_height)
        .filter(|&peak| {
            x[peak] - x[peak - 1] >= input.threshold && x[peak] - x[peak + 1] >= input.threshold
        })
        .collect();

    let mut accepted = Vec::with_capacity(peaks.len());
    for peak in peaks {
        let prominence = peak_prominence(x, peak, None)?;
        let width = peak_width(x, &prominence, WIDTH_RELATIVE_HEIGHT);
        if width >= input.minimum_width {
            accepted.push(peak);
        }
    }

    debug!(
        local_maxima = candidate_count,
        accepted = accepted.len(),
        "peak search filtered local maxima"
    );
    Ok(accepted)
}

fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut maxima = Vec::new();
    if x.len() < 3 {
        return maxima;
    }

    let last = x.len() - 1;
    let mut index = 1;
    while index < last {
        if x[index - 1] < x[index] {
            let mut ahead = index + 1;
            while ahead < last && x[ahead] == x[index] {
                ahead += 1;
            }
            if x[ahead] < x[index] {
                maxima.push((index + ahead - 1) / 2);
                index = ahead;
            }
        }
        index += 1;
    }
    maxima
}

/// Prominence of `peak`, optionally restricted to `window_length` samples centred on it.
pub fn peak_prominence(
    x: &[f64],
    peak: usize,
    window_length: Option<usize>,
) -> Result<PeakProminence, PeakError> {
    if peak >= x.len() {
        return Err(PeakError::PeakOutOfRange {
            peak,
            length: x.len(),
        });
    }

    let (lower_limit, upper_limit) = match window_length {
        Some(window_length) if window_length < 2 => {
            return Err(PeakError::InvalidWindowLength { window_length });
        }
        Some(window_length) => {
            let half = window_length / 2;
            (peak.saturating_sub(half), (peak + half).min(x.len() - 1))
        }
        None => (0, x.len() - 1),
    };

    let top = x[peak];

    let mut left_base = peak;
    let mut left_min = top;
    let mut index = peak;
    loop {
        if x[index] > top {
            break;
        }
        if x[index] < left_min {
            left_min = x[index];
            left_base = index;
        }
        if index == lower_limit {
            break;
        }
        index -= 1;
    }

    let mut right_base = peak;
    let mut right_min = top;
    let mut index = peak;
    while index <= upper_limit && x[index] <= top {
        if x[index] < right_min {
            right_min = x[index];
            right_base = index;
        }
        index += 1;
    }

    Ok(PeakProminence {
        peak,
        prominence: top - left_min.max(right_min),
        left_base,
        right_base,
    })
}

/// Width in samples at `top - prominence * relative_height`, with linear interpolation
/// between samples and the search bounded by the prominence bases.
pub fn peak_width(x: &[f64], prominence: &PeakProminence, relative_height: f64) -> f64 {
    let peak = prominence.peak;
    let height = x[peak] - prominence.prominence * relative_height;

    let mut index = peak;
    while prominence.left_base < index && height < x[index] {
        index -= 1;
    }
    let mut left = index as f64;
    if x[index] < height {
        left += (height - x[index]) / (x[index + 1] - x[index]);
    }

    let mut index = peak;
    while index < prominence.right_base && height < x[index] {
        index += 1;
    }
    let mut right = index as f64;
    if x[index] < height {
        right -= (height - x[index]) / (x[index - 1] - x[index]);
    }

    right - left
}

fn validate_signal(x: &[f64]) -> Result<(), PeakError> {
    if x.is_empty() {
        return Err(PeakError::EmptySignal);
    }
    if let Some((index, value)) = x.iter().enumerate().find(|(_, value)| !value.is_finite()) {
        return Err(PeakError::NonFiniteSample {
            index,
            value: *value,
        });
    }
    Ok(())
}

pub fn detect_peaks(spectrum: &Spectrum, config: &PeakFindingConfig) -> DiagnosticResult<Vec<usize>> {
    Ok(find_peaks(PeakSearchInput::from_config(
        spectrum.intensities(),
        config,
    ))?)
}

/// One row of the prepared-spectrum peak table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeakTableEntry {
    pub index: usize,
    pub wavelength: f64,
    pub left_base: usize,
    pub right_base: usize,
    pub integral: f64,
}

/// Raw trapezoidal area of every peak from its left prominence base up to, but not
/// including, its right base.
pub fn build_peak_table(
    spectrum: &Spectrum,
    peaks: &[usize],
    window_length: usize,
) -> DiagnosticResult<Vec<PeakTableEntry>> {
    let wavelengths = spectrum.wavelengths();
    let intensities = spectrum.intensities();

    peaks
        .iter()
        .map(|&peak| {
            let prominence = peak_prominence(intensities, peak, Some(window_length))?;
            let span = prominence.left_base..prominence.right_base;
            let integral = trapezoid(&wavelengths[span.clone()], &intensities[span]).unwrap_or(0.0);
            Ok(PeakTableEntry {
                index: peak,
                wavelength: wavelengths[peak],
                left_base: prominence.left_base,
                right_base: prominence.right_base,
                integral,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{
        build_peak_table, find_peaks, peak_prominence, peak_width, PeakError, PeakSearchInput,
    };
    use crate::domain::Spectrum;

    #[test]
    fn plateau_resolves_to_its_middle_sample() {
        let x = [0.0, 1.0, 5.0, 5.0, 5.0, 5.0, 1.0, 0.0];
        let peaks = find_peaks(PeakSearchInput::new(&x, 0.0, 0.0, 0.0)).expect("valid signal");
        assert_eq!(peaks, vec![3]);
    }

    #[test]
    fn height_and_width_filters_drop_small_and_narrow_maxima() {
        // a one-sample spike at 2, a broad peak at 7 and a low bump at 12
        let x = [
            0.0, 0.0, 300.0, 0.0, 0.0, 50.0, 150.0, 200.0, 150.0, 50.0, 0.0, 20.0, 40.0, 20.0,
            0.0,
        ];
        let peaks =
            find_peaks(PeakSearchInput::new(&x, 100.0, 0.0, 2.0)).expect("valid signal");
        assert_eq!(peaks, vec![7]);

        let without_width =
            find_peaks(PeakSearchInput::new(&x, 100.0, 0.0, 0.0)).expect("valid signal");
        assert_eq!(without_width, vec![2, 7]);
    }

    #[test]
    fn prominence_respects_window_and_higher_neighbours() {
        let x = [1.0, 3.0, 2.0, 6.0, 0.5, 4.0, 1.0, 0.0];
        let full = peak_prominence(&x, 5, None).expect("in range");
        assert_eq!(full.left_base, 4);
        assert_eq!(full.right_base, 7);
        assert_eq!(full.prominence, 3.5);

        let windowed = peak_prominence(&x, 1, Some(2)).expect("in range");
        assert_eq!(windowed.left_base, 0);
        assert_eq!(windowed.right_base, 2);
        assert_eq!(windowed.prominence, 1.0);

        assert_eq!(
            peak_prominence(&x, 1, Some(1)).expect_err("window too small"),
            PeakError::InvalidWindowLength { window_length: 1 }
        );
    }

    #[test]
    fn width_interpolates_half_prominence_crossings() {
        let x = [0.0, 2.0, 4.0, 2.0, 0.0];
        let prominence = peak_prominence(&x, 2, None).expect("in range");
        assert_eq!(prominence.prominence, 4.0);
        assert_eq!(peak_width(&x, &prominence, 0.5), 2.0);
    }

    #[test]
    fn peak_table_integrates_between_bases() {
        let wavelengths: Vec<f64> = (0..7).map(|index| 500.0 + index as f64).collect();
        let intensities = vec![0.0, 0.0, 1.0, 2.0, 1.0, 0.0, 0.0];
        let spectrum = Spectrum::new(wavelengths, intensities).expect("valid spectrum");

        let table = build_peak_table(&spectrum, &[3], 40).expect("table");
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].left_base, 1);
        assert_eq!(table[0].right_base, 5);
        assert_eq!(table[0].wavelength, 503.0);
        // samples 1..5 exclusive: trapezoid over [0, 1, 2, 1]
        assert!((table[0].integral - 3.5).abs() < 1.0e-12);
    }
}

use crate::domain::{AtomicLineRecord, DiagnosticError, WavelengthRange};
use crate::numerics::nearest_index;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LineMatchError {
    #[error("no target peaks were given for {species}")]
    NoTargets { species: String },
    #[error("no usable reference lines for {species} ({fetched} fetched, none with positive A and g)")]
    NoUsableLines { species: String, fetched: usize },
}

impl From<LineMatchError> for DiagnosticError {
    fn from(error: LineMatchError) -> Self {
        match error {
            LineMatchError::NoTargets { .. } => {
                DiagnosticError::input("INPUT.EMPTY_TARGET_PEAKS", error.to_string())
            }
            LineMatchError::NoUsableLines { .. } => {
                DiagnosticError::input("INPUT.EMPTY_LINE_SET", error.to_string())
            }
        }
    }
}

/// The wavelength window to query reference lines for, padded by `margin` on both sides.
pub fn line_search_range(targets: &[f64], margin: f64) -> Option<WavelengthRange> {
    let lower = targets.iter().copied().reduce(f64::min)?;
    let upper = targets.iter().copied().reduce(f64::max)?;
    Some(WavelengthRange::new(lower - margin, upper + margin))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineMatcher<'a> {
    species: &'a str,
}

impl<'a> LineMatcher<'a> {
    pub fn new(species: &'a str) -> Self {
        Self { species }
    }

    /// Nearest usable record for each target, in target order.
    pub fn match_lines(
        &self,
        records: &[AtomicLineRecord],
        targets: &[f64],
    ) -> Result<Vec<AtomicLineRecord>, LineMatchError> {
        if targets.is_empty() {
            return Err(LineMatchError::NoTargets {
                species: self.species.to_string(),
            });
        }

        let usable: Vec<AtomicLineRecord> = records
            .iter()
            .filter(|record| record.is_usable())
            .copied()
            .collect();
        let wavelengths: Vec<f64> = usable.iter().map(|record| record.wavelength).collect();

        let matched = targets
            .iter()
            .map(|target| {
                nearest_index(&wavelengths, *target)
                    .map(|index| usable[index])
                    .ok_or_else(|| LineMatchError::NoUsableLines {
                        species: self.species.to_string(),
                        fetched: records.len(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            species = self.species,
            fetched = records.len(),
            usable = usable.len(),
            "matched reference lines"
        );
        Ok(matched)
    }
}

use super::traits::SpectrumSource;
use crate::common::config::SpectrumConfig;
use crate::domain::{DiagnosticError, DiagnosticResult, Spectrum};
use std::fs;
use std::path::Path;
use tracing::debug;

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Reads whitespace-separated numeric columns. Blank lines and lines starting with `#`
/// are skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AsciiSpectrumReader;

impl AsciiSpectrumReader {
    pub fn parse(
        &self,
        source: &str,
        origin: &Path,
        config: &SpectrumConfig,
    ) -> DiagnosticResult<Spectrum> {
        let source = source.strip_prefix(BYTE_ORDER_MARK).unwrap_or(source);
        let required_columns = config
            .wavelength_column_index
            .max(config.intensity_column_index)
            + 1;

        let mut wavelengths = Vec::new();
        let mut intensities = Vec::new();
        for (line_index, line) in source.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let columns: Vec<&str> = trimmed.split_whitespace().collect();
            if columns.len() < required_columns {
                return Err(DiagnosticError::input(
                    "INPUT.SPECTRUM_FORMAT",
                    format!(
                        "'{}' line {} has {} columns, expected at least {}",
                        origin.display(),
                        line_index + 1,
                        columns.len(),
                        required_columns
                    ),
                ));
            }

            wavelengths.push(parse_column(
                columns[config.wavelength_column_index],
                origin,
                line_index,
            )?);
            intensities.push(parse_column(
                columns[config.intensity_column_index],
                origin,
                line_index,
            )?);
        }

        debug!(
            path = %origin.display(),
            samples = wavelengths.len(),
            "parsed spectrum columns"
        );
        Spectrum::new(wavelengths, intensities)
    }
}

fn parse_column(token: &str, origin: &Path, line_index: usize) -> DiagnosticResult<f64> {
    token.parse::<f64>().map_err(|_| {
        DiagnosticError::input(
            "INPUT.SPECTRUM_FORMAT",
            format!(
                "'{}' line {}: '{}' is not a number",
                origin.display(),
                line_index + 1,
                token
            ),
        )
    })
}

impl SpectrumSource for AsciiSpectrumReader {
    fn read_spectrum(&self, config: &SpectrumConfig) -> DiagnosticResult<Spectrum> {
        let source = fs::read_to_string(&config.path).map_err(|source| {
            DiagnosticError::io_system(
                "IO.SPECTRUM_READ",
                format!(
                    "failed to read spectrum '{}': {}",
                    config.path.display(),
                    source
                ),
            )
        })?;
        self.parse(&source, &config.path, config)
    }
}

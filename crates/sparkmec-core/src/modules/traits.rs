use crate::common::config::SpectrumConfig;
use crate::domain::{AtomicLineRecord, DiagnosticResult, Spectrum, Temperature, WavelengthRange};

/// Reference atomic data for named species such as `"Au I"` or `"Ar II"`.
///
/// Failures should be reported as `ExternalDataError`; the pipeline aborts on them
/// without retrying.
pub trait ReferenceDataSource {
    fn fetch_atomic_lines(
        &self,
        species: &str,
        range: WavelengthRange,
    ) -> DiagnosticResult<Vec<AtomicLineRecord>>;

    fn fetch_partition_function(
        &self,
        species: &str,
        temperature: Temperature,
    ) -> DiagnosticResult<f64>;

    /// Ionization energy in cm^-1.
    fn fetch_ionization_energy(&self, species: &str) -> DiagnosticResult<f64>;
}

pub trait SpectrumSource {
    fn read_spectrum(&self, config: &SpectrumConfig) -> DiagnosticResult<Spectrum>;
}

#[cfg(test)]
mod tests {
    use crate::common::config::{CarrierConfig, DiagnosticConfig, SpeciesConfig, SpectrumConfig};
    use crate::domain::DiagnosticErrorCategory;
    use crate::modules::{AsciiSpectrumReader, PseudoVoigt, TabulatedReferenceData};
    use crate::pipeline::DiagnosticPipeline;
    use std::collections::BTreeMap;
    use std::fmt::Write as _;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn config(spectrum: &Path) -> DiagnosticConfig {
        DiagnosticConfig {
            spectrum: SpectrumConfig::new(spectrum),
            first_species: SpeciesConfig::new("Au I", "Au II", vec![405.0]),
            second_species: SpeciesConfig::new("Ag I", "Ag II", vec![410.0]),
            carrier_species: CarrierConfig::new("Ar I", "Ar II"),
            spectrum_correction: Default::default(),
            peak_finding: Default::default(),
            line_integration: Default::default(),
        }
    }

    fn write_two_line_spectrum(path: &Path) {
        let mut content = String::from("# wavelength intensity\n");
        for index in 0..1001 {
            let x = 400.0 + 0.02 * index as f64;
            let y = 20.0
                + PseudoVoigt::profile(x, 500.0, 405.0, 0.05, 0.1)
                + PseudoVoigt::profile(x, 500.0, 410.0, 0.05, 0.1);
            let _ = writeln!(content, "{x:.2} {y:.6}");
        }
        fs::write(path, content).expect("spectrum should be written");
    }

    #[test]
    fn reference_table_without_the_species_aborts_with_external_data_code() {
        let temp = TempDir::new().expect("tempdir should be created");
        let spectrum = temp.path().join("shot.asc");
        write_two_line_spectrum(&spectrum);
        let reference = TabulatedReferenceData::new(BTreeMap::new());

        let error = DiagnosticPipeline::new(config(&spectrum), &reference, &AsciiSpectrumReader)
            .run()
            .expect_err("empty reference table");
        assert_eq!(error.category(), DiagnosticErrorCategory::ExternalDataError);
        assert_eq!(error.placeholder(), "EXTERNAL.LINES");
        assert!(error.message().contains("'Au I'"), "message: {}", error.message());
        assert_eq!(error.exit_code(), 5);
    }

    #[test]
    fn unreadable_spectrum_aborts_with_io_code() {
        let temp = TempDir::new().expect("tempdir should be created");
        let reference = TabulatedReferenceData::new(BTreeMap::new());

        let error = DiagnosticPipeline::new(
            config(&temp.path().join("missing.asc")),
            &reference,
            &AsciiSpectrumReader,
        )
        .run()
        .expect_err("spectrum file does not exist");
        assert_eq!(error.category(), DiagnosticErrorCategory::IoSystemError);
        assert_eq!(error.placeholder(), "IO.SPECTRUM_READ");
        assert_eq!(error.exit_code(), 3);
    }
}

use super::traits::ReferenceDataSource;
use crate::domain::{
    AtomicLineRecord, DiagnosticError, DiagnosticResult, Temperature, WavelengthRange,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Partition function as a function of temperature.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PartitionFunctionModel {
    Constant(f64),
    /// `sum_k c_k * T_eV^k` for `k = 0..=4`.
    Polynomial([f64; 5]),
}

impl PartitionFunctionModel {
    pub fn evaluate(&self, temperature: Temperature, kelvin_per_electronvolt: f64) -> f64 {
        match self {
            Self::Constant(value) => *value,
            Self::Polynomial(coefficients) => {
                let electronvolts = temperature.kelvin() / kelvin_per_electronvolt;
                coefficients
                    .iter()
                    .rev()
                    .fold(0.0, |acc, coefficient| acc * electronvolts + coefficient)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeciesTable {
    #[serde(default)]
    pub lines: Vec<AtomicLineRecord>,
    #[serde(default)]
    pub partition_function: Option<PartitionFunctionModel>,
    /// cm^-1
    #[serde(default)]
    pub ionization_energy: Option<f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ReferenceTableError {
    #[error("failed to read reference table '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse reference table '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl From<ReferenceTableError> for DiagnosticError {
    fn from(error: ReferenceTableError) -> Self {
        match error {
            ReferenceTableError::Read { .. } => {
                DiagnosticError::io_system("IO.REFERENCE_READ", error.to_string())
            }
            ReferenceTableError::Parse { .. } => {
                DiagnosticError::external_data("EXTERNAL.REFERENCE_PARSE", error.to_string())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TabulatedReferenceData {
    species: BTreeMap<String, SpeciesTable>,
    #[serde(skip, default = "default_kelvin_per_electronvolt")]
    kelvin_per_electronvolt: f64,
}

fn default_kelvin_per_electronvolt() -> f64 {
    crate::common::constants::KELVIN_PER_ELECTRONVOLT
}

impl TabulatedReferenceData {
    pub fn new(species: BTreeMap<String, SpeciesTable>) -> Self {
        Self {
            species,
            kelvin_per_electronvolt: default_kelvin_per_electronvolt(),
        }
    }

    pub fn from_json_str(source: &str, origin: &Path) -> Result<Self, ReferenceTableError> {
        serde_json::from_str(source).map_err(|source| ReferenceTableError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReferenceTableError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ReferenceTableError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&source, path)
    }

    pub fn species_names(&self) -> impl Iterator<Item = &str> {
        self.species.keys().map(String::as_str)
    }

    fn table(&self, species: &str, placeholder: &'static str) -> DiagnosticResult<&SpeciesTable> {
        self.species.get(species).ok_or_else(|| {
            DiagnosticError::external_data(
                placeholder,
                format!(
                    "reference table has no entry for species '{species}' (known: {})",
                    self.species_names().collect::<Vec<_>>().join(", ")
                ),
            )
        })
    }
}

impl ReferenceDataSource for TabulatedReferenceData {
    fn fetch_atomic_lines(
        &self,
        species: &str,
        range: WavelengthRange,
    ) -> DiagnosticResult<Vec<AtomicLineRecord>> {
        let table = self.table(species, "EXTERNAL.LINES")?;
        Ok(table
            .lines
            .iter()
            .filter(|record| range.contains(record.wavelength))
            .copied()
            .collect())
    }

    fn fetch_partition_function(
        &self,
        species: &str,
        temperature: Temperature,
    ) -> DiagnosticResult<f64> {
        let model = self
            .table(species, "EXTERNAL.PARTITION_FUNCTION")?
            .partition_function
            .ok_or_else(|| {
                DiagnosticError::external_data(
                    "EXTERNAL.PARTITION_FUNCTION",
                    format!("reference table has no partition function for '{species}'"),
                )
            })?;
        Ok(model.evaluate(temperature, self.kelvin_per_electronvolt))
    }

    fn fetch_ionization_energy(&self, species: &str) -> DiagnosticResult<f64> {
        self.table(species, "EXTERNAL.IONIZATION_ENERGY")?
            .ionization_energy
            .ok_or_else(|| {
                DiagnosticError::external_data(
                    "EXTERNAL.IONIZATION_ENERGY",
                    format!("reference table has no ionization energy for '{species}'"),
                )
            })
    }
}

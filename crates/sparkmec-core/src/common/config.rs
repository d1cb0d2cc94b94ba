use crate::domain::{DiagnosticError, DiagnosticResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_BASELINE_RATIO: f64 = 1.0e-5;
pub const DEFAULT_BASELINE_LAMBDA: f64 = 1.0e6;
pub const DEFAULT_BASELINE_ITERATION_LIMIT: usize = 50;
pub const DEFAULT_PEAK_MINIMUM_HEIGHT: f64 = 100.0;
pub const DEFAULT_PEAK_THRESHOLD: f64 = 0.0;
pub const DEFAULT_PEAK_MINIMUM_WIDTH: f64 = 2.0;
pub const DEFAULT_PROMINENCE_WINDOW_LENGTH: usize = 40;
pub const DEFAULT_PEAK_MATCH_TOLERANCE_NM: f64 = 1.0;
pub const DEFAULT_LINE_SEARCH_MARGIN_NM: f64 = 1.0;
pub const DEFAULT_FIT_ITERATION_LIMIT: usize = 400;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticConfig {
    pub spectrum: SpectrumConfig,
    pub first_species: SpeciesConfig,
    pub second_species: SpeciesConfig,
    pub carrier_species: CarrierConfig,
    #[serde(default)]
    pub spectrum_correction: SpectrumCorrectionConfig,
    #[serde(default)]
    pub peak_finding: PeakFindingConfig,
    #[serde(default)]
    pub line_integration: LineIntegrationConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpectrumConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub wavelength_column_index: usize,
    #[serde(default = "default_intensity_column_index")]
    pub intensity_column_index: usize,
}

impl SpectrumConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            wavelength_column_index: 0,
            intensity_column_index: default_intensity_column_index(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeciesConfig {
    pub atom_name: String,
    pub ion_name: String,
    pub target_peaks: Vec<f64>,
    /// Ion lines of the same element; when present the run adds a Saha-Boltzmann plot.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ion_target_peaks: Vec<f64>,
}

impl SpeciesConfig {
    pub fn new(
        atom_name: impl Into<String>,
        ion_name: impl Into<String>,
        target_peaks: Vec<f64>,
    ) -> Self {
        Self {
            atom_name: atom_name.into(),
            ion_name: ion_name.into(),
            target_peaks,
            ion_target_peaks: Vec::new(),
        }
    }

    pub fn with_ion_target_peaks(mut self, ion_target_peaks: Vec<f64>) -> Self {
        self.ion_target_peaks = ion_target_peaks;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CarrierConfig {
    pub atom_name: String,
    pub ion_name: String,
}

impl CarrierConfig {
    pub fn new(atom_name: impl Into<String>, ion_name: impl Into<String>) -> Self {
        Self {
            atom_name: atom_name.into(),
            ion_name: ion_name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpectrumCorrectionConfig {
    pub ratio: f64,
    pub lam: f64,
    pub iteration_limit: usize,
}

impl Default for SpectrumCorrectionConfig {
    fn default() -> Self {
        Self {
            ratio: DEFAULT_BASELINE_RATIO,
            lam: DEFAULT_BASELINE_LAMBDA,
            iteration_limit: DEFAULT_BASELINE_ITERATION_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PeakFindingConfig {
    pub minimum_required_height: f64,
    pub threshold: f64,
    pub minimum_width: f64,
}

impl Default for PeakFindingConfig {
    fn default() -> Self {
        Self {
            minimum_required_height: DEFAULT_PEAK_MINIMUM_HEIGHT,
            threshold: DEFAULT_PEAK_THRESHOLD,
            minimum_width: DEFAULT_PEAK_MINIMUM_WIDTH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LineIntegrationConfig {
    pub prominence_window_length: usize,
    pub peak_match_tolerance: f64,
    pub line_search_margin: f64,
    pub fit_iteration_limit: usize,
}

impl Default for LineIntegrationConfig {
    fn default() -> Self {
        Self {
            prominence_window_length: DEFAULT_PROMINENCE_WINDOW_LENGTH,
            peak_match_tolerance: DEFAULT_PEAK_MATCH_TOLERANCE_NM,
            line_search_margin: DEFAULT_LINE_SEARCH_MARGIN_NM,
            fit_iteration_limit: DEFAULT_FIT_ITERATION_LIMIT,
        }
    }
}

fn default_intensity_column_index() -> usize {
    1
}

impl DiagnosticConfig {
    pub fn validate(&self) -> DiagnosticResult<()> {
        for (label, species) in [
            ("firstSpecies", &self.first_species),
            ("secondSpecies", &self.second_species),
        ] {
            require_name(label, "atomName", &species.atom_name)?;
            require_name(label, "ionName", &species.ion_name)?;
            if species.target_peaks.is_empty() {
                return Err(DiagnosticError::input(
                    "INPUT.EMPTY_TARGET_PEAKS",
                    format!("{label}.targetPeaks must list at least one wavelength"),
                ));
            }
            for (field, peaks) in [
                ("targetPeaks", &species.target_peaks),
                ("ionTargetPeaks", &species.ion_target_peaks),
            ] {
                if let Some(value) = peaks.iter().find(|value| !value.is_finite() || **value <= 0.0) {
                    return Err(DiagnosticError::input(
                        "INPUT.TARGET_PEAK",
                        format!("{label}.{field} contains invalid wavelength {value}"),
                    ));
                }
            }
        }
        require_name("carrierSpecies", "atomName", &self.carrier_species.atom_name)?;
        require_name("carrierSpecies", "ionName", &self.carrier_species.ion_name)?;

        if self.spectrum.wavelength_column_index == self.spectrum.intensity_column_index {
            return Err(DiagnosticError::input(
                "INPUT.CONFIG",
                "spectrum wavelength and intensity column indices must differ",
            ));
        }

        let correction = &self.spectrum_correction;
        require_positive("spectrumCorrection.ratio", correction.ratio)?;
        require_positive("spectrumCorrection.lam", correction.lam)?;
        if correction.iteration_limit == 0 {
            return Err(DiagnosticError::input(
                "INPUT.CONFIG",
                "spectrumCorrection.iterationLimit must be >= 1",
            ));
        }

        let peaks = &self.peak_finding;
        if !peaks.minimum_required_height.is_finite() {
            return Err(DiagnosticError::input(
                "INPUT.CONFIG",
                "peakFinding.minimumRequiredHeight must be finite",
            ));
        }
        if !peaks.threshold.is_finite() || peaks.threshold < 0.0 {
            return Err(DiagnosticError::input(
                "INPUT.CONFIG",
                "peakFinding.threshold must be finite and >= 0",
            ));
        }
        if !peaks.minimum_width.is_finite() || peaks.minimum_width < 0.0 {
            return Err(DiagnosticError::input(
                "INPUT.CONFIG",
                "peakFinding.minimumWidth must be finite and >= 0",
            ));
        }

        let integration = &self.line_integration;
        if integration.prominence_window_length < 3 {
            return Err(DiagnosticError::input(
                "INPUT.CONFIG",
                "lineIntegration.prominenceWindowLength must be >= 3",
            ));
        }
        require_positive(
            "lineIntegration.peakMatchTolerance",
            integration.peak_match_tolerance,
        )?;
        if !integration.line_search_margin.is_finite() || integration.line_search_margin < 0.0 {
            return Err(DiagnosticError::input(
                "INPUT.CONFIG",
                "lineIntegration.lineSearchMargin must be finite and >= 0",
            ));
        }
        if integration.fit_iteration_limit == 0 {
            return Err(DiagnosticError::input(
                "INPUT.CONFIG",
                "lineIntegration.fitIterationLimit must be >= 1",
            ));
        }

        Ok(())
    }
}

fn require_name(section: &str, field: &str, value: &str) -> DiagnosticResult<()> {
    if value.trim().is_empty() {
        return Err(DiagnosticError::input(
            "INPUT.CONFIG",
            format!("{section}.{field} must not be empty"),
        ));
    }
    Ok(())
}

fn require_positive(field: &str, value: f64) -> DiagnosticResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(DiagnosticError::input(
            "INPUT.CONFIG",
            format!("{field} must be finite and > 0, got {value}"),
        ));
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read diagnostic config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse diagnostic config '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid diagnostic config '{}': {source}", path.display())]
    Invalid {
        path: PathBuf,
        source: DiagnosticError,
    },
}

impl From<ConfigError> for DiagnosticError {
    fn from(error: ConfigError) -> Self {
        match &error {
            ConfigError::Read { .. } => DiagnosticError::io_system("IO.CONFIG_READ", error.to_string()),
            ConfigError::Parse { .. } => {
                DiagnosticError::input("INPUT.CONFIG_PARSE", error.to_string())
            }
            ConfigError::Invalid { source, .. } => source.clone(),
        }
    }
}

pub fn load_config(config_path: impl AsRef<Path>) -> Result<DiagnosticConfig, ConfigError> {
    let config_path = config_path.as_ref();
    let source = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
        path: config_path.to_path_buf(),
        source,
    })?;
    let mut config: DiagnosticConfig =
        serde_json::from_str(&source).map_err(|source| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source,
        })?;

    if config.spectrum.path.is_relative() {
        if let Some(parent) = config_path.parent() {
            config.spectrum.path = parent.join(&config.spectrum.path);
        }
    }

    config.validate().map_err(|source| ConfigError::Invalid {
        path: config_path.to_path_buf(),
        source,
    })?;
    Ok(config)
}

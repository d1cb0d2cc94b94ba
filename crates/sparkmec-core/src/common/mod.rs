pub mod config;
pub mod constants;

pub use config::{
    load_config, CarrierConfig, ConfigError, DiagnosticConfig, LineIntegrationConfig,
    PeakFindingConfig, SpeciesConfig, SpectrumConfig, SpectrumCorrectionConfig,
};
pub use constants::PhysicalConstants;

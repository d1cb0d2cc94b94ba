use std::f64::consts::PI;

pub const ELECTRON_MASS_G: f64 = 9.109_382_91e-28;
pub const BOLTZMANN_ERG_PER_K: f64 = 1.3807e-16;
pub const PLANCK_ERG_S: f64 = 6.6261e-27;
pub const SPEED_OF_LIGHT_CM_PER_S: f64 = 2.997_924_58e10;
pub const PRESSURE_SCALE: f64 = 1.0e6;
// Boltzmann plots and the Saha exponentials use slightly different values.
pub const BOLTZMANN_PLOT_WAVENUMBER_PER_K: f64 = 0.695_035;
pub const SAHA_WAVENUMBER_PER_K: f64 = 0.695_028;
pub const KELVIN_PER_ELECTRONVOLT: f64 = 11_604.525;
pub const ELECTRONVOLT_PER_KELVIN: f64 = 8.617_328_149_744_93e-5;
pub const DEBYE_LENGTH_PREFACTOR_CM: f64 = 743.0;
pub const NANOMETRE_TO_CM: f64 = 1.0e-7;

/// Lower/upper temperature bounds (K) inside which the Saha formulas are expected
/// to stay well conditioned.
pub const PLASMA_TEMPERATURE_RANGE_K: (f64, f64) = (5_000.0, 30_000.0);

/// Immutable constant set handed to every calculator by reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicalConstants {
    pub electron_mass: f64,
    pub boltzmann: f64,
    pub planck: f64,
    pub speed_of_light: f64,
    pub pressure_scale: f64,
    pub boltzmann_plot_wavenumber_per_kelvin: f64,
    pub saha_wavenumber_per_kelvin: f64,
    pub kelvin_per_electronvolt: f64,
    pub electronvolt_per_kelvin: f64,
    pub debye_length_prefactor: f64,
    pub wavelength_scale: f64,
}

impl PhysicalConstants {
    pub const CGS: Self = Self {
        electron_mass: ELECTRON_MASS_G,
        boltzmann: BOLTZMANN_ERG_PER_K,
        planck: PLANCK_ERG_S,
        speed_of_light: SPEED_OF_LIGHT_CM_PER_S,
        pressure_scale: PRESSURE_SCALE,
        boltzmann_plot_wavenumber_per_kelvin: BOLTZMANN_PLOT_WAVENUMBER_PER_K,
        saha_wavenumber_per_kelvin: SAHA_WAVENUMBER_PER_K,
        kelvin_per_electronvolt: KELVIN_PER_ELECTRONVOLT,
        electronvolt_per_kelvin: ELECTRONVOLT_PER_KELVIN,
        debye_length_prefactor: DEBYE_LENGTH_PREFACTOR_CM,
        wavelength_scale: NANOMETRE_TO_CM,
    };

    /// `X = 2*pi*m_e*k / h^2`, the Saha-Boltzmann constant in CGS units.
    pub fn saha_constant(&self) -> f64 {
        (2.0 * PI * self.electron_mass * self.boltzmann) / (self.planck * self.planck)
    }
}

impl Default for PhysicalConstants {
    fn default() -> Self {
        Self::CGS
    }
}

pub mod baseline;
pub mod boltzmann;
pub mod concentration;
pub mod integrator;
pub mod line_pair;
pub mod lines;
pub mod lineshape;
pub mod peaks;
pub mod reference;
pub mod serialization;
pub mod spectrum_io;

mod traits;

pub use baseline::{correct_spectrum, estimate_baseline, BaselineCorrection, BaselineInput};
pub use boltzmann::{
    build_intensity_ratios, classical_boltzmann_plot, saha_boltzmann_plot, solve_temperature,
    BoltzmannPlot, IntensityRatios, SahaBoltzmannPlot,
};
pub use concentration::{
    atom_concentration_ratio, debye_length, electron_concentration,
    ion_atom_concentration_ratio, total_concentration, PartitionFunctions,
};
pub use integrator::{LineIntegral, LineIntegrator};
pub use line_pair::{check_line_pairs, DeviationMatrix};
pub use lines::{line_search_range, LineMatcher};
pub use lineshape::{LineShapeModel, PseudoVoigt};
pub use peaks::{build_peak_table, detect_peaks, find_peaks, PeakSearchInput, PeakTableEntry};
pub use reference::{PartitionFunctionModel, TabulatedReferenceData};
pub use spectrum_io::AsciiSpectrumReader;
pub use traits::{ReferenceDataSource, SpectrumSource};

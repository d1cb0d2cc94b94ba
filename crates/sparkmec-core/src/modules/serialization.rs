use super::boltzmann::SahaBoltzmannPlot;
use super::peaks::PeakTableEntry;
use crate::domain::Spectrum;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

pub fn format_fixed_f64(value: f64, width: usize, precision: usize) -> String {
    format!(
        "{value:>width$.precision$}",
        width = width,
        precision = precision
    )
}

pub fn normalize_text_artifact(content: &str) -> String {
    let mut normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    if !normalized.is_empty() && !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

pub fn write_text_artifact(path: &Path, content: &str) -> std::io::Result<()> {
    fs::write(path, normalize_text_artifact(content))
}

/// Three columns: wavelength, baseline, corrected intensity.
pub fn render_corrected_spectrum(corrected: &Spectrum, baseline: &[f64]) -> String {
    let mut content = String::from("# wavelength baseline corrected_intensity\n");
    for ((wavelength, intensity), background) in corrected
        .wavelengths()
        .iter()
        .zip(corrected.intensities())
        .zip(baseline)
    {
        let _ = writeln!(
            content,
            "{} {} {}",
            format_fixed_f64(*wavelength, 12, 5),
            format_fixed_f64(*background, 16, 6),
            format_fixed_f64(*intensity, 16, 6)
        );
    }
    content
}

pub fn render_peak_table(entries: &[PeakTableEntry]) -> String {
    let mut content = String::from("# index wavelength left_base right_base integral\n");
    for entry in entries {
        let _ = writeln!(
            content,
            "{:>8} {} {:>8} {:>8} {}",
            entry.index,
            format_fixed_f64(entry.wavelength, 12, 5),
            entry.left_base,
            entry.right_base,
            format_fixed_f64(entry.integral, 16, 6)
        );
    }
    content
}

/// Plot points followed by the fit and the values read from it as comments.
pub fn render_saha_boltzmann_plot(plot: &SahaBoltzmannPlot) -> String {
    let mut content = String::from("# energy_difference log_ratio\n");
    for point in &plot.points {
        let _ = writeln!(
            content,
            "{} {}",
            format_fixed_f64(point.energy_difference, 14, 4),
            format_fixed_f64(point.log_ratio, 14, 8)
        );
    }
    let _ = writeln!(
        content,
        "# slope {:.8e} intercept {:.8} r_squared {:.8}",
        plot.fit.slope, plot.fit.intercept, plot.fit.r_squared
    );
    let _ = writeln!(
        content,
        "# temperature {:.3} K electron_concentration {:.6e} cm^-3",
        plot.temperature.kelvin(),
        plot.electron_concentration
    );
    content
}

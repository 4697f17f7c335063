//! In this module, we implement the runtime monitoring of the logger.
//! This covers how well the sample clock is keeping up, as well as a hook
//! for anything that wants to look at the spectra as they go by.

use tracing::{debug, warn};

use crate::{capture::AcquisitionWindow, spectrum::Spectrum};

/// Windows running more than this fraction over nominal get a warning
pub const OVERRUN_WARN: f64 = 0.05;

/// Something that wants to watch spectra go by (a plot, a log line, ...).
/// Observers run after the spectrum is computed and can't influence detection.
pub trait SpectrumObserver {
    fn observe(&mut self, spectrum: &Spectrum);
}

/// Logs the strongest bin of every spectrum at debug level
#[derive(Default, Debug)]
pub struct TracingObserver;

impl SpectrumObserver for TracingObserver {
    fn observe(&mut self, spectrum: &Spectrum) {
        if let Some(peak) = spectrum.peak() {
            debug!(
                freq = peak.freq,
                amplitude = peak.amplitude,
                bins = spectrum.bins().len(),
                "Spectrum peak"
            );
        }
    }
}

/// Report how the realized window timing compares to nominal.
/// Returns true if the overrun was worth warning about.
pub fn report_timing(window: &AcquisitionWindow) -> bool {
    let overrun = window.overrun();
    if overrun > OVERRUN_WARN {
        warn!(
            nominal_rate = window.nominal_rate,
            actual_rate = window.actual_rate(),
            elapsed = ?window.actual_elapsed,
            "Sample clock falling behind, {:.1}% over nominal",
            overrun * 100.0
        );
        true
    } else {
        debug!(
            samples = window.samples.len(),
            actual_rate = window.actual_rate(),
            elapsed = ?window.actual_elapsed,
            "Window acquired"
        );
        false
    }
}

//! Fixed-duration capture straight to CSV, no trigger involved

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use tracing::info;

use crate::{
    capture::{AcquisitionWindow, SampleClock},
    error::Result,
    hardware::Adc,
    monitoring::{report_timing, SpectrumObserver},
    spectrum::{Bin, Spectrum},
};

pub const RECORD_PREFIX: &str = "iepe_data_fast";

pub struct Recording {
    pub path: PathBuf,
    pub window: AcquisitionWindow,
    /// Strongest non-DC bin of the recording
    pub peak: Option<Bin>,
}

/// Write a window as `ADC Value,Voltage` rows
pub fn write_csv<W: Write>(out: &mut W, window: &AcquisitionWindow) -> std::io::Result<()> {
    writeln!(out, "ADC Value,Voltage")?;
    for s in &window.samples {
        writeln!(out, "{},{}", s.raw_code, s.voltage)?;
    }
    out.flush()
}

/// Capture `duration` seconds at `rate`, save it under `dir` and take a look at the spectrum
pub fn record<A: Adc>(
    adc: &mut A,
    clock: &SampleClock,
    rate: f64,
    duration: f64,
    dir: &Path,
    observer: Option<&mut dyn SpectrumObserver>,
) -> Result<Recording> {
    info!(rate, duration, "Starting fixed-duration capture");
    let window = clock.acquire(adc, rate, duration)?;
    report_timing(&window);
    info!(
        samples = window.samples.len(),
        elapsed = ?window.actual_elapsed,
        actual_rate = window.actual_rate(),
        "Capture done"
    );

    let unix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let path = dir.join(format!("{}_{}.csv", RECORD_PREFIX, unix));
    let mut file = BufWriter::new(File::create(&path)?);
    write_csv(&mut file, &window)?;
    info!(path = %path.display(), "Data saved");

    let spectrum = Spectrum::compute(&window.voltages(), window.actual_elapsed);
    if let Some(observer) = observer {
        observer.observe(&spectrum);
    }
    Ok(Recording {
        path,
        peak: spectrum.peak(),
        window,
    })
}

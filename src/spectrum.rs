//! Spectral detection of target frequencies in a captured window
//
// To classify a window we
// * multiply the voltages with a Hann window (captures never hold a whole number of periods)
// * FFT
// * build the frequency axis from the *measured* window length, not the nominal rate
// * keep the positive half and normalize to peak amplitude
// * walk the targets in the order the operator gave them

use std::{f64::consts::PI, time::Duration};

use rustfft::{num_complex::Complex, FftPlanner};

use crate::{capture::Sample, config::TargetFrequencySet, monitoring::SpectrumObserver};

/// Symmetric Hann window of length `n`, same definition as numpy's `hanning`
pub fn hann_window(n: usize) -> Vec<f64> {
    match n {
        0 => vec![],
        1 => vec![1.0],
        _ => {
            let n_minus_1 = (n - 1) as f64;
            (0..n)
                .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / n_minus_1).cos())
                .collect()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bin {
    pub freq: f64,
    pub amplitude: f64,
}

/// Single-sided amplitude spectrum, bins in increasing frequency
#[derive(Clone, Debug, Default)]
pub struct Spectrum {
    bins: Vec<Bin>,
}

impl Spectrum {
    /// Window, transform and normalize `voltages`, which took `elapsed` to capture
    pub fn compute(voltages: &[f64], elapsed: Duration) -> Self {
        let n = voltages.len();
        let elapsed = elapsed.as_secs_f64();
        if n == 0 || elapsed <= 0.0 {
            return Self::default();
        }

        let window = hann_window(n);
        let mut buffer: Vec<Complex<f64>> = voltages
            .iter()
            .zip(window.iter())
            .map(|(v, w)| Complex::new(v * w, 0.0))
            .collect();
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(n);
        fft.process(&mut buffer);

        // sample interval T = elapsed / n, so bin k sits at k / (n * T)
        let norm = 2.0 / n as f64;
        let bins = buffer
            .iter()
            .take(n / 2)
            .enumerate()
            .map(|(k, c)| Bin {
                freq: k as f64 / elapsed,
                amplitude: norm * c.norm(),
            })
            .collect();
        Self { bins }
    }

    pub fn bins(&self) -> &[Bin] {
        &self.bins
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Frequency spacing between bins
    pub fn resolution(&self) -> Option<f64> {
        self.bins.get(1).map(|b| b.freq)
    }

    /// Strongest bin, ignoring DC and the Hann main lobe around it
    pub fn peak(&self) -> Option<Bin> {
        self.bins
            .iter()
            .skip(2)
            .copied()
            .max_by(|a, b| {
                a.amplitude
                    .partial_cmp(&b.amplitude)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }

    /// First target (in declared order) with a bin inside tolerance and above threshold
    pub fn first_match(&self, targets: &TargetFrequencySet) -> Option<f64> {
        targets.iter().find(|&target| {
            self.bins.iter().any(|bin| {
                (bin.freq - target).abs() <= targets.tolerance()
                    && bin.amplitude > targets.threshold()
            })
        })
    }
}

/// Classify a window. Returns the matched target frequency, if any.
///
/// The observer only gets to look at the spectrum; it can't change the outcome.
pub fn detect(
    samples: &[Sample],
    actual_elapsed: Duration,
    targets: &TargetFrequencySet,
    observer: Option<&mut dyn SpectrumObserver>,
) -> Option<f64> {
    let voltages: Vec<f64> = samples.iter().map(|s| s.voltage).collect();
    let spectrum = Spectrum::compute(&voltages, actual_elapsed);
    if let Some(observer) = observer {
        observer.observe(&spectrum);
    }
    spectrum.first_match(targets)
}

//! This module contains all the capture logic

// Sampling is a tight loop: one ADC read per slot, then spin on the
// monotonic clock until the slot is over. We don't sleep here, the
// scheduler's wakeup latency is orders of magnitude larger than a slot.

use std::time::{Duration, Instant};

use chrono::Local;

use crate::{
    error::{Error, Result},
    hardware::Adc,
};

/// Conversion from raw ADC codes to volts
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scaling {
    pub vref: f64,
    pub max_code: u16,
    /// Fixed calibration offset added after scaling
    pub bias: f64,
}

impl Scaling {
    pub fn new(vref: f64, max_code: u16) -> Self {
        Self {
            vref,
            max_code,
            bias: 0.0,
        }
    }

    pub fn with_bias(self, bias: f64) -> Self {
        Self { bias, ..self }
    }

    pub fn voltage(&self, code: u16) -> f64 {
        code as f64 * self.vref / self.max_code as f64 + self.bias
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    /// Wall-clock time of the read, only kept for logged segments
    pub timestamp: Option<String>,
    pub raw_code: u16,
    pub voltage: f64,
}

/// One fixed-rate block of samples plus how long it really took
#[derive(Clone, Debug)]
pub struct AcquisitionWindow {
    pub samples: Vec<Sample>,
    pub nominal_rate: f64,
    pub nominal_duration: Duration,
    pub actual_elapsed: Duration,
}

impl AcquisitionWindow {
    pub fn voltages(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.voltage).collect()
    }

    /// Samples per second we actually achieved
    pub fn actual_rate(&self) -> f64 {
        let secs = self.actual_elapsed.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.samples.len() as f64 / secs
        }
    }

    /// Fraction of the nominal duration we went over by
    pub fn overrun(&self) -> f64 {
        let nominal = self.nominal_duration.as_secs_f64();
        if nominal == 0.0 {
            return 0.0;
        }
        self.actual_elapsed.as_secs_f64() / nominal - 1.0
    }
}

/// Number of samples in a window of `duration` seconds at `rate` Hz
pub fn sample_count(rate: f64, duration: f64) -> usize {
    (rate * duration).round() as usize
}

/// Wall-clock stamp in the format the logged segments carry (HH:MM:SS.mmm)
pub fn wall_clock_stamp() -> String {
    Local::now().format("%H:%M:%S%.3f").to_string()
}

/// Turns single ADC reads into a fixed-rate sample stream
#[derive(Clone, Copy, Debug)]
pub struct SampleClock {
    pub channel: u8,
    pub scaling: Scaling,
    /// Stamp every sample with wall-clock time
    pub timestamps: bool,
}

impl SampleClock {
    pub fn new(channel: u8, scaling: Scaling) -> Self {
        Self {
            channel,
            scaling,
            timestamps: false,
        }
    }

    pub fn with_timestamps(self) -> Self {
        Self {
            timestamps: true,
            ..self
        }
    }

    /// Acquire `round(rate * duration)` samples, one every `1 / rate` seconds.
    /// Any failed read kills the whole window.
    pub fn acquire<A: Adc>(
        &self,
        adc: &mut A,
        rate: f64,
        duration: f64,
    ) -> Result<AcquisitionWindow> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "sample rate must be positive, got {}",
                rate
            )));
        }
        if !(duration.is_finite() && duration > 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "capture duration must be positive, got {}",
                duration
            )));
        }
        let total = sample_count(rate, duration);
        let interval = Duration::from_secs_f64(1.0 / rate);
        let nominal_duration = Duration::from_secs_f64(duration);
        let max_code = adc.max_code();
        let mut samples = Vec::with_capacity(total);

        let start = Instant::now();
        for index in 0..total {
            let slot_start = Instant::now();
            let raw_code = adc
                .read_channel(self.channel)
                .map_err(|e| Error::Acquisition {
                    channel: self.channel,
                    index,
                    reason: e.to_string(),
                })?;
            if raw_code > max_code {
                return Err(Error::Acquisition {
                    channel: self.channel,
                    index,
                    reason: format!("code {} exceeds max code {}", raw_code, max_code),
                });
            }
            let timestamp = self.timestamps.then(wall_clock_stamp);
            samples.push(Sample {
                timestamp,
                raw_code,
                voltage: self.scaling.voltage(raw_code),
            });
            // Busy wait out the rest of the slot
            while slot_start.elapsed() < interval {
                std::hint::spin_loop();
            }
        }
        // Rounding the sample count down (or the interval to whole ns) can leave
        // us short, the window never finishes early
        while start.elapsed() < nominal_duration {
            std::hint::spin_loop();
        }
        let actual_elapsed = start.elapsed();

        Ok(AcquisitionWindow {
            samples,
            nominal_rate: rate,
            nominal_duration,
            actual_elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimAdc;

    fn clock() -> SampleClock {
        SampleClock::new(0, Scaling::new(3.3, 1023))
    }

    #[test]
    fn test_scaling() {
        let s = Scaling::new(3.3, 1023);
        assert_eq!(0.0, s.voltage(0));
        assert!((s.voltage(1023) - 3.3).abs() < 1e-12);
        let biased = s.with_bias(-1.65);
        assert!((biased.voltage(1023) - 1.65).abs() < 1e-12);
        assert!((biased.voltage(0) + 1.65).abs() < 1e-12);
    }

    #[test]
    fn test_sample_count_rounds() {
        assert_eq!(25600, sample_count(25600.0, 1.0));
        assert_eq!(51200, sample_count(25600.0, 2.0));
        assert_eq!(2, sample_count(3.0, 0.5));
        assert_eq!(0, sample_count(1000.0, 0.0004));
    }

    #[test]
    fn test_window_size_and_elapsed() {
        for (rate, duration) in [(1000.0, 0.05), (2000.0, 0.0125), (3.0, 0.5), (1000.0, 0.0004)] {
            let mut adc = SimAdc::new(3.3, 1023);
            let window = clock().acquire(&mut adc, rate, duration).unwrap();
            assert_eq!(sample_count(rate, duration), window.samples.len());
            assert_eq!(window.samples.len(), adc.reads());
            assert!(window.actual_elapsed >= Duration::from_secs_f64(duration));
            assert!(window.overrun() >= 0.0);
        }
    }

    #[test]
    fn test_samples_are_scaled() {
        let mut adc = SimAdc::new(3.3, 1023);
        let window = clock().acquire(&mut adc, 1000.0, 0.01).unwrap();
        for s in &window.samples {
            assert_eq!(512, s.raw_code);
            assert!((s.voltage - 512.0 * 3.3 / 1023.0).abs() < 1e-12);
            assert!(s.timestamp.is_none());
        }
    }

    #[test]
    fn test_timestamps() {
        let mut adc = SimAdc::new(3.3, 1023);
        let window = clock()
            .with_timestamps()
            .acquire(&mut adc, 1000.0, 0.005)
            .unwrap();
        let stamp = window.samples[0].timestamp.as_ref().unwrap();
        // HH:MM:SS.mmm
        assert_eq!(12, stamp.len());
        assert_eq!(Some('.'), stamp.chars().nth(8));
    }

    #[test]
    fn test_failed_read_kills_window() {
        let mut adc = SimAdc::new(3.3, 1023).fail_after(5);
        match clock().acquire(&mut adc, 1000.0, 0.01) {
            Err(Error::Acquisition { channel, index, .. }) => {
                assert_eq!(0, channel);
                assert_eq!(5, index);
            }
            other => panic!("expected acquisition error, got {:?}", other),
        }
        // No retry
        assert_eq!(5, adc.reads());
    }

    #[test]
    fn test_rejects_bad_rate() {
        let mut adc = SimAdc::new(3.3, 1023);
        assert!(matches!(
            clock().acquire(&mut adc, 0.0, 1.0),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            clock().acquire(&mut adc, 1000.0, -1.0),
            Err(Error::InvalidConfiguration(_))
        ));
    }
}

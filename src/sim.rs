//! Simulated hardware so the logger can run (and be tested) without a Pi

use std::{
    collections::VecDeque,
    f64::consts::PI,
    io,
    time::{Duration, Instant},
};

use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::debug;

use crate::hardware::{Adc, Level, TriggerInput};

/// A converter looking at a sum of sinusoids riding on a DC offset.
/// The signal is a function of wall time, so slow reads shift the
/// spectrum exactly the way a real converter would.
pub struct SimAdc {
    tones: Vec<(f64, f64)>,
    offset: f64,
    noise: f64,
    vref: f64,
    max_code: u16,
    start: Instant,
    rng: StdRng,
    reads: usize,
    fail_after: Option<usize>,
}

impl SimAdc {
    pub fn new(vref: f64, max_code: u16) -> Self {
        Self {
            tones: vec![],
            offset: vref / 2.0,
            noise: 0.0,
            vref,
            max_code,
            start: Instant::now(),
            rng: StdRng::seed_from_u64(0x5eed),
            reads: 0,
            fail_after: None,
        }
    }

    /// Add a tone of `freq` Hz with peak `amplitude` volts
    pub fn with_tone(mut self, freq: f64, amplitude: f64) -> Self {
        self.tones.push((freq, amplitude));
        self
    }

    /// Uniform noise of +/- `noise` volts
    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise;
        self
    }

    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    /// Every read after the first `reads` fails
    pub fn fail_after(mut self, reads: usize) -> Self {
        self.fail_after = Some(reads);
        self
    }

    pub fn reads(&self) -> usize {
        self.reads
    }

    fn voltage_at(&mut self, t: f64) -> f64 {
        let tone: f64 = self
            .tones
            .iter()
            .map(|(freq, amp)| amp * (2.0 * PI * freq * t).sin())
            .sum();
        let noise = if self.noise > 0.0 {
            self.rng.gen_range(-self.noise..=self.noise)
        } else {
            0.0
        };
        self.offset + tone + noise
    }
}

impl Adc for SimAdc {
    fn max_code(&self) -> u16 {
        self.max_code
    }

    fn read_channel(&mut self, _channel: u8) -> io::Result<u16> {
        if let Some(limit) = self.fail_after {
            if self.reads >= limit {
                return Err(io::Error::new(io::ErrorKind::Other, "simulated SPI fault"));
            }
        }
        self.reads += 1;
        let t = self.start.elapsed().as_secs_f64();
        let volts = self.voltage_at(t);
        let code = (volts / self.vref * self.max_code as f64).round();
        Ok(code.clamp(0.0, self.max_code as f64) as u16)
    }
}

impl Drop for SimAdc {
    fn drop(&mut self) {
        debug!(reads = self.reads, "Releasing simulated ADC");
    }
}

enum Schedule {
    /// One level per poll, then low forever
    Script(VecDeque<Level>),
    /// Low for `low`, then high for `high`, repeating
    Periodic {
        low: Duration,
        high: Duration,
        start: Instant,
    },
}

pub struct SimTrigger {
    schedule: Schedule,
    polls: usize,
}

impl SimTrigger {
    pub fn scripted(levels: impl IntoIterator<Item = Level>) -> Self {
        Self {
            schedule: Schedule::Script(levels.into_iter().collect()),
            polls: 0,
        }
    }

    pub fn periodic(low: Duration, high: Duration) -> Self {
        Self {
            schedule: Schedule::Periodic {
                low,
                high,
                start: Instant::now(),
            },
            polls: 0,
        }
    }

    pub fn polls(&self) -> usize {
        self.polls
    }
}

impl TriggerInput for SimTrigger {
    fn read_level(&mut self) -> io::Result<Level> {
        self.polls += 1;
        Ok(match &mut self.schedule {
            Schedule::Script(levels) => levels.pop_front().unwrap_or(Level::Low),
            Schedule::Periodic { low, high, start } => {
                let period = (*low + *high).as_secs_f64();
                if period == 0.0 {
                    return Ok(Level::Low);
                }
                let phase = start.elapsed().as_secs_f64() % period;
                if phase < low.as_secs_f64() {
                    Level::Low
                } else {
                    Level::High
                }
            }
        })
    }
}

impl Drop for SimTrigger {
    fn drop(&mut self) {
        debug!(polls = self.polls, "Releasing simulated trigger line");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_adc_sits_at_offset() {
        let mut adc = SimAdc::new(3.3, 1023);
        // 1.65 / 3.3 * 1023 = 511.5, rounds up
        assert_eq!(512, adc.read_channel(0).unwrap());
        assert_eq!(1, adc.reads());
    }

    #[test]
    fn test_codes_clamped() {
        let mut adc = SimAdc::new(3.3, 1023).with_offset(10.0);
        assert_eq!(1023, adc.read_channel(0).unwrap());
        let mut adc = SimAdc::new(3.3, 1023).with_offset(-10.0);
        assert_eq!(0, adc.read_channel(0).unwrap());
    }

    #[test]
    fn test_fail_after() {
        let mut adc = SimAdc::new(3.3, 1023).fail_after(2);
        assert!(adc.read_channel(0).is_ok());
        assert!(adc.read_channel(0).is_ok());
        assert!(adc.read_channel(0).is_err());
    }

    #[test]
    fn test_script_runs_out_low() {
        let mut trig = SimTrigger::scripted([Level::High, Level::High]);
        assert_eq!(Level::High, trig.read_level().unwrap());
        assert_eq!(Level::High, trig.read_level().unwrap());
        assert_eq!(Level::Low, trig.read_level().unwrap());
        assert_eq!(3, trig.polls());
    }

    #[test]
    fn test_periodic_starts_low() {
        let mut trig = SimTrigger::periodic(Duration::from_secs(60), Duration::from_secs(60));
        assert_eq!(Level::Low, trig.read_level().unwrap());
        let mut trig = SimTrigger::periodic(Duration::ZERO, Duration::from_secs(60));
        assert_eq!(Level::High, trig.read_level().unwrap());
    }
}

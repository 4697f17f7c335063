//! Validated configuration handed to the core. Everything in here has
//! already been checked, the controller never sees raw operator input.

use std::time::Duration;

use crate::{
    capture::Scaling,
    error::{Error, Result},
};

// Defaults, as deployed on the bench rig
pub const DEFAULT_ARM_DELAY: Duration = Duration::from_secs(30);
pub const DEFAULT_LOG_DELAY: Duration = Duration::from_secs(7);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_IDLE_POLL: Duration = Duration::from_millis(100);
pub const DEFAULT_RATE: f64 = 25600.0;
pub const DEFAULT_WINDOW_DURATION: f64 = 1.0;
pub const DEFAULT_LOG_DURATION: f64 = 2.0;
pub const DEFAULT_TOLERANCE: f64 = 10.0;
pub const DEFAULT_THRESHOLD: f64 = 0.05;
pub const DEFAULT_VREF: f64 = 3.3;
/// The logged segments are centered on the mid-rail bias of the sensor front end
pub const DEFAULT_LOG_BIAS: f64 = -1.65;

/// Ordered set of frequencies to watch for. Order is priority.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetFrequencySet {
    freqs: Vec<f64>,
    tolerance: f64,
    threshold: f64,
}

impl TargetFrequencySet {
    pub const MIN_TARGETS: usize = 3;
    pub const MAX_TARGETS: usize = 6;

    pub fn new(freqs: Vec<f64>, tolerance: f64, threshold: f64) -> Result<Self> {
        if !(Self::MIN_TARGETS..=Self::MAX_TARGETS).contains(&freqs.len()) {
            return Err(Error::InvalidConfiguration(format!(
                "need between {} and {} target frequencies, got {}",
                Self::MIN_TARGETS,
                Self::MAX_TARGETS,
                freqs.len()
            )));
        }
        if let Some(bad) = freqs.iter().find(|f| !(f.is_finite() && **f > 0.0)) {
            return Err(Error::InvalidConfiguration(format!(
                "target frequency must be positive, got {}",
                bad
            )));
        }
        if !(tolerance.is_finite() && tolerance >= 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "tolerance must be non-negative, got {}",
                tolerance
            )));
        }
        if !(threshold.is_finite() && threshold >= 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "amplitude threshold must be non-negative, got {}",
                threshold
            )));
        }
        Ok(Self {
            freqs,
            tolerance,
            threshold,
        })
    }

    /// Targets in declared order
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.freqs.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.freqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.freqs.is_empty()
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

/// Fixed delays and capture shapes for the trigger loop
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Timing {
    /// Settle time after the trigger first goes high
    pub arm_delay: Duration,
    /// Settle time between a detection and its logged capture
    pub log_delay: Duration,
    /// Pause between analysis windows while monitoring
    pub poll_interval: Duration,
    /// Trigger poll period while idle
    pub idle_poll: Duration,
    pub window_rate: f64,
    pub window_duration: f64,
    pub log_rate: f64,
    pub log_duration: f64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            arm_delay: DEFAULT_ARM_DELAY,
            log_delay: DEFAULT_LOG_DELAY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            idle_poll: DEFAULT_IDLE_POLL,
            window_rate: DEFAULT_RATE,
            window_duration: DEFAULT_WINDOW_DURATION,
            log_rate: DEFAULT_RATE,
            log_duration: DEFAULT_LOG_DURATION,
        }
    }
}

impl Timing {
    pub fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("window rate", self.window_rate),
            ("window duration", self.window_duration),
            ("log rate", self.log_rate),
            ("log duration", self.log_duration),
        ] {
            if !(v.is_finite() && v > 0.0) {
                return Err(Error::InvalidConfiguration(format!(
                    "{} must be positive, got {}",
                    name, v
                )));
            }
        }
        Ok(())
    }
}

/// Everything the trigger controller needs besides hardware and a sink
#[derive(Clone, Debug)]
pub struct MonitorConfig {
    pub channel: u8,
    /// Scaling for the live analysis windows
    pub window_scaling: Scaling,
    /// Scaling for logged segments (carries the calibration bias)
    pub log_scaling: Scaling,
    pub timing: Timing,
    pub targets: TargetFrequencySet,
}

impl MonitorConfig {
    pub fn new(
        channel: u8,
        vref: f64,
        max_code: u16,
        log_bias: f64,
        timing: Timing,
        targets: TargetFrequencySet,
    ) -> Result<Self> {
        if !(vref.is_finite() && vref > 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "reference voltage must be positive, got {}",
                vref
            )));
        }
        if max_code == 0 {
            return Err(Error::InvalidConfiguration(
                "max code must be non-zero".to_owned(),
            ));
        }
        if !log_bias.is_finite() {
            return Err(Error::InvalidConfiguration(format!(
                "bias must be finite, got {}",
                log_bias
            )));
        }
        timing.validate()?;
        let window_scaling = Scaling::new(vref, max_code);
        Ok(Self {
            channel,
            window_scaling,
            log_scaling: window_scaling.with_bias(log_bias),
            timing,
            targets,
        })
    }
}

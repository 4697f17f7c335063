//! Argument parsing for running from the command line

use std::{path::PathBuf, time::Duration};

use clap::{Args as ClapArgs, Parser, Subcommand};

use crate::{
    config::{self, MonitorConfig, TargetFrequencySet, Timing},
    error::Result,
    sink::SESSION_PREFIX,
};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,
    #[clap(flatten)]
    pub sim: SimArgs,
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Wait for the trigger line and log segments whenever a target frequency shows up
    Monitor(MonitorArgs),
    /// Capture a fixed amount of data straight to CSV
    Record(RecordArgs),
}

#[derive(ClapArgs, Debug)]
pub struct MonitorArgs {
    /// Target frequency in Hz, in priority order (3 to 6 of them)
    #[clap(short, long = "freq", required = true, value_parser = positive_float)]
    pub freqs: Vec<f64>,
    /// How far (Hz) a spectral bin may sit from a target and still count
    #[clap(long, default_value_t = config::DEFAULT_TOLERANCE)]
    pub tolerance: f64,
    /// Minimum normalized amplitude for a bin to count
    #[clap(long, default_value_t = config::DEFAULT_THRESHOLD)]
    pub threshold: f64,
    /// ADC channel to sample
    #[clap(short, long, default_value_t = 0)]
    pub channel: u8,
    /// ADC reference voltage
    #[clap(long, default_value_t = config::DEFAULT_VREF)]
    pub vref: f64,
    /// Largest code the ADC produces
    #[clap(long, default_value_t = 1023)]
    #[clap(value_parser = clap::value_parser!(u16).range(1..))]
    pub max_code: u16,
    /// Calibration offset (V) applied to logged segments
    #[clap(long, default_value_t = config::DEFAULT_LOG_BIAS, allow_hyphen_values = true)]
    pub bias: f64,
    /// Directory session files are written to
    #[clap(short, long, default_value = ".")]
    pub output_dir: PathBuf,
    /// Session file name prefix
    #[clap(long, default_value = SESSION_PREFIX)]
    pub prefix: String,
    /// Seconds to wait after the trigger goes high before monitoring
    #[clap(long, default_value_t = 30.0, value_parser = non_negative_float)]
    pub arm_delay: f64,
    /// Seconds to wait between a detection and its logged capture
    #[clap(long, default_value_t = 7.0, value_parser = non_negative_float)]
    pub log_delay: f64,
    /// Seconds between analysis windows
    #[clap(long, default_value_t = 1.0, value_parser = non_negative_float)]
    pub poll_interval: f64,
    /// Seconds between trigger polls while idle
    #[clap(long, default_value_t = 0.1, value_parser = non_negative_float)]
    pub idle_poll: f64,
    /// Analysis window sample rate (Hz)
    #[clap(long, default_value_t = config::DEFAULT_RATE, value_parser = positive_float)]
    pub window_rate: f64,
    /// Analysis window length (s)
    #[clap(long, default_value_t = config::DEFAULT_WINDOW_DURATION, value_parser = positive_float)]
    pub window_duration: f64,
    /// Logged segment sample rate (Hz)
    #[clap(long, default_value_t = config::DEFAULT_RATE, value_parser = positive_float)]
    pub log_rate: f64,
    /// Logged segment length (s)
    #[clap(long, default_value_t = config::DEFAULT_LOG_DURATION, value_parser = positive_float)]
    pub log_duration: f64,
}

impl MonitorArgs {
    pub fn timing(&self) -> Timing {
        Timing {
            arm_delay: Duration::from_secs_f64(self.arm_delay),
            log_delay: Duration::from_secs_f64(self.log_delay),
            poll_interval: Duration::from_secs_f64(self.poll_interval),
            idle_poll: Duration::from_secs_f64(self.idle_poll),
            window_rate: self.window_rate,
            window_duration: self.window_duration,
            log_rate: self.log_rate,
            log_duration: self.log_duration,
        }
    }

    /// Validate everything into the configuration the controller runs on
    pub fn config(&self) -> Result<MonitorConfig> {
        let targets = TargetFrequencySet::new(self.freqs.clone(), self.tolerance, self.threshold)?;
        MonitorConfig::new(
            self.channel,
            self.vref,
            self.max_code,
            self.bias,
            self.timing(),
            targets,
        )
    }
}

#[derive(ClapArgs, Debug)]
pub struct RecordArgs {
    /// Seconds to record for
    #[clap(short, long, default_value_t = 5.0, value_parser = positive_float)]
    pub duration: f64,
    /// Sample rate (Hz)
    #[clap(short, long, default_value_t = config::DEFAULT_RATE, value_parser = positive_float)]
    pub rate: f64,
    /// ADC channel to sample
    #[clap(short, long, default_value_t = 0)]
    pub channel: u8,
    /// ADC reference voltage
    #[clap(long, default_value_t = config::DEFAULT_VREF, value_parser = positive_float)]
    pub vref: f64,
    /// Largest code the ADC produces
    #[clap(long, default_value_t = 4095)]
    #[clap(value_parser = clap::value_parser!(u16).range(1..))]
    pub max_code: u16,
    /// Directory the CSV is written to
    #[clap(short, long, default_value = ".")]
    pub output_dir: PathBuf,
}

/// The simulated front end standing in for the SPI ADC and trigger GPIO
#[derive(ClapArgs, Debug)]
pub struct SimArgs {
    /// Tone (Hz) present on the simulated input, may be repeated
    #[clap(long = "sim-tone", global = true, value_parser = positive_float)]
    pub tones: Vec<f64>,
    /// Peak amplitude (V) of each simulated tone
    #[clap(long, global = true, default_value_t = 1.0, value_parser = non_negative_float)]
    pub sim_amplitude: f64,
    /// Uniform noise (V) on the simulated input
    #[clap(long, global = true, default_value_t = 0.0, value_parser = non_negative_float)]
    pub sim_noise: f64,
    /// Seconds the simulated trigger stays low each cycle
    #[clap(long, global = true, default_value_t = 5.0, value_parser = non_negative_float)]
    pub sim_low: f64,
    /// Seconds the simulated trigger stays high each cycle
    #[clap(long, global = true, default_value_t = 60.0, value_parser = non_negative_float)]
    pub sim_high: f64,
}

/// Match verbosity filter with tracing subscriber log levels
pub fn convert_filter(filter: log::LevelFilter) -> tracing_subscriber::filter::LevelFilter {
    match filter {
        log::LevelFilter::Off => tracing_subscriber::filter::LevelFilter::OFF,
        log::LevelFilter::Error => tracing_subscriber::filter::LevelFilter::ERROR,
        log::LevelFilter::Warn => tracing_subscriber::filter::LevelFilter::WARN,
        log::LevelFilter::Info => tracing_subscriber::filter::LevelFilter::INFO,
        log::LevelFilter::Debug => tracing_subscriber::filter::LevelFilter::DEBUG,
        log::LevelFilter::Trace => tracing_subscriber::filter::LevelFilter::TRACE,
    }
}

fn positive_float(s: &str) -> std::result::Result<f64, String> {
    let v: f64 = s.parse().map_err(|_| format!("`{}` isn't a number", s))?;
    if v.is_finite() && v > 0.0 {
        Ok(v)
    } else {
        Err(format!("`{}` must be greater than zero", s))
    }
}

fn non_negative_float(s: &str) -> std::result::Result<f64, String> {
    let v: f64 = s.parse().map_err(|_| format!("`{}` isn't a number", s))?;
    if v.is_finite() && v >= 0.0 {
        Ok(v)
    } else {
        Err(format!("`{}` can't be negative", s))
    }
}

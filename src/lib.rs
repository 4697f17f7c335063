//! Trigger-gated spectral logging of a single ADC channel.
//!
//! While an external trigger line is held high we keep taking fixed-rate
//! windows off of the ADC, look for any of a handful of target frequencies,
//! and log a clean capture named after whichever one shows up.

pub mod args;
pub mod capture;
pub mod config;
pub mod controller;
pub mod error;
pub mod hardware;
pub mod logger;
pub mod monitoring;
pub mod record;
pub mod shutdown;
pub mod sim;
pub mod sink;
pub mod spectrum;

pub use error::{Error, Result};

//! Error taxonomy for acquisition, configuration and persistence

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A single ADC read failed, the whole window is gone
    #[error("ADC read failed on channel {channel} at sample {index}: {reason}")]
    Acquisition {
        channel: u8,
        index: usize,
        reason: String,
    },
    /// The trigger line could not be polled
    #[error("Trigger read failed: {0}")]
    Trigger(String),
    /// Rejected at the boundary, the core never sees these
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Persistence failure: {0}")]
    Persistence(#[from] std::io::Error),
    /// Process-level cancellation
    #[error("Interrupted")]
    Interrupted,
}

impl Error {
    /// Interrupts take the same release path as failures but aren't failures
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::Interrupted)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

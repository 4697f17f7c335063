//! Process-level interrupt handling
//!
//! The ctrlc handler flips a flag and pokes a channel. Every blocking sleep in
//! the trigger loop waits on that channel instead of `thread::sleep`, so an
//! interrupt is seen the moment it arrives rather than after a 30 s settle delay.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use crate::error::{Error, Result};

#[derive(Clone, Debug)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = bounded(1);
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            wake_tx,
            wake_rx,
        }
    }

    /// Route Ctrl-C to this handle
    pub fn install_ctrlc(&self) -> std::result::Result<(), ctrlc::Error> {
        let handle = self.clone();
        ctrlc::set_handler(move || handle.trigger())
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
        // Someone already has a wakeup pending if this is full
        let _ = self.wake_tx.try_send(());
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_triggered() {
            Err(Error::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Sleep for `dur`, bailing out with `Error::Interrupted` if we get interrupted
    pub fn sleep(&self, dur: Duration) -> Result<()> {
        self.check()?;
        match self.wake_rx.recv_timeout(dur) {
            Ok(()) => Err(Error::Interrupted),
            // We hold a sender ourselves, so disconnection can't really happen
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => self.check(),
        }
    }
}

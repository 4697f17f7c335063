//! The trigger state machine
//!
//! ```text
//!   Idle --(trigger high)--> ArmedDelay --(settle delay)--> Monitoring
//!    ^                                                         |
//!    +------------------(trigger low / session error)----------+
//! ```
//!
//! While monitoring we acquire an analysis window, look for a target
//! frequency and, on a hit, hand off to the [`SessionLogger`] for a clean
//! capture. Everything runs on the calling thread.

use std::mem;

use tracing::{debug, error, info, warn};

use crate::{
    capture::SampleClock,
    config::{MonitorConfig, TargetFrequencySet, Timing},
    error::{Error, Result},
    hardware::{Adc, Level, TriggerInput},
    logger::{Session, SessionLogger},
    monitoring::{report_timing, SpectrumObserver},
    shutdown::Shutdown,
    sink::SessionSink,
    spectrum::detect,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerState {
    Idle,
    ArmedDelay,
    Monitoring,
}

/// What a single call to [`TriggerController::step`] did
#[derive(Debug)]
pub enum Step {
    /// Trigger low, nothing to do
    Idle,
    /// Trigger went high
    Armed,
    /// Settle delay over, session opened
    SessionOpened(u64),
    /// Window analyzed, no target present
    Quiet,
    /// Target detected and a segment logged
    Logged(f64),
    /// Trigger dropped, session finalized
    SessionClosed(u64),
    /// Session ended early by an acquisition or persistence failure
    SessionAborted { id: u64, error: Error },
}

enum Phase<H> {
    Idle,
    ArmedDelay,
    Monitoring(Session<H>),
}

pub struct TriggerController<A: Adc, T: TriggerInput, S: SessionSink> {
    adc: A,
    trigger: T,
    sink: S,
    clock: SampleClock,
    logger: SessionLogger,
    timing: Timing,
    targets: TargetFrequencySet,
    shutdown: Shutdown,
    observer: Option<Box<dyn SpectrumObserver>>,
    phase: Phase<S::Handle>,
    next_id: u64,
}

impl<A: Adc, T: TriggerInput, S: SessionSink> TriggerController<A, T, S> {
    pub fn new(adc: A, trigger: T, sink: S, config: MonitorConfig, shutdown: Shutdown) -> Self {
        Self {
            adc,
            trigger,
            sink,
            clock: SampleClock::new(config.channel, config.window_scaling),
            logger: SessionLogger::new(config.channel, config.log_scaling, &config.timing),
            timing: config.timing,
            targets: config.targets,
            shutdown,
            observer: None,
            phase: Phase::Idle,
            next_id: 1,
        }
    }

    pub fn with_observer(mut self, observer: Box<dyn SpectrumObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn state(&self) -> TriggerState {
        match self.phase {
            Phase::Idle => TriggerState::Idle,
            Phase::ArmedDelay => TriggerState::ArmedDelay,
            Phase::Monitoring(_) => TriggerState::Monitoring,
        }
    }

    /// Id of the open session, if there is one
    pub fn session_id(&self) -> Option<u64> {
        match &self.phase {
            Phase::Monitoring(session) => Some(session.id),
            _ => None,
        }
    }

    fn read_trigger(&mut self) -> Result<Level> {
        self.trigger
            .read_level()
            .map_err(|e| Error::Trigger(e.to_string()))
    }

    /// Advance the state machine by one blocking unit of work.
    ///
    /// Session-local failures end the session and come back as
    /// [`Step::SessionAborted`]; anything else (trigger failures, sink
    /// creation, interrupts) is returned as an error.
    pub fn step(&mut self) -> Result<Step> {
        self.shutdown.check()?;
        match self.phase {
            Phase::Idle => {
                if self.read_trigger()?.is_high() {
                    info!(
                        "Trigger detected, waiting {:?} before monitoring",
                        self.timing.arm_delay
                    );
                    self.phase = Phase::ArmedDelay;
                    Ok(Step::Armed)
                } else {
                    self.shutdown.sleep(self.timing.idle_poll)?;
                    Ok(Step::Idle)
                }
            }
            Phase::ArmedDelay => {
                // The line isn't looked at again until the delay is over
                self.shutdown.sleep(self.timing.arm_delay)?;
                let id = self.next_id;
                let handle = self.sink.create_session(id)?;
                self.next_id += 1;
                self.phase = Phase::Monitoring(Session::new(id, handle));
                info!(session = id, "Monitoring for target frequencies");
                Ok(Step::SessionOpened(id))
            }
            Phase::Monitoring(_) => {
                if !self.read_trigger()?.is_high() {
                    let id = self.close_session()?.unwrap_or_default();
                    info!(session = id, "Trigger went low, session saved");
                    return Ok(Step::SessionClosed(id));
                }
                match self.monitor_once() {
                    Ok(step) => {
                        self.shutdown.sleep(self.timing.poll_interval)?;
                        Ok(step)
                    }
                    Err(Error::Interrupted) => Err(Error::Interrupted),
                    Err(error) => {
                        let id = self.abort_session(&error);
                        Ok(Step::SessionAborted { id, error })
                    }
                }
            }
        }
    }

    /// One analysis window, plus a logged segment if it had a target in it
    fn monitor_once(&mut self) -> Result<Step> {
        let window = self.clock.acquire(
            &mut self.adc,
            self.timing.window_rate,
            self.timing.window_duration,
        )?;
        report_timing(&window);
        let found = detect(
            &window.samples,
            window.actual_elapsed,
            &self.targets,
            self.observer
                .as_mut()
                .map(|o| o.as_mut() as &mut dyn SpectrumObserver),
        );
        let freq = match found {
            Some(freq) => freq,
            None => {
                debug!("Target frequencies not detected, monitoring continues");
                return Ok(Step::Quiet);
            }
        };
        info!(freq, "Target frequency detected");
        if let Phase::Monitoring(session) = &mut self.phase {
            self.logger
                .log(&mut self.adc, &mut self.sink, session, freq, &self.shutdown)?;
        }
        Ok(Step::Logged(freq))
    }

    /// Finalize the open session and drop back to idle
    fn close_session(&mut self) -> Result<Option<u64>> {
        match mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Monitoring(session) => {
                let id = session.id;
                self.sink.finalize(session.handle)?;
                Ok(Some(id))
            }
            _ => Ok(None),
        }
    }

    /// Give up on the open session after `cause`, keeping whatever it already logged
    fn abort_session(&mut self, cause: &Error) -> u64 {
        let id = self.session_id().unwrap_or_default();
        error!(session = id, "Session aborted: {}", cause);
        if let Err(e) = self.close_session() {
            error!(session = id, "Failed to finalize aborted session: {}", e);
        }
        id
    }

    /// Run until interrupted or something unrecoverable happens. The open
    /// session is finalized and the hardware released on every way out.
    pub fn run(mut self) -> Result<()> {
        info!("Waiting for trigger");
        let cause = loop {
            match self.step() {
                Ok(Step::SessionAborted { id, error }) => {
                    warn!(session = id, "Back to idle after: {}", error)
                }
                Ok(step) => debug!(?step, state = ?self.state(), "Step"),
                Err(e) => break e,
            }
        };
        let closed = self.close_session();
        drop(self);
        match (cause, closed) {
            (Error::Interrupted, closed) => {
                info!("Monitoring stopped by user");
                closed.map(|_| ())
            }
            (cause, Err(e)) => {
                error!("Failed to finalize session on the way out: {}", e);
                Err(cause)
            }
            (cause, Ok(_)) => Err(cause),
        }
    }
}

impl<A: Adc, T: TriggerInput, S: SessionSink> Drop for TriggerController<A, T, S> {
    fn drop(&mut self) {
        // Only left open if the caller drove `step` and walked away mid-session
        match self.close_session() {
            Ok(Some(id)) => debug!(session = id, "Finalized session on drop"),
            Ok(None) => {}
            Err(e) => error!("Failed to finalize session on drop: {}", e),
        }
    }
}

//! Dedicated captures that get committed to the open session

use std::{collections::BTreeMap, time::Duration};

use tracing::{info, warn};

use crate::{
    capture::{SampleClock, Scaling},
    config::Timing,
    error::Result,
    hardware::Adc,
    monitoring::report_timing,
    shutdown::Shutdown,
    sink::{segment_name, SessionSink},
};

/// One trigger-high episode and everything logged during it
pub struct Session<H> {
    pub id: u64,
    pub handle: H,
    /// Segment name to number of samples last written under it
    pub segments: BTreeMap<String, usize>,
}

impl<H> Session<H> {
    pub fn new(id: u64, handle: H) -> Self {
        Self {
            id,
            handle,
            segments: BTreeMap::new(),
        }
    }
}

pub struct SessionLogger {
    clock: SampleClock,
    rate: f64,
    duration: f64,
    settle: Duration,
}

impl SessionLogger {
    pub fn new(channel: u8, scaling: Scaling, timing: &Timing) -> Self {
        Self {
            clock: SampleClock::new(channel, scaling).with_timestamps(),
            rate: timing.log_rate,
            duration: timing.log_duration,
            settle: timing.log_delay,
        }
    }

    /// Wait out the settle delay, take a clean capture and store it in the
    /// session under the name of `freq`. Blocks for settle + capture time.
    pub fn log<A: Adc, S: SessionSink>(
        &self,
        adc: &mut A,
        sink: &mut S,
        session: &mut Session<S::Handle>,
        freq: f64,
        shutdown: &Shutdown,
    ) -> Result<()> {
        let name = segment_name(freq);
        info!(
            session = session.id,
            segment = %name,
            "Logging triggered, settling for {:?}",
            self.settle
        );
        shutdown.sleep(self.settle)?;

        let window = self.clock.acquire(adc, self.rate, self.duration)?;
        report_timing(&window);

        sink.write_segment(&mut session.handle, &name, &window.samples)?;
        if session
            .segments
            .insert(name.clone(), window.samples.len())
            .is_some()
        {
            warn!(
                session = session.id,
                segment = %name,
                "Segment logged twice this session, earlier capture replaced"
            );
        }
        info!(
            session = session.id,
            segment = %name,
            samples = window.samples.len(),
            "Segment saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::Error, sim::SimAdc, sink::MemorySink};

    fn timing() -> Timing {
        Timing {
            log_delay: Duration::from_millis(5),
            log_rate: 1000.0,
            log_duration: 0.02,
            ..Default::default()
        }
    }

    fn logger() -> SessionLogger {
        SessionLogger::new(0, Scaling::new(3.3, 1023).with_bias(-1.65), &timing())
    }

    #[test]
    fn test_log_writes_named_segment() {
        let mut adc = SimAdc::new(3.3, 1023);
        let mut sink = MemorySink::default();
        let mut session = Session::new(1, sink.create_session(1).unwrap());
        logger()
            .log(&mut adc, &mut sink, &mut session, 50.2, &Shutdown::new())
            .unwrap();
        assert_eq!(Some(&20), session.segments.get("50Hz"));

        let written = session.handle.segments.get("50Hz").unwrap();
        assert_eq!(20, written.len());
        for s in written {
            assert!(s.timestamp.is_some());
            // Mid-rail code with the bias taken off sits just above zero
            assert_eq!(512, s.raw_code);
            assert!((s.voltage - (512.0 * 3.3 / 1023.0 - 1.65)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_repeat_frequency_replaces() {
        let mut sink = MemorySink::default();
        let mut session = Session::new(1, sink.create_session(1).unwrap());
        let mut quiet = SimAdc::new(3.3, 1023);
        logger()
            .log(&mut quiet, &mut sink, &mut session, 50.0, &Shutdown::new())
            .unwrap();
        let mut high = SimAdc::new(3.3, 1023).with_offset(3.3);
        logger()
            .log(&mut high, &mut sink, &mut session, 49.8, &Shutdown::new())
            .unwrap();

        assert_eq!(1, session.segments.len());
        let written = session.handle.segments.get("50Hz").unwrap();
        assert!(written.iter().all(|s| s.raw_code == 1023));
    }

    #[test]
    fn test_write_failure_surfaces() {
        let mut adc = SimAdc::new(3.3, 1023);
        let mut sink = MemorySink {
            fail_writes: true,
            ..Default::default()
        };
        let mut session = Session::new(1, sink.create_session(1).unwrap());
        let err = logger()
            .log(&mut adc, &mut sink, &mut session, 50.0, &Shutdown::new())
            .unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
        assert!(session.segments.is_empty());
    }

    #[test]
    fn test_interrupt_during_settle() {
        let mut adc = SimAdc::new(3.3, 1023);
        let mut sink = MemorySink::default();
        let mut session = Session::new(1, sink.create_session(1).unwrap());
        let shutdown = Shutdown::new();
        shutdown.trigger();
        let err = logger()
            .log(&mut adc, &mut sink, &mut session, 50.0, &shutdown)
            .unwrap_err();
        assert!(err.is_interrupted());
        assert_eq!(0, adc.reads());
    }
}

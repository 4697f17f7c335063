//! This module is responsible for getting logged segments onto disk

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Datelike, Local, Timelike};
use tracing::{debug, info};

use crate::{capture::Sample, error::Result};

pub const SESSION_PREFIX: &str = "fft_triggered_log";

/// Where sessions and their segments end up
pub trait SessionSink {
    type Handle;
    /// Open storage for session `id`
    fn create_session(&mut self, id: u64) -> Result<Self::Handle>;
    /// Store `samples` under `name`, replacing any segment already called `name`
    fn write_segment(
        &mut self,
        handle: &mut Self::Handle,
        name: &str,
        samples: &[Sample],
    ) -> Result<()>;
    /// Flush and close
    fn finalize(&mut self, handle: Self::Handle) -> Result<()>;
}

impl<S: SessionSink + ?Sized> SessionSink for &mut S {
    type Handle = S::Handle;

    fn create_session(&mut self, id: u64) -> Result<Self::Handle> {
        (**self).create_session(id)
    }

    fn write_segment(
        &mut self,
        handle: &mut Self::Handle,
        name: &str,
        samples: &[Sample],
    ) -> Result<()> {
        (**self).write_segment(handle, name, samples)
    }

    fn finalize(&mut self, handle: Self::Handle) -> Result<()> {
        (**self).finalize(handle)
    }
}

/// Segment name for a detected frequency, e.g. "50Hz"
pub fn segment_name(freq: f64) -> String {
    format!("{}Hz", freq.round() as i64)
}

/// Convert a chrono DateTime into the compact stamp used in session file names
pub fn session_timestamp(time: &DateTime<Local>) -> String {
    format!(
        "{}{:02}{:02}_{:02}{:02}{:02}",
        time.year(),
        time.month(),
        time.day(),
        time.hour(),
        time.minute(),
        time.second()
    )
}

/// `<prefix>_<timestamp>_session<N>.<ext>`
pub fn session_file_name(prefix: &str, time: &DateTime<Local>, id: u64, ext: &str) -> String {
    format!("{}_{}_session{}.{}", prefix, session_timestamp(time), id, ext)
}

/// Named segments in first-written order. Writing an existing name replaces it in place.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Segments {
    entries: Vec<(String, Vec<Sample>)>,
}

impl Segments {
    /// Returns true if this replaced an existing segment
    pub fn upsert(&mut self, name: &str, samples: &[Sample]) -> bool {
        if let Some((_, existing)) = self.entries.iter_mut().find(|(n, _)| n == name) {
            *existing = samples.to_vec();
            true
        } else {
            self.entries.push((name.to_owned(), samples.to_vec()));
            false
        }
    }

    pub fn get(&self, name: &str) -> Option<&[Sample]> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s.as_slice())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Sample])> {
        self.entries.iter().map(|(n, s)| (n.as_str(), s.as_slice()))
    }
}

/// One CSV file per session. Segments are held until the session is
/// finalized, then written out as `Segment,Timestamp,ADC Value,Voltage` rows.
pub struct CsvSink {
    dir: PathBuf,
    prefix: String,
}

pub struct CsvSession {
    pub path: PathBuf,
    file: BufWriter<File>,
    segments: Segments,
}

impl CsvSink {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SessionSink for CsvSink {
    type Handle = CsvSession;

    fn create_session(&mut self, id: u64) -> Result<CsvSession> {
        let path = self
            .dir
            .join(session_file_name(&self.prefix, &Local::now(), id, "csv"));
        // Create it up front so a bad output directory fails before we log anything
        let file = BufWriter::new(File::create(&path)?);
        info!(path = %path.display(), "Opened session file");
        Ok(CsvSession {
            path,
            file,
            segments: Segments::default(),
        })
    }

    fn write_segment(
        &mut self,
        handle: &mut CsvSession,
        name: &str,
        samples: &[Sample],
    ) -> Result<()> {
        if handle.segments.upsert(name, samples) {
            debug!(segment = name, "Replaced existing segment");
        }
        Ok(())
    }

    fn finalize(&mut self, mut handle: CsvSession) -> Result<()> {
        writeln!(handle.file, "Segment,Timestamp,ADC Value,Voltage")?;
        for (name, samples) in handle.segments.iter() {
            for s in samples {
                writeln!(
                    handle.file,
                    "{},{},{},{}",
                    name,
                    s.timestamp.as_deref().unwrap_or(""),
                    s.raw_code,
                    s.voltage
                )?;
            }
        }
        handle.file.flush()?;
        info!(
            path = %handle.path.display(),
            segments = handle.segments.len(),
            "Session file saved"
        );
        Ok(())
    }
}

/// Keeps finalized sessions in memory
#[derive(Default, Debug)]
pub struct MemorySink {
    pub sessions: Vec<MemorySession>,
    /// Make every segment write fail
    pub fail_writes: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemorySession {
    pub id: u64,
    pub segments: Segments,
}

impl SessionSink for MemorySink {
    type Handle = MemorySession;

    fn create_session(&mut self, id: u64) -> Result<MemorySession> {
        Ok(MemorySession {
            id,
            segments: Segments::default(),
        })
    }

    fn write_segment(
        &mut self,
        handle: &mut MemorySession,
        name: &str,
        samples: &[Sample],
    ) -> Result<()> {
        if self.fail_writes {
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "sink refused write").into());
        }
        handle.segments.upsert(name, samples);
        Ok(())
    }

    fn finalize(&mut self, handle: MemorySession) -> Result<()> {
        self.sessions.push(handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;

    fn samples(code: u16, n: usize) -> Vec<Sample> {
        (0..n)
            .map(|i| Sample {
                timestamp: Some(format!("12:00:00.{:03}", i)),
                raw_code: code,
                voltage: code as f64 / 100.0,
            })
            .collect()
    }

    #[test]
    fn test_segment_name() {
        assert_eq!("50Hz", segment_name(50.0));
        assert_eq!("120Hz", segment_name(119.6));
        assert_eq!("1000Hz", segment_name(1000.2));
    }

    #[test]
    fn test_session_file_name() {
        let t = Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 1).unwrap();
        assert_eq!(
            "fft_triggered_log_20240307_090501_session3.csv",
            session_file_name(SESSION_PREFIX, &t, 3, "csv")
        );
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut segs = Segments::default();
        assert!(!segs.upsert("50Hz", &samples(1, 3)));
        assert!(!segs.upsert("60Hz", &samples(2, 3)));
        assert!(segs.upsert("50Hz", &samples(9, 2)));
        assert_eq!(2, segs.len());
        assert_eq!(vec!["50Hz", "60Hz"], segs.names().collect::<Vec<_>>());
        assert_eq!(samples(9, 2).as_slice(), segs.get("50Hz").unwrap());
    }

    #[test]
    fn test_csv_session_roundtrip() {
        let dir = std::env::temp_dir().join(format!("fft_sink_test_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let mut sink = CsvSink::new(&dir, "unit");
        let mut handle = sink.create_session(7).unwrap();
        let path = handle.path.clone();
        assert!(path
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .ends_with("_session7.csv"));
        sink.write_segment(&mut handle, "50Hz", &samples(1, 2)).unwrap();
        sink.write_segment(&mut handle, "50Hz", &samples(5, 1)).unwrap();
        sink.finalize(handle).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            vec!["Segment,Timestamp,ADC Value,Voltage", "50Hz,12:00:00.000,5,0.05"],
            lines
        );
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_csv_bad_dir() {
        let mut sink = CsvSink::new("/nonexistent/definitely/not/here", "unit");
        assert!(matches!(
            sink.create_session(1),
            Err(crate::error::Error::Persistence(_))
        ));
    }
}

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::unix_millis;
use crate::snapshot::{ProcessSnapshot, ProviderError, SnapshotProvider, SystemSnapshot};

/// One recorded tick, one JSON object per line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedTick {
    #[serde(default)]
    pub timestamp: Option<u64>,
    pub system: SystemSnapshot,
    pub processes: Vec<ProcessSnapshot>,
}

/// Plays back ticks captured to a JSON-lines file. Blank lines are skipped.
pub struct ReplayProvider<R> {
    lines: Lines<R>,
    line_no: usize,
    last_timestamp: Option<u64>,
}

impl ReplayProvider<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, ProviderError> {
        let file = File::open(path)?;
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: BufRead> ReplayProvider<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            last_timestamp: None,
        }
    }

    fn next_tick(&mut self) -> Result<RecordedTick, ProviderError> {
        loop {
            let line = self.lines.next().ok_or(ProviderError::Exhausted)??;
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            return serde_json::from_str(&line).map_err(|e| ProviderError::Malformed {
                line: self.line_no,
                reason: e.to_string(),
            });
        }
    }
}

impl<R: BufRead> SnapshotProvider for ReplayProvider<R> {
    fn sample(&mut self) -> Result<(Vec<ProcessSnapshot>, SystemSnapshot), ProviderError> {
        self.last_timestamp = None;
        let tick = self.next_tick()?;
        self.last_timestamp = tick.timestamp;
        Ok((tick.processes, tick.system))
    }

    fn sampled_at(&self) -> Option<u64> {
        self.last_timestamp
    }
}

/// Wraps another provider and appends every successful sample to `writer`
/// in the format [`ReplayProvider`] reads back.
pub struct Recorder<P, W: Write> {
    inner: P,
    writer: W,
    last_timestamp: Option<u64>,
}

impl<P> Recorder<P, BufWriter<File>> {
    pub fn create(inner: P, path: &Path) -> Result<Self, ProviderError> {
        let file = File::create(path)?;
        Ok(Self::new(inner, BufWriter::new(file)))
    }
}

impl<P, W: Write> Recorder<P, W> {
    pub fn new(inner: P, writer: W) -> Self {
        Self {
            inner,
            writer,
            last_timestamp: None,
        }
    }

    pub fn into_parts(self) -> (P, W) {
        (self.inner, self.writer)
    }
}

impl<P: SnapshotProvider, W: Write> SnapshotProvider for Recorder<P, W> {
    fn sample(&mut self) -> Result<(Vec<ProcessSnapshot>, SystemSnapshot), ProviderError> {
        self.last_timestamp = None;
        let (processes, system) = self.inner.sample()?;
        let timestamp = self.inner.sampled_at().unwrap_or_else(unix_millis);

        let tick = RecordedTick {
            timestamp: Some(timestamp),
            system,
            processes,
        };
        serde_json::to_writer(&mut self.writer, &tick).map_err(std::io::Error::from)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;

        self.last_timestamp = Some(timestamp);
        Ok((tick.processes, tick.system))
    }

    fn sampled_at(&self) -> Option<u64> {
        self.last_timestamp
    }
}

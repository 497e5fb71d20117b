use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bytes read and written by one process during the last sampling interval.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskUsage {
    pub read_bytes: u64,
    pub written_bytes: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub pid: u32,
    pub ppid: u32,
    /// Process creation time as reported by the OS.
    pub start_time: u64,
    pub name: String,
    pub command: String,
    pub user: String,
    pub cpu_usage: f32,
    pub memory_usage: u64,
    pub disk_usage: DiskUsage,
    pub status: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    /// Per-core usage in percent.
    pub cpu_usage: Vec<f32>,
    pub memory_used: u64,
    pub network_rx_bytes: u64,
    pub network_tx_bytes: u64,
    pub disk_io_read_bytes: u64,
    pub disk_io_write_bytes: u64,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("snapshot source unavailable: {0}")]
    Unavailable(String),

    #[error("snapshot source exhausted")]
    Exhausted,

    #[error("malformed snapshot at line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of one `(processes, system)` pair per tick.
pub trait SnapshotProvider {
    fn sample(&mut self) -> Result<(Vec<ProcessSnapshot>, SystemSnapshot), ProviderError>;

    /// Timestamp (Unix ms) of the last sample when the source records its own
    /// clock, e.g. a replayed capture.
    fn sampled_at(&self) -> Option<u64> {
        None
    }
}

impl<P: SnapshotProvider + ?Sized> SnapshotProvider for Box<P> {
    fn sample(&mut self) -> Result<(Vec<ProcessSnapshot>, SystemSnapshot), ProviderError> {
        (**self).sample()
    }

    fn sampled_at(&self) -> Option<u64> {
        (**self).sampled_at()
    }
}

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::rollup::ProcessAccumulator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Metric {
    /// Sum of per-tick cpu percentages.
    #[default]
    Cpu,
    /// Peak resident memory.
    Memory,
    DiskRead,
    DiskWrite,
    /// Mean cpu percentage per sample.
    AverageCpu,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::Cpu,
        Metric::Memory,
        Metric::DiskRead,
        Metric::DiskWrite,
        Metric::AverageCpu,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Metric::Cpu => "cpu",
            Metric::Memory => "memory",
            Metric::DiskRead => "disk-read",
            Metric::DiskWrite => "disk-write",
            Metric::AverageCpu => "avg-cpu",
        }
    }

    /// Descending by metric. Float metrics add `0.0` so `-0.0` ties with `0.0`.
    fn compare(self, a: &ProcessAccumulator, b: &ProcessAccumulator) -> Ordering {
        match self {
            Metric::Cpu => (b.total_cpu_usage + 0.0).total_cmp(&(a.total_cpu_usage + 0.0)),
            Metric::Memory => b.max_memory_usage.cmp(&a.max_memory_usage),
            Metric::DiskRead => b.total_disk_read.cmp(&a.total_disk_read),
            Metric::DiskWrite => b.total_disk_write.cmp(&a.total_disk_write),
            Metric::AverageCpu => {
                (b.average_cpu_usage() + 0.0).total_cmp(&(a.average_cpu_usage() + 0.0))
            }
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown metric `{0}` (expected cpu, memory, disk-read, disk-write or avg-cpu)")]
pub struct UnknownMetric(pub String);

impl FromStr for Metric {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cpu" => Ok(Metric::Cpu),
            "memory" | "mem" => Ok(Metric::Memory),
            "disk-read" | "diskread" | "read" => Ok(Metric::DiskRead),
            "disk-write" | "diskwrite" | "write" => Ok(Metric::DiskWrite),
            "avg-cpu" | "average-cpu" => Ok(Metric::AverageCpu),
            _ => Err(UnknownMetric(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Alive,
    Dead,
}

impl StatusFilter {
    fn admits(self, entry: &ProcessAccumulator) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Alive => entry.is_alive(),
            StatusFilter::Dead => !entry.is_alive(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankingQuery {
    pub metric: Metric,
    pub limit: usize,
    pub status: StatusFilter,
}

impl RankingQuery {
    pub fn new(metric: Metric, limit: usize) -> Self {
        Self {
            metric,
            limit,
            status: StatusFilter::All,
        }
    }

    pub fn with_status(mut self, status: StatusFilter) -> Self {
        self.status = status;
        self
    }
}

/// Total order used for ranking: metric descending, then identity ascending.
fn rank_order(metric: Metric, a: &ProcessAccumulator, b: &ProcessAccumulator) -> Ordering {
    metric
        .compare(a, b)
        .then_with(|| a.identity.cmp(&b.identity))
}

/// Top `query.limit` entries by `query.metric`.
///
/// Partially selects the first `limit` before sorting, so a small limit over
/// a large table does not sort the whole table.
pub fn top<'a, I>(entries: I, query: &RankingQuery) -> Vec<ProcessAccumulator>
where
    I: IntoIterator<Item = &'a ProcessAccumulator>,
{
    if query.limit == 0 {
        return Vec::new();
    }

    let mut candidates: Vec<&ProcessAccumulator> = entries
        .into_iter()
        .filter(|e| query.status.admits(e))
        .collect();

    let order =
        |a: &&ProcessAccumulator, b: &&ProcessAccumulator| rank_order(query.metric, a, b);
    if candidates.len() > query.limit {
        candidates.select_nth_unstable_by(query.limit - 1, order);
        candidates.truncate(query.limit);
    }
    candidates.sort_unstable_by(order);

    candidates.into_iter().cloned().collect()
}

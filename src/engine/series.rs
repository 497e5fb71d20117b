use std::collections::{HashMap, VecDeque};

use serde::Serialize;

use super::identity::ProcessIdentity;
use crate::snapshot::{ProcessSnapshot, SystemSnapshot};

/// A point that a capped series can fold into its neighbour.
pub trait SeriesPoint: Clone {
    /// Combine with the next (newer) point. The result keeps `self`'s timestamp.
    fn merge(&self, newer: &Self) -> Self;
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SystemTimeSeriesPoint {
    pub timestamp: u64,
    pub cpu_average: f64,
    pub memory_used: u64,
    pub network_rx_bytes: u64,
    pub network_tx_bytes: u64,
    pub disk_io_read_bytes: u64,
    pub disk_io_write_bytes: u64,
}

impl SystemTimeSeriesPoint {
    pub fn from_snapshot(timestamp: u64, snapshot: &SystemSnapshot) -> Self {
        Self {
            timestamp,
            cpu_average: cpu_average(&snapshot.cpu_usage),
            memory_used: snapshot.memory_used,
            network_rx_bytes: snapshot.network_rx_bytes,
            network_tx_bytes: snapshot.network_tx_bytes,
            disk_io_read_bytes: snapshot.disk_io_read_bytes,
            disk_io_write_bytes: snapshot.disk_io_write_bytes,
        }
    }
}

impl SeriesPoint for SystemTimeSeriesPoint {
    fn merge(&self, newer: &Self) -> Self {
        Self {
            timestamp: self.timestamp,
            cpu_average: (self.cpu_average + newer.cpu_average) / 2.0,
            memory_used: mean(self.memory_used, newer.memory_used),
            network_rx_bytes: mean(self.network_rx_bytes, newer.network_rx_bytes),
            network_tx_bytes: mean(self.network_tx_bytes, newer.network_tx_bytes),
            disk_io_read_bytes: mean(self.disk_io_read_bytes, newer.disk_io_read_bytes),
            disk_io_write_bytes: mean(self.disk_io_write_bytes, newer.disk_io_write_bytes),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProcessTimeSeriesPoint {
    pub timestamp: u64,
    pub cpu_usage: f32,
    pub memory_usage: u64,
    pub disk_read: u64,
    pub disk_write: u64,
}

impl ProcessTimeSeriesPoint {
    pub fn from_snapshot(timestamp: u64, snapshot: &ProcessSnapshot) -> Self {
        Self {
            timestamp,
            cpu_usage: snapshot.cpu_usage,
            memory_usage: snapshot.memory_usage,
            disk_read: snapshot.disk_usage.read_bytes,
            disk_write: snapshot.disk_usage.written_bytes,
        }
    }
}

impl SeriesPoint for ProcessTimeSeriesPoint {
    fn merge(&self, newer: &Self) -> Self {
        Self {
            timestamp: self.timestamp,
            cpu_usage: (self.cpu_usage + newer.cpu_usage) / 2.0,
            memory_usage: mean(self.memory_usage, newer.memory_usage),
            disk_read: mean(self.disk_read, newer.disk_read),
            disk_write: mean(self.disk_write, newer.disk_write),
        }
    }
}

/// Mean of per-core usage; 0.0 when there are no cores.
pub fn cpu_average(cores: &[f32]) -> f64 {
    if cores.is_empty() {
        return 0.0;
    }
    cores.iter().map(|&c| f64::from(c)).sum::<f64>() / cores.len() as f64
}

fn mean(a: u64, b: u64) -> u64 {
    ((u128::from(a) + u128::from(b)) / 2) as u64
}

/// How a full series makes room for a new point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Downsample {
    #[default]
    DropOldest,
    /// Fold the two oldest points into one, so early history fades instead
    /// of disappearing.
    AverageOldestPair,
}

impl Downsample {
    pub fn from_str_config(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "average-oldest-pair" | "average" => Downsample::AverageOldestPair,
            _ => Downsample::DropOldest,
        }
    }
}

/// Size bound for a series. `max_points: None` keeps every point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SeriesLimits {
    pub max_points: Option<usize>,
    pub downsample: Downsample,
}

impl SeriesLimits {
    pub fn capped(max_points: usize) -> Self {
        Self {
            max_points: Some(max_points),
            downsample: Downsample::DropOldest,
        }
    }
}

/// Append-only, time-ordered series, optionally bounded.
#[derive(Clone, Debug)]
pub struct Series<T> {
    points: VecDeque<T>,
    limits: SeriesLimits,
}

impl<T: SeriesPoint> Series<T> {
    pub fn new(limits: SeriesLimits) -> Self {
        let points = match limits.max_points {
            Some(cap) => VecDeque::with_capacity(cap),
            None => VecDeque::new(),
        };
        Self { points, limits }
    }

    pub fn push(&mut self, point: T) {
        if let Some(cap) = self.limits.max_points {
            if cap == 0 {
                return;
            }
            while self.points.len() >= cap {
                self.make_room();
            }
        }
        self.points.push_back(point);
    }

    fn make_room(&mut self) {
        match self.limits.downsample {
            Downsample::AverageOldestPair if self.points.len() >= 2 => {
                if let (Some(oldest), Some(next)) =
                    (self.points.pop_front(), self.points.pop_front())
                {
                    self.points.push_front(oldest.merge(&next));
                }
            }
            _ => {
                self.points.pop_front();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest(&self) -> Option<&T> {
        self.points.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.points.iter()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.points.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}

/// Per-identity process series.
#[derive(Clone, Debug)]
pub struct ProcessSeriesStore {
    entries: HashMap<ProcessIdentity, Series<ProcessTimeSeriesPoint>>,
    limits: SeriesLimits,
}

impl ProcessSeriesStore {
    pub fn new(limits: SeriesLimits) -> Self {
        Self {
            entries: HashMap::new(),
            limits,
        }
    }

    pub fn append(&mut self, identity: ProcessIdentity, point: ProcessTimeSeriesPoint) {
        self.entries
            .entry(identity)
            .or_insert_with(|| Series::new(self.limits))
            .push(point);
    }

    pub fn get(&self, identity: &ProcessIdentity) -> Option<&Series<ProcessTimeSeriesPoint>> {
        self.entries.get(identity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn clear_one(&mut self, identity: &ProcessIdentity) -> bool {
        self.entries.remove(identity).is_some()
    }
}

impl Default for ProcessSeriesStore {
    fn default() -> Self {
        Self::new(SeriesLimits::default())
    }
}

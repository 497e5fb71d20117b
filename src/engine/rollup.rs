use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::identity::ProcessIdentity;
use crate::snapshot::ProcessSnapshot;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ProcessStatus {
    Alive,
    Dead,
}

/// Lifetime statistics for one process identity.
///
/// Records are values: a tick produces a new record from the previous one
/// and the table swaps it in, so a record is never observed half-merged.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProcessAccumulator {
    pub identity: ProcessIdentity,
    pub ppid: u32,
    pub parent_start_time: u64,
    pub name: String,
    pub command: String,
    pub user: String,
    pub total_cpu_usage: f64,
    pub max_memory_usage: u64,
    pub total_disk_read: u64,
    pub total_disk_write: u64,
    pub sample_count: u64,
    pub first_seen: u64,
    pub last_seen: u64,
    pub status: ProcessStatus,
}

impl ProcessAccumulator {
    pub fn first(sample: &ProcessSnapshot, parent_start_time: u64, timestamp: u64) -> Self {
        Self {
            identity: ProcessIdentity::of(sample),
            ppid: sample.ppid,
            parent_start_time,
            name: sample.name.clone(),
            command: sample.command.clone(),
            user: sample.user.clone(),
            total_cpu_usage: f64::from(sample.cpu_usage),
            max_memory_usage: sample.memory_usage,
            total_disk_read: sample.disk_usage.read_bytes,
            total_disk_write: sample.disk_usage.written_bytes,
            sample_count: 1,
            first_seen: timestamp,
            last_seen: timestamp,
            status: ProcessStatus::Alive,
        }
    }

    /// Merge one more sample of the same identity.
    ///
    /// A tombstoned identity stays `Dead` even if the provider reports it
    /// again; the sample is still counted.
    pub fn rolled_up(
        &self,
        sample: &ProcessSnapshot,
        parent_start_time: u64,
        timestamp: u64,
    ) -> Self {
        Self {
            identity: self.identity,
            ppid: sample.ppid,
            parent_start_time,
            name: sample.name.clone(),
            command: sample.command.clone(),
            user: sample.user.clone(),
            total_cpu_usage: self.total_cpu_usage + f64::from(sample.cpu_usage),
            max_memory_usage: self.max_memory_usage.max(sample.memory_usage),
            total_disk_read: self
                .total_disk_read
                .saturating_add(sample.disk_usage.read_bytes),
            total_disk_write: self
                .total_disk_write
                .saturating_add(sample.disk_usage.written_bytes),
            sample_count: self.sample_count + 1,
            first_seen: self.first_seen,
            last_seen: timestamp.max(self.last_seen),
            status: self.status,
        }
    }

    pub fn average_cpu_usage(&self) -> f64 {
        if self.sample_count == 0 {
            return 0.0;
        }
        self.total_cpu_usage / self.sample_count as f64
    }

    pub fn is_alive(&self) -> bool {
        self.status == ProcessStatus::Alive
    }
}

/// What happens to an accumulator when its identity vanishes from a tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Keep a `Dead` tombstone and its history until an explicit clear or sweep.
    #[default]
    RetainForever,
    /// Drop the accumulator and its process series on the tick it vanishes.
    EvictOnDisappearance,
}

impl RetentionPolicy {
    pub fn from_str_config(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "evict" | "evict-on-disappearance" => RetentionPolicy::EvictOnDisappearance,
            _ => RetentionPolicy::RetainForever,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct RollupTable {
    entries: HashMap<ProcessIdentity, ProcessAccumulator>,
}

impl RollupTable {
    pub fn get(&self, identity: &ProcessIdentity) -> Option<&ProcessAccumulator> {
        self.entries.get(identity)
    }

    /// All entries ordered by identity.
    pub fn get_all(&self) -> Vec<ProcessAccumulator> {
        let mut all: Vec<ProcessAccumulator> = self.entries.values().cloned().collect();
        all.sort_unstable_by_key(|entry| entry.identity);
        all
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessAccumulator> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn alive_count(&self) -> usize {
        self.entries.values().filter(|e| e.is_alive()).count()
    }

    pub fn dead_count(&self) -> usize {
        self.len() - self.alive_count()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn insert(&mut self, entry: ProcessAccumulator) {
        self.entries.insert(entry.identity, entry);
    }

    pub(crate) fn remove(&mut self, identity: &ProcessIdentity) -> Option<ProcessAccumulator> {
        self.entries.remove(identity)
    }

    /// Alive identities missing from `present`.
    pub(crate) fn vanished(&self, present: &HashSet<ProcessIdentity>) -> Vec<ProcessIdentity> {
        self.entries
            .values()
            .filter(|e| e.is_alive() && !present.contains(&e.identity))
            .map(|e| e.identity)
            .collect()
    }

    pub(crate) fn mark_dead(&mut self, identity: &ProcessIdentity) {
        if let Some(entry) = self.entries.get_mut(identity) {
            entry.status = ProcessStatus::Dead;
        }
    }

    /// Remove tombstones last seen strictly before `cutoff`.
    pub(crate) fn sweep_dead(&mut self, cutoff: u64) -> Vec<ProcessIdentity> {
        let doomed: Vec<ProcessIdentity> = self
            .entries
            .values()
            .filter(|e| !e.is_alive() && e.last_seen < cutoff)
            .map(|e| e.identity)
            .collect();
        for identity in &doomed {
            self.entries.remove(identity);
        }
        doomed
    }
}

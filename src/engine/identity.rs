use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use super::rollup::RollupTable;
use crate::snapshot::ProcessSnapshot;

/// Well-known pid of the init process. Never looked up in history.
pub const ROOT_PID: u32 = 1;

/// Parent start time recorded when no parent could be resolved.
pub const NO_PARENT: u64 = 0;

/// Durable name of one process instance. The start time disambiguates a
/// reused pid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ProcessIdentity {
    pub pid: u32,
    pub start_time: u64,
}

impl ProcessIdentity {
    pub fn new(pid: u32, start_time: u64) -> Self {
        Self { pid, start_time }
    }

    pub fn of(snapshot: &ProcessSnapshot) -> Self {
        Self::new(snapshot.pid, snapshot.start_time)
    }
}

impl fmt::Display for ProcessIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.pid, self.start_time)
    }
}

/// Resolves parent start times for one tick.
///
/// Both indexes are built once per tick: the current snapshot list by pid,
/// and the accumulator table by pid keeping only the most recently seen
/// instance (latest `last_seen`, then latest `start_time`).
pub struct ParentResolver {
    current: HashMap<u32, u64>,
    historical: HashMap<u32, (u64, u64)>,
}

impl ParentResolver {
    pub fn new(processes: &[ProcessSnapshot], table: &RollupTable) -> Self {
        let current = processes
            .iter()
            .map(|p| (p.pid, p.start_time))
            .collect();

        let mut historical: HashMap<u32, (u64, u64)> = HashMap::new();
        for entry in table.iter() {
            let candidate = (entry.last_seen, entry.identity.start_time);
            historical
                .entry(entry.identity.pid)
                .and_modify(|best| {
                    if candidate > *best {
                        *best = candidate;
                    }
                })
                .or_insert(candidate);
        }

        Self {
            current,
            historical,
        }
    }

    /// Start time of the parent of a process whose parent pid is `ppid`, or
    /// [`NO_PARENT`].
    pub fn resolve(&self, ppid: u32) -> u64 {
        if let Some(&start_time) = self.current.get(&ppid) {
            return start_time;
        }
        if ppid == 0 || ppid == ROOT_PID {
            return NO_PARENT;
        }
        self.historical
            .get(&ppid)
            .map(|&(_, start_time)| start_time)
            .unwrap_or(NO_PARENT)
    }
}

/// Walk parent links through the table, starting at `identity`.
///
/// The chain starts with `identity` itself and ends at the furthest ancestor
/// still tracked. Empty when `identity` is unknown.
pub fn ancestry(table: &RollupTable, identity: ProcessIdentity) -> Vec<ProcessIdentity> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut cursor = identity;

    while let Some(entry) = table.get(&cursor) {
        if !seen.insert(cursor) {
            break;
        }
        chain.push(cursor);
        if entry.parent_start_time == NO_PARENT {
            break;
        }
        cursor = ProcessIdentity::new(entry.ppid, entry.parent_start_time);
    }

    chain
}

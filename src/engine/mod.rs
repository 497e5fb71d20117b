//! Process rollup engine.
//!
//! One [`Engine`] owns the accumulator table and both time-series stores.
//! A single writer ingests one tick at a time; readers always see the state
//! of the last committed tick, never a tick in flight.

pub mod error;
pub mod identity;
pub mod ranking;
pub mod rollup;
pub mod series;
mod validate;

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::broadcast;

use crate::snapshot::{ProcessSnapshot, SnapshotProvider, SystemSnapshot};

pub use error::{IngestError, Violation};
pub use identity::ProcessIdentity;
pub use ranking::{Metric, RankingQuery, StatusFilter};
pub use rollup::{ProcessAccumulator, ProcessStatus, RetentionPolicy, RollupTable};
pub use series::{
    Downsample, ProcessSeriesStore, ProcessTimeSeriesPoint, Series, SeriesLimits,
    SystemTimeSeriesPoint,
};

use identity::ParentResolver;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineConfig {
    pub retention: RetentionPolicy,
    pub system_limits: SeriesLimits,
    pub process_limits: SeriesLimits,
}

/// Outcome of one committed tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// 1-based tick counter since the engine was created.
    pub tick: u64,
    pub timestamp: u64,
    pub observed: usize,
    pub new_identities: usize,
    /// Identities tombstoned this tick.
    pub vanished: usize,
    /// Identities dropped this tick under [`RetentionPolicy::EvictOnDisappearance`].
    pub evicted: usize,
    pub violations: Vec<Violation>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    TickCommitted(TickReport),
    HistoryCleared,
    HistoryClearedFor(ProcessIdentity),
    SystemHistoryCleared,
    Swept { removed: usize },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineSummary {
    pub ticks: u64,
    pub tracked: usize,
    pub alive: usize,
    pub dead: usize,
    pub system_points: usize,
}

struct EngineState {
    table: RollupTable,
    system_series: Series<SystemTimeSeriesPoint>,
    process_series: ProcessSeriesStore,
    ticks: u64,
}

impl EngineState {
    fn new(config: &EngineConfig) -> Self {
        Self {
            table: RollupTable::default(),
            system_series: Series::new(config.system_limits),
            process_series: ProcessSeriesStore::new(config.process_limits),
            ticks: 0,
        }
    }
}

/// Everything one tick changes, computed against the committed state before
/// any of it becomes visible.
struct TickPlan {
    timestamp: u64,
    system_point: SystemTimeSeriesPoint,
    merged: Vec<ProcessAccumulator>,
    points: Vec<(ProcessIdentity, ProcessTimeSeriesPoint)>,
    vanished: Vec<ProcessIdentity>,
    new_identities: usize,
}

pub struct Engine {
    config: EngineConfig,
    state: RwLock<EngineState>,
    /// Held by whichever writer (tick, clear, sweep) is running.
    writer: Mutex<()>,
    events: broadcast::Sender<EngineEvent>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: RwLock::new(EngineState::new(&config)),
            config,
            writer: Mutex::new(()),
            events,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Receive an event after every committed tick and administrative reset.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Sample `provider` and ingest the result. A failed sample leaves the
    /// engine untouched.
    pub fn poll<P>(&self, provider: &mut P) -> Result<TickReport, IngestError>
    where
        P: SnapshotProvider + ?Sized,
    {
        let (processes, system) = provider.sample()?;
        let timestamp = provider.sampled_at().unwrap_or_else(unix_millis);
        self.ingest_at(timestamp, system, processes)
    }

    pub fn ingest(
        &self,
        system: SystemSnapshot,
        processes: Vec<ProcessSnapshot>,
    ) -> Result<TickReport, IngestError> {
        self.ingest_at(unix_millis(), system, processes)
    }

    /// Ingest one tick stamped with `timestamp` (Unix ms).
    pub fn ingest_at(
        &self,
        timestamp: u64,
        mut system: SystemSnapshot,
        mut processes: Vec<ProcessSnapshot>,
    ) -> Result<TickReport, IngestError> {
        let _ingest_span =
            tracing::debug_span!("engine.ingest", processes = processes.len()).entered();

        let _writer = match self.writer.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return Err(IngestError::TickInProgress),
        };

        if let Err(err) = validate::validate(&system, &processes) {
            tracing::warn!(error = %err, "rejecting tick");
            return Err(err);
        }
        let violations = validate::sanitize(&mut system, &mut processes);

        let plan = self.plan(timestamp, &system, &processes);
        let report = self.commit(plan, violations);

        tracing::debug!(
            tick = report.tick,
            observed = report.observed,
            new = report.new_identities,
            vanished = report.vanished,
            evicted = report.evicted,
            "tick committed"
        );
        // No subscribers is fine.
        let _ = self.events.send(EngineEvent::TickCommitted(report.clone()));
        Ok(report)
    }

    fn plan(
        &self,
        timestamp: u64,
        system: &SystemSnapshot,
        processes: &[ProcessSnapshot],
    ) -> TickPlan {
        let state = self.read();
        let resolver = ParentResolver::new(processes, &state.table);

        let mut present = HashSet::with_capacity(processes.len());
        let mut merged = Vec::with_capacity(processes.len());
        let mut points = Vec::with_capacity(processes.len());
        let mut new_identities = 0;

        for process in processes {
            let identity = ProcessIdentity::of(process);
            let parent_start_time = resolver.resolve(process.ppid);
            let next = match state.table.get(&identity) {
                Some(previous) => previous.rolled_up(process, parent_start_time, timestamp),
                None => {
                    new_identities += 1;
                    ProcessAccumulator::first(process, parent_start_time, timestamp)
                }
            };
            present.insert(identity);
            merged.push(next);
            points.push((
                identity,
                ProcessTimeSeriesPoint::from_snapshot(timestamp, process),
            ));
        }

        TickPlan {
            timestamp,
            system_point: SystemTimeSeriesPoint::from_snapshot(timestamp, system),
            merged,
            points,
            vanished: state.table.vanished(&present),
            new_identities,
        }
    }

    fn commit(&self, plan: TickPlan, violations: Vec<Violation>) -> TickReport {
        let mut state = self.write();

        state.system_series.push(plan.system_point);

        let observed = plan.merged.len();
        for entry in plan.merged {
            state.table.insert(entry);
        }

        let mut evicted = 0;
        for identity in &plan.vanished {
            match self.config.retention {
                RetentionPolicy::RetainForever => state.table.mark_dead(identity),
                RetentionPolicy::EvictOnDisappearance => {
                    state.table.remove(identity);
                    state.process_series.clear_one(identity);
                    evicted += 1;
                }
            }
        }

        for (identity, point) in plan.points {
            state.process_series.append(identity, point);
        }

        state.ticks += 1;

        TickReport {
            tick: state.ticks,
            timestamp: plan.timestamp,
            observed,
            new_identities: plan.new_identities,
            vanished: plan.vanished.len() - evicted,
            evicted,
            violations,
        }
    }

    pub fn get(&self, identity: &ProcessIdentity) -> Option<ProcessAccumulator> {
        self.read().table.get(identity).cloned()
    }

    /// Every accumulator, ordered by identity.
    pub fn get_all(&self) -> Vec<ProcessAccumulator> {
        self.read().table.get_all()
    }

    pub fn top_by_metric(&self, metric: Metric, limit: usize) -> Vec<ProcessAccumulator> {
        self.rank(&RankingQuery::new(metric, limit))
    }

    pub fn rank(&self, query: &RankingQuery) -> Vec<ProcessAccumulator> {
        ranking::top(self.read().table.iter(), query)
    }

    /// `identity` followed by its known ancestors, nearest first.
    pub fn ancestry(&self, identity: ProcessIdentity) -> Vec<ProcessIdentity> {
        identity::ancestry(&self.read().table, identity)
    }

    pub fn system_series(&self) -> Vec<SystemTimeSeriesPoint> {
        self.read().system_series.to_vec()
    }

    pub fn latest_system_point(&self) -> Option<SystemTimeSeriesPoint> {
        self.read().system_series.latest().cloned()
    }

    /// Points recorded for `identity`; empty when nothing is held for it.
    pub fn process_series(&self, identity: &ProcessIdentity) -> Vec<ProcessTimeSeriesPoint> {
        self.read()
            .process_series
            .get(identity)
            .map(Series::to_vec)
            .unwrap_or_default()
    }

    pub fn summary(&self) -> EngineSummary {
        let state = self.read();
        let alive = state.table.alive_count();
        EngineSummary {
            ticks: state.ticks,
            tracked: state.table.len(),
            alive,
            dead: state.table.len() - alive,
            system_points: state.system_series.len(),
        }
    }

    /// Drop every accumulator and both series.
    pub fn clear_all_histories(&self) {
        let _writer = self.lock_writer();
        {
            let mut state = self.write();
            state.table.clear();
            state.system_series.clear();
            state.process_series.clear();
        }
        tracing::info!("cleared all histories");
        let _ = self.events.send(EngineEvent::HistoryCleared);
    }

    /// Drop the accumulator and process series of one identity. Returns
    /// whether anything was held for it.
    pub fn clear_history(&self, identity: &ProcessIdentity) -> bool {
        let _writer = self.lock_writer();
        let removed = {
            let mut state = self.write();
            let had_entry = state.table.remove(identity).is_some();
            let had_series = state.process_series.clear_one(identity);
            had_entry || had_series
        };
        if removed {
            tracing::info!(%identity, "cleared process history");
            let _ = self.events.send(EngineEvent::HistoryClearedFor(*identity));
        }
        removed
    }

    pub fn clear_system_history(&self) {
        let _writer = self.lock_writer();
        self.write().system_series.clear();
        tracing::info!("cleared system history");
        let _ = self.events.send(EngineEvent::SystemHistoryCleared);
    }

    /// Delete tombstones (and their series) last seen before `cutoff` (Unix ms).
    pub fn sweep_dead(&self, cutoff: u64) -> usize {
        let _writer = self.lock_writer();
        let removed = {
            let mut state = self.write();
            let doomed = state.table.sweep_dead(cutoff);
            for identity in &doomed {
                state.process_series.clear_one(identity);
            }
            doomed.len()
        };
        if removed > 0 {
            tracing::info!(removed, cutoff, "swept dead accumulators");
            let _ = self.events.send(EngineEvent::Swept { removed });
        }
        removed
    }

    fn read(&self) -> RwLockReadGuard<'_, EngineState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, EngineState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_writer(&self) -> std::sync::MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

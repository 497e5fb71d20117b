use std::collections::{BTreeMap, HashMap, HashSet};

use proctally::engine::{
    Engine, Metric, ProcessIdentity, ProcessStatus, ProcessTimeSeriesPoint, Series, SeriesLimits,
};
use proctally::snapshot::{DiskUsage, ProcessSnapshot, SystemSnapshot};
use proptest::prelude::*;

fn snapshot(pid: u32, memory: u64, cpu: f32) -> ProcessSnapshot {
    ProcessSnapshot {
        pid,
        ppid: if pid == 1 { 0 } else { 1 },
        start_time: u64::from(pid) * 10,
        name: format!("p{pid}"),
        command: format!("p{pid} --serve"),
        user: "tester".to_string(),
        cpu_usage: cpu,
        memory_usage: memory,
        disk_usage: DiskUsage {
            read_bytes: memory / 2,
            written_bytes: memory / 3,
        },
        status: "Run".to_string(),
    }
}

fn identity(pid: u32) -> ProcessIdentity {
    ProcessIdentity::new(pid, u64::from(pid) * 10)
}

/// Each tick maps pid -> (memory, cpu); pids within a tick are unique.
fn ticks() -> impl Strategy<Value = Vec<BTreeMap<u32, (u64, f32)>>> {
    prop::collection::vec(
        prop::collection::btree_map(1u32..=8, (0u64..10_000, 0.0f32..100.0), 0..8),
        1..20,
    )
}

proptest! {
    #[test]
    fn accumulators_track_presence(ticks in ticks()) {
        let engine = Engine::default();
        let mut expected_count: HashMap<u32, u64> = HashMap::new();
        let mut expected_dead: HashSet<u32> = HashSet::new();
        let mut last_max: HashMap<u32, u64> = HashMap::new();

        for (i, tick) in ticks.iter().enumerate() {
            let processes: Vec<ProcessSnapshot> = tick
                .iter()
                .map(|(&pid, &(memory, cpu))| snapshot(pid, memory, cpu))
                .collect();
            engine
                .ingest_at(i as u64 + 1, SystemSnapshot::default(), processes)
                .unwrap();

            for pid in tick.keys() {
                *expected_count.entry(*pid).or_default() += 1;
            }
            for pid in expected_count.keys() {
                if !tick.contains_key(pid) {
                    expected_dead.insert(*pid);
                }
            }

            for (&pid, &count) in &expected_count {
                let entry = engine.get(&identity(pid)).unwrap();
                prop_assert_eq!(entry.sample_count, count);

                let want = if expected_dead.contains(&pid) {
                    ProcessStatus::Dead
                } else {
                    ProcessStatus::Alive
                };
                prop_assert_eq!(entry.status, want);

                let previous = last_max.insert(pid, entry.max_memory_usage).unwrap_or(0);
                prop_assert!(entry.max_memory_usage >= previous);
            }
            prop_assert_eq!(engine.summary().tracked, expected_count.len());
            prop_assert_eq!(engine.system_series().len(), i + 1);
        }
    }

    #[test]
    fn ranking_ignores_input_order(
        rows in prop::collection::btree_map(1u32..200, (0u64..4, 0u32..4), 1..40),
        limit in 0usize..50,
    ) {
        // Few distinct values so ties are common.
        let processes: Vec<ProcessSnapshot> = rows
            .iter()
            .map(|(&pid, &(memory, cpu))| snapshot(pid, memory, cpu as f32))
            .collect();
        let mut reversed = processes.clone();
        reversed.reverse();

        let forward = Engine::default();
        forward.ingest_at(1, SystemSnapshot::default(), processes).unwrap();
        let backward = Engine::default();
        backward.ingest_at(1, SystemSnapshot::default(), reversed).unwrap();

        for metric in Metric::ALL {
            let a = forward.top_by_metric(metric, limit);
            let b = backward.top_by_metric(metric, limit);
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(a.len(), limit.min(rows.len()));
        }

        let mut reference = forward.get_all();
        reference.sort_by(|a, b| {
            b.max_memory_usage
                .cmp(&a.max_memory_usage)
                .then_with(|| a.identity.cmp(&b.identity))
        });
        reference.truncate(limit);
        prop_assert_eq!(forward.top_by_metric(Metric::Memory, limit), reference);
    }

    #[test]
    fn capped_series_keeps_newest(cap in 1usize..16, pushes in 0u64..64) {
        let mut series = Series::new(SeriesLimits::capped(cap));
        for t in 0..pushes {
            series.push(ProcessTimeSeriesPoint {
                timestamp: t,
                cpu_usage: 0.0,
                memory_usage: t,
                disk_read: 0,
                disk_write: 0,
            });
        }
        let kept: Vec<u64> = series.iter().map(|p| p.timestamp).collect();
        let first = pushes.saturating_sub(cap as u64);
        prop_assert_eq!(kept, (first..pushes).collect::<Vec<_>>());
    }
}

#[test]
fn reused_pid_with_dead_parent_resolves_to_latest_instance() {
    let engine = Engine::default();
    let parent_v1 = ProcessSnapshot {
        start_time: 100,
        ..snapshot(40, 1, 0.0)
    };
    let parent_v2 = ProcessSnapshot {
        start_time: 500,
        ..snapshot(40, 1, 0.0)
    };
    let child = ProcessSnapshot {
        ppid: 40,
        start_time: 900,
        ..snapshot(41, 1, 0.0)
    };

    engine
        .ingest_at(1, SystemSnapshot::default(), vec![parent_v1])
        .unwrap();
    engine
        .ingest_at(2, SystemSnapshot::default(), vec![parent_v2])
        .unwrap();
    // both instances of pid 40 are gone when the child shows up
    engine
        .ingest_at(3, SystemSnapshot::default(), vec![child])
        .unwrap();

    let entry = engine.get(&ProcessIdentity::new(41, 900)).unwrap();
    assert_eq!(entry.parent_start_time, 500);
}

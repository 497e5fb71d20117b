use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use proctally::engine::{Engine, EngineEvent};
use proctally::snapshot::{DiskUsage, ProcessSnapshot, SystemSnapshot};

const PROCESSES: u32 = 64;
const TICKS: u64 = 200;

fn tick(n: u64) -> Vec<ProcessSnapshot> {
    (1..=PROCESSES)
        .map(|pid| ProcessSnapshot {
            pid,
            ppid: 1,
            start_time: u64::from(pid),
            name: format!("w{pid}"),
            command: String::new(),
            user: "tester".to_string(),
            cpu_usage: 1.0,
            memory_usage: n,
            disk_usage: DiskUsage::default(),
            status: "Run".to_string(),
        })
        .collect()
}

#[test]
fn readers_never_observe_a_partial_tick() {
    let engine = Arc::new(Engine::default());
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    let all = engine.get_all();
                    let Some(first) = all.first() else {
                        continue;
                    };
                    // every process is present in every tick, so a committed
                    // state has one sample count and one peak across the table
                    assert!(all.iter().all(|e| e.sample_count == first.sample_count));
                    assert!(all.iter().all(|e| e.max_memory_usage == first.max_memory_usage));
                    assert_eq!(all.len(), PROCESSES as usize);
                }
            })
        })
        .collect();

    let mut events = engine.subscribe();
    for n in 1..=TICKS {
        engine
            .ingest_at(n, SystemSnapshot::default(), tick(n))
            .unwrap();
    }
    done.store(true, Ordering::Relaxed);
    for reader in readers {
        reader.join().unwrap();
    }

    let summary = engine.summary();
    assert_eq!(summary.ticks, TICKS);
    assert_eq!(summary.alive, PROCESSES as usize);

    // the channel keeps only the most recent events
    let mut last_tick = 0;
    loop {
        match events.try_recv() {
            Ok(EngineEvent::TickCommitted(report)) => last_tick = report.tick,
            Ok(_) => {}
            Err(tokio::sync::broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    assert_eq!(last_tick, TICKS);
}

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use proctally::engine::{Engine, EngineConfig, Metric, SeriesLimits};
use proctally::snapshot::{DiskUsage, ProcessSnapshot, SystemSnapshot};
use std::hint::black_box;

fn make_processes(n: usize, tick: u64) -> Vec<ProcessSnapshot> {
    (0..n)
        .map(|i| {
            let pid = i as u32 + 1;
            let ppid = if i == 0 { 0 } else { (i as u32 / 2) + 1 };
            ProcessSnapshot {
                pid,
                ppid,
                start_time: u64::from(pid) * 7,
                name: format!("proc_{i}"),
                command: format!("proc_{i} --work"),
                user: format!("u{}", i % 8),
                cpu_usage: ((i as u64 + tick) % 100) as f32,
                memory_usage: ((n - i) as u64 + 1) * 1024,
                disk_usage: DiskUsage {
                    read_bytes: (i as u64 % 13) * 512,
                    written_bytes: (i as u64 % 7) * 512,
                },
                status: "Run".to_string(),
            }
        })
        .collect()
}

fn make_system() -> SystemSnapshot {
    SystemSnapshot {
        cpu_usage: vec![25.0; 8],
        memory_used: 8 * 1024 * 1024 * 1024,
        ..SystemSnapshot::default()
    }
}

fn bench_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest_500_1000_2000");

    for size in [500usize, 1000, 2000] {
        let processes = make_processes(size, 0);
        group.bench_with_input(
            BenchmarkId::from_parameter(size),
            &processes,
            |b, processes| {
                let engine = Engine::new(EngineConfig {
                    system_limits: SeriesLimits::capped(120),
                    process_limits: SeriesLimits::capped(120),
                    ..EngineConfig::default()
                });
                let mut tick = 0;
                b.iter(|| {
                    tick += 1;
                    let report = engine
                        .ingest_at(tick, make_system(), black_box(processes.clone()))
                        .expect("bench tick rejected");
                    black_box(report);
                })
            },
        );
    }

    group.finish();
}

fn bench_ranking(c: &mut Criterion) {
    let mut group = c.benchmark_group("top10_500_1000_2000");

    for size in [500usize, 1000, 2000] {
        let engine = Engine::default();
        for tick in 1..=10 {
            engine
                .ingest_at(tick, make_system(), make_processes(size, tick))
                .expect("bench tick rejected");
        }
        group.bench_with_input(BenchmarkId::from_parameter(size), &engine, |b, engine| {
            b.iter(|| {
                for metric in Metric::ALL {
                    black_box(engine.top_by_metric(black_box(metric), 10));
                }
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_ingest, bench_ranking);
criterion_main!(benches);

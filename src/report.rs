use std::fmt::Write;

use crate::engine::{
    EngineSummary, Metric, ProcessAccumulator, ProcessStatus, SystemTimeSeriesPoint, TickReport,
};
use crate::format::{format_bytes, format_cpu_total, format_rate, pad_unicode};

const NAME_WIDTH: usize = 24;
const USER_WIDTH: usize = 10;

fn metric_cell(metric: Metric, entry: &ProcessAccumulator) -> String {
    match metric {
        Metric::Cpu => format_cpu_total(entry.total_cpu_usage),
        Metric::Memory => format_bytes(entry.max_memory_usage),
        Metric::DiskRead => format_bytes(entry.total_disk_read),
        Metric::DiskWrite => format_bytes(entry.total_disk_write),
        Metric::AverageCpu => format!("{:.1} %", entry.average_cpu_usage()),
    }
}

fn status_cell(status: ProcessStatus) -> &'static str {
    match status {
        ProcessStatus::Alive => "alive",
        ProcessStatus::Dead => "dead",
    }
}

/// Plain-text report printed after a committed tick.
pub fn render(
    tick: &TickReport,
    summary: &EngineSummary,
    latest: Option<&SystemTimeSeriesPoint>,
    metric: Metric,
    top: &[ProcessAccumulator],
) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "tick {} | {} processes ({} new, {} exited, {} evicted) | tracked {} ({} alive, {} dead)",
        tick.tick,
        tick.observed,
        tick.new_identities,
        tick.vanished,
        tick.evicted,
        summary.tracked,
        summary.alive,
        summary.dead,
    );

    if let Some(point) = latest {
        let _ = writeln!(
            out,
            "cpu {:.1}% | mem {} | net rx {} tx {} | disk r {} w {}",
            point.cpu_average,
            format_bytes(point.memory_used),
            format_rate(point.network_rx_bytes),
            format_rate(point.network_tx_bytes),
            format_bytes(point.disk_io_read_bytes),
            format_bytes(point.disk_io_write_bytes),
        );
    }

    for violation in &tick.violations {
        let _ = writeln!(out, "warning: {violation}");
    }

    let _ = writeln!(out, "top {} by {}:", top.len(), metric);
    let _ = writeln!(
        out,
        "{:>4}  {:>7}  {}  {}  {:<5}  {:>7}  {:>12}",
        "#",
        "PID",
        pad_unicode("NAME", NAME_WIDTH),
        pad_unicode("USER", USER_WIDTH),
        "STATE",
        "SAMPLES",
        metric.label().to_uppercase(),
    );
    for (rank, entry) in top.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>4}  {:>7}  {}  {}  {:<5}  {:>7}  {:>12}",
            rank + 1,
            entry.identity.pid,
            pad_unicode(&entry.name, NAME_WIDTH),
            pad_unicode(&entry.user, USER_WIDTH),
            status_cell(entry.status),
            entry.sample_count,
            metric_cell(metric, entry),
        );
    }

    out
}

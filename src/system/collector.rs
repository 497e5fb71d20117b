use std::time::Instant;

use sysinfo::{Networks, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind, Users};

use crate::snapshot::{DiskUsage, ProcessSnapshot, ProviderError, SnapshotProvider, SystemSnapshot};

/// Live snapshot provider backed by `sysinfo`.
pub struct Collector {
    sys: System,
    networks: Networks,
    users: Users,
    /// Instant and cumulative (rx, tx) byte counters at the previous sample.
    last_network: (Instant, u64, u64),
}

impl Default for Collector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_cpu_all();
        sys.refresh_processes_specifics(ProcessesToUpdate::All, true, Self::refresh_kind());

        let networks = Networks::new_with_refreshed_list();
        let (rx, tx) = network_totals(&networks);

        Collector {
            sys,
            networks,
            users: Users::new_with_refreshed_list(),
            last_network: (Instant::now(), rx, tx),
        }
    }

    fn refresh_kind() -> ProcessRefreshKind {
        ProcessRefreshKind::nothing()
            .with_memory()
            .with_cpu()
            .with_disk_usage()
            .with_user(UpdateKind::OnlyIfNotSet)
    }

    pub fn refresh(&mut self) -> (Vec<ProcessSnapshot>, SystemSnapshot) {
        let _refresh_span = tracing::debug_span!("collector.refresh").entered();

        self.sys.refresh_memory();
        self.sys.refresh_cpu_all();
        self.sys
            .refresh_processes_specifics(ProcessesToUpdate::All, true, Self::refresh_kind());
        self.networks.refresh(true);

        let processes = self.build_processes();
        let system = self.build_system(&processes);
        (processes, system)
    }

    fn build_processes(&self) -> Vec<ProcessSnapshot> {
        let mut processes = Vec::with_capacity(self.sys.processes().len());

        for (pid, process) in self.sys.processes() {
            let command = process
                .cmd()
                .iter()
                .map(|s| s.to_string_lossy().to_string())
                .collect::<Vec<_>>()
                .join(" ");

            let user = process
                .user_id()
                .map(|uid| {
                    self.users
                        .get_user_by_id(uid)
                        .map(|u| u.name().to_string())
                        .unwrap_or_else(|| format!("{uid:?}"))
                })
                .unwrap_or_default();

            let disk = process.disk_usage();

            processes.push(ProcessSnapshot {
                pid: pid.as_u32(),
                ppid: process.parent().map(|p| p.as_u32()).unwrap_or(0),
                start_time: process.start_time(),
                name: process.name().to_string_lossy().to_string(),
                command,
                user,
                cpu_usage: process.cpu_usage(),
                memory_usage: process.memory(),
                disk_usage: DiskUsage {
                    read_bytes: disk.read_bytes,
                    written_bytes: disk.written_bytes,
                },
                status: format!("{:?}", process.status()),
            });
        }

        processes
    }

    fn build_system(&mut self, processes: &[ProcessSnapshot]) -> SystemSnapshot {
        let (network_rx_bytes, network_tx_bytes) = self.network_rates();
        let (disk_io_read_bytes, disk_io_write_bytes) =
            processes.iter().fold((0u64, 0u64), |(read, write), p| {
                (
                    read.saturating_add(p.disk_usage.read_bytes),
                    write.saturating_add(p.disk_usage.written_bytes),
                )
            });

        SystemSnapshot {
            cpu_usage: self.sys.cpus().iter().map(|cpu| cpu.cpu_usage()).collect(),
            memory_used: self.sys.used_memory(),
            network_rx_bytes,
            network_tx_bytes,
            disk_io_read_bytes,
            disk_io_write_bytes,
        }
    }

    /// Bytes per second received and sent since the previous sample.
    fn network_rates(&mut self) -> (u64, u64) {
        let (rx, tx) = network_totals(&self.networks);
        let (since, last_rx, last_tx) = self.last_network;
        let elapsed = since.elapsed().as_secs_f64();
        self.last_network = (Instant::now(), rx, tx);

        if elapsed <= 0.0 {
            return (0, 0);
        }
        (
            (rx.saturating_sub(last_rx) as f64 / elapsed) as u64,
            (tx.saturating_sub(last_tx) as f64 / elapsed) as u64,
        )
    }
}

fn network_totals(networks: &Networks) -> (u64, u64) {
    networks.iter().fold((0, 0), |(rx, tx), (_, data)| {
        (
            rx + data.total_received(),
            tx + data.total_transmitted(),
        )
    })
}

impl SnapshotProvider for Collector {
    fn sample(&mut self) -> Result<(Vec<ProcessSnapshot>, SystemSnapshot), ProviderError> {
        let (processes, system) = self.refresh();
        if processes.is_empty() {
            return Err(ProviderError::Unavailable(
                "process table came back empty".to_string(),
            ));
        }
        Ok((processes, system))
    }
}

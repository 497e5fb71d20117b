use std::collections::HashSet;

use super::error::{IngestError, Violation};
use crate::snapshot::{ProcessSnapshot, SystemSnapshot};

/// Reject a tick that cannot be merged at all. Runs before any state is touched.
pub(crate) fn validate(
    system: &SystemSnapshot,
    processes: &[ProcessSnapshot],
) -> Result<(), IngestError> {
    if let Some(core) = system.cpu_usage.iter().find(|c| !c.is_finite()) {
        return Err(IngestError::malformed(
            None,
            format!("per-core cpu usage is not finite ({core})"),
        ));
    }

    let mut pids = HashSet::with_capacity(processes.len());
    for process in processes {
        if !process.cpu_usage.is_finite() {
            return Err(IngestError::malformed(
                Some(process.pid),
                format!("cpu usage is not finite ({})", process.cpu_usage),
            ));
        }
        if !pids.insert(process.pid) {
            return Err(IngestError::malformed(
                Some(process.pid),
                "pid reported twice in one tick",
            ));
        }
    }

    Ok(())
}

/// Clamp negative readings to zero, returning what was clamped. `-0.0` is
/// normalized to `0.0` silently.
pub(crate) fn sanitize(
    system: &mut SystemSnapshot,
    processes: &mut [ProcessSnapshot],
) -> Vec<Violation> {
    let mut violations = Vec::new();

    for core in system.cpu_usage.iter_mut() {
        if *core < 0.0 {
            violations.push(Violation {
                pid: None,
                field: "cpu_usage",
                value: *core,
            });
        }
        if *core <= 0.0 {
            *core = 0.0;
        }
    }

    for process in processes.iter_mut() {
        if process.cpu_usage < 0.0 {
            violations.push(Violation {
                pid: Some(process.pid),
                field: "cpu_usage",
                value: process.cpu_usage,
            });
        }
        if process.cpu_usage <= 0.0 {
            process.cpu_usage = 0.0;
        }
    }

    for violation in &violations {
        tracing::warn!(%violation, "invariant violation in snapshot");
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::DiskUsage;

    fn process(pid: u32, cpu: f32) -> ProcessSnapshot {
        ProcessSnapshot {
            pid,
            ppid: 1,
            start_time: 100,
            name: "p".into(),
            command: String::new(),
            user: String::new(),
            cpu_usage: cpu,
            memory_usage: 0,
            disk_usage: DiskUsage::default(),
            status: String::new(),
        }
    }

    #[test]
    fn duplicate_pid_is_malformed() {
        let err = validate(&SystemSnapshot::default(), &[process(4, 1.0), process(4, 2.0)]);
        assert!(matches!(
            err,
            Err(IngestError::MalformedSnapshot { pid: Some(4), .. })
        ));
    }

    #[test]
    fn non_finite_values_are_malformed() {
        assert!(validate(&SystemSnapshot::default(), &[process(1, f32::NAN)]).is_err());

        let system = SystemSnapshot {
            cpu_usage: vec![1.0, f32::INFINITY],
            ..SystemSnapshot::default()
        };
        assert!(validate(&system, &[]).is_err());
    }

    #[test]
    fn negative_readings_are_clamped_not_rejected() {
        let mut system = SystemSnapshot {
            cpu_usage: vec![-3.0, 50.0],
            ..SystemSnapshot::default()
        };
        let mut processes = vec![process(1, -0.5), process(2, 7.0)];
        assert!(validate(&system, &processes).is_ok());

        let violations = sanitize(&mut system, &mut processes);
        assert_eq!(violations.len(), 2);
        assert_eq!(system.cpu_usage, vec![0.0, 50.0]);
        assert_eq!(processes[0].cpu_usage, 0.0);
        assert_eq!(processes[1].cpu_usage, 7.0);
        assert_eq!(violations[1].pid, Some(1));
    }

    #[test]
    fn negative_zero_is_normalized_without_violation() {
        let mut system = SystemSnapshot {
            cpu_usage: vec![-0.0],
            ..SystemSnapshot::default()
        };
        let mut processes = vec![process(1, -0.0)];

        let violations = sanitize(&mut system, &mut processes);
        assert!(violations.is_empty());
        assert!(system.cpu_usage[0].is_sign_positive());
        assert!(processes[0].cpu_usage.is_sign_positive());
    }
}

//! Per-process resource rollup over periodic snapshots.
//!
//! Snapshot providers in [`system`] produce raw ticks; the [`engine`] folds
//! them into lifetime accumulators keyed by `(pid, start_time)`, keeps system
//! and per-process time series, and ranks processes by any accumulated metric.

pub mod config;
pub mod engine;
pub mod event;
pub mod format;
pub mod logging;
pub mod report;
pub mod snapshot;
pub mod system;

//! Snapshot providers: live sampling through `sysinfo` and replay of
//! recorded captures.

pub mod collector;
pub mod replay;

pub use collector::Collector;
pub use replay::{RecordedTick, Recorder, ReplayProvider};

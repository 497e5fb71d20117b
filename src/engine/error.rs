use std::fmt;

use thiserror::Error;

use crate::snapshot::ProviderError;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("snapshot provider failed: {0}")]
    Provider(ProviderError),

    #[error("malformed snapshot{}: {reason}", pid_suffix(.pid))]
    MalformedSnapshot { pid: Option<u32>, reason: String },

    #[error("another tick is still being ingested")]
    TickInProgress,
}

fn pid_suffix(pid: &Option<u32>) -> String {
    pid.map(|p| format!(" (pid {p})")).unwrap_or_default()
}

impl IngestError {
    pub(crate) fn malformed(pid: Option<u32>, reason: impl Into<String>) -> Self {
        IngestError::MalformedSnapshot {
            pid,
            reason: reason.into(),
        }
    }
}

impl From<ProviderError> for IngestError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Malformed { line, reason } => {
                IngestError::malformed(None, format!("line {line}: {reason}"))
            }
            other => IngestError::Provider(other),
        }
    }
}

/// A reading the provider should never produce, clamped to zero instead of
/// failing the tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// `None` for machine-wide readings.
    pub pid: Option<u32>,
    pub field: &'static str,
    pub value: f32,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pid {
            Some(pid) => write!(f, "pid {pid}: {} = {} clamped to 0", self.field, self.value),
            None => write!(f, "system: {} = {} clamped to 0", self.field, self.value),
        }
    }
}

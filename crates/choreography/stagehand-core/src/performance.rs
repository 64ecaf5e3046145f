//! Runtime instances of choreographies.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::data::ChoreographyDefinition;
use crate::ids::PerformanceId;
use crate::runner::SequenceRunner;
use crate::signal::PerformanceSignal;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceStatus {
    Running,
    Completed,
    Interrupted,
}

/// One live run of a definition bound to the signal that triggered it.
/// Owned by the scheduler; dropped on completion or interruption.
#[derive(Debug)]
pub struct Performance {
    pub id: PerformanceId,
    pub definition: Arc<ChoreographyDefinition>,
    /// Snapshot taken at start; later mutation of the caller's signal has no effect.
    pub signal: PerformanceSignal,
    pub correlation_id: Option<String>,
    pub started_at: f64,
    pub status: PerformanceStatus,
    pub(crate) runner: SequenceRunner,
}

impl Performance {
    pub(crate) fn new(
        id: PerformanceId,
        definition: Arc<ChoreographyDefinition>,
        signal: PerformanceSignal,
        correlation_id: Option<String>,
        started_at: f64,
    ) -> Self {
        let runner = SequenceRunner::new(definition.steps.iter().cloned());
        Self {
            id,
            definition,
            signal,
            correlation_id,
            started_at,
            status: PerformanceStatus::Running,
            runner,
        }
    }

    pub fn info(&self) -> PerformanceInfo {
        PerformanceInfo {
            id: self.id,
            choreography: self.definition.label().to_string(),
            signal_type: self.signal.kind.clone(),
            correlation_id: self.correlation_id.clone(),
            started_at: self.started_at,
            status: self.status,
        }
    }
}

/// Read-only snapshot of a performance for diagnostics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerformanceInfo {
    pub id: PerformanceId,
    pub choreography: String,
    pub signal_type: String,
    pub correlation_id: Option<String>,
    pub started_at: f64,
    pub status: PerformanceStatus,
}

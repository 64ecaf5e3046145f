//! Error types for the choreographer runtime.
//!
//! Lookup misses (unknown easing, unresolved references, empty registry buckets)
//! are not errors; they surface as `None` or empty slices.

/// Errors surfaced to callers of the runtime.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ChoreoError {
    /// The scheduler was disposed and can no longer start performances.
    #[error("scheduler has been disposed")]
    Disposed,

    /// A sink or frame callback called back into the scheduler mid-emission.
    #[error("re-entrant call into the scheduler during {operation}")]
    Reentrant { operation: &'static str },

    /// Choreography JSON could not be deserialized.
    #[error("failed to parse choreography: {reason}")]
    Parse { reason: String },

    /// Strict validation rejected a definition.
    #[error("invalid choreography '{on}': {issues}")]
    InvalidDefinition { on: String, issues: String },

    /// Test-only lifecycle hook used at the wrong time.
    #[error("cannot {operation} while {active} performance(s) are active")]
    Busy {
        operation: &'static str,
        active: usize,
    },
}

impl ChoreoError {
    /// Error category for logging.
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Disposed | Self::Reentrant { .. } | Self::Busy { .. } => "lifecycle",
            Self::Parse { .. } => "serialization",
            Self::InvalidDefinition { .. } => "validation",
        }
    }
}

impl From<serde_json::Error> for ChoreoError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse {
            reason: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChoreoError>;

//! Stagehand choreographer runtime (renderer-agnostic).
//!
//! Turns asynchronously arriving agent-activity signals into timed,
//! interruptible sequences of visual action commands. Definitions are
//! registered by signal type; `Choreographer::handle_signal` matches them,
//! starts performances, and the scheduler advances those performances on
//! every clock frame, emitting commands to a `CommandSink`.
//!
//! Everything runs on one thread. Time comes only from a `Clock`: `HostClock`
//! for real hosts, `TestClock` for deterministic tests.

pub mod choreographer;
pub mod clock;
pub mod config;
pub mod data;
pub mod easing;
pub mod error;
pub mod ids;
pub mod matcher;
pub mod performance;
pub mod registry;
mod runner;
pub mod resolver;
pub mod scheduler;
pub mod signal;
pub mod sink;
pub mod stored_choreography;

// Re-exports for hosts and renderers
pub use choreographer::Choreographer;
pub use clock::{Clock, FrameCallback, FrameHandle, HostClock, TestClock};
pub use config::{Config, WhenPolicy};
pub use data::{Action, ActionStep, ChoreographyDefinition, ChoreographyStep, ValidationIssue};
pub use easing::{get_easing, EasingFn};
pub use error::{ChoreoError, Result};
pub use ids::PerformanceId;
pub use matcher::{matches_when, Condition, Operator, WhenClause};
pub use performance::{PerformanceInfo, PerformanceStatus};
pub use registry::Registry;
pub use resolver::{resolve_entity_ref, resolve_params, resolve_signal_ref};
pub use scheduler::Scheduler;
pub use signal::PerformanceSignal;
pub use sink::{
    ActionCommand, ActionComplete, ActionExecute, ActionStart, ActionUpdate, Command,
    CommandSink, InterruptCommand, NullSink, RecordingSink,
};
pub use stored_choreography::parse_choreographies_json;

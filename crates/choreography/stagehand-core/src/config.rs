//! Runtime configuration for the choreographer.

use serde::{Deserialize, Serialize};

/// How the conditions of a multi-condition `when` clause combine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhenPolicy {
    /// Every condition must hold. An empty clause matches.
    #[default]
    All,
    /// At least one condition must hold. An empty clause still matches.
    Any,
}

/// Scheduler and matcher configuration.
/// Keep this minimal; new knobs must default to current behavior.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Easing used when a step names none or an unknown one.
    pub fallback_easing: String,

    pub when_policy: WhenPolicy,

    /// Skip action steps whose entity resolved to the empty string.
    pub skip_empty_entities: bool,

    /// Soft cap on concurrent performances. The oldest is hard-stopped to make room.
    pub max_performances: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fallback_easing: "linear".to_string(),
            when_policy: WhenPolicy::All,
            skip_empty_entities: false,
            max_performances: None,
        }
    }
}

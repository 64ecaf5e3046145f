//! Choreography definition model (JSON-compatible).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::easing::{get_easing, is_progress_easing};
use crate::error::{ChoreoError, Result};
use crate::matcher::WhenClause;

/// Action verb of a step. Unknown names are preserved and handed to the sink.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    Move,
    Fly,
    Spawn,
    Destroy,
    Flash,
    Pulse,
    Shake,
    Wait,
    PlaySound,
    Label,
    Unknown(String),
}

impl Action {
    pub fn as_str(&self) -> &str {
        match self {
            Action::Move => "move",
            Action::Fly => "fly",
            Action::Spawn => "spawn",
            Action::Destroy => "destroy",
            Action::Flash => "flash",
            Action::Pulse => "pulse",
            Action::Shake => "shake",
            Action::Wait => "wait",
            Action::PlaySound => "playSound",
            Action::Label => "label",
            Action::Unknown(name) => name,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Action::Unknown(_))
    }
}

impl From<String> for Action {
    fn from(s: String) -> Self {
        match s.as_str() {
            "move" => Action::Move,
            "fly" => Action::Fly,
            "spawn" => Action::Spawn,
            "destroy" => Action::Destroy,
            "flash" => Action::Flash,
            "pulse" => Action::Pulse,
            "shake" => Action::Shake,
            "wait" => Action::Wait,
            "playSound" => Action::PlaySound,
            "label" => Action::Label,
            _ => Action::Unknown(s),
        }
    }
}

impl From<&str> for Action {
    fn from(s: &str) -> Self {
        Action::from(s.to_string())
    }
}

impl From<Action> for String {
    fn from(a: Action) -> Self {
        match a {
            Action::Unknown(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single visual action on one entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionStep {
    pub action: Action,
    /// Entity reference: a literal logical name or a `signal.*` reference.
    #[serde(default, alias = "target")]
    pub entity: String,
    /// Destination (entity reference, position object, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<JsonValue>,
    /// Milliseconds. Absent or zero means instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub easing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, JsonValue>,
    /// Steps spliced in right after this one completes.
    #[serde(
        default,
        rename = "onArrive",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub on_arrive: Vec<ChoreographyStep>,
}

impl ActionStep {
    pub fn new(action: impl Into<Action>, entity: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            entity: entity.into(),
            to: None,
            duration: None,
            easing: None,
            color: None,
            sound: None,
            params: Map::new(),
            on_arrive: Vec::new(),
        }
    }

    pub fn duration(mut self, ms: f64) -> Self {
        self.duration = Some(ms);
        self
    }

    pub fn easing(mut self, name: impl Into<String>) -> Self {
        self.easing = Some(name.into());
        self
    }

    pub fn to(mut self, dest: impl Into<JsonValue>) -> Self {
        self.to = Some(dest.into());
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn on_arrive(mut self, steps: Vec<ChoreographyStep>) -> Self {
        self.on_arrive = steps;
        self
    }

    /// Animated steps run over frames; everything else executes instantly.
    #[inline]
    pub fn is_animated(&self) -> bool {
        self.duration.map_or(false, |d| d.is_finite() && d > 0.0)
    }
}

/// One unit of a choreography.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChoreographyStep {
    Action(ActionStep),
    /// Branches start together; the sequence resumes when all are done.
    Parallel { parallel: Vec<ChoreographyStep> },
    /// Runs its steps once the preceding step has completed.
    OnArrive {
        #[serde(rename = "onArrive")]
        on_arrive: Vec<ChoreographyStep>,
    },
    /// Cleanup run when the performance is interrupted by a signal.
    OnInterrupt {
        #[serde(rename = "onInterrupt")]
        on_interrupt: Vec<ChoreographyStep>,
    },
}

impl From<ActionStep> for ChoreographyStep {
    fn from(step: ActionStep) -> Self {
        ChoreographyStep::Action(step)
    }
}

/// Declarative template mapping a signal type (and optional predicate) to steps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChoreographyDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Signal type that triggers this choreography.
    pub on: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<WhenClause>,
    #[serde(default)]
    pub interrupts: bool,
    #[serde(default)]
    pub steps: Vec<ChoreographyStep>,
}

impl ChoreographyDefinition {
    pub fn new(on: impl Into<String>, steps: Vec<ChoreographyStep>) -> Self {
        Self {
            id: None,
            name: None,
            on: on.into(),
            when: None,
            interrupts: false,
            steps,
        }
    }

    pub fn with_when(mut self, when: WhenClause) -> Self {
        self.when = Some(when);
        self
    }

    pub fn interrupting(mut self) -> Self {
        self.interrupts = true;
        self
    }

    /// Label used in logs: id, then name, then the trigger type.
    pub fn label(&self) -> &str {
        self.id
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or(&self.on)
    }

    /// Top-level `onInterrupt` cleanup steps, in declaration order.
    pub fn interrupt_steps(&self) -> impl Iterator<Item = &ChoreographyStep> {
        self.steps
            .iter()
            .filter_map(|s| match s {
                ChoreographyStep::OnInterrupt { on_interrupt } => Some(on_interrupt.iter()),
                _ => None,
            })
            .flatten()
    }

    /// Report authoring problems. Never blocks registration.
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        if self.steps.is_empty() {
            issues.push(ValidationIssue::new("steps", IssueKind::EmptySteps));
        }
        validate_steps(&self.steps, "steps", true, &mut issues);
        issues
    }

    /// Turn any validation issue into an error.
    pub fn validate_strict(&self) -> Result<()> {
        let issues = self.validate();
        if issues.is_empty() {
            return Ok(());
        }
        let joined = issues
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Err(ChoreoError::InvalidDefinition {
            on: self.on.clone(),
            issues: joined,
        })
    }
}

/// What is wrong with a step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueKind {
    EmptySteps,
    UnknownAction(String),
    UnknownEasing(String),
    /// A curve such as `arc` that is not monotonic and cannot drive progress.
    OffsetOnlyEasing(String),
    NegativeDuration,
    ArriveOnInstant,
    NestedInterrupt,
}

/// A validation finding with the JSON-ish path of the offending step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub path: String,
    pub kind: IssueKind,
}

impl ValidationIssue {
    fn new(path: impl Into<String>, kind: IssueKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            IssueKind::EmptySteps => write!(f, "{}: no steps", self.path),
            IssueKind::UnknownAction(a) => write!(f, "{}: unknown action '{a}'", self.path),
            IssueKind::UnknownEasing(e) => write!(f, "{}: unknown easing '{e}'", self.path),
            IssueKind::OffsetOnlyEasing(e) => {
                write!(f, "{}: easing '{e}' is an offset curve, not a progress curve", self.path)
            }
            IssueKind::NegativeDuration => write!(f, "{}: negative duration", self.path),
            IssueKind::ArriveOnInstant => {
                write!(f, "{}: onArrive attached to an instant action", self.path)
            }
            IssueKind::NestedInterrupt => {
                write!(f, "{}: onInterrupt is only honored at top level", self.path)
            }
        }
    }
}

fn validate_steps(
    steps: &[ChoreographyStep],
    base: &str,
    top_level: bool,
    issues: &mut Vec<ValidationIssue>,
) {
    for (i, step) in steps.iter().enumerate() {
        let path = format!("{base}[{i}]");
        match step {
            ChoreographyStep::Action(a) => {
                if let Action::Unknown(name) = &a.action {
                    issues.push(ValidationIssue::new(&path, IssueKind::UnknownAction(name.clone())));
                }
                if let Some(e) = &a.easing {
                    if get_easing(e).is_none() {
                        issues.push(ValidationIssue::new(&path, IssueKind::UnknownEasing(e.clone())));
                    } else if !is_progress_easing(e) {
                        issues.push(ValidationIssue::new(&path, IssueKind::OffsetOnlyEasing(e.clone())));
                    }
                }
                if a.duration.map_or(false, |d| d < 0.0) {
                    issues.push(ValidationIssue::new(&path, IssueKind::NegativeDuration));
                }
                if !a.on_arrive.is_empty() && !a.is_animated() {
                    issues.push(ValidationIssue::new(&path, IssueKind::ArriveOnInstant));
                }
                validate_steps(&a.on_arrive, &format!("{path}.onArrive"), false, issues);
            }
            ChoreographyStep::Parallel { parallel } => {
                validate_steps(parallel, &format!("{path}.parallel"), false, issues);
            }
            ChoreographyStep::OnArrive { on_arrive } => {
                validate_steps(on_arrive, &format!("{path}.onArrive"), false, issues);
            }
            ChoreographyStep::OnInterrupt { on_interrupt } => {
                if !top_level {
                    issues.push(ValidationIssue::new(&path, IssueKind::NestedInterrupt));
                }
                validate_steps(on_interrupt, &format!("{path}.onInterrupt"), false, issues);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_every_step_kind() {
        let def: ChoreographyDefinition = serde_json::from_value(json!({
            "on": "task_dispatch",
            "interrupts": true,
            "steps": [
                { "action": "spawn", "entity": "signal.to" },
                { "action": "fly", "target": "packet", "to": "signal.to", "duration": 600,
                  "easing": "easeOut", "onArrive": [ { "action": "flash", "entity": "signal.to" } ] },
                { "parallel": [ { "action": "pulse", "entity": "a", "duration": 200 },
                                { "action": "shake", "entity": "b", "duration": 300 } ] },
                { "onArrive": [ { "action": "destroy", "entity": "packet" } ] },
                { "onInterrupt": [ { "action": "destroy", "entity": "packet" } ] }
            ]
        }))
        .expect("definition");

        assert!(def.interrupts);
        assert_eq!(def.steps.len(), 5);
        match &def.steps[1] {
            ChoreographyStep::Action(a) => {
                assert_eq!(a.action, Action::Fly);
                assert_eq!(a.entity, "packet");
                assert!(a.is_animated());
                assert_eq!(a.on_arrive.len(), 1);
            }
            other => panic!("unexpected step {other:?}"),
        }
        assert!(matches!(def.steps[2], ChoreographyStep::Parallel { .. }));
        assert!(matches!(def.steps[3], ChoreographyStep::OnArrive { .. }));
        assert_eq!(def.interrupt_steps().count(), 1);
        assert!(def.validate().is_empty());
    }

    #[test]
    fn unknown_actions_survive_round_trip() {
        let step: ActionStep =
            serde_json::from_value(json!({ "action": "confetti", "entity": "x" })).unwrap();
        assert_eq!(step.action, Action::Unknown("confetti".into()));
        assert_eq!(serde_json::to_value(&step).unwrap()["action"], json!("confetti"));
        assert_eq!(serde_json::to_value(Action::PlaySound).unwrap(), json!("playSound"));
    }

    #[test]
    fn zero_and_missing_durations_are_instant() {
        assert!(!ActionStep::new("move", "a").is_animated());
        assert!(!ActionStep::new("move", "a").duration(0.0).is_animated());
        assert!(ActionStep::new("move", "a").duration(1.0).is_animated());
    }

    #[test]
    fn validation_reports_problems() {
        let def: ChoreographyDefinition = serde_json::from_value(json!({
            "on": "error",
            "steps": [
                { "action": "wobble", "entity": "x", "easing": "springy", "duration": -5,
                  "onArrive": [ { "action": "flash", "entity": "x" } ] },
                { "parallel": [ { "onInterrupt": [] } ] }
            ]
        }))
        .unwrap();
        let kinds: Vec<IssueKind> = def.validate().into_iter().map(|i| i.kind).collect();
        assert!(kinds.contains(&IssueKind::UnknownAction("wobble".into())));
        assert!(kinds.contains(&IssueKind::UnknownEasing("springy".into())));
        assert!(kinds.contains(&IssueKind::NegativeDuration));
        assert!(kinds.contains(&IssueKind::ArriveOnInstant));
        assert!(kinds.contains(&IssueKind::NestedInterrupt));
        assert!(def.validate_strict().is_err());
    }

    #[test]
    fn arc_is_flagged_as_a_step_easing() {
        let def = ChoreographyDefinition::new(
            "task_dispatch",
            vec![ActionStep::new("fly", "packet").duration(100.0).easing("arc").into()],
        );
        let issues = def.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::OffsetOnlyEasing("arc".into()));
        assert_eq!(issues[0].path, "steps[0]");
    }

    #[test]
    fn empty_steps_are_legal_but_flagged() {
        let def = ChoreographyDefinition::new("noop", vec![]);
        assert_eq!(def.validate()[0].kind, IssueKind::EmptySteps);
        assert_eq!(def.label(), "noop");
    }
}

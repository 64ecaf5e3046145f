//! Command contract between the runtime and a renderer.
//!
//! Commands are value objects: the runtime never touches them after handing
//! them over. Sink methods are synchronous and must return promptly.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::data::Action;
use crate::ids::PerformanceId;

/// Fields shared by every action-level command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionCommand {
    pub performance_id: PerformanceId,
    pub action: Action,
    /// Resolved entity; empty when a `signal.*` reference missed.
    pub entity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<JsonValue>,
    #[serde(default)]
    pub params: Map<String, JsonValue>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionStart {
    #[serde(flatten)]
    pub command: ActionCommand,
    /// Milliseconds.
    pub duration: f64,
    /// Name of the easing actually applied (after fallback).
    pub easing: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionUpdate {
    #[serde(flatten)]
    pub command: ActionCommand,
    /// Eased progress.
    pub progress: f64,
    /// Linear progress in [0, 1).
    pub raw_progress: f64,
    pub elapsed: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionComplete {
    #[serde(flatten)]
    pub command: ActionCommand,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionExecute {
    #[serde(flatten)]
    pub command: ActionCommand,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InterruptCommand {
    pub performance_id: PerformanceId,
    /// Scope of the interrupted performance; empty for an uncorrelated one
    /// evicted by the performance cap.
    pub correlation_id: String,
    /// Type of the signal that caused the interruption.
    pub interrupted_by: String,
}

/// Consumer of emitted commands. Implemented by renderers, not by the runtime.
pub trait CommandSink {
    fn on_action_start(&mut self, cmd: ActionStart);
    fn on_action_update(&mut self, cmd: ActionUpdate);
    fn on_action_complete(&mut self, cmd: ActionComplete);
    fn on_action_execute(&mut self, cmd: ActionExecute);
    fn on_interrupt(&mut self, cmd: InterruptCommand);
}

/// Any command, for recording or shipping a batch to an out-of-process renderer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Command {
    ActionStart(ActionStart),
    ActionUpdate(ActionUpdate),
    ActionComplete(ActionComplete),
    ActionExecute(ActionExecute),
    Interrupt(InterruptCommand),
}

impl Command {
    pub fn performance_id(&self) -> PerformanceId {
        match self {
            Command::ActionStart(c) => c.command.performance_id,
            Command::ActionUpdate(c) => c.command.performance_id,
            Command::ActionComplete(c) => c.command.performance_id,
            Command::ActionExecute(c) => c.command.performance_id,
            Command::Interrupt(c) => c.performance_id,
        }
    }

    /// The action payload, absent for interrupts.
    pub fn action(&self) -> Option<&ActionCommand> {
        match self {
            Command::ActionStart(c) => Some(&c.command),
            Command::ActionUpdate(c) => Some(&c.command),
            Command::ActionComplete(c) => Some(&c.command),
            Command::ActionExecute(c) => Some(&c.command),
            Command::Interrupt(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Command::ActionStart(_) => "action_start",
            Command::ActionUpdate(_) => "action_update",
            Command::ActionComplete(_) => "action_complete",
            Command::ActionExecute(_) => "action_execute",
            Command::Interrupt(_) => "interrupt",
        }
    }

    /// Deliver this command to the matching sink method.
    pub fn dispatch(self, sink: &mut dyn CommandSink) {
        match self {
            Command::ActionStart(c) => sink.on_action_start(c),
            Command::ActionUpdate(c) => sink.on_action_update(c),
            Command::ActionComplete(c) => sink.on_action_complete(c),
            Command::ActionExecute(c) => sink.on_action_execute(c),
            Command::Interrupt(c) => sink.on_interrupt(c),
        }
    }
}

/// Shares one sink between the runtime and the host.
impl<S: CommandSink> CommandSink for Rc<RefCell<S>> {
    fn on_action_start(&mut self, cmd: ActionStart) {
        self.borrow_mut().on_action_start(cmd)
    }
    fn on_action_update(&mut self, cmd: ActionUpdate) {
        self.borrow_mut().on_action_update(cmd)
    }
    fn on_action_complete(&mut self, cmd: ActionComplete) {
        self.borrow_mut().on_action_complete(cmd)
    }
    fn on_action_execute(&mut self, cmd: ActionExecute) {
        self.borrow_mut().on_action_execute(cmd)
    }
    fn on_interrupt(&mut self, cmd: InterruptCommand) {
        self.borrow_mut().on_interrupt(cmd)
    }
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl CommandSink for NullSink {
    fn on_action_start(&mut self, _: ActionStart) {}
    fn on_action_update(&mut self, _: ActionUpdate) {}
    fn on_action_complete(&mut self, _: ActionComplete) {}
    fn on_action_execute(&mut self, _: ActionExecute) {}
    fn on_interrupt(&mut self, _: InterruptCommand) {}
}

/// Records every command in order. Clones share the same log, so a test can
/// hand one clone to the runtime and inspect another.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    log: Rc<RefCell<Vec<Command>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn commands(&self) -> Vec<Command> {
        self.log.borrow().clone()
    }

    /// Take and clear the recorded commands.
    pub fn drain(&self) -> Vec<Command> {
        std::mem::take(&mut *self.log.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.log.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.borrow().is_empty()
    }

    /// Kinds in emission order, handy for sequence assertions.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.log.borrow().iter().map(Command::kind).collect()
    }

    pub fn to_json(&self) -> serde_json::Result<JsonValue> {
        serde_json::to_value(&*self.log.borrow())
    }

    fn push(&self, cmd: Command) {
        self.log.borrow_mut().push(cmd);
    }
}

impl CommandSink for RecordingSink {
    fn on_action_start(&mut self, cmd: ActionStart) {
        self.push(Command::ActionStart(cmd));
    }
    fn on_action_update(&mut self, cmd: ActionUpdate) {
        self.push(Command::ActionUpdate(cmd));
    }
    fn on_action_complete(&mut self, cmd: ActionComplete) {
        self.push(Command::ActionComplete(cmd));
    }
    fn on_action_execute(&mut self, cmd: ActionExecute) {
        self.push(Command::ActionExecute(cmd));
    }
    fn on_interrupt(&mut self, cmd: InterruptCommand) {
        self.push(Command::Interrupt(cmd));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> ActionCommand {
        ActionCommand {
            performance_id: PerformanceId(3),
            action: Action::Fly,
            entity: "packet".into(),
            to: Some(json!("agent-1")),
            color: None,
            sound: None,
            params: Map::new(),
        }
    }

    #[test]
    fn recording_sink_clones_share_the_log() {
        let sink = RecordingSink::new();
        let mut handle: Box<dyn CommandSink> = Box::new(sink.clone());
        handle.on_action_execute(ActionExecute { command: base() });
        handle.on_interrupt(InterruptCommand {
            performance_id: PerformanceId(3),
            correlation_id: "c1".into(),
            interrupted_by: "error".into(),
        });
        assert_eq!(sink.kinds(), vec!["action_execute", "interrupt"]);
        assert_eq!(sink.drain().len(), 2);
        assert!(sink.is_empty());
    }

    #[test]
    fn commands_serialize_flat_and_tagged() {
        let cmd = Command::ActionUpdate(ActionUpdate {
            command: base(),
            progress: 0.25,
            raw_progress: 0.5,
            elapsed: 100.0,
        });
        let v = serde_json::to_value(&cmd).unwrap();
        assert_eq!(v["kind"], json!("action_update"));
        assert_eq!(v["performance_id"], json!(3));
        assert_eq!(v["action"], json!("fly"));
        assert_eq!(v["to"], json!("agent-1"));
        assert!(v.get("color").is_none());
        let back: Command = serde_json::from_value(v).unwrap();
        assert_eq!(back, cmd);
    }

    #[test]
    fn dispatch_routes_to_the_matching_method() {
        let sink = RecordingSink::new();
        let mut target = sink.clone();
        Command::ActionComplete(ActionComplete { command: base() }).dispatch(&mut target);
        assert_eq!(sink.kinds(), vec!["action_complete"]);
        assert_eq!(sink.commands()[0].performance_id(), PerformanceId(3));
    }
}

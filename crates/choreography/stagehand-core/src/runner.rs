//! Step execution for one performance.
//!
//! A `SequenceRunner` holds the steps still to run and at most one step that
//! needs frames (an animated action or a parallel group). Instant work runs
//! synchronously until the next frame-bound step is reached. `onArrive` steps
//! are pushed to the front of the queue so they run before the next sibling.

use std::collections::VecDeque;

use crate::config::Config;
use crate::data::{ActionStep, ChoreographyStep};
use crate::easing::{resolve_easing, EasingFn};
use crate::ids::PerformanceId;
use crate::resolver::{is_signal_ref, resolve_entity_ref, resolve_params, resolve_value};
use crate::signal::PerformanceSignal;
use crate::sink::{
    ActionCommand, ActionComplete, ActionExecute, ActionStart, ActionUpdate, Command,
};

/// Everything a runner needs to emit commands for one performance.
pub(crate) struct StepContext<'a> {
    pub performance_id: PerformanceId,
    pub signal: &'a PerformanceSignal,
    pub config: &'a Config,
    pub out: &'a mut Vec<Command>,
}

impl StepContext<'_> {
    /// Resolve a step into a command, or `None` when it should be skipped.
    fn resolve(&self, step: &ActionStep) -> Option<ActionCommand> {
        let entity = resolve_entity_ref(&step.entity, self.signal);
        if entity.is_empty() && is_signal_ref(&step.entity) {
            log::warn!(
                "{}: entity '{}' resolved to empty for '{}'",
                self.performance_id,
                step.entity,
                step.action
            );
        }
        if entity.is_empty() && self.config.skip_empty_entities {
            return None;
        }
        if step.action.is_unknown() {
            log::debug!(
                "{}: passing unknown action '{}' to sink",
                self.performance_id,
                step.action
            );
        }
        Some(ActionCommand {
            performance_id: self.performance_id,
            action: step.action.clone(),
            entity,
            to: step.to.as_ref().map(|v| resolve_value(v, self.signal)),
            color: step.color.as_ref().map(|v| resolve_value(v, self.signal)),
            sound: step.sound.as_ref().map(|v| resolve_value(v, self.signal)),
            params: resolve_params(&step.params, self.signal),
        })
    }

    fn easing_for(&self, step: &ActionStep) -> (EasingFn, String) {
        let (name, f) = resolve_easing(step.easing.as_deref(), &self.config.fallback_easing);
        (f, name.to_string())
    }

    fn emit(&mut self, cmd: Command) {
        self.out.push(cmd);
    }
}

#[derive(Debug)]
struct AnimatedAction {
    command: ActionCommand,
    started_at: f64,
    duration: f64,
    easing: EasingFn,
    last_raw: Option<f64>,
    on_arrive: Vec<ChoreographyStep>,
}

#[derive(Debug)]
enum ActiveStep {
    Animated(AnimatedAction),
    Parallel(Vec<SequenceRunner>),
}

enum Tick {
    Running,
    /// Finished; carries steps to splice in before the next sibling.
    Finished(Vec<ChoreographyStep>),
}

impl ActiveStep {
    fn tick(&mut self, now: f64, ctx: &mut StepContext<'_>) -> Tick {
        match self {
            ActiveStep::Animated(a) => {
                let elapsed = (now - a.started_at).max(0.0);
                if elapsed >= a.duration {
                    // A step finished by its first frame still reports progress 0.
                    if a.last_raw.is_none() {
                        a.last_raw = Some(0.0);
                        ctx.emit(Command::ActionUpdate(ActionUpdate {
                            command: a.command.clone(),
                            progress: (a.easing)(0.0),
                            raw_progress: 0.0,
                            elapsed: 0.0,
                        }));
                    }
                    ctx.emit(Command::ActionComplete(ActionComplete {
                        command: a.command.clone(),
                    }));
                    return Tick::Finished(std::mem::take(&mut a.on_arrive));
                }
                let raw = (elapsed / a.duration).clamp(0.0, 1.0);
                // Same-timestamp frames would repeat progress; skip them.
                if a.last_raw.map_or(true, |last| raw > last) {
                    a.last_raw = Some(raw);
                    ctx.emit(Command::ActionUpdate(ActionUpdate {
                        command: a.command.clone(),
                        progress: (a.easing)(raw),
                        raw_progress: raw,
                        elapsed,
                    }));
                }
                Tick::Running
            }
            ActiveStep::Parallel(branches) => {
                let mut all_done = true;
                for branch in branches.iter_mut() {
                    if !branch.is_finished() && !branch.advance(now, ctx) {
                        all_done = false;
                    }
                }
                if all_done {
                    Tick::Finished(Vec::new())
                } else {
                    Tick::Running
                }
            }
        }
    }
}

/// Cursor over a sequence of steps.
#[derive(Debug, Default)]
pub(crate) struct SequenceRunner {
    pending: VecDeque<ChoreographyStep>,
    active: Option<ActiveStep>,
}

impl SequenceRunner {
    pub fn new(steps: impl IntoIterator<Item = ChoreographyStep>) -> Self {
        Self {
            pending: steps.into_iter().collect(),
            active: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.active.is_none() && self.pending.is_empty()
    }

    /// Run instant steps up to the first frame-bound one. Returns `true` when finished.
    pub fn start(&mut self, now: f64, ctx: &mut StepContext<'_>) -> bool {
        self.drain(now, ctx)
    }

    /// Advance the current step to `now`, then continue with whatever follows.
    /// Returns `true` when the sequence is finished.
    pub fn advance(&mut self, now: f64, ctx: &mut StepContext<'_>) -> bool {
        if let Some(active) = self.active.as_mut() {
            match active.tick(now, ctx) {
                Tick::Running => return false,
                Tick::Finished(arrive) => {
                    self.active = None;
                    self.splice_front(arrive);
                }
            }
        }
        self.drain(now, ctx)
    }

    fn splice_front(&mut self, steps: Vec<ChoreographyStep>) {
        for step in steps.into_iter().rev() {
            self.pending.push_front(step);
        }
    }

    fn drain(&mut self, now: f64, ctx: &mut StepContext<'_>) -> bool {
        while let Some(step) = self.pending.pop_front() {
            if let Some(active) = self.begin(step, now, ctx) {
                self.active = Some(active);
                return false;
            }
        }
        true
    }

    /// Begin one step. Returns the frame-bound state if it must wait for frames.
    fn begin(
        &mut self,
        step: ChoreographyStep,
        now: f64,
        ctx: &mut StepContext<'_>,
    ) -> Option<ActiveStep> {
        match step {
            ChoreographyStep::Action(action) => {
                let command = ctx.resolve(&action)?;
                if action.is_animated() {
                    let (easing, easing_name) = ctx.easing_for(&action);
                    let duration = action.duration.unwrap_or_default();
                    ctx.emit(Command::ActionStart(ActionStart {
                        command: command.clone(),
                        duration,
                        easing: easing_name,
                    }));
                    Some(ActiveStep::Animated(AnimatedAction {
                        command,
                        started_at: now,
                        duration,
                        easing,
                        last_raw: None,
                        on_arrive: action.on_arrive,
                    }))
                } else {
                    ctx.emit(Command::ActionExecute(ActionExecute { command }));
                    self.splice_front(action.on_arrive);
                    None
                }
            }
            ChoreographyStep::Parallel { parallel } => {
                let mut branches: Vec<SequenceRunner> = parallel
                    .into_iter()
                    .map(|s| SequenceRunner::new([s]))
                    .collect();
                let mut all_done = true;
                for branch in branches.iter_mut() {
                    if !branch.start(now, ctx) {
                        all_done = false;
                    }
                }
                if all_done {
                    None
                } else {
                    Some(ActiveStep::Parallel(branches))
                }
            }
            ChoreographyStep::OnArrive { on_arrive } => {
                self.splice_front(on_arrive);
                None
            }
            // Declarations only; they run when the performance is interrupted.
            ChoreographyStep::OnInterrupt { .. } => None,
        }
    }
}

/// Execute cleanup steps immediately as instant actions, whatever their durations.
/// Parallel groups and arrival hooks flatten in declaration order; nested
/// `onInterrupt` blocks are ignored.
pub(crate) fn run_instantly<'s>(
    steps: impl IntoIterator<Item = &'s ChoreographyStep>,
    ctx: &mut StepContext<'_>,
) {
    for step in steps {
        match step {
            ChoreographyStep::Action(action) => {
                if let Some(command) = ctx.resolve(action) {
                    ctx.emit(Command::ActionExecute(ActionExecute { command }));
                    run_instantly(&action.on_arrive, ctx);
                }
            }
            ChoreographyStep::Parallel { parallel } => run_instantly(parallel, ctx),
            ChoreographyStep::OnArrive { on_arrive } => run_instantly(on_arrive, ctx),
            ChoreographyStep::OnInterrupt { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ActionStep;
    use serde_json::json;

    struct Harness {
        signal: PerformanceSignal,
        config: Config,
        out: Vec<Command>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                signal: PerformanceSignal::with_payload("task_dispatch", json!({ "to": "agent-1" })),
                config: Config::default(),
                out: Vec::new(),
            }
        }

        fn ctx(&mut self) -> StepContext<'_> {
            StepContext {
                performance_id: PerformanceId(1),
                signal: &self.signal,
                config: &self.config,
                out: &mut self.out,
            }
        }

        fn kinds(&self) -> Vec<&'static str> {
            self.out.iter().map(Command::kind).collect()
        }
    }

    fn step(action: &str, entity: &str, duration: f64) -> ChoreographyStep {
        ActionStep::new(action, entity).duration(duration).into()
    }

    #[test]
    fn instant_steps_run_synchronously() {
        let mut h = Harness::new();
        let mut r = SequenceRunner::new([step("spawn", "a", 0.0), step("destroy", "a", 0.0)]);
        assert!(r.start(0.0, &mut h.ctx()));
        assert_eq!(h.kinds(), vec!["action_execute", "action_execute"]);
    }

    #[test]
    fn animated_step_starts_updates_then_completes() {
        let mut h = Harness::new();
        let mut r = SequenceRunner::new([step("move", "signal.to", 100.0)]);
        assert!(!r.start(0.0, &mut h.ctx()));
        assert!(!r.advance(50.0, &mut h.ctx()));
        assert!(!r.advance(50.0, &mut h.ctx()));
        assert!(r.advance(100.0, &mut h.ctx()));
        assert_eq!(h.kinds(), vec!["action_start", "action_update", "action_complete"]);
        match &h.out[1] {
            Command::ActionUpdate(u) => {
                assert_eq!(u.command.entity, "agent-1");
                assert!((u.raw_progress - 0.5).abs() < 1e-12);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn step_finished_by_its_first_frame_reports_zero_progress() {
        let mut h = Harness::new();
        let mut r = SequenceRunner::new([ActionStep::new("move", "a")
            .duration(800.0)
            .easing("easeOut")
            .into()]);
        r.start(0.0, &mut h.ctx());
        assert!(r.advance(800.0, &mut h.ctx()));
        assert_eq!(h.kinds(), vec!["action_start", "action_update", "action_complete"]);
        match &h.out[1] {
            Command::ActionUpdate(u) => {
                assert_eq!(u.raw_progress, 0.0);
                assert_eq!(u.progress, 0.0);
                assert_eq!(u.elapsed, 0.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn arc_easing_does_not_make_progress_go_backwards() {
        let mut h = Harness::new();
        let mut r = SequenceRunner::new([ActionStep::new("fly", "packet")
            .duration(100.0)
            .easing("arc")
            .into()]);
        r.start(0.0, &mut h.ctx());
        for t in [25.0, 50.0, 75.0, 100.0] {
            r.advance(t, &mut h.ctx());
        }
        let progress: Vec<f64> = h
            .out
            .iter()
            .filter_map(|c| match c {
                Command::ActionUpdate(u) => Some(u.progress),
                _ => None,
            })
            .collect();
        assert_eq!(progress.len(), 3);
        assert!(progress.windows(2).all(|w| w[0] < w[1]));
        match &h.out[0] {
            Command::ActionStart(s) => assert_eq!(s.easing, "linear"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn on_arrive_runs_before_next_sibling() {
        let mut h = Harness::new();
        let fly = ActionStep::new("fly", "packet")
            .duration(10.0)
            .on_arrive(vec![step("flash", "target", 0.0)]);
        let mut r = SequenceRunner::new([fly.into(), step("destroy", "packet", 0.0)]);
        r.start(0.0, &mut h.ctx());
        assert!(r.advance(10.0, &mut h.ctx()));
        let order: Vec<String> = h
            .out
            .iter()
            .filter_map(|c| c.action().map(|a| format!("{}:{}", c.kind(), a.action)))
            .collect();
        assert_eq!(
            order,
            vec![
                "action_start:fly",
                "action_update:fly",
                "action_complete:fly",
                "action_execute:flash",
                "action_execute:destroy"
            ]
        );
    }

    #[test]
    fn parallel_waits_for_the_slowest_branch() {
        let mut h = Harness::new();
        let group = ChoreographyStep::Parallel {
            parallel: vec![step("pulse", "a", 10.0), step("shake", "b", 30.0)],
        };
        let mut r = SequenceRunner::new([group, step("spawn", "c", 0.0)]);
        assert!(!r.start(0.0, &mut h.ctx()));
        assert_eq!(h.kinds(), vec!["action_start", "action_start"]);
        h.out.clear();
        assert!(!r.advance(10.0, &mut h.ctx()));
        assert_eq!(h.kinds(), vec!["action_update", "action_complete", "action_update"]);
        h.out.clear();
        assert!(r.advance(30.0, &mut h.ctx()));
        assert_eq!(h.kinds(), vec!["action_complete", "action_execute"]);
    }

    #[test]
    fn on_interrupt_is_skipped_in_normal_flow() {
        let mut h = Harness::new();
        let cleanup = ChoreographyStep::OnInterrupt {
            on_interrupt: vec![step("destroy", "a", 0.0)],
        };
        let mut r = SequenceRunner::new([cleanup]);
        assert!(r.start(0.0, &mut h.ctx()));
        assert!(h.out.is_empty());
    }

    #[test]
    fn cleanup_runs_everything_as_instant() {
        let mut h = Harness::new();
        let steps = vec![
            step("fade", "a", 500.0),
            ChoreographyStep::Parallel {
                parallel: vec![step("destroy", "b", 0.0), step("destroy", "c", 200.0)],
            },
        ];
        run_instantly(&steps, &mut h.ctx());
        assert_eq!(h.kinds(), vec!["action_execute"; 3]);
    }

    #[test]
    fn empty_entities_can_be_skipped() {
        let mut h = Harness::new();
        h.config.skip_empty_entities = true;
        let mut r = SequenceRunner::new([step("move", "signal.nobody", 100.0), step("spawn", "x", 0.0)]);
        assert!(r.start(0.0, &mut h.ctx()));
        assert_eq!(h.kinds(), vec!["action_execute"]);
    }

    #[test]
    fn unknown_easing_falls_back() {
        let mut h = Harness::new();
        let s: ChoreographyStep = ActionStep::new("move", "a").duration(10.0).easing("wobbly").into();
        let mut r = SequenceRunner::new([s]);
        r.start(0.0, &mut h.ctx());
        match &h.out[0] {
            Command::ActionStart(s) => assert_eq!(s.easing, "linear"),
            other => panic!("unexpected {other:?}"),
        }
    }
}

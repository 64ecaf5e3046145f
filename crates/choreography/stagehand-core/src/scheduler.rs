//! Scheduler: owns active performances and advances them on clock frames.
//!
//! Methods take the scheduler state, collect commands into an outbox, release
//! the state, then flush the outbox into the sink. A sink may therefore query
//! or drive the scheduler from inside a callback; commands produced that way
//! are delivered after the ones already queued.

use std::cell::{RefCell, RefMut};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::clock::{Clock, FrameHandle};
use crate::config::Config;
use crate::data::ChoreographyDefinition;
use crate::error::{ChoreoError, Result};
use crate::ids::{PerformanceId, PerformanceIdAllocator};
use crate::performance::{Performance, PerformanceInfo, PerformanceStatus};
use crate::runner::{run_instantly, StepContext};
use crate::signal::PerformanceSignal;
use crate::sink::{Command, CommandSink, InterruptCommand};

struct SchedulerState {
    clock: Rc<dyn Clock>,
    config: Config,
    ids: PerformanceIdAllocator,
    /// Insertion order equals id order; frames visit performances in start order.
    performances: IndexMap<PerformanceId, Performance>,
    frame: Option<FrameHandle>,
    outbox: Vec<Command>,
    disposed: bool,
}

impl SchedulerState {
    fn start(
        &mut self,
        definition: Arc<ChoreographyDefinition>,
        signal: PerformanceSignal,
        correlation_id: Option<String>,
    ) -> PerformanceId {
        self.enforce_capacity(&signal.kind);
        let id = self.ids.alloc();
        let now = self.clock.now();
        let mut perf = Performance::new(id, definition, signal, correlation_id, now);
        let finished = {
            let Performance { runner, signal, .. } = &mut perf;
            let mut ctx = StepContext {
                performance_id: id,
                signal: &*signal,
                config: &self.config,
                out: &mut self.outbox,
            };
            runner.start(now, &mut ctx)
        };
        if finished {
            perf.status = PerformanceStatus::Completed;
            log::debug!("{id} ('{}') completed synchronously", perf.definition.label());
        } else {
            log::debug!(
                "{id} ('{}') started for '{}' (correlation {:?})",
                perf.definition.label(),
                perf.signal.kind,
                perf.correlation_id
            );
            self.performances.insert(id, perf);
        }
        id
    }

    /// Make room for one more performance. Evicted performances are
    /// interrupted by `signal_type` like any other interruption.
    fn enforce_capacity(&mut self, signal_type: &str) {
        let Some(max) = self.config.max_performances else {
            return;
        };
        while self.performances.len() >= max.max(1) {
            let Some((id, perf)) = self.performances.shift_remove_index(0) else {
                break;
            };
            log::warn!("{id} evicted: performance cap {max} reached");
            let scope = perf.correlation_id.clone().unwrap_or_default();
            self.retire_interrupted(id, perf, &scope, signal_type);
        }
    }

    fn advance_all(&mut self, now: f64) {
        log::trace!("frame at {now:.3}ms, {} active", self.performances.len());
        let mut finished = Vec::new();
        for (id, perf) in self.performances.iter_mut() {
            let mut ctx = StepContext {
                performance_id: *id,
                signal: &perf.signal,
                config: &self.config,
                out: &mut self.outbox,
            };
            if perf.runner.advance(now, &mut ctx) {
                finished.push(*id);
            }
        }
        for id in finished {
            if let Some(mut perf) = self.performances.shift_remove(&id) {
                perf.status = PerformanceStatus::Completed;
                log::debug!("{id} ('{}') completed", perf.definition.label());
            }
        }
    }

    fn interrupt(&mut self, correlation_id: &str, signal_type: &str) -> Vec<PerformanceId> {
        let victims: Vec<PerformanceId> = self
            .performances
            .iter()
            .filter(|(_, p)| {
                p.correlation_id.as_deref() == Some(correlation_id) && p.signal.kind != signal_type
            })
            .map(|(id, _)| *id)
            .collect();

        for id in &victims {
            if let Some(perf) = self.performances.shift_remove(id) {
                log::debug!(
                    "{id} ('{}') interrupted by '{signal_type}' in '{correlation_id}'",
                    perf.definition.label()
                );
                self.retire_interrupted(*id, perf, correlation_id, signal_type);
            }
        }
        victims
    }

    /// Emit the interrupt command for a performance already removed from the
    /// active set, then run its top-level `onInterrupt` steps instantly.
    fn retire_interrupted(
        &mut self,
        id: PerformanceId,
        mut perf: Performance,
        correlation_id: &str,
        interrupted_by: &str,
    ) {
        perf.status = PerformanceStatus::Interrupted;
        self.outbox.push(Command::Interrupt(InterruptCommand {
            performance_id: id,
            correlation_id: correlation_id.to_string(),
            interrupted_by: interrupted_by.to_string(),
        }));
        let mut ctx = StepContext {
            performance_id: id,
            signal: &perf.signal,
            config: &self.config,
            out: &mut self.outbox,
        };
        run_instantly(perf.definition.interrupt_steps(), &mut ctx);
    }
}

struct Shared {
    state: RefCell<SchedulerState>,
    sink: RefCell<Box<dyn CommandSink>>,
}

impl Shared {
    fn state_mut(&self, operation: &'static str) -> Result<RefMut<'_, SchedulerState>> {
        self.state
            .try_borrow_mut()
            .map_err(|_| ChoreoError::Reentrant { operation })
    }

    /// Hold a frame subscription exactly while performances are active.
    fn sync_frame(self: &Rc<Self>) {
        let Ok(mut st) = self.state.try_borrow_mut() else {
            return;
        };
        let wants_frame = !st.disposed && !st.performances.is_empty();
        match (wants_frame, st.frame) {
            (true, None) => {
                let weak = Rc::downgrade(self);
                let handle = st
                    .clock
                    .request_frame(Box::new(move |ts| Shared::on_frame(&weak, ts)));
                st.frame = Some(handle);
            }
            (false, Some(handle)) => {
                st.clock.cancel_frame(handle);
                st.frame = None;
            }
            _ => {}
        }
    }

    /// Deliver queued commands. If the sink is already delivering (a callback
    /// re-entered the scheduler), the outer delivery loop picks them up.
    fn flush(&self) {
        let Ok(mut sink) = self.sink.try_borrow_mut() else {
            return;
        };
        loop {
            let batch = match self.state.try_borrow_mut() {
                Ok(mut st) => std::mem::take(&mut st.outbox),
                Err(_) => break,
            };
            if batch.is_empty() {
                break;
            }
            for cmd in batch {
                cmd.dispatch(&mut **sink);
            }
        }
    }

    fn on_frame(weak: &Weak<Shared>, timestamp: f64) {
        let Some(shared) = weak.upgrade() else {
            return;
        };
        {
            let Ok(mut st) = shared.state.try_borrow_mut() else {
                log::warn!("frame fired while scheduler state was borrowed; skipping");
                return;
            };
            st.frame = None;
            if st.disposed {
                return;
            }
            st.advance_all(timestamp);
        }
        shared.sync_frame();
        shared.flush();
    }
}

/// Owns the active performances and drives them from clock frames.
pub struct Scheduler {
    shared: Rc<Shared>,
}

impl Scheduler {
    pub fn new(clock: Rc<dyn Clock>, sink: impl CommandSink + 'static) -> Self {
        Self::with_config(clock, sink, Config::default())
    }

    pub fn with_config(clock: Rc<dyn Clock>, sink: impl CommandSink + 'static, config: Config) -> Self {
        let state = SchedulerState {
            clock,
            config,
            ids: PerformanceIdAllocator::new(),
            performances: IndexMap::new(),
            frame: None,
            outbox: Vec::new(),
            disposed: false,
        };
        Self {
            shared: Rc::new(Shared {
                state: RefCell::new(state),
                sink: RefCell::new(Box::new(sink)),
            }),
        }
    }

    /// Start a performance of `definition` for `signal`. Instant leading steps
    /// run before this returns; a definition with nothing frame-bound completes
    /// immediately and never enters the active set.
    pub fn start_performance(
        &mut self,
        definition: Arc<ChoreographyDefinition>,
        signal: &PerformanceSignal,
        correlation_id: Option<&str>,
    ) -> Result<PerformanceId> {
        let id = {
            let mut st = self.shared.state_mut("start_performance")?;
            if st.disposed {
                return Err(ChoreoError::Disposed);
            }
            st.start(definition, signal.clone(), correlation_id.map(str::to_owned))
        };
        self.shared.sync_frame();
        self.shared.flush();
        Ok(id)
    }

    /// Interrupt every active performance in `correlation_id` whose triggering
    /// signal type differs from `signal_type`. Each one gets an interrupt
    /// command, then its top-level `onInterrupt` steps run instantly.
    pub fn interrupt_by_correlation_id(
        &mut self,
        correlation_id: &str,
        signal_type: &str,
    ) -> Result<Vec<PerformanceId>> {
        let victims = {
            let mut st = self.shared.state_mut("interrupt_by_correlation_id")?;
            if st.disposed {
                return Err(ChoreoError::Disposed);
            }
            st.interrupt(correlation_id, signal_type)
        };
        self.shared.sync_frame();
        self.shared.flush();
        Ok(victims)
    }

    pub fn active_count(&self) -> usize {
        self.shared
            .state
            .try_borrow()
            .map(|st| st.performances.len())
            .unwrap_or(0)
    }

    /// Active performances in start order.
    pub fn active_performances(&self) -> Vec<PerformanceInfo> {
        self.shared
            .state
            .try_borrow()
            .map(|st| st.performances.values().map(Performance::info).collect())
            .unwrap_or_default()
    }

    /// Whether a clock frame is currently requested.
    pub fn frame_subscribed(&self) -> bool {
        self.shared
            .state
            .try_borrow()
            .map(|st| st.frame.is_some())
            .unwrap_or(false)
    }

    pub fn config(&self) -> Config {
        self.shared
            .state
            .try_borrow()
            .map(|st| st.config.clone())
            .unwrap_or_default()
    }

    pub fn is_disposed(&self) -> bool {
        self.shared
            .state
            .try_borrow()
            .map(|st| st.disposed)
            .unwrap_or(false)
    }

    /// Hard stop: drop every performance and release the frame subscription.
    /// Idempotent.
    ///
    /// No `on_interrupt` and no `onInterrupt` cleanup is sent. Dispose is host
    /// teardown: the sink and the renderer behind it are going away with the
    /// scheduler, so there is nobody left to animate cleanup for. Hosts that
    /// want renderers told should call `interrupt_by_correlation_id` first.
    pub fn dispose(&mut self) {
        let Ok(mut st) = self.shared.state.try_borrow_mut() else {
            log::warn!("dispose called re-entrantly; ignoring");
            return;
        };
        if st.disposed {
            return;
        }
        st.disposed = true;
        let dropped = st.performances.len();
        st.performances.clear();
        st.outbox.clear();
        if let Some(handle) = st.frame.take() {
            st.clock.cancel_frame(handle);
        }
        log::debug!("scheduler disposed, {dropped} performance(s) dropped");
    }

    /// Test hook: restart performance numbering. Only allowed while idle.
    pub fn reset_ids(&mut self) -> Result<()> {
        let mut st = self.shared.state_mut("reset_ids")?;
        if !st.performances.is_empty() {
            return Err(ChoreoError::Busy {
                operation: "reset performance ids",
                active: st.performances.len(),
            });
        }
        st.ids.reset();
        Ok(())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Ok(mut st) = self.shared.state.try_borrow_mut() {
            if let Some(handle) = st.frame.take() {
                st.clock.cancel_frame(handle);
            }
        }
    }
}

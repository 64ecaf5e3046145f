//! Choreographer: the single entry point binding registry, matcher and scheduler.

use std::rc::Rc;
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::{Config, WhenPolicy};
use crate::data::ChoreographyDefinition;
use crate::error::{ChoreoError, Result};
use crate::ids::PerformanceId;
use crate::matcher::matches_when_with;
use crate::performance::PerformanceInfo;
use crate::registry::Registry;
use crate::scheduler::Scheduler;
use crate::signal::PerformanceSignal;
use crate::sink::CommandSink;
use crate::stored_choreography::parse_choreographies_json;

pub struct Choreographer {
    registry: Registry,
    scheduler: Scheduler,
    when_policy: WhenPolicy,
}

impl Choreographer {
    pub fn new(clock: Rc<dyn Clock>, sink: impl CommandSink + 'static) -> Self {
        Self::with_config(clock, sink, Config::default())
    }

    pub fn with_config(clock: Rc<dyn Clock>, sink: impl CommandSink + 'static, config: Config) -> Self {
        let when_policy = config.when_policy;
        Self {
            registry: Registry::new(),
            scheduler: Scheduler::with_config(clock, sink, config),
            when_policy,
        }
    }

    pub fn register(&mut self, definition: ChoreographyDefinition) {
        self.registry.register(definition);
    }

    pub fn register_all<I>(&mut self, definitions: I)
    where
        I: IntoIterator<Item = ChoreographyDefinition>,
    {
        self.registry.register_all(definitions);
    }

    /// Parse and register every definition in a JSON document. Returns how many were added.
    pub fn load_json(&mut self, json: &str) -> Result<usize> {
        let defs = parse_choreographies_json(json)?;
        let n = defs.len();
        self.registry.register_all(defs);
        Ok(n)
    }

    /// Start one performance per registered definition for `signal.type` whose
    /// `when` clause matches. Interrupting definitions first cancel other
    /// choreographies in the same correlation scope.
    pub fn handle_signal(
        &mut self,
        signal: &PerformanceSignal,
        correlation_id: Option<&str>,
    ) -> Result<Vec<PerformanceId>> {
        if self.scheduler.is_disposed() {
            return Err(ChoreoError::Disposed);
        }
        let matching: Vec<Arc<ChoreographyDefinition>> = self
            .registry
            .get_for_signal_type(&signal.kind)
            .iter()
            .filter(|def| matches_when_with(def.when.as_ref(), signal, self.when_policy))
            .cloned()
            .collect();
        log::debug!(
            "signal '{}' matched {} choreography(ies)",
            signal.kind,
            matching.len()
        );

        let mut started = Vec::with_capacity(matching.len());
        for def in matching {
            if def.interrupts {
                if let Some(cid) = correlation_id {
                    self.scheduler.interrupt_by_correlation_id(cid, &signal.kind)?;
                }
            }
            started.push(self.scheduler.start_performance(def, signal, correlation_id)?);
        }
        Ok(started)
    }

    pub fn active_performance_count(&self) -> usize {
        self.scheduler.active_count()
    }

    pub fn active_performances(&self) -> Vec<PerformanceInfo> {
        self.scheduler.active_performances()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Drop all registered definitions. Running performances are unaffected.
    pub fn clear_registry(&mut self) {
        self.registry.clear();
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    pub fn dispose(&mut self) {
        self.scheduler.dispose();
    }
}

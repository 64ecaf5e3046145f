use std::rc::Rc;

use serde_json::json;
use stagehand::{
    get_easing, resolve_signal_ref, ActionStep, ChoreographyDefinition, Choreographer, Command,
    PerformanceSignal, RecordingSink, TestClock,
};

fn setup() -> (Rc<TestClock>, RecordingSink, Choreographer) {
    let clock = Rc::new(TestClock::new());
    let sink = RecordingSink::new();
    let ch = Choreographer::new(clock.clone(), sink.clone());
    (clock, sink, ch)
}

fn move_def(on: &str, duration: f64) -> ChoreographyDefinition {
    ChoreographyDefinition::new(on, vec![ActionStep::new("move", "a").duration(duration).into()])
}

#[test]
fn dispatch_move_emits_start_updates_complete_in_order() {
    let (clock, sink, mut ch) = setup();
    ch.register(move_def("task_dispatch", 800.0));
    let ids = ch
        .handle_signal(&PerformanceSignal::new("task_dispatch"), None)
        .unwrap();
    assert_eq!(ids.len(), 1);

    clock.advance_in_frames(800.0, 16.0);

    let cmds = sink.commands();
    assert!(matches!(cmds.first(), Some(Command::ActionStart(_))));
    assert!(matches!(cmds.last(), Some(Command::ActionComplete(_))));
    let updates: Vec<f64> = cmds
        .iter()
        .filter_map(|c| match c {
            Command::ActionUpdate(u) => Some(u.progress),
            _ => None,
        })
        .collect();
    assert!(!updates.is_empty());
    assert_eq!(updates.len() + 2, cmds.len());
    assert!(updates.windows(2).all(|w| w[0] < w[1]), "progress strictly increasing");
    assert!(updates.iter().all(|p| (0.0..1.0).contains(p)));
    assert!(cmds.iter().all(|c| c.performance_id() == ids[0]));
    assert_eq!(ch.active_performance_count(), 0);
}

#[test]
fn single_advance_over_the_whole_duration_still_reports_progress() {
    let (clock, sink, mut ch) = setup();
    ch.register(move_def("task_dispatch", 800.0));
    let ids = ch
        .handle_signal(&PerformanceSignal::new("task_dispatch"), None)
        .unwrap();
    clock.advance(800.0);

    assert_eq!(
        sink.kinds(),
        vec!["action_start", "action_update", "action_complete"]
    );
    let cmds = sink.commands();
    assert!(cmds.iter().all(|c| c.performance_id() == ids[0]));
    match &cmds[1] {
        Command::ActionUpdate(u) => {
            assert_eq!(u.progress, 0.0);
            assert!(u.progress < 1.0);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(ch.active_performance_count(), 0);
}

#[test]
fn two_frames_give_one_update_then_completion() {
    let (clock, sink, mut ch) = setup();
    ch.register(ChoreographyDefinition::new(
        "task_dispatch",
        vec![ActionStep::new("move", "a").duration(800.0).easing("easeIn").into()],
    ));
    ch.handle_signal(&PerformanceSignal::new("task_dispatch"), None)
        .unwrap();
    clock.advance(400.0);
    clock.advance(400.0);
    assert_eq!(
        sink.kinds(),
        vec!["action_start", "action_update", "action_complete"]
    );
    match &sink.commands()[1] {
        Command::ActionUpdate(u) => {
            assert!((u.raw_progress - 0.5).abs() < 1e-12);
            assert!((u.progress - 0.25).abs() < 1e-12);
            assert!((u.elapsed - 400.0).abs() < 1e-12);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn frames_that_do_not_advance_time_emit_nothing_new() {
    let (clock, sink, mut ch) = setup();
    ch.register(move_def("x", 100.0));
    ch.handle_signal(&PerformanceSignal::new("x"), None).unwrap();
    clock.advance(0.0);
    clock.advance(0.0);
    assert_eq!(sink.kinds(), vec!["action_start", "action_update"]);
    match &sink.commands()[1] {
        Command::ActionUpdate(u) => assert_eq!(u.progress, 0.0),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn same_type_definitions_fire_independent_performances() {
    let (_clock, _sink, mut ch) = setup();
    ch.register(move_def("error", 300.0));
    ch.register(move_def("error", 500.0));
    let ids = ch.handle_signal(&PerformanceSignal::new("error"), None).unwrap();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
    assert_eq!(ch.active_performance_count(), 2);
}

#[test]
fn when_clause_filters_definitions() {
    let (_clock, _sink, mut ch) = setup();
    let def: ChoreographyDefinition = serde_json::from_value(json!({
        "on": "tool_call",
        "when": { "field": "tool", "value": "Bash" },
        "steps": [ { "action": "pulse", "entity": "x", "duration": 100 } ]
    }))
    .unwrap();
    ch.register(def);
    ch.register(move_def("tool_call", 100.0));

    let read = PerformanceSignal::new("tool_call").field("tool", "Read");
    assert_eq!(ch.handle_signal(&read, None).unwrap().len(), 1);
    let bash = PerformanceSignal::new("tool_call").field("tool", "Bash");
    assert_eq!(ch.handle_signal(&bash, None).unwrap().len(), 2);
}

#[test]
fn performances_advance_in_start_order_within_a_frame() {
    let (clock, sink, mut ch) = setup();
    ch.register(move_def("a", 100.0));
    ch.register(move_def("b", 100.0));
    let first = ch.handle_signal(&PerformanceSignal::new("b"), None).unwrap()[0];
    let second = ch.handle_signal(&PerformanceSignal::new("a"), None).unwrap()[0];
    sink.drain();
    clock.advance(50.0);
    let order: Vec<_> = sink.commands().iter().map(Command::performance_id).collect();
    assert_eq!(order, vec![first, second]);
}

#[test]
fn signal_is_snapshotted_at_start() {
    let (clock, sink, mut ch) = setup();
    ch.register(ChoreographyDefinition::new(
        "task_dispatch",
        vec![
            ActionStep::new("move", "signal.to").duration(100.0).into(),
            ActionStep::new("flash", "signal.to").into(),
        ],
    ));
    let mut sig = PerformanceSignal::new("task_dispatch").field("to", "agent-1");
    ch.handle_signal(&sig, None).unwrap();
    sig.payload.insert("to".into(), json!("agent-9"));
    clock.advance(100.0);
    assert!(sink
        .commands()
        .iter()
        .filter_map(Command::action)
        .all(|a| a.entity == "agent-1"));
}

#[test]
fn step_params_are_resolved_against_the_signal() {
    let (_clock, sink, mut ch) = setup();
    ch.register(ChoreographyDefinition::new(
        "task_dispatch",
        vec![ActionStep::new("spawn", "packet")
            .to("signal.to")
            .param("label", "signal.task.title")
            .param("kind", "signal.type")
            .param("size", 3)
            .into()],
    ));
    let sig = PerformanceSignal::with_payload(
        "task_dispatch",
        json!({ "to": "agent-1", "task": { "title": "Write docs" } }),
    );
    ch.handle_signal(&sig, None).unwrap();
    let cmds = sink.commands();
    let action = cmds[0].action().unwrap();
    assert_eq!(action.entity, "packet");
    assert_eq!(action.to, Some(json!("agent-1")));
    assert_eq!(
        serde_json::Value::Object(action.params.clone()),
        json!({ "label": "Write docs", "kind": "task_dispatch", "size": 3 })
    );
}

#[test]
fn empty_definitions_produce_no_commands() {
    let (clock, sink, mut ch) = setup();
    ch.register(ChoreographyDefinition::new("noop", vec![]));
    let ids = ch.handle_signal(&PerformanceSignal::new("noop"), None).unwrap();
    assert_eq!(ids.len(), 1);
    assert_eq!(ch.active_performance_count(), 0);
    assert_eq!(clock.pending_frames(), 0);
    assert!(sink.is_empty());
}

#[test]
fn reference_and_easing_lookups() {
    let sig = PerformanceSignal::new("task_dispatch").field("to", "agent-1");
    assert_eq!(resolve_signal_ref("signal.to", &sig), Some(json!("agent-1")));
    assert_eq!(resolve_signal_ref("signal.missing.path", &sig), None);
    assert!(get_easing("bogus").is_none());
    assert_eq!(get_easing("arc").unwrap()(0.5), 1.0);
    assert_eq!(get_easing("easeInOut").unwrap()(0.5), 0.5);
}

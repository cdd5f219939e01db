//! Integration tests for command queue ordering, cancellation and diagnostics

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use tracing::field::{Field, Visit};
use tracing::{Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

use unit_orders::hal::{Journal, MockCommand, MockOutcome, MockUnit};
use unit_orders::{
    Command, CommandPriority, CommandQueue, CommandStatus, InFlightPolicy, MoveCommand, Position,
    SchedulerConfig,
};

// ============================================================================
// Log capture
// ============================================================================

#[derive(Clone, Debug)]
struct CapturedEvent {
    level: Level,
    message: String,
    command: Option<String>,
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    command: Option<String>,
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{:?}", value),
            "command" => self.command = Some(format!("{:?}", value).trim_matches('"').to_string()),
            _ => {}
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "command" => self.command = Some(value.to_string()),
            _ => {}
        }
    }
}

#[derive(Clone, Default)]
struct CaptureLayer {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl CaptureLayer {
    fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    fn warnings(&self) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.level == Level::WARN)
            .collect()
    }
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        let captured = CapturedEvent {
            level: *event.metadata().level(),
            message: visitor.message,
            command: visitor.command,
        };
        self.events
            .lock()
            .map(|mut events| events.push(captured))
            .ok();
    }
}

fn capture<R>(f: impl FnOnce() -> R) -> (R, CaptureLayer) {
    let layer = CaptureLayer::default();
    let subscriber = tracing_subscriber::registry().with(layer.clone());
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, layer)
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn drains_in_priority_order() {
    let journal = Journal::new();
    let mut queue = CommandQueue::new();
    for (label, priority) in [
        ("normal", CommandPriority::Normal),
        ("high", CommandPriority::High),
        ("low", CommandPriority::Low),
        ("immediate", CommandPriority::Immediate),
    ] {
        queue
            .enqueue(Rc::new(
                MockCommand::new(label)
                    .with_priority(priority)
                    .journal(&journal),
            ))
            .unwrap();
    }

    while queue.has_pending() {
        queue.advance();
    }

    assert_eq!(journal.entries(), vec!["immediate", "high", "normal", "low"]);
}

#[test]
fn equal_priority_runs_first_in_first_out() {
    let journal = Journal::new();
    let mut queue = CommandQueue::new();
    let a = Rc::new(MockCommand::new("a").journal(&journal));
    let b = Rc::new(MockCommand::new("b").journal(&journal));
    queue.enqueue(a.clone()).unwrap();
    queue.enqueue(b.clone()).unwrap();

    queue.advance();
    assert_eq!(a.status(), CommandStatus::Completed);
    assert_eq!(b.status(), CommandStatus::Pending);

    queue.advance();
    assert_eq!(journal.entries(), vec!["a", "b"]);
}

#[test]
fn late_high_priority_does_not_interrupt_running_command() {
    let journal = Journal::new();
    let mut queue =
        CommandQueue::with_config(SchedulerConfig::default().with_in_flight(InFlightPolicy::Hold));
    let long = Rc::new(
        MockCommand::new("long")
            .with_outcome(MockOutcome::Hold)
            .journal(&journal),
    );
    queue.enqueue(long.clone()).unwrap();
    queue.advance();

    queue
        .enqueue(Rc::new(
            MockCommand::new("urgent")
                .with_priority(CommandPriority::Immediate)
                .journal(&journal),
        ))
        .unwrap();
    queue.advance();
    assert_eq!(long.status(), CommandStatus::Executing);
    assert_eq!(journal.entries(), vec!["long"]);

    long.completion().complete();
    queue.advance();
    assert_eq!(journal.entries(), vec!["long", "urgent"]);
}

#[test]
fn display_shows_current_and_pending() {
    let mut queue =
        CommandQueue::with_config(SchedulerConfig::default().with_in_flight(InFlightPolicy::Hold));
    queue
        .enqueue(Rc::new(
            MockCommand::new("guard").with_outcome(MockOutcome::Hold),
        ))
        .unwrap();
    queue.advance();
    queue.enqueue(Rc::new(MockCommand::new("patrol"))).unwrap();
    queue
        .enqueue(Rc::new(
            MockCommand::new("flee").with_priority(CommandPriority::High),
        ))
        .unwrap();

    assert_eq!(
        queue.to_string(),
        "Current: guard (executing) | Queue: [flee (High), patrol (Normal)]"
    );
}

// ============================================================================
// Cancellation
// ============================================================================

#[test]
fn clear_cancels_running_and_pending_exactly_once() {
    let mut queue =
        CommandQueue::with_config(SchedulerConfig::default().with_in_flight(InFlightPolicy::Hold));
    let running = Rc::new(MockCommand::new("running").with_outcome(MockOutcome::Hold));
    queue.enqueue(running.clone()).unwrap();
    queue.advance();

    let first = Rc::new(MockCommand::new("first"));
    let second = Rc::new(MockCommand::new("second"));
    queue.enqueue(first.clone()).unwrap();
    queue.enqueue(second.clone()).unwrap();

    queue.clear();
    queue.clear();

    assert!(!queue.has_pending());
    for cmd in [&running, &first, &second] {
        assert_eq!(cmd.cancel_count(), 1, "{} cancelled more than once", cmd.label());
        assert_eq!(cmd.status(), CommandStatus::Cancelled);
        assert_eq!(cmd.run_count(), usize::from(cmd.label() == "running"));
    }
}

#[test]
fn cancelled_observer_sees_single_notification() {
    let mut queue =
        CommandQueue::with_config(SchedulerConfig::default().with_in_flight(InFlightPolicy::Hold));
    let cmd = Rc::new(MockCommand::new("x").with_outcome(MockOutcome::Hold));
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    cmd.subscribe(Box::new(move |s| sink.borrow_mut().push(s)));

    queue.enqueue(cmd.clone()).unwrap();
    queue.advance();
    queue.cancel_current();
    queue.cancel_current();

    assert_eq!(
        *seen.borrow(),
        vec![CommandStatus::Executing, CommandStatus::Cancelled]
    );
}

// ============================================================================
// Idle queues and diagnostics
// ============================================================================

#[test]
fn advance_on_empty_queue_is_idempotent() {
    let mut queue = CommandQueue::new();
    let before = queue.to_string();
    for _ in 0..100 {
        queue.advance();
    }
    assert!(queue.is_empty());
    assert_eq!(queue.len(), 0);
    assert!(queue.current().is_none());
    assert_eq!(queue.to_string(), before);
}

#[test]
fn still_executing_after_run_is_reported() {
    let unit = Rc::new(RefCell::new(MockUnit::new().travelling()));
    let order = Rc::new(MoveCommand::new(unit.clone(), Position::new(8.0, 0.0, 0.0)));
    let mut queue = CommandQueue::new();
    queue.enqueue(order.clone()).unwrap();

    let ((), logs) = capture(|| queue.advance());

    let warnings = logs.warnings();
    assert_eq!(warnings.len(), 1, "events: {:?}", logs.events());
    assert_eq!(warnings[0].command.as_deref(), Some("move"));
    assert!(warnings[0].message.contains("still executing"));

    // Slot was freed; the move resolves on its own later.
    assert!(queue.is_empty());
    order.completion().complete();
    assert_eq!(order.status(), CommandStatus::Completed);
}

#[test]
fn hold_policy_does_not_warn() {
    let mut queue =
        CommandQueue::with_config(SchedulerConfig::default().with_in_flight(InFlightPolicy::Hold));
    queue
        .enqueue(Rc::new(
            MockCommand::new("wait").with_outcome(MockOutcome::Hold),
        ))
        .unwrap();

    let ((), logs) = capture(|| queue.advance());
    assert!(logs.warnings().is_empty());
}

#[test]
fn deadline_overrun_is_reported_and_failed() {
    let mut queue = CommandQueue::with_config(
        SchedulerConfig::default()
            .with_in_flight(InFlightPolicy::Hold)
            .with_deadline_ticks(2),
    );
    let stuck = Rc::new(MockCommand::new("stuck").with_outcome(MockOutcome::Hold));
    queue.enqueue(stuck.clone()).unwrap();

    let ((), logs) = capture(|| {
        for _ in 0..3 {
            queue.advance();
        }
    });

    assert_eq!(stuck.status(), CommandStatus::Failed);
    let warnings = logs.warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("deadline"));
}

// ============================================================================
// Properties
// ============================================================================

fn priority_strategy() -> impl Strategy<Value = CommandPriority> {
    prop_oneof![
        Just(CommandPriority::Low),
        Just(CommandPriority::Normal),
        Just(CommandPriority::High),
        Just(CommandPriority::Immediate),
    ]
}

proptest! {
    #[test]
    fn execution_order_is_stable_sort_by_priority(
        priorities in prop::collection::vec(priority_strategy(), 0..40)
    ) {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut queue = CommandQueue::new();
        for (index, priority) in priorities.iter().enumerate() {
            let cmd = Rc::new(MockCommand::new("p").with_priority(*priority));
            let sink = order.clone();
            cmd.subscribe(Box::new(move |status| {
                if status == CommandStatus::Executing {
                    sink.borrow_mut().push(index);
                }
            }));
            queue.enqueue(cmd).unwrap();
        }

        while queue.has_pending() {
            queue.advance();
        }

        let mut expected: Vec<usize> = (0..priorities.len()).collect();
        expected.sort_by_key(|&i| std::cmp::Reverse(priorities[i]));
        prop_assert_eq!(order.borrow().clone(), expected);
    }
}

//! Sequential composite command.
//!
//! A [`CompositeCommand`] runs its children one at a time, in order, and
//! resolves to a single status:
//!
//! - a child that is not runnable when reached is skipped (never run)
//! - a child reaching `Completed` advances to the next child
//! - a child reaching `Failed` fails the composite; later children never run
//! - a child reaching `Cancelled` cancels the composite
//! - running off the end of the list completes the composite
//!
//! Children may finish synchronously inside their own `run()` or later from
//! an external event. Either way the composite reacts through its status
//! subscription, and only to the child at the cursor.
//!
//! Advancing is a loop, not recursion: a child completing from inside its
//! own `run()` only flags the composite for another step, which the loop
//! already on the stack picks up. A long list of instant children costs one
//! stack frame.
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use unit_orders::{Command, CommandPriority, CommandStatus, CompositeCommand};
//! use unit_orders::{AttackCommand, MoveCommand, Position, StopCommand};
//! use unit_orders::hal::MockUnit;
//!
//! let unit = Rc::new(RefCell::new(MockUnit::new()));
//! unit.borrow_mut().fail_attacks = true;
//!
//! let raid = CompositeCommand::new(CommandPriority::High);
//! raid.push(Rc::new(MoveCommand::new(unit.clone(), Position::new(1.0, 0.0, 0.0)))).unwrap();
//! raid.push(Rc::new(AttackCommand::new(unit.clone(), 42))).unwrap();
//! raid.push(Rc::new(StopCommand::new(unit.clone()))).unwrap();
//!
//! raid.run();
//! assert_eq!(raid.status(), CommandStatus::Failed);
//! assert_eq!(unit.borrow().stops, 0); // abandoned after the failed attack
//! ```

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::commands::{Command, CommandPriority, CommandStatus};
use crate::error::SchedulerError;
use crate::lifecycle::CommandState;

/// Runs child commands in sequence as one command.
pub struct CompositeCommand {
    state: CommandState,
    priority: CommandPriority,
    children: RefCell<Vec<Rc<dyn Command>>>,
    /// Index of the child being run; `None` before the first.
    cursor: Cell<Option<usize>>,
    started: Cell<bool>,
    driving: Cell<bool>,
    advance_requested: Cell<bool>,
    this: Weak<CompositeCommand>,
}

impl CompositeCommand {
    /// Creates an empty composite with the given priority.
    pub fn new(priority: CommandPriority) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            state: CommandState::new(),
            priority,
            children: RefCell::new(Vec::new()),
            cursor: Cell::new(None),
            started: Cell::new(false),
            driving: Cell::new(false),
            advance_requested: Cell::new(false),
            this: this.clone(),
        })
    }

    /// Creates a composite from an ordered list of children.
    pub fn sequence(
        priority: CommandPriority,
        children: impl IntoIterator<Item = Rc<dyn Command>>,
    ) -> Rc<Self> {
        let composite = Self::new(priority);
        for child in children {
            composite.attach(child);
        }
        composite
    }

    /// Appends a child.
    ///
    /// Only allowed before the composite has been run.
    pub fn push(&self, child: Rc<dyn Command>) -> Result<(), SchedulerError> {
        if self.started.get() || self.state.is_finished() {
            return Err(SchedulerError::AlreadyStarted);
        }
        self.attach(child);
        Ok(())
    }

    /// Number of children.
    pub fn len(&self) -> usize {
        self.children.borrow().len()
    }

    /// Returns true if there are no children.
    pub fn is_empty(&self) -> bool {
        self.children.borrow().is_empty()
    }

    /// Index of the child currently being run, if any.
    pub fn cursor(&self) -> Option<usize> {
        self.cursor.get()
    }

    /// The child at the cursor, if any.
    pub fn current_child(&self) -> Option<Rc<dyn Command>> {
        let index = self.cursor.get()?;
        self.children.borrow().get(index).cloned()
    }

    fn attach(&self, child: Rc<dyn Command>) {
        let mut children = self.children.borrow_mut();
        let index = children.len();
        let this = self.this.clone();
        child.state().subscribe(move |status| {
            if let Some(composite) = this.upgrade() {
                composite.on_child_status(index, status);
            }
        });
        children.push(child);
    }

    fn on_child_status(&self, index: usize, status: CommandStatus) {
        // Superseded children and a finished composite are ignored.
        if self.cursor.get() != Some(index) || self.state.is_finished() {
            return;
        }
        match status {
            CommandStatus::Completed => self.request_advance(),
            CommandStatus::Failed => {
                debug!(child = index, "composite child failed");
                self.state.update(CommandStatus::Failed);
            }
            CommandStatus::Cancelled => {
                debug!(child = index, "composite child cancelled");
                self.state.update(CommandStatus::Cancelled);
            }
            CommandStatus::Pending | CommandStatus::Executing => {}
        }
    }

    /// Called once the composite is terminal; the child's notification is
    /// then ignored by `on_child_status`.
    fn cancel_running_child(&self) {
        if let Some(child) = self.current_child() {
            if child.can_cancel() && !child.status().is_terminal() {
                child.cancel();
            }
        }
    }

    fn request_advance(&self) {
        self.advance_requested.set(true);
        if self.driving.replace(true) {
            // The loop below is already on the stack and will pick this up.
            return;
        }
        while self.advance_requested.replace(false) {
            self.start_next_child();
        }
        self.driving.set(false);
    }

    /// Moves the cursor forward to the next runnable child and runs it, or
    /// completes the composite when none is left.
    fn start_next_child(&self) {
        loop {
            if self.state.is_finished() {
                return;
            }
            let next = self.cursor.get().map_or(0, |i| i + 1);
            self.cursor.set(Some(next));

            let child = self.children.borrow().get(next).cloned();
            let Some(child) = child else {
                self.state.update(CommandStatus::Completed);
                return;
            };

            if child.can_run() {
                trace!(child = next, name = child.name(), "composite starting child");
                child.run();
                return;
            }
            debug!(child = next, name = child.name(), "composite skipping unrunnable child");
        }
    }
}

impl Command for CompositeCommand {
    fn can_run(&self) -> bool {
        !self.state.is_finished()
            && !self.started.get()
            && self.children.borrow().iter().any(|c| c.can_run())
    }

    fn run(&self) {
        if self.started.get() {
            debug!("composite already started");
            return;
        }
        if !self.state.begin(self.can_run()) {
            return;
        }
        self.started.set(true);
        self.request_advance();
    }

    fn cancel(&self) {
        if !self.state.cancel(true) {
            return;
        }
        self.cancel_running_child();
    }

    fn abort(&self) {
        if !self.state.update(CommandStatus::Failed) {
            return;
        }
        self.cancel_running_child();
    }

    fn priority(&self) -> CommandPriority {
        self.priority
    }

    fn state(&self) -> &CommandState {
        &self.state
    }

    fn name(&self) -> &'static str {
        "composite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{MockCommand, MockOutcome};

    fn seq(children: &[&Rc<MockCommand>]) -> Rc<CompositeCommand> {
        CompositeCommand::sequence(
            CommandPriority::Normal,
            children.iter().map(|c| (*c).clone() as Rc<dyn Command>),
        )
    }

    #[test]
    fn empty_composite_fails_at_dispatch() {
        let composite = CompositeCommand::new(CommandPriority::Normal);
        assert!(composite.is_empty());
        assert!(!composite.can_run());
        composite.run();
        assert_eq!(composite.status(), CommandStatus::Failed);
    }

    #[test]
    fn runs_all_instant_children_in_order() {
        let a = Rc::new(MockCommand::new("a"));
        let b = Rc::new(MockCommand::new("b"));
        let c = Rc::new(MockCommand::new("c"));
        let composite = seq(&[&a, &b, &c]);

        composite.run();

        assert_eq!(composite.status(), CommandStatus::Completed);
        for child in [&a, &b, &c] {
            assert_eq!(child.run_count(), 1);
            assert_eq!(child.status(), CommandStatus::Completed);
        }
        assert_eq!(composite.cursor(), Some(3));
    }

    #[test]
    fn waits_for_deferred_child() {
        let a = Rc::new(MockCommand::new("a").with_outcome(MockOutcome::Hold));
        let b = Rc::new(MockCommand::new("b"));
        let composite = seq(&[&a, &b]);

        composite.run();
        assert_eq!(composite.status(), CommandStatus::Executing);
        assert_eq!(b.run_count(), 0);

        a.completion().complete();
        assert_eq!(b.run_count(), 1);
        assert_eq!(composite.status(), CommandStatus::Completed);
    }

    #[test]
    fn skips_unrunnable_children() {
        let a = Rc::new(MockCommand::new("a").unrunnable());
        let b = Rc::new(MockCommand::new("b"));
        let composite = seq(&[&a, &b]);

        assert!(composite.can_run());
        composite.run();

        assert_eq!(a.run_count(), 0);
        assert_eq!(a.status(), CommandStatus::Pending);
        assert_eq!(b.run_count(), 1);
        assert_eq!(composite.status(), CommandStatus::Completed);
    }

    #[test]
    fn all_unrunnable_fails_at_dispatch() {
        let a = Rc::new(MockCommand::new("a").unrunnable());
        let composite = seq(&[&a]);
        composite.run();
        assert_eq!(composite.status(), CommandStatus::Failed);
        assert_eq!(a.status(), CommandStatus::Pending);
    }

    #[test]
    fn child_failure_fails_composite() {
        let a = Rc::new(MockCommand::new("a"));
        let b = Rc::new(MockCommand::new("b").with_outcome(MockOutcome::Fail));
        let c = Rc::new(MockCommand::new("c"));
        let composite = seq(&[&a, &b, &c]);

        composite.run();

        assert_eq!(composite.status(), CommandStatus::Failed);
        assert_eq!(c.run_count(), 0);
        assert_eq!(c.status(), CommandStatus::Pending);
    }

    #[test]
    fn child_cancel_cancels_composite() {
        let a = Rc::new(MockCommand::new("a").with_outcome(MockOutcome::Hold));
        let b = Rc::new(MockCommand::new("b"));
        let composite = seq(&[&a, &b]);

        composite.run();
        a.cancel();

        assert_eq!(composite.status(), CommandStatus::Cancelled);
        assert_eq!(b.run_count(), 0);
    }

    #[test]
    fn cancel_forwards_to_running_child_once() {
        let a = Rc::new(MockCommand::new("a").with_outcome(MockOutcome::Hold));
        let b = Rc::new(MockCommand::new("b"));
        let composite = seq(&[&a, &b]);

        composite.run();
        composite.cancel();
        composite.cancel();

        assert_eq!(composite.status(), CommandStatus::Cancelled);
        assert_eq!(a.status(), CommandStatus::Cancelled);
        assert_eq!(a.cancel_count(), 1);
        assert_eq!(b.cancel_count(), 0);
        assert_eq!(b.status(), CommandStatus::Pending);
    }

    #[test]
    fn cancel_skips_uncancellable_child() {
        let a = Rc::new(
            MockCommand::new("a")
                .with_outcome(MockOutcome::Hold)
                .uncancellable(),
        );
        let composite = seq(&[&a]);

        composite.run();
        composite.cancel();

        assert_eq!(composite.status(), CommandStatus::Cancelled);
        assert_eq!(a.cancel_count(), 0);
        assert_eq!(a.status(), CommandStatus::Executing);

        // Late completion of the orphaned child is ignored.
        a.completion().complete();
        assert_eq!(composite.status(), CommandStatus::Cancelled);
    }

    #[test]
    fn stale_child_notification_ignored() {
        let a = Rc::new(MockCommand::new("a").unrunnable());
        let b = Rc::new(MockCommand::new("b").with_outcome(MockOutcome::Hold));
        let composite = seq(&[&a, &b]);

        composite.run();
        assert_eq!(composite.cursor(), Some(1));

        // `a` was skipped and is no longer at the cursor; failing it does nothing.
        assert!(a.state().update(CommandStatus::Failed));
        assert_eq!(composite.status(), CommandStatus::Executing);

        b.completion().complete();
        assert_eq!(composite.status(), CommandStatus::Completed);
    }

    #[test]
    fn push_after_start_rejected() {
        let a = Rc::new(MockCommand::new("a").with_outcome(MockOutcome::Hold));
        let composite = seq(&[&a]);
        composite.run();

        let late = Rc::new(MockCommand::new("late"));
        assert_eq!(composite.push(late), Err(SchedulerError::AlreadyStarted));
        assert_eq!(composite.len(), 1);
    }

    #[test]
    fn second_run_is_ignored() {
        let a = Rc::new(MockCommand::new("a").with_outcome(MockOutcome::Hold));
        let composite = seq(&[&a]);
        composite.run();
        composite.run();
        assert_eq!(a.run_count(), 1);
    }

    #[test]
    fn long_instant_sequence_completes() {
        let children: Vec<Rc<MockCommand>> =
            (0..5_000).map(|_| Rc::new(MockCommand::new("n"))).collect();
        let composite = CompositeCommand::sequence(
            CommandPriority::Low,
            children.iter().map(|c| c.clone() as Rc<dyn Command>),
        );

        composite.run();

        assert_eq!(composite.status(), CommandStatus::Completed);
        assert!(children.iter().all(|c| c.run_count() == 1));
    }

    #[test]
    fn nested_composites_propagate() {
        let a = Rc::new(MockCommand::new("a"));
        let b = Rc::new(MockCommand::new("b").with_outcome(MockOutcome::Hold));
        let inner = seq(&[&a, &b]);
        let after = Rc::new(MockCommand::new("after"));
        let outer = CompositeCommand::sequence(
            CommandPriority::Normal,
            [inner.clone() as Rc<dyn Command>, after.clone()],
        );

        outer.run();
        assert_eq!(outer.status(), CommandStatus::Executing);

        b.completion().complete();
        assert_eq!(inner.status(), CommandStatus::Completed);
        assert_eq!(after.run_count(), 1);
        assert_eq!(outer.status(), CommandStatus::Completed);
    }
}

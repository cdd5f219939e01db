//! Conditional command: a command gated by a predicate.
//!
//! The predicate is evaluated fresh on every guard check, never cached. If
//! the guard fails at dispatch the conditional fails without ever starting
//! the wrapped command. Once the wrapped command runs, the conditional
//! mirrors its terminal status one-to-one.
//!
//! ```rust
//! use std::cell::{Cell, RefCell};
//! use std::rc::Rc;
//! use unit_orders::{Command, CommandStatus, ConditionalCommand, MoveCommand, Position};
//! use unit_orders::hal::MockUnit;
//!
//! let unit = Rc::new(RefCell::new(MockUnit::new()));
//! let in_range = Rc::new(Cell::new(false));
//!
//! let flag = in_range.clone();
//! let advance = ConditionalCommand::new(
//!     Rc::new(MoveCommand::new(unit.clone(), Position::new(5.0, 0.0, 5.0))),
//!     move || flag.get(),
//! );
//!
//! assert!(!advance.can_run());
//! in_range.set(true);
//! assert!(advance.can_run());
//! ```

use std::rc::{Rc, Weak};

use tracing::debug;

use crate::commands::{Command, CommandPriority, CommandStatus};
use crate::lifecycle::CommandState;

/// Wraps one command behind a boolean predicate.
pub struct ConditionalCommand {
    state: CommandState,
    priority: CommandPriority,
    inner: Rc<dyn Command>,
    predicate: Box<dyn Fn() -> bool>,
}

impl ConditionalCommand {
    /// Wraps `inner`, taking its priority.
    pub fn new(inner: Rc<dyn Command>, predicate: impl Fn() -> bool + 'static) -> Rc<Self> {
        let priority = inner.priority();
        Self::with_priority(inner, predicate, priority)
    }

    /// Wraps `inner` with an explicit priority.
    pub fn with_priority(
        inner: Rc<dyn Command>,
        predicate: impl Fn() -> bool + 'static,
        priority: CommandPriority,
    ) -> Rc<Self> {
        Rc::new_cyclic(|this: &Weak<Self>| {
            let this = this.clone();
            inner.state().subscribe(move |status| {
                if let Some(conditional) = this.upgrade() {
                    conditional.on_inner_status(status);
                }
            });
            Self {
                state: CommandState::new(),
                priority,
                inner,
                predicate: Box::new(predicate),
            }
        })
    }

    /// The wrapped command.
    pub fn inner(&self) -> &Rc<dyn Command> {
        &self.inner
    }

    /// Evaluates the predicate now.
    pub fn condition_holds(&self) -> bool {
        (self.predicate)()
    }

    fn on_inner_status(&self, status: CommandStatus) {
        // Only mirror once this wrapper has actually dispatched the child.
        if self.state.status() != CommandStatus::Executing {
            return;
        }
        match status {
            CommandStatus::Completed | CommandStatus::Failed | CommandStatus::Cancelled => {
                self.state.update(status);
            }
            CommandStatus::Pending | CommandStatus::Executing => {}
        }
    }
}

impl Command for ConditionalCommand {
    fn can_run(&self) -> bool {
        !self.state.is_finished() && self.condition_holds() && self.inner.can_run()
    }

    fn run(&self) {
        let runnable = self.can_run();
        if !runnable {
            debug!(inner = self.inner.name(), "condition not met, failing");
        }
        if !self.state.begin(runnable) {
            return;
        }
        self.inner.run();
    }

    fn cancel(&self) {
        if self.state.is_finished() {
            return;
        }
        if self.inner.can_cancel() && !self.inner.status().is_terminal() {
            // Resolves this wrapper through `on_inner_status` when executing.
            self.inner.cancel();
        }
        self.state.cancel(true);
    }

    fn abort(&self) {
        if !self.state.update(CommandStatus::Failed) {
            return;
        }
        // The wrapper is no longer executing, so the child's cancellation
        // is not mirrored back.
        if self.inner.can_cancel() && !self.inner.status().is_terminal() {
            self.inner.cancel();
        }
    }

    fn priority(&self) -> CommandPriority {
        self.priority
    }

    fn state(&self) -> &CommandState {
        &self.state
    }

    fn name(&self) -> &'static str {
        "conditional"
    }
}

//! Leaf commands that drive a unit's actuators.
//!
//! Each leaf holds a shared handle to its unit (`Rc<RefCell<U>>`) and
//! depends only on the capability it uses. Actuator errors are caught here,
//! logged, and turned into `Failed`; they never propagate to the queue.
//!
//! | Command | Capability | Default priority | Resolves |
//! |---------|-----------|------------------|----------|
//! | [`MoveCommand`] | [`Moveable`] | `Normal` | on arrival, possibly ticks later |
//! | [`AttackCommand`] | [`Attackable`] | `Normal` | inside `run()` |
//! | [`StopCommand`] | [`Stoppable`] | `High` | inside `run()` |
//!
//! The unit is never borrowed across a status update, so observers reacting
//! to a completion may immediately dispatch the next order to the same unit.
//!
//! # Multi-tick moves
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use unit_orders::{Command, CommandStatus, MoveCommand, Position};
//! use unit_orders::hal::MockUnit;
//!
//! let unit = Rc::new(RefCell::new(MockUnit::new().travelling()));
//! let order = MoveCommand::new(unit.clone(), Position::new(10.0, 0.0, 0.0));
//! let arrival = order.completion();
//!
//! order.run();
//! assert_eq!(order.status(), CommandStatus::Executing);
//!
//! // Later, the unit's arrival callback fires:
//! arrival.complete();
//! assert_eq!(order.status(), CommandStatus::Completed);
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::commands::{Command, CommandPriority, CommandStatus};
use crate::lifecycle::{CommandState, Completion};
use crate::traits::{Attackable, MoveProgress, Moveable, Position, Stoppable};

/// State shared by every leaf command.
struct ActionCore {
    state: CommandState,
    priority: CommandPriority,
    cancellable: bool,
}

impl ActionCore {
    fn new(priority: CommandPriority) -> Self {
        Self {
            state: CommandState::new(),
            priority,
            cancellable: true,
        }
    }

    fn runnable(&self) -> bool {
        !self.state.is_finished()
    }

    /// Resolves the outcome of an actuator call made inside `run()`.
    fn settle<E: core::fmt::Debug>(&self, name: &'static str, outcome: Option<Result<(), E>>) {
        match outcome {
            Some(Ok(())) => {
                self.state.update(CommandStatus::Completed);
            }
            Some(Err(error)) => {
                warn!(command = name, error = ?error, "actuator call failed");
                self.state.update(CommandStatus::Failed);
            }
            None => {
                warn!(command = name, "unit is busy, cannot act");
                self.state.update(CommandStatus::Failed);
            }
        }
    }
}

/// Runs `f` against the unit if it is not already borrowed.
///
/// The borrow ends before this returns.
fn with_unit<U, R>(unit: &RefCell<U>, f: impl FnOnce(&mut U) -> R) -> Option<R> {
    let mut guard = unit.try_borrow_mut().ok()?;
    Some(f(&mut guard))
}

/// Shared-borrow guard check; a unit borrowed mutably elsewhere is not ready.
fn inspect_unit<U>(unit: &RefCell<U>, f: impl FnOnce(&U) -> bool) -> bool {
    unit.try_borrow().map(|u| f(&u)).unwrap_or(false)
}

macro_rules! leaf_builders {
    ($ty:ident < $($g:ident),+ >) => {
        impl<$($g),+> $ty<$($g),+> {
            /// Sets the ordering priority.
            pub fn with_priority(mut self, priority: CommandPriority) -> Self {
                self.core.priority = priority;
                self
            }

            /// Makes cancellation requests no-ops.
            pub fn uncancellable(mut self) -> Self {
                self.core.cancellable = false;
                self
            }
        }
    };
}

// ============================================================================
// Move
// ============================================================================

/// Orders a unit to move to a position.
///
/// Completes inside `run()` when the unit reports [`MoveProgress::Arrived`].
/// Otherwise it stays `Executing` until the unit's own arrival event calls
/// [`Completion::complete`] (or [`Completion::fail`]) on the handle from
/// [`completion`](Self::completion).
pub struct MoveCommand<U> {
    core: ActionCore,
    unit: Rc<RefCell<U>>,
    destination: Position,
}

impl<U: Moveable> MoveCommand<U> {
    /// Creates a move order with `Normal` priority.
    pub fn new(unit: Rc<RefCell<U>>, destination: Position) -> Self {
        Self {
            core: ActionCore::new(CommandPriority::Normal),
            unit,
            destination,
        }
    }

    /// Target position.
    pub fn destination(&self) -> Position {
        self.destination
    }

    /// Handle for the unit's arrival event.
    pub fn completion(&self) -> Completion {
        self.core.state.completion()
    }
}

leaf_builders!(MoveCommand<U>);

impl<U: Moveable> Command for MoveCommand<U> {
    fn can_run(&self) -> bool {
        self.core.runnable() && inspect_unit(&self.unit, |u| u.can_move_to(&self.destination))
    }

    fn run(&self) {
        if !self.core.state.begin(self.can_run()) {
            return;
        }
        let destination = self.destination;
        match with_unit(&self.unit, |u| u.move_to(destination)) {
            Some(Ok(MoveProgress::Arrived)) => {
                self.core.state.update(CommandStatus::Completed);
            }
            Some(Ok(MoveProgress::EnRoute)) => {
                debug!(destination = ?destination, "unit en route");
            }
            Some(Err(error)) => self.core.settle("move", Some(Err(error))),
            None => self.core.settle::<()>("move", None),
        }
    }

    fn cancel(&self) {
        if self.core.state.cancel(self.core.cancellable) {
            debug!(destination = ?self.destination, "move cancelled");
        }
    }

    fn can_cancel(&self) -> bool {
        self.core.cancellable
    }

    fn priority(&self) -> CommandPriority {
        self.core.priority
    }

    fn state(&self) -> &CommandState {
        &self.core.state
    }

    fn name(&self) -> &'static str {
        "move"
    }
}

// ============================================================================
// Attack
// ============================================================================

/// Orders a unit to attack a target of type `T`.
pub struct AttackCommand<U, T> {
    core: ActionCore,
    unit: Rc<RefCell<U>>,
    target: T,
}

impl<U: Attackable<T>, T> AttackCommand<U, T> {
    /// Creates an attack order with `Normal` priority.
    pub fn new(unit: Rc<RefCell<U>>, target: T) -> Self {
        Self {
            core: ActionCore::new(CommandPriority::Normal),
            unit,
            target,
        }
    }

    /// The attack target.
    pub fn target(&self) -> &T {
        &self.target
    }
}

leaf_builders!(AttackCommand<U, T>);

impl<U: Attackable<T>, T> Command for AttackCommand<U, T> {
    fn can_run(&self) -> bool {
        self.core.runnable() && inspect_unit(&self.unit, |u| u.can_attack(&self.target))
    }

    fn run(&self) {
        if !self.core.state.begin(self.can_run()) {
            return;
        }
        let outcome = with_unit(&self.unit, |u| u.attack(&self.target));
        self.core.settle("attack", outcome);
    }

    fn cancel(&self) {
        self.core.state.cancel(self.core.cancellable);
    }

    fn can_cancel(&self) -> bool {
        self.core.cancellable
    }

    fn priority(&self) -> CommandPriority {
        self.core.priority
    }

    fn state(&self) -> &CommandState {
        &self.core.state
    }

    fn name(&self) -> &'static str {
        "attack"
    }
}

// ============================================================================
// Stop
// ============================================================================

/// Orders a unit to halt.
pub struct StopCommand<U> {
    core: ActionCore,
    unit: Rc<RefCell<U>>,
}

impl<U: Stoppable> StopCommand<U> {
    /// Creates a stop order with `High` priority.
    pub fn new(unit: Rc<RefCell<U>>) -> Self {
        Self {
            core: ActionCore::new(CommandPriority::High),
            unit,
        }
    }
}

leaf_builders!(StopCommand<U>);

impl<U: Stoppable> Command for StopCommand<U> {
    fn can_run(&self) -> bool {
        self.core.runnable() && inspect_unit(&self.unit, |_| true)
    }

    fn run(&self) {
        if !self.core.state.begin(self.can_run()) {
            return;
        }
        let outcome = with_unit(&self.unit, |u| u.stop());
        self.core.settle("stop", outcome);
    }

    fn cancel(&self) {
        self.core.state.cancel(self.core.cancellable);
    }

    fn can_cancel(&self) -> bool {
        self.core.cancellable
    }

    fn priority(&self) -> CommandPriority {
        self.core.priority
    }

    fn state(&self) -> &CommandState {
        &self.core.state
    }

    fn name(&self) -> &'static str {
        "stop"
    }
}

// ============================================================================
// Tests
// ============================================================================

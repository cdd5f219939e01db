//! Mock implementations for testing without a game engine.
//!
//! # Available Mocks
//!
//! | Mock | Implements | Purpose |
//! |------|-----------|---------|
//! | [`MockUnit`] | [`Moveable`], [`Attackable<u32>`], [`Stoppable`] | Records actuator calls, injects failures |
//! | [`MockCommand`] | [`Command`] | Scriptable command with run/cancel counters |
//! | [`Journal`] | - | Shared log of which mock commands ran, in order |
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use unit_orders::{CommandPriority, CommandQueue};
//! use unit_orders::hal::{Journal, MockCommand};
//!
//! let journal = Journal::new();
//! let mut queue = CommandQueue::new();
//! queue.enqueue(Rc::new(MockCommand::new("patrol").journal(&journal))).unwrap();
//! queue.enqueue(Rc::new(
//!     MockCommand::new("retreat")
//!         .with_priority(CommandPriority::High)
//!         .journal(&journal),
//! )).unwrap();
//!
//! queue.advance();
//! queue.advance();
//! assert_eq!(journal.entries(), vec!["retreat", "patrol"]);
//! ```
//!
//! [`Moveable`]: crate::traits::Moveable
//! [`Attackable<u32>`]: crate::traits::Attackable
//! [`Stoppable`]: crate::traits::Stoppable

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::commands::{Command, CommandPriority, CommandStatus};
use crate::lifecycle::{CommandState, Completion};
use crate::traits::{Attackable, MoveProgress, Moveable, Position, Stoppable};

// ============================================================================
// Unit Mock
// ============================================================================

/// Failure reported by [`MockUnit`] when a `fail_*` flag is set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MockFault {
    /// `move_to` was rejected.
    MoveRejected,
    /// `attack` was rejected.
    AttackRejected,
    /// `stop` was rejected.
    StopRejected,
}

/// Mock unit for testing leaf commands.
///
/// Records every actuator call in public fields for verification.
///
/// ```rust
/// use unit_orders::hal::MockUnit;
/// use unit_orders::traits::{Attackable, Moveable, MoveProgress, Position};
///
/// let mut unit = MockUnit::new().travelling();
/// assert_eq!(unit.move_to(Position::new(1.0, 0.0, 0.0)), Ok(MoveProgress::EnRoute));
///
/// unit.dead_targets.push(9);
/// assert!(!unit.can_attack(&9));
/// assert!(unit.can_attack(&4));
/// ```
#[derive(Debug, Default)]
pub struct MockUnit {
    /// Current position. Updated on instant arrival.
    pub position: Position,
    /// Every destination passed to `move_to`, in order.
    pub moves: Vec<Position>,
    /// Every target passed to `attack`, in order.
    pub attacks: Vec<u32>,
    /// Number of `stop` calls.
    pub stops: usize,
    /// Destinations `can_move_to` rejects.
    pub blocked: Vec<Position>,
    /// Targets `can_attack` rejects.
    pub dead_targets: Vec<u32>,
    /// If true, moves report `EnRoute` instead of arriving instantly.
    pub travels: bool,
    /// If true, `move_to` returns an error.
    pub fail_moves: bool,
    /// If true, `attack` returns an error.
    pub fail_attacks: bool,
    /// If true, `stop` returns an error.
    pub fail_stops: bool,
}

impl MockUnit {
    /// Creates a unit at the origin that arrives instantly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes moves report `EnRoute`.
    pub fn travelling(mut self) -> Self {
        self.travels = true;
        self
    }

    /// Places the unit at `position`.
    pub fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }
}

impl Moveable for MockUnit {
    type Error = MockFault;

    fn move_to(&mut self, destination: Position) -> Result<MoveProgress, MockFault> {
        if self.fail_moves {
            return Err(MockFault::MoveRejected);
        }
        self.moves.push(destination);
        if self.travels {
            Ok(MoveProgress::EnRoute)
        } else {
            self.position = destination;
            Ok(MoveProgress::Arrived)
        }
    }

    fn can_move_to(&self, destination: &Position) -> bool {
        !self.blocked.contains(destination)
    }
}

impl Attackable<u32> for MockUnit {
    type Error = MockFault;

    fn attack(&mut self, target: &u32) -> Result<(), MockFault> {
        if self.fail_attacks {
            return Err(MockFault::AttackRejected);
        }
        self.attacks.push(*target);
        Ok(())
    }

    fn can_attack(&self, target: &u32) -> bool {
        !self.dead_targets.contains(target)
    }
}

impl Stoppable for MockUnit {
    type Error = MockFault;

    fn stop(&mut self) -> Result<(), MockFault> {
        if self.fail_stops {
            return Err(MockFault::StopRejected);
        }
        self.stops += 1;
        Ok(())
    }
}

// ============================================================================
// Command Mock
// ============================================================================

/// Shared, ordered log of mock command runs.
#[derive(Clone, Debug, Default)]
pub struct Journal {
    entries: Rc<RefCell<Vec<&'static str>>>,
}

impl Journal {
    /// Creates an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn record(&self, entry: &'static str) {
        self.entries.borrow_mut().push(entry);
    }

    /// Snapshot of all entries so far.
    pub fn entries(&self) -> Vec<&'static str> {
        self.entries.borrow().clone()
    }
}

/// How a [`MockCommand`] resolves when run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MockOutcome {
    /// Completes inside `run()`.
    #[default]
    Complete,
    /// Fails inside `run()`.
    Fail,
    /// Stays `Executing`; resolve it through [`MockCommand::completion`].
    Hold,
}

/// Scriptable command for queue and decorator tests.
///
/// ```rust
/// use unit_orders::{Command, CommandStatus};
/// use unit_orders::hal::{MockCommand, MockOutcome};
///
/// let cmd = MockCommand::new("wait").with_outcome(MockOutcome::Hold);
/// cmd.run();
/// assert_eq!(cmd.status(), CommandStatus::Executing);
///
/// cmd.completion().fail();
/// assert_eq!(cmd.status(), CommandStatus::Failed);
/// assert_eq!(cmd.run_count(), 1);
/// ```
#[derive(Debug)]
pub struct MockCommand {
    state: CommandState,
    label: &'static str,
    priority: CommandPriority,
    outcome: MockOutcome,
    runnable: Cell<bool>,
    cancellable: bool,
    run_count: Cell<usize>,
    cancel_count: Cell<usize>,
    journal: Option<Journal>,
}

impl MockCommand {
    /// Creates a runnable, cancellable command that completes when run.
    pub fn new(label: &'static str) -> Self {
        Self {
            state: CommandState::new(),
            label,
            priority: CommandPriority::Normal,
            outcome: MockOutcome::Complete,
            runnable: Cell::new(true),
            cancellable: true,
            run_count: Cell::new(0),
            cancel_count: Cell::new(0),
            journal: None,
        }
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: CommandPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets how the command resolves.
    pub fn with_outcome(mut self, outcome: MockOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    /// Makes the guard return false.
    pub fn unrunnable(self) -> Self {
        self.runnable.set(false);
        self
    }

    /// Makes cancellation requests no-ops.
    pub fn uncancellable(mut self) -> Self {
        self.cancellable = false;
        self
    }

    /// Records the label in `journal` whenever the command's effect runs.
    pub fn journal(mut self, journal: &Journal) -> Self {
        self.journal = Some(journal.clone());
        self
    }

    /// Flips the guard at runtime.
    pub fn set_runnable(&self, runnable: bool) {
        self.runnable.set(runnable);
    }

    /// Label given at construction.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Number of times the effect ran (guard passed).
    pub fn run_count(&self) -> usize {
        self.run_count.get()
    }

    /// Number of cancellation requests honored.
    pub fn cancel_count(&self) -> usize {
        self.cancel_count.get()
    }

    /// Handle to resolve a held command.
    pub fn completion(&self) -> Completion {
        self.state.completion()
    }
}

impl Command for MockCommand {
    fn can_run(&self) -> bool {
        !self.state.is_finished() && self.runnable.get()
    }

    fn run(&self) {
        if !self.state.begin(self.can_run()) {
            return;
        }
        self.run_count.set(self.run_count.get() + 1);
        if let Some(journal) = &self.journal {
            journal.record(self.label);
        }
        match self.outcome {
            MockOutcome::Complete => {
                self.state.update(CommandStatus::Completed);
            }
            MockOutcome::Fail => {
                self.state.update(CommandStatus::Failed);
            }
            MockOutcome::Hold => {}
        }
    }

    fn cancel(&self) {
        if self.state.cancel(self.cancellable) {
            self.cancel_count.set(self.cancel_count.get() + 1);
        }
    }

    fn can_cancel(&self) -> bool {
        self.cancellable
    }

    fn priority(&self) -> CommandPriority {
        self.priority
    }

    fn state(&self) -> &CommandState {
        &self.state
    }

    fn name(&self) -> &'static str {
        self.label
    }
}

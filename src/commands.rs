//! Command lifecycle, priority scale, and the [`Command`] trait.
//!
//! # Command Flow
//!
//! 1. Game logic builds a command (a leaf from [`crate::actions`], or a tree of
//!    [`CompositeCommand`] / [`ConditionalCommand`] wrappers).
//! 2. The command is enqueued on its unit's [`CommandQueue`](crate::CommandQueue),
//!    ordered by [`CommandPriority`].
//! 3. Each scheduling tick the queue promotes the best pending command to
//!    `Executing` and calls [`Command::run`].
//! 4. The command resolves itself to `Completed`, `Failed` or `Cancelled`,
//!    either during `run()` or later through its own event source.
//! 5. Issuers observe every transition through [`Command::subscribe`].
//!
//! # Lifecycle
//!
//! ```text
//! Pending --run()--> Executing --> Completed | Failed | Cancelled
//!    \                                            ^
//!     `------------- cancel() / guard failure ----'
//! ```
//!
//! Terminal statuses are final; see [`CommandState::update`].
//!
//! # Composing
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use unit_orders::{Command, CommandExt, CommandStatus, MoveCommand, StopCommand, Position};
//! use unit_orders::hal::MockUnit;
//!
//! let unit = Rc::new(RefCell::new(MockUnit::new()));
//! let order = Rc::new(MoveCommand::new(unit.clone(), Position::new(3.0, 0.0, 4.0)))
//!     .then(Rc::new(StopCommand::new(unit.clone())));
//!
//! order.run();
//! assert_eq!(order.status(), CommandStatus::Completed);
//! assert_eq!(unit.borrow().stops, 1);
//! ```

use std::rc::Rc;

use crate::composite::CompositeCommand;
use crate::conditional::ConditionalCommand;
use crate::lifecycle::{CommandState, ObserverId};

// ============================================================================
// Status
// ============================================================================

/// Lifecycle status of a command.
///
/// `Pending` and `Executing` are live; the other three are terminal and
/// never change once reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CommandStatus {
    /// Waiting to be dispatched.
    #[default]
    Pending,
    /// Dispatched and not yet resolved.
    Executing,
    /// Finished successfully.
    Completed,
    /// Guard failed at dispatch, or the effect raised an error.
    Failed,
    /// Deliberately stopped. Distinct from failure.
    Cancelled,
}

impl CommandStatus {
    /// Returns true for `Completed`, `Failed` and `Cancelled`.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns the status as a lowercase string.
    ///
    /// ```
    /// use unit_orders::CommandStatus;
    ///
    /// assert_eq!(CommandStatus::Executing.as_str(), "executing");
    /// assert_eq!(CommandStatus::Cancelled.as_str(), "cancelled");
    /// ```
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

// ============================================================================
// Priority
// ============================================================================

/// Priority used to order pending commands in a queue.
///
/// Priority never interrupts a command that is already running; preemption
/// is an explicit request (see
/// [`CommandDispatcher::execute_immediate`](crate::CommandDispatcher::execute_immediate)).
///
/// # Priority Order (lowest to highest)
///
/// 1. [`Low`](Self::Low) - gathering, building
/// 2. [`Normal`](Self::Normal) - moving, working
/// 3. [`High`](Self::High) - combat, evasion
/// 4. [`Immediate`](Self::Immediate) - jumps every other pending command
///
/// ```rust
/// use unit_orders::CommandPriority;
///
/// assert!(CommandPriority::Immediate > CommandPriority::High);
/// assert!(CommandPriority::Normal > CommandPriority::Low);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CommandPriority {
    /// Background work.
    Low = 0,
    /// Default for most orders.
    #[default]
    Normal = 1,
    /// Urgent orders.
    High = 2,
    /// Runs before anything else that is pending.
    Immediate = 3,
}

// ============================================================================
// Command trait
// ============================================================================

/// A unit of schedulable work with an observable status.
///
/// All methods take `&self`: commands are shared (`Rc<dyn Command>`) between
/// the queue, their issuer, and any composite that wraps them, and resolve
/// themselves from observer callbacks. Implementations keep their mutable
/// state in cells and must not hold a borrow across a status update, since
/// observers may synchronously run further commands.
///
/// # Contract
///
/// - [`can_run`](Self::can_run) has no side effects.
/// - [`run`](Self::run) with `can_run() == false` leaves the command `Failed`.
/// - A command must not return from `run` while still `Executing`. Doing so
///   is a contract violation that the queue only tolerates: it logs a
///   diagnostic, and the command's own event source is left to resolve it.
/// - [`cancel`](Self::cancel) is a no-op when [`can_cancel`](Self::can_cancel)
///   is false or the command is already terminal.
///
/// Implementors only supply `state()` plus the behavior; the status helpers
/// on [`CommandState`] (`begin`, `cancel`) cover the common transitions.
pub trait Command {
    /// Guard evaluated at dispatch time.
    fn can_run(&self) -> bool;

    /// Performs the command.
    fn run(&self);

    /// Requests cancellation.
    fn cancel(&self);

    /// Forces the command to `Failed` and stops any child it is running.
    ///
    /// Used when a held command overruns its deadline. Unlike
    /// [`cancel`](Self::cancel) this ignores [`can_cancel`](Self::can_cancel)
    /// for the command itself; children are only asked to cancel.
    fn abort(&self) {
        self.state().update(CommandStatus::Failed);
    }

    /// Whether cancellation requests are honored.
    fn can_cancel(&self) -> bool {
        true
    }

    /// Ordering priority, fixed at construction.
    fn priority(&self) -> CommandPriority {
        CommandPriority::Normal
    }

    /// The command's status cell.
    fn state(&self) -> &CommandState;

    /// Short name used in diagnostics.
    fn name(&self) -> &'static str {
        "command"
    }

    /// Current status.
    fn status(&self) -> CommandStatus {
        self.state().status()
    }

    /// Registers a status-change observer.
    ///
    /// Every terminal status is delivered. A non-terminal status that is
    /// superseded while being delivered (an earlier observer already moved
    /// the command on) may be skipped for the remaining observers.
    fn subscribe(&self, observer: Box<dyn Fn(CommandStatus)>) -> ObserverId {
        self.state().subscribe(observer)
    }
}

/// Combinators for building command trees.
///
/// Implemented for every sized command; call on an `Rc` of the command.
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use unit_orders::{Command, CommandExt, CommandStatus, AttackCommand};
/// use unit_orders::hal::MockUnit;
///
/// let unit = Rc::new(RefCell::new(MockUnit::new()));
/// let guarded = Rc::new(AttackCommand::new(unit.clone(), 7)).when(|| false);
///
/// guarded.run();
/// assert_eq!(guarded.status(), CommandStatus::Failed);
/// assert!(unit.borrow().attacks.is_empty());
/// ```
pub trait CommandExt: Command + Sized + 'static {
    /// Runs `self`, then `next`, as one composite command.
    ///
    /// The composite takes `self`'s priority.
    fn then(self: Rc<Self>, next: Rc<dyn Command>) -> Rc<CompositeCommand> {
        let priority = self.priority();
        CompositeCommand::sequence(priority, [self as Rc<dyn Command>, next])
    }

    /// Gates `self` behind `predicate`, evaluated at dispatch time.
    fn when(self: Rc<Self>, predicate: impl Fn() -> bool + 'static) -> Rc<ConditionalCommand> {
        ConditionalCommand::new(self, predicate)
    }
}

impl<C: Command + 'static> CommandExt for C {}

// ============================================================================
// Tests
// ============================================================================

//! Status cell shared by every command, with synchronous observers.
//!
//! [`CommandState`] is the one place a command's [`CommandStatus`] changes.
//! It enforces the forward-only lifecycle, notifies observers synchronously,
//! and tolerates observers that trigger further status changes from inside
//! a notification (a composite starting its next child, a queue reacting to
//! a completion, and so on).
//!
//! # Re-entrancy
//!
//! Observers run while the outer `update` call is still on the stack. Each
//! nested notification adds a frame, so dispatch depth is bounded by
//! [`MAX_NOTIFY_DEPTH`]: notifications past that depth are parked on a
//! thread-local work-list and delivered by the outermost dispatch before its
//! `update` returns. Callers never observe the difference except in the
//! relative order of very deep notification chains.
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use unit_orders::{CommandState, CommandStatus};
//!
//! let state = CommandState::new();
//! let seen = Rc::new(Cell::new(0));
//! let counter = seen.clone();
//! state.subscribe(move |_| counter.set(counter.get() + 1));
//!
//! assert!(state.update(CommandStatus::Executing));
//! assert!(!state.update(CommandStatus::Executing)); // same value, no-op
//! assert!(state.update(CommandStatus::Completed));
//! assert!(!state.update(CommandStatus::Failed)); // terminal is final
//!
//! assert_eq!(seen.get(), 2);
//! assert_eq!(state.status(), CommandStatus::Completed);
//! ```

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, error};

use crate::commands::CommandStatus;

/// Deepest nesting of synchronous notifications before delivery is deferred
/// to the outermost dispatch loop.
///
/// Realistic command trees (composites of conditionals of leaves) stay far
/// below this.
pub const MAX_NOTIFY_DEPTH: usize = 64;

type Observer = Rc<dyn Fn(CommandStatus)>;

thread_local! {
    static NOTIFY_DEPTH: Cell<usize> = const { Cell::new(0) };
    static DEFERRED: RefCell<VecDeque<(CommandState, CommandStatus)>> =
        const { RefCell::new(VecDeque::new()) };
}

/// Handle returned by [`CommandState::subscribe`], used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

struct StateInner {
    status: Cell<CommandStatus>,
    observers: RefCell<Vec<(ObserverId, Observer)>>,
    next_id: Cell<u64>,
}

/// Observable lifecycle status of one command.
///
/// Cloning yields another handle to the same status; this is how leaf
/// commands hand a [`Completion`] to an external event source.
#[derive(Clone)]
pub struct CommandState {
    inner: Rc<StateInner>,
}

impl CommandState {
    /// Creates a new state in [`CommandStatus::Pending`].
    pub fn new() -> Self {
        Self {
            inner: Rc::new(StateInner {
                status: Cell::new(CommandStatus::Pending),
                observers: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
            }),
        }
    }

    /// Current status.
    pub fn status(&self) -> CommandStatus {
        self.inner.status.get()
    }

    /// Returns true once the status is terminal.
    pub fn is_finished(&self) -> bool {
        self.status().is_terminal()
    }

    /// The single status-update operation.
    ///
    /// No-op when `new_status` equals the current status. Otherwise assigns
    /// it and synchronously notifies every observer. Leaving a terminal
    /// status is refused and logged.
    ///
    /// Returns true if the status changed.
    pub fn update(&self, new_status: CommandStatus) -> bool {
        let old = self.status();
        if old == new_status {
            return false;
        }
        if old.is_terminal() {
            error!(
                from = ?old,
                to = ?new_status,
                "refused status change out of a terminal status"
            );
            return false;
        }
        self.inner.status.set(new_status);
        self.notify(new_status);
        true
    }

    /// Registers an observer called with the new status on every transition.
    ///
    /// Observers run in registration order. If one of them moves the status
    /// on, the superseded non-terminal status is not delivered to the rest;
    /// terminal statuses always reach every observer. An observer removed
    /// during a notification is not called for it.
    pub fn subscribe(&self, observer: impl Fn(CommandStatus) + 'static) -> ObserverId {
        let id = ObserverId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);
        self.inner
            .observers
            .borrow_mut()
            .push((id, Rc::new(observer)));
        id
    }

    /// Removes an observer. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut observers = self.inner.observers.borrow_mut();
        let before = observers.len();
        observers.retain(|(oid, _)| *oid != id);
        observers.len() != before
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.inner.observers.borrow().len()
    }

    /// Moves a command into `Executing` if `runnable`, or into `Failed` if not.
    ///
    /// Shared entry step for `Command::run` implementations. Returns true if
    /// the caller should go on to perform the command's effect. A command
    /// that has already finished is left untouched.
    pub fn begin(&self, runnable: bool) -> bool {
        let status = self.status();
        if status.is_terminal() {
            debug!(status = ?status, "run() called on a finished command");
            return false;
        }
        if !runnable {
            self.update(CommandStatus::Failed);
            return false;
        }
        self.update(CommandStatus::Executing);
        true
    }

    /// Moves a non-terminal command into `Cancelled` when `cancellable`.
    ///
    /// Shared step for `Command::cancel` implementations. Returns true if
    /// the status changed.
    pub fn cancel(&self, cancellable: bool) -> bool {
        if !cancellable || self.is_finished() {
            return false;
        }
        self.update(CommandStatus::Cancelled)
    }

    /// Returns a completion handle for an external event source.
    pub fn completion(&self) -> Completion {
        Completion {
            state: self.clone(),
        }
    }

    /// True if both handles refer to the same status cell.
    pub fn same_as(&self, other: &CommandState) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn notify(&self, status: CommandStatus) {
        let depth = NOTIFY_DEPTH.with(Cell::get);
        if depth >= MAX_NOTIFY_DEPTH {
            DEFERRED.with(|q| q.borrow_mut().push_back((self.clone(), status)));
            return;
        }

        let _guard = DepthGuard::enter(depth);
        self.dispatch(status);

        if depth == 0 {
            while let Some((state, status)) = DEFERRED.with(|q| q.borrow_mut().pop_front()) {
                state.dispatch(status);
            }
        }
    }

    fn dispatch(&self, status: CommandStatus) {
        // Snapshot so observers may subscribe or unsubscribe while we iterate.
        let observers: Vec<(ObserverId, Observer)> = self.inner.observers.borrow().clone();

        for (id, observer) in observers {
            // A newer status was set and delivered from inside an observer.
            if self.status() != status {
                break;
            }
            if !self.is_subscribed(id) {
                continue;
            }
            observer(status);
        }
    }

    fn is_subscribed(&self, id: ObserverId) -> bool {
        self.inner.observers.borrow().iter().any(|(oid, _)| *oid == id)
    }
}

impl Default for CommandState {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CommandState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandState")
            .field("status", &self.status())
            .field("observers", &self.observer_count())
            .finish()
    }
}

struct DepthGuard {
    restore: usize,
}

impl DepthGuard {
    fn enter(depth: usize) -> Self {
        NOTIFY_DEPTH.with(|d| d.set(depth + 1));
        Self { restore: depth }
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        NOTIFY_DEPTH.with(|d| d.set(self.restore));
    }
}

/// Handle an external event source uses to resolve a multi-tick command.
///
/// Both methods are no-ops unless the command is still `Executing`, so a
/// late arrival callback after a cancellation changes nothing.
///
/// ```rust
/// use unit_orders::{CommandState, CommandStatus};
///
/// let state = CommandState::new();
/// let done = state.completion();
///
/// assert!(!done.complete()); // not started yet
/// state.update(CommandStatus::Executing);
/// assert!(done.complete());
/// assert_eq!(state.status(), CommandStatus::Completed);
/// ```
#[derive(Clone, Debug)]
pub struct Completion {
    state: CommandState,
}

impl Completion {
    /// Resolves the command as `Completed`.
    pub fn complete(&self) -> bool {
        self.finish(CommandStatus::Completed)
    }

    /// Resolves the command as `Failed`.
    pub fn fail(&self) -> bool {
        self.finish(CommandStatus::Failed)
    }

    /// Current status of the command behind this handle.
    pub fn status(&self) -> CommandStatus {
        self.state.status()
    }

    fn finish(&self, outcome: CommandStatus) -> bool {
        if self.state.status() != CommandStatus::Executing {
            return false;
        }
        self.state.update(outcome)
    }
}

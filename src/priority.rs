//! Per-unit command queue with priority ordering.
//!
//! A [`CommandQueue`] holds a pending list and at most one current command.
//! It is driven by calling [`advance`](CommandQueue::advance) once per
//! scheduling tick; each call starts at most one command.
//!
//! # Ordering
//!
//! Pending commands are kept sorted by descending [`CommandPriority`], with
//! insertion order breaking ties. Priority only decides which pending
//! command starts next; it never interrupts the one already running.
//!
//! ```rust
//! use std::rc::Rc;
//! use unit_orders::{CommandPriority, CommandQueue};
//! use unit_orders::hal::{Journal, MockCommand};
//!
//! let journal = Journal::new();
//! let mut queue = CommandQueue::new();
//! for (label, priority) in [
//!     ("normal", CommandPriority::Normal),
//!     ("high", CommandPriority::High),
//!     ("low", CommandPriority::Low),
//!     ("immediate", CommandPriority::Immediate),
//! ] {
//!     let cmd = MockCommand::new(label).with_priority(priority).journal(&journal);
//!     queue.enqueue(Rc::new(cmd)).unwrap();
//! }
//!
//! while queue.has_pending() {
//!     queue.advance();
//! }
//! assert_eq!(journal.entries(), vec!["immediate", "high", "normal", "low"]);
//! ```
//!
//! # Commands that outlive `run()`
//!
//! A command should be terminal when `run()` returns. One that is still
//! `Executing` is reported as a diagnostic; what happens to the slot is set
//! by [`InFlightPolicy`]. Under `Detach` (the default) the slot is freed and
//! the command resolves through its own status path. Under `Hold` it keeps
//! the slot until it finishes, optionally bounded by a tick deadline.
//!
//! # Re-entrancy
//!
//! Observers run synchronously inside `advance`, `cancel_current` and
//! `clear`, while the queue is mutably borrowed. They must not call back
//! into the same queue; issue follow-up orders through the dispatcher
//! after the tick instead.

use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::commands::{Command, CommandStatus};
use crate::config::{InFlightPolicy, SchedulerConfig};
use crate::error::SchedulerError;

struct InFlight {
    command: Rc<dyn Command>,
    started_tick: u64,
}

/// Priority-ordered command queue for one unit.
pub struct CommandQueue {
    pending: VecDeque<Rc<dyn Command>>,
    current: Option<InFlight>,
    config: SchedulerConfig,
    tick: u64,
}

impl CommandQueue {
    /// Creates an empty queue with the default configuration.
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    /// Creates an empty queue with the given configuration.
    pub fn with_config(config: SchedulerConfig) -> Self {
        Self {
            pending: VecDeque::new(),
            current: None,
            config,
            tick: 0,
        }
    }

    /// Adds a command to the pending list.
    ///
    /// The command is placed after every pending command of equal or higher
    /// priority. Only `Pending` commands not already in this queue are
    /// accepted: a command that is running, here or anywhere else, belongs to
    /// that slot until it finishes.
    pub fn enqueue(&mut self, command: Rc<dyn Command>) -> Result<(), SchedulerError> {
        if self.contains(command.as_ref()) {
            return Err(SchedulerError::AlreadyQueued);
        }
        match command.status() {
            CommandStatus::Pending => {}
            CommandStatus::Executing => return Err(SchedulerError::AlreadyStarted),
            status => return Err(SchedulerError::AlreadyFinished(status)),
        }

        let priority = command.priority();
        let index = self
            .pending
            .iter()
            .position(|c| c.priority() < priority)
            .unwrap_or(self.pending.len());
        debug!(
            command = command.name(),
            priority = ?priority,
            position = index,
            "command enqueued"
        );
        self.pending.insert(index, command);
        Ok(())
    }

    /// Runs one scheduling step.
    ///
    /// 1. Drops pending entries that are no longer `Pending` (finished, or
    ///    started by another queue).
    /// 2. If the slot is occupied (only under [`InFlightPolicy::Hold`]),
    ///    frees it when the command has finished, or aborts it (see
    ///    [`Command::abort`]) when it overran its deadline.
    /// 3. If the slot is free, pops the best pending command. An unrunnable
    ///    command is marked `Failed` and not retried; otherwise it is moved
    ///    to `Executing` and run.
    ///
    /// Calling this on an empty queue does nothing observable.
    pub fn advance(&mut self) {
        self.tick += 1;
        self.sweep_pending();

        if !self.settle_current() {
            return;
        }

        let Some(command) = self.pending.pop_front() else {
            return;
        };
        trace!(tick = self.tick, command = command.name(), "dispatching");

        if !command.can_run() {
            debug!(command = command.name(), "guard failed at dispatch");
            command.state().update(CommandStatus::Failed);
            return;
        }

        command.state().update(CommandStatus::Executing);
        self.current = Some(InFlight {
            command: command.clone(),
            started_tick: self.tick,
        });
        command.run();

        if command.status() == CommandStatus::Executing {
            match self.config.in_flight {
                InFlightPolicy::Detach => {
                    warn!(
                        command = command.name(),
                        "command returned from run() still executing; it must resolve its own status"
                    );
                }
                InFlightPolicy::Hold => {
                    debug!(command = command.name(), "holding slot for executing command");
                    return;
                }
            }
        }
        self.current = None;
    }

    /// Cancels the current command if it supports cancellation, and frees
    /// the slot either way.
    pub fn cancel_current(&mut self) {
        let Some(in_flight) = self.current.take() else {
            return;
        };
        let command = in_flight.command;
        if command.can_cancel() && !command.status().is_terminal() {
            debug!(command = command.name(), "cancelling current command");
            command.cancel();
        }
    }

    /// Cancels the current command, then every cancellable pending command,
    /// and empties the queue.
    ///
    /// Entries that were started by another queue in the meantime belong to
    /// that queue and are only dropped.
    pub fn clear(&mut self) {
        self.cancel_current();
        let pending = std::mem::take(&mut self.pending);
        for command in pending {
            if command.can_cancel() && command.status() == CommandStatus::Pending {
                command.cancel();
            }
        }
    }

    /// True if a command is pending or occupies the slot.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty() || self.current.is_some()
    }

    /// Number of pending commands (excluding the current one).
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// True if nothing is pending and the slot is free.
    pub fn is_empty(&self) -> bool {
        !self.has_pending()
    }

    /// The next command `advance` would start.
    pub fn peek(&self) -> Option<&Rc<dyn Command>> {
        self.pending.front()
    }

    /// The command occupying the slot, if any.
    pub fn current(&self) -> Option<&Rc<dyn Command>> {
        self.current.as_ref().map(|f| &f.command)
    }

    /// Pending commands in dispatch order.
    pub fn pending(&self) -> impl Iterator<Item = &Rc<dyn Command>> {
        self.pending.iter()
    }

    /// Number of `advance` calls so far.
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    /// Active configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// True if `command` is pending or current in this queue.
    pub fn contains(&self, command: &dyn Command) -> bool {
        let state = command.state();
        self.current()
            .into_iter()
            .chain(self.pending.iter())
            .any(|c| c.state().same_as(state))
    }

    fn sweep_pending(&mut self) {
        let before = self.pending.len();
        // Anything no longer pending was finished or started elsewhere.
        self.pending.retain(|c| c.status() == CommandStatus::Pending);
        let removed = before - self.pending.len();
        if removed > 0 {
            debug!(removed, "dropped started or finished commands from pending list");
        }
    }

    /// Frees the slot if its command is done. Returns true if the slot is free.
    fn settle_current(&mut self) -> bool {
        let Some(in_flight) = &self.current else {
            return true;
        };
        let command = &in_flight.command;
        if command.status().is_terminal() {
            trace!(command = command.name(), status = ?command.status(), "slot released");
            self.current = None;
            return true;
        }
        if let Some(limit) = self.config.deadline_ticks {
            let elapsed = self.tick.saturating_sub(in_flight.started_tick);
            if elapsed >= limit {
                warn!(
                    command = command.name(),
                    elapsed_ticks = elapsed,
                    "command overran its deadline, failing it"
                );
                command.abort();
                self.current = None;
                return true;
            }
        }
        false
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CommandQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.current() {
            Some(c) => write!(f, "Current: {} ({})", c.name(), c.status().as_str())?,
            None => write!(f, "Current: None")?,
        }
        write!(f, " | Queue: [")?;
        for (i, c) in self.pending.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} ({:?})", c.name(), c.priority())?;
        }
        write!(f, "]")
    }
}

impl fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandQueue")
            .field("pending", &self.pending.len())
            .field("current", &self.current().map(|c| c.name()))
            .field("tick", &self.tick)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

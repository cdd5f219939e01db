//! Errors returned by queue, composite and dispatcher APIs.
//!
//! Command outcomes are statuses, not errors; these cover API misuse the
//! caller can act on.

use thiserror::Error;

use crate::commands::CommandStatus;

/// Errors from scheduling APIs.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// The command already started running.
    ///
    /// Returned when appending to a composite that has run, and when
    /// enqueueing a command that is already `Executing` somewhere else.
    #[error("command has already started")]
    AlreadyStarted,

    /// The command is already pending or running in this queue.
    #[error("command is already in this queue")]
    AlreadyQueued,

    /// The command has already reached a terminal status.
    #[error("command already finished with status `{}`", .0.as_str())]
    AlreadyFinished(CommandStatus),

    /// No queue is registered for the entity.
    #[error("no command queue registered for entity {0}")]
    UnknownEntity(String),
}

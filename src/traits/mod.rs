//! Capability traits implemented by controllable units.
//!
//! Leaf commands depend on exactly the capability they need instead of a
//! name-keyed action table, so a unit that cannot attack simply cannot be
//! handed an [`AttackCommand`](crate::AttackCommand).
//!
//! # Submodules
//!
//! - `actuator`: [`Moveable`], [`Attackable`], [`Stoppable`] and their value types
//!
//! # Implementing
//!
//! A unit implements the subset it supports. Each capability carries its own
//! `Error` type; errors are logged by the command and turned into a `Failed`
//! status, they never reach the queue.

pub mod actuator;

pub use actuator::*;

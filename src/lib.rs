//! # unit-orders
//!
//! A per-unit command scheduler for games and simulations: queue orders
//! such as move, attack and stop for each controllable unit, run them one
//! at a time in priority order, and observe how each one ends.
//!
//! ## Features
//!
//! - **Explicit lifecycle**: every command moves forward through
//!   `Pending → Executing → {Completed | Failed | Cancelled}` and never back
//! - **Priority queues**: one queue per unit, `Immediate` before `High`
//!   before `Normal` before `Low`, first-come first-served within a level
//! - **Decorators**: run commands in sequence, or gate one behind a
//!   predicate evaluated at dispatch time
//! - **Status observers**: synchronous notifications with a bounded
//!   nesting depth, safe for long chains of instantly completing commands
//! - **Capability traits**: units implement `Moveable`, `Attackable` and
//!   `Stoppable` as they see fit; errors become `Failed`, never panics
//!
//! ## Architecture
//!
//! - `commands` - Status and priority types, the `Command` trait
//! - `lifecycle` - Status cell with observers, completion handles
//! - `composite` / `conditional` - Sequence and predicate decorators
//! - `actions` - Leaf commands driving a unit's actuators
//! - `priority` - Per-unit command queue
//! - `dispatcher` - Entity-keyed registry that ticks every queue
//! - `traits` - Unit capabilities
//! - `hal` - Mock units and commands for testing
//!
//! ## Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use unit_orders::{
//!     AttackCommand, Command, CommandDispatcher, CommandExt, CommandStatus,
//!     MoveCommand, Position, hal::MockUnit,
//! };
//!
//! let unit = Rc::new(RefCell::new(MockUnit::new()));
//! let mut orders = CommandDispatcher::default();
//!
//! // Walk over, then attack target 7
//! let assault = Rc::new(MoveCommand::new(unit.clone(), Position::new(3.0, 0.0, 0.0)))
//!     .then(Rc::new(AttackCommand::new(unit.clone(), 7)));
//! orders.enqueue("grunt", assault.clone()).unwrap();
//!
//! // Drive the scheduler from the game loop
//! orders.tick();
//! assert_eq!(assault.status(), CommandStatus::Completed);
//! assert_eq!(unit.borrow().attacks, vec![7]);
//! ```

#![warn(missing_docs)]

/// Leaf commands for moving, attacking and stopping.
pub mod actions;
/// Command status, priority and the `Command` trait.
pub mod commands;
/// Sequential composite command.
pub mod composite;
/// Predicate-gated command.
pub mod conditional;
/// Scheduler configuration.
pub mod config;
/// Entity-keyed dispatcher driving every queue.
pub mod dispatcher;
/// Error types for queue and dispatcher operations.
pub mod error;
/// Test doubles for units and commands.
pub mod hal;
/// Status cells, observers and completion handles.
pub mod lifecycle;
/// Per-unit priority queue.
pub mod priority;
/// Capability traits implemented by controllable units.
pub mod traits;

// Re-exports for convenience
pub use actions::{AttackCommand, MoveCommand, StopCommand};
pub use commands::{Command, CommandExt, CommandPriority, CommandStatus};
pub use composite::CompositeCommand;
pub use conditional::ConditionalCommand;
pub use dispatcher::CommandDispatcher;
pub use error::SchedulerError;
pub use lifecycle::{CommandState, Completion, ObserverId, MAX_NOTIFY_DEPTH};
pub use priority::CommandQueue;
pub use traits::{Attackable, MoveProgress, Moveable, Position, Stoppable};

// Config re-exports
pub use config::{InFlightPolicy, SchedulerConfig};

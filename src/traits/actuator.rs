//! Actuator traits for moving, attacking and stopping.
//!
//! # Key Traits
//!
//! | Trait | Used by |
//! |-------|---------|
//! | [`Moveable`] | [`MoveCommand`](crate::MoveCommand) |
//! | [`Attackable`] | [`AttackCommand`](crate::AttackCommand) |
//! | [`Stoppable`] | [`StopCommand`](crate::StopCommand) |
//!
//! # Implementation
//!
//! For tests and demos use [`crate::hal::MockUnit`], which implements all
//! three and can inject failures.
//!
//! # Example
//!
//! ```rust
//! use unit_orders::traits::{Moveable, MoveProgress, Position, Stoppable};
//! use unit_orders::hal::MockUnit;
//!
//! let mut unit = MockUnit::new();
//! let progress = unit.move_to(Position::new(2.0, 0.0, 1.0)).unwrap();
//! assert_eq!(progress, MoveProgress::Arrived);
//! unit.stop().unwrap();
//! assert_eq!(unit.stops, 1);
//! ```

use core::fmt;

/// A point in world space.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    /// X coordinate.
    pub x: f32,
    /// Y coordinate (up).
    pub y: f32,
    /// Z coordinate.
    pub z: f32,
}

impl Position {
    /// Creates a position.
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to `other`.
    ///
    /// ```
    /// use unit_orders::Position;
    ///
    /// let d = Position::new(0.0, 0.0, 0.0).distance(&Position::new(3.0, 0.0, 4.0));
    /// assert!((d - 5.0).abs() < 1e-6);
    /// ```
    pub fn distance(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// What a unit reports after accepting a move order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MoveProgress {
    /// Already at the destination; the order is done.
    Arrived,
    /// Moving. The unit's arrival event resolves the order later through a
    /// [`Completion`](crate::Completion).
    EnRoute,
}

/// A unit that can be ordered to move.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use unit_orders::traits::{Moveable, MoveProgress, Position};
///
/// struct Tank { nav: NavAgent }
///
/// impl Moveable for Tank {
///     type Error = NavError;
///
///     fn move_to(&mut self, destination: Position) -> Result<MoveProgress, NavError> {
///         self.nav.set_destination(destination)?;
///         Ok(MoveProgress::EnRoute)
///     }
/// }
/// ```
pub trait Moveable {
    /// Error raised when the move cannot be started.
    type Error: fmt::Debug;

    /// Starts moving toward `destination`.
    fn move_to(&mut self, destination: Position) -> Result<MoveProgress, Self::Error>;

    /// Whether `destination` is currently reachable.
    ///
    /// Must not have side effects. Defaults to true.
    fn can_move_to(&self, _destination: &Position) -> bool {
        true
    }
}

/// A unit that can attack targets of type `T`.
pub trait Attackable<T> {
    /// Error raised when the attack fails.
    type Error: fmt::Debug;

    /// Attacks `target`.
    fn attack(&mut self, target: &T) -> Result<(), Self::Error>;

    /// Whether `target` is currently a valid target.
    ///
    /// Must not have side effects. Defaults to true.
    fn can_attack(&self, _target: &T) -> bool {
        true
    }
}

/// A unit that can halt whatever it is doing.
pub trait Stoppable {
    /// Error raised when stopping fails.
    type Error: fmt::Debug;

    /// Halts the unit.
    fn stop(&mut self) -> Result<(), Self::Error>;
}

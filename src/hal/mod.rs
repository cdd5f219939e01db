//! Test doubles for units and commands.
//!
//! # Available Implementations
//!
//! - `mock`: [`MockUnit`] for leaf commands, [`MockCommand`] for queue and
//!   decorator behavior

pub mod mock;

pub use mock::*;

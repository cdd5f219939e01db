//! Scheduler configuration.
//!
//! # Example
//!
//! ```rust
//! use unit_orders::config::{InFlightPolicy, SchedulerConfig};
//!
//! // Defaults: release the slot as soon as run() returns, no deadline
//! let config = SchedulerConfig::default();
//! assert_eq!(config.in_flight, InFlightPolicy::Detach);
//!
//! // Or hold multi-tick commands in the slot and fail them after 300 ticks
//! let config = SchedulerConfig::default()
//!     .with_in_flight(InFlightPolicy::Hold)
//!     .with_deadline_ticks(300);
//! assert_eq!(config.deadline_ticks, Some(300));
//! ```

/// What a queue does with a command still `Executing` after `run()` returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum InFlightPolicy {
    /// Log a diagnostic and free the slot; the command resolves on its own.
    ///
    /// The next pending command may start on the following tick.
    #[default]
    Detach,

    /// Keep the command in the slot until it reaches a terminal status.
    ///
    /// Later commands wait, and `cancel_current` can still reach it.
    Hold,
}

/// Configuration for [`CommandQueue`](crate::CommandQueue) and
/// [`CommandDispatcher`](crate::CommandDispatcher).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SchedulerConfig {
    /// Handling of commands that outlive their `run()` call.
    pub in_flight: InFlightPolicy,
    /// Under [`InFlightPolicy::Hold`], fail a command still executing after
    /// this many ticks. `None` waits forever.
    pub deadline_ticks: Option<u64>,
}

impl SchedulerConfig {
    /// Set the in-flight policy
    pub fn with_in_flight(mut self, policy: InFlightPolicy) -> Self {
        self.in_flight = policy;
        self
    }

    /// Set the execution deadline in ticks
    pub fn with_deadline_ticks(mut self, ticks: u64) -> Self {
        self.deadline_ticks = Some(ticks);
        self
    }

    /// Remove the execution deadline
    pub fn without_deadline(mut self) -> Self {
        self.deadline_ticks = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.in_flight, InFlightPolicy::Detach);
        assert_eq!(config.deadline_ticks, None);
    }

    #[test]
    fn builder_chain() {
        let config = SchedulerConfig::default()
            .with_in_flight(InFlightPolicy::Hold)
            .with_deadline_ticks(10)
            .without_deadline();
        assert_eq!(config.in_flight, InFlightPolicy::Hold);
        assert_eq!(config.deadline_ticks, None);
    }
}

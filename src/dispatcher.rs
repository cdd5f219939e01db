//! Entity-keyed registry of command queues.
//!
//! A [`CommandDispatcher`] owns one [`CommandQueue`] per entity, creating it
//! on first use, and drives every queue once per [`tick`](CommandDispatcher::tick).
//! It is an ordinary value: construct it where the game loop lives and pass
//! it around explicitly.
//!
//! # Routing
//!
//! | Method | Effect on the entity's queue |
//! |--------|------------------------------|
//! | [`enqueue`](CommandDispatcher::enqueue) | Adds to the pending list |
//! | [`execute_now`](CommandDispatcher::execute_now) | Runs beside the queue, queue untouched |
//! | [`execute_immediate`](CommandDispatcher::execute_immediate) | Clears the queue, then runs |
//! | [`cancel_current`](CommandDispatcher::cancel_current) | Cancels the running command |
//! | [`clear`](CommandDispatcher::clear) | Cancels everything |
//! | [`remove`](CommandDispatcher::remove) | Clears, then forgets the entity |
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use unit_orders::{CommandDispatcher, MoveCommand, Position, StopCommand};
//! use unit_orders::hal::MockUnit;
//!
//! let scout = Rc::new(RefCell::new(MockUnit::new()));
//! let mut orders: CommandDispatcher<&str> = CommandDispatcher::default();
//!
//! orders.enqueue("scout", Rc::new(MoveCommand::new(scout.clone(), Position::new(4.0, 0.0, 0.0)))).unwrap();
//! orders.enqueue("scout", Rc::new(StopCommand::new(scout.clone()))).unwrap();
//!
//! orders.tick(); // stop is High, so it goes first
//! assert_eq!(scout.borrow().stops, 1);
//! orders.tick();
//! assert_eq!(scout.borrow().moves.len(), 1);
//! assert!(!orders.has_pending(&"scout"));
//! ```

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::commands::{Command, CommandStatus};
use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::priority::CommandQueue;

/// Maps entities to their command queues.
///
/// Queues are ticked in ascending key order, so a run is reproducible for a
/// given sequence of calls.
pub struct CommandDispatcher<K> {
    queues: BTreeMap<K, CommandQueue>,
    config: SchedulerConfig,
}

impl<K: Ord + Clone + Debug> CommandDispatcher<K> {
    /// Creates an empty dispatcher. New queues use `config`.
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            queues: BTreeMap::new(),
            config,
        }
    }

    /// Queues `command` for `entity`, creating the entity's queue if needed.
    pub fn enqueue(&mut self, entity: K, command: Rc<dyn Command>) -> Result<(), SchedulerError> {
        self.queue_mut(entity).enqueue(command)
    }

    /// Runs `command` right away without touching `entity`'s queue.
    ///
    /// Whatever the queue is running keeps running. The queue is created if
    /// missing. Returns the command's status after `run()` returns.
    pub fn execute_now(&mut self, entity: K, command: Rc<dyn Command>) -> CommandStatus {
        debug!(entity = ?entity, command = command.name(), "executing outside queue");
        self.queue_mut(entity);
        command.run();
        command.status()
    }

    /// Clears `entity`'s queue, cancelling what it can, then runs `command`.
    pub fn execute_immediate(&mut self, entity: K, command: Rc<dyn Command>) -> CommandStatus {
        debug!(entity = ?entity, command = command.name(), "preempting queue");
        self.queue_mut(entity).clear();
        command.run();
        command.status()
    }

    /// Cancels the command running for `entity`.
    pub fn cancel_current(&mut self, entity: &K) -> Result<(), SchedulerError> {
        self.existing(entity)?.cancel_current();
        Ok(())
    }

    /// Cancels and drops everything queued for `entity`.
    pub fn clear(&mut self, entity: &K) -> Result<(), SchedulerError> {
        self.existing(entity)?.clear();
        Ok(())
    }

    /// Clears `entity`'s queue and forgets the entity.
    pub fn remove(&mut self, entity: &K) -> Result<(), SchedulerError> {
        let mut queue = self
            .queues
            .remove(entity)
            .ok_or_else(|| unknown(entity))?;
        queue.clear();
        debug!(entity = ?entity, "entity removed");
        Ok(())
    }

    /// Advances every queue once.
    pub fn tick(&mut self) {
        trace!(queues = self.queues.len(), "dispatcher tick");
        for queue in self.queues.values_mut() {
            queue.advance();
        }
    }

    /// True if `entity` has a pending or running command. Unknown entities
    /// are idle.
    pub fn has_pending(&self, entity: &K) -> bool {
        self.queues.get(entity).is_some_and(CommandQueue::has_pending)
    }

    /// The queue for `entity`, if one was created.
    pub fn queue(&self, entity: &K) -> Option<&CommandQueue> {
        self.queues.get(entity)
    }

    /// Number of entities with a queue.
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    /// True if no entity has a queue.
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Entities with a queue, in tick order.
    pub fn entities(&self) -> impl Iterator<Item = &K> {
        self.queues.keys()
    }

    /// Configuration given to new queues.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    fn queue_mut(&mut self, entity: K) -> &mut CommandQueue {
        let config = self.config;
        self.queues.entry(entity).or_insert_with_key(|key| {
            debug!(entity = ?key, "creating command queue");
            CommandQueue::with_config(config)
        })
    }

    fn existing(&mut self, entity: &K) -> Result<&mut CommandQueue, SchedulerError> {
        self.queues.get_mut(entity).ok_or_else(|| unknown(entity))
    }
}

impl<K: Ord + Clone + Debug> Default for CommandDispatcher<K> {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

fn unknown<K: Debug>(entity: &K) -> SchedulerError {
    SchedulerError::UnknownEntity(format!("{:?}", entity))
}

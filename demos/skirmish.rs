//! A small scripted skirmish driven by the command dispatcher.
//!
//! Two mock units receive orders: a scout that travels over several ticks
//! and a gunner that fires at a target only while it is still alive. The
//! game loop ticks the dispatcher and fires the scout's arrival event on
//! tick 3.
//!
//! # Usage
//!
//! ```sh
//! RUST_LOG=debug cargo run --example skirmish
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use anyhow::Result;
use unit_orders::hal::MockUnit;
use unit_orders::{
    AttackCommand, Command, CommandDispatcher, CommandExt, InFlightPolicy, MoveCommand, Position,
    SchedulerConfig, StopCommand,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = SchedulerConfig::default()
        .with_in_flight(InFlightPolicy::Hold)
        .with_deadline_ticks(10);
    let mut orders = CommandDispatcher::new(config);

    let scout = Rc::new(RefCell::new(MockUnit::new().travelling()));
    let gunner = Rc::new(RefCell::new(MockUnit::new()));
    let target_alive = Rc::new(Cell::new(true));

    // Scout: travel to the ridge, then halt.
    let travel = Rc::new(MoveCommand::new(scout.clone(), Position::new(12.0, 0.0, 4.0)));
    let arrival = travel.completion();
    let patrol = travel.then(Rc::new(StopCommand::new(scout.clone())));
    orders.enqueue("scout", patrol.clone())?;

    // Gunner: two volleys, each only if the target still stands.
    for _ in 0..2 {
        let alive = target_alive.clone();
        let volley = Rc::new(AttackCommand::new(gunner.clone(), 7)).when(move || alive.get());
        orders.enqueue("gunner", volley)?;
    }

    for tick in 1..=5 {
        if tick == 2 {
            // First volley lands; the second is no longer needed.
            target_alive.set(false);
        }
        if tick == 3 {
            arrival.complete();
        }
        orders.tick();

        for entity in orders.entities() {
            if let Some(queue) = orders.queue(entity) {
                println!("tick {tick} {entity:>6}: {queue}");
            }
        }
    }

    println!("scout plan: {}", patrol.status().as_str());
    println!("scout stops: {}", scout.borrow().stops);
    println!("gunner volleys: {:?}", gunner.borrow().attacks);
    Ok(())
}

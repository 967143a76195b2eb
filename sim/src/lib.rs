//! Curation Pool Scenario Driver
//!
//! Replays a scripted list of actions against a curation pool and records
//! the pool's state after every step, including steps that failed.

pub mod record;
pub mod scenario;
pub mod simulation;

pub use record::{LogEntry, StateRecord, WatchedAccount};
pub use scenario::{Action, Scenario};
pub use simulation::Simulation;

/// Build the pool described by `scenario` and replay its actions
pub fn run_scenario(scenario: &Scenario) -> anyhow::Result<Vec<LogEntry>> {
    let mut simulation = Simulation::new(scenario)?;
    Ok(simulation.run(&scenario.actions))
}

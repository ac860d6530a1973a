use crate::engine::Simulation;
use crate::scenario::{Scenario, ScenarioError};

/// The core routine. Validates a scenario and builds a ready
/// [`Simulation`], stopped at virtual time zero.
///
/// This function returns an error if the scenario's configuration is
/// unusable.
pub fn run(scenario: Scenario) -> Result<Simulation, Error> {
    let valid = scenario.validate()?;
    Ok(Simulation::from_scenario(valid))
}

/// Top-level engine error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The scenario failed validation.
    #[error(transparent)]
    InvalidScenario(#[from] ScenarioError),
}

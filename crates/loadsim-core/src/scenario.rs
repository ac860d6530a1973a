//! This module defines simulation scenarios ([`Scenario`]): the initial
//! population of servers and clients plus the engine configuration.
//! `Loadsim` turns a validated scenario into a [`Simulation`](crate::engine::Simulation),
//! which can then be driven through virtual time.

use crate::config::SimConfig;
use crate::pool;
use crate::units::{Bytes, Millis};

/// A simulation scenario.
#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct Scenario {
    /// Initial number of servers.
    #[builder(default = 3)]
    pub nr_servers: usize,
    /// Initial number of clients.
    #[builder(default = 1)]
    pub nr_clients: usize,
    /// Engine configuration.
    #[builder(default)]
    pub config: SimConfig,
    /// Seed for the engine's random stream.
    #[builder(default = 0)]
    pub seed: u64,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Scenario {
    /// Validate a scenario, producing a `ValidScenario`.
    ///
    /// Correctness properties:
    ///
    /// - The request rate must be positive and finite.
    /// - The timeout must be nonzero.
    /// - Payload mean and sigma must be nonnegative and finite.
    /// - The throughput must afford at least one byte per tick.
    pub(crate) fn validate(self) -> Result<ValidScenario, ScenarioError> {
        let config = &self.config;
        if !config.request_rate.is_finite() || config.request_rate <= 0.0 {
            return Err(ScenarioError::InvalidRequestRate(config.request_rate));
        }
        if config.timeout == Millis::ZERO {
            return Err(ScenarioError::ZeroTimeout);
        }
        if !config.mean_size.is_finite() || config.mean_size < 0.0 {
            return Err(ScenarioError::InvalidMeanSize(config.mean_size));
        }
        if !config.size_sigma.is_finite() || config.size_sigma < 0.0 {
            return Err(ScenarioError::InvalidSizeSigma(config.size_sigma));
        }
        if pool::budget_per_tick(config.throughput) == Bytes::ZERO {
            return Err(ScenarioError::ThroughputTooLow {
                throughput: config.throughput,
                ticks_per_sec: pool::TICKS_PER_SEC,
            });
        }
        Ok(ValidScenario { scenario: self })
    }
}

/// A `ValidScenario` is a `Scenario` whose configuration satisfies the
/// properties listed in `Scenario::validate()`.
#[derive(Debug)]
pub(crate) struct ValidScenario {
    pub(crate) scenario: Scenario,
}

/// Scenario validation error.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// The per-client request rate is unusable.
    #[error("request rate must be positive and finite (got {0})")]
    InvalidRequestRate(f64),

    /// A zero timeout would expire every item on arrival.
    #[error("timeout must be nonzero")]
    ZeroTimeout,

    /// The mean payload size is unusable.
    #[error("mean payload size must be nonnegative and finite (got {0})")]
    InvalidMeanSize(f64),

    /// The payload size deviation is unusable.
    #[error("payload size sigma must be nonnegative and finite (got {0})")]
    InvalidSizeSigma(f64),

    /// The throughput truncates to an empty per-tick budget.
    #[error("throughput {throughput} affords no bytes per tick ({ticks_per_sec} ticks/sec)")]
    ThroughputTooLow {
        /// The configured throughput.
        throughput: Bytes,
        /// The tick frequency the budget is divided by.
        ticks_per_sec: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scenario_succeeds() {
        assert!(Scenario::default().validate().is_ok());
    }

    #[test]
    fn zero_request_rate_fails() {
        let config = SimConfig::builder().request_rate(0.0).build();
        let scenario = Scenario::builder().config(config).build();
        assert!(matches!(
            scenario.validate(),
            Err(ScenarioError::InvalidRequestRate(..))
        ));
    }

    #[test]
    fn non_finite_request_rate_fails() {
        let config = SimConfig::builder().request_rate(f64::NAN).build();
        let scenario = Scenario::builder().config(config).build();
        assert!(matches!(
            scenario.validate(),
            Err(ScenarioError::InvalidRequestRate(..))
        ));
    }

    #[test]
    fn zero_timeout_fails() {
        let config = SimConfig::builder().timeout(Millis::ZERO).build();
        let scenario = Scenario::builder().config(config).build();
        assert!(matches!(scenario.validate(), Err(ScenarioError::ZeroTimeout)));
    }

    #[test]
    fn negative_mean_size_fails() {
        let config = SimConfig::builder().mean_size(-1.0).build();
        let scenario = Scenario::builder().config(config).build();
        assert!(matches!(
            scenario.validate(),
            Err(ScenarioError::InvalidMeanSize(..))
        ));
    }

    #[test]
    fn sub_tick_throughput_fails() {
        let config = SimConfig::builder().throughput(Bytes::new(50)).build();
        let scenario = Scenario::builder().config(config).build();
        assert!(matches!(
            scenario.validate(),
            Err(ScenarioError::ThroughputTooLow { .. })
        ));
    }

    #[test]
    fn empty_topology_is_permitted() {
        // Routing guards against the empty server list at runtime.
        let scenario = Scenario::builder().nr_servers(0).nr_clients(0).build();
        assert!(scenario.validate().is_ok());
    }
}

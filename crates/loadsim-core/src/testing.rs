use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{RoutingMode, SimConfig};
use crate::scenario::Scenario;

pub(crate) fn rng() -> StdRng {
    StdRng::seed_from_u64(0)
}

/// The default configuration with round-robin routing.
pub(crate) fn round_robin_config() -> SimConfig {
    SimConfig::builder().mode(RoutingMode::RoundRobin).build()
}

/// The default scenario (3 servers, 1 client, least-connections) under a
/// chosen seed.
pub(crate) fn seeded_scenario(seed: u64) -> Scenario {
    Scenario::builder().seed(seed).build()
}

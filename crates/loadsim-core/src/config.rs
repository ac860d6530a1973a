//! Engine configuration: the process-wide knobs read by every component,
//! frozen for the duration of a run so that metrics series stay comparable.

use crate::units::{Bytes, Millis};

/// Floor for the configured throughput. Keeps the per-tick byte budget
/// positive so a tick can always make progress.
pub const MIN_THROUGHPUT: Bytes = Bytes::new(100);

/// Floor for the configured timeout.
pub const MIN_TIMEOUT: Millis = Millis::ONE;

/// Floor for the per-client request rate.
pub const MIN_REQUEST_RATE: f64 = 0.001;

/// Routing policy used by the load balancer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RoutingMode {
    /// Cycle through servers in list order.
    RoundRobin,
    /// Pick the server with the shortest backlog.
    LeastConnections,
}

/// Process-wide simulation parameters.
///
/// Mutated only through the engine's setters, which reject changes while a
/// run is in progress.
#[derive(Debug, Clone, PartialEq, typed_builder::TypedBuilder, serde::Serialize, serde::Deserialize)]
pub struct SimConfig {
    /// Per-server processing rate in bytes per second.
    #[builder(default = Bytes::new(1000))]
    pub throughput: Bytes,
    /// Maximum age a work item may reach before it is discarded unprocessed.
    #[builder(default = Millis::new(100_000))]
    pub timeout: Millis,
    /// Mean payload size in bytes.
    #[builder(default = 1000.0)]
    pub mean_size: f64,
    /// Payload size standard deviation in bytes.
    #[builder(default = 10.0)]
    pub size_sigma: f64,
    /// Requests per second generated by each client.
    #[builder(default = 10.0)]
    pub request_rate: f64,
    /// Load balancer routing policy.
    #[builder(default = RoutingMode::LeastConnections)]
    pub mode: RoutingMode,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Error returned by configuration mutators.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Parameters cannot change mid-run.
    #[error("configuration is frozen while the simulation is running")]
    Frozen,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_initial_ui_state() {
        let config = SimConfig::default();
        assert_eq!(config.throughput, Bytes::new(1000));
        assert_eq!(config.timeout, Millis::new(100_000));
        assert_eq!(config.mean_size, 1000.0);
        assert_eq!(config.size_sigma, 10.0);
        assert_eq!(config.request_rate, 10.0);
        assert_eq!(config.mode, RoutingMode::LeastConnections);
    }
}

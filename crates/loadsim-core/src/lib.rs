#![warn(unreachable_pub, missing_debug_implementations)]

//! The core engine of a client / load-balancer / server queueing
//! simulation. Clients emit requests at randomized intervals, a balancer
//! routes each one to a server under a selectable policy, and servers burn
//! a fixed byte budget per 10ms tick, completing or expiring work items.
//! The most common entry point is [the routine](run::run) that turns a
//! [scenario](scenario::Scenario) into a [`Simulation`](engine::Simulation)
//! driven through virtual time.

#[macro_use]
mod ident;

pub mod balancer;
pub mod config;
pub mod engine;
pub mod events;
pub mod metrics;
pub mod pool;
pub mod random;
pub mod run;
pub mod scenario;
pub mod topology;
pub mod units;
pub mod workload;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ConfigError, RoutingMode, SimConfig};
pub use engine::{ServerSnapshot, SimSnapshot, Simulation};
pub use events::SimEvent;
pub use metrics::MetricsSnapshot;
pub use run::{run, Error};
pub use scenario::{Scenario, ScenarioError};
pub use topology::{ClientId, ServerId};
pub use units::{Bytes, Millis};
pub use workload::RequestId;

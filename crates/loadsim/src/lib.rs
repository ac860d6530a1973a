//! `Loadsim` simulates a client / load-balancer / server queueing network.
//! Clients generate requests at a randomized, Poisson-like rate, a load
//! balancer routes each request under a round-robin or least-connections
//! policy, and servers process queued work under a per-tick byte budget,
//! subject to timeouts. The engine is deterministic and driven through
//! virtual time; the driver hosts it on a wall-clock thread for
//! interactive use.

#![warn(unreachable_pub, missing_docs)]

pub mod core;
pub mod driver;

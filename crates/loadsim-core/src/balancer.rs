//! The load balancer: an inbound request queue plus routing-policy state.
//! Draining converts each queued request into a sized, timestamped work
//! item on some server's backlog.

use std::collections::VecDeque;

use rand::Rng;

use crate::config::{RoutingMode, SimConfig};
use crate::metrics::Metrics;
use crate::random;
use crate::topology::{ServerId, Topology};
use crate::workload::{Request, WorkItem};

/// Routes requests to servers under the configured policy.
///
/// `last_server` is the round-robin cursor; least-connections also records
/// its choice there so the most recent routing decision is always
/// inspectable.
#[derive(Debug, Clone)]
pub struct LoadBalancer {
    queue: VecDeque<Request>,
    last_server: ServerId,
}

impl LoadBalancer {
    pub(crate) fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            last_server: ServerId::ZERO,
        }
    }

    /// Number of requests waiting to be routed.
    pub fn backlog(&self) -> usize {
        self.queue.len()
    }

    /// Server chosen by the most recent routing decision.
    pub fn last_server(&self) -> ServerId {
        self.last_server
    }

    /// Enqueues a request and immediately drains the queue. Draining on
    /// every enqueue keeps the trigger level-sensitive rather than
    /// edge-sensitive.
    pub fn submit<R: Rng + ?Sized>(
        &mut self,
        request: Request,
        topology: &mut Topology,
        config: &SimConfig,
        metrics: &mut Metrics,
        rng: &mut R,
    ) {
        self.queue.push_back(request);
        self.drain(topology, config, metrics, rng);
    }

    /// Routes queued requests until none remain. With zero servers the
    /// queued requests are dropped rather than left waiting.
    pub fn drain<R: Rng + ?Sized>(
        &mut self,
        topology: &mut Topology,
        config: &SimConfig,
        metrics: &mut Metrics,
        rng: &mut R,
    ) {
        while let Some(request) = self.queue.pop_front() {
            let Some(target) = self.select(topology, config.mode) else {
                log::warn!("no servers registered, dropping request {}", request.id);
                continue;
            };
            let size = random::next_size(config.mean_size, config.size_sigma, rng);
            let item = WorkItem::from_request(&request, size, config.timeout, target);
            metrics.record_size(size);
            metrics.record_routed();
            let server = topology
                .server_mut(target)
                .unwrap(); // `select` only returns registered ids
            server.queue.push_back(item);
            self.last_server = target;
        }
    }

    fn select(&self, topology: &Topology, mode: RoutingMode) -> Option<ServerId> {
        let servers = topology.servers();
        if servers.is_empty() {
            return None;
        }
        let target = match mode {
            RoutingMode::RoundRobin => {
                // Positional successor of the last choice. When the last
                // choice is not in the list (nothing routed yet), the
                // rotation restarts at the head.
                let next = servers
                    .iter()
                    .position(|s| s.id == self.last_server)
                    .map_or(0, |i| (i + 1) % servers.len());
                servers[next].id
            }
            RoutingMode::LeastConnections => {
                // Non-mutating scan; ties go to the first minimal element
                // in current list order.
                let mut best = &servers[0];
                for server in &servers[1..] {
                    if server.backlog() < best.backlog() {
                        best = server;
                    }
                }
                best.id
            }
        };
        Some(target)
    }
}

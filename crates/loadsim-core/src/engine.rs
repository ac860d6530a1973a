//! The state-owning simulation engine. Three periodic activities (per-client
//! request generation, the 10ms server tick, the 1s metrics flush) are
//! multiplexed onto a single min-heap of timed firings, giving a
//! deterministic timeline that needs no wall clock.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::balancer::LoadBalancer;
use crate::config::{
    ConfigError, RoutingMode, SimConfig, MIN_REQUEST_RATE, MIN_THROUGHPUT, MIN_TIMEOUT,
};
use crate::events::{EventSink, SimEvent};
use crate::metrics::{Metrics, MetricsSnapshot, FLUSH_INTERVAL};
use crate::pool::{self, TICK};
use crate::random::InterArrivalPool;
use crate::scenario::ValidScenario;
use crate::topology::{ClientId, ServerId, Topology};
use crate::units::{Bytes, Millis};
use crate::workload::{Request, RequestId};

/// A timed firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Activity {
    /// One client's self-rescheduling generation step.
    Generate(ClientId),
    /// The fixed-step server loop.
    Tick,
    /// The per-second metrics flush.
    Flush,
}

/// Heap entries order by fire time, then by insertion sequence so that
/// equal-time firings replay in scheduling order.
type Firing = Reverse<(Millis, u64, Activity)>;

/// The simulation engine.
///
/// Owns every piece of mutable state; all transitions happen inside
/// [`advance_to`](Simulation::advance_to), so a single owner observing the
/// engine between advances sees a consistent snapshot.
#[derive(Debug)]
pub struct Simulation {
    now: Millis,
    running: bool,
    seq: u64,
    firings: BinaryHeap<Firing>,
    topology: Topology,
    balancer: LoadBalancer,
    metrics: Metrics,
    config: SimConfig,
    pool: InterArrivalPool,
    rng: StdRng,
    events: EventSink,
    initial_servers: usize,
    initial_clients: usize,
}

impl Simulation {
    pub(crate) fn from_scenario(valid: ValidScenario) -> Self {
        let ValidScenario { scenario } = valid;
        let mut rng = StdRng::seed_from_u64(scenario.seed);
        let pool = InterArrivalPool::new(scenario.config.request_rate, &mut rng);
        Self {
            now: Millis::ZERO,
            running: false,
            seq: 0,
            firings: BinaryHeap::new(),
            topology: Topology::new(scenario.nr_servers, scenario.nr_clients),
            balancer: LoadBalancer::new(),
            metrics: Metrics::default(),
            pool,
            rng,
            events: EventSink::default(),
            initial_servers: scenario.nr_servers,
            initial_clients: scenario.nr_clients,
            config: scenario.config,
        }
    }

    /// Current position on the virtual timeline.
    pub fn now(&self) -> Millis {
        self.now
    }

    /// Whether a run is in progress.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// The active configuration.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// The registered clients and servers.
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    delegate::delegate! {
        to self.topology {
            /// Number of registered servers.
            pub fn nr_servers(&self) -> usize;

            /// Number of registered clients.
            pub fn nr_clients(&self) -> usize;
        }
    }

    /// Begins a run. A no-op when already running.
    ///
    /// Stale firings from a previous run are discarded before the generator
    /// loops, the server tick, and the metrics flush are armed.
    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.firings.clear();
        self.running = true;
        let clients = self
            .topology
            .clients()
            .iter()
            .map(|c| c.id)
            .collect::<Vec<_>>();
        for client in clients {
            let delay = self.pool.draw(&mut self.rng);
            self.schedule(Activity::Generate(client), self.now + delay);
        }
        self.schedule(Activity::Tick, self.now + TICK);
        self.schedule(Activity::Flush, self.now + FLUSH_INTERVAL);
        log::debug!("simulation started at {}", self.now);
    }

    /// Ends the run. Firings already armed complete their final pass; no
    /// new work is scheduled once the flag is cleared.
    pub fn stop(&mut self) {
        self.running = false;
        log::debug!("simulation stopped at {}", self.now);
    }

    /// Returns the engine to its initial state: fresh topology, empty
    /// balancer and counters, timeline back at zero. Rejected mid-run.
    pub fn reset(&mut self) -> Result<(), ConfigError> {
        self.ensure_mutable()?;
        self.topology.reset(self.initial_servers, self.initial_clients);
        self.balancer = LoadBalancer::new();
        self.metrics = Metrics::default();
        self.firings.clear();
        self.seq = 0;
        self.now = Millis::ZERO;
        Ok(())
    }

    /// Registers a server; permitted mid-run.
    pub fn add_server(&mut self) -> ServerId {
        self.topology.add_server()
    }

    /// Registers a client; permitted mid-run. The new client's generator
    /// loop is armed at the next [`start`](Simulation::start).
    pub fn add_client(&mut self) -> ClientId {
        self.topology.add_client()
    }

    /// Attaches an event subscriber.
    pub fn attach_events(&mut self, sender: crossbeam_channel::Sender<SimEvent>) {
        self.events.attach(sender);
    }

    pub fn set_request_rate(&mut self, rate: f64) -> Result<(), ConfigError> {
        self.ensure_mutable()?;
        self.config.request_rate = rate.max(MIN_REQUEST_RATE);
        // The delay pool is tied to the rate, so it is rebuilt here and
        // nowhere else.
        self.pool = InterArrivalPool::new(self.config.request_rate, &mut self.rng);
        Ok(())
    }

    pub fn set_timeout(&mut self, timeout: Millis) -> Result<(), ConfigError> {
        self.ensure_mutable()?;
        self.config.timeout = timeout.max(MIN_TIMEOUT);
        Ok(())
    }

    pub fn set_throughput(&mut self, throughput: Bytes) -> Result<(), ConfigError> {
        self.ensure_mutable()?;
        self.config.throughput = throughput.max(MIN_THROUGHPUT);
        Ok(())
    }

    pub fn set_routing_mode(&mut self, mode: RoutingMode) -> Result<(), ConfigError> {
        self.ensure_mutable()?;
        self.config.mode = mode;
        Ok(())
    }

    pub fn set_mean_size(&mut self, mean: f64) -> Result<(), ConfigError> {
        self.ensure_mutable()?;
        self.config.mean_size = mean.max(0.0);
        Ok(())
    }

    pub fn set_size_sigma(&mut self, sigma: f64) -> Result<(), ConfigError> {
        self.ensure_mutable()?;
        self.config.size_sigma = sigma.max(0.0);
        Ok(())
    }

    /// Executes every firing due at or before `t` and moves the clock to
    /// `t`. Times in the past are ignored; the clock never moves backwards.
    pub fn advance_to(&mut self, t: Millis) {
        if t < self.now {
            return;
        }
        while let Some(&Reverse((at, _, activity))) = self.firings.peek() {
            if at > t {
                break;
            }
            self.firings.pop();
            self.now = at;
            self.fire(activity);
        }
        self.now = t;
    }

    /// Advances the clock by `delta`.
    pub fn advance_by(&mut self, delta: Millis) {
        self.advance_to(self.now + delta);
    }

    /// Read-only view of the aggregated metrics.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Point-in-time view of the full engine state.
    pub fn snapshot(&self) -> SimSnapshot {
        SimSnapshot {
            now: self.now,
            running: self.running,
            servers: self
                .topology
                .servers()
                .iter()
                .map(|s| ServerSnapshot {
                    id: s.id,
                    queued: s.backlog(),
                    current: s.current.as_ref().map(|item| item.id.clone()),
                })
                .collect(),
            clients: self.topology.clients().iter().map(|c| c.id).collect(),
            balancer_backlog: self.balancer.backlog(),
            last_server: self.balancer.last_server(),
            metrics: self.metrics.snapshot(),
        }
    }

    fn ensure_mutable(&self) -> Result<(), ConfigError> {
        if self.running {
            return Err(ConfigError::Frozen);
        }
        Ok(())
    }

    fn schedule(&mut self, activity: Activity, at: Millis) {
        self.seq += 1;
        self.firings.push(Reverse((at, self.seq, activity)));
    }

    fn fire(&mut self, activity: Activity) {
        match activity {
            Activity::Generate(client) => self.generate(client),
            Activity::Tick => {
                pool::tick(
                    &mut self.topology,
                    self.config.throughput,
                    self.now,
                    &mut self.metrics,
                    &mut self.events,
                );
                if self.running {
                    self.schedule(Activity::Tick, self.now + TICK);
                }
            }
            Activity::Flush => {
                self.metrics.flush();
                if self.running {
                    self.schedule(Activity::Flush, self.now + FLUSH_INTERVAL);
                }
            }
        }
    }

    /// One firing of a client's generation loop. The running flag is
    /// checked first so that stopping halts every client without touching
    /// its armed timer.
    fn generate(&mut self, client: ClientId) {
        if !self.running {
            return;
        }
        let id = RequestId::generate(&mut self.rng);
        let request = Request::new(id.clone(), id.as_str().to_owned(), self.now, client);
        self.metrics.record_received();
        self.events.emit(SimEvent::RequestSent {
            client,
            request: id,
        });
        self.balancer.submit(
            request,
            &mut self.topology,
            &self.config,
            &mut self.metrics,
            &mut self.rng,
        );
        // A zero draw would re-fire within the same instant.
        let delay = self.pool.draw(&mut self.rng).max(Millis::ONE);
        self.schedule(Activity::Generate(client), self.now + delay);
    }
}

/// Point-in-time view of one server.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ServerSnapshot {
    pub id: ServerId,
    pub queued: usize,
    pub current: Option<RequestId>,
}

/// Full engine state snapshot.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SimSnapshot {
    pub now: Millis,
    pub running: bool,
    pub servers: Vec<ServerSnapshot>,
    pub clients: Vec<ClientId>,
    pub balancer_backlog: usize,
    pub last_server: ServerId,
    pub metrics: MetricsSnapshot,
}

impl SimSnapshot {
    /// Items resident on servers, queued plus in-flight.
    pub fn items_in_flight(&self) -> usize {
        self.servers
            .iter()
            .map(|s| s.queued + usize::from(s.current.is_some()))
            .sum()
    }
}

#![warn(unreachable_pub, missing_debug_implementations)]

//! This crate hosts a [`Simulation`] on a wall-clock thread. The thread is
//! the single writer: it owns the engine, drains a command channel, and
//! between commands advances the virtual clock to match elapsed wall time.
//! Callers hold a cloneable [`DriverHandle`] whose commands serialize
//! through the channel, so concurrent callers never race on engine state.

use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use loadsim_core::{
    Bytes, ClientId, ConfigError, MetricsSnapshot, Millis, RoutingMode, ServerId, SimEvent,
    SimSnapshot, Simulation,
};

/// Granularity of the wall-clock pump. Bounds how long the worker sleeps
/// before checking the clock again.
const PUMP_INTERVAL: Duration = Duration::from_millis(2);

enum Command {
    Start,
    Stop,
    Reset(Sender<Result<(), ConfigError>>),
    AddServer(Sender<ServerId>),
    AddClient(Sender<ClientId>),
    SetRequestRate(f64, Sender<Result<(), ConfigError>>),
    SetTimeout(Millis, Sender<Result<(), ConfigError>>),
    SetThroughput(Bytes, Sender<Result<(), ConfigError>>),
    SetRoutingMode(RoutingMode, Sender<Result<(), ConfigError>>),
    SetMeanSize(f64, Sender<Result<(), ConfigError>>),
    SetSizeSigma(f64, Sender<Result<(), ConfigError>>),
    Metrics(Sender<MetricsSnapshot>),
    Snapshot(Sender<SimSnapshot>),
    Subscribe(Sender<SimEvent>),
    Shutdown,
}

/// A simulation hosted on its own thread.
#[derive(Debug)]
pub struct Driver {
    handle: DriverHandle,
    thread: thread::JoinHandle<()>,
}

/// Spawns the worker thread that owns `sim` and returns the driver.
pub fn spawn(sim: Simulation) -> Driver {
    let (commands, inbox) = unbounded();
    let thread = thread::spawn(move || serve(sim, inbox));
    Driver {
        handle: DriverHandle { commands },
        thread,
    }
}

impl Driver {
    /// A handle for submitting commands.
    pub fn handle(&self) -> DriverHandle {
        self.handle.clone()
    }

    /// Stops the worker thread and waits for it to exit.
    pub fn shutdown(self) -> Result<(), DriverError> {
        self.handle
            .commands
            .send(Command::Shutdown)
            .map_err(|_| DriverError::Disconnected)?;
        self.thread.join().map_err(|_| DriverError::Disconnected)
    }
}

/// Handle to a driven simulation. Cloneable; all clones feed one channel.
#[derive(Debug, Clone)]
pub struct DriverHandle {
    commands: Sender<Command>,
}

impl DriverHandle {
    /// Begins a run.
    pub fn start(&self) -> Result<(), DriverError> {
        self.send(Command::Start)
    }

    /// Ends the run. In-flight firings complete; nothing new is scheduled.
    pub fn stop(&self) -> Result<(), DriverError> {
        self.send(Command::Stop)
    }

    /// Returns the engine to its initial state.
    pub fn reset(&self) -> Result<(), DriverError> {
        self.call(Command::Reset)??;
        Ok(())
    }

    /// Registers a server and returns its id.
    pub fn add_server(&self) -> Result<ServerId, DriverError> {
        self.call(Command::AddServer)
    }

    /// Registers a client and returns its id.
    pub fn add_client(&self) -> Result<ClientId, DriverError> {
        self.call(Command::AddClient)
    }

    pub fn set_request_rate(&self, rate: f64) -> Result<(), DriverError> {
        self.call(|reply| Command::SetRequestRate(rate, reply))??;
        Ok(())
    }

    pub fn set_timeout(&self, timeout: Millis) -> Result<(), DriverError> {
        self.call(|reply| Command::SetTimeout(timeout, reply))??;
        Ok(())
    }

    pub fn set_throughput(&self, throughput: Bytes) -> Result<(), DriverError> {
        self.call(|reply| Command::SetThroughput(throughput, reply))??;
        Ok(())
    }

    pub fn set_routing_mode(&self, mode: RoutingMode) -> Result<(), DriverError> {
        self.call(|reply| Command::SetRoutingMode(mode, reply))??;
        Ok(())
    }

    pub fn set_mean_size(&self, mean: f64) -> Result<(), DriverError> {
        self.call(|reply| Command::SetMeanSize(mean, reply))??;
        Ok(())
    }

    pub fn set_size_sigma(&self, sigma: f64) -> Result<(), DriverError> {
        self.call(|reply| Command::SetSizeSigma(sigma, reply))??;
        Ok(())
    }

    /// Read-only view of the aggregated metrics.
    pub fn metrics(&self) -> Result<MetricsSnapshot, DriverError> {
        self.call(Command::Metrics)
    }

    /// Point-in-time view of the full engine state.
    pub fn snapshot(&self) -> Result<SimSnapshot, DriverError> {
        self.call(Command::Snapshot)
    }

    /// Attaches an event subscriber to the engine.
    pub fn subscribe(&self) -> Result<Receiver<SimEvent>, DriverError> {
        let (tx, rx) = unbounded();
        self.send(Command::Subscribe(tx))?;
        Ok(rx)
    }

    fn send(&self, command: Command) -> Result<(), DriverError> {
        self.commands
            .send(command)
            .map_err(|_| DriverError::Disconnected)
    }

    fn call<T>(&self, make: impl FnOnce(Sender<T>) -> Command) -> Result<T, DriverError> {
        let (reply, response) = bounded(1);
        self.send(make(reply))?;
        response.recv().map_err(|_| DriverError::Disconnected)
    }
}

/// Driver failure.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The worker thread is gone.
    #[error("the simulation thread is no longer running")]
    Disconnected,

    /// The engine rejected the command.
    #[error(transparent)]
    Rejected(#[from] ConfigError),
}

/// The worker loop. Replies are sent best-effort: a caller that dropped its
/// reply channel simply misses the response.
fn serve(mut sim: Simulation, inbox: Receiver<Command>) {
    // The wall-clock epoch maps onto the virtual timeline at `origin`.
    // Re-anchored on start and reset so that time spent stopped does not
    // leak into the simulation.
    let mut epoch = Instant::now();
    let mut origin = sim.now();
    loop {
        if sim.is_running() {
            let elapsed = Millis::new(epoch.elapsed().as_millis() as u64);
            sim.advance_to(origin + elapsed);
        }
        match inbox.recv_timeout(PUMP_INTERVAL) {
            Ok(Command::Start) => {
                epoch = Instant::now();
                origin = sim.now();
                sim.start();
            }
            Ok(Command::Stop) => {
                let elapsed = Millis::new(epoch.elapsed().as_millis() as u64);
                sim.advance_to(origin + elapsed);
                sim.stop();
            }
            Ok(Command::Reset(reply)) => {
                let result = sim.reset();
                if result.is_ok() {
                    epoch = Instant::now();
                    origin = sim.now();
                }
                let _ = reply.send(result);
            }
            Ok(Command::AddServer(reply)) => {
                let _ = reply.send(sim.add_server());
            }
            Ok(Command::AddClient(reply)) => {
                let _ = reply.send(sim.add_client());
            }
            Ok(Command::SetRequestRate(rate, reply)) => {
                let _ = reply.send(sim.set_request_rate(rate));
            }
            Ok(Command::SetTimeout(timeout, reply)) => {
                let _ = reply.send(sim.set_timeout(timeout));
            }
            Ok(Command::SetThroughput(throughput, reply)) => {
                let _ = reply.send(sim.set_throughput(throughput));
            }
            Ok(Command::SetRoutingMode(mode, reply)) => {
                let _ = reply.send(sim.set_routing_mode(mode));
            }
            Ok(Command::SetMeanSize(mean, reply)) => {
                let _ = reply.send(sim.set_mean_size(mean));
            }
            Ok(Command::SetSizeSigma(sigma, reply)) => {
                let _ = reply.send(sim.set_size_sigma(sigma));
            }
            Ok(Command::Metrics(reply)) => {
                let _ = reply.send(sim.metrics());
            }
            Ok(Command::Snapshot(reply)) => {
                let _ = reply.send(sim.snapshot());
            }
            Ok(Command::Subscribe(sender)) => {
                sim.attach_events(sender);
            }
            Ok(Command::Shutdown) => break,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    log::debug!("simulation thread exiting at {}", sim.now());
}

#[cfg(test)]
mod tests {
    use loadsim_core::{run, Scenario};

    use super::*;

    fn driven() -> Driver {
        spawn(run(Scenario::default()).unwrap())
    }

    #[test]
    fn commands_serialize_through_the_channel() {
        let driver = driven();
        let handle = driver.handle();
        handle.set_throughput(Bytes::new(2000)).unwrap();
        handle.start().unwrap();
        assert!(matches!(
            handle.set_throughput(Bytes::new(3000)),
            Err(DriverError::Rejected(ConfigError::Frozen))
        ));
        handle.stop().unwrap();
        handle.set_throughput(Bytes::new(3000)).unwrap();
        driver.shutdown().unwrap();
    }

    #[test]
    fn snapshots_reflect_topology_changes() {
        let driver = driven();
        let handle = driver.handle();
        assert_eq!(handle.add_server().unwrap(), ServerId::new(4));
        assert_eq!(handle.add_client().unwrap(), ClientId::new(2));
        let snapshot = handle.snapshot().unwrap();
        assert_eq!(snapshot.servers.len(), 4);
        assert_eq!(snapshot.clients.len(), 2);
        driver.shutdown().unwrap();
    }

    #[test]
    fn a_fresh_driver_reports_empty_metrics() {
        let driver = driven();
        let metrics = driver.handle().metrics().unwrap();
        assert_eq!(metrics.received_total, 0);
        assert!(metrics.requests_per_sec.is_empty());
        driver.shutdown().unwrap();
    }

    #[test]
    fn reset_is_rejected_mid_run() {
        let driver = driven();
        let handle = driver.handle();
        handle.start().unwrap();
        assert!(matches!(
            handle.reset(),
            Err(DriverError::Rejected(ConfigError::Frozen))
        ));
        handle.stop().unwrap();
        handle.reset().unwrap();
        driver.shutdown().unwrap();
    }

    #[test]
    fn handles_outlive_the_driver_gracefully() {
        let driver = driven();
        let handle = driver.handle();
        driver.shutdown().unwrap();
        assert!(matches!(handle.start(), Err(DriverError::Disconnected)));
    }
}

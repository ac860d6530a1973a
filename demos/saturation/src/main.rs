use clap::Parser;
use itertools::Itertools;
use loadsim_core::{run, Bytes, Millis, RoutingMode, Scenario, SimConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Requests per second per client
    #[arg(long, default_value_t = 10.0)]
    rate: f64,

    /// Per-server throughput in bytes per second
    #[arg(long, default_value = "1000")]
    throughput: Bytes,

    /// Work item timeout in milliseconds
    #[arg(long, default_value = "100000")]
    timeout: Millis,

    /// Mean payload size in bytes
    #[arg(long, default_value_t = 1000.0)]
    mean: f64,

    /// Payload size standard deviation in bytes
    #[arg(long, default_value_t = 10.0)]
    sigma: f64,

    /// Routing policy, either "rr" or "lc"
    #[arg(long, default_value = "lc")]
    mode: String,

    /// Number of servers
    #[arg(long, default_value_t = 3)]
    servers: usize,

    /// Number of clients
    #[arg(long, default_value_t = 1)]
    clients: usize,

    /// Simulated duration in seconds
    #[arg(short, long, default_value_t = 60)]
    duration: u64,

    /// Random seed
    #[arg(short, long, default_value_t = 0)]
    seed: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mode = match &args.mode[..] {
        "rr" => RoutingMode::RoundRobin,
        "lc" => RoutingMode::LeastConnections,
        other => anyhow::bail!("unknown routing mode {other:?}, expected \"rr\" or \"lc\""),
    };

    let config = SimConfig::builder()
        .throughput(args.throughput)
        .timeout(args.timeout)
        .mean_size(args.mean)
        .size_sigma(args.sigma)
        .request_rate(args.rate)
        .mode(mode)
        .build();
    let scenario = Scenario::builder()
        .nr_servers(args.servers)
        .nr_clients(args.clients)
        .config(config)
        .seed(args.seed)
        .build();

    let mut sim = run(scenario)?;
    sim.start();
    sim.advance_by(Millis::new(args.duration * 1000));
    sim.stop();

    let metrics = sim.metrics();
    let snapshot = sim.snapshot();
    println!("requests/sec:    {}", metrics.requests_per_sec.iter().join(" "));
    println!("completions/sec: {}", metrics.completions_per_sec.iter().join(" "));
    println!("timeouts/sec:    {}", metrics.timeouts_per_sec.iter().join(" "));
    println!();
    println!("received:  {}", metrics.received_total);
    println!("routed:    {}", metrics.routed_total);
    println!("completed: {}", metrics.completed_total);
    println!("timed out: {}", metrics.timed_out_total);
    println!("backlog:   {}", snapshot.items_in_flight());

    let accounted =
        metrics.completed_total + metrics.timed_out_total + snapshot.items_in_flight() as u64;
    anyhow::ensure!(
        accounted == metrics.routed_total,
        "conservation violated: {accounted} accounted vs {} routed",
        metrics.routed_total
    );
    Ok(())
}

use std::net::IpAddr;

use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use tokio::runtime::Builder;

use dv_sim::config::SimConfig;
use dv_sim::sim;
use dv_sim::topology::Topology;

/// Simulates the distributed Bellman-Ford distance-vector algorithm over
/// UDP: one task per router, plus a relay that forwards UPDATE traffic
/// strictly along the edges of a static topology.
#[derive(Parser)]
#[command(name = "dv-sim", version)]
struct Cli {
    /// Network topology description, one `Src:<Peer,Dist>:...` line per router
    #[arg(long, default_value = "topology.txt")]
    topology: String,

    /// JSON config file; the flags below override its values
    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    relay_host: Option<IpAddr>,

    #[arg(long)]
    relay_port: Option<u16>,

    #[arg(long)]
    node_host: Option<IpAddr>,

    /// First router's port; the rest bind upwards from it (0 = ephemeral)
    #[arg(long)]
    node_base_port: Option<u16>,

    /// Per-cycle receive window in milliseconds
    #[arg(long)]
    recv_timeout_ms: Option<u64>,

    /// How long a router waits for its initial vector, in milliseconds
    #[arg(long)]
    join_timeout_ms: Option<u64>,

    /// Quiet receive cycles a router tolerates before exiting
    #[arg(long)]
    idle_cycle_limit: Option<u32>,
}

fn merged_config(cli: &Cli) -> Result<SimConfig> {
    let mut config = match &cli.config {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };
    if let Some(host) = cli.relay_host {
        config.relay_host = host;
    }
    if let Some(port) = cli.relay_port {
        config.relay_port = port;
    }
    if let Some(host) = cli.node_host {
        config.node_host = host;
    }
    if let Some(port) = cli.node_base_port {
        config.node_base_port = port;
    }
    if let Some(ms) = cli.recv_timeout_ms {
        config.recv_timeout_ms = ms;
    }
    if let Some(ms) = cli.join_timeout_ms {
        config.join_timeout_ms = ms;
    }
    if let Some(limit) = cli.idle_cycle_limit {
        config.idle_cycle_limit = limit;
    }

    for port in [config.relay_port, config.node_base_port] {
        if port != 0 && port < 1024 {
            anyhow::bail!("port {port} is reserved, pick one at or above 1024");
        }
    }
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = merged_config(&cli)?;
    let topology = Topology::load_from_file(&cli.topology)?;
    println!(
        "simulating {} routers from `{}`, relay at {}",
        topology.len(),
        cli.topology,
        config.relay_addr()
    );

    let rt = Builder::new_multi_thread().enable_all().build()?;
    let report = rt.block_on(sim::run(topology, &config))?;

    for node in &report.nodes {
        println!("NODE [{}]: distance vector: {:?}", node.id, node.vector);
    }
    println!(
        "relay forwarded {} datagrams for {} routers",
        report.relay.forwarded, report.relay.joined
    );
    Ok(())
}

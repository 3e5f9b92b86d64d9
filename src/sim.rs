//! Drives one whole simulation run: binds every socket up front, spawns the
//! relay plus one task per router, then collects the final vectors.

use anyhow::Context;
use log::{debug, info};

use crate::config::SimConfig;
use crate::node::{Node, NodeReport};
use crate::relay::{Relay, RelaySummary};
use crate::topology::Topology;
use crate::transport::Transport;

#[derive(Debug, Clone)]
pub struct SimReport {
    /// One report per router, in stable id order.
    pub nodes: Vec<NodeReport>,
    pub relay: RelaySummary,
}

/// Run a topology to convergence. Every socket is bound before anything is
/// spawned, so a taken port fails the run immediately instead of wedging
/// the join phase.
pub async fn run(topology: Topology, config: &SimConfig) -> anyhow::Result<SimReport> {
    let relay_transport = Transport::bind(config.relay_addr()).await?;
    let relay_addr = relay_transport.local_addr()?;

    let router_ids = topology.router_ids();
    let mut node_transports = Vec::with_capacity(router_ids.len());
    for (offset, id) in router_ids.iter().enumerate() {
        let transport = Transport::bind(config.node_addr(offset as u16)).await?;
        debug!("[{}] bound at {}", id, transport.local_addr()?);
        node_transports.push(transport);
    }

    info!(
        "starting {} routers against the relay at {}",
        router_ids.len(),
        relay_addr
    );
    let relay_task = tokio::spawn(Relay::new(topology, relay_transport, config).run());

    let mut node_tasks = Vec::with_capacity(router_ids.len());
    for (id, transport) in router_ids.iter().cloned().zip(node_transports) {
        let node = Node::new(id, transport, relay_addr, config);
        node_tasks.push(tokio::spawn(node.run()));
    }

    let mut nodes = Vec::with_capacity(node_tasks.len());
    for (id, task) in router_ids.iter().zip(node_tasks) {
        match task.await {
            Ok(Ok(report)) => nodes.push(report),
            Ok(Err(e)) => {
                relay_task.abort();
                return Err(e).with_context(|| format!("router [{id}] failed"));
            }
            Err(e) => {
                relay_task.abort();
                anyhow::bail!("router [{id}] task died: {e}");
            }
        }
    }

    let relay = relay_task.await.context("relay task died")??;
    info!(
        "simulation complete: {} routers converged, {} datagrams forwarded",
        nodes.len(),
        relay.forwarded
    );
    Ok(SimReport { nodes, relay })
}

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Relay control port. Node ports start one above it.
pub const DEFAULT_RELAY_PORT: u16 = 4059;
pub const DEFAULT_NODE_BASE_PORT: u16 = 4060;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub relay_host: IpAddr,
    pub relay_port: u16,
    pub node_host: IpAddr,
    /// First node's port; each further node binds the next port up. 0 means
    /// every node binds an ephemeral port (the relay learns the real one
    /// from the JOIN anyway).
    pub node_base_port: u16,
    pub recv_timeout_ms: u64,
    pub join_timeout_ms: u64,
    /// Quiet receive cycles a node tolerates before treating its vector as
    /// converged. The counter must exceed this to exit.
    pub idle_cycle_limit: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            relay_host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            relay_port: DEFAULT_RELAY_PORT,
            node_host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            node_base_port: DEFAULT_NODE_BASE_PORT,
            recv_timeout_ms: 500,  // one receive window per cycle
            join_timeout_ms: 5000, // covers stragglers during the join phase
            idle_cycle_limit: 5,
        }
    }
}

impl SimConfig {
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: SimConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn relay_addr(&self) -> SocketAddr {
        SocketAddr::new(self.relay_host, self.relay_port)
    }

    pub fn node_addr(&self, offset: u16) -> SocketAddr {
        let port = if self.node_base_port == 0 {
            0
        } else {
            self.node_base_port.saturating_add(offset)
        };
        SocketAddr::new(self.node_host, port)
    }

    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

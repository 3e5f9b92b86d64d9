//! One simulated router: joins the relay, installs its initial distance
//! vector, then relaxes estimates from neighbor UPDATEs until the vector has
//! been quiet long enough to call converged.

use std::net::SocketAddr;
use std::time::Duration;

use log::{debug, info, warn};

use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::message::Message;
use crate::transport::Transport;
use crate::{DistanceVector, RouterId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodePhase {
    Joining,
    Initializing,
    Converging,
    Exiting,
    Terminated,
}

/// The distance-vector state machine, kept free of any socket so the
/// relaxation rules can be tested directly.
#[derive(Debug, Clone)]
pub struct NodeState {
    id: RouterId,
    vector: DistanceVector,
    idle_cycles: u32,
    phase: NodePhase,
}

impl NodeState {
    pub fn new(id: RouterId) -> Self {
        Self {
            id,
            vector: DistanceVector::new(),
            idle_cycles: 0,
            phase: NodePhase::Joining,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn vector(&self) -> &DistanceVector {
        &self.vector
    }

    pub fn phase(&self) -> NodePhase {
        self.phase
    }

    pub fn idle_cycles(&self) -> u32 {
        self.idle_cycles
    }

    /// Adopt the relay's initial assignment. Called once, right after the
    /// join handshake; the id carried by the response is authoritative and
    /// replaces whatever the node was launched with.
    pub fn install_initial(&mut self, id: RouterId, mut vector: DistanceVector) {
        self.id = id;
        vector.entry(self.id.clone()).or_insert(0);
        self.vector = vector;
        self.phase = NodePhase::Initializing;
    }

    /// Relax this vector against a neighbor's advertised one. For each
    /// destination the neighbor can actually reach (advertised distance
    /// strictly positive), the candidate is `advertised + own distance to
    /// the neighbor`, installed when the current estimate is unknown
    /// (negative or absent) or the candidate is strictly cheaper. Returns
    /// whether anything changed.
    pub fn apply_update(&mut self, from: &str, advertised: &DistanceVector) -> bool {
        // A sender we have no usable link to cannot price any path.
        let Some(&link) = self.vector.get(from) else {
            warn!("[{}] skipping UPDATE from unknown router [{}]", self.id, from);
            return false;
        };
        if link <= 0 {
            debug!("[{}] skipping UPDATE from unreachable router [{}]", self.id, from);
            return false;
        }

        let mut improved = false;
        for (dest, &their_dist) in advertised {
            if their_dist <= 0 {
                continue;
            }
            let candidate = link.saturating_add(their_dist);
            match self.vector.get(dest) {
                Some(&current) if current < 0 || candidate < current => {
                    self.vector.insert(dest.clone(), candidate);
                    improved = true;
                }
                Some(_) => {}
                None => {
                    // A destination this node had never heard of.
                    self.vector.insert(dest.clone(), candidate);
                    improved = true;
                }
            }
        }
        improved
    }

    pub fn note_idle(&mut self) {
        self.idle_cycles += 1;
    }

    pub fn reset_idle(&mut self) {
        self.idle_cycles = 0;
    }
}

/// Final snapshot a node hands back to the driver.
#[derive(Debug, Clone)]
pub struct NodeReport {
    pub id: RouterId,
    pub vector: DistanceVector,
}

pub struct Node {
    state: NodeState,
    transport: Transport,
    relay_addr: SocketAddr,
    recv_timeout: Duration,
    join_timeout: Duration,
    idle_cycle_limit: u32,
}

impl Node {
    pub fn new(id: RouterId, transport: Transport, relay_addr: SocketAddr, config: &SimConfig) -> Self {
        Self {
            state: NodeState::new(id),
            transport,
            relay_addr,
            recv_timeout: config.recv_timeout(),
            join_timeout: config.join_timeout(),
            idle_cycle_limit: config.idle_cycle_limit,
        }
    }

    /// Drive the node through its whole lifetime: join, announce the initial
    /// vector, relax until quiet, send EXIT.
    pub async fn run(mut self) -> Result<NodeReport> {
        self.join().await?;
        self.announce().await?;
        self.state.phase = NodePhase::Converging;

        self.converge().await?;

        self.state.phase = NodePhase::Exiting;
        let exit = Message::Exit {
            router_id: self.state.id.clone(),
        };
        self.transport.send_to(&exit.encode(), self.relay_addr).await?;
        self.state.phase = NodePhase::Terminated;
        info!(
            "[{}] converged after {} quiet cycles: {:?}",
            self.state.id, self.state.idle_cycles, self.state.vector
        );

        Ok(NodeReport {
            id: self.state.id,
            vector: self.state.vector,
        })
    }

    async fn join(&mut self) -> Result<()> {
        let join = Message::Join {
            router_id: self.state.id.clone(),
        };
        self.transport.send_to(&join.encode(), self.relay_addr).await?;
        debug!("[{}] → JOIN sent to relay at {}", self.state.id, self.relay_addr);

        let Some((bytes, _)) = self.transport.recv_timeout(self.join_timeout).await? else {
            return Err(self.init_err("no initial vector from the relay"));
        };
        let msg = Message::decode(&bytes)
            .map_err(|e| self.init_err(format!("undecodable initial vector: {e}")))?;
        let kind = msg.kind();
        let Message::Update { router_id, vector } = msg else {
            return Err(self.init_err(format!("expected an UPDATE, got {kind}")));
        };
        if router_id != self.state.id {
            debug!(
                "[{}] relay assigned the id [{}]",
                self.state.id, router_id
            );
        }

        self.state.install_initial(router_id, vector);
        info!(
            "[{}] ← initial vector installed: {:?}",
            self.state.id,
            self.state.vector()
        );
        Ok(())
    }

    /// One receive cycle at a time until the vector stays unchanged for more
    /// than `idle_cycle_limit` consecutive cycles. Timeouts, malformed
    /// datagrams and non-UPDATE traffic all count as quiet cycles.
    async fn converge(&mut self) -> Result<()> {
        while self.state.idle_cycles <= self.idle_cycle_limit {
            let Some((bytes, from)) = self.transport.recv_timeout(self.recv_timeout).await? else {
                self.state.note_idle();
                continue;
            };
            self.state.note_idle();
            match Message::decode(&bytes) {
                Ok(Message::Update { router_id, vector }) => {
                    if self.state.apply_update(&router_id, &vector) {
                        self.state.reset_idle();
                        debug!(
                            "[{}] ← UPDATE from [{}] improved the vector, rebroadcasting",
                            self.state.id, router_id
                        );
                        self.announce().await?;
                    }
                }
                Ok(other) => {
                    warn!(
                        "[{}] ← ignoring {} from {}",
                        self.state.id,
                        other.kind(),
                        from
                    );
                }
                Err(e) => {
                    warn!("[{}] ← dropping malformed datagram from {}: {}", self.state.id, from, e);
                }
            }
        }
        Ok(())
    }

    /// Send the current vector to the relay for fan-out.
    async fn announce(&self) -> Result<()> {
        let update = Message::Update {
            router_id: self.state.id.clone(),
            vector: self.state.vector.clone(),
        };
        self.transport.send_to(&update.encode(), self.relay_addr).await?;
        Ok(())
    }

    fn init_err(&self, reason: impl Into<String>) -> SimError {
        SimError::Initialization {
            router_id: self.state.id.clone(),
            reason: reason.into(),
        }
    }
}

//! The central relay: the only process that knows the static topology. It
//! collects JOINs, hands every router its initial distance vector, then
//! forwards UPDATE traffic strictly along topology edges until every router
//! has sent EXIT.

use std::net::SocketAddr;
use std::time::Duration;

use log::{debug, info, warn};

use crate::config::SimConfig;
use crate::error::Result;
use crate::message::Message;
use crate::topology::Topology;
use crate::transport::Transport;
use crate::{DistanceVector, RouterId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayPhase {
    AwaitingJoins,
    Distributing,
    Forwarding,
    Drained,
}

/// Outcome of applying a JOIN or EXIT to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Applied,
    Ignored,
    UnknownRouter,
}

/// Table bookkeeping, separated from the socket loop so the join and exit
/// rules can be tested directly.
#[derive(Debug, Clone)]
pub struct RelayState {
    topology: Topology,
    active: usize,
    phase: RelayPhase,
}

impl RelayState {
    pub fn new(topology: Topology) -> Self {
        Self {
            topology,
            active: 0,
            phase: RelayPhase::AwaitingJoins,
        }
    }

    pub fn expected(&self) -> usize {
        self.topology.len()
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn phase(&self) -> RelayPhase {
        self.phase
    }

    /// Record a JOIN. A router joins at most once; later JOINs keep the
    /// first recorded address.
    pub fn register_join(&mut self, id: &str, addr: SocketAddr) -> Registration {
        match self.topology.get_mut(id) {
            None => Registration::UnknownRouter,
            Some(entry) if entry.is_active => Registration::Ignored,
            Some(entry) => {
                entry.is_active = true;
                entry.address = Some(addr);
                self.active += 1;
                Registration::Applied
            }
        }
    }

    /// Record an EXIT. Only the first EXIT per joined router counts, so a
    /// duplicated datagram cannot drain the relay early.
    pub fn register_exit(&mut self, id: &str) -> Registration {
        match self.topology.get_mut(id) {
            None => Registration::UnknownRouter,
            Some(entry) if !entry.is_active => Registration::Ignored,
            Some(entry) => {
                entry.is_active = false;
                self.active -= 1;
                Registration::Applied
            }
        }
    }

    /// Forwarding targets for an UPDATE from `id`: the recorded addresses of
    /// its direct neighbors. The sender is never among them.
    pub fn neighbor_addrs(&self, id: &str) -> Option<Vec<(RouterId, SocketAddr)>> {
        let entry = self.topology.get(id)?;
        Some(
            entry
                .neighbors
                .iter()
                .filter_map(|n| {
                    let peer = self.topology.get(n)?;
                    peer.address.map(|addr| (n.clone(), addr))
                })
                .collect(),
        )
    }

    /// Every joined router with its address and vector-of-record, in stable
    /// id order.
    pub fn initial_assignments(&self) -> Vec<(RouterId, SocketAddr, DistanceVector)> {
        self.topology
            .iter()
            .filter_map(|(id, entry)| {
                entry
                    .address
                    .map(|addr| (id.clone(), addr, entry.vector.clone()))
            })
            .collect()
    }
}

/// Counters the relay reports once every router has exited.
#[derive(Debug, Clone)]
pub struct RelaySummary {
    pub joined: usize,
    pub forwarded: u64,
}

pub struct Relay {
    state: RelayState,
    transport: Transport,
    recv_timeout: Duration,
}

impl Relay {
    pub fn new(topology: Topology, transport: Transport, config: &SimConfig) -> Self {
        Self {
            state: RelayState::new(topology),
            transport,
            recv_timeout: config.recv_timeout(),
        }
    }

    pub async fn run(mut self) -> Result<RelaySummary> {
        self.await_joins().await?;
        self.distribute_initial_vectors().await?;
        let forwarded = self.forward_until_drained().await?;
        Ok(RelaySummary {
            joined: self.state.expected(),
            forwarded,
        })
    }

    async fn await_joins(&mut self) -> Result<()> {
        let expected = self.state.expected();
        info!("[relay] awaiting JOIN from {} routers", expected);
        while self.state.active() < expected {
            let Some((bytes, from)) = self.transport.recv_timeout(self.recv_timeout).await? else {
                continue;
            };
            match Message::decode(&bytes) {
                Ok(Message::Join { router_id }) => {
                    match self.state.register_join(&router_id, from) {
                        Registration::Applied => info!(
                            "[relay] ← JOIN from [{}] at {} ({}/{})",
                            router_id,
                            from,
                            self.state.active(),
                            expected
                        ),
                        Registration::Ignored => {
                            debug!("[relay] ← duplicate JOIN from [{}] ignored", router_id)
                        }
                        Registration::UnknownRouter => {
                            warn!("[relay] ← JOIN from unknown router [{}] dropped", router_id)
                        }
                    }
                }
                Ok(other) => debug!(
                    "[relay] ← ignoring {} from {} during the join phase",
                    other.kind(),
                    from
                ),
                Err(e) => warn!("[relay] ← dropping malformed datagram from {}: {}", from, e),
            }
        }
        Ok(())
    }

    async fn distribute_initial_vectors(&mut self) -> Result<()> {
        self.state.phase = RelayPhase::Distributing;
        for (id, addr, vector) in self.state.initial_assignments() {
            let update = Message::Update {
                router_id: id.clone(),
                vector,
            };
            self.transport.send_to(&update.encode(), addr).await?;
            debug!("[relay] → initial vector sent to [{}] at {}", id, addr);
        }
        Ok(())
    }

    /// Fan out UPDATEs along topology edges until every joined router has
    /// sent its EXIT. The payload is relayed byte for byte; decoding only
    /// picks the targets.
    async fn forward_until_drained(&mut self) -> Result<u64> {
        self.state.phase = RelayPhase::Forwarding;
        let mut forwarded = 0u64;
        while self.state.active() > 0 {
            let Some((bytes, from)) = self.transport.recv_timeout(self.recv_timeout).await? else {
                continue;
            };
            match Message::decode(&bytes) {
                Ok(Message::Update { router_id, .. }) => {
                    let Some(targets) = self.state.neighbor_addrs(&router_id) else {
                        warn!("[relay] ← UPDATE from unknown router [{}] dropped", router_id);
                        continue;
                    };
                    for (_, addr) in &targets {
                        self.transport.send_to(&bytes, *addr).await?;
                        forwarded += 1;
                    }
                    debug!(
                        "[relay] ← UPDATE from [{}] forwarded to {} neighbors",
                        router_id,
                        targets.len()
                    );
                }
                Ok(Message::Exit { router_id }) => match self.state.register_exit(&router_id) {
                    Registration::Applied => info!(
                        "[relay] ← EXIT from [{}], {} routers still active",
                        router_id,
                        self.state.active()
                    ),
                    Registration::Ignored => {
                        debug!("[relay] ← stray EXIT from [{}] ignored", router_id)
                    }
                    Registration::UnknownRouter => {
                        warn!("[relay] ← EXIT from unknown router [{}] dropped", router_id)
                    }
                },
                Ok(Message::Join { router_id }) => {
                    debug!("[relay] ← late JOIN from [{}] ignored", router_id)
                }
                Err(e) => warn!("[relay] ← dropping malformed datagram from {}: {}", from, e),
            }
        }
        self.state.phase = RelayPhase::Drained;
        info!(
            "[relay] all routers exited, {} datagrams forwarded",
            forwarded
        );
        Ok(forwarded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE: &str = "A:<B,1>:<C,5>\nB:<A,1>:<C,-1>\nC:<A,5>:<B,-1>\n";

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    fn joined_state() -> RelayState {
        let mut state = RelayState::new(Topology::parse(TRIANGLE).unwrap());
        state.register_join("A", addr(1000));
        state.register_join("B", addr(1001));
        state.register_join("C", addr(1002));
        state
    }

    #[test]
    fn registers_each_join_once() {
        let mut state = RelayState::new(Topology::parse(TRIANGLE).unwrap());
        assert_eq!(state.phase(), RelayPhase::AwaitingJoins);
        assert_eq!(state.register_join("A", addr(1000)), Registration::Applied);
        assert_eq!(state.register_join("A", addr(2000)), Registration::Ignored);
        assert_eq!(
            state.register_join("Z", addr(3000)),
            Registration::UnknownRouter
        );
        assert_eq!(state.active(), 1);
    }

    #[test]
    fn counts_one_exit_per_joined_router() {
        let mut state = joined_state();
        assert_eq!(state.active(), 3);

        assert_eq!(state.register_exit("A"), Registration::Applied);
        assert_eq!(state.register_exit("A"), Registration::Ignored);
        assert_eq!(state.register_exit("Z"), Registration::UnknownRouter);
        assert_eq!(state.active(), 2);

        assert_eq!(state.register_exit("B"), Registration::Applied);
        assert_eq!(state.register_exit("C"), Registration::Applied);
        assert_eq!(state.active(), 0);
    }

    #[test]
    fn targets_are_the_senders_neighbors_and_never_the_sender() {
        let state = joined_state();

        let targets = state.neighbor_addrs("A").unwrap();
        assert_eq!(
            targets,
            vec![
                ("B".to_string(), addr(1001)),
                ("C".to_string(), addr(1002))
            ]
        );

        // B and C only link to A
        assert_eq!(
            state.neighbor_addrs("B").unwrap(),
            vec![("A".to_string(), addr(1000))]
        );
        assert!(state.neighbor_addrs("Z").is_none());
    }

    #[test]
    fn initial_assignments_follow_stable_router_order() {
        let mut state = RelayState::new(Topology::parse(TRIANGLE).unwrap());
        state.register_join("C", addr(1002));
        state.register_join("A", addr(1000));
        state.register_join("B", addr(1001));

        let ids: Vec<RouterId> = state
            .initial_assignments()
            .into_iter()
            .map(|(id, _, _)| id)
            .collect();
        assert_eq!(ids, vec!["A".to_string(), "B".to_string(), "C".to_string()]);
    }

    #[tokio::test]
    async fn drains_after_a_single_router_joins_and_exits() {
        let transport = Transport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let relay_addr = transport.local_addr().unwrap();
        let config = SimConfig {
            recv_timeout_ms: 25,
            ..SimConfig::default()
        };
        let relay = Relay::new(Topology::parse("A:\n").unwrap(), transport, &config);
        let handle = tokio::spawn(relay.run());

        let node = Transport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        node.send_to(b"JOIN:A:", relay_addr).await.unwrap();

        let wait = Duration::from_secs(2);
        let (bytes, _) = node.recv_timeout(wait).await.unwrap().unwrap();
        assert_eq!(
            Message::decode(&bytes).unwrap(),
            Message::Update {
                router_id: "A".to_string(),
                vector: [("A".to_string(), 0)].into_iter().collect(),
            }
        );

        node.send_to(b"EXIT:A:", relay_addr).await.unwrap();
        let summary = handle.await.unwrap().unwrap();
        assert_eq!(summary.joined, 1);
        assert_eq!(summary.forwarded, 0);
    }
}

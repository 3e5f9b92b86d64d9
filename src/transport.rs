use std::net::SocketAddr;
use std::time::Duration;

use log::warn;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::error::{Result, SimError};

/// Largest datagram either side will read in one call. Longer payloads are
/// truncated by the receive buffer and then fail to decode downstream.
pub const MAX_DATAGRAM: usize = 1024;

/// Thin wrapper over a bound UDP socket with the bounded receive the relay
/// and node loops both run on.
pub struct Transport {
    socket: UdpSocket,
}

impl Transport {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| SimError::TransportSetup { addr, source })?;
        Ok(Self { socket })
    }

    /// The actual bound address. Needed when binding to port 0.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub async fn send_to(&self, payload: &[u8], dest: SocketAddr) -> Result<usize> {
        if payload.len() > MAX_DATAGRAM {
            warn!(
                "sending {} bytes to {} (over the {}-byte read limit, will truncate)",
                payload.len(),
                dest,
                MAX_DATAGRAM
            );
        }
        Ok(self.socket.send_to(payload, dest).await?)
    }

    /// Wait up to `wait` for one datagram. `Ok(None)` means the interval
    /// passed quietly; an `Err` is a socket-level failure.
    pub async fn recv_timeout(&self, wait: Duration) -> Result<Option<(Vec<u8>, SocketAddr)>> {
        let mut buf = [0u8; MAX_DATAGRAM];
        match timeout(wait, self.socket.recv_from(&mut buf)).await {
            Ok(Ok((len, from))) => Ok(Some((buf[..len].to_vec(), from))),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Ok(None),
        }
    }
}

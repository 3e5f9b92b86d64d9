use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use crate::RouterId;

/// Fatal failures. Each one terminates the task that hit it; recoverable
/// per-packet problems are [`crate::message::MalformedMessage`] instead and
/// never show up here.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("failed to bind datagram socket at {addr}: {source}")]
    TransportSetup { addr: SocketAddr, source: io::Error },

    #[error("node `{router_id}` failed to initialize: {reason}")]
    Initialization { router_id: RouterId, reason: String },

    #[error("datagram transport failure: {0}")]
    TransportIo(#[from] io::Error),

    #[error("invalid topology description at line {line}: {reason}")]
    TopologyLoad { line: usize, reason: String },
}

pub type Result<T> = std::result::Result<T, SimError>;

use std::fmt::Write;

use thiserror::Error;

use crate::{Distance, DistanceVector, RouterId};

/// One decoded control message. JOIN and EXIT carry no payload; UPDATE
/// carries the sender's full distance vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Join {
        router_id: RouterId,
    },
    Update {
        router_id: RouterId,
        vector: DistanceVector,
    },
    Exit {
        router_id: RouterId,
    },
}

/// A structurally invalid packet. Always recoverable: the packet is logged
/// and dropped, processing continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedMessage {
    #[error("empty datagram")]
    Empty,

    #[error("datagram is not valid UTF-8")]
    NotUtf8,

    #[error("unknown message kind `{0}`")]
    UnknownKind(String),

    #[error("missing router id")]
    MissingRouterId,

    #[error("malformed vector entry `{0}`")]
    BadEntry(String),

    #[error("non-integer distance in entry `{0}`")]
    BadDistance(String),
}

impl Message {
    pub fn router_id(&self) -> &str {
        match self {
            Message::Join { router_id }
            | Message::Update { router_id, .. }
            | Message::Exit { router_id } => router_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Message::Join { .. } => "JOIN",
            Message::Update { .. } => "UPDATE",
            Message::Exit { .. } => "EXIT",
        }
    }

    /// Render the colon-delimited wire form `KIND:router:<peer,dist>:...:`.
    /// JOIN and EXIT end with a bare trailing colon; UPDATE appends one
    /// `<peer,dist>:` chunk per vector entry, in key order.
    pub fn encode(&self) -> Vec<u8> {
        let mut wire = format!("{}:{}:", self.kind(), self.router_id());
        if let Message::Update { vector, .. } = self {
            for (peer, dist) in vector {
                let _ = write!(wire, "<{},{}>:", peer, dist);
            }
        }
        wire.into_bytes()
    }

    /// Parse a received datagram. Receive buffers are fixed-size, so trailing
    /// NUL padding (and stray whitespace) is trimmed before splitting.
    pub fn decode(datagram: &[u8]) -> Result<Self, MalformedMessage> {
        let text = std::str::from_utf8(datagram).map_err(|_| MalformedMessage::NotUtf8)?;
        let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
        if text.is_empty() {
            return Err(MalformedMessage::Empty);
        }

        let mut fields = text.split(':');
        let kind = fields.next().unwrap_or_default();
        let router_id = match fields.next() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return Err(MalformedMessage::MissingRouterId),
        };

        match kind {
            "JOIN" => Ok(Message::Join { router_id }),
            "EXIT" => Ok(Message::Exit { router_id }),
            "UPDATE" => {
                let mut vector = DistanceVector::new();
                for chunk in fields {
                    if chunk.is_empty() {
                        // the colon terminating the previous entry
                        continue;
                    }
                    let (peer, dist) = parse_entry(chunk)?;
                    vector.insert(peer, dist);
                }
                Ok(Message::Update { router_id, vector })
            }
            other => Err(MalformedMessage::UnknownKind(other.to_string())),
        }
    }
}

/// Parse one `<peer,dist>` chunk. The topology file uses the same entry
/// grammar, so the loader shares this. Angle brackets are stripped rather
/// than required.
pub(crate) fn parse_entry(chunk: &str) -> Result<(RouterId, Distance), MalformedMessage> {
    let body = chunk.trim().trim_start_matches('<').trim_end_matches('>');
    let mut parts = body.split(',');
    let (Some(peer), Some(dist), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(MalformedMessage::BadEntry(chunk.to_string()));
    };
    let peer = peer.trim();
    if peer.is_empty() {
        return Err(MalformedMessage::BadEntry(chunk.to_string()));
    }
    let dist: Distance = dist
        .trim()
        .parse()
        .map_err(|_| MalformedMessage::BadDistance(chunk.to_string()))?;
    Ok((peer.to_string(), dist))
}

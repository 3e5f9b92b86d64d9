//! Simulation of the distributed Bellman-Ford distance-vector routing
//! algorithm: a relay that knows the static topology forwards UPDATE messages
//! along real graph edges only, while one task per simulated router relaxes
//! its distance estimates until the whole network goes quiet.

pub mod config;
pub mod error;
pub mod message;
pub mod node;
pub mod relay;
pub mod sim;
pub mod topology;
pub mod transport;

use std::collections::BTreeMap;

pub type RouterId = String;
pub type Distance = i32;

/// A router's current estimate of the cost to every known router, itself
/// included. Positive entries are finite costs; entries <= 0 mean
/// unreachable/unknown (the self entry is always 0 and is never relaxed).
pub type DistanceVector = BTreeMap<RouterId, Distance>;

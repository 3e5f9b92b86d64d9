use std::collections::BTreeMap;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use crate::error::{Result, SimError};
use crate::message;
use crate::{DistanceVector, RouterId};

/// One router's row in the relay's table: the distance-vector-of-record and
/// derived neighbor list (immutable after load) plus the join-phase
/// bookkeeping the relay's control loop fills in.
#[derive(Debug, Clone)]
pub struct TopologyEntry {
    pub vector: DistanceVector,
    pub neighbors: Vec<RouterId>,
    pub address: Option<SocketAddr>,
    pub is_active: bool,
}

/// The static network description, one entry per router. An ordered map
/// keeps router iteration (and the driver's port assignment) deterministic.
#[derive(Debug, Clone)]
pub struct Topology {
    entries: BTreeMap<RouterId, TopologyEntry>,
}

impl Topology {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            parse_err(0, format!("cannot read `{}`: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parse a topology description: one `Src:<Peer,Dist>:...` line per
    /// router, `//` comments and blank lines skipped. Costs <= 0 mark "no
    /// direct link"; strictly positive costs define the neighbor list. Every
    /// row's self entry is normalized to 0, and every referenced router must
    /// have a row of its own.
    pub fn parse(input: &str) -> Result<Self> {
        let mut entries: BTreeMap<RouterId, TopologyEntry> = BTreeMap::new();
        let mut row_lines: BTreeMap<RouterId, usize> = BTreeMap::new();

        for (idx, raw) in input.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with("//") {
                continue;
            }

            let Some((src, rest)) = line.split_once(':') else {
                return Err(parse_err(line_no, "missing `:` after source id"));
            };
            let src = src.trim();
            if src.is_empty() {
                return Err(parse_err(line_no, "missing source id"));
            }
            if entries.contains_key(src) {
                return Err(parse_err(
                    line_no,
                    format!("duplicate line for router `{}`", src),
                ));
            }

            let mut vector = DistanceVector::new();
            let mut neighbors = Vec::new();
            for chunk in rest.split(':') {
                if chunk.trim().is_empty() {
                    continue;
                }
                let (peer, dist) =
                    message::parse_entry(chunk).map_err(|e| parse_err(line_no, e.to_string()))?;
                if vector.contains_key(peer.as_str()) {
                    return Err(parse_err(
                        line_no,
                        format!("duplicate entry for router `{}`", peer),
                    ));
                }
                if peer == src {
                    if dist > 0 {
                        return Err(parse_err(
                            line_no,
                            format!("router `{}` lists itself as a neighbor", src),
                        ));
                    }
                    vector.insert(peer, 0);
                    continue;
                }
                if dist > 0 {
                    neighbors.push(peer.clone());
                }
                vector.insert(peer, dist);
            }
            vector.entry(src.to_string()).or_insert(0);

            row_lines.insert(src.to_string(), line_no);
            entries.insert(
                src.to_string(),
                TopologyEntry {
                    vector,
                    neighbors,
                    address: None,
                    is_active: false,
                },
            );
        }

        if entries.is_empty() {
            return Err(parse_err(0, "no router lines"));
        }

        // A row may only reference routers that exist: the relay would
        // otherwise have no entry to forward to once that id shows up in an
        // UPDATE fan-out.
        for (src, entry) in &entries {
            for peer in entry.vector.keys() {
                if !entries.contains_key(peer) {
                    return Err(parse_err(
                        row_lines[src],
                        format!("router `{}` referenced by `{}` has no line of its own", peer, src),
                    ));
                }
            }
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Router ids in stable (sorted) order.
    pub fn router_ids(&self) -> Vec<RouterId> {
        self.entries.keys().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<&TopologyEntry> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut TopologyEntry> {
        self.entries.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RouterId, &TopologyEntry)> {
        self.entries.iter()
    }
}

fn parse_err(line: usize, reason: impl Into<String>) -> SimError {
    SimError::TopologyLoad {
        line,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const SAMPLE: &str = "\
// three routers, A-B cheap, A-C expensive, B-C middling
A:<B,1>:<C,5>
B:<A,1>:<C,2>
C:<A,5>:<B,2>
";

    #[test]
    fn parses_rows_and_skips_comments_and_blank_lines() {
        let topo = Topology::parse("// header\n\nA:<B,1>\nB:<A,1>\n").unwrap();
        assert_eq!(topo.len(), 2);
        assert_eq!(topo.router_ids(), vec!["A".to_string(), "B".to_string()]);
        assert_eq!(topo.get("A").unwrap().vector["B"], 1);
    }

    #[test]
    fn derives_neighbors_from_positive_costs_only() {
        let topo = Topology::parse("A:<B,1>:<C,-1>\nB:<A,1>\nC:<A,-1>\n").unwrap();
        assert_eq!(topo.get("A").unwrap().neighbors, vec!["B".to_string()]);
        assert!(topo.get("C").unwrap().neighbors.is_empty());
        // the unreachable marker stays in the vector-of-record
        assert_eq!(topo.get("A").unwrap().vector["C"], -1);
    }

    #[test]
    fn normalizes_the_self_entry_to_zero() {
        let topo = Topology::parse("A:<B,1>\nB:<A,1>:<B,-1>\n").unwrap();
        // absent self entry is inserted...
        assert_eq!(topo.get("A").unwrap().vector["A"], 0);
        // ...and an explicit <= 0 sentinel is clamped to 0
        assert_eq!(topo.get("B").unwrap().vector["B"], 0);
        assert!(!topo.get("B").unwrap().neighbors.contains(&"B".to_string()));
    }

    #[test]
    fn rejects_positive_self_edges() {
        let err = Topology::parse("A:<A,3>\n").unwrap_err();
        assert!(matches!(err, SimError::TopologyLoad { line: 1, .. }));
    }

    #[test]
    fn rejects_duplicate_rows_and_duplicate_entries() {
        let err = Topology::parse("A:<B,1>\nB:<A,1>\nA:<B,2>\n").unwrap_err();
        assert!(matches!(err, SimError::TopologyLoad { line: 3, .. }));

        let err = Topology::parse("A:<B,1>:<B,2>\nB:<A,1>\n").unwrap_err();
        assert!(matches!(err, SimError::TopologyLoad { line: 1, .. }));
    }

    #[test]
    fn rejects_rows_without_a_source_id() {
        assert!(Topology::parse("<B,1>:<C,2>\n").is_err());
        assert!(Topology::parse(":<B,1>\n").is_err());
    }

    #[test]
    fn rejects_non_integer_distances_with_the_offending_line() {
        let err = Topology::parse("A:<B,1>\nB:<A,x>\n").unwrap_err();
        match err {
            SimError::TopologyLoad { line, reason } => {
                assert_eq!(line, 2);
                assert!(reason.contains("<A,x>"), "unexpected reason: {reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_references_to_undefined_routers() {
        let err = Topology::parse("A:<B,1>:<X,-1>\nB:<A,1>\n").unwrap_err();
        match err {
            SimError::TopologyLoad { line: 1, reason } => {
                assert!(reason.contains("`X`"), "unexpected reason: {reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_empty_descriptions() {
        assert!(Topology::parse("// nothing but comments\n").is_err());
    }

    #[test]
    fn loads_from_a_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let topo = Topology::load_from_file(file.path()).unwrap();
        assert_eq!(topo.len(), 3);
        assert_eq!(
            topo.get("B").unwrap().neighbors,
            vec!["A".to_string(), "C".to_string()]
        );
    }

    #[test]
    fn reports_unreadable_files() {
        let err = Topology::load_from_file("/definitely/not/here.txt").unwrap_err();
        assert!(matches!(err, SimError::TopologyLoad { line: 0, .. }));
    }
}

//! External terminal connections and their resolution.
//!
//! Raw connections tie winding terminals to the generator sentinel, to
//! ground, or (unsupported) to each other. Resolution collapses every
//! generator-tied terminal into one representative source node and
//! normalizes the remainder into plain ground ties.
//!
//! The generator flood fill is a connected-components problem and is
//! implemented with a disjoint-set structure; the union keeps the smaller
//! root so the lowest node id deterministically wins as representative.

use crate::error::{Result, SurgeError};
use crate::model::NodeId;

/// A directed relation: the `from` node is galvanically tied to every `to`
/// node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub from: NodeId,
    pub to: Vec<NodeId>,
}

impl Connection {
    pub fn new(from: NodeId, to: Vec<NodeId>) -> Self {
        Self { from, to }
    }

    /// Tie a node to ground.
    pub fn to_ground(from: NodeId) -> Self {
        Self::new(from, vec![NodeId::GROUND])
    }

    /// Tie a node to the generator.
    pub fn to_generator(from: NodeId) -> Self {
        Self::new(from, vec![NodeId::GENERATOR])
    }
}

/// Disjoint-set forest with path compression. The smaller root absorbs the
/// larger, so component representatives are the lowest member id.
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cur = x;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}

/// The normalized output of connection resolution.
#[derive(Debug, Clone)]
pub struct ResolvedConnections {
    /// Normalized list: one ground tie per grounded node, plus one
    /// synthetic connection `source -> generator sentinel + any other
    /// generator-tied nodes`. Keeping the sentinel in the synthetic tie
    /// makes resolution idempotent on its own output.
    pub connections: Vec<Connection>,
    /// The representative node carrying the source excitation (lowest id
    /// of the generator-tied component).
    pub source_node: usize,
}

impl ResolvedConnections {
    /// Physical nodes tied to ground.
    pub fn grounded_nodes(&self) -> Vec<usize> {
        self.connections
            .iter()
            .filter(|c| c.to.iter().any(NodeId::is_ground))
            .filter_map(|c| c.from.index())
            .collect()
    }

    /// Generator-tied nodes other than the source node itself.
    pub fn generator_tied_nodes(&self) -> Vec<usize> {
        self.connections
            .iter()
            .filter(|c| c.to.iter().any(NodeId::is_generator))
            .flat_map(|c| c.to.iter().filter_map(NodeId::index))
            .collect()
    }
}

/// Resolve raw connections against a network of `node_count` physical
/// nodes.
///
/// Fails with [`SurgeError::NoGeneratorConnection`] when nothing reaches
/// the generator sentinel, and with [`SurgeError::UnsupportedConnection`]
/// when a connection would merge two terminals that are neither grounded
/// nor generator-tied (not implemented in this version).
pub fn resolve_connections(
    connections: &[Connection],
    node_count: usize,
) -> Result<ResolvedConnections> {
    // Element node_count stands for the generator sentinel.
    let generator = node_count;
    let element = |node: NodeId| -> Option<usize> {
        if node.is_generator() {
            Some(generator)
        } else {
            node.index()
        }
    };

    // Flatten to atomic pairs, reorienting so ground sits on the `to` side.
    let mut pairs = Vec::new();
    for connection in connections {
        for &to in &connection.to {
            if connection.from.is_ground() {
                pairs.push((to, NodeId::GROUND));
            } else {
                pairs.push((connection.from, to));
            }
        }
    }

    let mut dsu = DisjointSet::new(node_count + 1);
    for &(from, to) in &pairs {
        if to.is_ground() {
            continue;
        }
        let (Some(a), Some(b)) = (element(from), element(to)) else {
            continue;
        };
        dsu.union(a, b);
    }

    let generator_root = dsu.find(generator);
    let in_generator_set: Vec<bool> = (0..node_count)
        .map(|n| dsu.find(n) == generator_root)
        .collect();
    let generator_set: Vec<usize> = (0..node_count).filter(|&n| in_generator_set[n]).collect();
    if generator_set.is_empty() {
        return Err(SurgeError::NoGeneratorConnection);
    }
    let source_node = generator_set[0];

    let mut grounded = Vec::new();
    for &(from, to) in &pairs {
        let from_idx = from.index();
        if to.is_ground() {
            // Ground ties of generator-set nodes are redundant once the
            // synthetic source connection replaces them.
            if let Some(n) = from_idx {
                if !in_generator_set[n] && !grounded.contains(&n) {
                    grounded.push(n);
                }
            }
            continue;
        }
        if to.is_generator() || from.is_generator() {
            continue;
        }
        // A node-to-node tie outside the generator component merges two
        // non-grounded terminals.
        if let Some(n) = from_idx {
            if !in_generator_set[n] {
                return Err(SurgeError::UnsupportedConnection { from, to });
            }
        }
    }
    grounded.sort_unstable();

    let mut normalized: Vec<Connection> = grounded
        .into_iter()
        .map(|n| Connection::to_ground(NodeId(n as i32)))
        .collect();
    let mut tied = vec![NodeId::GENERATOR];
    tied.extend(generator_set[1..].iter().map(|&n| NodeId(n as i32)));
    normalized.push(Connection::new(NodeId(source_node as i32), tied));

    Ok(ResolvedConnections {
        connections: normalized,
        source_node,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_generator_connection() {
        let connections = vec![Connection::to_ground(NodeId(3))];
        let result = resolve_connections(&connections, 4);
        assert!(matches!(result, Err(SurgeError::NoGeneratorConnection)));
    }

    #[test]
    fn test_empty_list_fails() {
        assert!(matches!(
            resolve_connections(&[], 4),
            Err(SurgeError::NoGeneratorConnection)
        ));
    }

    #[test]
    fn test_single_generator_tie() {
        let connections = vec![
            Connection::to_generator(NodeId(0)),
            Connection::to_ground(NodeId(3)),
        ];
        let resolved = resolve_connections(&connections, 4).unwrap();
        assert_eq!(resolved.source_node, 0);
        assert_eq!(resolved.grounded_nodes(), vec![3]);
        assert!(resolved.generator_tied_nodes().is_empty());
    }

    #[test]
    fn test_transitive_merge_picks_lowest_id() {
        // 5 -> GEN, 2 -> 5: both reach the generator; 2 wins as source.
        let connections = vec![
            Connection::to_generator(NodeId(5)),
            Connection::new(NodeId(2), vec![NodeId(5)]),
        ];
        let resolved = resolve_connections(&connections, 6).unwrap();
        assert_eq!(resolved.source_node, 2);
        assert_eq!(resolved.generator_tied_nodes(), vec![5]);
    }

    #[test]
    fn test_generator_set_ground_ties_dropped() {
        // Node 1 is both generator-tied and grounded; the ground tie is
        // redundant once the synthetic source connection covers the node.
        let connections = vec![
            Connection::to_generator(NodeId(0)),
            Connection::new(NodeId(1), vec![NodeId::GENERATOR, NodeId(0)]),
            Connection::to_ground(NodeId(1)),
        ];
        let resolved = resolve_connections(&connections, 3).unwrap();
        assert_eq!(resolved.source_node, 0);
        assert_eq!(resolved.generator_tied_nodes(), vec![1]);
        assert!(resolved.grounded_nodes().is_empty());
    }

    #[test]
    fn test_non_grounded_merge_unsupported() {
        let connections = vec![
            Connection::to_generator(NodeId(0)),
            Connection::new(NodeId(2), vec![NodeId(3)]),
        ];
        let result = resolve_connections(&connections, 4);
        assert!(matches!(
            result,
            Err(SurgeError::UnsupportedConnection { .. })
        ));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let connections = vec![
            Connection::to_generator(NodeId(4)),
            Connection::new(NodeId(1), vec![NodeId::GENERATOR]),
            Connection::to_ground(NodeId(7)),
        ];
        let first = resolve_connections(&connections, 8).unwrap();
        assert_eq!(first.source_node, 1);

        let second = resolve_connections(&first.connections, 8).unwrap();
        assert_eq!(second.source_node, first.source_node);
        assert_eq!(second.connections, first.connections);
    }
}

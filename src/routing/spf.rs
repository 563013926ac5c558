/*!
Shortest path first.

Classic Dijkstra over the link-state database with a binary heap frontier.

Tie-break policy: when two paths to the same node have the same cost, the path whose first hop
(the neighbor of the source it leaves through) has the lowest `NodeId` wins. If the first hops are
equal too, the lowest predecessor id wins. The routing table installer derives next hops from the
tree built here, so both stages always agree on the single path chosen among equal-cost paths.

Link costs are >= 1, so every equal-cost predecessor of a node is settled before the node itself
and the comparison above sees all candidates.
*/

use std::{
    cmp::Reverse,
    collections::{BTreeMap, BinaryHeap, HashMap},
};

use serde::{Deserialize, Serialize};

use crate::{network::node::NodeId, routing::lsdb::LinkStateDatabase};

/// Cumulative cost of a path.
pub type PathCost = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// `None` only for the source itself.
    pub predecessor: Option<NodeId>,
    pub cost: PathCost,
}

/// Shortest path tree rooted at one router. Unreachable nodes are absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortestPathTree {
    source: NodeId,
    entries: BTreeMap<NodeId, TreeEntry>,
}

/// Tentative label of a node during the search. Ordered so that the smaller label is the
/// preferred path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Label {
    cost: PathCost,
    first_hop: Option<NodeId>,
    predecessor: Option<NodeId>,
}

impl ShortestPathTree {
    pub fn compute(lsdb: &LinkStateDatabase, source: &NodeId) -> Self {
        let mut entries = BTreeMap::new();
        if lsdb.record(source).is_none() {
            tracing::debug!(%source, "source is not in the link-state database");
            return Self {
                source: source.clone(),
                entries,
            };
        }

        let mut tentative: HashMap<NodeId, Label> = HashMap::new();
        let mut frontier: BinaryHeap<Reverse<(PathCost, NodeId)>> = BinaryHeap::new();
        tentative.insert(
            source.clone(),
            Label {
                cost: 0,
                first_hop: None,
                predecessor: None,
            },
        );
        frontier.push(Reverse((0, source.clone())));

        while let Some(Reverse((cost, node))) = frontier.pop() {
            if entries.contains_key(&node) {
                continue;
            }
            let Some(label) = tentative.remove(&node) else {
                continue;
            };
            if cost > label.cost {
                // Stale heap entry, the label was improved after this push.
                tentative.insert(node, label);
                continue;
            }

            if let Some(record) = lsdb.record(&node) {
                for adjacency in &record.adjacencies {
                    if entries.contains_key(&adjacency.neighbor) || adjacency.neighbor == node {
                        continue;
                    }
                    let candidate = Label {
                        cost: label.cost + PathCost::from(adjacency.cost),
                        first_hop: Some(
                            label
                                .first_hop
                                .clone()
                                .unwrap_or_else(|| adjacency.neighbor.clone()),
                        ),
                        predecessor: Some(node.clone()),
                    };
                    match tentative.get_mut(&adjacency.neighbor) {
                        Some(existing) if candidate < *existing => {
                            let improved = candidate.cost < existing.cost;
                            *existing = candidate;
                            if improved {
                                frontier.push(Reverse((existing.cost, adjacency.neighbor.clone())));
                            }
                        }
                        Some(_) => {}
                        None => {
                            frontier.push(Reverse((candidate.cost, adjacency.neighbor.clone())));
                            tentative.insert(adjacency.neighbor.clone(), candidate);
                        }
                    }
                }
            }

            entries.insert(
                node,
                TreeEntry {
                    predecessor: label.predecessor,
                    cost: label.cost,
                },
            );
        }

        tracing::debug!(%source, reachable = entries.len(), "computed shortest path tree");
        Self {
            source: source.clone(),
            entries,
        }
    }

    pub fn source(&self) -> &NodeId {
        &self.source
    }

    pub fn entry(&self, node: &NodeId) -> Option<&TreeEntry> {
        self.entries.get(node)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&NodeId, &TreeEntry)> {
        self.entries.iter()
    }

    pub fn cost_to(&self, node: &NodeId) -> Option<PathCost> {
        self.entries.get(node).map(|entry| entry.cost)
    }

    pub fn contains(&self, node: &NodeId) -> bool {
        self.entries.contains_key(node)
    }

    /// Number of reachable nodes, the source included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reconstruct the path source -> ... -> `destination` from the predecessor links.
    pub fn path_to(&self, destination: &NodeId) -> Option<Vec<NodeId>> {
        let mut path = vec![destination.clone()];
        let mut current = self.entries.get(destination)?;
        while let Some(predecessor) = &current.predecessor {
            // A tree never holds a path longer than its node count.
            if path.len() > self.entries.len() {
                return None;
            }
            path.push(predecessor.clone());
            current = self.entries.get(predecessor)?;
        }
        path.reverse();
        (path.first() == Some(&self.source)).then_some(path)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};

    use rand::{Rng, SeedableRng, rngs::StdRng};

    use super::*;
    use crate::network::{
        fabric::Fabric,
        link::Link,
        node::{Node, Role},
    };

    fn database(nodes: &[&str], links: Vec<Link>) -> LinkStateDatabase {
        let mut fabric = Fabric::new();
        for id in nodes {
            fabric.add_node(Node::new(*id, Role::Host)).unwrap();
        }
        for link in links {
            fabric.add_link(link).unwrap();
        }
        LinkStateDatabase::synthesize(&fabric)
    }

    fn ids(path: &[NodeId]) -> Vec<&str> {
        path.iter().map(NodeId::as_str).collect()
    }

    #[test]
    fn test_costs_and_paths() {
        let lsdb = database(
            &["A", "B", "C", "D"],
            vec![
                Link::new("A", "B", 1),
                Link::new("B", "C", 2),
                Link::new("A", "C", 5),
                Link::new("C", "D", 1),
            ],
        );
        let tree = ShortestPathTree::compute(&lsdb, &"A".into());

        assert_eq!(tree.cost_to(&"A".into()), Some(0));
        assert_eq!(tree.cost_to(&"B".into()), Some(1));
        assert_eq!(tree.cost_to(&"C".into()), Some(3));
        assert_eq!(tree.cost_to(&"D".into()), Some(4));
        assert_eq!(ids(&tree.path_to(&"D".into()).unwrap()), vec!["A", "B", "C", "D"]);
        assert_eq!(tree.entry(&"A".into()).unwrap().predecessor, None);
    }

    #[test]
    fn test_equal_cost_paths_prefer_lowest_first_hop() {
        // Two paths of cost 2 from A to Z, via M and via N. Both paths through K cost 3.
        let lsdb = database(
            &["A", "N", "M", "K", "Y", "Z"],
            vec![
                Link::new("A", "N", 1),
                Link::new("A", "M", 1),
                Link::new("N", "Z", 1),
                Link::new("M", "Z", 1),
                Link::new("A", "K", 1),
                Link::new("K", "Y", 1),
                Link::new("Y", "Z", 1),
                Link::new("K", "Z", 2),
            ],
        );
        let tree = ShortestPathTree::compute(&lsdb, &"A".into());

        assert_eq!(tree.cost_to(&"Z".into()), Some(2));
        assert_eq!(ids(&tree.path_to(&"Z".into()).unwrap()), vec!["A", "M", "Z"]);

        // Identical answer regardless of insertion order.
        let reversed = database(
            &["Z", "Y", "K", "M", "N", "A"],
            vec![
                Link::new("K", "Z", 2),
                Link::new("Y", "Z", 1),
                Link::new("K", "Y", 1),
                Link::new("A", "K", 1),
                Link::new("M", "Z", 1),
                Link::new("N", "Z", 1),
                Link::new("A", "M", 1),
                Link::new("A", "N", 1),
            ],
        );
        assert_eq!(ShortestPathTree::compute(&reversed, &"A".into()), tree);
    }

    #[test]
    fn test_first_hop_wins_over_predecessor() {
        // Both paths to D cost 3. Via B the predecessor is X, via C the predecessor is W
        // (W < X), but the first hop B < C decides.
        let lsdb = database(
            &["A", "B", "C", "W", "X", "D"],
            vec![
                Link::new("A", "B", 1),
                Link::new("B", "X", 1),
                Link::new("X", "D", 1),
                Link::new("A", "C", 1),
                Link::new("C", "W", 1),
                Link::new("W", "D", 1),
            ],
        );
        let tree = ShortestPathTree::compute(&lsdb, &"A".into());
        assert_eq!(ids(&tree.path_to(&"D".into()).unwrap()), vec!["A", "B", "X", "D"]);
    }

    #[test]
    fn test_unreachable_nodes_are_absent() {
        let lsdb = database(&["A", "B", "C"], vec![Link::new("A", "B", 1)]);
        let tree = ShortestPathTree::compute(&lsdb, &"A".into());

        assert_eq!(tree.len(), 2);
        assert!(!tree.contains(&"C".into()));
        assert_eq!(tree.cost_to(&"C".into()), None);
        assert_eq!(tree.path_to(&"C".into()), None);
    }

    #[test]
    fn test_unknown_source_gives_empty_tree() {
        let lsdb = database(&["A"], vec![]);
        let tree = ShortestPathTree::compute(&lsdb, &"nope".into());
        assert!(tree.is_empty());
        assert_eq!(tree.source(), &NodeId::from("nope"));
    }

    #[test]
    fn test_asymmetric_costs_use_outgoing_direction() {
        let lsdb = database(
            &["A", "B", "C"],
            vec![Link::asymmetric("A", "B", 1, 10), Link::new("B", "C", 1), Link::new("A", "C", 4)],
        );
        let from_a = ShortestPathTree::compute(&lsdb, &"A".into());
        let from_b = ShortestPathTree::compute(&lsdb, &"B".into());

        assert_eq!(from_a.cost_to(&"B".into()), Some(1));
        // B -> A directly costs 10, B -> C -> A costs 5.
        assert_eq!(from_b.cost_to(&"A".into()), Some(5));
        assert_eq!(ids(&from_b.path_to(&"A".into()).unwrap()), vec!["B", "C", "A"]);
    }

    #[test]
    fn test_costs_are_monotonic_along_paths() {
        let lsdb = database(
            &["A", "B", "C", "D", "E"],
            vec![
                Link::new("A", "B", 2),
                Link::new("B", "C", 2),
                Link::new("A", "D", 7),
                Link::new("C", "D", 1),
                Link::new("D", "E", 3),
            ],
        );
        let tree = ShortestPathTree::compute(&lsdb, &"A".into());
        for (node, _) in tree.entries() {
            let path = tree.path_to(node).unwrap();
            let costs: Vec<PathCost> = path.iter().map(|hop| tree.cost_to(hop).unwrap()).collect();
            assert!(costs.windows(2).all(|pair| pair[0] <= pair[1]));
            let unique: BTreeSet<&NodeId> = path.iter().collect();
            assert_eq!(unique.len(), path.len(), "path to {node} has a loop");
        }
    }

    /// Minimum cost from `source` to every node over all simple paths.
    fn brute_force(lsdb: &LinkStateDatabase, source: &NodeId) -> HashMap<NodeId, PathCost> {
        fn walk(
            lsdb: &LinkStateDatabase,
            node: &NodeId,
            cost: PathCost,
            visited: &mut Vec<NodeId>,
            best: &mut HashMap<NodeId, PathCost>,
        ) {
            let entry = best.entry(node.clone()).or_insert(cost);
            *entry = (*entry).min(cost);
            let Some(record) = lsdb.record(node) else {
                return;
            };
            for adjacency in &record.adjacencies {
                if visited.contains(&adjacency.neighbor) {
                    continue;
                }
                visited.push(adjacency.neighbor.clone());
                walk(lsdb, &adjacency.neighbor, cost + PathCost::from(adjacency.cost), visited, best);
                visited.pop();
            }
        }

        let mut best = HashMap::new();
        walk(lsdb, source, 0, &mut vec![source.clone()], &mut best);
        best
    }

    #[test]
    fn test_matches_brute_force_on_random_graphs() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..40 {
            let count = rng.random_range(2..=7);
            let names: Vec<String> = (0..count).map(|i| format!("R{i}")).collect();
            let mut fabric = Fabric::new();
            for name in &names {
                fabric.add_node(Node::new(name.as_str(), Role::Host)).unwrap();
            }
            for i in 0..count {
                for j in (i + 1)..count {
                    if rng.random_bool(0.45) {
                        let cost = rng.random_range(1..=9);
                        let link = if rng.random_bool(0.3) {
                            Link::asymmetric(names[i].as_str(), names[j].as_str(), cost, rng.random_range(1..=9))
                        } else {
                            Link::new(names[i].as_str(), names[j].as_str(), cost)
                        };
                        fabric.add_link(link).unwrap();
                    }
                }
            }
            let lsdb = LinkStateDatabase::synthesize(&fabric);

            for name in &names {
                let source = NodeId::from(name.as_str());
                let tree = ShortestPathTree::compute(&lsdb, &source);
                let expected = brute_force(&lsdb, &source);
                assert_eq!(tree.len(), expected.len());
                for (node, cost) in expected {
                    assert_eq!(tree.cost_to(&node), Some(cost), "{source} -> {node}");
                    // Re-summing the reconstructed path gives the same cost.
                    let path = tree.path_to(&node).unwrap();
                    let summed: PathCost = path
                        .windows(2)
                        .map(|hop| PathCost::from(lsdb.record(&hop[0]).unwrap().cost_to(&hop[1]).unwrap()))
                        .sum();
                    assert_eq!(summed, cost);
                }
            }
        }
    }
}

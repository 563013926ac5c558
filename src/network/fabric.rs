use std::collections::HashMap;

use ipnetwork::Ipv4Network;
use petgraph::{
    stable_graph::{NodeIndex, StableUnGraph},
    visit::EdgeRef,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    config::FabricConfig,
    network::{
        link::{Link, LinkCost, LinkSpec},
        node::{Node, NodeId, Role},
    },
};

/// Malformed topology. Raised while the fabric is built, before any route is computed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("duplicate node identifier: {0}")]
    DuplicateNode(NodeId),
    #[error("link {link} references unknown node {node}")]
    UnknownNode { link: String, node: String },
    #[error("link {link} has invalid cost {cost} (costs must be between 1 and {max})", max = LinkCost::MAX)]
    InvalidCost { link: String, cost: i64 },
    #[error("link {0} connects a node to itself")]
    SelfLoop(String),
    #[error("node {0} does not exist")]
    NodeNotFound(NodeId),
    #[error("address pool {pool} has no host #{index}")]
    AddressPoolExhausted { pool: Ipv4Network, index: u32 },
}

/// Topology as handed over by a topology file or another collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySpec {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub links: Vec<LinkSpec>,
}

/// The underlay topology graph, the single source of truth for every derived structure.
///
/// Nodes live in a stable undirected graph so that removing a node or a link never
/// invalidates the indices held in `node_id_to_index_map`. Every value of this type is
/// valid: ids are unique, links only reference existing nodes and every cost is >= 1.
#[derive(Debug, Clone, Default)]
pub struct Fabric {
    graph: StableUnGraph<Node, Link>,
    node_id_to_index_map: HashMap<NodeId, NodeIndex>,
}

fn validate_cost(link: &LinkSpec, cost: i64) -> Result<LinkCost, ConfigurationError> {
    match LinkCost::try_from(cost) {
        Ok(cost) if cost >= 1 => Ok(cost),
        _ => Err(ConfigurationError::InvalidCost {
            link: link.label(),
            cost,
        }),
    }
}

impl TryFrom<&LinkSpec> for Link {
    type Error = ConfigurationError;

    fn try_from(spec: &LinkSpec) -> Result<Self, Self::Error> {
        let cost = validate_cost(spec, spec.cost)?;
        let reverse_cost = spec
            .reverse_cost
            .map(|reverse| validate_cost(spec, reverse))
            .transpose()?;
        Ok(Link {
            a: NodeId::from(spec.a.as_str()),
            b: NodeId::from(spec.b.as_str()),
            cost,
            reverse_cost,
        })
    }
}

impl Fabric {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a topology description and build the graph from it.
    pub fn from_spec(spec: &TopologySpec) -> Result<Self, ConfigurationError> {
        let mut fabric = Fabric::new();
        for node in &spec.nodes {
            fabric.add_node(node.clone())?;
        }
        for link in &spec.links {
            fabric.add_link(Link::try_from(link)?)?;
        }
        Ok(fabric)
    }

    /// Build a two-tier Clos fabric: spines `S1..Sn`, leaves `L1..Lm`, every spine linked to
    /// every leaf. Node `i` (spines first) gets host `i` of the loopback pool, leaf `i` gets
    /// host `spines + i` of the VTEP pool.
    pub fn spine_leaf(config: &FabricConfig) -> Result<Self, ConfigurationError> {
        let nth = |pool: Ipv4Network, index: u32| {
            pool.nth(index)
                .ok_or(ConfigurationError::AddressPoolExhausted { pool, index })
        };

        let mut fabric = Fabric::new();
        for i in 1..=config.spines {
            let node = Node::new(format!("S{i}"), Role::Spine)
                .with_loopback(nth(config.loopback_pool, i)?);
            fabric.add_node(node)?;
        }
        for i in 1..=config.leaves {
            let index = config.spines + i;
            let node = Node::new(format!("L{i}"), Role::Leaf)
                .with_loopback(nth(config.loopback_pool, index)?)
                .with_vtep_ip(nth(config.vtep_pool, index)?);
            fabric.add_node(node)?;
        }

        for s in 1..=config.spines {
            for l in 1..=config.leaves {
                fabric.add_link(Link::new(format!("S{s}"), format!("L{l}"), config.spine_leaf_cost))?;
            }
        }
        if let Some(cost) = config.spine_spine_cost {
            for s1 in 1..=config.spines {
                for s2 in (s1 + 1)..=config.spines {
                    fabric.add_link(Link::new(format!("S{s1}"), format!("S{s2}"), cost))?;
                }
            }
        }
        Ok(fabric)
    }

    pub fn add_node(&mut self, node: Node) -> Result<(), ConfigurationError> {
        if self.node_id_to_index_map.contains_key(&node.id) {
            return Err(ConfigurationError::DuplicateNode(node.id));
        }
        let id = node.id.clone();
        let index = self.graph.add_node(node);
        self.node_id_to_index_map.insert(id, index);
        Ok(())
    }

    pub fn add_link(&mut self, link: Link) -> Result<(), ConfigurationError> {
        let label = format!("{}-{}", link.a, link.b);
        if link.a == link.b {
            return Err(ConfigurationError::SelfLoop(label));
        }
        for cost in std::iter::once(link.cost).chain(link.reverse_cost) {
            if cost < 1 {
                return Err(ConfigurationError::InvalidCost {
                    link: label,
                    cost: i64::from(cost),
                });
            }
        }
        let index_of = |id: &NodeId| {
            self.node_id_to_index_map
                .get(id)
                .copied()
                .ok_or_else(|| ConfigurationError::UnknownNode {
                    link: label.clone(),
                    node: id.to_string(),
                })
        };
        let a = index_of(&link.a)?;
        let b = index_of(&link.b)?;
        self.graph.add_edge(a, b, link);
        Ok(())
    }

    /// Remove a node together with all of its links.
    pub fn remove_node(&mut self, id: &NodeId) -> Result<Node, ConfigurationError> {
        let index = self
            .node_id_to_index_map
            .remove(id)
            .ok_or_else(|| ConfigurationError::NodeNotFound(id.clone()))?;
        self.graph
            .remove_node(index)
            .ok_or_else(|| ConfigurationError::NodeNotFound(id.clone()))
    }

    /// Drop every link touching `id` but keep the node. Returns the number of links removed.
    pub fn disconnect_node(&mut self, id: &NodeId) -> Result<usize, ConfigurationError> {
        let index = *self
            .node_id_to_index_map
            .get(id)
            .ok_or_else(|| ConfigurationError::NodeNotFound(id.clone()))?;
        let edges: Vec<_> = self.graph.edges(index).map(|edge| edge.id()).collect();
        for edge in &edges {
            let _ = self.graph.remove_edge(*edge);
        }
        Ok(edges.len())
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.node_id_to_index_map.contains_key(id)
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.node_id_to_index_map
            .get(id)
            .and_then(|index| self.graph.node_weight(*index))
    }

    pub fn node_count(&self) -> usize {
        self.node_id_to_index_map.len()
    }

    /// Nodes sorted by id.
    pub fn nodes(&self) -> Vec<&Node> {
        let mut nodes: Vec<&Node> = self
            .graph
            .node_indices()
            .filter_map(|index| self.graph.node_weight(index))
            .collect();
        nodes.sort_by(|this, other| this.id.cmp(&other.id));
        nodes
    }

    /// Links sorted by endpoints.
    pub fn links(&self) -> Vec<&Link> {
        let mut links: Vec<&Link> = self
            .graph
            .edge_indices()
            .filter_map(|index| self.graph.edge_weight(index))
            .collect();
        links.sort_by(|this, other| (&this.a, &this.b, this.cost).cmp(&(&other.a, &other.b, other.cost)));
        links
    }

    /// Links incident to `id`, in no particular order.
    pub fn links_of(&self, id: &NodeId) -> Vec<&Link> {
        match self.node_id_to_index_map.get(id) {
            Some(index) => self.graph.edges(*index).map(|edge| edge.weight()).collect(),
            None => Vec::new(),
        }
    }

    /// Neighbors of `id` with the cost seen from `id`, sorted by neighbor id.
    pub fn neighbors(&self, id: &NodeId) -> Vec<(&NodeId, LinkCost)> {
        let mut neighbors: Vec<(&NodeId, LinkCost)> = self
            .links_of(id)
            .into_iter()
            .filter_map(|link| Some((link.peer_of(id)?, link.cost_from(id)?)))
            .collect();
        neighbors.sort();
        neighbors
    }

    /// Cost of the cheapest link from `a` to `b`, if they are adjacent.
    pub fn link_cost(&self, a: &NodeId, b: &NodeId) -> Option<LinkCost> {
        self.links_of(a)
            .into_iter()
            .filter(|link| link.peer_of(a) == Some(b))
            .filter_map(|link| link.cost_from(a))
            .min()
    }

    /// Underlying graph, used by the dashboard to draw the fabric.
    pub fn graph(&self) -> &StableUnGraph<Node, Link> {
        &self.graph
    }

    pub fn to_spec(&self) -> TopologySpec {
        TopologySpec {
            nodes: self.nodes().into_iter().cloned().collect(),
            links: self.links().into_iter().map(LinkSpec::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(nodes: &[&str], links: &[(&str, &str, i64)]) -> TopologySpec {
        TopologySpec {
            nodes: nodes.iter().map(|id| Node::new(*id, Role::Host)).collect(),
            links: links
                .iter()
                .map(|(a, b, cost)| LinkSpec::new(*a, *b, *cost))
                .collect(),
        }
    }

    #[test]
    fn test_duplicate_node_is_rejected() {
        let err = Fabric::from_spec(&spec(&["A", "B", "A"], &[])).unwrap_err();
        assert_eq!(err, ConfigurationError::DuplicateNode("A".into()));
    }

    #[test]
    fn test_unknown_node_is_reported_with_link() {
        let err = Fabric::from_spec(&spec(&["A"], &[("A", "Z", 1)])).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::UnknownNode {
                link: "A-Z".to_string(),
                node: "Z".to_string()
            }
        );
    }

    #[test]
    fn test_negative_and_zero_costs_are_rejected() {
        let err = Fabric::from_spec(&spec(&["A", "B"], &[("A", "B", -4)])).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidCost { cost: -4, .. }));

        let err = Fabric::from_spec(&spec(&["A", "B"], &[("A", "B", 0)])).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidCost { cost: 0, .. }));

        let mut asym = spec(&["A", "B"], &[("A", "B", 1)]);
        asym.links[0].reverse_cost = Some(-1);
        assert!(matches!(
            Fabric::from_spec(&asym),
            Err(ConfigurationError::InvalidCost { cost: -1, .. })
        ));
    }

    #[test]
    fn test_self_loop_is_rejected() {
        let err = Fabric::from_spec(&spec(&["A"], &[("A", "A", 1)])).unwrap_err();
        assert_eq!(err, ConfigurationError::SelfLoop("A-A".to_string()));
    }

    #[test]
    fn test_spine_leaf_builder() {
        let config = FabricConfig {
            spines: 2,
            leaves: 3,
            ..FabricConfig::default()
        };
        let fabric = Fabric::spine_leaf(&config).unwrap();

        assert_eq!(fabric.node_count(), 5);
        assert_eq!(fabric.links().len(), 6);
        let l1 = fabric.node(&"L1".into()).unwrap();
        assert_eq!(l1.role, Role::Leaf);
        assert_eq!(l1.loopback, Some("10.255.0.3".parse().unwrap()));
        assert_eq!(l1.vtep_ip, Some("10.0.0.3".parse().unwrap()));
        let s2 = fabric.node(&"S2".into()).unwrap();
        assert_eq!(s2.loopback, Some("10.255.0.2".parse().unwrap()));
        assert_eq!(s2.vtep_ip, None);

        let neighbors: Vec<_> = fabric
            .neighbors(&"L2".into())
            .into_iter()
            .map(|(id, cost)| (id.to_string(), cost))
            .collect();
        assert_eq!(neighbors, vec![("S1".to_string(), 10), ("S2".to_string(), 10)]);
    }

    #[test]
    fn test_spine_leaf_pool_exhaustion() {
        let config = FabricConfig {
            spines: 2,
            leaves: 3,
            loopback_pool: "10.255.0.0/30".parse().unwrap(),
            ..FabricConfig::default()
        };
        assert!(matches!(
            Fabric::spine_leaf(&config),
            Err(ConfigurationError::AddressPoolExhausted { index: 4, .. })
        ));
    }

    #[test]
    fn test_disconnect_and_remove_node() {
        let mut fabric =
            Fabric::from_spec(&spec(&["A", "B", "C"], &[("A", "B", 1), ("B", "C", 2)])).unwrap();

        assert_eq!(fabric.disconnect_node(&"B".into()).unwrap(), 2);
        assert!(fabric.contains(&"B".into()));
        assert!(fabric.links().is_empty());

        let removed = fabric.remove_node(&"C".into()).unwrap();
        assert_eq!(removed.id, NodeId::from("C"));
        assert!(!fabric.contains(&"C".into()));
        assert_eq!(
            fabric.remove_node(&"C".into()),
            Err(ConfigurationError::NodeNotFound("C".into()))
        );
    }

    #[test]
    fn test_link_cost_prefers_cheapest_parallel_link() {
        let mut fabric = Fabric::from_spec(&spec(&["A", "B"], &[("A", "B", 5)])).unwrap();
        fabric.add_link(Link::asymmetric("B", "A", 9, 2)).unwrap();

        assert_eq!(fabric.link_cost(&"A".into(), &"B".into()), Some(2));
        assert_eq!(fabric.link_cost(&"B".into(), &"A".into()), Some(5));
        assert_eq!(fabric.link_cost(&"A".into(), &"C".into()), None);
    }

    #[test]
    fn test_spec_export_reimports() {
        let original = spec(&["A", "B"], &[("A", "B", 4)]);
        let fabric = Fabric::from_spec(&original).unwrap();
        let exported = fabric.to_spec();
        assert_eq!(exported, original);
    }
}

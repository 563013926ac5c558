use std::collections::{HashMap, HashSet};

use eframe::egui::Color32;
use egui::Pos2;
use egui_graphs::{DefaultEdgeShape, DefaultNodeShape, Graph};
use petgraph::{Undirected, csr::DefaultIx, graph::NodeIndex};
use rand::Rng;

use fabric_sim::network::{
    Fabric, NodeId,
    link::Link,
    node::{Node, Role},
};

pub type FabricView = Graph<Node, Link, Undirected, DefaultIx, DefaultNodeShape, DefaultEdgeShape>;

const SPINE_COLOR: Color32 = Color32::from_rgb(0x89, 0xb4, 0xfa);
const LEAF_COLOR: Color32 = Color32::from_rgb(0xa6, 0xe3, 0xa1);
const HOST_COLOR: Color32 = Color32::GRAY;
const PATH_COLOR: Color32 = Color32::from_rgb(0xfa, 0xb3, 0x87);

fn role_color(role: Role) -> Color32 {
    match role {
        Role::Spine => SPINE_COLOR,
        Role::Leaf => LEAF_COLOR,
        Role::Host => HOST_COLOR,
    }
}

fn seed_position(rng: &mut impl Rng) -> Pos2 {
    Pos2::new(rng.random_range(0.0..40.0), rng.random_range(0.0..40.0))
}

/// Drawable copy of the fabric for the dashboard.
///
/// node_id_to_index_map maps router ids to view indices so the view can be reconciled in place
/// and nodes keep their layout position across recomputations.
pub struct FabricGraph {
    pub graph: FabricView,
    pub node_id_to_index_map: HashMap<NodeId, NodeIndex>,
}

impl Default for FabricGraph {
    fn default() -> Self {
        Self::build_new(&Fabric::new())
    }
}

impl FabricGraph {
    pub fn build_new(fabric: &Fabric) -> Self {
        let mut graph: FabricView = egui_graphs::to_graph(fabric.graph());
        let mut node_id_to_index_map = HashMap::new();

        let node_indices: Vec<NodeIndex> = graph.nodes_iter().map(|(index, _)| index).collect();
        let mut rng = rand::rng();
        for index in node_indices {
            let Some(node) = graph.node_mut(index) else {
                continue;
            };
            node.set_location(seed_position(&mut rng));
            let payload = node.payload().clone();
            node.set_label(payload.id.to_string());
            node.set_color(role_color(payload.role));
            node_id_to_index_map.insert(payload.id, index);
        }

        Self {
            graph,
            node_id_to_index_map,
        }
    }

    /// Bring the view in line with `fabric`: vanished routers are removed, new ones get a seeded
    /// position, kept ones take the new payload in place and every link is re-added.
    pub fn reconcile(&mut self, fabric: &Fabric) {
        let mut rng = rand::rng();
        let desired: HashMap<&NodeId, &Node> = fabric.nodes().into_iter().map(|node| (&node.id, node)).collect();

        let vanished: Vec<NodeId> = self
            .node_id_to_index_map
            .keys()
            .filter(|id| !desired.contains_key(id))
            .cloned()
            .collect();
        for id in vanished {
            if let Some(index) = self.node_id_to_index_map.remove(&id) {
                let _ = self.graph.remove_node(index);
            }
        }

        for (id, node) in desired {
            match self.node_id_to_index_map.get(id) {
                Some(&index) => {
                    if let Some(view) = self.graph.node_mut(index) {
                        if view.payload() != node {
                            *view.payload_mut() = node.clone();
                        }
                        view.set_color(role_color(node.role));
                    }
                }
                None => {
                    let index = self.graph.add_node(node.clone());
                    if let Some(view) = self.graph.node_mut(index) {
                        view.set_location(seed_position(&mut rng));
                        view.set_label(id.to_string());
                        view.set_color(role_color(node.role));
                    }
                    self.node_id_to_index_map.insert(id.clone(), index);
                }
            }
        }

        self.clear_all_edges();
        for link in fabric.links() {
            let (a, b) = link.endpoints();
            if let (Some(&a), Some(&b)) = (self.node_id_to_index_map.get(a), self.node_id_to_index_map.get(b)) {
                self.graph.add_edge(a, b, link.clone());
            }
        }
    }

    fn clear_all_edges(&mut self) {
        let edge_indices: Vec<_> = self.graph.edges_iter().map(|(index, _)| index).collect();
        for index in edge_indices {
            let _ = self.graph.remove_edge(index);
        }
    }

    /// Router currently selected in the view.
    pub fn selected_router(&self) -> Option<NodeId> {
        let index = self.graph.selected_nodes().first()?;
        self.graph.node(*index).map(|node| node.payload().id.clone())
    }

    /// Color the routers of `path`, restoring role colors everywhere else.
    pub fn highlight_path(&mut self, path: &[NodeId]) {
        let on_path: HashSet<&NodeId> = path.iter().collect();
        for (id, &index) in &self.node_id_to_index_map {
            if let Some(node) = self.graph.node_mut(index) {
                let color = if on_path.contains(id) {
                    PATH_COLOR
                } else {
                    role_color(node.payload().role)
                };
                node.set_color(color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    fn fabric(nodes: Vec<Node>, links: Vec<Link>) -> Fabric {
        let mut fabric = Fabric::new();
        for node in nodes {
            fabric.add_node(node).unwrap();
        }
        for link in links {
            fabric.add_link(link).unwrap();
        }
        fabric
    }

    #[test]
    fn test_reconcile_refreshes_kept_routers() {
        let before = fabric(
            vec![Node::new("R1", Role::Host), Node::new("R2", Role::Spine)],
            vec![Link::new("R1", "R2", 1)],
        );
        let mut view = FabricGraph::build_new(&before);
        let r1 = view.node_id_to_index_map[&NodeId::from("R1")];

        let after = fabric(
            vec![
                Node::new("R1", Role::Leaf).with_vtep_ip(Ipv4Addr::new(10, 0, 0, 9)),
                Node::new("R3", Role::Leaf),
            ],
            vec![Link::new("R1", "R3", 5)],
        );
        view.reconcile(&after);

        assert_eq!(view.node_id_to_index_map[&NodeId::from("R1")], r1);
        let payload = view.graph.node(r1).unwrap().payload();
        assert_eq!(payload.role, Role::Leaf);
        assert_eq!(payload.vtep_ip, Some(Ipv4Addr::new(10, 0, 0, 9)));

        assert!(!view.node_id_to_index_map.contains_key(&NodeId::from("R2")));
        assert!(view.node_id_to_index_map.contains_key(&NodeId::from("R3")));
        assert_eq!(view.graph.edges_iter().count(), 1);
    }
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::network::{
    fabric::{ConfigurationError, Fabric, TopologySpec},
    link::LinkCost,
    node::NodeId,
};

/// One adjacency as advertised by a router.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Adjacency {
    pub neighbor: NodeId,
    pub cost: LinkCost,
}

/// Router-LSA equivalent: a router and the neighbors it can reach directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStateRecord {
    pub router: NodeId,
    /// Sorted by neighbor id, one entry per neighbor.
    pub adjacencies: Vec<Adjacency>,
}

impl LinkStateRecord {
    pub fn cost_to(&self, neighbor: &NodeId) -> Option<LinkCost> {
        self.adjacencies
            .binary_search_by(|adjacency| adjacency.neighbor.cmp(neighbor))
            .ok()
            .map(|index| self.adjacencies[index].cost)
    }
}

/// Fully converged link-state database: every router sees every record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStateDatabase {
    records: BTreeMap<NodeId, LinkStateRecord>,
}

impl LinkStateDatabase {
    /// Build one record per node of the fabric. Every link shows up in the records of both
    /// endpoints with the cost of the respective direction. Parallel links collapse into the
    /// cheapest cost per direction.
    pub fn synthesize(fabric: &Fabric) -> Self {
        let mut costs: BTreeMap<NodeId, BTreeMap<NodeId, LinkCost>> = fabric
            .nodes()
            .into_iter()
            .map(|node| (node.id.clone(), BTreeMap::new()))
            .collect();

        for link in fabric.links() {
            let reverse = link.reverse_cost.unwrap_or(link.cost);
            for (from, to, cost) in [(&link.a, &link.b, link.cost), (&link.b, &link.a, reverse)] {
                let Some(adjacent) = costs.get_mut(from) else {
                    continue;
                };
                adjacent
                    .entry(to.clone())
                    .and_modify(|existing| *existing = (*existing).min(cost))
                    .or_insert(cost);
            }
        }

        let records = costs
            .into_iter()
            .map(|(router, adjacent)| {
                let adjacencies = adjacent
                    .into_iter()
                    .map(|(neighbor, cost)| Adjacency { neighbor, cost })
                    .collect();
                (router.clone(), LinkStateRecord { router, adjacencies })
            })
            .collect();

        let lsdb = Self { records };
        tracing::debug!(
            routers = lsdb.records.len(),
            adjacencies = lsdb.adjacency_count(),
            "synthesized link-state database"
        );
        lsdb
    }

    /// Validate a raw topology and synthesize its database.
    pub fn from_spec(spec: &TopologySpec) -> Result<Self, ConfigurationError> {
        let fabric = Fabric::from_spec(spec)?;
        Ok(Self::synthesize(&fabric))
    }

    pub fn record(&self, router: &NodeId) -> Option<&LinkStateRecord> {
        self.records.get(router)
    }

    pub fn records(&self) -> impl Iterator<Item = &LinkStateRecord> {
        self.records.values()
    }

    /// Router ids in ascending order.
    pub fn routers(&self) -> impl Iterator<Item = &NodeId> {
        self.records.keys()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn adjacency_count(&self) -> usize {
        self.records.values().map(|record| record.adjacencies.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{
        link::{Link, LinkSpec},
        node::{Node, Role},
    };

    fn fabric(nodes: &[&str], links: Vec<Link>) -> Fabric {
        let mut fabric = Fabric::new();
        for id in nodes {
            fabric.add_node(Node::new(*id, Role::Host)).unwrap();
        }
        for link in links {
            fabric.add_link(link).unwrap();
        }
        fabric
    }

    #[test]
    fn test_every_link_appears_in_both_records() {
        let fabric = fabric(
            &["A", "B", "C"],
            vec![Link::new("A", "B", 1), Link::new("B", "C", 4)],
        );
        let lsdb = LinkStateDatabase::synthesize(&fabric);

        assert_eq!(lsdb.len(), 3);
        for link in fabric.links() {
            let a = lsdb.record(&link.a).unwrap();
            let b = lsdb.record(&link.b).unwrap();
            assert_eq!(a.cost_to(&link.b), Some(link.cost));
            assert_eq!(b.cost_to(&link.a), Some(link.cost));
        }
        let neighbors: Vec<&str> = lsdb
            .record(&"B".into())
            .unwrap()
            .adjacencies
            .iter()
            .map(|adjacency| adjacency.neighbor.as_str())
            .collect();
        assert_eq!(neighbors, vec!["A", "C"]);
    }

    #[test]
    fn test_asymmetric_costs_are_kept_per_direction() {
        let fabric = fabric(&["A", "B"], vec![Link::asymmetric("A", "B", 3, 8)]);
        let lsdb = LinkStateDatabase::synthesize(&fabric);

        assert_eq!(lsdb.record(&"A".into()).unwrap().cost_to(&"B".into()), Some(3));
        assert_eq!(lsdb.record(&"B".into()).unwrap().cost_to(&"A".into()), Some(8));
    }

    #[test]
    fn test_isolated_node_gets_empty_record() {
        let fabric = fabric(&["A", "B", "lonely"], vec![Link::new("A", "B", 1)]);
        let lsdb = LinkStateDatabase::synthesize(&fabric);

        let record = lsdb.record(&"lonely".into()).unwrap();
        assert!(record.adjacencies.is_empty());
    }

    #[test]
    fn test_parallel_links_collapse_to_cheapest() {
        let fabric = fabric(
            &["A", "B"],
            vec![Link::new("A", "B", 10), Link::asymmetric("B", "A", 6, 12)],
        );
        let lsdb = LinkStateDatabase::synthesize(&fabric);

        let a = lsdb.record(&"A".into()).unwrap();
        assert_eq!(a.adjacencies.len(), 1);
        assert_eq!(a.cost_to(&"B".into()), Some(10));
        assert_eq!(lsdb.record(&"B".into()).unwrap().cost_to(&"A".into()), Some(6));
    }

    #[test]
    fn test_from_spec_reports_configuration_errors() {
        let spec = TopologySpec {
            nodes: vec![Node::new("A", Role::Host)],
            links: vec![LinkSpec::new("A", "ghost", 1)],
        };
        assert!(matches!(
            LinkStateDatabase::from_spec(&spec),
            Err(ConfigurationError::UnknownNode { .. })
        ));

        let spec = TopologySpec {
            nodes: vec![Node::new("A", Role::Host), Node::new("A", Role::Spine)],
            links: vec![],
        };
        assert_eq!(
            LinkStateDatabase::from_spec(&spec),
            Err(ConfigurationError::DuplicateNode("A".into()))
        );
    }
}

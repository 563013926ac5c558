use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::network::node::NodeId;

/// Interface cost of a single link direction. OSPF-style, always >= 1.
pub type LinkCost = u32;

/// A validated bidirectional link between two routers.
///
/// `cost` applies in the a -> b direction, `reverse_cost` in b -> a. Without a
/// reverse cost the link is symmetric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub a: NodeId,
    pub b: NodeId,
    pub cost: LinkCost,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverse_cost: Option<LinkCost>,
}

impl Link {
    pub fn new(a: impl Into<NodeId>, b: impl Into<NodeId>, cost: LinkCost) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
            cost,
            reverse_cost: None,
        }
    }

    pub fn asymmetric(
        a: impl Into<NodeId>,
        b: impl Into<NodeId>,
        cost: LinkCost,
        reverse_cost: LinkCost,
    ) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
            cost,
            reverse_cost: Some(reverse_cost),
        }
    }

    pub fn is_symmetric(&self) -> bool {
        self.reverse_cost.is_none_or(|reverse| reverse == self.cost)
    }

    /// Cost seen by `from` when sending across this link, `None` if `from` is not an endpoint.
    pub fn cost_from(&self, from: &NodeId) -> Option<LinkCost> {
        if *from == self.a {
            Some(self.cost)
        } else if *from == self.b {
            Some(self.reverse_cost.unwrap_or(self.cost))
        } else {
            None
        }
    }

    /// The endpoint opposite to `node`.
    pub fn peer_of(&self, node: &NodeId) -> Option<&NodeId> {
        if *node == self.a {
            Some(&self.b)
        } else if *node == self.b {
            Some(&self.a)
        } else {
            None
        }
    }

    pub fn endpoints(&self) -> (&NodeId, &NodeId) {
        (&self.a, &self.b)
    }
}

impl Display for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.reverse_cost {
            Some(reverse) if reverse != self.cost => {
                write!(f, "{} <-> {} ({}/{})", self.a, self.b, self.cost, reverse)
            }
            _ => write!(f, "{} <-> {} ({})", self.a, self.b, self.cost),
        }
    }
}

/// Unvalidated link as it arrives from a topology file.
///
/// Costs are signed on purpose so that a negative cost is reported as a configuration
/// error naming the link instead of an opaque deserialization failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSpec {
    pub a: String,
    pub b: String,
    pub cost: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverse_cost: Option<i64>,
}

impl LinkSpec {
    pub fn new(a: impl Into<String>, b: impl Into<String>, cost: i64) -> Self {
        Self {
            a: a.into(),
            b: b.into(),
            cost,
            reverse_cost: None,
        }
    }

    /// Human readable name used in error messages.
    pub fn label(&self) -> String {
        format!("{}-{}", self.a, self.b)
    }
}

impl From<&Link> for LinkSpec {
    fn from(link: &Link) -> Self {
        Self {
            a: link.a.to_string(),
            b: link.b.to_string(),
            cost: i64::from(link.cost),
            reverse_cost: link.reverse_cost.map(i64::from),
        }
    }
}

use std::{fmt::Display, net::Ipv4Addr};

use serde::{Deserialize, Serialize};

/// Identifier of a router in the fabric.
///
/// Ordering is plain lexicographic string ordering. It is the ordering used by every
/// deterministic tie-break in the routing code, so "S1" < "S2" and "L10" < "L2".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Role of a node in a Clos fabric. Only used for construction and display,
/// the routing code never looks at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Spine,
    Leaf,
    #[default]
    Host,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use Role::*;
        match self {
            Spine => write!(f, "spine"),
            Leaf => write!(f, "leaf"),
            Host => write!(f, "host"),
        }
    }
}

/// A router (or host) in the underlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loopback: Option<Ipv4Addr>,
    /// VXLAN tunnel endpoint address, only leaves carry one in a generated fabric.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vtep_ip: Option<Ipv4Addr>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            loopback: None,
            vtep_ip: None,
        }
    }

    pub fn with_loopback(mut self, loopback: Ipv4Addr) -> Self {
        self.loopback = Some(loopback);
        self
    }

    pub fn with_vtep_ip(mut self, vtep_ip: Ipv4Addr) -> Self {
        self.vtep_ip = Some(vtep_ip);
        self
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.id, self.role)?;
        if let Some(loopback) = self.loopback {
            write!(f, "\nLoopback: {}", loopback)?;
        }
        if let Some(vtep) = self.vtep_ip {
            write!(f, "\nVTEP: {}", vtep)?;
        }
        Ok(())
    }
}

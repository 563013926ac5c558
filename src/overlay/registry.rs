use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Display,
    net::Ipv4Addr,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::network::node::NodeId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OverlayError {
    #[error("unknown tunnel endpoint: {0}")]
    UnknownEndpoint(EndpointId),
    #[error("unknown overlay segment: {0}")]
    UnknownSegment(SegmentId),
    #[error("segment id {0} does not fit in 24 bits")]
    InvalidVni(u32),
    #[error("endpoint {endpoint} is attached to unknown router {router}")]
    UnknownRouter { endpoint: EndpointId, router: NodeId },
}

/// Overlay segment identifier, a 24-bit VNI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct SegmentId(u32);

impl SegmentId {
    pub const MAX: u32 = 0x00FF_FFFF;

    pub fn new(vni: u32) -> Result<Self, OverlayError> {
        if vni > Self::MAX {
            return Err(OverlayError::InvalidVni(vni));
        }
        Ok(Self(vni))
    }

    pub fn vni(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for SegmentId {
    type Error = OverlayError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SegmentId> for u32 {
    fn from(value: SegmentId) -> Self {
        value.0
    }
}

impl Display for SegmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointId(String);

impl EndpointId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for EndpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EndpointId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EndpointId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// VTEP equivalent, anchored to one underlay router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelEndpoint {
    pub id: EndpointId,
    pub router: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<Ipv4Addr>,
}

impl TunnelEndpoint {
    pub fn new(id: impl Into<EndpointId>, router: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            router: router.into(),
            ip: None,
        }
    }

    pub fn with_ip(mut self, ip: Ipv4Addr) -> Self {
        self.ip = Some(ip);
        self
    }
}

/// VNI equivalent: a named group of endpoints that reach each other through tunnels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlaySegment {
    pub id: SegmentId,
    pub name: String,
    pub members: BTreeSet<EndpointId>,
}

/// Endpoints, segments and the membership association between them.
///
/// The registry is a plain value owned by the caller, so independent overlays can coexist in
/// one process. Memberships are kept in both directions and the two views always agree.
/// Nothing here looks at routing state, reachability is only evaluated when tunnels are resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayRegistry {
    endpoints: BTreeMap<EndpointId, TunnelEndpoint>,
    segments: BTreeMap<SegmentId, OverlaySegment>,
    memberships: BTreeMap<EndpointId, BTreeSet<SegmentId>>,
}

impl OverlayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a segment if it does not exist yet. Returns `false` (and keeps the existing name)
    /// if it already did.
    pub fn add_segment(&mut self, id: SegmentId, name: impl Into<String>) -> bool {
        if self.segments.contains_key(&id) {
            return false;
        }
        self.segments.insert(
            id,
            OverlaySegment {
                id,
                name: name.into(),
                members: BTreeSet::new(),
            },
        );
        true
    }

    /// Insert an endpoint or update the router and address of an existing one. Memberships of an
    /// existing endpoint are kept.
    pub fn add_endpoint(&mut self, endpoint: TunnelEndpoint) -> Option<TunnelEndpoint> {
        self.memberships.entry(endpoint.id.clone()).or_default();
        self.endpoints.insert(endpoint.id.clone(), endpoint)
    }

    /// Add an endpoint and join it to `segments`, creating missing segments on the way.
    pub fn attach_endpoint(&mut self, endpoint: TunnelEndpoint, segments: &[SegmentId]) {
        let id = endpoint.id.clone();
        self.add_endpoint(endpoint);
        for segment in segments {
            self.add_segment(*segment, format!("VNI-{segment}"));
            self.insert_membership(&id, *segment);
        }
    }

    /// Join an endpoint to a segment. Idempotent, returns whether the membership is new.
    pub fn join(&mut self, endpoint: &EndpointId, segment: SegmentId) -> Result<bool, OverlayError> {
        self.check(endpoint, segment)?;
        Ok(self.insert_membership(endpoint, segment))
    }

    /// Remove an endpoint from a segment, returns whether it was a member.
    pub fn leave(&mut self, endpoint: &EndpointId, segment: SegmentId) -> Result<bool, OverlayError> {
        self.check(endpoint, segment)?;
        let removed = self
            .segments
            .get_mut(&segment)
            .is_some_and(|entry| entry.members.remove(endpoint));
        if let Some(segments) = self.memberships.get_mut(endpoint) {
            segments.remove(&segment);
        }
        Ok(removed)
    }

    /// Remove a segment together with all of its memberships.
    pub fn remove_segment(&mut self, id: SegmentId) -> Option<OverlaySegment> {
        let segment = self.segments.remove(&id)?;
        for member in &segment.members {
            if let Some(segments) = self.memberships.get_mut(member) {
                segments.remove(&id);
            }
        }
        Some(segment)
    }

    /// Remove an endpoint and drop it from every segment it belonged to.
    pub fn remove_endpoint(&mut self, id: &EndpointId) -> Option<TunnelEndpoint> {
        let endpoint = self.endpoints.remove(id)?;
        for segment in self.memberships.remove(id).unwrap_or_default() {
            if let Some(entry) = self.segments.get_mut(&segment) {
                entry.members.remove(id);
            }
        }
        Some(endpoint)
    }

    pub fn endpoint(&self, id: &EndpointId) -> Option<&TunnelEndpoint> {
        self.endpoints.get(id)
    }

    pub fn segment(&self, id: SegmentId) -> Option<&OverlaySegment> {
        self.segments.get(&id)
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &TunnelEndpoint> {
        self.endpoints.values()
    }

    pub fn segments(&self) -> impl Iterator<Item = &OverlaySegment> {
        self.segments.values()
    }

    /// Segments an endpoint belongs to, ascending.
    pub fn segments_of(&self, endpoint: &EndpointId) -> Vec<SegmentId> {
        self.memberships
            .get(endpoint)
            .map(|segments| segments.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Member endpoints of a segment, ordered by endpoint id.
    pub fn members(&self, segment: SegmentId) -> Vec<&TunnelEndpoint> {
        self.segments
            .get(&segment)
            .map(|entry| {
                entry
                    .members
                    .iter()
                    .filter_map(|member| self.endpoints.get(member))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every unordered pair of members, the lower endpoint id first.
    pub fn pairs(&self, segment: SegmentId) -> Vec<(&TunnelEndpoint, &TunnelEndpoint)> {
        let members = self.members(segment);
        let mut pairs = Vec::new();
        for (i, first) in members.iter().enumerate() {
            for second in &members[i + 1..] {
                pairs.push((*first, *second));
            }
        }
        pairs
    }

    fn check(&self, endpoint: &EndpointId, segment: SegmentId) -> Result<(), OverlayError> {
        if !self.endpoints.contains_key(endpoint) {
            return Err(OverlayError::UnknownEndpoint(endpoint.clone()));
        }
        if !self.segments.contains_key(&segment) {
            return Err(OverlayError::UnknownSegment(segment));
        }
        Ok(())
    }

    fn insert_membership(&mut self, endpoint: &EndpointId, segment: SegmentId) -> bool {
        let added = self
            .segments
            .get_mut(&segment)
            .is_some_and(|entry| entry.members.insert(endpoint.clone()));
        self.memberships
            .entry(endpoint.clone())
            .or_default()
            .insert(segment);
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vni(id: u32) -> SegmentId {
        SegmentId::new(id).unwrap()
    }

    /// Both directions of the association describe the same set of pairs.
    fn assert_consistent(registry: &OverlayRegistry) {
        let forward: BTreeSet<(EndpointId, SegmentId)> = registry
            .memberships
            .iter()
            .flat_map(|(endpoint, segments)| segments.iter().map(|segment| (endpoint.clone(), *segment)))
            .collect();
        let backward: BTreeSet<(EndpointId, SegmentId)> = registry
            .segments
            .values()
            .flat_map(|segment| segment.members.iter().map(|member| (member.clone(), segment.id)))
            .collect();
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_vni_range() {
        assert!(SegmentId::new(SegmentId::MAX).is_ok());
        assert_eq!(SegmentId::new(1 << 24), Err(OverlayError::InvalidVni(1 << 24)));
        assert!(serde_json::from_str::<SegmentId>("16777216").is_err());
        assert_eq!(serde_json::from_str::<SegmentId>("100").unwrap(), vni(100));
    }

    #[test]
    fn test_join_is_idempotent() {
        let mut registry = OverlayRegistry::new();
        registry.add_segment(vni(100), "V100");
        registry.add_endpoint(TunnelEndpoint::new("vtep1", "L1"));

        assert_eq!(registry.join(&"vtep1".into(), vni(100)), Ok(true));
        assert_eq!(registry.join(&"vtep1".into(), vni(100)), Ok(false));
        assert_eq!(registry.members(vni(100)).len(), 1);
        assert_eq!(registry.segments_of(&"vtep1".into()), vec![vni(100)]);
        assert_consistent(&registry);
    }

    #[test]
    fn test_join_unknown_endpoint_or_segment() {
        let mut registry = OverlayRegistry::new();
        registry.add_segment(vni(100), "V100");
        registry.add_endpoint(TunnelEndpoint::new("vtep1", "L1"));

        assert_eq!(
            registry.join(&"ghost".into(), vni(100)),
            Err(OverlayError::UnknownEndpoint("ghost".into()))
        );
        assert_eq!(
            registry.join(&"vtep1".into(), vni(7)),
            Err(OverlayError::UnknownSegment(vni(7)))
        );
    }

    #[test]
    fn test_remove_segment_drops_memberships() {
        let mut registry = OverlayRegistry::new();
        registry.attach_endpoint(TunnelEndpoint::new("a", "L1"), &[vni(100), vni(200)]);
        registry.attach_endpoint(TunnelEndpoint::new("b", "L2"), &[vni(100)]);

        let removed = registry.remove_segment(vni(100)).unwrap();
        assert_eq!(removed.members.len(), 2);
        assert_eq!(registry.segments_of(&"a".into()), vec![vni(200)]);
        assert!(registry.segments_of(&"b".into()).is_empty());
        assert!(registry.endpoint(&"b".into()).is_some());
        assert_consistent(&registry);
    }

    #[test]
    fn test_remove_endpoint_drops_memberships() {
        let mut registry = OverlayRegistry::new();
        registry.attach_endpoint(TunnelEndpoint::new("a", "L1"), &[vni(100), vni(200)]);
        registry.attach_endpoint(TunnelEndpoint::new("b", "L2"), &[vni(100)]);

        registry.remove_endpoint(&"a".into()).unwrap();
        let members: Vec<&str> = registry.members(vni(100)).iter().map(|e| e.id.as_str()).collect();
        assert_eq!(members, vec!["b"]);
        assert!(registry.members(vni(200)).is_empty());
        assert_consistent(&registry);
    }

    #[test]
    fn test_attach_creates_segments_and_updates_endpoint() {
        let mut registry = OverlayRegistry::new();
        registry.add_segment(vni(100), "customers-A");
        registry.attach_endpoint(
            TunnelEndpoint::new("L1", "L1").with_ip(Ipv4Addr::new(10, 0, 0, 3)),
            &[vni(100), vni(200)],
        );

        assert_eq!(registry.segment(vni(100)).unwrap().name, "customers-A");
        assert_eq!(registry.segment(vni(200)).unwrap().name, "VNI-200");

        // Re-attaching moves the endpoint but keeps its memberships.
        registry.attach_endpoint(
            TunnelEndpoint::new("L1", "L2").with_ip(Ipv4Addr::new(10, 0, 0, 4)),
            &[],
        );
        let endpoint = registry.endpoint(&"L1".into()).unwrap();
        assert_eq!(endpoint.router, NodeId::from("L2"));
        assert_eq!(endpoint.ip, Some(Ipv4Addr::new(10, 0, 0, 4)));
        assert_eq!(registry.segments_of(&"L1".into()), vec![vni(100), vni(200)]);
        assert_consistent(&registry);
    }

    #[test]
    fn test_leave_and_pairs() {
        let mut registry = OverlayRegistry::new();
        for (id, router) in [("c", "L3"), ("a", "L1"), ("b", "L2")] {
            registry.attach_endpoint(TunnelEndpoint::new(id, router), &[vni(100)]);
        }

        let pairs: Vec<(&str, &str)> = registry
            .pairs(vni(100))
            .into_iter()
            .map(|(x, y)| (x.id.as_str(), y.id.as_str()))
            .collect();
        assert_eq!(pairs, vec![("a", "b"), ("a", "c"), ("b", "c")]);

        assert_eq!(registry.leave(&"b".into(), vni(100)), Ok(true));
        assert_eq!(registry.leave(&"b".into(), vni(100)), Ok(false));
        assert_eq!(registry.pairs(vni(100)).len(), 1);
        assert_consistent(&registry);
    }

    #[test]
    fn test_single_member_has_no_pairs() {
        let mut registry = OverlayRegistry::new();
        registry.attach_endpoint(TunnelEndpoint::new("a", "L1"), &[vni(200)]);
        assert!(registry.pairs(vni(200)).is_empty());
        assert!(registry.pairs(vni(999)).is_empty());
    }
}

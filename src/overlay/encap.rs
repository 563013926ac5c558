use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::overlay::{
    registry::{OverlayError, SegmentId},
    tunnel::Tunnel,
};

pub const VXLAN_UDP_PORT: u16 = 4789;

/// "I" flag, the VNI field is valid.
const FLAG_VNI_VALID: u8 = 0x08;

/// The 8 byte VXLAN header (RFC 7348).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VxlanHeader {
    pub flags: u8,
    pub segment: SegmentId,
}

impl VxlanHeader {
    pub const LEN: usize = 8;

    pub fn new(segment: SegmentId) -> Self {
        Self {
            flags: FLAG_VNI_VALID,
            segment,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let vni = self.segment.vni().to_be_bytes();
        [self.flags, 0, 0, 0, vni[1], vni[2], vni[3], 0]
    }

    pub fn from_bytes(bytes: &[u8; Self::LEN]) -> Result<Self, OverlayError> {
        let vni = u32::from_be_bytes([0, bytes[4], bytes[5], bytes[6]]);
        Ok(Self {
            flags: bytes[0],
            segment: SegmentId::new(vni)?,
        })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

/// Illustrative outer headers of one tunnel, as shown by the CLI and the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncapsulationSample {
    pub segment: SegmentId,
    pub outer_source_ip: Option<Ipv4Addr>,
    pub outer_destination_ip: Option<Ipv4Addr>,
    pub udp_port: u16,
    pub header_hex: String,
    pub summary: String,
}

impl EncapsulationSample {
    /// `source_ip` and `destination_ip` are the VTEP addresses of the two endpoint routers when
    /// known.
    pub fn for_tunnel(
        tunnel: &Tunnel,
        source_ip: Option<Ipv4Addr>,
        destination_ip: Option<Ipv4Addr>,
    ) -> Self {
        let header = VxlanHeader::new(tunnel.segment);
        let show = |ip: Option<Ipv4Addr>, router: &dyn std::fmt::Display| match ip {
            Some(ip) => ip.to_string(),
            None => router.to_string(),
        };
        let summary = format!(
            "{} -> {} UDP/{} VNI {}",
            show(source_ip, &tunnel.source_router),
            show(destination_ip, &tunnel.destination_router),
            VXLAN_UDP_PORT,
            tunnel.segment
        );
        Self {
            segment: tunnel.segment,
            outer_source_ip: source_ip,
            outer_destination_ip: destination_ip,
            udp_port: VXLAN_UDP_PORT,
            header_hex: header.to_hex(),
            summary,
        }
    }
}

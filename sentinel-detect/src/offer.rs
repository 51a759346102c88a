//! Captured offers

use sentinel_core::{Error, MacAddr, Packet, Result};
use sentinel_dhcp::frame::udp_payload;
use sentinel_dhcp::DhcpPacket;
use std::fmt;
use std::net::Ipv4Addr;
use tokio::time::Instant;

/// One offer frame with its link-layer source
#[derive(Debug, Clone)]
pub struct ObservedOffer {
    pub source: MacAddr,
    pub observed_at: Instant,
    pub raw: Vec<u8>,
}

impl ObservedOffer {
    /// Fails with [`Error::FrameAnomaly`] when the frame carries no Ethernet
    /// source address
    pub fn from_packet(packet: Packet, observed_at: Instant) -> Result<Self> {
        let source = packet.source_mac().ok_or_else(|| {
            Error::FrameAnomaly(format!(
                "{}-byte {:?} frame on {} has no Ethernet source address",
                packet.data.len(),
                packet.link_type,
                packet.interface
            ))
        })?;
        Ok(Self {
            source,
            observed_at,
            raw: packet.data,
        })
    }

    /// Best-effort decode of the DHCP payload, for logging
    ///
    /// `None` unless the payload decodes as a DHCPOFFER.
    pub fn details(&self) -> Option<OfferDetails> {
        let dhcp = DhcpPacket::parse(udp_payload(&self.raw)?)
            .ok()
            .filter(DhcpPacket::is_offer)?;
        Some(OfferDetails {
            xid: dhcp.xid,
            offered: dhcp.yiaddr,
            server_id: dhcp.server_id(),
        })
    }
}

/// Fields of interest from a decoded offer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferDetails {
    pub xid: u32,
    pub offered: Ipv4Addr,
    pub server_id: Option<Ipv4Addr>,
}

impl fmt::Display for OfferDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "xid {:#010x} offers {}", self.xid, self.offered)?;
        if let Some(server) = self.server_id {
            write!(f, " (server id {})", server)?;
        }
        Ok(())
    }
}

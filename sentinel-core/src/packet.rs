//! Packet types

use std::time::SystemTime;

use crate::types::protocol_constants::ETHERNET_HEADER_LEN;
use crate::MacAddr;

/// Datalink type of the capture handle a packet came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    /// DLT_EN10MB
    Ethernet,
    /// Anything else (Linux cooked capture, raw IP, ...)
    Other(i32),
}

impl LinkType {
    /// pcap DLT value for Ethernet
    pub const DLT_EN10MB: i32 = 1;

    pub fn from_dlt(dlt: i32) -> Self {
        if dlt == Self::DLT_EN10MB {
            LinkType::Ethernet
        } else {
            LinkType::Other(dlt)
        }
    }
}

/// A captured frame
#[derive(Debug, Clone)]
pub struct Packet {
    /// When the packet was captured
    pub timestamp: SystemTime,
    /// Interface the packet was received on
    pub interface: String,
    /// Datalink of the capture
    pub link_type: LinkType,
    /// Packet data (including all headers)
    pub data: Vec<u8>,
    /// Length on the wire (may differ from data.len() if truncated by snaplen)
    pub len: usize,
}

impl Packet {
    /// Create a new Ethernet packet
    pub fn new(interface: String, data: Vec<u8>) -> Self {
        Self::with_link_type(interface, LinkType::Ethernet, data)
    }

    pub fn with_link_type(interface: String, link_type: LinkType, data: Vec<u8>) -> Self {
        let len = data.len();
        Self {
            timestamp: SystemTime::now(),
            interface,
            link_type,
            data,
            len,
        }
    }

    /// Get packet data as slice
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get packet length
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if packet is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Source hardware address from the Ethernet header
    ///
    /// Returns `None` when the capture is not Ethernet or the frame is too
    /// short to hold a full Ethernet header.
    pub fn source_mac(&self) -> Option<MacAddr> {
        if self.link_type != LinkType::Ethernet || self.data.len() < ETHERNET_HEADER_LEN {
            return None;
        }
        MacAddr::from_slice(&self.data[6..12])
    }
}

//! Common types used throughout dhcp-sentinel

use std::fmt;
use std::str::FromStr;

/// MAC Address (6 bytes)
///
/// Equality is byte equality, so two addresses parsed from strings that
/// differ only in letter case compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// Create a new MAC address
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Broadcast MAC address (ff:ff:ff:ff:ff:ff)
    pub const fn broadcast() -> Self {
        Self([0xff; 6])
    }

    /// Zero MAC address (00:00:00:00:00:00)
    pub const fn zero() -> Self {
        Self([0x00; 6])
    }

    /// Build from a slice, which must be exactly 6 bytes long
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let bytes: [u8; 6] = slice.try_into().ok()?;
        Some(Self(bytes))
    }

    /// Get bytes as slice
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert to array
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0x00; 6]
    }

    /// Group bit set (includes broadcast)
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 == 0x01
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddr {
    type Err = crate::Error;

    /// Accepts `aa:bb:cc:dd:ee:ff` or `aa-bb-cc-dd-ee-ff`, in any case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let separator = if s.contains('-') { '-' } else { ':' };
        let parts: Vec<&str> = s.trim().split(separator).collect();
        if parts.len() != 6 {
            return Err(crate::Error::configuration(format!(
                "Invalid MAC address '{}': expected 6 octets",
                s
            )));
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            if part.len() != 2 {
                return Err(crate::Error::configuration(format!(
                    "Invalid MAC address '{}': octet '{}'",
                    s, part
                )));
            }
            bytes[i] = u8::from_str_radix(part, 16).map_err(|_| {
                crate::Error::configuration(format!("Invalid MAC address '{}': octet '{}'", s, part))
            })?;
        }

        Ok(MacAddr(bytes))
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(bytes: [u8; 6]) -> Self {
        MacAddr(bytes)
    }
}

/// Ethertype constants
pub mod ethertypes {
    pub const IPV4: u16 = 0x0800;
}

/// Protocol-specific constants
pub mod protocol_constants {
    /// Ethernet II header: dst(6) + src(6) + ethertype(2)
    pub const ETHERNET_HEADER_LEN: usize = 14;

    /// DHCP ports
    pub const DHCP_SERVER_PORT: u16 = 67;
    pub const DHCP_CLIENT_PORT: u16 = 68;

    /// IP protocol number for UDP
    pub const IP_PROTO_UDP: u8 = 17;
}

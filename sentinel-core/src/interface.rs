//! Network interface types

use crate::{Error, MacAddr};
use pnet_datalink::NetworkInterface;
use std::fmt;

/// Network interface
#[derive(Debug, Clone)]
pub struct Interface {
    /// Interface name (e.g., "eth0", "en0")
    pub name: String,
    /// Interface index
    pub index: u32,
    /// MAC address
    pub mac_address: MacAddr,
    /// Is interface up?
    pub is_up: bool,
    /// Is interface a loopback?
    pub is_loopback: bool,
}

impl Interface {
    /// Create a new interface
    pub fn new(name: String, index: u32, mac_address: MacAddr) -> Self {
        Self {
            name,
            index,
            mac_address,
            is_up: true,
            is_loopback: false,
        }
    }

    /// Get interface by name
    pub fn by_name(name: &str) -> Result<Self, Error> {
        pnet_datalink::interfaces()
            .iter()
            .find(|i| i.name == name)
            .map(Self::from)
            .ok_or_else(|| Error::InterfaceNotFound(name.to_string()))
    }

    /// List all available interfaces
    pub fn list_all() -> Vec<Self> {
        pnet_datalink::interfaces().iter().map(Self::from).collect()
    }

    /// Interfaces that can be monitored: up, not loopback, with a hardware address
    pub fn list_capture_capable() -> Vec<Self> {
        Self::list_all()
            .into_iter()
            .filter(|iface| iface.is_capture_capable())
            .collect()
    }

    pub fn is_capture_capable(&self) -> bool {
        self.is_up && !self.is_loopback && !self.mac_address.is_zero()
    }

    /// The pnet view of this interface, re-read from the system
    pub fn datalink(&self) -> Result<NetworkInterface, Error> {
        pnet_datalink::interfaces()
            .into_iter()
            .find(|iface| iface.name == self.name)
            .ok_or_else(|| Error::InterfaceNotFound(self.name.clone()))
    }
}

impl From<&NetworkInterface> for Interface {
    fn from(iface: &NetworkInterface) -> Self {
        let mac_address = iface
            .mac
            .map(|mac| MacAddr([mac.0, mac.1, mac.2, mac.3, mac.4, mac.5]))
            .unwrap_or_else(MacAddr::zero);

        Self {
            name: iface.name.clone(),
            index: iface.index,
            mac_address,
            is_up: iface.is_up(),
            is_loopback: iface.is_loopback(),
        }
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.mac_address)
    }
}

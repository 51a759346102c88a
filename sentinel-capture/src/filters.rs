//! BPF (Berkeley Packet Filter) filter builders
//!
//! The offer filter is compiled by pcap and evaluated in the kernel, so
//! user space only ever sees candidate DHCP offers.

use sentinel_core::types::protocol_constants::DHCP_CLIENT_PORT;
use sentinel_core::MacAddr;

/// DHCP offers travelling to the client port
///
/// `udp[8:1]` is the first byte of the DHCP payload in a standard-layout
/// packet; offers carry 0x02 there.
pub fn dhcp_offer_filter() -> String {
    format!(
        "udp and {} and (udp[8:1] = 0x02)",
        port_filter(DHCP_CLIENT_PORT)
    )
}

/// DHCP offers not sent by `trusted`
pub fn dhcp_offer_filter_excluding(trusted: &MacAddr) -> String {
    format!(
        "{} and {}",
        dhcp_offer_filter(),
        not_filter(&src_mac_filter(trusted))
    )
}

/// Filter for a specific port (source or destination)
pub fn port_filter(port: u16) -> String {
    format!("port {}", port)
}

/// Filter for a specific source MAC address
pub fn src_mac_filter(mac: &MacAddr) -> String {
    format!("ether src {}", mac)
}

/// Negate a primitive filter
pub fn not_filter(filter: &str) -> String {
    format!("not {}", filter)
}

//! Link-layer framing for DHCP client broadcasts

use bytes::{BufMut, BytesMut};
use sentinel_core::types::ethertypes;
use sentinel_core::types::protocol_constants::{
    DHCP_CLIENT_PORT, DHCP_SERVER_PORT, ETHERNET_HEADER_LEN, IP_PROTO_UDP,
};
use sentinel_core::{Error, MacAddr, Result};
use std::net::Ipv4Addr;

const IPV4_HEADER_LEN: usize = 20;
const UDP_HEADER_LEN: usize = 8;
const DEFAULT_TTL: u8 = 64;

/// Wrap a DHCP payload from a client without an address
///
/// Ethernet `mac` → broadcast, IPv4 0.0.0.0 → 255.255.255.255, UDP 68 → 67.
/// The UDP checksum is left at zero, which IPv4 permits.
pub fn discover_frame(mac: MacAddr, payload: &[u8]) -> Result<Vec<u8>> {
    let udp_len = u16::try_from(UDP_HEADER_LEN + payload.len())
        .ok()
        .filter(|len| (*len as usize) + IPV4_HEADER_LEN <= u16::MAX as usize)
        .ok_or_else(|| {
            Error::PacketConstruction(format!("DHCP payload too large: {} bytes", payload.len()))
        })?;
    let ip_len = IPV4_HEADER_LEN as u16 + udp_len;

    let mut frame = BytesMut::with_capacity(ETHERNET_HEADER_LEN + ip_len as usize);

    // Ethernet
    frame.put_slice(MacAddr::broadcast().as_bytes());
    frame.put_slice(mac.as_bytes());
    frame.put_u16(ethertypes::IPV4);

    // IPv4, no options
    frame.put_u8(0x45);
    frame.put_u8(0x00);
    frame.put_u16(ip_len);
    frame.put_u16(0); // identification
    frame.put_u16(0); // flags, fragment offset
    frame.put_u8(DEFAULT_TTL);
    frame.put_u8(IP_PROTO_UDP);
    frame.put_u16(0); // checksum, filled below
    frame.put_slice(&Ipv4Addr::UNSPECIFIED.octets());
    frame.put_slice(&Ipv4Addr::BROADCAST.octets());

    let ip_header = ETHERNET_HEADER_LEN..ETHERNET_HEADER_LEN + IPV4_HEADER_LEN;
    let checksum = internet_checksum(&frame[ip_header]);
    frame[ETHERNET_HEADER_LEN + 10..ETHERNET_HEADER_LEN + 12]
        .copy_from_slice(&checksum.to_be_bytes());

    // UDP
    frame.put_u16(DHCP_CLIENT_PORT);
    frame.put_u16(DHCP_SERVER_PORT);
    frame.put_u16(udp_len);
    frame.put_u16(0);

    frame.put_slice(payload);
    Ok(frame.to_vec())
}

/// UDP payload of an Ethernet/IPv4/UDP frame, honouring the IPv4 header length
pub fn udp_payload(frame: &[u8]) -> Option<&[u8]> {
    let ether_type = u16::from_be_bytes([*frame.get(12)?, *frame.get(13)?]);
    if ether_type != ethertypes::IPV4 {
        return None;
    }
    let ip = frame.get(ETHERNET_HEADER_LEN..)?;
    let ihl = ((*ip.first()? & 0x0f) as usize) * 4;
    if ihl < IPV4_HEADER_LEN || *ip.get(9)? != IP_PROTO_UDP {
        return None;
    }
    let udp = ip.get(ihl..)?;
    udp.get(UDP_HEADER_LEN..)
}

/// RFC 1071 one's-complement sum
pub fn internet_checksum(data: &[u8]) -> u16 {
    let mut chunks = data.chunks_exact(2);
    let mut sum: u32 = chunks
        .by_ref()
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]) as u32)
        .sum();
    if let [last] = chunks.remainder() {
        sum += (*last as u32) << 8;
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

//! DHCP support for dhcp-sentinel
//!
//! - [`packet`]: BOOTP/DHCP message codec (RFC 2131, RFC 2132)
//! - [`frame`]: Ethernet/IPv4/UDP framing of client broadcasts
//! - [`prober`]: periodic DISCOVER injection

pub mod frame;
pub mod packet;
pub mod prober;

pub use packet::{DhcpMessageType, DhcpOption, DhcpPacket};
pub use prober::{
    FrameSender, ProbeConfig, Prober, RawSender, DEFAULT_PROBE_INTERVAL, DEFAULT_WARMUP,
    MIN_PROBE_INTERVAL,
};

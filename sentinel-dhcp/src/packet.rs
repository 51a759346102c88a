//! DHCP message codec
//!
//! Only the options the sentinel emits or inspects get a typed variant;
//! everything else round-trips as [`DhcpOption::Unknown`].

use bytes::{BufMut, BytesMut};
use sentinel_core::{Error, MacAddr, Result};
use std::fmt;
use std::net::Ipv4Addr;

/// DHCP magic cookie value (0x63825363)
pub const DHCP_MAGIC_COOKIE: u32 = 0x63825363;

/// Broadcast flag value
pub const DHCP_BROADCAST_FLAG: u16 = 0x8000;

/// BOOTREQUEST opcode
pub const BOOTREQUEST: u8 = 1;

/// BOOTREPLY opcode
pub const BOOTREPLY: u8 = 2;

/// Ethernet hardware type
pub const HTYPE_ETHERNET: u8 = 1;

/// Ethernet hardware address length
pub const HLEN_ETHERNET: u8 = 6;

/// op..file, without the magic cookie
const FIXED_HEADER_LEN: usize = 236;

/// Smallest message relay agents and servers are required to accept (RFC 951)
pub const MIN_MESSAGE_LEN: usize = 300;

/// Subnet mask, router, domain name server, domain name
pub const DISCOVER_PARAMETERS: [u8; 4] = [1, 3, 6, 15];

const OPTION_PAD: u8 = 0;
const OPTION_END: u8 = 255;

/// DHCP Message Types (RFC 2132)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhcpMessageType {
    Discover = 1,
    Offer = 2,
    Request = 3,
    Decline = 4,
    Ack = 5,
    Nak = 6,
    Release = 7,
    Inform = 8,
}

impl DhcpMessageType {
    pub fn from_u8(value: u8) -> Option<Self> {
        use DhcpMessageType::*;
        [Discover, Offer, Request, Decline, Ack, Nak, Release, Inform]
            .into_iter()
            .find(|t| *t as u8 == value)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DhcpMessageType::Discover => "DISCOVER",
            DhcpMessageType::Offer => "OFFER",
            DhcpMessageType::Request => "REQUEST",
            DhcpMessageType::Decline => "DECLINE",
            DhcpMessageType::Ack => "ACK",
            DhcpMessageType::Nak => "NAK",
            DhcpMessageType::Release => "RELEASE",
            DhcpMessageType::Inform => "INFORM",
        }
    }
}

impl fmt::Display for DhcpMessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// DHCP Option
#[derive(Debug, Clone, PartialEq)]
pub enum DhcpOption {
    /// 51
    LeaseTime(u32),
    /// 53
    MessageType(DhcpMessageType),
    /// 54
    ServerId(Ipv4Addr),
    /// 55
    ParameterRequestList(Vec<u8>),
    /// 61: hardware type followed by the address
    ClientIdentifier(Vec<u8>),
    Unknown(u8, Vec<u8>),
}

impl DhcpOption {
    pub fn code(&self) -> u8 {
        match self {
            DhcpOption::LeaseTime(_) => 51,
            DhcpOption::MessageType(_) => 53,
            DhcpOption::ServerId(_) => 54,
            DhcpOption::ParameterRequestList(_) => 55,
            DhcpOption::ClientIdentifier(_) => 61,
            DhcpOption::Unknown(code, _) => *code,
        }
    }

    /// Client identifier for an Ethernet address
    pub fn client_identifier(mac: &MacAddr) -> Self {
        let mut id = Vec::with_capacity(7);
        id.push(HTYPE_ETHERNET);
        id.extend_from_slice(mac.as_bytes());
        DhcpOption::ClientIdentifier(id)
    }

    /// Decode one option body
    pub fn decode(code: u8, data: &[u8]) -> Result<Self> {
        let wrong_len = |name: &str, want: usize| {
            Error::PacketParsing(format!(
                "{} must be {} bytes, got {}",
                name,
                want,
                data.len()
            ))
        };

        match code {
            51 => {
                let bytes: [u8; 4] = data.try_into().map_err(|_| wrong_len("LeaseTime", 4))?;
                Ok(DhcpOption::LeaseTime(u32::from_be_bytes(bytes)))
            }
            53 => {
                let [value] = data else {
                    return Err(wrong_len("MessageType", 1));
                };
                DhcpMessageType::from_u8(*value)
                    .map(DhcpOption::MessageType)
                    .ok_or_else(|| Error::PacketParsing(format!("Invalid message type: {}", value)))
            }
            54 => {
                let bytes: [u8; 4] = data.try_into().map_err(|_| wrong_len("ServerId", 4))?;
                Ok(DhcpOption::ServerId(Ipv4Addr::from(bytes)))
            }
            55 => Ok(DhcpOption::ParameterRequestList(data.to_vec())),
            61 => Ok(DhcpOption::ClientIdentifier(data.to_vec())),
            _ => Ok(DhcpOption::Unknown(code, data.to_vec())),
        }
    }

    /// Append code, length and body to `buf`
    pub fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        let body: Vec<u8> = match self {
            DhcpOption::LeaseTime(secs) => secs.to_be_bytes().to_vec(),
            DhcpOption::MessageType(t) => vec![*t as u8],
            DhcpOption::ServerId(addr) => addr.octets().to_vec(),
            DhcpOption::ParameterRequestList(params) => params.clone(),
            DhcpOption::ClientIdentifier(id) => id.clone(),
            DhcpOption::Unknown(_, data) => data.clone(),
        };
        let len = u8::try_from(body.len()).map_err(|_| {
            Error::PacketConstruction(format!(
                "option {} body is {} bytes (max 255)",
                self.code(),
                body.len()
            ))
        })?;

        buf.put_u8(self.code());
        buf.put_u8(len);
        buf.put_slice(&body);
        Ok(())
    }
}

/// DHCP Packet structure (RFC 2131)
#[derive(Debug, Clone, PartialEq)]
pub struct DhcpPacket {
    /// 1 = BOOTREQUEST, 2 = BOOTREPLY
    pub op: u8,
    pub htype: u8,
    pub hlen: u8,
    pub hops: u8,
    /// Transaction ID
    pub xid: u32,
    pub secs: u16,
    /// Flags (broadcast bit)
    pub flags: u16,
    pub ciaddr: Ipv4Addr,
    /// Address offered to the client
    pub yiaddr: Ipv4Addr,
    pub siaddr: Ipv4Addr,
    pub giaddr: Ipv4Addr,
    /// Client hardware address (16 bytes, only the first hlen used)
    pub chaddr: [u8; 16],
    pub options: Vec<DhcpOption>,
}

impl DhcpPacket {
    /// An empty BOOTREQUEST for an Ethernet client
    pub fn new() -> Self {
        Self {
            op: BOOTREQUEST,
            htype: HTYPE_ETHERNET,
            hlen: HLEN_ETHERNET,
            hops: 0,
            xid: 0,
            secs: 0,
            flags: 0,
            ciaddr: Ipv4Addr::UNSPECIFIED,
            yiaddr: Ipv4Addr::UNSPECIFIED,
            siaddr: Ipv4Addr::UNSPECIFIED,
            giaddr: Ipv4Addr::UNSPECIFIED,
            chaddr: [0; 16],
            options: Vec::new(),
        }
    }

    /// A broadcast DISCOVER from `chaddr`
    pub fn new_discover(xid: u32, chaddr: MacAddr) -> Self {
        let mut packet = Self::new();
        packet.xid = xid;
        packet.flags = DHCP_BROADCAST_FLAG;
        packet.chaddr[..6].copy_from_slice(chaddr.as_bytes());
        packet.options = vec![
            DhcpOption::MessageType(DhcpMessageType::Discover),
            DhcpOption::client_identifier(&chaddr),
            DhcpOption::ParameterRequestList(DISCOVER_PARAMETERS.to_vec()),
        ];
        packet
    }

    /// Decode a DHCP message (UDP payload)
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < FIXED_HEADER_LEN + 4 {
            return Err(Error::PacketParsing(format!(
                "DHCP packet too short: {} bytes (minimum {})",
                data.len(),
                FIXED_HEADER_LEN + 4
            )));
        }

        let be_u16 = |at: usize| u16::from_be_bytes([data[at], data[at + 1]]);
        let addr = |at: usize| Ipv4Addr::new(data[at], data[at + 1], data[at + 2], data[at + 3]);

        let cookie = u32::from_be_bytes([data[236], data[237], data[238], data[239]]);
        if cookie != DHCP_MAGIC_COOKIE {
            return Err(Error::PacketParsing(format!(
                "bad magic cookie {:#010x}",
                cookie
            )));
        }

        let mut chaddr = [0u8; 16];
        chaddr.copy_from_slice(&data[28..44]);

        let mut options = Vec::new();
        let mut rest = &data[FIXED_HEADER_LEN + 4..];
        while let Some((&code, tail)) = rest.split_first() {
            match code {
                OPTION_PAD => {
                    rest = tail;
                    continue;
                }
                OPTION_END => break,
                _ => {}
            }
            let Some((&len, tail)) = tail.split_first() else {
                return Err(Error::PacketParsing(format!("option {} has no length", code)));
            };
            let len = len as usize;
            if tail.len() < len {
                return Err(Error::PacketParsing(format!(
                    "option {} length {} exceeds packet size",
                    code, len
                )));
            }
            options.push(DhcpOption::decode(code, &tail[..len])?);
            rest = &tail[len..];
        }

        Ok(Self {
            op: data[0],
            htype: data[1],
            hlen: data[2],
            hops: data[3],
            xid: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            secs: be_u16(8),
            flags: be_u16(10),
            ciaddr: addr(12),
            yiaddr: addr(16),
            siaddr: addr(20),
            giaddr: addr(24),
            chaddr,
            options,
        })
    }

    /// Encode into a UDP payload, zero-padded to [`MIN_MESSAGE_LEN`]
    pub fn build(&self) -> Result<Vec<u8>> {
        let mut buf = BytesMut::with_capacity(MIN_MESSAGE_LEN);

        buf.put_u8(self.op);
        buf.put_u8(self.htype);
        buf.put_u8(self.hlen);
        buf.put_u8(self.hops);
        buf.put_u32(self.xid);
        buf.put_u16(self.secs);
        buf.put_u16(self.flags);
        for addr in [self.ciaddr, self.yiaddr, self.siaddr, self.giaddr] {
            buf.put_slice(&addr.octets());
        }
        buf.put_slice(&self.chaddr);
        // sname and file
        buf.put_bytes(0, 64 + 128);
        buf.put_u32(DHCP_MAGIC_COOKIE);

        for option in &self.options {
            option.encode(&mut buf)?;
        }
        buf.put_u8(OPTION_END);

        if buf.len() < MIN_MESSAGE_LEN {
            let pad = MIN_MESSAGE_LEN - buf.len();
            buf.put_bytes(OPTION_PAD, pad);
        }

        Ok(buf.to_vec())
    }

    pub fn message_type(&self) -> Option<DhcpMessageType> {
        self.options.iter().find_map(|opt| match opt {
            DhcpOption::MessageType(t) => Some(*t),
            _ => None,
        })
    }

    /// Server identifier (option 54), present in offers
    pub fn server_id(&self) -> Option<Ipv4Addr> {
        self.options.iter().find_map(|opt| match opt {
            DhcpOption::ServerId(addr) => Some(*addr),
            _ => None,
        })
    }

    /// A BOOTREPLY carrying DHCPOFFER
    pub fn is_offer(&self) -> bool {
        self.op == BOOTREPLY && self.message_type() == Some(DhcpMessageType::Offer)
    }

    /// Client hardware address
    pub fn client_mac(&self) -> MacAddr {
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&self.chaddr[..6]);
        MacAddr(mac)
    }
}

impl Default for DhcpPacket {
    fn default() -> Self {
        Self::new()
    }
}

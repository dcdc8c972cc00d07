//! IPv4 Protocol Implementation
//!
//! Implements IPv4 header parsing and building, and next-hop selection.
//! Fragmentation is not supported; options on received packets are skipped.
//!
//! # References
//! - RFC 791: Internet Protocol (IPv4)
//! - RFC 1071: Computing the Internet Checksum

use alloc::vec::Vec;
use core::fmt;
use core::net::Ipv4Addr;

use crate::net::checksum::internet_checksum;
use crate::net::error::{DropReason, Layer};
use crate::net::wire;

/// IPv4 Protocol Numbers (IANA assigned)
pub mod protocol {
    pub const ICMP: u8 = 1;
    pub const TCP: u8 = 6;
    pub const UDP: u8 = 17;
}

/// Default TTL (Time To Live) value
pub const DEFAULT_TTL: u8 = 64;

/// Minimum IPv4 header size (without options)
pub const MIN_HEADER_SIZE: usize = 20;

/// Largest payload that fits one Ethernet frame
pub const MAX_PAYLOAD_SIZE: usize = 1500 - MIN_HEADER_SIZE;

/// IPv4 Header Structure
///
/// ```text
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |Version|  IHL  |Type of Service|          Total Length         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |         Identification        |Flags|      Fragment Offset    |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |  Time to Live |    Protocol   |         Header Checksum       |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                       Source Address                          |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                    Destination Address                        |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Header {
    /// Internet Header Length in 32-bit words (5-15)
    pub ihl: u8,
    pub tos: u8,
    /// Total packet length (header + data) in bytes
    pub total_length: u16,
    pub identification: u16,
    /// Flags (3 bits) + fragment offset (13 bits), as on the wire
    pub flags_fragment: u16,
    pub ttl: u8,
    /// Protocol number (ICMP=1, TCP=6, UDP=17)
    pub protocol: u8,
    pub checksum: u16,
    pub src_ip: Ipv4Addr,
    pub dest_ip: Ipv4Addr,
}

impl Ipv4Header {
    /// Header for an outgoing packet without options. The checksum is filled
    /// in by [`Ipv4Header::to_bytes`].
    pub fn new(
        src_ip: Ipv4Addr,
        dest_ip: Ipv4Addr,
        protocol: u8,
        payload_len: u16,
        ttl: u8,
        identification: u16,
    ) -> Self {
        Self {
            ihl: 5,
            tos: 0,
            total_length: MIN_HEADER_SIZE as u16 + payload_len,
            identification,
            flags_fragment: 0,
            ttl,
            protocol,
            checksum: 0,
            src_ip,
            dest_ip,
        }
    }

    /// Parse a header and return it with the payload.
    ///
    /// The payload runs from `IHL*4` to `total_length`, which strips any
    /// Ethernet padding behind the datagram. The header checksum is not
    /// checked here; see [`Ipv4Header::verify_checksum`].
    pub fn parse(data: &[u8]) -> Result<(Self, &[u8]), Ipv4Error> {
        if data.len() < MIN_HEADER_SIZE {
            return Err(Ipv4Error::PacketTooShort);
        }

        let version = data[0] >> 4;
        let ihl = data[0] & 0x0F;
        if version != 4 {
            return Err(Ipv4Error::InvalidVersion(version));
        }
        if ihl < 5 {
            return Err(Ipv4Error::InvalidIhl(ihl));
        }

        let header_len = (ihl as usize) * 4;
        let total_length = wire::read_u16(data, 2).ok_or(Ipv4Error::PacketTooShort)?;
        if (total_length as usize) < header_len || (total_length as usize) > data.len() {
            return Err(Ipv4Error::InvalidLength);
        }

        let header = Self {
            ihl,
            tos: data[1],
            total_length,
            identification: wire::read_u16(data, 4).ok_or(Ipv4Error::PacketTooShort)?,
            flags_fragment: wire::read_u16(data, 6).ok_or(Ipv4Error::PacketTooShort)?,
            ttl: data[8],
            protocol: data[9],
            checksum: wire::read_u16(data, 10).ok_or(Ipv4Error::PacketTooShort)?,
            src_ip: wire::read_ipv4(data, 12).ok_or(Ipv4Error::PacketTooShort)?,
            dest_ip: wire::read_ipv4(data, 16).ok_or(Ipv4Error::PacketTooShort)?,
        };

        Ok((header, &data[header_len..total_length as usize]))
    }

    /// Serialize the 20-byte header with a freshly computed checksum.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = alloc::vec![0u8; MIN_HEADER_SIZE];

        bytes[0] = 0x40 | 5;
        bytes[1] = self.tos;
        wire::write_u16(&mut bytes, 2, self.total_length);
        wire::write_u16(&mut bytes, 4, self.identification);
        wire::write_u16(&mut bytes, 6, self.flags_fragment);
        bytes[8] = self.ttl;
        bytes[9] = self.protocol;
        wire::write_ipv4(&mut bytes, 12, self.src_ip);
        wire::write_ipv4(&mut bytes, 16, self.dest_ip);

        let checksum = internet_checksum(&bytes);
        wire::write_u16(&mut bytes, 10, checksum);

        bytes
    }

    /// Check the header checksum of a raw packet (diagnostics only).
    pub fn verify_checksum(data: &[u8]) -> bool {
        let header_len = match data.first() {
            Some(b) => ((b & 0x0F) as usize) * 4,
            None => return false,
        };
        if header_len < MIN_HEADER_SIZE || data.len() < header_len {
            return false;
        }
        internet_checksum(&data[..header_len]) == 0
    }

    pub fn header_length(&self) -> usize {
        (self.ihl as usize) * 4
    }
}

/// Build a complete datagram: header followed by `payload`.
pub fn build_packet(header: &Ipv4Header, payload: &[u8]) -> Vec<u8> {
    let mut bytes = header.to_bytes();
    bytes.extend_from_slice(payload);
    bytes
}

/// Interface addressing: own address, subnet mask and default gateway.
///
/// Everything is 0.0.0.0 until DHCP or a static configuration fills it in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingConfig {
    pub own_ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Ipv4Addr,
}

impl RoutingConfig {
    pub const fn unconfigured() -> Self {
        Self {
            own_ip: Ipv4Addr::UNSPECIFIED,
            netmask: Ipv4Addr::UNSPECIFIED,
            gateway: Ipv4Addr::UNSPECIFIED,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.own_ip.is_unspecified()
    }

    /// Whether `dest_ip` shares our subnet under the current mask.
    pub fn is_local(&self, dest_ip: Ipv4Addr) -> bool {
        let mask = wire::ip_to_u32(self.netmask);
        (wire::ip_to_u32(dest_ip) & mask) == (wire::ip_to_u32(self.own_ip) & mask)
    }

    /// Pick the next hop for `dest_ip`.
    ///
    /// Off-subnet traffic goes to the gateway, but only once both a gateway
    /// and a netmask are known; otherwise the destination is tried directly.
    pub fn next_hop(&self, dest_ip: Ipv4Addr) -> Ipv4Addr {
        let routed = !self.gateway.is_unspecified() && !self.netmask.is_unspecified();
        if routed && !self.is_local(dest_ip) {
            self.gateway
        } else {
            dest_ip
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self::unconfigured()
    }
}

/// IPv4 Error Types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ipv4Error {
    /// Packet is too short to contain a valid header
    PacketTooShort,
    /// Invalid IP version (not 4)
    InvalidVersion(u8),
    /// Invalid IHL (Internet Header Length < 5)
    InvalidIhl(u8),
    /// Total length field disagrees with the header or the buffer
    InvalidLength,
}

impl fmt::Display for Ipv4Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ipv4Error::PacketTooShort => write!(f, "Packet too short"),
            Ipv4Error::InvalidVersion(v) => write!(f, "Invalid IP version: {}", v),
            Ipv4Error::InvalidIhl(ihl) => write!(f, "Invalid IHL: {}", ihl),
            Ipv4Error::InvalidLength => write!(f, "Invalid total length"),
        }
    }
}

impl From<Ipv4Error> for DropReason {
    fn from(_: Ipv4Error) -> Self {
        DropReason::Malformed(Layer::Ipv4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routing(ip: [u8; 4], mask: [u8; 4], gw: [u8; 4]) -> RoutingConfig {
        RoutingConfig {
            own_ip: Ipv4Addr::from(ip),
            netmask: Ipv4Addr::from(mask),
            gateway: Ipv4Addr::from(gw),
        }
    }

    #[test]
    fn test_header_checksum_verifies() {
        let header = Ipv4Header::new(
            Ipv4Addr::new(10, 0, 2, 15),
            Ipv4Addr::new(10, 0, 2, 2),
            protocol::ICMP,
            40,
            DEFAULT_TTL,
            7,
        );
        let bytes = header.to_bytes();

        assert_eq!(bytes[0], 0x45);
        assert_eq!(bytes[8], 64);
        assert_eq!(internet_checksum(&bytes), 0);
        assert!(Ipv4Header::verify_checksum(&bytes));
    }

    #[test]
    fn test_parse_trims_link_padding() {
        let header = Ipv4Header::new(
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 2),
            protocol::UDP,
            4,
            DEFAULT_TTL,
            0,
        );
        let mut bytes = build_packet(&header, &[1, 2, 3, 4]);
        bytes.extend_from_slice(&[0; 22]);

        let (parsed, payload) = Ipv4Header::parse(&bytes).unwrap();
        assert_eq!(parsed.protocol, protocol::UDP);
        assert_eq!(payload, &[1, 2, 3, 4]);
    }

    #[test]
    fn test_parse_rejects_bad_headers() {
        let mut bytes = Ipv4Header::new(
            Ipv4Addr::LOCALHOST,
            Ipv4Addr::LOCALHOST,
            protocol::TCP,
            0,
            DEFAULT_TTL,
            0,
        )
        .to_bytes();

        assert_eq!(Ipv4Header::parse(&bytes[..19]), Err(Ipv4Error::PacketTooShort));

        bytes[0] = 0x44;
        assert_eq!(Ipv4Header::parse(&bytes), Err(Ipv4Error::InvalidIhl(4)));

        bytes[0] = 0x45;
        bytes[3] = 200;
        assert_eq!(Ipv4Header::parse(&bytes), Err(Ipv4Error::InvalidLength));
    }

    #[test]
    fn test_next_hop_selection() {
        let config = routing([192, 168, 1, 10], [255, 255, 255, 0], [192, 168, 1, 1]);
        assert_eq!(config.next_hop(Ipv4Addr::new(192, 168, 1, 50)), Ipv4Addr::new(192, 168, 1, 50));
        assert_eq!(config.next_hop(Ipv4Addr::new(8, 8, 8, 8)), Ipv4Addr::new(192, 168, 1, 1));

        // no gateway: always direct
        let direct = routing([192, 168, 1, 10], [255, 255, 255, 0], [0, 0, 0, 0]);
        assert_eq!(direct.next_hop(Ipv4Addr::new(8, 8, 8, 8)), Ipv4Addr::new(8, 8, 8, 8));
    }
}

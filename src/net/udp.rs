//! UDP Protocol Implementation (RFC 768)
//!
//! Thin demultiplexer: datagrams are routed by destination port and the only
//! consumer is the DHCP client on port 68. Outgoing datagrams carry a zero
//! checksum, which IPv4 permits.

use alloc::vec::Vec;
use core::fmt;
use core::net::Ipv4Addr;

use crate::net::checksum::pseudo_header_checksum;
use crate::net::error::{DropReason, Layer};
use crate::net::ipv4::protocol;
use crate::net::wire;

/// Minimum UDP header size (8 bytes)
pub const UDP_HEADER_SIZE: usize = 8;

/// Well-known DHCP ports
pub const DHCP_SERVER_PORT: u16 = 67;
pub const DHCP_CLIENT_PORT: u16 = 68;

/// Errors that can occur during UDP parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UdpError {
    /// Packet is too short to contain a valid UDP header
    PacketTooShort,
    /// Length field doesn't match actual packet size
    InvalidLength,
}

impl fmt::Display for UdpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UdpError::PacketTooShort => write!(f, "UDP packet too short"),
            UdpError::InvalidLength => write!(f, "Invalid UDP length"),
        }
    }
}

impl From<UdpError> for DropReason {
    fn from(_: UdpError) -> Self {
        DropReason::Malformed(Layer::Udp)
    }
}

/// Borrowed view of a received datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpDatagram<'a> {
    pub src_port: u16,
    pub dest_port: u16,
    /// Checksum (optional for IPv4, can be 0)
    pub checksum: u16,
    pub data: &'a [u8],
}

impl<'a> UdpDatagram<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self, UdpError> {
        if bytes.len() < UDP_HEADER_SIZE {
            return Err(UdpError::PacketTooShort);
        }

        let length = wire::read_u16(bytes, 4).ok_or(UdpError::PacketTooShort)? as usize;
        if length < UDP_HEADER_SIZE || length > bytes.len() {
            return Err(UdpError::InvalidLength);
        }

        Ok(Self {
            src_port: wire::read_u16(bytes, 0).ok_or(UdpError::PacketTooShort)?,
            dest_port: wire::read_u16(bytes, 2).ok_or(UdpError::PacketTooShort)?,
            checksum: wire::read_u16(bytes, 6).ok_or(UdpError::PacketTooShort)?,
            data: &bytes[UDP_HEADER_SIZE..length],
        })
    }
}

/// Serialize a datagram with the checksum left at zero.
pub fn build_datagram(src_port: u16, dest_port: u16, data: &[u8]) -> Vec<u8> {
    let length = (UDP_HEADER_SIZE + data.len()) as u16;
    let mut bytes = Vec::with_capacity(length as usize);

    bytes.extend_from_slice(&src_port.to_be_bytes());
    bytes.extend_from_slice(&dest_port.to_be_bytes());
    bytes.extend_from_slice(&length.to_be_bytes());
    bytes.extend_from_slice(&[0, 0]);
    bytes.extend_from_slice(data);

    bytes
}

/// Check a raw datagram against the pseudo-header (diagnostics only).
///
/// A zero checksum means the sender did not compute one and is accepted.
pub fn verify_checksum(src_ip: Ipv4Addr, dest_ip: Ipv4Addr, raw: &[u8]) -> bool {
    match wire::read_u16(raw, 6) {
        Some(0) => true,
        Some(_) => pseudo_header_checksum(src_ip, dest_ip, protocol::UDP, raw) == 0,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_layout() {
        let bytes = build_datagram(DHCP_CLIENT_PORT, DHCP_SERVER_PORT, &[0xAA, 0xBB]);
        assert_eq!(bytes, [0, 68, 0, 67, 0, 10, 0, 0, 0xAA, 0xBB]);
    }

    #[test]
    fn test_parse_uses_length_field() {
        let mut bytes = build_datagram(1234, 68, &[1, 2, 3]);
        bytes.extend_from_slice(&[0; 5]);

        let datagram = UdpDatagram::parse(&bytes).unwrap();
        assert_eq!(datagram.src_port, 1234);
        assert_eq!(datagram.dest_port, 68);
        assert_eq!(datagram.data, &[1, 2, 3]);
    }

    #[test]
    fn test_parse_rejects_bad_length() {
        let mut bytes = build_datagram(1, 2, &[]);
        assert_eq!(UdpDatagram::parse(&bytes[..7]), Err(UdpError::PacketTooShort));
        bytes[5] = 20;
        assert_eq!(UdpDatagram::parse(&bytes), Err(UdpError::InvalidLength));
    }

    #[test]
    fn test_zero_checksum_accepted() {
        let bytes = build_datagram(1, 2, &[9]);
        assert!(verify_checksum(Ipv4Addr::LOCALHOST, Ipv4Addr::LOCALHOST, &bytes));
    }
}

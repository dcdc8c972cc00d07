//! Wire-format helpers shared by every protocol layer.
//!
//! All multi-byte header fields travel big-endian. Readers return `None` when
//! the buffer is too short so callers can turn that into a malformed-packet
//! drop instead of panicking on an out-of-range index.

use core::fmt;
use core::net::{Ipv4Addr, Ipv6Addr};

/// Ethernet hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// FF:FF:FF:FF:FF:FF
    pub const BROADCAST: MacAddr = MacAddr([0xFF; 6]);
    /// 00:00:00:00:00:00
    pub const ZERO: MacAddr = MacAddr([0; 6]);

    pub const fn new(octets: [u8; 6]) -> Self {
        MacAddr(octets)
    }

    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    pub fn is_multicast(&self) -> bool {
        (self.0[0] & 0x01) != 0 && !self.is_broadcast()
    }

    /// Read a MAC address at `offset`.
    pub fn read(buf: &[u8], offset: usize) -> Option<Self> {
        let bytes = buf.get(offset..offset + 6)?;
        let mut mac = [0u8; 6];
        mac.copy_from_slice(bytes);
        Some(MacAddr(mac))
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(octets: [u8; 6]) -> Self {
        MacAddr(octets)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

pub fn read_u8(buf: &[u8], offset: usize) -> Option<u8> {
    buf.get(offset).copied()
}

pub fn read_u16(buf: &[u8], offset: usize) -> Option<u16> {
    let bytes = buf.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

pub fn read_u32(buf: &[u8], offset: usize) -> Option<u32> {
    let bytes = buf.get(offset..offset + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

pub fn read_ipv4(buf: &[u8], offset: usize) -> Option<Ipv4Addr> {
    read_u32(buf, offset).map(Ipv4Addr::from)
}

pub fn read_ipv6(buf: &[u8], offset: usize) -> Option<Ipv6Addr> {
    let bytes = buf.get(offset..offset + 16)?;
    let mut octets = [0u8; 16];
    octets.copy_from_slice(bytes);
    Some(Ipv6Addr::from(octets))
}

/// Write a big-endian `u16` at `offset`. The caller sizes the buffer.
pub fn write_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
}

pub fn write_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

pub fn write_ipv4(buf: &mut [u8], offset: usize, addr: Ipv4Addr) {
    buf[offset..offset + 4].copy_from_slice(&addr.octets());
}

pub fn write_ipv6(buf: &mut [u8], offset: usize, addr: Ipv6Addr) {
    buf[offset..offset + 16].copy_from_slice(&addr.octets());
}

pub fn write_mac(buf: &mut [u8], offset: usize, mac: MacAddr) {
    buf[offset..offset + 6].copy_from_slice(&mac.0);
}

/// Network-order helpers for callers that hold the address as a `u32`.
pub fn ip_to_u32(addr: Ipv4Addr) -> u32 {
    u32::from(addr)
}

pub fn ip_from_u32(value: u32) -> Ipv4Addr {
    Ipv4Addr::from(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_big_endian_fields() {
        let mut buf = [0u8; 10];
        write_u16(&mut buf, 0, 0x0800);
        write_u32(&mut buf, 2, 0x6382_5363);
        write_ipv4(&mut buf, 6, Ipv4Addr::new(10, 0, 0, 1));

        assert_eq!(&buf[..2], &[0x08, 0x00]);
        assert_eq!(&buf[2..6], &[0x63, 0x82, 0x53, 0x63]);
        assert_eq!(read_u16(&buf, 0), Some(0x0800));
        assert_eq!(read_u32(&buf, 2), Some(0x6382_5363));
        assert_eq!(read_ipv4(&buf, 6), Some(Ipv4Addr::new(10, 0, 0, 1)));
    }

    #[test]
    fn test_short_reads_are_none() {
        let buf = [0u8; 3];
        assert_eq!(read_u32(&buf, 0), None);
        assert_eq!(read_u16(&buf, 2), None);
        assert_eq!(MacAddr::read(&buf, 0), None);
        assert_eq!(read_ipv6(&[0u8; 15], 0), None);
    }

    #[test]
    fn test_mac_display() {
        let mac = MacAddr([0x52, 0x54, 0x00, 0x12, 0x34, 0x56]);
        assert_eq!(std::format!("{}", mac), "52:54:00:12:34:56");
        assert!(MacAddr::BROADCAST.is_broadcast());
        assert!(!mac.is_multicast());
    }
}

//! Internet checksum (RFC 1071)
//!
//! One's complement of the one's complement sum of all 16-bit words, odd
//! trailing byte padded with zero. The same accumulator serves the IPv4
//! header, ICMP messages, TCP/UDP segments (with the pseudo-header) and
//! ICMPv6 (with the IPv6 pseudo-header).

use core::net::{Ipv4Addr, Ipv6Addr};

/// Running one's complement sum.
#[derive(Debug, Clone, Copy, Default)]
pub struct Checksum {
    sum: u32,
}

impl Checksum {
    pub const fn new() -> Self {
        Self { sum: 0 }
    }

    pub fn add_u16(&mut self, word: u16) -> &mut Self {
        self.sum += word as u32;
        self.fold();
        self
    }

    /// Add a byte run. An odd trailing byte is treated as the high half of a
    /// zero-padded word, so only the last run handed in may be odd.
    pub fn add_bytes(&mut self, data: &[u8]) -> &mut Self {
        for chunk in data.chunks(2) {
            let word = if chunk.len() == 2 {
                u16::from_be_bytes([chunk[0], chunk[1]])
            } else {
                u16::from_be_bytes([chunk[0], 0])
            };
            self.sum += word as u32;
        }
        self.fold();
        self
    }

    /// Add the IPv4 pseudo-header used by TCP and UDP.
    pub fn add_pseudo_header(
        &mut self,
        src: Ipv4Addr,
        dst: Ipv4Addr,
        protocol: u8,
        length: u16,
    ) -> &mut Self {
        self.add_bytes(&src.octets());
        self.add_bytes(&dst.octets());
        self.add_u16(protocol as u16);
        self.add_u16(length);
        self
    }

    /// Add the IPv6 pseudo-header (RFC 8200 section 8.1).
    pub fn add_pseudo_header_v6(
        &mut self,
        src: Ipv6Addr,
        dst: Ipv6Addr,
        next_header: u8,
        length: u32,
    ) -> &mut Self {
        self.add_bytes(&src.octets());
        self.add_bytes(&dst.octets());
        self.add_u16((length >> 16) as u16);
        self.add_u16(length as u16);
        self.add_u16(next_header as u16);
        self
    }

    fn fold(&mut self) {
        while self.sum >> 16 != 0 {
            self.sum = (self.sum & 0xFFFF) + (self.sum >> 16);
        }
    }

    /// Folded, complemented result ready to be written into a header.
    pub fn finish(&self) -> u16 {
        let mut sum = self.sum;
        while sum >> 16 != 0 {
            sum = (sum & 0xFFFF) + (sum >> 16);
        }
        !(sum as u16)
    }
}

/// Checksum of a plain byte run (IPv4 header, ICMP message).
pub fn internet_checksum(data: &[u8]) -> u16 {
    Checksum::new().add_bytes(data).finish()
}

/// Checksum of a transport segment including the pseudo-header.
pub fn pseudo_header_checksum(src: Ipv4Addr, dst: Ipv4Addr, protocol: u8, segment: &[u8]) -> u16 {
    Checksum::new()
        .add_pseudo_header(src, dst, protocol, segment.len() as u16)
        .add_bytes(segment)
        .finish()
}

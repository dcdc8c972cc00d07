//! IPv6 on the local link
//!
//! Just enough IPv6 to be visible to neighbours: an EUI-64 link-local
//! address, header parsing and building, and Neighbor Discovery (a
//! solicitation for one of our addresses is answered with an advertisement).
//! No extension headers, no routing, no transport over IPv6.
//!
//! # References
//! - RFC 8200: Internet Protocol, Version 6 (IPv6) Specification
//! - RFC 4291: IP Version 6 Addressing Architecture (appendix A, EUI-64)
//! - RFC 4861: Neighbor Discovery for IP version 6

use alloc::vec::Vec;
use core::fmt;
use core::net::Ipv6Addr;

use crate::net::checksum::Checksum;
use crate::net::error::{DropReason, Layer};
use crate::net::wire::{self, MacAddr};

/// Next Header values (IANA assigned)
pub mod next_header {
    pub const TCP: u8 = 6;
    pub const UDP: u8 = 17;
    pub const ICMPV6: u8 = 58;
}

/// ICMPv6 message types handled here
pub mod icmpv6 {
    pub const NEIGHBOR_SOLICITATION: u8 = 135;
    pub const NEIGHBOR_ADVERTISEMENT: u8 = 136;
}

/// Fixed header size; extension headers are not supported
pub const HEADER_SIZE: usize = 40;

pub const DEFAULT_HOP_LIMIT: u8 = 64;

/// Hop limit Neighbor Discovery messages are sent with and must arrive with
pub const ND_HOP_LIMIT: u8 = 255;

/// Advertisement with a target link-layer address option
pub const NEIGHBOR_ADVERTISEMENT_SIZE: usize = 32;

/// Solicited + Override
const NA_FLAGS: u8 = 0x60;

/// Target link-layer address option
const OPTION_TARGET_LL_ADDR: u8 = 2;

pub const NEIGHBOR_CACHE_SIZE: usize = 8;

/// IPv6 parsing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ipv6Error {
    /// Shorter than the 40-byte header
    PacketTooShort,
    InvalidVersion(u8),
    /// Payload length runs past the received data
    InvalidLength,
}

impl fmt::Display for Ipv6Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ipv6Error::PacketTooShort => write!(f, "Packet too short"),
            Ipv6Error::InvalidVersion(v) => write!(f, "Invalid IP version: {}", v),
            Ipv6Error::InvalidLength => write!(f, "Invalid payload length"),
        }
    }
}

impl From<Ipv6Error> for DropReason {
    fn from(_: Ipv6Error) -> Self {
        DropReason::Malformed(Layer::Ipv6)
    }
}

/// IPv6 fixed header
///
/// ```text
/// +-------+---------------+---------------------------------------+
/// |Version| Traffic Class |              Flow Label               |
/// +-------+---------------+-------+---------------+---------------+
/// |         Payload Length        |  Next Header  |   Hop Limit   |
/// +-------------------------------+---------------+---------------+
/// |                     Source Address (128 bits)                 |
/// +---------------------------------------------------------------+
/// |                  Destination Address (128 bits)               |
/// +---------------------------------------------------------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Header {
    pub traffic_class: u8,
    /// Low 20 bits only
    pub flow_label: u32,
    pub payload_length: u16,
    pub next_header: u8,
    pub hop_limit: u8,
    pub src: Ipv6Addr,
    pub dest: Ipv6Addr,
}

impl Ipv6Header {
    pub fn new(src: Ipv6Addr, dest: Ipv6Addr, next_header: u8, payload_len: u16, hop_limit: u8) -> Self {
        Self {
            traffic_class: 0,
            flow_label: 0,
            payload_length: payload_len,
            next_header,
            hop_limit,
            src,
            dest,
        }
    }

    /// Parse the fixed header and return it with the payload, Ethernet
    /// padding stripped.
    pub fn parse(data: &[u8]) -> Result<(Self, &[u8]), Ipv6Error> {
        if data.len() < HEADER_SIZE {
            return Err(Ipv6Error::PacketTooShort);
        }

        let first = wire::read_u32(data, 0).ok_or(Ipv6Error::PacketTooShort)?;
        let version = (first >> 28) as u8;
        if version != 6 {
            return Err(Ipv6Error::InvalidVersion(version));
        }

        let payload_length = wire::read_u16(data, 4).ok_or(Ipv6Error::PacketTooShort)?;
        let end = HEADER_SIZE + payload_length as usize;
        if end > data.len() {
            return Err(Ipv6Error::InvalidLength);
        }

        let header = Self {
            traffic_class: (first >> 20) as u8,
            flow_label: first & 0x000F_FFFF,
            payload_length,
            next_header: data[6],
            hop_limit: data[7],
            src: wire::read_ipv6(data, 8).ok_or(Ipv6Error::PacketTooShort)?,
            dest: wire::read_ipv6(data, 24).ok_or(Ipv6Error::PacketTooShort)?,
        };

        Ok((header, &data[HEADER_SIZE..end]))
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        let first = (6u32 << 28) | ((self.traffic_class as u32) << 20) | (self.flow_label & 0x000F_FFFF);
        wire::write_u32(&mut bytes, 0, first);
        wire::write_u16(&mut bytes, 4, self.payload_length);
        bytes[6] = self.next_header;
        bytes[7] = self.hop_limit;
        wire::write_ipv6(&mut bytes, 8, self.src);
        wire::write_ipv6(&mut bytes, 24, self.dest);
        bytes
    }
}

/// Header followed by `payload`.
pub fn build_packet(header: &Ipv6Header, payload: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(HEADER_SIZE + payload.len());
    packet.extend_from_slice(&header.to_bytes());
    packet.extend_from_slice(payload);
    packet
}

/// fe80::/64 with the interface identifier derived from `mac` (modified EUI-64).
pub fn link_local_from_mac(mac: MacAddr) -> Ipv6Addr {
    let m = mac.0;
    let mut octets = [0u8; 16];
    octets[0] = 0xfe;
    octets[1] = 0x80;
    octets[8] = m[0] ^ 0x02;
    octets[9] = m[1];
    octets[10] = m[2];
    octets[11] = 0xff;
    octets[12] = 0xfe;
    octets[13] = m[3];
    octets[14] = m[4];
    octets[15] = m[5];
    Ipv6Addr::from(octets)
}

/// Addresses assigned to the interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Addresses {
    pub link_local: Ipv6Addr,
    pub global: Option<Ipv6Addr>,
}

impl Ipv6Addresses {
    pub fn for_mac(mac: MacAddr) -> Self {
        Self {
            link_local: link_local_from_mac(mac),
            global: None,
        }
    }

    pub fn is_ours(&self, addr: Ipv6Addr) -> bool {
        addr == self.link_local || self.global == Some(addr)
    }

    /// Unicast to us, or any multicast group (solicitations go to the
    /// solicited-node group).
    pub fn accepts(&self, dest: Ipv6Addr) -> bool {
        self.is_ours(dest) || dest.is_multicast()
    }

    /// Source for outgoing packets: the global address once one is set.
    pub fn source(&self) -> Ipv6Addr {
        self.global.unwrap_or(self.link_local)
    }
}

/// ICMPv6 checksum over the IPv6 pseudo-header and `message`.
pub fn icmpv6_checksum(src: Ipv6Addr, dest: Ipv6Addr, message: &[u8]) -> u16 {
    Checksum::new()
        .add_pseudo_header_v6(src, dest, next_header::ICMPV6, message.len() as u32)
        .add_bytes(message)
        .finish()
}

/// True when the checksum field of `message` is correct.
pub fn verify_icmpv6_checksum(src: Ipv6Addr, dest: Ipv6Addr, message: &[u8]) -> bool {
    icmpv6_checksum(src, dest, message) == 0
}

/// Solicited advertisement of `target` at `our_mac`, checksummed for the
/// `src` -> `dest` header it will travel in.
pub fn build_neighbor_advertisement(
    src: Ipv6Addr,
    dest: Ipv6Addr,
    target: Ipv6Addr,
    our_mac: MacAddr,
) -> [u8; NEIGHBOR_ADVERTISEMENT_SIZE] {
    let mut message = [0u8; NEIGHBOR_ADVERTISEMENT_SIZE];
    message[0] = icmpv6::NEIGHBOR_ADVERTISEMENT;
    message[4] = NA_FLAGS;
    wire::write_ipv6(&mut message, 8, target);
    message[24] = OPTION_TARGET_LL_ADDR;
    message[25] = 1;
    wire::write_mac(&mut message, 26, our_mac);

    let checksum = icmpv6_checksum(src, dest, &message);
    wire::write_u16(&mut message, 2, checksum);
    message
}

/// What an ICMPv6 message asks of us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NdpAction {
    /// Answer with an advertisement of `target`
    Advertise { target: Ipv6Addr },
    /// Learned from, nothing to send
    Learned,
}

/// IPv6 -> MAC bindings learned from Neighbor Discovery.
///
/// Fixed capacity; once full, unknown neighbours are not added.
#[derive(Debug, Default)]
pub struct NeighborCache {
    entries: Vec<(Ipv6Addr, MacAddr)>,
}

impl NeighborCache {
    pub fn new() -> Self {
        Self {
            entries: Vec::with_capacity(NEIGHBOR_CACHE_SIZE),
        }
    }

    /// Update in place, or add while there is room. Returns false when the
    /// cache is full and `ip` was not already known.
    pub fn update(&mut self, ip: Ipv6Addr, mac: MacAddr) -> bool {
        if let Some(entry) = self.entries.iter_mut().find(|(addr, _)| *addr == ip) {
            entry.1 = mac;
            return true;
        }
        if self.entries.len() >= NEIGHBOR_CACHE_SIZE {
            log::debug!("[NDP] neighbor cache full, not caching {}", ip);
            return false;
        }
        self.entries.push((ip, mac));
        true
    }

    pub fn lookup(&self, ip: Ipv6Addr) -> Option<MacAddr> {
        self.entries
            .iter()
            .find(|(addr, _)| *addr == ip)
            .map(|(_, mac)| *mac)
    }

    pub fn entries(&self) -> &[(Ipv6Addr, MacAddr)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Process an ICMPv6 message from `src` that arrived in a frame from
    /// `src_mac`.
    ///
    /// A solicitation teaches us the solicitor; an advertisement teaches us
    /// its target. The checksum is not verified.
    pub fn handle_icmpv6(
        &mut self,
        addresses: &Ipv6Addresses,
        src: Ipv6Addr,
        src_mac: MacAddr,
        message: &[u8],
    ) -> Result<NdpAction, DropReason> {
        if message.len() < 4 {
            return Err(DropReason::Malformed(Layer::Icmpv6));
        }

        match message[0] {
            icmpv6::NEIGHBOR_SOLICITATION => {
                let target = wire::read_ipv6(message, 8).ok_or(DropReason::Malformed(Layer::Icmpv6))?;
                // duplicate address detection solicits from ::
                if !src.is_unspecified() {
                    self.update(src, src_mac);
                }
                if !addresses.is_ours(target) {
                    return Err(DropReason::NotForUs);
                }
                log::debug!("[NDP] {} asks for {}", src, target);
                Ok(NdpAction::Advertise { target })
            }
            icmpv6::NEIGHBOR_ADVERTISEMENT => {
                let target = wire::read_ipv6(message, 8).ok_or(DropReason::Malformed(Layer::Icmpv6))?;
                self.update(target, src_mac);
                log::debug!("[NDP] {} is at {}", target, src_mac);
                Ok(NdpAction::Learned)
            }
            other => {
                log::trace!("[ICMPv6] unhandled type {}", other);
                Err(DropReason::Ignored)
            }
        }
    }
}

//! ARP (Address Resolution Protocol) - RFC 826
//!
//! Maps IPv4 addresses to MAC addresses on local networks.
//! Packet format: [HW Type (2)][Proto Type (2)][HW Len (1)][Proto Len (1)]
//!                [Operation (2)][Sender MAC (6)][Sender IP (4)]
//!                [Target MAC (6)][Target IP (4)]

use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::fmt;
use core::net::Ipv4Addr;

use crate::net::error::{DropReason, Layer};
use crate::net::wire::{self, MacAddr};

/// ARP hardware type for Ethernet
pub const HW_TYPE_ETHERNET: u16 = 1;

/// ARP protocol type for IPv4
pub const PROTO_TYPE_IPV4: u16 = 0x0800;

/// ARP operation codes
pub const ARP_REQUEST: u16 = 1;
pub const ARP_REPLY: u16 = 2;

/// ARP packet size (fixed at 28 bytes)
pub const ARP_PACKET_SIZE: usize = 28;

/// Transmitted ARP payloads are zero-padded to the Ethernet minimum payload
pub const ARP_PADDED_SIZE: usize = 46;

/// Errors that can occur during ARP operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpError {
    /// Packet is too short to be valid
    PacketTooShort,
    /// Invalid hardware type (not Ethernet)
    InvalidHardwareType,
    /// Invalid protocol type (not IPv4)
    InvalidProtocolType,
    /// Invalid hardware or protocol address length
    InvalidAddressLength,
}

impl fmt::Display for ArpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArpError::PacketTooShort => write!(f, "Packet too short"),
            ArpError::InvalidHardwareType => write!(f, "Invalid hardware type"),
            ArpError::InvalidProtocolType => write!(f, "Invalid protocol type"),
            ArpError::InvalidAddressLength => write!(f, "Invalid address length"),
        }
    }
}

impl From<ArpError> for DropReason {
    fn from(_: ArpError) -> Self {
        DropReason::Malformed(Layer::Arp)
    }
}

/// ARP packet structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpPacket {
    /// Operation (1 = request, 2 = reply)
    pub operation: u16,
    pub sender_mac: MacAddr,
    pub sender_ip: Ipv4Addr,
    pub target_mac: MacAddr,
    pub target_ip: Ipv4Addr,
}

impl ArpPacket {
    /// Who-has `target_ip`, tell `sender_ip`.
    pub fn new_request(sender_mac: MacAddr, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Self {
        Self {
            operation: ARP_REQUEST,
            sender_mac,
            sender_ip,
            target_mac: MacAddr::ZERO, // Unknown, set to zeros
            target_ip,
        }
    }

    /// Answer a request from `target_mac`/`target_ip`.
    pub fn new_reply(
        sender_mac: MacAddr,
        sender_ip: Ipv4Addr,
        target_mac: MacAddr,
        target_ip: Ipv4Addr,
    ) -> Self {
        Self {
            operation: ARP_REPLY,
            sender_mac,
            sender_ip,
            target_mac,
            target_ip,
        }
    }

    /// Parse an ARP packet from raw bytes
    ///
    /// Trailing link padding is ignored.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ArpError> {
        if data.len() < ARP_PACKET_SIZE {
            return Err(ArpError::PacketTooShort);
        }

        if wire::read_u16(data, 0) != Some(HW_TYPE_ETHERNET) {
            return Err(ArpError::InvalidHardwareType);
        }
        if wire::read_u16(data, 2) != Some(PROTO_TYPE_IPV4) {
            return Err(ArpError::InvalidProtocolType);
        }
        if data[4] != 6 || data[5] != 4 {
            return Err(ArpError::InvalidAddressLength);
        }

        let operation = wire::read_u16(data, 6).ok_or(ArpError::PacketTooShort)?;

        Ok(Self {
            operation,
            sender_mac: MacAddr::read(data, 8).ok_or(ArpError::PacketTooShort)?,
            sender_ip: wire::read_ipv4(data, 14).ok_or(ArpError::PacketTooShort)?,
            target_mac: MacAddr::read(data, 18).ok_or(ArpError::PacketTooShort)?,
            target_ip: wire::read_ipv4(data, 24).ok_or(ArpError::PacketTooShort)?,
        })
    }

    /// Serialize, zero-padded to [`ARP_PADDED_SIZE`].
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = alloc::vec![0u8; ARP_PADDED_SIZE];

        wire::write_u16(&mut bytes, 0, HW_TYPE_ETHERNET);
        wire::write_u16(&mut bytes, 2, PROTO_TYPE_IPV4);
        bytes[4] = 6;
        bytes[5] = 4;
        wire::write_u16(&mut bytes, 6, self.operation);
        wire::write_mac(&mut bytes, 8, self.sender_mac);
        wire::write_ipv4(&mut bytes, 14, self.sender_ip);
        wire::write_mac(&mut bytes, 18, self.target_mac);
        wire::write_ipv4(&mut bytes, 24, self.target_ip);

        bytes
    }

    pub fn is_request(&self) -> bool {
        self.operation == ARP_REQUEST
    }

    pub fn is_reply(&self) -> bool {
        self.operation == ARP_REPLY
    }
}

/// Cached IP → MAC binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpEntry {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
}

/// Fixed-slot ARP cache.
///
/// Holds at most `slots` bindings; a new binding overwrites the oldest one.
/// With the default of one slot this is a "last resolved" cache. Entries never
/// expire and misses are not remembered.
#[derive(Debug, Clone)]
pub struct ArpCache {
    entries: VecDeque<ArpEntry>,
    slots: usize,
}

impl ArpCache {
    pub fn new(slots: usize) -> Self {
        let slots = slots.max(1);
        Self {
            entries: VecDeque::with_capacity(slots),
            slots,
        }
    }

    /// Add or update an entry, evicting the oldest when all slots are taken.
    pub fn insert(&mut self, ip: Ipv4Addr, mac: MacAddr) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.ip == ip) {
            entry.mac = mac;
            return;
        }
        if self.entries.len() >= self.slots {
            self.entries.pop_front();
        }
        self.entries.push_back(ArpEntry { ip, mac });
    }

    pub fn lookup(&self, ip: Ipv4Addr) -> Option<MacAddr> {
        self.entries.iter().find(|e| e.ip == ip).map(|e| e.mac)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.slots
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Snapshot of all entries, oldest first (for display)
    pub fn entries(&self) -> Vec<ArpEntry> {
        self.entries.iter().copied().collect()
    }

    /// Process a received ARP message.
    ///
    /// Any message targeting `our_ip` refreshes the cache with the sender's
    /// binding. Returns the reply to transmit when the message was a request
    /// for us.
    pub fn handle_packet(
        &mut self,
        packet: &ArpPacket,
        our_ip: Ipv4Addr,
        our_mac: MacAddr,
    ) -> Result<Option<ArpPacket>, DropReason> {
        if our_ip.is_unspecified() {
            return Err(DropReason::NotConfigured);
        }
        if packet.target_ip != our_ip {
            return Err(DropReason::NotForUs);
        }

        self.insert(packet.sender_ip, packet.sender_mac);
        log::debug!("[ARP] {} is at {}", packet.sender_ip, packet.sender_mac);

        if packet.is_request() {
            Ok(Some(ArpPacket::new_reply(
                our_mac,
                our_ip,
                packet.sender_mac,
                packet.sender_ip,
            )))
        } else {
            Ok(None)
        }
    }
}

impl Default for ArpCache {
    fn default() -> Self {
        Self::new(1)
    }
}

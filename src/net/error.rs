//! Ingress outcomes and egress errors
//!
//! Every receive path returns `Result<Delivered, DropReason>`. The policy is
//! fail-open-and-drop: a bad packet never panics or blocks, it is reported
//! back with the reason it was discarded.

use core::fmt;

use crate::drivers::net::TransmitError;
use crate::net::dhcp::DhcpEvent;
use crate::net::icmp::EchoReply;
use crate::net::socket::SocketHandle;

/// Protocol layer a malformed packet was rejected at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Ethernet,
    Arp,
    Ipv4,
    Ipv6,
    Icmp,
    Icmpv6,
    Udp,
    Dhcp,
    Tcp,
}

/// What consumed a received frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivered {
    /// ARP message processed; `replied` when we answered a request for us.
    Arp { replied: bool },
    EchoReply(EchoReply),
    Dhcp(DhcpEvent),
    /// Neighbor Discovery message processed; `replied` when we advertised
    /// one of our addresses.
    Neighbor { replied: bool },
    /// Segment applied to the connection behind this handle.
    Tcp(SocketHandle),
}

/// Why a received frame was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Too short for its header or structurally invalid
    Malformed(Layer),
    UnknownEtherType(u16),
    UnsupportedProtocol(u8),
    /// No local IP yet, nothing can be addressed to us
    NotConfigured,
    /// ARP traffic for somebody else
    NotForUs,
    /// UDP port with no consumer
    PortUnreachable(u16),
    /// DHCP reply carrying another client's hardware address
    ForeignHardwareAddress,
    /// DHCP reply without an address offer
    NoAddressOffered,
    /// Blocked by a firewall rule
    Filtered,
    /// No 4-tuple match and no SYN
    UnknownConnection,
    SynFlood,
    /// Connection table exhausted
    AllocationFailure,
    /// Parsed fine, nothing to do with it
    Ignored,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::Malformed(layer) => write!(f, "malformed {:?} packet", layer),
            DropReason::UnknownEtherType(t) => write!(f, "unknown EtherType 0x{:04X}", t),
            DropReason::UnsupportedProtocol(p) => write!(f, "unsupported upper-layer protocol {}", p),
            DropReason::NotConfigured => write!(f, "interface has no address"),
            DropReason::NotForUs => write!(f, "not addressed to us"),
            DropReason::PortUnreachable(port) => write!(f, "no listener on UDP port {}", port),
            DropReason::ForeignHardwareAddress => write!(f, "hardware address mismatch"),
            DropReason::NoAddressOffered => write!(f, "no address offered"),
            DropReason::Filtered => write!(f, "blocked by firewall"),
            DropReason::UnknownConnection => write!(f, "no matching connection"),
            DropReason::SynFlood => write!(f, "SYN flood threshold exceeded"),
            DropReason::AllocationFailure => write!(f, "connection table full"),
            DropReason::Ignored => write!(f, "ignored"),
        }
    }
}

/// Errors on the transmit path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxError {
    /// Payload does not fit a single Ethernet frame
    PayloadTooLarge,
    Device(TransmitError),
}

impl From<TransmitError> for TxError {
    fn from(err: TransmitError) -> Self {
        TxError::Device(err)
    }
}

impl fmt::Display for TxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxError::PayloadTooLarge => write!(f, "payload exceeds MTU"),
            TxError::Device(err) => write!(f, "device transmit failed: {:?}", err),
        }
    }
}

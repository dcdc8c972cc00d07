//! ICMP (Internet Control Message Protocol) Implementation
//! RFC 792 - https://www.rfc-editor.org/rfc/rfc792
//!
//! Echo request/reply (ping). Only replies are consumed on ingress; every
//! other message type is parsed and ignored.

use alloc::vec::Vec;
use core::fmt;
use core::net::Ipv4Addr;

use crate::net::checksum::internet_checksum;
use crate::net::config::PingConfig;
use crate::net::error::{DropReason, Layer};
use crate::net::wire;
use crate::task::{CancellationToken, RetryTimer};

/// Size of the alphabetic payload carried by our echo requests
pub const ECHO_PAYLOAD_SIZE: usize = 32;

/// ICMP message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpType {
    /// Echo Reply (Type 0)
    EchoReply,
    /// Destination Unreachable (Type 3)
    DestinationUnreachable,
    /// Echo Request (Type 8)
    EchoRequest,
    /// Time Exceeded (Type 11)
    TimeExceeded,
    Unknown(u8),
}

impl From<u8> for IcmpType {
    fn from(value: u8) -> Self {
        match value {
            0 => IcmpType::EchoReply,
            3 => IcmpType::DestinationUnreachable,
            8 => IcmpType::EchoRequest,
            11 => IcmpType::TimeExceeded,
            other => IcmpType::Unknown(other),
        }
    }
}

impl From<IcmpType> for u8 {
    fn from(icmp_type: IcmpType) -> Self {
        match icmp_type {
            IcmpType::EchoReply => 0,
            IcmpType::DestinationUnreachable => 3,
            IcmpType::EchoRequest => 8,
            IcmpType::TimeExceeded => 11,
            IcmpType::Unknown(val) => val,
        }
    }
}

impl fmt::Display for IcmpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IcmpType::EchoReply => write!(f, "Echo Reply"),
            IcmpType::DestinationUnreachable => write!(f, "Destination Unreachable"),
            IcmpType::EchoRequest => write!(f, "Echo Request"),
            IcmpType::TimeExceeded => write!(f, "Time Exceeded"),
            IcmpType::Unknown(val) => write!(f, "Unknown({})", val),
        }
    }
}

/// ICMP parsing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpError {
    /// Packet too short (minimum 8 bytes)
    PacketTooShort,
}

impl fmt::Display for IcmpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IcmpError::PacketTooShort => write!(f, "ICMP packet too short"),
        }
    }
}

impl From<IcmpError> for DropReason {
    fn from(_: IcmpError) -> Self {
        DropReason::Malformed(Layer::Icmp)
    }
}

/// ICMP packet structure
///
/// Format:
/// ```text
/// [Type (1)][Code (1)][Checksum (2)]
/// [Identifier (2)][Sequence (2)][Data (variable)]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcmpPacket {
    pub icmp_type: IcmpType,
    pub code: u8,
    /// Checksum as received; recomputed by `to_bytes`
    pub checksum: u16,
    pub identifier: u16,
    pub sequence: u16,
    pub data: Vec<u8>,
}

impl IcmpPacket {
    /// Minimum ICMP packet size (header only)
    pub const MIN_SIZE: usize = 8;

    /// Parse an ICMP message. The checksum is recorded, not verified.
    pub fn from_bytes(data: &[u8]) -> Result<Self, IcmpError> {
        if data.len() < Self::MIN_SIZE {
            return Err(IcmpError::PacketTooShort);
        }

        Ok(IcmpPacket {
            icmp_type: IcmpType::from(data[0]),
            code: data[1],
            checksum: wire::read_u16(data, 2).ok_or(IcmpError::PacketTooShort)?,
            identifier: wire::read_u16(data, 4).ok_or(IcmpError::PacketTooShort)?,
            sequence: wire::read_u16(data, 6).ok_or(IcmpError::PacketTooShort)?,
            data: data[Self::MIN_SIZE..].to_vec(),
        })
    }

    /// Convert ICMP packet to raw bytes
    ///
    /// Automatically calculates and sets the checksum.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::MIN_SIZE + self.data.len());

        bytes.push(self.icmp_type.into());
        bytes.push(self.code);
        bytes.extend_from_slice(&[0, 0]);
        bytes.extend_from_slice(&self.identifier.to_be_bytes());
        bytes.extend_from_slice(&self.sequence.to_be_bytes());
        bytes.extend_from_slice(&self.data);

        let checksum = internet_checksum(&bytes);
        wire::write_u16(&mut bytes, 2, checksum);

        bytes
    }

    /// Echo request carrying `data`.
    pub fn new_echo_request(identifier: u16, sequence: u16, data: Vec<u8>) -> Self {
        IcmpPacket {
            icmp_type: IcmpType::EchoRequest,
            code: 0,
            checksum: 0,
            identifier,
            sequence,
            data,
        }
    }

    /// Check a raw message's checksum (diagnostics only).
    pub fn verify_checksum(raw: &[u8]) -> bool {
        raw.len() >= Self::MIN_SIZE && internet_checksum(raw) == 0
    }

    pub fn is_echo_reply(&self) -> bool {
        self.icmp_type == IcmpType::EchoReply
    }
}

impl fmt::Display for IcmpPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ICMP {} (code={}, id={}, seq={}, {} bytes data)",
            self.icmp_type,
            self.code,
            self.identifier,
            self.sequence,
            self.data.len()
        )
    }
}

/// Fixed ping payload: "abcdefghijklmnopqrstuvwxyzabcdef"
pub fn echo_payload() -> Vec<u8> {
    (0..ECHO_PAYLOAD_SIZE).map(|i| b'a' + (i % 26) as u8).collect()
}

/// A received echo reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoReply {
    pub from: Ipv4Addr,
    pub identifier: u16,
    pub sequence: u16,
    /// Echo data carried, header excluded
    pub bytes: usize,
}

/// Consume an ICMP message addressed to us.
pub fn handle_packet(src_ip: Ipv4Addr, data: &[u8]) -> Result<EchoReply, DropReason> {
    let packet = IcmpPacket::from_bytes(data)?;
    if !packet.is_echo_reply() {
        log::trace!("[ICMP] ignoring {} from {}", packet.icmp_type, src_ip);
        return Err(DropReason::Ignored);
    }

    log::info!(
        "Reply from {}: bytes={} seq={}",
        src_ip,
        packet.data.len(),
        packet.sequence
    );

    Ok(EchoReply {
        from: src_ip,
        identifier: packet.identifier,
        sequence: packet.sequence,
        bytes: packet.data.len(),
    })
}

/// Ping statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PingStats {
    pub transmitted: u16,
    pub received: u16,
    pub min_rtt_ms: u64,
    pub max_rtt_ms: u64,
    total_rtt_ms: u64,
}

impl PingStats {
    /// Calculate packet loss percentage
    pub fn packet_loss(&self) -> u32 {
        if self.transmitted == 0 {
            return 0;
        }
        let lost = self.transmitted.saturating_sub(self.received) as u32;
        lost * 100 / self.transmitted as u32
    }

    pub fn avg_rtt_ms(&self) -> u64 {
        if self.received == 0 {
            0
        } else {
            self.total_rtt_ms / self.received as u64
        }
    }

    fn add_measurement(&mut self, rtt_ms: u64) {
        if self.received == 0 || rtt_ms < self.min_rtt_ms {
            self.min_rtt_ms = rtt_ms;
        }
        if rtt_ms > self.max_rtt_ms {
            self.max_rtt_ms = rtt_ms;
        }
        self.total_rtt_ms += rtt_ms;
        self.received += 1;
    }
}

impl fmt::Display for PingStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} packets transmitted, {} received, {}% packet loss, rtt min/avg/max = {}/{}/{} ms",
            self.transmitted,
            self.received,
            self.packet_loss(),
            self.min_rtt_ms,
            self.avg_rtt_ms(),
            self.max_rtt_ms
        )
    }
}

/// Tick-driven ping: `count` echo requests `interval_ms` apart with sequence
/// numbers starting at 1.
#[derive(Debug, Clone)]
pub struct PingSession {
    target: Ipv4Addr,
    identifier: u16,
    count: u16,
    timer: RetryTimer,
    last_sent_at: u64,
    token: CancellationToken,
    stats: PingStats,
}

impl PingSession {
    pub fn new(target: Ipv4Addr, config: &PingConfig, token: CancellationToken) -> Self {
        Self {
            target,
            identifier: config.identifier,
            count: config.count,
            timer: RetryTimer::new(config.interval_ms, Some(config.count as u32)),
            last_sent_at: 0,
            token,
            stats: PingStats::default(),
        }
    }

    pub fn target(&self) -> Ipv4Addr {
        self.target
    }

    pub fn identifier(&self) -> u16 {
        self.identifier
    }

    pub fn stats(&self) -> PingStats {
        self.stats
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Sequence number of the next request if one is due at `now_ms`.
    ///
    /// The caller transmits it; the attempt is recorded either way so a
    /// failed send still counts as transmitted.
    pub fn next_due(&mut self, now_ms: u64) -> Option<u16> {
        if self.token.is_cancelled() || !self.timer.is_due(now_ms) {
            return None;
        }
        self.timer.record_attempt(now_ms);
        self.last_sent_at = now_ms;
        self.stats.transmitted += 1;
        Some(self.timer.attempts() as u16)
    }

    /// Account for a reply. Returns `false` if it belongs to another session.
    pub fn record_reply(&mut self, reply: &EchoReply, now_ms: u64) -> bool {
        if reply.identifier != self.identifier || reply.from != self.target {
            return false;
        }
        if self.stats.received >= self.stats.transmitted {
            return false;
        }
        self.stats.add_measurement(now_ms.saturating_sub(self.last_sent_at));
        true
    }

    /// Done once cancelled, or when every request went out and either all
    /// replies arrived or one more interval has passed.
    pub fn is_finished(&self, now_ms: u64) -> bool {
        if self.token.is_cancelled() {
            return true;
        }
        self.timer.is_exhausted()
            && (self.stats.received >= self.count || now_ms >= self.timer.next_deadline())
    }
}

//! TCP Protocol Implementation (RFC 793)
//!
//! Connection-oriented byte streams on top of IPv4.
//!
//! # Features
//! - Segment parsing and building with the pseudo-header checksum
//! - Passive and active open, FIN teardown
//! - Sliding send window bounded by the peer's advertised window
//! - Retransmission of unacknowledged segments driven by `tick`
//! - SYN flood guard on connection creation
//!
//! # Limitations
//! - No congestion control
//! - Segments are applied in arrival order; no out-of-order reassembly
//! - Ingress checksums are not verified
//! - No options support

use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::fmt;
use core::net::Ipv4Addr;

use crate::net::buffer::{BufferError, ByteRing};
use crate::net::checksum::pseudo_header_checksum;
use crate::net::config::TcpConfig;
use crate::net::error::{DropReason, Layer};
use crate::net::ipv4::protocol;
use crate::net::socket::{ConnectionTable, SocketHandle};
use crate::net::wire;

/// Minimum TCP header size (20 bytes, no options)
pub const TCP_HEADER_SIZE: usize = 20;

/// TCP Control Flags
pub mod flags {
    pub const FIN: u8 = 0x01; // Finish (no more data)
    pub const SYN: u8 = 0x02; // Synchronize sequence numbers
    pub const RST: u8 = 0x04; // Reset connection
    pub const PSH: u8 = 0x08; // Push function
    pub const ACK: u8 = 0x10; // Acknowledgment field significant
    pub const URG: u8 = 0x20; // Urgent pointer field significant
}

/// TCP Connection State (RFC 793)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcpState {
    /// Connection closed
    Closed,
    /// Waiting for connection request
    Listen,
    /// Sent SYN, waiting for SYN-ACK
    SynSent,
    /// Received SYN, sent SYN-ACK, waiting for ACK
    SynReceived,
    /// Connection established, data transfer
    Established,
    /// Sent FIN, waiting for ACK
    FinWait1,
    /// Received ACK of FIN, waiting for FIN
    FinWait2,
    /// Received FIN, waiting for the application to close
    CloseWait,
    /// Both sides sent FIN simultaneously
    Closing,
    /// Sent FIN after receiving FIN, waiting for ACK
    LastAck,
    /// Both FINs acknowledged
    TimeWait,
}

impl fmt::Display for TcpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TcpState::Closed => "CLOSED",
            TcpState::Listen => "LISTEN",
            TcpState::SynSent => "SYN_SENT",
            TcpState::SynReceived => "SYN_RECEIVED",
            TcpState::Established => "ESTABLISHED",
            TcpState::FinWait1 => "FIN_WAIT_1",
            TcpState::FinWait2 => "FIN_WAIT_2",
            TcpState::CloseWait => "CLOSE_WAIT",
            TcpState::Closing => "CLOSING",
            TcpState::LastAck => "LAST_ACK",
            TcpState::TimeWait => "TIME_WAIT",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during TCP operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcpError {
    /// Packet is too short to contain a valid TCP header
    PacketTooShort,
    /// Invalid data offset (header length)
    InvalidDataOffset,
    /// Operation needs an ESTABLISHED connection
    NotEstablished,
    /// Port already has a listener
    PortInUse,
    /// Connection table exhausted
    TableFull,
    /// Handle is stale or was never issued
    InvalidHandle,
}

impl fmt::Display for TcpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TcpError::PacketTooShort => write!(f, "TCP segment too short"),
            TcpError::InvalidDataOffset => write!(f, "Invalid TCP data offset"),
            TcpError::NotEstablished => write!(f, "connection not established"),
            TcpError::PortInUse => write!(f, "port already in use"),
            TcpError::TableFull => write!(f, "connection table full"),
            TcpError::InvalidHandle => write!(f, "invalid socket handle"),
        }
    }
}

/// Sequence-space `a <= b`.
fn seq_le(a: u32, b: u32) -> bool {
    (b.wrapping_sub(a) as i32) >= 0
}

/// Borrowed TCP segment, used for both parsing and building.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpSegment<'a> {
    pub src_port: u16,
    pub dest_port: u16,
    pub sequence: u32,
    pub acknowledgment: u32,
    pub flags: u8,
    pub window: u16,
    /// As received; recomputed by `build`
    pub checksum: u16,
    pub payload: &'a [u8],
}

impl<'a> TcpSegment<'a> {
    /// Parse a segment. Options are skipped and the checksum is not checked.
    pub fn parse(data: &'a [u8]) -> Result<Self, TcpError> {
        if data.len() < TCP_HEADER_SIZE {
            return Err(TcpError::PacketTooShort);
        }

        let data_offset = data[12] >> 4;
        if data_offset < 5 {
            return Err(TcpError::InvalidDataOffset);
        }
        let header_len = (data_offset as usize) * 4;
        if data.len() < header_len {
            return Err(TcpError::PacketTooShort);
        }

        Ok(TcpSegment {
            src_port: wire::read_u16(data, 0).ok_or(TcpError::PacketTooShort)?,
            dest_port: wire::read_u16(data, 2).ok_or(TcpError::PacketTooShort)?,
            sequence: wire::read_u32(data, 4).ok_or(TcpError::PacketTooShort)?,
            acknowledgment: wire::read_u32(data, 8).ok_or(TcpError::PacketTooShort)?,
            flags: data[13],
            window: wire::read_u16(data, 14).ok_or(TcpError::PacketTooShort)?,
            checksum: wire::read_u16(data, 16).ok_or(TcpError::PacketTooShort)?,
            payload: &data[header_len..],
        })
    }

    /// Serialize with a 20-byte header and the pseudo-header checksum.
    pub fn build(&self, src_addr: Ipv4Addr, dest_addr: Ipv4Addr) -> Vec<u8> {
        let mut packet = alloc::vec![0u8; TCP_HEADER_SIZE];

        wire::write_u16(&mut packet, 0, self.src_port);
        wire::write_u16(&mut packet, 2, self.dest_port);
        wire::write_u32(&mut packet, 4, self.sequence);
        wire::write_u32(&mut packet, 8, self.acknowledgment);
        packet[12] = ((TCP_HEADER_SIZE / 4) as u8) << 4;
        packet[13] = self.flags;
        wire::write_u16(&mut packet, 14, self.window);
        packet.extend_from_slice(self.payload);

        let checksum = pseudo_header_checksum(src_addr, dest_addr, protocol::TCP, &packet);
        wire::write_u16(&mut packet, 16, checksum);

        packet
    }

    pub fn has_flag(&self, flag: u8) -> bool {
        (self.flags & flag) != 0
    }

    /// Sequence space consumed: payload plus one each for SYN and FIN.
    pub fn sequence_len(&self) -> u32 {
        let mut len = self.payload.len() as u32;
        if self.has_flag(flags::SYN) {
            len += 1;
        }
        if self.has_flag(flags::FIN) {
            len += 1;
        }
        len
    }
}

/// Check a raw segment against the pseudo-header (diagnostics only).
pub fn verify_checksum(src_addr: Ipv4Addr, dest_addr: Ipv4Addr, raw: &[u8]) -> bool {
    raw.len() >= TCP_HEADER_SIZE
        && pseudo_header_checksum(src_addr, dest_addr, protocol::TCP, raw) == 0
}

/// TCP socket identifier (4-tuple)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TcpSocketId {
    pub local_addr: Ipv4Addr,
    pub local_port: u16,
    pub remote_addr: Ipv4Addr,
    pub remote_port: u16,
}

/// A built segment waiting to go out through IPv4.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingSegment {
    pub dest_ip: Ipv4Addr,
    pub bytes: Vec<u8>,
}

/// Sent segment that consumed sequence space and is not yet acknowledged.
#[derive(Debug, Clone)]
struct PendingSegment {
    /// Sequence number right after this segment
    end_seq: u32,
    bytes: Vec<u8>,
    sent_at: u64,
}

/// TCP Connection Control Block (TCB)
#[derive(Debug)]
pub struct TcpConnection {
    pub id: TcpSocketId,
    pub state: TcpState,
    /// Next sequence number we send
    pub seq_number: u32,
    /// Next sequence number we expect
    pub ack_number: u32,
    pub initial_seq: u32,
    /// Window we advertise
    pub advertised_window: u16,
    /// Next byte to send; advanced by `emit` as data goes out
    pub send_window_start: u32,
    /// Last byte we may send
    pub send_window_end: u32,
    /// Next expected byte
    pub recv_window_start: u32,
    /// Last byte the receive ring can take
    pub recv_window_end: u32,
    pub recv_buffer: ByteRing,
    pub last_ack_time: u64,
    pub rto: u64,
    pub retransmit_count: u8,
    pub syn_timestamp: u64,
    pub syn_cookie_enabled: bool,
    mss: u16,
    pending: VecDeque<PendingSegment>,
    accepted: bool,
}

impl TcpConnection {
    pub fn new(id: TcpSocketId, initial_seq: u32, config: &TcpConfig) -> Self {
        let window = config.default_window as u32;
        TcpConnection {
            id,
            state: TcpState::Closed,
            seq_number: initial_seq,
            ack_number: 0,
            initial_seq,
            advertised_window: config.default_window,
            send_window_start: initial_seq,
            send_window_end: initial_seq.wrapping_add(window),
            recv_window_start: 0,
            recv_window_end: window,
            recv_buffer: ByteRing::with_capacity(config.recv_buffer_size),
            last_ack_time: 0,
            rto: config.initial_rto_ms,
            retransmit_count: 0,
            syn_timestamp: 0,
            syn_cookie_enabled: true,
            mss: config.mss,
            pending: VecDeque::new(),
            accepted: false,
        }
    }

    /// Bytes waiting in the receive ring.
    pub fn recv_count(&self) -> usize {
        self.recv_buffer.len()
    }

    /// Room left in the send window.
    pub fn send_window(&self) -> u32 {
        self.send_window_end.wrapping_sub(self.send_window_start)
    }

    /// Segments sent but not yet acknowledged.
    pub fn unacknowledged(&self) -> usize {
        self.pending.len()
    }

    fn is_listener(&self) -> bool {
        self.state == TcpState::Listen && self.id.remote_port == 0
    }

    /// Build a segment from the current state and advance `seq_number` by the
    /// sequence space it consumes. Such segments are kept for retransmission.
    fn emit(&mut self, seg_flags: u8, payload: &[u8], now_ms: u64) -> OutgoingSegment {
        let segment = TcpSegment {
            src_port: self.id.local_port,
            dest_port: self.id.remote_port,
            sequence: self.seq_number,
            acknowledgment: self.ack_number,
            flags: seg_flags,
            window: self.advertised_window,
            checksum: 0,
            payload,
        };
        let bytes = segment.build(self.id.local_addr, self.id.remote_addr);

        let consumed = segment.sequence_len();
        if consumed > 0 {
            self.seq_number = self.seq_number.wrapping_add(consumed);
            if !payload.is_empty() && self.state == TcpState::Established {
                self.send_window_start = self.send_window_start.wrapping_add(payload.len() as u32);
            }
            self.pending.push_back(PendingSegment {
                end_seq: self.seq_number,
                bytes: bytes.clone(),
                sent_at: now_ms,
            });
        }

        OutgoingSegment {
            dest_ip: self.id.remote_addr,
            bytes,
        }
    }

    /// Retire acknowledged segments and, when established, slide the send
    /// window to `ack + window`.
    fn on_ack(&mut self, ack: u32, window: u16, now_ms: u64, config: &TcpConfig) {
        let before = self.pending.len();
        while self
            .pending
            .front()
            .is_some_and(|pending| seq_le(pending.end_seq, ack))
        {
            self.pending.pop_front();
        }
        if self.pending.len() != before {
            self.rto = config.initial_rto_ms;
            self.retransmit_count = 0;
            self.last_ack_time = now_ms;
        }

        if self.state == TcpState::Established {
            let end = ack.wrapping_add(window as u32);
            if seq_le(self.send_window_start, end) {
                self.send_window_end = end;
            }
        }
    }

    fn update_recv_window(&mut self) {
        self.recv_window_start = self.ack_number;
        self.recv_window_end = self
            .ack_number
            .wrapping_add(self.recv_buffer.free_space() as u32);
    }
}

/// Outcome of a retransmission check.
enum Retransmit {
    Idle,
    Resend(OutgoingSegment),
    Abort,
}

impl TcpConnection {
    fn retransmit_due(&mut self, now_ms: u64, config: &TcpConfig) -> Retransmit {
        let Some(oldest) = self.pending.front_mut() else {
            return Retransmit::Idle;
        };
        if now_ms.saturating_sub(oldest.sent_at) < self.rto {
            return Retransmit::Idle;
        }
        if self.retransmit_count >= config.max_retransmits {
            return Retransmit::Abort;
        }

        oldest.sent_at = now_ms;
        let bytes = oldest.bytes.clone();
        self.retransmit_count += 1;
        self.rto = (self.rto * 2).min(config.max_rto_ms);

        Retransmit::Resend(OutgoingSegment {
            dest_ip: self.id.remote_addr,
            bytes,
        })
    }
}

/// Peer details returned by `accept`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accepted {
    pub handle: SocketHandle,
    pub peer_ip: Ipv4Addr,
    pub peer_port: u16,
}

/// One row of the connection listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpConnectionInfo {
    pub handle: SocketHandle,
    pub id: TcpSocketId,
    pub state: TcpState,
    pub recv_queued: usize,
}

/// Connection table plus everything shared between connections.
#[derive(Debug)]
pub struct TcpEngine {
    config: TcpConfig,
    connections: ConnectionTable<TcpConnection>,
    next_ephemeral_port: u16,
    isn_counter: u32,
    syn_window_start: Option<u64>,
    syn_count: u32,
    outbox: VecDeque<OutgoingSegment>,
}

impl TcpEngine {
    pub fn new(config: TcpConfig) -> Self {
        Self {
            connections: ConnectionTable::with_capacity(config.max_connections),
            next_ephemeral_port: config.ephemeral_port_start,
            isn_counter: 0,
            syn_window_start: None,
            syn_count: 0,
            outbox: VecDeque::new(),
            config,
        }
    }

    pub fn config(&self) -> &TcpConfig {
        &self.config
    }

    pub fn connection(&self, handle: SocketHandle) -> Option<&TcpConnection> {
        self.connections.get(handle)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn connections(&self) -> Vec<TcpConnectionInfo> {
        self.connections
            .iter()
            .map(|(handle, conn)| TcpConnectionInfo {
                handle,
                id: conn.id,
                state: conn.state,
                recv_queued: conn.recv_count(),
            })
            .collect()
    }

    /// Segments built since the last drain, oldest first.
    pub fn drain_outbox(&mut self) -> Vec<OutgoingSegment> {
        self.outbox.drain(..).collect()
    }

    fn next_isn(&mut self, now_ms: u64) -> u32 {
        let isn = self
            .config
            .initial_sequence
            .wrapping_add((now_ms as u32).wrapping_mul(250))
            .wrapping_add(self.isn_counter.wrapping_mul(64_000));
        self.isn_counter = self.isn_counter.wrapping_add(1);
        isn
    }

    fn allocate_ephemeral_port(&mut self) -> u16 {
        let port = self.next_ephemeral_port;
        self.next_ephemeral_port = match self.next_ephemeral_port.checked_add(1) {
            Some(next) => next,
            None => self.config.ephemeral_port_start,
        };
        port
    }

    /// Count a connection-creating SYN against the flood budget.
    fn admit_syn(&mut self, now_ms: u64) -> Result<(), DropReason> {
        match self.syn_window_start {
            Some(start) if now_ms.saturating_sub(start) < self.config.syn_flood_window_ms => {
                self.syn_count += 1;
                if self.syn_count > self.config.syn_flood_threshold {
                    log::warn!("[TCP] SYN flood detected - dropping SYN packet");
                    return Err(DropReason::SynFlood);
                }
            }
            _ => {
                self.syn_window_start = Some(now_ms);
                self.syn_count = 1;
            }
        }
        Ok(())
    }

    /// Open a passive listener on `port`.
    pub fn listen(&mut self, local_ip: Ipv4Addr, port: u16, now_ms: u64) -> Result<SocketHandle, TcpError> {
        if self
            .connections
            .find(|conn| conn.is_listener() && conn.id.local_port == port)
            .is_some()
        {
            return Err(TcpError::PortInUse);
        }

        let id = TcpSocketId {
            local_addr: local_ip,
            local_port: port,
            remote_addr: Ipv4Addr::UNSPECIFIED,
            remote_port: 0,
        };
        let isn = self.next_isn(now_ms);
        let mut conn = TcpConnection::new(id, isn, &self.config);
        conn.state = TcpState::Listen;

        let handle = self
            .connections
            .insert(conn)
            .map_err(|_| TcpError::TableFull)?;
        log::info!("[TCP] listening on port {}", port);
        Ok(handle)
    }

    /// Return an established connection for `handle`.
    ///
    /// On a listener this picks the first established, not yet accepted
    /// connection that arrived on the same local port.
    pub fn accept(&mut self, handle: SocketHandle) -> Result<Accepted, TcpError> {
        let conn = self.connections.get(handle).ok_or(TcpError::InvalidHandle)?;

        let target = if conn.state == TcpState::Established {
            handle
        } else if conn.is_listener() {
            let port = conn.id.local_port;
            self.connections
                .find(|c| {
                    c.state == TcpState::Established
                        && !c.accepted
                        && c.id.local_port == port
                        && c.id.remote_port != 0
                })
                .ok_or(TcpError::NotEstablished)?
        } else {
            return Err(TcpError::NotEstablished);
        };

        let conn = self
            .connections
            .get_mut(target)
            .ok_or(TcpError::InvalidHandle)?;
        conn.accepted = true;

        Ok(Accepted {
            handle: target,
            peer_ip: conn.id.remote_addr,
            peer_port: conn.id.remote_port,
        })
    }

    /// Active open from an ephemeral port.
    ///
    /// With `optimistic_connect` the connection is ESTABLISHED as soon as the
    /// SYN is out; the peer's SYN|ACK is then simply acknowledged.
    pub fn connect(
        &mut self,
        local_ip: Ipv4Addr,
        remote_ip: Ipv4Addr,
        remote_port: u16,
        now_ms: u64,
    ) -> Result<SocketHandle, TcpError> {
        let id = TcpSocketId {
            local_addr: local_ip,
            local_port: self.allocate_ephemeral_port(),
            remote_addr: remote_ip,
            remote_port,
        };
        let isn = self.next_isn(now_ms);
        let handle = self
            .connections
            .insert(TcpConnection::new(id, isn, &self.config))
            .map_err(|_| {
                log::error!("[TCP] connect: connection table full");
                TcpError::TableFull
            })?;

        let optimistic = self.config.optimistic_connect;
        let conn = self
            .connections
            .get_mut(handle)
            .ok_or(TcpError::InvalidHandle)?;
        conn.state = TcpState::SynSent;
        let syn = conn.emit(flags::SYN, &[], now_ms);
        if optimistic {
            conn.state = TcpState::Established;
        }
        self.outbox.push_back(syn);

        log::info!(
            "[TCP] connect {}:{} -> {}:{} (isn {:#x})",
            local_ip,
            id.local_port,
            remote_ip,
            remote_port,
            isn
        );
        Ok(handle)
    }

    /// Queue `data`, truncated to the send window and split at the MSS.
    /// Returns the number of bytes sent.
    pub fn send(&mut self, handle: SocketHandle, data: &[u8], now_ms: u64) -> Result<usize, TcpError> {
        let conn = self
            .connections
            .get_mut(handle)
            .ok_or(TcpError::InvalidHandle)?;
        if conn.state != TcpState::Established {
            return Err(TcpError::NotEstablished);
        }

        let allowed = data.len().min(conn.send_window() as usize);
        let mss = conn.mss.max(1) as usize;
        for chunk in data[..allowed].chunks(mss) {
            let segment = conn.emit(flags::ACK | flags::PSH, chunk, now_ms);
            self.outbox.push_back(segment);
        }

        if allowed < data.len() {
            log::debug!("[TCP] send truncated to window: {} of {} bytes", allowed, data.len());
        }
        Ok(allowed)
    }

    /// Copy received bytes into `buf`. Returns 0 when nothing is queued.
    pub fn recv(&mut self, handle: SocketHandle, buf: &mut [u8]) -> Result<usize, TcpError> {
        let conn = self
            .connections
            .get_mut(handle)
            .ok_or(TcpError::InvalidHandle)?;
        if conn.state != TcpState::Established {
            return Err(TcpError::NotEstablished);
        }

        let n = conn.recv_buffer.pop_into(buf);
        conn.update_recv_window();
        Ok(n)
    }

    /// Start an active close, or drop the connection outright if it is not
    /// established.
    pub fn close(&mut self, handle: SocketHandle, now_ms: u64) -> Result<(), TcpError> {
        let conn = self
            .connections
            .get_mut(handle)
            .ok_or(TcpError::InvalidHandle)?;

        if conn.state == TcpState::Established {
            conn.state = TcpState::FinWait1;
            let fin = conn.emit(flags::FIN | flags::ACK, &[], now_ms);
            self.outbox.push_back(fin);
        } else {
            self.connections.remove(handle);
        }
        Ok(())
    }

    /// Process an inbound segment addressed to `own_ip`.
    pub fn handle_segment(
        &mut self,
        own_ip: Ipv4Addr,
        src_ip: Ipv4Addr,
        data: &[u8],
        now_ms: u64,
    ) -> Result<SocketHandle, DropReason> {
        let segment = TcpSegment::parse(data).map_err(|_| DropReason::Malformed(Layer::Tcp))?;

        let id = TcpSocketId {
            local_addr: own_ip,
            local_port: segment.dest_port,
            remote_addr: src_ip,
            remote_port: segment.src_port,
        };

        let handle = match self.connections.find(|conn| conn.id == id) {
            Some(handle) => handle,
            None => {
                if !segment.has_flag(flags::SYN) {
                    return Err(DropReason::UnknownConnection);
                }
                self.admit_syn(now_ms)?;

                let isn = self.next_isn(now_ms);
                let mut conn = TcpConnection::new(id, isn, &self.config);
                conn.state = TcpState::Listen;
                conn.syn_timestamp = now_ms;
                self.connections.insert(conn).map_err(|_| {
                    log::warn!("[TCP] no room for connection from {}:{}", src_ip, segment.src_port);
                    DropReason::AllocationFailure
                })?
            }
        };

        let config = self.config;
        let conn = self
            .connections
            .get_mut(handle)
            .ok_or(DropReason::UnknownConnection)?;

        log::trace!(
            "[TCP] {} flags={:#04x} seq={} ack={} len={}",
            conn.state,
            segment.flags,
            segment.sequence,
            segment.acknowledgment,
            segment.payload.len()
        );

        conn.ack_number = segment.sequence.wrapping_add(segment.sequence_len());
        if segment.has_flag(flags::ACK) {
            conn.on_ack(segment.acknowledgment, segment.window, now_ms, &config);
        }

        let mut remove = false;
        match conn.state {
            TcpState::Listen => {
                if segment.has_flag(flags::SYN) {
                    conn.state = TcpState::SynReceived;
                    self.outbox.push_back(conn.emit(flags::SYN | flags::ACK, &[], now_ms));
                }
            }
            TcpState::SynSent => {
                if segment.has_flag(flags::SYN) && segment.has_flag(flags::ACK) {
                    conn.state = TcpState::Established;
                    self.outbox.push_back(conn.emit(flags::ACK, &[], now_ms));
                    log::info!("[TCP] Connection established!");
                }
            }
            TcpState::SynReceived => {
                if segment.has_flag(flags::ACK) {
                    conn.state = TcpState::Established;
                    log::info!("[TCP] Connection established (server)!");
                }
            }
            TcpState::Established => {
                if segment.has_flag(flags::FIN) {
                    conn.state = TcpState::CloseWait;
                    self.outbox.push_back(conn.emit(flags::ACK, &[], now_ms));
                    conn.state = TcpState::LastAck;
                    self.outbox.push_back(conn.emit(flags::FIN | flags::ACK, &[], now_ms));
                } else if !segment.payload.is_empty() {
                    if let Err(BufferError::Overflow { accepted }) =
                        conn.recv_buffer.push_slice(segment.payload)
                    {
                        log::debug!(
                            "[TCP] receive buffer full: kept {} of {} bytes",
                            accepted,
                            segment.payload.len()
                        );
                    }
                    self.outbox.push_back(conn.emit(flags::ACK, &[], now_ms));
                } else if segment.has_flag(flags::SYN) {
                    self.outbox.push_back(conn.emit(flags::ACK, &[], now_ms));
                }
            }
            TcpState::FinWait1 => {
                // FIN is only honoured from FIN_WAIT_2
                if segment.has_flag(flags::ACK) {
                    conn.state = TcpState::FinWait2;
                }
            }
            TcpState::FinWait2 => {
                if segment.has_flag(flags::FIN) {
                    conn.state = TcpState::TimeWait;
                    self.outbox.push_back(conn.emit(flags::ACK, &[], now_ms));
                }
            }
            TcpState::LastAck => {
                if segment.has_flag(flags::ACK) {
                    remove = true;
                }
            }
            TcpState::TimeWait => remove = true,
            TcpState::CloseWait | TcpState::Closing | TcpState::Closed => {}
        }

        conn.update_recv_window();
        if remove {
            self.connections.remove(handle);
            log::debug!("[TCP] connection {}:{} closed", src_ip, segment.src_port);
        }
        Ok(handle)
    }

    /// Retransmit overdue segments, abort connections that ran out of
    /// retries and reap TIME_WAIT.
    pub fn tick(&mut self, now_ms: u64) {
        let config = self.config;
        let mut dead = Vec::new();

        for (handle, conn) in self.connections.iter_mut() {
            if conn.state == TcpState::TimeWait {
                dead.push(handle);
                continue;
            }
            match conn.retransmit_due(now_ms, &config) {
                Retransmit::Idle => {}
                Retransmit::Resend(segment) => {
                    log::debug!(
                        "[TCP] retransmit #{} to {}:{} (rto {} ms)",
                        conn.retransmit_count,
                        conn.id.remote_addr,
                        conn.id.remote_port,
                        conn.rto
                    );
                    self.outbox.push_back(segment);
                }
                Retransmit::Abort => {
                    log::warn!(
                        "[TCP] giving up on {}:{} after {} retransmits",
                        conn.id.remote_addr,
                        conn.id.remote_port,
                        conn.retransmit_count
                    );
                    dead.push(handle);
                }
            }
        }

        for handle in dead {
            self.connections.remove(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCAL: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);
    const PEER: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 5);

    fn segment(seq: u32, ack: u32, seg_flags: u8, payload: &[u8]) -> Vec<u8> {
        TcpSegment {
            src_port: 80,
            dest_port: 49152,
            sequence: seq,
            acknowledgment: ack,
            flags: seg_flags,
            window: 4096,
            checksum: 0,
            payload,
        }
        .build(PEER, LOCAL)
    }

    fn parsed(out: &OutgoingSegment) -> TcpSegment<'_> {
        TcpSegment::parse(&out.bytes).unwrap()
    }

    #[test]
    fn test_segment_build_and_checksum() {
        let bytes = segment(1, 2, flags::SYN, b"hi");
        assert_eq!(bytes.len(), 22);
        assert_eq!(bytes[12], 0x50);
        assert!(verify_checksum(PEER, LOCAL, &bytes));

        let seg = TcpSegment::parse(&bytes).unwrap();
        assert_eq!(seg.sequence_len(), 3);
        assert_eq!(seg.payload, b"hi");
    }

    #[test]
    fn test_parse_rejects_short_and_bad_offset() {
        let mut bytes = segment(0, 0, flags::ACK, &[]);
        assert_eq!(TcpSegment::parse(&bytes[..19]), Err(TcpError::PacketTooShort));
        bytes[12] = 0x40;
        assert_eq!(TcpSegment::parse(&bytes), Err(TcpError::InvalidDataOffset));
    }

    #[test]
    fn test_send_truncates_to_window_and_splits_at_mss() {
        let config = TcpConfig { default_window: 3000, ..TcpConfig::default() };
        let mut engine = TcpEngine::new(config);
        let handle = engine.connect(LOCAL, PEER, 80, 0).unwrap();
        engine.drain_outbox();

        let sent = engine.send(handle, &[7u8; 5000], 0).unwrap();
        assert_eq!(sent, 3000);

        let out = engine.drain_outbox();
        assert_eq!(out.len(), 3);
        assert_eq!(parsed(&out[0]).payload.len(), 1460);
        assert_eq!(parsed(&out[2]).payload.len(), 80);
        assert_eq!(engine.connection(handle).unwrap().send_window(), 0);
        assert_eq!(engine.send(handle, b"more", 0), Ok(0));
    }

    #[test]
    fn test_retransmit_backoff_then_abort() {
        let config = TcpConfig { max_retransmits: 2, ..TcpConfig::default() };
        let mut engine = TcpEngine::new(config);
        let handle = engine.connect(LOCAL, PEER, 80, 0).unwrap();
        let syn = engine.drain_outbox().remove(0);

        engine.tick(999);
        assert!(engine.drain_outbox().is_empty());

        engine.tick(1000);
        let resent = engine.drain_outbox();
        assert_eq!(resent, [syn.clone()]);
        assert_eq!(engine.connection(handle).unwrap().rto, 2000);

        engine.tick(3000);
        assert_eq!(engine.drain_outbox().len(), 1);

        engine.tick(7000);
        assert!(engine.connection(handle).is_none());
    }

    #[test]
    fn test_ack_clears_pending_and_slides_window() {
        let mut engine = TcpEngine::new(TcpConfig::default());
        let handle = engine.connect(LOCAL, PEER, 80, 0).unwrap();
        let syn = engine.drain_outbox().remove(0);
        let isn = parsed(&syn).sequence;

        engine
            .handle_segment(LOCAL, PEER, &segment(500, isn + 1, flags::SYN | flags::ACK, &[]), 10)
            .unwrap();

        let conn = engine.connection(handle).unwrap();
        assert_eq!(conn.unacknowledged(), 0);
        assert_eq!(conn.last_ack_time, 10);
        assert_eq!(conn.send_window_end, isn + 1 + 4096);
        assert!(seq_le(conn.send_window_start, conn.send_window_end));
    }

    #[test]
    fn test_active_close_sequence() {
        let mut engine = TcpEngine::new(TcpConfig::default());
        let handle = engine.connect(LOCAL, PEER, 80, 0).unwrap();
        let isn = parsed(&engine.drain_outbox()[0]).sequence;

        engine.close(handle, 0).unwrap();
        assert_eq!(engine.connection(handle).unwrap().state, TcpState::FinWait1);

        engine
            .handle_segment(LOCAL, PEER, &segment(1, isn + 2, flags::ACK, &[]), 0)
            .unwrap();
        assert_eq!(engine.connection(handle).unwrap().state, TcpState::FinWait2);

        engine
            .handle_segment(LOCAL, PEER, &segment(1, isn + 2, flags::FIN | flags::ACK, &[]), 0)
            .unwrap();
        assert_eq!(engine.connection(handle).unwrap().state, TcpState::TimeWait);

        engine.tick(1);
        assert!(engine.connection(handle).is_none());
    }

    #[test]
    fn test_unknown_segment_without_syn_dropped() {
        let mut engine = TcpEngine::new(TcpConfig::default());
        assert_eq!(
            engine.handle_segment(LOCAL, PEER, &segment(0, 0, flags::ACK, &[]), 0),
            Err(DropReason::UnknownConnection)
        );
    }
}

//! DHCP client (RFC 2131)
//!
//! Message format: 236-byte fixed BOOTP header, the magic cookie, then a TLV
//! option area. We send a DISCOVER, apply the first offer addressed to our
//! MAC straight to the routing config, and follow up with a REQUEST so the
//! server commits the lease.

use alloc::vec::Vec;
use core::fmt;
use core::net::Ipv4Addr;

use crate::net::config::DhcpConfig;
use crate::net::error::{DropReason, Layer, TxError};
use crate::net::ipv4::RoutingConfig;
use crate::net::wire::{self, MacAddr};
use crate::task::{CancellationToken, RetryTimer};

/// Size of the fixed BOOTP header
pub const FIXED_HEADER_SIZE: usize = 236;

pub const MAGIC_COOKIE: u32 = 0x6382_5363;

/// Offset of the first option, right after the cookie
pub const OPTIONS_OFFSET: usize = FIXED_HEADER_SIZE + 4;

/// Option area we reserve in outgoing messages
pub const OPTIONS_AREA_SIZE: usize = 312;

/// Full size of an outgoing message
pub const MESSAGE_SIZE: usize = OPTIONS_OFFSET + OPTIONS_AREA_SIZE;

const BOOTREQUEST: u8 = 1;
const HTYPE_ETHERNET: u8 = 1;

/// Option codes
pub mod options {
    pub const PAD: u8 = 0;
    pub const SUBNET_MASK: u8 = 1;
    pub const ROUTER: u8 = 3;
    pub const DNS_SERVER: u8 = 6;
    pub const DOMAIN_NAME: u8 = 15;
    pub const REQUESTED_IP: u8 = 50;
    pub const LEASE_TIME: u8 = 51;
    pub const MESSAGE_TYPE: u8 = 53;
    pub const SERVER_ID: u8 = 54;
    pub const PARAMETER_LIST: u8 = 55;
    pub const END: u8 = 255;
}

/// Values of option 53
pub mod message_type {
    pub const DISCOVER: u8 = 1;
    pub const OFFER: u8 = 2;
    pub const REQUEST: u8 = 3;
    pub const ACK: u8 = 5;
    pub const NAK: u8 = 6;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhcpError {
    /// Shorter than the fixed header plus cookie
    PacketTooShort,
    /// Discovery was cancelled before a lease arrived
    Cancelled,
    /// Retry budget exhausted without a lease
    AttemptsExhausted,
    Transmit(TxError),
}

impl fmt::Display for DhcpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DhcpError::PacketTooShort => write!(f, "DHCP message too short"),
            DhcpError::Cancelled => write!(f, "DHCP discovery cancelled"),
            DhcpError::AttemptsExhausted => write!(f, "no DHCP offer received"),
            DhcpError::Transmit(err) => write!(f, "DHCP transmit failed: {}", err),
        }
    }
}

impl From<TxError> for DhcpError {
    fn from(err: TxError) -> Self {
        DhcpError::Transmit(err)
    }
}

/// Client progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhcpState {
    /// No discovery running
    Idle,
    /// DISCOVER sent, waiting for an offer
    Selecting,
    /// Offer applied, REQUEST sent
    Requesting,
    Bound,
    Cancelled,
    Failed,
}

/// Parameters handed out by the server. Only the address is mandatory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DhcpLease {
    pub address: Ipv4Addr,
    pub netmask: Option<Ipv4Addr>,
    pub gateway: Option<Ipv4Addr>,
    pub dns_server: Option<Ipv4Addr>,
    pub lease_time_secs: Option<u32>,
    pub server_id: Option<Ipv4Addr>,
}

/// Outcome of a processed server reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhcpEvent {
    /// DHCPOFFER applied; a REQUEST went out
    Offered(DhcpLease),
    /// DHCPACK: lease committed
    Bound(DhcpLease),
    /// Reply without a recognised message type; address applied anyway
    Configured(DhcpLease),
}

impl DhcpEvent {
    pub fn lease(&self) -> &DhcpLease {
        match self {
            DhcpEvent::Offered(lease) | DhcpEvent::Bound(lease) | DhcpEvent::Configured(lease) => {
                lease
            }
        }
    }
}

/// Options we understand, pulled out of the TLV stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DhcpOptions {
    pub message_type: Option<u8>,
    pub subnet_mask: Option<Ipv4Addr>,
    pub router: Option<Ipv4Addr>,
    pub dns_server: Option<Ipv4Addr>,
    pub lease_time_secs: Option<u32>,
    pub server_id: Option<Ipv4Addr>,
}

/// Walk a `code, len, value...` option stream.
///
/// Stops at END (255) or at the first option whose length runs past the
/// buffer. PAD (0) is a single byte. The subnet mask needs exactly four
/// bytes; the router list uses its first entry.
pub fn parse_options(data: &[u8]) -> DhcpOptions {
    let mut parsed = DhcpOptions::default();
    let mut pos = 0;

    while pos < data.len() {
        let code = data[pos];
        pos += 1;
        if code == options::END {
            break;
        }
        if code == options::PAD {
            continue;
        }

        let Some(&len) = data.get(pos) else { break };
        pos += 1;
        let Some(value) = data.get(pos..pos + len as usize) else {
            break;
        };
        pos += len as usize;

        match code {
            options::SUBNET_MASK if len == 4 => parsed.subnet_mask = wire::read_ipv4(value, 0),
            options::ROUTER if len >= 4 => parsed.router = wire::read_ipv4(value, 0),
            options::DNS_SERVER if len >= 4 => parsed.dns_server = wire::read_ipv4(value, 0),
            options::LEASE_TIME if len == 4 => parsed.lease_time_secs = wire::read_u32(value, 0),
            options::SERVER_ID if len == 4 => parsed.server_id = wire::read_ipv4(value, 0),
            options::MESSAGE_TYPE if len == 1 => parsed.message_type = Some(value[0]),
            _ => {}
        }
    }

    parsed
}

/// Fields of a server reply we act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DhcpMessage {
    pub op: u8,
    pub xid: u32,
    pub yiaddr: Ipv4Addr,
    pub siaddr: Ipv4Addr,
    pub chaddr: MacAddr,
    pub options: DhcpOptions,
}

impl DhcpMessage {
    /// Parse a reply. The magic cookie is not checked.
    pub fn parse(data: &[u8]) -> Result<Self, DhcpError> {
        if data.len() < OPTIONS_OFFSET {
            return Err(DhcpError::PacketTooShort);
        }

        Ok(Self {
            op: data[0],
            xid: wire::read_u32(data, 4).ok_or(DhcpError::PacketTooShort)?,
            yiaddr: wire::read_ipv4(data, 16).ok_or(DhcpError::PacketTooShort)?,
            siaddr: wire::read_ipv4(data, 20).ok_or(DhcpError::PacketTooShort)?,
            chaddr: MacAddr::read(data, 28).ok_or(DhcpError::PacketTooShort)?,
            options: parse_options(&data[OPTIONS_OFFSET..]),
        })
    }
}

/// Common BOOTREQUEST skeleton; returns the buffer and the first free
/// option offset.
fn bootrequest(mac: MacAddr, xid: u32, msg_type: u8) -> (Vec<u8>, usize) {
    let mut msg = alloc::vec![0u8; MESSAGE_SIZE];

    msg[0] = BOOTREQUEST;
    msg[1] = HTYPE_ETHERNET;
    msg[2] = 6;
    wire::write_u32(&mut msg, 4, xid);
    wire::write_mac(&mut msg, 28, mac);
    wire::write_u32(&mut msg, FIXED_HEADER_SIZE, MAGIC_COOKIE);

    let mut pos = OPTIONS_OFFSET;
    msg[pos..pos + 3].copy_from_slice(&[options::MESSAGE_TYPE, 1, msg_type]);
    pos += 3;
    (msg, pos)
}

/// DHCPDISCOVER asking for mask, router, domain name and DNS.
pub fn build_discover(mac: MacAddr, xid: u32) -> Vec<u8> {
    let (mut msg, mut pos) = bootrequest(mac, xid, message_type::DISCOVER);

    msg[pos..pos + 6].copy_from_slice(&[
        options::PARAMETER_LIST,
        4,
        options::SUBNET_MASK,
        options::ROUTER,
        options::DOMAIN_NAME,
        options::DNS_SERVER,
    ]);
    pos += 6;
    msg[pos] = options::END;

    msg
}

/// DHCPREQUEST for an offered address.
pub fn build_request(
    mac: MacAddr,
    xid: u32,
    requested: Ipv4Addr,
    server_id: Option<Ipv4Addr>,
) -> Vec<u8> {
    let (mut msg, mut pos) = bootrequest(mac, xid, message_type::REQUEST);

    msg[pos] = options::REQUESTED_IP;
    msg[pos + 1] = 4;
    wire::write_ipv4(&mut msg, pos + 2, requested);
    pos += 6;

    if let Some(server) = server_id {
        msg[pos] = options::SERVER_ID;
        msg[pos + 1] = 4;
        wire::write_ipv4(&mut msg, pos + 2, server);
        pos += 6;
    }
    msg[pos] = options::END;

    msg
}

/// Discovery session state, advanced by replies and by the stack's tick.
#[derive(Debug, Clone)]
pub struct DhcpClient {
    state: DhcpState,
    xid: u32,
    timer: RetryTimer,
    retry_interval_ms: u64,
    max_attempts: Option<u32>,
    token: CancellationToken,
    lease: Option<DhcpLease>,
}

impl DhcpClient {
    pub fn new(config: &DhcpConfig) -> Self {
        Self {
            state: DhcpState::Idle,
            xid: config.transaction_id,
            timer: RetryTimer::new(config.retry_interval_ms, config.max_attempts),
            retry_interval_ms: config.retry_interval_ms,
            max_attempts: config.max_attempts,
            token: CancellationToken::new(),
            lease: None,
        }
    }

    pub fn state(&self) -> DhcpState {
        self.state
    }

    pub fn lease(&self) -> Option<&DhcpLease> {
        self.lease.as_ref()
    }

    pub fn transaction_id(&self) -> u32 {
        self.xid
    }

    pub fn attempts(&self) -> u32 {
        self.timer.attempts()
    }

    /// Begin (or restart) discovery. The first DISCOVER is due immediately.
    pub fn start(&mut self, token: CancellationToken) {
        self.state = DhcpState::Selecting;
        self.timer = RetryTimer::new(self.retry_interval_ms, self.max_attempts);
        self.token = token;
        self.lease = None;
    }

    /// Decide whether a DISCOVER should go out at `now_ms`.
    ///
    /// Discovery ends as soon as the interface has an address, the token is
    /// cancelled, or the attempt budget is spent.
    pub fn discover_due(&mut self, now_ms: u64, own_ip: Ipv4Addr) -> bool {
        if self.state != DhcpState::Selecting {
            return false;
        }
        if !own_ip.is_unspecified() {
            self.state = DhcpState::Idle;
            return false;
        }
        if self.token.is_cancelled() {
            log::info!("[DHCP] discovery cancelled after {} attempts", self.timer.attempts());
            self.state = DhcpState::Cancelled;
            return false;
        }
        if self.timer.is_exhausted() && now_ms >= self.timer.next_deadline() {
            log::warn!("[DHCP] no offer after {} attempts", self.timer.attempts());
            self.state = DhcpState::Failed;
            return false;
        }
        if !self.timer.is_due(now_ms) {
            return false;
        }

        self.timer.record_attempt(now_ms);
        log::debug!("[DHCP] attempt {}: sending DISCOVER", self.timer.attempts());
        true
    }

    /// Apply a server reply to `routing`.
    ///
    /// Returns the event and, for an OFFER, the REQUEST to broadcast.
    pub fn handle_packet(
        &mut self,
        data: &[u8],
        our_mac: MacAddr,
        routing: &mut RoutingConfig,
    ) -> Result<(DhcpEvent, Option<Vec<u8>>), DropReason> {
        let msg = DhcpMessage::parse(data).map_err(|_| DropReason::Malformed(Layer::Dhcp))?;

        if msg.chaddr != our_mac {
            return Err(DropReason::ForeignHardwareAddress);
        }
        if msg.yiaddr.is_unspecified() {
            return Err(DropReason::NoAddressOffered);
        }

        routing.own_ip = msg.yiaddr;
        if let Some(mask) = msg.options.subnet_mask {
            routing.netmask = mask;
        }
        if let Some(gateway) = msg.options.router {
            routing.gateway = gateway;
        }

        let lease = DhcpLease {
            address: msg.yiaddr,
            netmask: msg.options.subnet_mask,
            gateway: msg.options.router,
            dns_server: msg.options.dns_server,
            lease_time_secs: msg.options.lease_time_secs,
            server_id: msg.options.server_id,
        };
        self.lease = Some(lease);

        log::info!(
            "[DHCP] IP Address Successfully Configured: {} mask {} gateway {}",
            routing.own_ip,
            routing.netmask,
            routing.gateway
        );

        match msg.options.message_type {
            Some(message_type::OFFER) => {
                self.state = DhcpState::Requesting;
                let request = build_request(our_mac, self.xid, lease.address, lease.server_id);
                Ok((DhcpEvent::Offered(lease), Some(request)))
            }
            Some(message_type::ACK) => {
                self.state = DhcpState::Bound;
                Ok((DhcpEvent::Bound(lease), None))
            }
            _ => {
                self.state = DhcpState::Bound;
                Ok((DhcpEvent::Configured(lease), None))
            }
        }
    }
}

//! Stack configuration
//!
//! Every tunable the protocol layers read lives here with the defaults the
//! kernel boots with. Build one with `StackConfig::default()` and override the
//! fields that matter.

use core::net::Ipv4Addr;

/// Statically assigned address, used instead of DHCP when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticIpConfig {
    pub ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Ipv4Addr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpConfig {
    /// Receive ring capacity per connection
    pub recv_buffer_size: usize,
    /// Window we advertise and the initial send window
    pub default_window: u16,
    /// Largest payload per segment
    pub mss: u16,
    pub initial_rto_ms: u64,
    pub max_rto_ms: u64,
    pub max_retransmits: u8,
    /// Connection table capacity; inserts beyond it fail like an allocation failure
    pub max_connections: usize,
    /// SYNs admitted per accounting window before new ones are dropped
    pub syn_flood_threshold: u32,
    pub syn_flood_window_ms: u64,
    pub ephemeral_port_start: u16,
    pub initial_sequence: u32,
    /// Mark `connect` established as soon as the SYN is out
    pub optimistic_connect: bool,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            recv_buffer_size: 4096,
            default_window: 8192,
            mss: 1460,
            initial_rto_ms: 1000,
            max_rto_ms: 60_000,
            max_retransmits: 5,
            max_connections: 64,
            syn_flood_threshold: 10,
            syn_flood_window_ms: 1000,
            ephemeral_port_start: 49152,
            initial_sequence: 0x1234_5678,
            optimistic_connect: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DhcpConfig {
    pub transaction_id: u32,
    pub retry_interval_ms: u64,
    /// `None` keeps retrying until a lease arrives or the token is cancelled
    pub max_attempts: Option<u32>,
}

impl Default for DhcpConfig {
    fn default() -> Self {
        Self {
            transaction_id: 0x1234_5678,
            retry_interval_ms: 2000,
            max_attempts: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingConfig {
    pub identifier: u16,
    pub count: u16,
    pub interval_ms: u64,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            identifier: 0x1234,
            count: 4,
            interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackConfig {
    pub ttl: u8,
    pub arp_cache_slots: usize,
    /// Capacity of the interrupt receive queue
    pub rx_queue_capacity: usize,
    pub static_ip: Option<StaticIpConfig>,
    pub tcp: TcpConfig,
    pub dhcp: DhcpConfig,
    pub ping: PingConfig,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            ttl: 64,
            arp_cache_slots: 1,
            rx_queue_capacity: 64,
            static_ip: None,
            tcp: TcpConfig::default(),
            dhcp: DhcpConfig::default(),
            ping: PingConfig::default(),
        }
    }
}

impl StackConfig {
    pub fn with_static_ip(mut self, ip: Ipv4Addr, netmask: Ipv4Addr, gateway: Ipv4Addr) -> Self {
        self.static_ip = Some(StaticIpConfig { ip, netmask, gateway });
        self
    }
}

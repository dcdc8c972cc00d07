//! Network Stack Integration
//!
//! [`NetworkStack`] owns the device and every piece of mutable protocol state
//! (routing, ARP and neighbour caches, firewall, DHCP and ping sessions, TCP
//! connections) and
//! wires the layers together. Frames go up through [`NetworkStack::handle_frame`];
//! timers advance through [`NetworkStack::tick`].

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::net::{Ipv4Addr, Ipv6Addr};

use spin::Mutex;

use crate::drivers::net::{take_received_frame, LinkStatus, NetworkDevice};
use crate::net::arp::{ArpCache, ArpPacket};
use crate::net::config::StackConfig;
use crate::net::dhcp::{self, DhcpClient, DhcpLease, DhcpState};
use crate::net::error::{Delivered, DropReason, TxError};
use crate::net::ethernet::{self, EtherKind, EthernetFrame, ETHERTYPE_ARP, ETHERTYPE_IPV4, ETHERTYPE_IPV6};
use crate::net::firewall::{Firewall, PacketInfo};
use crate::net::icmp::{self, IcmpPacket, PingSession, PingStats};
use crate::net::ipv4::{self, Ipv4Header, RoutingConfig, protocol};
use crate::net::ipv6::{self, Ipv6Addresses, Ipv6Header, NdpAction, NeighborCache};
use crate::net::socket::SocketHandle;
use crate::net::tcp::{Accepted, TcpConnection, TcpConnectionInfo, TcpEngine, TcpError, TcpState};
use crate::net::udp::{self, UdpDatagram, DHCP_CLIENT_PORT, DHCP_SERVER_PORT};
use crate::net::wire::{self, MacAddr};
use crate::task::CancellationToken;

/// ff02::1, where answers to solicitations from the unspecified address go
const ALL_NODES: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 1);

/// Stack shared between the RX task, the timer and the shell.
pub type SharedStack<D> = Mutex<NetworkStack<D>>;

/// Snapshot for `ifconfig`-style display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub name: String,
    pub mac: MacAddr,
    pub ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub ipv6_link_local: Ipv6Addr,
    pub link: LinkStatus,
}

impl fmt::Display for InterfaceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: link {:?}", self.name, self.link)?;
        writeln!(f, "  MAC:        {}", self.mac)?;
        writeln!(f, "  IPv6:       {}", self.ipv6_link_local)?;
        if self.ip.is_unspecified() {
            return writeln!(f, "  IP Address: not configured");
        }
        writeln!(f, "  IP Address: {}", self.ip)?;
        writeln!(f, "  Netmask:    {}", self.netmask)?;
        writeln!(f, "  Gateway:    {}", self.gateway)
    }
}

pub struct NetworkStack<D: NetworkDevice> {
    device: D,
    config: StackConfig,
    mac: MacAddr,
    routing: RoutingConfig,
    next_ip_id: u16,
    arp: ArpCache,
    ipv6: Ipv6Addresses,
    neighbors: NeighborCache,
    firewall: Firewall,
    dhcp: DhcpClient,
    ping: Option<PingSession>,
    last_ping: Option<PingStats>,
    tcp: TcpEngine,
    /// Time of the most recent `tick`
    now_ms: u64,
}

impl<D: NetworkDevice> NetworkStack<D> {
    pub fn new(device: D, config: StackConfig) -> Self {
        let mac = MacAddr(device.mac_address());
        let routing = match config.static_ip {
            Some(static_ip) => RoutingConfig {
                own_ip: static_ip.ip,
                netmask: static_ip.netmask,
                gateway: static_ip.gateway,
            },
            None => RoutingConfig::unconfigured(),
        };

        let ipv6 = Ipv6Addresses::for_mac(mac);

        log::info!("Network stack initializing on {} ({})", device.device_name(), mac);
        log::info!("IPv6 link-local address {}", ipv6.link_local);
        if routing.is_configured() {
            log::info!(
                "Network configured: {} / {} gateway {}",
                routing.own_ip,
                routing.netmask,
                routing.gateway
            );
        }

        Self {
            mac,
            routing,
            next_ip_id: 0,
            arp: ArpCache::new(config.arp_cache_slots),
            ipv6,
            neighbors: NeighborCache::new(),
            firewall: Firewall::default(),
            dhcp: DhcpClient::new(&config.dhcp),
            ping: None,
            last_ping: None,
            tcp: TcpEngine::new(config.tcp),
            now_ms: 0,
            device,
            config,
        }
    }

    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn mac(&self) -> MacAddr {
        self.mac
    }

    // Receive path

    /// Process one received Ethernet frame.
    pub fn handle_frame(&mut self, frame: &[u8]) -> Result<Delivered, DropReason> {
        let frame = EthernetFrame::parse(frame)?;
        match frame.kind() {
            EtherKind::Arp => self.handle_arp(frame.payload),
            EtherKind::Ipv4 => self.handle_ipv4(frame.payload),
            EtherKind::Ipv6 => self.handle_ipv6(frame.src_mac, frame.payload),
            EtherKind::Unknown(ethertype) => {
                log::trace!("RX: Unknown EtherType: 0x{:04X}", ethertype);
                Err(DropReason::UnknownEtherType(ethertype))
            }
        }
    }

    fn handle_arp(&mut self, data: &[u8]) -> Result<Delivered, DropReason> {
        let packet = ArpPacket::from_bytes(data)?;
        let reply = self.arp.handle_packet(&packet, self.routing.own_ip, self.mac)?;

        let replied = match reply {
            Some(reply) => {
                if let Err(err) = self.send_frame(reply.target_mac, ETHERTYPE_ARP, &reply.to_bytes()) {
                    log::warn!("[ARP] reply to {} failed: {}", reply.target_ip, err);
                }
                true
            }
            None => false,
        };
        Ok(Delivered::Arp { replied })
    }

    /// Validate an IPv4 datagram, apply the firewall and hand the payload to
    /// ICMP, UDP or TCP.
    pub fn handle_ipv4(&mut self, data: &[u8]) -> Result<Delivered, DropReason> {
        let (header, payload) = Ipv4Header::parse(data)?;

        // Unconfigured interfaces accept anything so DHCP replies get through.
        if self.routing.is_configured()
            && header.dest_ip != self.routing.own_ip
            && !header.dest_ip.is_broadcast()
        {
            return Err(DropReason::NotForUs);
        }

        let (src_port, dst_port) = match header.protocol {
            protocol::TCP | protocol::UDP => (
                wire::read_u16(payload, 0).unwrap_or(0),
                wire::read_u16(payload, 2).unwrap_or(0),
            ),
            _ => (0, 0),
        };
        let info = PacketInfo {
            src_ip: header.src_ip,
            dst_ip: header.dest_ip,
            src_port,
            dst_port,
            protocol: header.protocol,
        };
        if !self.firewall.allows(&info) {
            return Err(DropReason::Filtered);
        }

        match header.protocol {
            protocol::ICMP => {
                let reply = icmp::handle_packet(header.src_ip, payload)?;
                if let Some(session) = self.ping.as_mut() {
                    session.record_reply(&reply, self.now_ms);
                }
                Ok(Delivered::EchoReply(reply))
            }
            protocol::UDP => self.handle_udp(payload),
            protocol::TCP => {
                if !self.routing.is_configured() {
                    return Err(DropReason::NotConfigured);
                }
                let handle =
                    self.tcp
                        .handle_segment(self.routing.own_ip, header.src_ip, payload, self.now_ms);
                self.flush_tcp();
                Ok(Delivered::Tcp(handle?))
            }
            other => {
                log::trace!("RX: Unsupported IPv4 protocol: {}", other);
                Err(DropReason::UnsupportedProtocol(other))
            }
        }
    }

    /// Validate an IPv6 packet for one of our addresses (or a multicast
    /// group) and run Neighbor Discovery on it. Other next headers are
    /// dropped.
    pub fn handle_ipv6(&mut self, src_mac: MacAddr, data: &[u8]) -> Result<Delivered, DropReason> {
        let (header, payload) = Ipv6Header::parse(data)?;
        if !self.ipv6.accepts(header.dest) {
            return Err(DropReason::NotForUs);
        }

        match header.next_header {
            ipv6::next_header::ICMPV6 => {
                let action =
                    self.neighbors
                        .handle_icmpv6(&self.ipv6, header.src, src_mac, payload)?;
                let replied = match action {
                    NdpAction::Advertise { target } => {
                        let reply_to = if header.src.is_unspecified() {
                            ALL_NODES
                        } else {
                            header.src
                        };
                        if let Err(err) = self.send_neighbor_advertisement(reply_to, target) {
                            log::warn!("[NDP] advertisement to {} failed: {}", reply_to, err);
                        }
                        true
                    }
                    NdpAction::Learned => false,
                };
                Ok(Delivered::Neighbor { replied })
            }
            other => {
                log::trace!("RX: Unsupported IPv6 next header: {}", other);
                Err(DropReason::UnsupportedProtocol(other))
            }
        }
    }

    fn handle_udp(&mut self, data: &[u8]) -> Result<Delivered, DropReason> {
        let datagram = UdpDatagram::parse(data)?;
        match datagram.dest_port {
            DHCP_CLIENT_PORT => {
                let (event, request) =
                    self.dhcp
                        .handle_packet(datagram.data, self.mac, &mut self.routing)?;
                if let Some(request) = request {
                    if let Err(err) = self.send_udp(
                        Ipv4Addr::BROADCAST,
                        DHCP_CLIENT_PORT,
                        DHCP_SERVER_PORT,
                        &request,
                    ) {
                        log::warn!("[DHCP] REQUEST failed: {}", err);
                    }
                }
                Ok(Delivered::Dhcp(event))
            }
            port => Err(DropReason::PortUnreachable(port)),
        }
    }

    /// Drain frames from a poll-mode device and from the interrupt queue.
    ///
    /// Handles at most `rx_queue_capacity` frames per call. Returns how many
    /// were taken.
    pub fn poll(&mut self) -> usize {
        let budget = self.config.rx_queue_capacity.max(1);
        let mut handled = 0;

        while handled < budget {
            let Some(frame) = self.device.receive().or_else(take_received_frame) else {
                break;
            };
            handled += 1;
            if let Err(reason) = self.handle_frame(&frame) {
                log::trace!("RX: dropped frame ({} bytes): {}", frame.len(), reason);
            }
        }
        handled
    }

    /// Advance every timer: DHCP retries, the ping session, TCP
    /// retransmission and TIME_WAIT reaping.
    pub fn tick(&mut self, now_ms: u64) {
        self.now_ms = now_ms;

        if let Err(err) = self.service_dhcp(now_ms) {
            log::warn!("[DHCP] DISCOVER failed: {}", err);
        }
        self.service_ping(now_ms);

        self.tcp.tick(now_ms);
        self.flush_tcp();
    }

    // Transmit path

    /// Wrap `payload` in an Ethernet header from our MAC and transmit it.
    pub fn send_frame(&mut self, dest_mac: MacAddr, ethertype: u16, payload: &[u8]) -> Result<(), TxError> {
        let frame = ethernet::build_frame(dest_mac, self.mac, ethertype, payload)
            .map_err(|_| TxError::PayloadTooLarge)?;

        self.device.transmit(&frame).map_err(|err| {
            log::warn!("TX: {} transmit failed: {:?}", self.device.device_name(), err);
            TxError::from(err)
        })
    }

    /// MAC for `ip`, or broadcast while a request is outstanding.
    ///
    /// A cache miss sends one ARP request and falls back to the broadcast
    /// address instead of waiting for the reply.
    pub fn arp_resolve(&mut self, ip: Ipv4Addr) -> MacAddr {
        if ip.is_broadcast() {
            return MacAddr::BROADCAST;
        }
        if let Some(mac) = self.arp.lookup(ip) {
            return mac;
        }

        if let Err(err) = self.arp_send_request(ip) {
            log::warn!("[ARP] request for {} failed: {}", ip, err);
        }
        MacAddr::BROADCAST
    }

    /// Broadcast a who-has for `target_ip`.
    pub fn arp_send_request(&mut self, target_ip: Ipv4Addr) -> Result<(), TxError> {
        let request = ArpPacket::new_request(self.mac, self.routing.own_ip, target_ip);
        log::debug!("[ARP] who has {}? tell {}", target_ip, self.routing.own_ip);
        self.send_frame(MacAddr::BROADCAST, ETHERTYPE_ARP, &request.to_bytes())
    }

    /// Send `payload` to `dest_ip` through the next hop.
    pub fn send_ipv4(&mut self, dest_ip: Ipv4Addr, proto: u8, payload: &[u8]) -> Result<(), TxError> {
        if payload.len() > ipv4::MAX_PAYLOAD_SIZE {
            return Err(TxError::PayloadTooLarge);
        }

        let header = Ipv4Header::new(
            self.routing.own_ip,
            dest_ip,
            proto,
            payload.len() as u16,
            self.config.ttl,
            self.next_ip_id,
        );
        self.next_ip_id = self.next_ip_id.wrapping_add(1);
        let packet = ipv4::build_packet(&header, payload);

        let next_hop = if dest_ip.is_broadcast() {
            dest_ip
        } else {
            self.routing.next_hop(dest_ip)
        };
        let dest_mac = self.arp_resolve(next_hop);
        self.send_frame(dest_mac, ETHERTYPE_IPV4, &packet)
    }

    pub fn send_udp(
        &mut self,
        dest_ip: Ipv4Addr,
        src_port: u16,
        dest_port: u16,
        payload: &[u8],
    ) -> Result<(), TxError> {
        let datagram = udp::build_datagram(src_port, dest_port, payload);
        self.send_ipv4(dest_ip, protocol::UDP, &datagram)
    }

    /// Send `payload` to `dest` from our preferred IPv6 address.
    ///
    /// The MAC comes from the neighbour cache; unknown neighbours and
    /// multicast groups go to the broadcast MAC.
    pub fn send_ipv6(&mut self, dest: Ipv6Addr, next_header: u8, payload: &[u8]) -> Result<(), TxError> {
        self.transmit_ipv6(dest, next_header, ipv6::DEFAULT_HOP_LIMIT, payload)
    }

    fn transmit_ipv6(
        &mut self,
        dest: Ipv6Addr,
        next_header: u8,
        hop_limit: u8,
        payload: &[u8],
    ) -> Result<(), TxError> {
        if payload.len() > ethernet::MAX_PAYLOAD_SIZE - ipv6::HEADER_SIZE {
            return Err(TxError::PayloadTooLarge);
        }

        let header = Ipv6Header::new(self.ipv6.source(), dest, next_header, payload.len() as u16, hop_limit);
        let packet = ipv6::build_packet(&header, payload);
        let dest_mac = self.neighbors.lookup(dest).unwrap_or(MacAddr::BROADCAST);
        self.send_frame(dest_mac, ETHERTYPE_IPV6, &packet)
    }

    fn send_neighbor_advertisement(&mut self, dest: Ipv6Addr, target: Ipv6Addr) -> Result<(), TxError> {
        let message = ipv6::build_neighbor_advertisement(self.ipv6.source(), dest, target, self.mac);
        log::debug!("[NDP] advertising {} to {}", target, dest);
        self.transmit_ipv6(dest, ipv6::next_header::ICMPV6, ipv6::ND_HOP_LIMIT, &message)
    }

    /// Send one echo request with the fixed alphabetic payload.
    pub fn send_echo_request(&mut self, dest_ip: Ipv4Addr, identifier: u16, sequence: u16) -> Result<(), TxError> {
        let packet = IcmpPacket::new_echo_request(identifier, sequence, icmp::echo_payload());
        self.send_ipv4(dest_ip, protocol::ICMP, &packet.to_bytes())
    }

    fn flush_tcp(&mut self) {
        for segment in self.tcp.drain_outbox() {
            if let Err(err) = self.send_ipv4(segment.dest_ip, protocol::TCP, &segment.bytes) {
                log::warn!("[TCP] transmit to {} failed: {}", segment.dest_ip, err);
            }
        }
    }

    // DHCP

    /// Start discovery and send the first DISCOVER right away. Later
    /// attempts go out from `tick`.
    pub fn dhcp_discover(&mut self, now_ms: u64, token: CancellationToken) -> Result<(), TxError> {
        self.now_ms = now_ms;
        self.dhcp.start(token);
        log::info!("[DHCP] starting discovery (xid {:#010x})", self.dhcp.transaction_id());
        self.service_dhcp(now_ms)
    }

    fn service_dhcp(&mut self, now_ms: u64) -> Result<(), TxError> {
        if !self.dhcp.discover_due(now_ms, self.routing.own_ip) {
            return Ok(());
        }
        let discover = dhcp::build_discover(self.mac, self.dhcp.transaction_id());
        self.send_udp(Ipv4Addr::BROADCAST, DHCP_CLIENT_PORT, DHCP_SERVER_PORT, &discover)
    }

    pub fn dhcp_state(&self) -> DhcpState {
        self.dhcp.state()
    }

    pub fn dhcp_lease(&self) -> Option<&DhcpLease> {
        self.dhcp.lease()
    }

    // Ping

    /// Begin a ping session to `target`; the first request goes out now.
    /// Replaces any session still running.
    pub fn start_ping(&mut self, target: Ipv4Addr, now_ms: u64, token: CancellationToken) {
        self.now_ms = now_ms;
        log::info!("PING {} with {} bytes of data", target, icmp::ECHO_PAYLOAD_SIZE);
        self.ping = Some(PingSession::new(target, &self.config.ping, token));
        self.service_ping(now_ms);
    }

    fn service_ping(&mut self, now_ms: u64) {
        let Some(session) = self.ping.as_mut() else {
            return;
        };

        if session.is_finished(now_ms) {
            let stats = session.stats();
            if session.is_cancelled() {
                log::info!("Ping to {} cancelled", session.target());
            }
            log::info!("--- {} ping statistics --- {}", session.target(), stats);
            self.last_ping = Some(stats);
            self.ping = None;
            return;
        }

        if let Some(sequence) = session.next_due(now_ms) {
            let (target, identifier) = (session.target(), session.identifier());
            if let Err(err) = self.send_echo_request(target, identifier, sequence) {
                log::warn!("Ping {} seq={} failed: {}", target, sequence, err);
            }
        }
    }

    /// Session still running, if any.
    pub fn ping_session(&self) -> Option<&PingSession> {
        self.ping.as_ref()
    }

    /// Statistics of the last session that finished.
    pub fn last_ping_stats(&self) -> Option<PingStats> {
        self.last_ping
    }

    // TCP

    pub fn tcp_listen(&mut self, port: u16) -> Result<SocketHandle, TcpError> {
        self.tcp.listen(self.routing.own_ip, port, self.now_ms)
    }

    pub fn tcp_accept(&mut self, handle: SocketHandle) -> Result<Accepted, TcpError> {
        self.tcp.accept(handle)
    }

    pub fn tcp_connect(&mut self, remote_ip: Ipv4Addr, remote_port: u16) -> Result<SocketHandle, TcpError> {
        let handle = self
            .tcp
            .connect(self.routing.own_ip, remote_ip, remote_port, self.now_ms)?;
        self.flush_tcp();
        Ok(handle)
    }

    pub fn tcp_send(&mut self, handle: SocketHandle, data: &[u8]) -> Result<usize, TcpError> {
        let sent = self.tcp.send(handle, data, self.now_ms)?;
        self.flush_tcp();
        Ok(sent)
    }

    pub fn tcp_recv(&mut self, handle: SocketHandle, buf: &mut [u8]) -> Result<usize, TcpError> {
        self.tcp.recv(handle, buf)
    }

    pub fn tcp_close(&mut self, handle: SocketHandle) -> Result<(), TcpError> {
        self.tcp.close(handle, self.now_ms)?;
        self.flush_tcp();
        Ok(())
    }

    pub fn tcp_state(&self, handle: SocketHandle) -> Option<TcpState> {
        self.tcp.connection(handle).map(|conn| conn.state)
    }

    pub fn tcp_connection(&self, handle: SocketHandle) -> Option<&TcpConnection> {
        self.tcp.connection(handle)
    }

    pub fn tcp_connections(&self) -> Vec<TcpConnectionInfo> {
        self.tcp.connections()
    }

    // Routing

    pub fn routing(&self) -> RoutingConfig {
        self.routing
    }

    pub fn get_ip(&self) -> Ipv4Addr {
        self.routing.own_ip
    }

    pub fn set_ip(&mut self, ip: Ipv4Addr) {
        self.routing.own_ip = ip;
    }

    pub fn get_gateway(&self) -> Ipv4Addr {
        self.routing.gateway
    }

    pub fn set_gateway(&mut self, gateway: Ipv4Addr) {
        self.routing.gateway = gateway;
    }

    pub fn get_netmask(&self) -> Ipv4Addr {
        self.routing.netmask
    }

    pub fn set_netmask(&mut self, netmask: Ipv4Addr) {
        self.routing.netmask = netmask;
    }

    pub fn ipv6_link_local(&self) -> Ipv6Addr {
        self.ipv6.link_local
    }

    pub fn ipv6_global(&self) -> Option<Ipv6Addr> {
        self.ipv6.global
    }

    /// Assign (or with `None`, drop) the global address. It becomes the
    /// source of outgoing IPv6 packets.
    pub fn set_ipv6_global(&mut self, addr: Option<Ipv6Addr>) {
        self.ipv6.global = addr;
    }

    pub fn neighbor_cache(&self) -> &NeighborCache {
        &self.neighbors
    }

    pub fn arp_cache(&self) -> &ArpCache {
        &self.arp
    }

    pub fn arp_cache_mut(&mut self) -> &mut ArpCache {
        &mut self.arp
    }

    pub fn firewall(&self) -> &Firewall {
        &self.firewall
    }

    pub fn firewall_mut(&mut self) -> &mut Firewall {
        &mut self.firewall
    }

    pub fn interface_info(&self) -> InterfaceInfo {
        InterfaceInfo {
            name: String::from(self.device.device_name()),
            mac: self.mac,
            ip: self.routing.own_ip,
            netmask: self.routing.netmask,
            gateway: self.routing.gateway,
            ipv6_link_local: self.ipv6.link_local,
            link: self.device.link_status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::net::virtual_nic::VirtualNic;

    const MAC: [u8; 6] = [0x52, 0x54, 0x00, 0x12, 0x34, 0x56];

    fn configured() -> NetworkStack<VirtualNic> {
        let config = StackConfig::default().with_static_ip(
            Ipv4Addr::new(10, 0, 0, 2),
            Ipv4Addr::new(255, 255, 255, 0),
            Ipv4Addr::new(10, 0, 0, 1),
        );
        NetworkStack::new(VirtualNic::new(MAC), config)
    }

    #[test]
    fn test_off_subnet_goes_to_gateway() {
        let mut stack = configured();
        stack.send_echo_request(Ipv4Addr::new(8, 8, 8, 8), 1, 1).unwrap();

        let frames = stack.device_mut().take_transmitted();
        assert_eq!(frames.len(), 2);
        // who-has 10.0.0.1, then the echo request on broadcast
        assert_eq!(&frames[0][12..14], &[0x08, 0x06]);
        assert_eq!(&frames[0][14 + 24..14 + 28], &[10, 0, 0, 1]);
        assert_eq!(&frames[1][12..14], &[0x08, 0x00]);
        assert_eq!(&frames[1][14 + 16..14 + 20], &[8, 8, 8, 8]);
    }

    #[test]
    fn test_ip_identification_increments() {
        let mut stack = configured();
        stack.arp_cache_mut().insert(Ipv4Addr::new(10, 0, 0, 9), MacAddr::BROADCAST);
        stack.send_udp(Ipv4Addr::new(10, 0, 0, 9), 1, 2, &[]).unwrap();
        stack.send_udp(Ipv4Addr::new(10, 0, 0, 9), 1, 2, &[]).unwrap();

        let frames = stack.device_mut().take_transmitted();
        assert_eq!(&frames[0][18..20], &[0, 0]);
        assert_eq!(&frames[1][18..20], &[0, 1]);
    }

    #[test]
    fn test_interface_info() {
        let stack = configured();
        let info = stack.interface_info();
        assert_eq!(info.name, "vnic0");
        assert_eq!(info.ip, Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(info.link, LinkStatus::Up);
    }
}

//! ARP resolver tests

use core::net::Ipv4Addr;

use mesa_net::drivers::net::virtual_nic::VirtualNic;
use mesa_net::net::arp::{
    ArpCache, ArpError, ArpPacket, ARP_PADDED_SIZE, ARP_REPLY, ARP_REQUEST,
};
use mesa_net::net::config::StackConfig;
use mesa_net::net::error::{Delivered, DropReason};
use mesa_net::net::ethernet::{build_frame, EthernetFrame, ETHERTYPE_ARP};
use mesa_net::net::MacAddr;
use mesa_net::NetworkStack;

const OUR_MAC: [u8; 6] = [0x52, 0x54, 0x00, 0x12, 0x34, 0x56];
const PEER_MAC: MacAddr = MacAddr([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
const OUR_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 10);
const PEER_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 1);

fn stack() -> NetworkStack<VirtualNic> {
    let config = StackConfig::default().with_static_ip(
        OUR_IP,
        Ipv4Addr::new(255, 255, 255, 0),
        PEER_IP,
    );
    NetworkStack::new(VirtualNic::new(OUR_MAC), config)
}

fn arp_frame(packet: &ArpPacket) -> Vec<u8> {
    build_frame(MacAddr::BROADCAST, packet.sender_mac, ETHERTYPE_ARP, &packet.to_bytes()).unwrap()
}

#[test]
fn test_arp_packet_serialization() {
    let request = ArpPacket::new_request(PEER_MAC, PEER_IP, OUR_IP);
    let bytes = request.to_bytes();

    assert_eq!(bytes.len(), ARP_PADDED_SIZE);
    assert_eq!(&bytes[0..8], &[0x00, 0x01, 0x08, 0x00, 6, 4, 0x00, 0x01]);
    assert_eq!(&bytes[8..14], PEER_MAC.as_bytes());
    assert_eq!(&bytes[14..18], &[192, 168, 1, 1]);
    assert_eq!(&bytes[18..24], &[0; 6]);
    assert_eq!(&bytes[24..28], &[192, 168, 1, 10]);

    let parsed = ArpPacket::from_bytes(&bytes).unwrap();
    assert_eq!(parsed, request);
    assert_eq!(parsed.operation, ARP_REQUEST);
}

#[test]
fn test_arp_parse_errors() {
    let mut bytes = ArpPacket::new_request(PEER_MAC, PEER_IP, OUR_IP).to_bytes();
    assert_eq!(ArpPacket::from_bytes(&bytes[..27]), Err(ArpError::PacketTooShort));

    bytes[1] = 6;
    assert_eq!(ArpPacket::from_bytes(&bytes), Err(ArpError::InvalidHardwareType));
    bytes[1] = 1;

    // opcodes other than request/reply still parse
    bytes[7] = 9;
    assert_eq!(ArpPacket::from_bytes(&bytes).unwrap().operation, 9);
}

#[test]
fn test_other_opcode_updates_cache_without_answer() {
    let mut stack = stack();
    let mut packet = ArpPacket::new_request(PEER_MAC, PEER_IP, OUR_IP);
    packet.operation = 4;

    assert_eq!(
        stack.handle_frame(&arp_frame(&packet)),
        Ok(Delivered::Arp { replied: false })
    );
    assert_eq!(stack.arp_cache().lookup(PEER_IP), Some(PEER_MAC));
    assert_eq!(stack.device().transmitted_count(), 0);
}

#[test]
fn test_resolve_cached() {
    let mut stack = stack();
    stack.arp_cache_mut().insert(PEER_IP, PEER_MAC);

    assert_eq!(stack.arp_resolve(PEER_IP), PEER_MAC);
    assert_eq!(stack.device().transmitted_count(), 0);
}

#[test]
fn test_resolve_miss_sends_one_request() {
    let mut stack = stack();
    stack.arp_cache_mut().insert(PEER_IP, PEER_MAC);

    let other = Ipv4Addr::new(192, 168, 1, 77);
    assert_eq!(stack.arp_resolve(other), MacAddr::BROADCAST);

    let frames = stack.device_mut().take_transmitted();
    assert_eq!(frames.len(), 1);

    let frame = EthernetFrame::parse(&frames[0]).unwrap();
    assert!(frame.is_broadcast());
    assert_eq!(frame.ethertype, ETHERTYPE_ARP);

    let request = ArpPacket::from_bytes(frame.payload).unwrap();
    assert!(request.is_request());
    assert_eq!(request.sender_mac, MacAddr(OUR_MAC));
    assert_eq!(request.sender_ip, OUR_IP);
    assert_eq!(request.target_ip, other);
}

#[test]
fn test_limited_broadcast_needs_no_request() {
    let mut stack = stack();
    assert_eq!(stack.arp_resolve(Ipv4Addr::BROADCAST), MacAddr::BROADCAST);
    assert_eq!(stack.device().transmitted_count(), 0);
}

#[test]
fn test_request_for_us_is_answered_and_cached() {
    let mut stack = stack();
    let request = ArpPacket::new_request(PEER_MAC, PEER_IP, OUR_IP);

    assert_eq!(
        stack.handle_frame(&arp_frame(&request)),
        Ok(Delivered::Arp { replied: true })
    );
    assert_eq!(stack.arp_cache().lookup(PEER_IP), Some(PEER_MAC));

    let frames = stack.device_mut().take_transmitted();
    assert_eq!(frames.len(), 1);
    let frame = EthernetFrame::parse(&frames[0]).unwrap();
    assert_eq!(frame.dest_mac, PEER_MAC);

    let reply = ArpPacket::from_bytes(frame.payload).unwrap();
    assert_eq!(reply.operation, ARP_REPLY);
    assert_eq!(reply.sender_mac, MacAddr(OUR_MAC));
    assert_eq!(reply.sender_ip, OUR_IP);
    assert_eq!(reply.target_mac, PEER_MAC);
    assert_eq!(reply.target_ip, PEER_IP);
}

#[test]
fn test_reply_updates_cache_without_answer() {
    let mut stack = stack();
    let reply = ArpPacket::new_reply(PEER_MAC, PEER_IP, MacAddr(OUR_MAC), OUR_IP);

    assert_eq!(
        stack.handle_frame(&arp_frame(&reply)),
        Ok(Delivered::Arp { replied: false })
    );
    assert_eq!(stack.arp_resolve(PEER_IP), PEER_MAC);
    assert_eq!(stack.device().transmitted_count(), 0);
}

#[test]
fn test_foreign_and_unconfigured_ignored() {
    let mut stack = stack();
    let foreign = ArpPacket::new_request(PEER_MAC, PEER_IP, Ipv4Addr::new(192, 168, 1, 99));
    assert_eq!(stack.handle_frame(&arp_frame(&foreign)), Err(DropReason::NotForUs));

    let mut unconfigured = NetworkStack::new(VirtualNic::new(OUR_MAC), StackConfig::default());
    let request = ArpPacket::new_request(PEER_MAC, PEER_IP, Ipv4Addr::UNSPECIFIED);
    assert_eq!(
        unconfigured.handle_frame(&arp_frame(&request)),
        Err(DropReason::NotConfigured)
    );
    assert!(unconfigured.arp_cache().is_empty());
}

#[test]
fn test_single_slot_cache_keeps_last_resolved() {
    let mut cache = ArpCache::default();
    cache.insert(PEER_IP, PEER_MAC);
    cache.insert(OUR_IP, MacAddr(OUR_MAC));

    assert_eq!(cache.len(), 1);
    assert_eq!(cache.lookup(PEER_IP), None);
    assert_eq!(cache.lookup(OUR_IP), Some(MacAddr(OUR_MAC)));
}

#[test]
fn test_multi_slot_cache_evicts_oldest() {
    let mut cache = ArpCache::new(2);
    cache.insert(Ipv4Addr::new(10, 0, 0, 1), PEER_MAC);
    cache.insert(Ipv4Addr::new(10, 0, 0, 2), PEER_MAC);
    cache.insert(Ipv4Addr::new(10, 0, 0, 1), MacAddr(OUR_MAC));
    cache.insert(Ipv4Addr::new(10, 0, 0, 3), PEER_MAC);

    // refreshing .1 updated it in place, so it is still the oldest
    let ips: Vec<Ipv4Addr> = cache.entries().iter().map(|e| e.ip).collect();
    assert_eq!(ips, [Ipv4Addr::new(10, 0, 0, 2), Ipv4Addr::new(10, 0, 0, 3)]);
    assert_eq!(cache.lookup(Ipv4Addr::new(10, 0, 0, 1)), None);
}

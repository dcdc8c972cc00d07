//! IPv6 link-local and neighbour discovery tests

use core::net::{Ipv4Addr, Ipv6Addr};

use mesa_net::drivers::net::virtual_nic::VirtualNic;
use mesa_net::net::config::StackConfig;
use mesa_net::net::error::{Delivered, DropReason, Layer};
use mesa_net::net::ethernet::{build_frame, EthernetFrame, ETHERTYPE_IPV6};
use mesa_net::net::ipv6::{
    self, icmpv6, next_header, verify_icmpv6_checksum, Ipv6Header, ND_HOP_LIMIT,
};
use mesa_net::net::wire;
use mesa_net::net::MacAddr;
use mesa_net::NetworkStack;

const OUR_MAC: [u8; 6] = [0x52, 0x54, 0x00, 0x12, 0x34, 0x56];
const PEER_MAC: MacAddr = MacAddr([0x52, 0x55, 0x0A, 0x00, 0x00, 0x05]);

fn our_link_local() -> Ipv6Addr {
    "fe80::5054:ff:fe12:3456".parse().unwrap()
}

fn peer_ip() -> Ipv6Addr {
    "fe80::5055:aff:fe00:5".parse().unwrap()
}

/// ff02::1:ffXX:XXXX for `target`
fn solicited_node(target: Ipv6Addr) -> Ipv6Addr {
    let o = target.octets();
    Ipv6Addr::new(
        0xff02,
        0,
        0,
        0,
        0,
        1,
        0xff00 | o[13] as u16,
        u16::from_be_bytes([o[14], o[15]]),
    )
}

fn stack() -> NetworkStack<VirtualNic> {
    let config = StackConfig::default().with_static_ip(
        Ipv4Addr::new(10, 0, 0, 2),
        Ipv4Addr::new(255, 255, 255, 0),
        Ipv4Addr::new(10, 0, 0, 1),
    );
    NetworkStack::new(VirtualNic::new(OUR_MAC), config)
}

fn ipv6_frame(src: Ipv6Addr, dest: Ipv6Addr, next: u8, payload: &[u8]) -> Vec<u8> {
    let header = Ipv6Header::new(src, dest, next, payload.len() as u16, ND_HOP_LIMIT);
    let packet = ipv6::build_packet(&header, payload);
    build_frame(MacAddr::BROADCAST, PEER_MAC, ETHERTYPE_IPV6, &packet).unwrap()
}

fn nd_message(kind: u8, target: Ipv6Addr) -> Vec<u8> {
    let mut message = vec![0u8; 24];
    message[0] = kind;
    wire::write_ipv6(&mut message, 8, target);
    message
}

fn solicitation(src: Ipv6Addr, target: Ipv6Addr) -> Vec<u8> {
    ipv6_frame(
        src,
        solicited_node(target),
        next_header::ICMPV6,
        &nd_message(icmpv6::NEIGHBOR_SOLICITATION, target),
    )
}

#[test]
fn test_link_local_from_mac() {
    let stack = stack();
    assert_eq!(stack.ipv6_link_local(), our_link_local());
    assert_eq!(stack.ipv6_global(), None);
    assert!(format!("{}", stack.interface_info()).contains("IPv6:       fe80::5054:ff:fe12:3456"));
}

#[test]
fn test_solicitation_answered_with_advertisement() {
    let mut stack = stack();

    assert_eq!(
        stack.handle_frame(&solicitation(peer_ip(), our_link_local())),
        Ok(Delivered::Neighbor { replied: true })
    );
    assert_eq!(stack.neighbor_cache().lookup(peer_ip()), Some(PEER_MAC));

    let frames = stack.device_mut().take_transmitted();
    assert_eq!(frames.len(), 1);
    let frame = EthernetFrame::parse(&frames[0]).unwrap();
    // the solicitor is known now, so the answer is unicast
    assert_eq!(frame.dest_mac, PEER_MAC);
    assert_eq!(frame.ethertype, ETHERTYPE_IPV6);

    let (header, message) = Ipv6Header::parse(frame.payload).unwrap();
    assert_eq!(header.src, our_link_local());
    assert_eq!(header.dest, peer_ip());
    assert_eq!(header.next_header, next_header::ICMPV6);
    assert_eq!(header.hop_limit, 255);

    assert_eq!(message.len(), 32);
    assert_eq!(message[0], icmpv6::NEIGHBOR_ADVERTISEMENT);
    assert_eq!(message[4], 0x60);
    assert_eq!(wire::read_ipv6(message, 8), Some(our_link_local()));
    assert_eq!(&message[26..32], &OUR_MAC);
    assert!(verify_icmpv6_checksum(header.src, header.dest, message));
}

#[test]
fn test_solicitation_for_other_target_learns_only() {
    let mut stack = stack();
    let other: Ipv6Addr = "fe80::1234".parse().unwrap();

    assert_eq!(
        stack.handle_frame(&solicitation(peer_ip(), other)),
        Err(DropReason::NotForUs)
    );
    assert_eq!(stack.neighbor_cache().lookup(peer_ip()), Some(PEER_MAC));
    assert_eq!(stack.device().transmitted_count(), 0);
}

#[test]
fn test_unspecified_solicitor_answered_to_all_nodes() {
    let mut stack = stack();

    assert_eq!(
        stack.handle_frame(&solicitation(Ipv6Addr::UNSPECIFIED, our_link_local())),
        Ok(Delivered::Neighbor { replied: true })
    );
    assert!(stack.neighbor_cache().is_empty());

    let frames = stack.device_mut().take_transmitted();
    let frame = EthernetFrame::parse(&frames[0]).unwrap();
    assert!(frame.is_broadcast());
    let (header, _) = Ipv6Header::parse(frame.payload).unwrap();
    assert_eq!(header.dest, "ff02::1".parse::<Ipv6Addr>().unwrap());
}

#[test]
fn test_advertisement_updates_cache() {
    let mut stack = stack();
    let frame = ipv6_frame(
        peer_ip(),
        our_link_local(),
        next_header::ICMPV6,
        &nd_message(icmpv6::NEIGHBOR_ADVERTISEMENT, peer_ip()),
    );

    assert_eq!(stack.handle_frame(&frame), Ok(Delivered::Neighbor { replied: false }));
    assert_eq!(stack.neighbor_cache().lookup(peer_ip()), Some(PEER_MAC));
    assert_eq!(stack.device().transmitted_count(), 0);
}

#[test]
fn test_global_address_is_ours_and_preferred() {
    let mut stack = stack();
    let global: Ipv6Addr = "2001:db8::5054:ff:fe12:3456".parse().unwrap();
    stack.set_ipv6_global(Some(global));

    assert_eq!(
        stack.handle_frame(&solicitation(peer_ip(), global)),
        Ok(Delivered::Neighbor { replied: true })
    );
    let frames = stack.device_mut().take_transmitted();
    let frame = EthernetFrame::parse(&frames[0]).unwrap();
    let (header, message) = Ipv6Header::parse(frame.payload).unwrap();
    assert_eq!(header.src, global);
    assert_eq!(wire::read_ipv6(message, 8), Some(global));
}

#[test]
fn test_foreign_and_unsupported_dropped() {
    let mut stack = stack();

    let elsewhere: Ipv6Addr = "fe80::99".parse().unwrap();
    let frame = ipv6_frame(
        peer_ip(),
        elsewhere,
        next_header::ICMPV6,
        &nd_message(icmpv6::NEIGHBOR_SOLICITATION, elsewhere),
    );
    assert_eq!(stack.handle_frame(&frame), Err(DropReason::NotForUs));

    let udp = ipv6_frame(peer_ip(), our_link_local(), next_header::UDP, &[0; 8]);
    assert_eq!(
        stack.handle_frame(&udp),
        Err(DropReason::UnsupportedProtocol(next_header::UDP))
    );

    let echo = ipv6_frame(peer_ip(), our_link_local(), next_header::ICMPV6, &[128, 0, 0, 0]);
    assert_eq!(stack.handle_frame(&echo), Err(DropReason::Ignored));

    let runt = ipv6_frame(peer_ip(), our_link_local(), next_header::ICMPV6, &[135, 0, 0, 0]);
    assert_eq!(stack.handle_frame(&runt), Err(DropReason::Malformed(Layer::Icmpv6)));

    let truncated = build_frame(MacAddr(OUR_MAC), PEER_MAC, ETHERTYPE_IPV6, &[0x60; 20]).unwrap();
    assert_eq!(stack.handle_frame(&truncated), Err(DropReason::Malformed(Layer::Ipv6)));
    assert_eq!(stack.device().transmitted_count(), 0);
}

#[test]
fn test_send_ipv6_uses_neighbour_cache() {
    let mut stack = stack();
    stack.send_ipv6(peer_ip(), next_header::UDP, &[1, 2, 3]).unwrap();
    let frame = stack.device_mut().take_transmitted().remove(0);
    assert!(EthernetFrame::parse(&frame).unwrap().is_broadcast());

    stack.handle_frame(&solicitation(peer_ip(), our_link_local())).unwrap();
    stack.device_mut().take_transmitted();

    stack.send_ipv6(peer_ip(), next_header::UDP, &[1, 2, 3]).unwrap();
    let frame = stack.device_mut().take_transmitted().remove(0);
    let frame = EthernetFrame::parse(&frame).unwrap();
    assert_eq!(frame.dest_mac, PEER_MAC);
    let (header, payload) = Ipv6Header::parse(frame.payload).unwrap();
    assert_eq!(header.hop_limit, 64);
    assert_eq!(payload, &[1, 2, 3]);
}

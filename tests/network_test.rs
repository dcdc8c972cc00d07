//! stack integration tests: polling, link state and interface summary

use core::net::Ipv4Addr;

use mesa_net::drivers::net::virtual_nic::VirtualNic;
use mesa_net::drivers::net::{LinkStatus, TransmitError};
use mesa_net::net::arp::ArpPacket;
use mesa_net::net::config::StackConfig;
use mesa_net::net::error::{DropReason, Layer, TxError};
use mesa_net::net::ethernet::{build_frame, ETHERTYPE_ARP};
use mesa_net::net::MacAddr;
use mesa_net::NetworkStack;

const OUR_MAC: [u8; 6] = [0x52, 0x54, 0x00, 0x12, 0x34, 0x56];
const OUR_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 2, 15);
const PEER_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 2, 2);
const PEER_MAC: MacAddr = MacAddr([0x52, 0x55, 0x0A, 0x00, 0x02, 0x02]);

fn stack() -> NetworkStack<VirtualNic> {
    let config = StackConfig::default().with_static_ip(
        OUR_IP,
        Ipv4Addr::new(255, 255, 255, 0),
        PEER_IP,
    );
    NetworkStack::new(VirtualNic::new(OUR_MAC), config)
}

fn who_has_us() -> Vec<u8> {
    let request = ArpPacket::new_request(PEER_MAC, PEER_IP, OUR_IP);
    build_frame(MacAddr::BROADCAST, PEER_MAC, ETHERTYPE_ARP, &request.to_bytes()).unwrap()
}

#[test]
fn test_poll_drains_device() {
    let mut stack = stack();
    assert!(stack.device_mut().inject(who_has_us()));
    assert!(stack.device_mut().inject(vec![0u8; 8]));

    assert_eq!(stack.poll(), 2);
    assert_eq!(stack.poll(), 0);
    // one ARP reply; the runt frame was dropped
    assert_eq!(stack.device().transmitted_count(), 1);
    assert_eq!(stack.arp_cache().lookup(PEER_IP), Some(PEER_MAC));
}

#[test]
fn test_poll_budget() {
    let config = StackConfig {
        rx_queue_capacity: 2,
        ..StackConfig::default()
    };
    let mut stack = NetworkStack::new(VirtualNic::new(OUR_MAC), config);
    for _ in 0..3 {
        stack.device_mut().inject(vec![0u8; 8]);
    }
    assert_eq!(stack.poll(), 2);
    assert_eq!(stack.poll(), 1);
}

#[test]
fn test_link_down_reported() {
    let mut stack = stack();
    stack.device_mut().set_link_status(LinkStatus::Down);

    assert_eq!(
        stack.send_frame(PEER_MAC, ETHERTYPE_ARP, &[0; 28]),
        Err(TxError::Device(TransmitError::NotReady))
    );
    assert_eq!(stack.interface_info().link, LinkStatus::Down);

    // receive path is unaffected; only the reply fails
    stack.device_mut().inject(who_has_us());
    assert_eq!(stack.poll(), 1);
    assert_eq!(stack.arp_cache().lookup(PEER_IP), Some(PEER_MAC));
}

#[test]
fn test_interface_summary() {
    let info = stack().interface_info();
    let text = format!("{}", info);
    assert!(text.starts_with("vnic0: link Up"));
    assert!(text.contains("MAC:        52:54:00:12:34:56"));
    assert!(text.contains("10.0.2.15"));

    let unconfigured = NetworkStack::new(VirtualNic::new(OUR_MAC), StackConfig::default());
    assert!(format!("{}", unconfigured.interface_info()).contains("not configured"));
}

#[test]
fn test_malformed_frames_never_panic() {
    let mut stack = stack();
    for len in 0..80 {
        let mut frame = vec![0xFFu8; len];
        if len >= 14 {
            frame[12] = 0x08;
            frame[13] = if len % 2 == 0 { 0x00 } else { 0x06 };
        }
        if let Ok(delivered) = stack.handle_frame(&frame) {
            panic!("garbage frame delivered: {:?}", delivered);
        }
    }
    assert_eq!(stack.handle_frame(&[0u8; 13]), Err(DropReason::Malformed(Layer::Ethernet)));
}

//! interrupt receive queue and the RX task
//!
//! The queue is a process-wide static, so this binary holds a single test.

use core::net::Ipv4Addr;

use futures_util::FutureExt;
use mesa_net::drivers::net::virtual_nic::VirtualNic;
use mesa_net::drivers::net::{frame_received, init_rx_queue};
use mesa_net::net::arp::ArpPacket;
use mesa_net::net::config::StackConfig;
use mesa_net::net::ethernet::{build_frame, ETHERTYPE_ARP};
use mesa_net::net::MacAddr;
use mesa_net::task::{rx_task, CancellationToken};
use mesa_net::NetworkStack;

const OUR_MAC: [u8; 6] = [0x52, 0x54, 0x00, 0x12, 0x34, 0x56];
const OUR_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 2, 15);
const PEER_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 2, 2);
const PEER_MAC: MacAddr = MacAddr([0x52, 0x55, 0x0A, 0x00, 0x02, 0x02]);

fn who_has_us() -> Vec<u8> {
    let request = ArpPacket::new_request(PEER_MAC, PEER_IP, OUR_IP);
    build_frame(MacAddr::BROADCAST, PEER_MAC, ETHERTYPE_ARP, &request.to_bytes()).unwrap()
}

#[test]
fn test_interrupt_queue_and_rx_task() {
    // nothing parks frames before the queue exists
    assert!(!frame_received(who_has_us()));

    assert!(init_rx_queue(4));
    assert!(!init_rx_queue(16));

    let config = StackConfig::default().with_static_ip(
        OUR_IP,
        Ipv4Addr::new(255, 255, 255, 0),
        PEER_IP,
    );
    let shared = spin::Mutex::new(NetworkStack::new(VirtualNic::new(OUR_MAC), config));

    // poll() picks up frames parked by the interrupt handler
    assert!(frame_received(who_has_us()));
    assert_eq!(shared.lock().poll(), 1);
    assert_eq!(shared.lock().device_mut().take_transmitted().len(), 1);

    for _ in 0..4 {
        assert!(frame_received(vec![0u8; 8]));
    }
    assert!(!frame_received(vec![0u8; 8]));
    assert_eq!(shared.lock().poll(), 4);

    // the RX task drains the queue, then waits for the next interrupt
    let token = CancellationToken::new();
    assert!(frame_received(who_has_us()));
    assert!(rx_task(&shared, token.clone()).now_or_never().is_none());
    assert_eq!(shared.lock().device_mut().take_transmitted().len(), 1);

    // once cancelled, the next frame ends the task unhandled
    token.cancel();
    assert!(frame_received(who_has_us()));
    assert_eq!(rx_task(&shared, token).now_or_never(), Some(()));
    assert_eq!(shared.lock().device().transmitted_count(), 0);
}

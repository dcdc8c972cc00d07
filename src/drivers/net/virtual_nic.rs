//! In-memory network interface
//!
//! Records every transmitted frame and hands out injected frames from
//! `receive()`, so the stack can be driven without hardware. Frames can also
//! be looped back to emulate a loopback interface.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use super::{LinkStatus, NetworkDevice, TransmitError};

/// Largest frame accepted for transmit (Ethernet MTU plus header)
const MAX_FRAME_LEN: usize = 1514;

pub struct VirtualNic {
    mac_addr: [u8; 6],
    /// Frames waiting to be "received"
    rx_queue: VecDeque<Vec<u8>>,
    /// Frames the stack sent, oldest first
    tx_log: VecDeque<Vec<u8>>,
    /// Maximum queue size to prevent unbounded memory growth
    max_queue_size: usize,
    /// Echo transmitted frames back into the receive queue
    loopback: bool,
    link: LinkStatus,
}

impl VirtualNic {
    pub fn new(mac_addr: [u8; 6]) -> Self {
        Self::with_queue_size(mac_addr, 64)
    }

    pub fn with_queue_size(mac_addr: [u8; 6], max_queue_size: usize) -> Self {
        Self {
            mac_addr,
            rx_queue: VecDeque::with_capacity(max_queue_size),
            tx_log: VecDeque::new(),
            max_queue_size,
            loopback: false,
            link: LinkStatus::Up,
        }
    }

    /// Loopback device: all-zero MAC, every transmitted frame comes back.
    pub fn loopback() -> Self {
        let mut nic = Self::new([0; 6]);
        nic.loopback = true;
        nic
    }

    /// Queue a frame for the next `receive()`. Returns `false` when full.
    pub fn inject(&mut self, frame: Vec<u8>) -> bool {
        if self.rx_queue.len() >= self.max_queue_size {
            return false;
        }
        self.rx_queue.push_back(frame);
        true
    }

    /// Drain everything transmitted so far.
    pub fn take_transmitted(&mut self) -> Vec<Vec<u8>> {
        self.tx_log.drain(..).collect()
    }

    pub fn transmitted_count(&self) -> usize {
        self.tx_log.len()
    }

    pub fn set_link_status(&mut self, link: LinkStatus) {
        self.link = link;
    }
}

impl NetworkDevice for VirtualNic {
    fn mac_address(&self) -> [u8; 6] {
        self.mac_addr
    }

    fn transmit(&mut self, packet: &[u8]) -> Result<(), TransmitError> {
        if self.link == LinkStatus::Down {
            return Err(TransmitError::NotReady);
        }
        if packet.len() > MAX_FRAME_LEN {
            return Err(TransmitError::PacketTooLarge);
        }

        if self.loopback {
            if self.rx_queue.len() >= self.max_queue_size {
                return Err(TransmitError::BufferFull);
            }
            self.rx_queue.push_back(packet.to_vec());
        }
        self.tx_log.push_back(packet.to_vec());
        Ok(())
    }

    fn receive(&mut self) -> Option<Vec<u8>> {
        self.rx_queue.pop_front()
    }

    fn link_status(&self) -> LinkStatus {
        self.link
    }

    fn device_name(&self) -> &str {
        if self.loopback { "lo (loopback)" } else { "vnic0" }
    }

    fn is_ready(&self) -> bool {
        self.link != LinkStatus::Down
    }
}

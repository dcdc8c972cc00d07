// Network Device Abstraction Layer
pub mod virtual_nic;

use alloc::vec::Vec;
use core::pin::Pin;
use core::task::{Context, Poll};

use conquer_once::spin::OnceCell;
use crossbeam_queue::ArrayQueue;
use futures_util::stream::Stream;
use futures_util::task::AtomicWaker;

/// link status of a network interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Up,
    Down,
    Unknown,
}

/// Errors that can occur during packet transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitError {
    /// Packet too large for the device
    PacketTooLarge,
    /// TX buffer is full, try again later
    BufferFull,
    /// Device is not ready
    NotReady,
    /// Hardware error during transmission
    HardwareError,
}

/// Network device trait that all network drivers must implement
pub trait NetworkDevice: Send {
    /// Get the MAC address of this device
    fn mac_address(&self) -> [u8; 6];

    /// Transmit a packet
    ///
    /// # Arguments
    /// * `packet` - The raw Ethernet frame to transmit (including header)
    ///
    /// # Returns
    /// * `Ok(())` if the packet was queued for transmission
    /// * `Err(TransmitError)` if transmission failed
    fn transmit(&mut self, packet: &[u8]) -> Result<(), TransmitError>;

    /// Receive a packet if one is available (poll-mode drivers)
    ///
    /// Interrupt-driven drivers return `None` here and hand frames to
    /// [`frame_received`] from their interrupt handler instead.
    fn receive(&mut self) -> Option<Vec<u8>> {
        None
    }

    /// Get the current link status
    fn link_status(&self) -> LinkStatus {
        LinkStatus::Unknown
    }

    /// Get device name/identifier
    fn device_name(&self) -> &str;

    /// Check if the device is initialized and ready
    fn is_ready(&self) -> bool {
        true
    }
}

// Interrupt receive path
//
// The NIC interrupt handler cannot reach the stack, so frames are parked in a
// lock-free queue and the stack drains it from `poll()` or `FrameStream`.

static RX_QUEUE: OnceCell<ArrayQueue<Vec<u8>>> = OnceCell::uninit();
static RX_WAKER: AtomicWaker = AtomicWaker::new();

/// Create the interrupt receive queue. Returns `false` if it already exists.
pub fn init_rx_queue(capacity: usize) -> bool {
    RX_QUEUE
        .try_init_once(|| ArrayQueue::new(capacity.max(1)))
        .is_ok()
}

/// Called by the NIC interrupt handler for every received frame.
///
/// Must not block or allocate beyond the frame itself. Returns `false` when
/// the frame was dropped (queue missing or full).
pub fn frame_received(frame: Vec<u8>) -> bool {
    match RX_QUEUE.try_get() {
        Ok(queue) => {
            if queue.push(frame).is_err() {
                log::warn!("RX: interrupt queue full; dropping frame");
                false
            } else {
                RX_WAKER.wake();
                true
            }
        }
        Err(_) => {
            log::warn!("RX: interrupt queue uninitialized");
            false
        }
    }
}

/// Pop one frame parked by the interrupt handler.
pub fn take_received_frame() -> Option<Vec<u8>> {
    RX_QUEUE.try_get().ok().and_then(|queue| queue.pop())
}

/// Async stream over frames delivered by the interrupt handler.
pub struct FrameStream {
    _private: (),
}

impl FrameStream {
    pub fn new(capacity: usize) -> Self {
        init_rx_queue(capacity);
        FrameStream { _private: () }
    }
}

impl Stream for FrameStream {
    type Item = Vec<u8>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Vec<u8>>> {
        let queue = match RX_QUEUE.try_get() {
            Ok(queue) => queue,
            Err(_) => return Poll::Ready(None),
        };

        // fast path
        if let Some(frame) = queue.pop() {
            return Poll::Ready(Some(frame));
        }

        RX_WAKER.register(cx.waker());
        match queue.pop() {
            Some(frame) => {
                RX_WAKER.take();
                Poll::Ready(Some(frame))
            }
            None => Poll::Pending,
        }
    }
}

//! Timers, cancellation and the async glue that drives the stack.
//!
//! Nothing here busy-waits: long-running work (DHCP discovery, ping) is a
//! session advanced by `NetworkStack::tick`, and the async helpers yield to
//! the executor between rounds.

use alloc::sync::Arc;
use core::future::Future;
use core::net::Ipv4Addr;
use core::pin::Pin;
use core::sync::atomic::{AtomicBool, Ordering};
use core::task::{Context, Poll};

use futures_util::stream::StreamExt;

use crate::drivers::net::{FrameStream, NetworkDevice};
use crate::net::dhcp::{DhcpError, DhcpState};
use crate::net::stack::SharedStack;

/// Shared abort flag for a running session.
///
/// Clones observe the same flag, so the shell (or an ESC key handler) can hold
/// one copy and the stack another.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Fixed-interval retry schedule with an optional attempt budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryTimer {
    interval_ms: u64,
    next_deadline: u64,
    attempts: u32,
    max_attempts: Option<u32>,
}

impl RetryTimer {
    /// A fresh timer is due immediately.
    pub fn new(interval_ms: u64, max_attempts: Option<u32>) -> Self {
        Self {
            interval_ms,
            next_deadline: 0,
            attempts: 0,
            max_attempts,
        }
    }

    /// Note an attempt made at `now_ms` and arm the next deadline.
    pub fn record_attempt(&mut self, now_ms: u64) {
        self.attempts = self.attempts.saturating_add(1);
        self.next_deadline = now_ms.saturating_add(self.interval_ms);
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        !self.is_exhausted() && now_ms >= self.next_deadline
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_attempts.is_some_and(|max| self.attempts >= max)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn next_deadline(&self) -> u64 {
        self.next_deadline
    }
}

/// Monotonic millisecond clock (PIT ticks, TSC, or a test counter).
pub trait Clock {
    fn now_ms(&self) -> u64;
}

impl<F: Fn() -> u64> Clock for F {
    fn now_ms(&self) -> u64 {
        self()
    }
}

/// Yields execution to allow other tasks to run
///
/// This creates a future that returns Poll::Pending once, then Poll::Ready
/// on the next poll, effectively yielding to the scheduler.
pub async fn yield_now() {
    struct YieldNow {
        yielded: bool,
    }

    impl Future for YieldNow {
        type Output = ();

        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
            if self.yielded {
                Poll::Ready(())
            } else {
                self.yielded = true;
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        }
    }

    YieldNow { yielded: false }.await
}

/// Run DHCP discovery until the interface has an address.
///
/// Each round polls the device, advances the stack's timers and then yields.
/// Resolves with the leased address, or with an error once `token` is
/// cancelled or the configured attempt budget runs out.
pub async fn configure_via_dhcp<D, C>(
    stack: &SharedStack<D>,
    clock: &C,
    token: CancellationToken,
) -> Result<Ipv4Addr, DhcpError>
where
    D: NetworkDevice,
    C: Clock,
{
    stack.lock().dhcp_discover(clock.now_ms(), token)?;

    loop {
        {
            let mut net = stack.lock();
            net.poll();
            net.tick(clock.now_ms());

            let ip = net.get_ip();
            if !ip.is_unspecified() {
                return Ok(ip);
            }
            match net.dhcp_state() {
                DhcpState::Cancelled => return Err(DhcpError::Cancelled),
                DhcpState::Failed => return Err(DhcpError::AttemptsExhausted),
                _ => {}
            }
        }
        yield_now().await;
    }
}

/// RX Processing Task
///
/// Feeds frames parked by the NIC interrupt handler into the stack until
/// `token` is cancelled.
pub async fn rx_task<D: NetworkDevice>(stack: &SharedStack<D>, token: CancellationToken) {
    let capacity = stack.lock().config().rx_queue_capacity;
    let mut frames = FrameStream::new(capacity);
    log::info!("RX: task started");

    while let Some(frame) = frames.next().await {
        if token.is_cancelled() {
            break;
        }
        if let Err(reason) = stack.lock().handle_frame(&frame) {
            log::trace!("RX: dropped frame: {}", reason);
        }
    }

    log::info!("RX: task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_clones_share_state() {
        let token = CancellationToken::new();
        let handle = token.clone();
        assert!(!token.is_cancelled());
        handle.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_retry_timer_schedule() {
        let mut timer = RetryTimer::new(2000, Some(2));
        assert!(timer.is_due(0));

        timer.record_attempt(0);
        assert!(!timer.is_due(1999));
        assert!(timer.is_due(2000));

        timer.record_attempt(2000);
        assert!(timer.is_exhausted());
        assert!(!timer.is_due(10_000));
        assert_eq!(timer.attempts(), 2);
    }
}

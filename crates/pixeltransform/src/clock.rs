use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, Receiver, RecvTimeoutError, Sender};

/// One display refresh as delivered to the render thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTick {
    /// Monotonic timestamp of the refresh in nanoseconds.
    pub timestamp_nanos: i64,
}

/// Display frame clock driving the render thread.
///
/// Implementations block until the next refresh and must return `None`
/// promptly once `stop` receives a message or is disconnected.
pub trait FrameClock: Send + Sync {
    fn next_frame(&self, stop: &Receiver<()>) -> Option<FrameTick>;
}

/// Free running clock aligned to a fixed refresh rate.
///
/// Ticks land on multiples of the refresh period measured from creation.
/// Refreshes that pass while a frame is still being drawn are dropped, the
/// same way a compositor drops missed vsyncs.
#[derive(Debug)]
pub struct VsyncClock {
    origin: Instant,
    period_nanos: u64,
    last_frame: AtomicU64,
}

impl VsyncClock {
    /// Clock for a display refreshing `refresh_rate` times per second.
    /// A rate of zero is treated as one refresh per second. Rates above one
    /// refresh per nanosecond are clamped to it.
    pub fn new(refresh_rate: u32) -> Self {
        let period_nanos = (1_000_000_000 / u64::from(refresh_rate.max(1))).max(1);
        Self {
            origin: Instant::now(),
            period_nanos,
            last_frame: AtomicU64::new(0),
        }
    }

    pub fn period(&self) -> Duration {
        Duration::from_nanos(self.period_nanos)
    }
}

impl FrameClock for VsyncClock {
    fn next_frame(&self, stop: &Receiver<()>) -> Option<FrameTick> {
        let elapsed = self.origin.elapsed().as_nanos() as u64;
        let upcoming = elapsed / self.period_nanos + 1;
        let frame = upcoming.max(self.last_frame.load(Ordering::Acquire) + 1);
        let offset = frame.saturating_mul(self.period_nanos);
        let deadline = self.origin + Duration::from_nanos(offset);

        match stop.recv_deadline(deadline) {
            Err(RecvTimeoutError::Timeout) => {
                self.last_frame.store(frame, Ordering::Release);
                Some(FrameTick {
                    timestamp_nanos: offset as i64,
                })
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

/// Clock driven by an external vsync source through a [`FrameClockHandle`].
///
/// At most one tick is pending; ticks arriving while one is pending are
/// dropped. Dropping every handle ends the render loop.
#[derive(Debug)]
pub struct ChannelFrameClock {
    ticks: Receiver<FrameTick>,
}

/// Sending side of a [`ChannelFrameClock`].
#[derive(Debug, Clone)]
pub struct FrameClockHandle {
    ticks: Sender<FrameTick>,
}

pub fn channel_clock() -> (ChannelFrameClock, FrameClockHandle) {
    let (tx, rx) = bounded(1);
    (ChannelFrameClock { ticks: rx }, FrameClockHandle { ticks: tx })
}

impl FrameClockHandle {
    /// Delivers a refresh. Returns false when the tick was dropped because the
    /// previous one has not been consumed yet.
    pub fn tick(&self, timestamp_nanos: i64) -> bool {
        self.ticks.try_send(FrameTick { timestamp_nanos }).is_ok()
    }
}

impl FrameClock for ChannelFrameClock {
    fn next_frame(&self, stop: &Receiver<()>) -> Option<FrameTick> {
        select! {
            recv(stop) -> _ => None,
            recv(self.ticks) -> tick => tick.ok(),
        }
    }
}

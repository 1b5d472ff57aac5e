use std::sync::atomic::{AtomicU64, Ordering};

/// Counters describing what the render thread did with each frame tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Ticks delivered by the frame clock.
    pub ticks: u64,
    /// Ticks rejected by the frame-rate cap.
    pub throttled: u64,
    pub drawn: u64,
    pub skipped_unavailable: u64,
    pub skipped_no_buffer: u64,
    /// Draws where no swapchain image could be presented.
    pub skipped_no_image: u64,
    /// Frames ended by an error.
    pub aborted: u64,
    pub render_threads_spawned: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counter(AtomicU64);

impl Counter {
    pub(crate) fn bump(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub(crate) ticks: Counter,
    pub(crate) throttled: Counter,
    pub(crate) drawn: Counter,
    pub(crate) skipped_unavailable: Counter,
    pub(crate) skipped_no_buffer: Counter,
    pub(crate) skipped_no_image: Counter,
    pub(crate) aborted: Counter,
    pub(crate) render_threads_spawned: Counter,
}

impl StatsCounters {
    pub(crate) fn snapshot(&self) -> FrameStats {
        FrameStats {
            ticks: self.ticks.get(),
            throttled: self.throttled.get(),
            drawn: self.drawn.get(),
            skipped_unavailable: self.skipped_unavailable.get(),
            skipped_no_buffer: self.skipped_no_buffer.get(),
            skipped_no_image: self.skipped_no_image.get(),
            aborted: self.aborted.get(),
            render_threads_spawned: self.render_threads_spawned.get(),
        }
    }
}

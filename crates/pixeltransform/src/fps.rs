use std::time::Duration;

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Gates display ticks down to a requested frame rate.
///
/// The controller is fed the timestamp of every frame-clock tick and answers
/// whether that tick should produce a frame. Accepted ticks become the new
/// baseline, so the cap is measured between frames actually drawn rather
/// than against a fixed grid.
#[derive(Debug, Clone, Default)]
pub struct FpsController {
    frame_rate: u32,
    interval_nanos: u64,
    last_accepted: Option<i64>,
}

impl FpsController {
    pub fn new(frame_rate: u32) -> Self {
        let mut controller = Self::default();
        controller.set_frame_rate(frame_rate);
        controller
    }

    /// Sets the cap in frames per second; `0` accepts every tick.
    ///
    /// The baseline is cleared so the first tick after a change is drawn.
    pub fn set_frame_rate(&mut self, frame_rate: u32) {
        self.frame_rate = frame_rate;
        // Round up so an accepted tick can never come earlier than 1/rate.
        self.interval_nanos = if frame_rate == 0 {
            0
        } else {
            NANOS_PER_SECOND.div_ceil(u64::from(frame_rate))
        };
        self.last_accepted = None;
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    pub fn interval(&self) -> Option<Duration> {
        (self.interval_nanos > 0).then(|| Duration::from_nanos(self.interval_nanos))
    }

    /// Returns true when `timestamp_nanos` is far enough from the last
    /// accepted tick to honour the configured rate.
    pub fn advanced(&mut self, timestamp_nanos: i64) -> bool {
        let accept = match self.last_accepted {
            _ if self.interval_nanos == 0 => true,
            None => true,
            Some(last) => {
                let elapsed = timestamp_nanos.saturating_sub(last);
                elapsed >= 0 && elapsed as u64 >= self.interval_nanos
            }
        };
        if accept {
            self.last_accepted = Some(timestamp_nanos);
        }
        accept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepted(controller: &mut FpsController, step: i64, ticks: i64) -> Vec<i64> {
        (0..ticks)
            .map(|index| index * step)
            .filter(|&timestamp| controller.advanced(timestamp))
            .collect()
    }

    #[test]
    fn zero_rate_accepts_every_tick() {
        let mut controller = FpsController::new(0);
        assert_eq!(accepted(&mut controller, 16_666_667, 10).len(), 10);
        assert_eq!(controller.interval(), None);
    }

    #[test]
    fn thirty_fps_on_sixty_hz_takes_every_other_tick() {
        let mut controller = FpsController::new(30);
        let frames = accepted(&mut controller, 16_666_667, 12);
        assert_eq!(frames.len(), 6);
        assert!(frames.windows(2).all(|pair| pair[1] - pair[0] == 33_333_334));
    }

    #[test]
    fn acceptance_matches_elapsed_interval_for_many_rates() {
        for rate in [1_u32, 7, 24, 25, 30, 50, 59, 60] {
            for step in [4_000_000_i64, 8_333_333, 16_666_667, 33_333_333] {
                let mut controller = FpsController::new(rate);
                let interval = controller.interval().unwrap().as_nanos() as i64;
                let mut last: Option<i64> = None;
                for index in 0..240 {
                    let timestamp = 1_000 + index * step;
                    let expected = match last {
                        None => true,
                        Some(previous) => timestamp - previous >= interval,
                    };
                    assert_eq!(
                        controller.advanced(timestamp),
                        expected,
                        "rate={rate} step={step} tick={index}"
                    );
                    if expected {
                        last = Some(timestamp);
                    }
                }
            }
        }
    }

    #[test]
    fn interval_never_undershoots_one_over_rate() {
        let controller = FpsController::new(3);
        let interval = controller.interval().unwrap();
        assert!(interval.as_secs_f64() * 3.0 >= 1.0);
    }

    #[test]
    fn rate_change_resets_baseline() {
        let mut controller = FpsController::new(10);
        assert!(controller.advanced(0));
        assert!(!controller.advanced(50_000_000));
        controller.set_frame_rate(1);
        assert!(controller.advanced(60_000_000));
        assert!(!controller.advanced(500_000_000));
        assert!(controller.advanced(1_060_000_000));
    }
}

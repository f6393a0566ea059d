//! Frame freshness for live sources.
//!
//! Freshness is a health signal only. A stale stream is still open and keeps
//! being read; the next delivered frame makes it fresh again.

use std::time::{Duration, Instant};

const MIN_GRACE: Duration = Duration::from_millis(2_000);

#[derive(Clone, Debug)]
pub struct FrameHealth {
    grace: Duration,
    opened_at: Option<Instant>,
    last_frame_at: Option<Instant>,
}

impl FrameHealth {
    pub fn new(grace: Duration) -> Self {
        Self {
            grace,
            opened_at: None,
            last_frame_at: None,
        }
    }

    /// Six frame intervals at `target_fps`, and never less than two seconds.
    pub fn for_fps(target_fps: u32) -> Self {
        let grace = match target_fps {
            0 => MIN_GRACE,
            fps => (Duration::from_secs(1) / fps * 6).max(MIN_GRACE),
        };
        Self::new(grace)
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// The stream was opened at `now`; the first frame is due within `grace`.
    pub fn opened(&mut self, now: Instant) {
        self.opened_at = Some(now);
        self.last_frame_at = None;
    }

    pub fn record_frame(&mut self, now: Instant) {
        self.last_frame_at = Some(now);
    }

    pub fn is_fresh(&self, now: Instant) -> bool {
        match self.last_frame_at.or(self.opened_at) {
            Some(at) => now.saturating_duration_since(at) <= self.grace,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grace_scales_with_fps_but_has_a_floor() {
        assert_eq!(FrameHealth::for_fps(0).grace(), MIN_GRACE);
        assert_eq!(FrameHealth::for_fps(30).grace(), MIN_GRACE);
        assert_eq!(FrameHealth::for_fps(1).grace(), Duration::from_secs(6));
    }

    #[test]
    fn stale_stream_recovers_on_next_frame() {
        let mut health = FrameHealth::new(Duration::from_millis(50));
        let t0 = Instant::now();
        assert!(!health.is_fresh(t0));

        health.opened(t0);
        assert!(health.is_fresh(t0 + Duration::from_millis(50)));
        assert!(!health.is_fresh(t0 + Duration::from_millis(51)));

        health.record_frame(t0 + Duration::from_millis(200));
        assert!(health.is_fresh(t0 + Duration::from_millis(230)));
    }
}

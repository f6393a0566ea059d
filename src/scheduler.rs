//! Recurring frame task.
//!
//! The frame loop is scheduled at most once per session. Once scheduled it
//! becomes due every refresh interval until `stop` is called; the controller
//! only stops it when it leaves the `Running` state, which never happens in
//! normal operation.

use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct FrameScheduler {
    interval: Duration,
    next_due: Option<Instant>,
    scheduled_count: u32,
    ticks: u64,
}

impl FrameScheduler {
    pub fn new(refresh_rate: u32) -> Self {
        let interval = Duration::from_secs(1) / refresh_rate.max(1);
        Self {
            interval,
            next_due: None,
            scheduled_count: 0,
            ticks: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Schedule the recurring task. Returns false when already scheduled.
    pub fn schedule(&mut self, now: Instant) -> bool {
        if self.next_due.is_some() {
            return false;
        }
        self.next_due = Some(now);
        self.scheduled_count += 1;
        true
    }

    pub fn is_scheduled(&self) -> bool {
        self.next_due.is_some()
    }

    /// How many times `schedule` succeeded.
    pub fn scheduled_count(&self) -> u32 {
        self.scheduled_count
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.next_due.is_some_and(|due| now >= due)
    }

    /// Record that a tick ran and re-arm for the next refresh.
    ///
    /// If the host fell behind by more than one interval, the next tick is
    /// aligned to `now` instead of bursting to catch up.
    pub fn mark_ran(&mut self, now: Instant) {
        let Some(due) = self.next_due else {
            return;
        };
        self.ticks += 1;
        let next = due + self.interval;
        self.next_due = Some(if next <= now { now + self.interval } else { next });
    }

    /// Time until the next tick, if scheduled.
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.next_due.map(|due| due.saturating_duration_since(now))
    }

    pub fn stop(&mut self) {
        self.next_due = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedules_only_once() {
        let mut sched = FrameScheduler::new(60);
        let t0 = Instant::now();
        assert!(!sched.is_due(t0));
        assert!(sched.schedule(t0));
        assert!(!sched.schedule(t0));
        assert_eq!(sched.scheduled_count(), 1);
        assert!(sched.is_due(t0));
    }

    #[test]
    fn re_arms_after_each_tick() {
        let mut sched = FrameScheduler::new(10);
        let t0 = Instant::now();
        sched.schedule(t0);
        sched.mark_ran(t0);
        assert!(!sched.is_due(t0 + Duration::from_millis(50)));
        assert!(sched.is_due(t0 + Duration::from_millis(100)));
        assert_eq!(sched.ticks(), 1);
    }

    #[test]
    fn falls_back_to_now_when_late() {
        let mut sched = FrameScheduler::new(10);
        let t0 = Instant::now();
        sched.schedule(t0);
        let late = t0 + Duration::from_secs(2);
        sched.mark_ran(late);
        assert_eq!(
            sched.time_until_due(late),
            Some(Duration::from_millis(100))
        );
    }

    #[test]
    fn stop_clears_the_task() {
        let mut sched = FrameScheduler::new(60);
        let t0 = Instant::now();
        sched.schedule(t0);
        sched.stop();
        assert!(!sched.is_scheduled());
        assert!(!sched.is_due(t0));
    }
}

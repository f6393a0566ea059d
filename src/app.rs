//! Single-threaded host loop.
//!
//! Host events (load, tap, resize) are queued and drained in order on each
//! `pump`, followed by the acquisition poll and the frame task. Nothing runs
//! concurrently, so the controller needs no locking.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::frame::FrameSize;
use crate::indicator::LoadingIndicator;
use crate::lifecycle::{LifecycleController, LifecycleState};
use crate::render::{RenderStats, Renderer};
use crate::source::VideoSource;
use crate::track::PoseTracker;
use crate::trigger::{StartGate, TriggerEvent, TriggerMode};

/// How often to poll while waiting for the camera.
const ACQUISITION_POLL: Duration = Duration::from_millis(10);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostEvent {
    Load,
    Tap,
    Resize(FrameSize),
}

pub struct EventLoop<S, T, R, I> {
    controller: LifecycleController<S, T, R, I>,
    gate: StartGate,
    queue: VecDeque<HostEvent>,
}

impl<S, T, R, I> EventLoop<S, T, R, I>
where
    S: VideoSource,
    T: PoseTracker,
    R: Renderer,
    I: LoadingIndicator,
{
    pub fn new(controller: LifecycleController<S, T, R, I>, trigger: TriggerMode) -> Self {
        Self {
            controller,
            gate: StartGate::new(trigger),
            queue: VecDeque::new(),
        }
    }

    pub fn push(&mut self, event: HostEvent) {
        self.queue.push_back(event);
    }

    /// Drain queued events, deliver acquisition completion, and run the frame
    /// task if due. Returns the stats of a frame rendered during this pump.
    pub fn pump(&mut self, now: Instant) -> Option<RenderStats> {
        while let Some(event) = self.queue.pop_front() {
            match event {
                HostEvent::Load => self.trigger(TriggerEvent::Load, now),
                HostEvent::Tap => self.trigger(TriggerEvent::Tap, now),
                HostEvent::Resize(size) => self.controller.on_resize(size),
            }
        }
        self.controller.poll(now);
        self.controller.tick(now)
    }

    fn trigger(&mut self, event: TriggerEvent, now: Instant) {
        if self.gate.fire(event) {
            self.controller.start(now);
        }
    }

    /// How long the host may sleep before the next `pump`.
    pub fn next_wakeup(&self, now: Instant) -> Duration {
        match self.controller.state() {
            LifecycleState::Running => self
                .controller
                .scheduler()
                .time_until_due(now)
                .unwrap_or(ACQUISITION_POLL),
            _ => ACQUISITION_POLL,
        }
    }

    pub fn trigger_mode(&self) -> TriggerMode {
        self.gate.mode()
    }

    pub fn is_waiting_for_trigger(&self) -> bool {
        self.gate.is_armed()
    }

    pub fn controller(&self) -> &LifecycleController<S, T, R, I> {
        &self.controller
    }

    pub fn into_controller(self) -> LifecycleController<S, T, R, I> {
        self.controller
    }
}

//! Scripted tracker. Replays a fixed pose timeline instead of recognizing
//! a pattern, one step per `update` call.

use anyhow::{bail, Result};
use nalgebra::{Rotation3, Vector3};

use super::{MarkerObservation, PoseTracker};
use crate::assets::{CameraIntrinsics, MarkerPattern};
use crate::config::TrackerSettings;
use crate::frame::FrameView;
use crate::math::{self, Transform};

const PROJECTION_NEAR: f64 = 0.01;
const PROJECTION_FAR: f64 = 1000.0;

/// What happens after the last scripted step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptEnd {
    /// Start over from the first step.
    Cycle,
    /// Keep reporting the last step.
    Hold,
}

pub struct ScriptedTracker {
    script: Vec<Option<Transform>>,
    end: ScriptEnd,
    cursor: usize,
    pattern: Option<MarkerPattern>,
    projection: Option<Transform>,
    updates: u64,
}

impl ScriptedTracker {
    pub fn new(script: Vec<Option<Transform>>, end: ScriptEnd) -> Self {
        Self {
            script,
            end,
            cursor: 0,
            pattern: None,
            projection: None,
            updates: 0,
        }
    }

    /// A marker half a metre in front of the camera that slowly turns, then
    /// drops out of view for half a second every two seconds at 60 Hz.
    pub fn demo() -> Self {
        let script = (0..120)
            .map(|step| {
                if step >= 90 {
                    return None;
                }
                let angle = (step as f64 / 90.0) * std::f64::consts::FRAC_PI_2;
                let tilt = Rotation3::from_axis_angle(&Vector3::x_axis(), 0.6);
                let spin = Rotation3::from_axis_angle(&Vector3::y_axis(), angle);
                Some(math::translation(0.0, -0.05, -0.5) * (tilt * spin).to_homogeneous())
            })
            .collect();
        Self::new(script, ScriptEnd::Cycle)
    }

    pub fn pattern(&self) -> Option<&MarkerPattern> {
        self.pattern.as_ref()
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }

    fn next_step(&mut self) -> Option<Transform> {
        if self.script.is_empty() {
            return None;
        }
        let step = self.script[self.cursor.min(self.script.len() - 1)];
        self.cursor += 1;
        if self.cursor >= self.script.len() {
            self.cursor = match self.end {
                ScriptEnd::Cycle => 0,
                ScriptEnd::Hold => self.script.len() - 1,
            };
        }
        step
    }
}

impl PoseTracker for ScriptedTracker {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn init(&mut self, settings: &TrackerSettings, intrinsics: &CameraIntrinsics) -> Result<()> {
        if settings.max_detection_rate == 0 {
            bail!("max_detection_rate must be greater than zero");
        }
        let pattern = settings.pattern.load()?;
        log::info!(
            "ScriptedTracker: pattern {} ({}x{} cells), mode {:?}, camera {}",
            pattern.label,
            pattern.resolution,
            pattern.resolution,
            settings.detection_mode,
            intrinsics.image_size
        );
        self.pattern = Some(pattern);
        self.projection = Some(intrinsics.projection(PROJECTION_NEAR, PROJECTION_FAR));
        Ok(())
    }

    fn projection_matrix(&self) -> Option<Transform> {
        self.projection
    }

    fn update(&mut self, frame: &FrameView<'_>) -> Result<MarkerObservation> {
        if self.pattern.is_none() {
            bail!("tracker used before init");
        }
        if frame.pixels().is_empty() {
            bail!("frame {} has no pixel data", frame.sequence());
        }
        self.updates += 1;
        Ok(match self.next_step() {
            Some(pose) => MarkerObservation::found(pose, 0.9),
            None => MarkerObservation::lost(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameSize, PixelFormat, VideoFrame};

    fn frame() -> VideoFrame {
        VideoFrame::new(vec![0; 12], FrameSize::new(2, 2), PixelFormat::Rgb24, 1)
    }

    fn ready(script: Vec<Option<Transform>>, end: ScriptEnd) -> ScriptedTracker {
        let mut tracker = ScriptedTracker::new(script, end);
        tracker
            .init(&TrackerSettings::default(), &CameraIntrinsics::default())
            .unwrap();
        tracker
    }

    #[test]
    fn update_before_init_fails() {
        let mut tracker = ScriptedTracker::demo();
        let frame = frame();
        assert!(tracker.update(&frame.view()).is_err());
        assert!(tracker.projection_matrix().is_none());
    }

    #[test]
    fn init_publishes_projection_and_pattern() {
        let tracker = ready(vec![], ScriptEnd::Hold);
        assert_eq!(tracker.pattern().unwrap().label, "hiro");
        let p = tracker.projection_matrix().unwrap();
        assert_eq!(p[(3, 2)], -1.0);
    }

    #[test]
    fn cycles_through_script() {
        let pose = math::translation(0.0, 0.0, -1.0);
        let mut tracker = ready(vec![Some(pose), None], ScriptEnd::Cycle);
        let frame = frame();
        let view = frame.view();
        assert!(tracker.update(&view).unwrap().is_visible());
        assert!(!tracker.update(&view).unwrap().is_visible());
        assert_eq!(tracker.update(&view).unwrap().transform, Some(pose));
        assert_eq!(tracker.updates(), 3);
    }

    #[test]
    fn holds_last_step() {
        let mut tracker = ready(vec![None, Some(math::identity())], ScriptEnd::Hold);
        let frame = frame();
        let view = frame.view();
        tracker.update(&view).unwrap();
        for _ in 0..3 {
            assert!(tracker.update(&view).unwrap().is_visible());
        }
    }

    #[test]
    fn demo_script_loses_the_marker_periodically() {
        let mut tracker = ready(vec![], ScriptEnd::Cycle);
        tracker.script = ScriptedTracker::demo().script;
        let frame = frame();
        let view = frame.view();
        let visible = (0..120)
            .filter(|_| tracker.update(&view).unwrap().is_visible())
            .count();
        assert_eq!(visible, 90);
    }
}

mod observation;
pub mod scripted;

use anyhow::Result;

use crate::assets::CameraIntrinsics;
use crate::config::TrackerSettings;
use crate::frame::FrameView;
use crate::math::Transform;

pub use observation::MarkerObservation;
pub use scripted::ScriptedTracker;

/// Marker pose tracker.
///
/// Implementations wrap a marker recognition engine. The controller calls
/// `init` once while starting, then `update` once per rendered frame.
pub trait PoseTracker {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Load the pattern and adopt the camera intrinsics.
    fn init(&mut self, settings: &TrackerSettings, intrinsics: &CameraIntrinsics) -> Result<()>;

    /// Projection matrix derived from the camera intrinsics. Available after
    /// `init`.
    fn projection_matrix(&self) -> Option<Transform>;

    /// Look for the marker in `frame`.
    ///
    /// Implementations must treat the pixels as read-only and must not keep
    /// the view past the call.
    fn update(&mut self, frame: &FrameView<'_>) -> Result<MarkerObservation>;
}

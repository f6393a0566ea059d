//! Marker-anchored AR overlay.
//!
//! Captures a camera feed, tracks a planar fiducial marker in each frame and
//! renders a cube anchored to the marker's pose.
//!
//! # Architecture
//!
//! The crate's own logic is the session lifecycle; camera capture, marker
//! recognition and rasterization sit behind traits:
//!
//! - `source`: video sources (`VideoSource`; stub and V4L2)
//! - `track`: pose trackers (`PoseTracker`; scripted)
//! - `scene`: scene graph and perspective camera
//! - `render`: renderers (`Renderer`; headless)
//! - `indicator`: loading indicator shown during startup
//! - `trigger`: automatic or tap-gated start
//! - `scheduler`: the recurring frame task
//! - `lifecycle`: the controller tying the above together
//! - `app`: single-threaded host loop feeding events to the controller

pub mod app;
pub mod assets;
pub mod config;
pub mod frame;
pub mod indicator;
pub mod lifecycle;
pub mod math;
pub mod render;
pub mod scene;
pub mod scheduler;
pub mod source;
pub mod track;
pub mod trigger;

pub use app::{EventLoop, HostEvent};
pub use assets::{BuiltinPattern, CameraIntrinsics, CameraParamsRef, MarkerPattern, PatternRef};
pub use config::{Config, SourceSettings, TrackerSettings};
pub use frame::{FrameSize, FrameView, PixelFormat, VideoFrame};
pub use indicator::{ConsoleIndicator, IndicatorState, LoadingIndicator, RecordingIndicator, UiMode};
pub use lifecycle::{LifecycleController, LifecycleState, Session};
pub use math::Transform;
pub use render::{HeadlessRenderer, RenderStats, Renderer};
pub use scene::{MarkerScene, PerspectiveCamera, Scene};
pub use scheduler::FrameScheduler;
pub use source::{
    open_source, Acquisition, AcquisitionError, FrameHealth, SourceStats, StubSource, VideoSource,
};
pub use track::{MarkerObservation, PoseTracker, ScriptedTracker};
pub use trigger::{StartGate, TriggerMode};

//! Video sources.
//!
//! A video source acquires a camera stream and exposes the latest frame as an
//! opaque `VideoFrame`. Acquisition is asynchronous from the controller's point
//! of view: `request_access` starts it and `poll_acquisition` reports the
//! outcome exactly once.
//!
//! - `stub://` URLs: synthetic frames (tests, demos)
//! - `/dev/videoN` paths: V4L2 devices (feature: source-v4l2)

mod error;
mod health;
pub mod stub;
#[cfg(feature = "source-v4l2")]
pub mod v4l2;

use std::time::{Duration, Instant};

use anyhow::Result;

use crate::config::SourceSettings;
use crate::frame::{FrameSize, VideoFrame};

pub use error::AcquisitionError;
pub use health::FrameHealth;
pub use stub::StubSource;
#[cfg(feature = "source-v4l2")]
pub use v4l2::V4l2Source;

/// Outcome of polling an in-flight acquisition.
#[derive(Debug)]
pub enum Acquisition {
    /// Nothing to report (still waiting, or already reported).
    Pending,
    /// Stream is live at the given native size.
    Ready(FrameSize),
    /// Acquisition failed. Sources do not retry.
    Failed(AcquisitionError),
}

/// Counters reported by a source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub url: String,
}

pub trait VideoSource {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Begin camera acquisition. Called at most once by the controller.
    fn request_access(&mut self, now: Instant) -> Result<()>;

    /// Report acquisition completion. Returns `Ready`/`Failed` once, then
    /// `Pending` forever after.
    fn poll_acquisition(&mut self, now: Instant) -> Acquisition;

    /// True once the stream is open with a live frame buffer. Stays true
    /// while frames are late; see `is_healthy`.
    fn is_ready(&self) -> bool;

    /// True while frames are arriving on time. Reported for monitoring only.
    fn is_healthy(&self, _now: Instant) -> bool {
        self.is_ready()
    }

    /// Native dimensions of the stream, once known.
    fn native_size(&self) -> Option<FrameSize>;

    /// Latest frame, or `None` when nothing new is available.
    fn latest_frame(&mut self) -> Result<Option<VideoFrame>>;

    fn stats(&self) -> SourceStats;

    /// How long to wait before logging that acquisition looks stuck.
    fn stall_warning_after(&self) -> Duration {
        Duration::from_secs(10)
    }
}

impl<V: VideoSource + ?Sized> VideoSource for Box<V> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn request_access(&mut self, now: Instant) -> Result<()> {
        (**self).request_access(now)
    }

    fn poll_acquisition(&mut self, now: Instant) -> Acquisition {
        (**self).poll_acquisition(now)
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn is_healthy(&self, now: Instant) -> bool {
        (**self).is_healthy(now)
    }

    fn native_size(&self) -> Option<FrameSize> {
        (**self).native_size()
    }

    fn latest_frame(&mut self) -> Result<Option<VideoFrame>> {
        (**self).latest_frame()
    }

    fn stats(&self) -> SourceStats {
        (**self).stats()
    }

    fn stall_warning_after(&self) -> Duration {
        (**self).stall_warning_after()
    }
}

/// Build the source named by `settings.url`.
pub fn open_source(settings: &SourceSettings) -> Result<Box<dyn VideoSource>> {
    if settings.url.starts_with("stub://") {
        return Ok(Box::new(StubSource::new(settings.clone())));
    }
    #[cfg(feature = "source-v4l2")]
    {
        Ok(Box::new(V4l2Source::new(settings.clone())))
    }
    #[cfg(not(feature = "source-v4l2"))]
    {
        anyhow::bail!(
            "camera source {} requires the source-v4l2 feature",
            settings.url
        )
    }
}

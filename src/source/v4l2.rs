//! V4L2 camera source.
//!
//! Opens a local device node (e.g. /dev/video0) when access is requested,
//! negotiates RGB3 at the configured size and frame rate, and hands out the
//! most recent capture buffer as a `VideoFrame`.

use std::time::Instant;

use anyhow::{Context, Result};
use ouroboros::self_referencing;

use super::{Acquisition, AcquisitionError, FrameHealth, SourceStats, VideoSource};
use crate::config::SourceSettings;
use crate::frame::{FrameSize, PixelFormat, VideoFrame};

pub struct V4l2Source {
    settings: SourceSettings,
    state: Option<V4l2State>,
    pending: Option<Acquisition>,
    active_size: Option<FrameSize>,
    frame_count: u64,
    health: FrameHealth,
}

#[self_referencing]
struct V4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Source {
    pub fn new(settings: SourceSettings) -> Self {
        Self {
            state: None,
            pending: None,
            active_size: None,
            frame_count: 0,
            health: FrameHealth::for_fps(settings.target_fps),
            settings,
        }
    }

    fn open(&mut self) -> std::result::Result<(V4l2State, FrameSize), AcquisitionError> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let path = self.settings.url.clone();
        let mut device = v4l::Device::with_path(&path).map_err(|err| classify(&path, err))?;
        let mut format = device
            .format()
            .map_err(|err| AcquisitionError::Device(err.to_string()))?;
        format.width = self.settings.width;
        format.height = self.settings.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = device
            .set_format(&format)
            .map_err(|err| AcquisitionError::Unsupported(err.to_string()))?;
        if format.fourcc != v4l::FourCC::new(b"RGB3") {
            return Err(AcquisitionError::Unsupported(format!(
                "{} offers {} instead of RGB3",
                path, format.fourcc
            )));
        }

        if self.settings.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.settings.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("V4l2Source: failed to set fps on {}: {}", path, err);
            }
        }

        let size = FrameSize::new(format.width, format.height);
        let state = V4l2StateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| AcquisitionError::Device(err.to_string()))
            },
        }
        .try_build()?;
        Ok((state, size))
    }
}

fn classify(path: &str, err: std::io::Error) -> AcquisitionError {
    match err.kind() {
        std::io::ErrorKind::PermissionDenied => AcquisitionError::PermissionDenied,
        std::io::ErrorKind::NotFound => AcquisitionError::NoDevice(path.to_string()),
        _ => AcquisitionError::Device(err.to_string()),
    }
}

impl VideoSource for V4l2Source {
    fn name(&self) -> &'static str {
        "v4l2"
    }

    fn request_access(&mut self, now: Instant) -> Result<()> {
        if self.pending.is_some() || self.state.is_some() {
            anyhow::bail!("camera access already requested");
        }
        // Opening is synchronous; the outcome is held until the next poll so
        // the controller sees it through the same path as any other source.
        self.pending = Some(match self.open() {
            Ok((state, size)) => {
                log::info!("V4l2Source: opened {} ({})", self.settings.url, size);
                self.state = Some(state);
                self.active_size = Some(size);
                self.health.opened(now);
                Acquisition::Ready(size)
            }
            Err(err) => Acquisition::Failed(err),
        });
        Ok(())
    }

    fn poll_acquisition(&mut self, _now: Instant) -> Acquisition {
        self.pending.take().unwrap_or(Acquisition::Pending)
    }

    fn is_ready(&self) -> bool {
        self.state.is_some()
    }

    fn is_healthy(&self, now: Instant) -> bool {
        self.is_ready() && self.health.is_fresh(now)
    }

    fn native_size(&self) -> Option<FrameSize> {
        self.active_size
    }

    fn latest_frame(&mut self) -> Result<Option<VideoFrame>> {
        use v4l::io::traits::CaptureStream;

        let Some(size) = self.active_size else {
            return Ok(None);
        };
        let Some(state) = self.state.as_mut() else {
            return Ok(None);
        };
        let data = state
            .with_mut(|fields| fields.stream.next().map(|(buf, _meta)| buf.to_vec()))
            .context("capture v4l2 frame")?;

        self.frame_count += 1;
        self.health.record_frame(Instant::now());
        Ok(Some(VideoFrame::new(
            data,
            size,
            PixelFormat::Rgb24,
            self.frame_count,
        )))
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            url: self.settings.url.clone(),
        }
    }
}

//! Synthetic video source for `stub://` URLs.
//!
//! - `stub://denied` fails acquisition with `PermissionDenied`
//! - `stub://missing` fails acquisition with `NoDevice`
//! - any other `stub://` name becomes ready `ready_after` the request
//!
//! Frames are generated RGB gradients that shift every frame.

use std::time::Instant;

use anyhow::{anyhow, Result};

use super::{Acquisition, AcquisitionError, SourceStats, VideoSource};
use crate::config::SourceSettings;
use crate::frame::{FrameSize, PixelFormat, VideoFrame};

#[derive(Debug)]
enum StubState {
    Idle,
    Acquiring { requested_at: Instant },
    Live,
    Reported,
}

pub struct StubSource {
    settings: SourceSettings,
    state: StubState,
    frame_count: u64,
}

impl StubSource {
    pub fn new(settings: SourceSettings) -> Self {
        Self {
            settings,
            state: StubState::Idle,
            frame_count: 0,
        }
    }

    fn scripted_failure(&self) -> Option<AcquisitionError> {
        match self.settings.url.trim_start_matches("stub://") {
            "denied" => Some(AcquisitionError::PermissionDenied),
            "missing" => Some(AcquisitionError::NoDevice(self.settings.url.clone())),
            _ => None,
        }
    }

    fn size(&self) -> FrameSize {
        FrameSize::new(self.settings.width, self.settings.height)
    }

    fn generate_pixels(&self) -> Vec<u8> {
        let size = self.size();
        let pixel_count = size.width as usize * size.height as usize;
        let mut pixels = vec![0u8; pixel_count * PixelFormat::Rgb24.bytes_per_pixel()];
        for (i, px) in pixels.chunks_exact_mut(3).enumerate() {
            let x = (i % size.width as usize) as u64;
            let y = (i / size.width as usize) as u64;
            px[0] = ((x + self.frame_count) % 256) as u8;
            px[1] = ((y + self.frame_count) % 256) as u8;
            px[2] = (self.frame_count % 256) as u8;
        }
        pixels
    }
}

impl VideoSource for StubSource {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn request_access(&mut self, now: Instant) -> Result<()> {
        match self.state {
            StubState::Idle => {
                log::info!("StubSource: requesting {} (synthetic)", self.settings.url);
                self.state = StubState::Acquiring { requested_at: now };
                Ok(())
            }
            _ => Err(anyhow!("camera access already requested")),
        }
    }

    fn poll_acquisition(&mut self, now: Instant) -> Acquisition {
        let StubState::Acquiring { requested_at } = self.state else {
            return Acquisition::Pending;
        };
        if let Some(err) = self.scripted_failure() {
            self.state = StubState::Reported;
            return Acquisition::Failed(err);
        }
        if now.saturating_duration_since(requested_at) < self.settings.ready_after {
            return Acquisition::Pending;
        }
        self.state = StubState::Live;
        Acquisition::Ready(self.size())
    }

    fn is_ready(&self) -> bool {
        matches!(self.state, StubState::Live)
    }

    fn native_size(&self) -> Option<FrameSize> {
        self.is_ready().then(|| self.size())
    }

    fn latest_frame(&mut self) -> Result<Option<VideoFrame>> {
        if !self.is_ready() {
            return Ok(None);
        }
        self.frame_count += 1;
        let pixels = self.generate_pixels();
        Ok(Some(VideoFrame::new(
            pixels,
            self.size(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn stub(url: &str, ready_after: Duration) -> StubSource {
        StubSource::new(SourceSettings {
            url: url.to_string(),
            width: 8,
            height: 4,
            target_fps: 30,
            ready_after,
        })
    }

    #[test]
    fn becomes_ready_after_delay() -> Result<()> {
        let mut source = stub("stub://webcam", Duration::from_millis(500));
        let t0 = Instant::now();
        source.request_access(t0)?;

        assert!(matches!(
            source.poll_acquisition(t0 + Duration::from_millis(499)),
            Acquisition::Pending
        ));
        assert!(!source.is_ready());
        assert!(source.latest_frame()?.is_none());

        match source.poll_acquisition(t0 + Duration::from_millis(500)) {
            Acquisition::Ready(size) => assert_eq!(size, FrameSize::new(8, 4)),
            other => panic!("expected ready, got {other:?}"),
        }
        assert!(source.is_ready());
        assert_eq!(source.native_size(), Some(FrameSize::new(8, 4)));

        // Completion is reported once.
        assert!(matches!(
            source.poll_acquisition(t0 + Duration::from_secs(1)),
            Acquisition::Pending
        ));
        Ok(())
    }

    #[test]
    fn scripted_failures_report_once() -> Result<()> {
        let mut source = stub("stub://denied", Duration::ZERO);
        let t0 = Instant::now();
        source.request_access(t0)?;
        assert!(matches!(
            source.poll_acquisition(t0),
            Acquisition::Failed(AcquisitionError::PermissionDenied)
        ));
        assert!(matches!(source.poll_acquisition(t0), Acquisition::Pending));
        assert!(!source.is_ready());

        let mut source = stub("stub://missing", Duration::ZERO);
        source.request_access(t0)?;
        assert!(matches!(
            source.poll_acquisition(t0),
            Acquisition::Failed(AcquisitionError::NoDevice(_))
        ));
        Ok(())
    }

    #[test]
    fn second_request_is_rejected() -> Result<()> {
        let mut source = stub("stub://webcam", Duration::ZERO);
        source.request_access(Instant::now())?;
        assert!(source.request_access(Instant::now()).is_err());
        Ok(())
    }

    #[test]
    fn frames_are_sequenced_rgb() -> Result<()> {
        let mut source = stub("stub://webcam", Duration::ZERO);
        let t0 = Instant::now();
        source.request_access(t0)?;
        source.poll_acquisition(t0);

        let f1 = source.latest_frame()?.expect("frame");
        let f2 = source.latest_frame()?.expect("frame");
        assert_eq!(f1.sequence, 1);
        assert_eq!(f2.sequence, 2);
        assert_eq!(f1.byte_len(), 8 * 4 * 3);
        assert_ne!(f1.view().pixels(), f2.view().pixels());
        assert_eq!(source.stats().frames_captured, 2);
        Ok(())
    }
}

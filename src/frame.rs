//! Frame buffer handles.
//!
//! - `VideoFrame`: owned frame captured by a video source. Pixels are private.
//! - `FrameView`: borrowed view handed to the pose tracker for one update.
//!
//! The lifecycle controller moves frames from the source to the tracker
//! without inspecting pixel data.

use std::fmt;

/// Pixel dimensions of a frame or a render target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width over height. Empty sizes report an aspect of 1.0.
    pub fn aspect(&self) -> f64 {
        if self.is_empty() {
            return 1.0;
        }
        self.width as f64 / self.height as f64
    }

    /// Parse a `WIDTHxHEIGHT` string such as `1280x720`.
    pub fn parse(value: &str) -> Option<Self> {
        let (w, h) = value.trim().split_once(['x', 'X'])?;
        let width = w.trim().parse().ok()?;
        let height = h.trim().parse().ok()?;
        let size = Self::new(width, height);
        (!size.is_empty()).then_some(size)
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pixel layout of a captured frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb24,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgb24 => 3,
        }
    }
}

/// A captured video frame. There is no byte accessor; only trackers see
/// pixels, through `FrameView::pixels`.
///
/// ```compile_fail
/// use marker_overlay::{FrameSize, PixelFormat, VideoFrame};
///
/// let frame = VideoFrame::new(vec![0; 3], FrameSize::new(1, 1), PixelFormat::Rgb24, 0);
/// let _bytes = frame.data;
/// ```
pub struct VideoFrame {
    data: Vec<u8>,
    pub size: FrameSize,
    pub format: PixelFormat,
    /// Monotonic sequence number assigned by the source.
    pub sequence: u64,
}

impl VideoFrame {
    pub fn new(data: Vec<u8>, size: FrameSize, format: PixelFormat, sequence: u64) -> Self {
        Self {
            data,
            size,
            format,
            sequence,
        }
    }

    pub fn view(&self) -> FrameView<'_> {
        FrameView { frame: self }
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

impl fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoFrame")
            .field("size", &self.size)
            .field("format", &self.format)
            .field("sequence", &self.sequence)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Borrowed view of a frame for a single tracker update.
#[derive(Clone, Copy)]
pub struct FrameView<'a> {
    frame: &'a VideoFrame,
}

impl<'a> FrameView<'a> {
    pub fn size(&self) -> FrameSize {
        self.frame.size
    }

    pub fn sequence(&self) -> u64 {
        self.frame.sequence
    }

    pub fn format(&self) -> PixelFormat {
        self.frame.format
    }

    pub fn pixels(&self) -> &'a [u8] {
        &self.frame.data
    }
}

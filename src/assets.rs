//! Tracker assets: marker pattern and camera intrinsics references.
//!
//! Both are static inputs resolved once when the tracker is configured.
//! References are written as:
//!
//! - pattern: `hiro`, `kanji`, a local `.patt` path, or an `http(s)://` URL
//! - camera parameters: `default`, a local `camera_para.dat` path, or a URL
//!
//! URLs require the `remote-assets` feature.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};

use crate::frame::FrameSize;
use crate::math::Transform;

/// Size of an ARToolKit `camera_para.dat` record.
const CAMERA_PARA_LEN: usize = 136;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuiltinPattern {
    Hiro,
    Kanji,
}

impl BuiltinPattern {
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinPattern::Hiro => "hiro",
            BuiltinPattern::Kanji => "kanji",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PatternRef {
    Builtin(BuiltinPattern),
    File(PathBuf),
    Url(String),
}

impl Default for PatternRef {
    fn default() -> Self {
        PatternRef::Builtin(BuiltinPattern::Hiro)
    }
}

impl fmt::Display for PatternRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternRef::Builtin(p) => write!(f, "builtin:{}", p.name()),
            PatternRef::File(path) => write!(f, "{}", path.display()),
            PatternRef::Url(url) => f.write_str(url),
        }
    }
}

impl PatternRef {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            bail!("pattern reference must not be empty");
        }
        Ok(match raw.to_ascii_lowercase().as_str() {
            "hiro" => PatternRef::Builtin(BuiltinPattern::Hiro),
            "kanji" => PatternRef::Builtin(BuiltinPattern::Kanji),
            _ if is_remote(raw) => PatternRef::Url(raw.to_string()),
            _ => PatternRef::File(PathBuf::from(raw)),
        })
    }

    /// Resolve the reference into a validated pattern.
    pub fn load(&self) -> Result<MarkerPattern> {
        match self {
            PatternRef::Builtin(builtin) => Ok(MarkerPattern {
                label: builtin.name().to_string(),
                resolution: 16,
            }),
            PatternRef::File(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read pattern file {}", path.display()))?;
                MarkerPattern::parse(&path.display().to_string(), &text)
            }
            PatternRef::Url(url) => {
                let bytes = fetch_remote(url)?;
                let text = String::from_utf8(bytes)
                    .map_err(|_| anyhow!("pattern {} is not a text .patt file", url))?;
                MarkerPattern::parse(url, &text)
            }
        }
    }
}

/// A fiducial pattern description accepted by the tracker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkerPattern {
    pub label: String,
    /// Side length of the pattern grid in cells.
    pub resolution: usize,
}

impl MarkerPattern {
    /// Check a `.patt` text body: four orientations, three colour planes,
    /// each an N×N grid of 0..=255 values.
    pub fn parse(label: &str, text: &str) -> Result<Self> {
        let mut count = 0usize;
        for token in text.split_whitespace() {
            let value: u32 = token
                .parse()
                .map_err(|_| anyhow!("pattern {}: invalid value {:?}", label, token))?;
            if value > 255 {
                bail!("pattern {}: value {} out of range", label, value);
            }
            count += 1;
        }
        if count == 0 || count % 12 != 0 {
            bail!(
                "pattern {}: expected 4 orientations x 3 colours of cells, got {} values",
                label,
                count
            );
        }
        let cells = count / 12;
        let resolution = (cells as f64).sqrt().round() as usize;
        if resolution * resolution != cells {
            bail!("pattern {}: {} cells per plane is not a square grid", label, cells);
        }
        Ok(Self {
            label: label.to_string(),
            resolution,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CameraParamsRef {
    #[default]
    Default,
    File(PathBuf),
    Url(String),
}

impl fmt::Display for CameraParamsRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraParamsRef::Default => f.write_str("default"),
            CameraParamsRef::File(path) => write!(f, "{}", path.display()),
            CameraParamsRef::Url(url) => f.write_str(url),
        }
    }
}

impl CameraParamsRef {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            bail!("camera parameters reference must not be empty");
        }
        Ok(if raw.eq_ignore_ascii_case("default") {
            CameraParamsRef::Default
        } else if is_remote(raw) {
            CameraParamsRef::Url(raw.to_string())
        } else {
            CameraParamsRef::File(PathBuf::from(raw))
        })
    }

    pub fn load(&self) -> Result<CameraIntrinsics> {
        match self {
            CameraParamsRef::Default => Ok(CameraIntrinsics::default()),
            CameraParamsRef::File(path) => CameraIntrinsics::read(path),
            CameraParamsRef::Url(url) => CameraIntrinsics::decode(&fetch_remote(url)?)
                .with_context(|| format!("invalid camera parameters from {}", url)),
        }
    }
}

/// Pinhole intrinsics for the capture device.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraIntrinsics {
    pub image_size: FrameSize,
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl Default for CameraIntrinsics {
    fn default() -> Self {
        Self {
            image_size: FrameSize::new(640, 480),
            fx: 700.0,
            fy: 700.0,
            cx: 320.0,
            cy: 240.0,
        }
    }
}

impl CameraIntrinsics {
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read camera parameters {}", path.display()))?;
        Self::decode(&bytes)
            .with_context(|| format!("invalid camera parameters {}", path.display()))
    }

    /// Decode an ARToolKit `camera_para.dat` record (big-endian).
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < CAMERA_PARA_LEN {
            bail!(
                "camera parameter record is {} bytes, expected {}",
                bytes.len(),
                CAMERA_PARA_LEN
            );
        }
        let i32_at = |offset: usize| -> Result<i32> {
            let raw: [u8; 4] = bytes[offset..offset + 4].try_into()?;
            Ok(i32::from_be_bytes(raw))
        };
        let f64_at = |offset: usize| -> Result<f64> {
            let raw: [u8; 8] = bytes[offset..offset + 8].try_into()?;
            Ok(f64::from_be_bytes(raw))
        };
        let width = i32_at(0)?;
        let height = i32_at(4)?;
        if width <= 0 || height <= 0 {
            bail!("camera image size {}x{} is not positive", width, height);
        }
        // mat[3][4] starts at byte 8, row-major.
        let mat = |row: usize, col: usize| f64_at(8 + (row * 4 + col) * 8);
        let intrinsics = Self {
            image_size: FrameSize::new(width as u32, height as u32),
            fx: mat(0, 0)?,
            fy: mat(1, 1)?,
            cx: mat(0, 2)?,
            cy: mat(1, 2)?,
        };
        if !(intrinsics.fx > 0.0 && intrinsics.fy > 0.0) {
            bail!("camera focal lengths must be positive");
        }
        Ok(intrinsics)
    }

    /// OpenGL projection matching these intrinsics.
    pub fn projection(&self, near: f64, far: f64) -> Transform {
        let w = self.image_size.width as f64;
        let h = self.image_size.height as f64;
        let mut m = Transform::zeros();
        m[(0, 0)] = 2.0 * self.fx / w;
        m[(0, 2)] = 1.0 - 2.0 * self.cx / w;
        m[(1, 1)] = 2.0 * self.fy / h;
        m[(1, 2)] = 2.0 * self.cy / h - 1.0;
        m[(2, 2)] = -(far + near) / (far - near);
        m[(2, 3)] = -2.0 * far * near / (far - near);
        m[(3, 2)] = -1.0;
        m
    }
}

fn is_remote(raw: &str) -> bool {
    raw.starts_with("http://") || raw.starts_with("https://")
}

#[cfg(feature = "remote-assets")]
fn fetch_remote(raw: &str) -> Result<Vec<u8>> {
    use std::io::Read;

    let url = url::Url::parse(raw).with_context(|| format!("invalid asset url {}", raw))?;
    let response = ureq::get(url.as_str())
        .call()
        .with_context(|| format!("fetch {}", url))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut bytes)
        .with_context(|| format!("read {}", url))?;
    if bytes.is_empty() {
        bail!("{} returned an empty body", url);
    }
    Ok(bytes)
}

#[cfg(not(feature = "remote-assets"))]
fn fetch_remote(raw: &str) -> Result<Vec<u8>> {
    Err(anyhow!(
        "fetching {} requires the remote-assets feature; download it and use a local path",
        raw
    ))
}

#[cfg(test)]
pub(crate) fn encode_camera_para(width: i32, height: i32, fx: f64, fy: f64, cx: f64, cy: f64) -> Vec<u8> {
    let mut out = Vec::with_capacity(CAMERA_PARA_LEN);
    out.extend_from_slice(&width.to_be_bytes());
    out.extend_from_slice(&height.to_be_bytes());
    let mat = [
        [fx, 0.0, cx, 0.0],
        [0.0, fy, cy, 0.0],
        [0.0, 0.0, 1.0, 0.0],
    ];
    for row in mat {
        for v in row {
            out.extend_from_slice(&v.to_be_bytes());
        }
    }
    for v in [cx, cy, 0.0, 1.0] {
        out.extend_from_slice(&v.to_be_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pattern_references() {
        assert_eq!(PatternRef::parse("Hiro").unwrap(), PatternRef::default());
        assert_eq!(
            PatternRef::parse("kanji").unwrap(),
            PatternRef::Builtin(BuiltinPattern::Kanji)
        );
        assert_eq!(
            PatternRef::parse("./patt.custom").unwrap(),
            PatternRef::File(PathBuf::from("./patt.custom"))
        );
        assert!(matches!(
            PatternRef::parse("https://example.org/patt.hiro").unwrap(),
            PatternRef::Url(_)
        ));
        assert!(PatternRef::parse("  ").is_err());
    }

    #[test]
    fn validates_pattern_grids() {
        let text = vec!["255"; 4 * 3 * 16 * 16].join(" ");
        let pattern = MarkerPattern::parse("custom", &text).unwrap();
        assert_eq!(pattern.resolution, 16);

        let short = vec!["0"; 100].join(" ");
        assert!(MarkerPattern::parse("short", &short).is_err());
        assert!(MarkerPattern::parse("bad", "1 2 x").is_err());
        assert!(MarkerPattern::parse("range", &vec!["256"; 12].join(" ")).is_err());
    }

    #[test]
    fn decodes_camera_para_records() {
        let bytes = encode_camera_para(640, 480, 669.4, 628.6, 324.5, 239.5);
        assert_eq!(bytes.len(), CAMERA_PARA_LEN);
        let intrinsics = CameraIntrinsics::decode(&bytes).unwrap();
        assert_eq!(intrinsics.image_size, FrameSize::new(640, 480));
        assert_eq!(intrinsics.fx, 669.4);
        assert_eq!(intrinsics.cy, 239.5);

        assert!(CameraIntrinsics::decode(&bytes[..100]).is_err());
        let bad = encode_camera_para(0, 480, 669.4, 628.6, 324.5, 239.5);
        assert!(CameraIntrinsics::decode(&bad).is_err());
    }

    #[test]
    fn centred_projection_has_no_skew_terms() {
        let p = CameraIntrinsics::default().projection(0.01, 1000.0);
        assert!((p[(0, 0)] - 2.0 * 700.0 / 640.0).abs() < 1e-12);
        assert!((p[(1, 1)] - 2.0 * 700.0 / 480.0).abs() < 1e-12);
        assert!(p[(0, 2)].abs() < 1e-12);
        assert!(p[(1, 2)].abs() < 1e-12);
        assert_eq!(p[(3, 2)], -1.0);
    }

    #[cfg(not(feature = "remote-assets"))]
    #[test]
    fn urls_need_remote_assets() {
        let err = CameraParamsRef::Url("https://example.org/camera_para.dat".into())
            .load()
            .unwrap_err();
        assert!(err.to_string().contains("remote-assets"));
    }
}

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::assets::{CameraParamsRef, PatternRef};
use crate::frame::FrameSize;
use crate::trigger::TriggerMode;

const DEFAULT_SOURCE_URL: &str = "stub://webcam";
const DEFAULT_SOURCE_WIDTH: u32 = 640;
const DEFAULT_SOURCE_HEIGHT: u32 = 480;
const DEFAULT_SOURCE_FPS: u32 = 30;
const DEFAULT_VIEWPORT_WIDTH: u32 = 1280;
const DEFAULT_VIEWPORT_HEIGHT: u32 = 720;
const DEFAULT_MAX_DETECTION_RATE: u32 = 60;
const DEFAULT_REFRESH_RATE: u32 = 60;
const DEFAULT_FOV_DEG: f64 = 75.0;
const DEFAULT_NEAR: f64 = 0.1;
const DEFAULT_FAR: f64 = 1000.0;
const DEFAULT_CUBE_SIZE: f64 = 0.1;
const DEFAULT_CUBE_COLOR: u32 = 0xff0000;

pub const CONFIG_ENV: &str = "MARKER_OVERLAY_CONFIG";

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    trigger: Option<TriggerMode>,
    refresh_rate: Option<u32>,
    source: Option<SourceConfigFile>,
    tracker: Option<TrackerConfigFile>,
    viewport: Option<ViewportConfigFile>,
    camera: Option<CameraConfigFile>,
    cube: Option<CubeConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SourceConfigFile {
    url: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
    ready_after_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct TrackerConfigFile {
    pattern: Option<String>,
    camera_parameters: Option<String>,
    detection_mode: Option<DetectionMode>,
    max_detection_rate: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ViewportConfigFile {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CameraConfigFile {
    fov_deg: Option<f64>,
    near: Option<f64>,
    far: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CubeConfigFile {
    size: Option<f64>,
    color: Option<u32>,
}

/// Marker detection mode, mirroring the tracker's binarization options.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMode {
    Color,
    ColorAndMatrix,
    #[default]
    Mono,
    MonoAndMatrix,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub trigger: TriggerMode,
    /// Display refresh rate driving the frame loop.
    pub refresh_rate: u32,
    pub source: SourceSettings,
    pub tracker: TrackerSettings,
    /// Initial display surface size.
    pub viewport: FrameSize,
    pub camera: CameraSettings,
    pub cube: CubeSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceSettings {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
    /// Simulated acquisition latency for `stub://` sources.
    pub ready_after: Duration,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
            width: DEFAULT_SOURCE_WIDTH,
            height: DEFAULT_SOURCE_HEIGHT,
            target_fps: DEFAULT_SOURCE_FPS,
            ready_after: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSettings {
    pub pattern: PatternRef,
    pub camera_parameters: CameraParamsRef,
    pub detection_mode: DetectionMode,
    pub max_detection_rate: u32,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            pattern: PatternRef::default(),
            camera_parameters: CameraParamsRef::default(),
            detection_mode: DetectionMode::default(),
            max_detection_rate: DEFAULT_MAX_DETECTION_RATE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSettings {
    pub fov_deg: f64,
    pub near: f64,
    pub far: f64,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            fov_deg: DEFAULT_FOV_DEG,
            near: DEFAULT_NEAR,
            far: DEFAULT_FAR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubeSettings {
    /// Edge length in marker units (metres).
    pub size: f64,
    /// 0xRRGGBB.
    pub color: u32,
}

impl Default for CubeSettings {
    fn default() -> Self {
        Self {
            size: DEFAULT_CUBE_SIZE,
            color: DEFAULT_CUBE_COLOR,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trigger: TriggerMode::default(),
            refresh_rate: DEFAULT_REFRESH_RATE,
            source: SourceSettings::default(),
            tracker: TrackerSettings::default(),
            viewport: FrameSize::new(DEFAULT_VIEWPORT_WIDTH, DEFAULT_VIEWPORT_HEIGHT),
            camera: CameraSettings::default(),
            cube: CubeSettings::default(),
        }
    }
}

impl Config {
    /// Load from the file named by `MARKER_OVERLAY_CONFIG` (if set), then
    /// apply environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => ConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ConfigFile) -> Result<Self> {
        let defaults = Config::default();
        let source = file.source.unwrap_or_default();
        let tracker = file.tracker.unwrap_or_default();
        let viewport = file.viewport.unwrap_or_default();
        let camera = file.camera.unwrap_or_default();
        let cube = file.cube.unwrap_or_default();

        let pattern = match tracker.pattern {
            Some(raw) => PatternRef::parse(&raw)?,
            None => defaults.tracker.pattern,
        };
        let camera_parameters = match tracker.camera_parameters {
            Some(raw) => CameraParamsRef::parse(&raw)?,
            None => defaults.tracker.camera_parameters,
        };

        Ok(Self {
            trigger: file.trigger.unwrap_or(defaults.trigger),
            refresh_rate: file.refresh_rate.unwrap_or(defaults.refresh_rate),
            source: SourceSettings {
                url: source.url.unwrap_or(defaults.source.url),
                width: source.width.unwrap_or(defaults.source.width),
                height: source.height.unwrap_or(defaults.source.height),
                target_fps: source.target_fps.unwrap_or(defaults.source.target_fps),
                ready_after: source
                    .ready_after_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.source.ready_after),
            },
            tracker: TrackerSettings {
                pattern,
                camera_parameters,
                detection_mode: tracker
                    .detection_mode
                    .unwrap_or(defaults.tracker.detection_mode),
                max_detection_rate: tracker
                    .max_detection_rate
                    .unwrap_or(defaults.tracker.max_detection_rate),
            },
            viewport: FrameSize::new(
                viewport.width.unwrap_or(defaults.viewport.width),
                viewport.height.unwrap_or(defaults.viewport.height),
            ),
            camera: CameraSettings {
                fov_deg: camera.fov_deg.unwrap_or(defaults.camera.fov_deg),
                near: camera.near.unwrap_or(defaults.camera.near),
                far: camera.far.unwrap_or(defaults.camera.far),
            },
            cube: CubeSettings {
                size: cube.size.unwrap_or(defaults.cube.size),
                color: cube.color.unwrap_or(defaults.cube.color),
            },
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("MARKER_OVERLAY_SOURCE") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        if let Ok(pattern) = std::env::var("MARKER_OVERLAY_PATTERN") {
            if !pattern.trim().is_empty() {
                self.tracker.pattern = PatternRef::parse(&pattern)?;
            }
        }
        if let Ok(params) = std::env::var("MARKER_OVERLAY_CAMERA_PARAMS") {
            if !params.trim().is_empty() {
                self.tracker.camera_parameters = CameraParamsRef::parse(&params)?;
            }
        }
        if let Ok(trigger) = std::env::var("MARKER_OVERLAY_TRIGGER") {
            if !trigger.trim().is_empty() {
                self.trigger = trigger.parse()?;
            }
        }
        if let Ok(viewport) = std::env::var("MARKER_OVERLAY_VIEWPORT") {
            self.viewport = FrameSize::parse(&viewport).ok_or_else(|| {
                anyhow!("MARKER_OVERLAY_VIEWPORT must look like WIDTHxHEIGHT, got {viewport:?}")
            })?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.source.url.trim().is_empty() {
            return Err(anyhow!("source url must not be empty"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source width and height must be greater than zero"));
        }
        if self.viewport.is_empty() {
            return Err(anyhow!("viewport width and height must be greater than zero"));
        }
        if self.refresh_rate == 0 {
            return Err(anyhow!("refresh_rate must be greater than zero"));
        }
        if !(self.camera.fov_deg > 0.0 && self.camera.fov_deg < 180.0) {
            return Err(anyhow!("camera fov_deg must be within (0, 180)"));
        }
        if !(self.camera.near > 0.0 && self.camera.far > self.camera.near) {
            return Err(anyhow!("camera planes must satisfy 0 < near < far"));
        }
        if self.cube.size <= 0.0 {
            return Err(anyhow!("cube size must be greater than zero"));
        }
        if self.cube.color > 0xff_ffff {
            return Err(anyhow!("cube color must be a 0xRRGGBB value"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

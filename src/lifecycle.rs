//! Lifecycle controller.
//!
//! Sequences startup so rendering never sees a half-built dependency, and
//! drives the per-frame track/render cycle once camera acquisition succeeds.
//!
//! ```text
//! Idle --start()--> Initializing --camera ready--> Running
//!                        |
//!                        +--camera error--> Error
//! ```
//!
//! `Running` and `Error` are terminal for the session.

use std::time::{Duration, Instant};

use crate::assets::CameraIntrinsics;
use crate::config::{CameraSettings, Config, CubeSettings, TrackerSettings};
use crate::frame::FrameSize;
use crate::indicator::LoadingIndicator;
use crate::math::Transform;
use crate::render::{RenderStats, Renderer};
use crate::scene::{MarkerScene, PerspectiveCamera, Scene};
use crate::scheduler::FrameScheduler;
use crate::source::{Acquisition, AcquisitionError, VideoSource};
use crate::track::PoseTracker;

const LOADING_MESSAGE: &str = "Starting camera";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Initializing,
    Running,
    Error,
}

/// Mutable per-session state. One instance per controller.
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    /// True once the video source has a live frame buffer.
    pub source_ready: bool,
    /// True once the frame loop has been scheduled.
    pub started: bool,
    /// Last known marker pose; `None` until the marker is first seen.
    pub marker_transform: Option<Transform>,
    /// Whether the marker was found on the most recent tracked frame.
    pub marker_visible: bool,
    /// Whether the source is delivering frames on time. Monitoring only.
    pub source_healthy: bool,
    /// Last applied render target size.
    pub viewport_size: FrameSize,
    pub frames_rendered: u64,
    pub frames_skipped: u64,
    /// Frames handed to the tracker; bounded by the max detection rate.
    pub frames_tracked: u64,
}

impl Session {
    fn new(viewport_size: FrameSize) -> Self {
        Self {
            source_ready: false,
            started: false,
            marker_transform: None,
            marker_visible: false,
            source_healthy: false,
            viewport_size,
            frames_rendered: 0,
            frames_skipped: 0,
            frames_tracked: 0,
        }
    }
}

/// Scene graph built by `start()`.
struct Stage {
    scene: Scene,
    handles: MarkerScene,
    camera: PerspectiveCamera,
}

pub struct LifecycleController<S, T, R, I> {
    state: LifecycleState,
    session: Session,
    source: S,
    tracker: T,
    renderer: R,
    indicator: I,
    tracker_settings: TrackerSettings,
    camera_settings: CameraSettings,
    cube_settings: CubeSettings,
    stage: Option<Stage>,
    scheduler: FrameScheduler,
    detection_interval: Duration,
    last_detection: Option<Instant>,
    acquisition_requests: u32,
    initializing_entries: u32,
    requested_at: Option<Instant>,
    stall_warned: bool,
    error_message: Option<String>,
}

impl<S, T, R, I> LifecycleController<S, T, R, I>
where
    S: VideoSource,
    T: PoseTracker,
    R: Renderer,
    I: LoadingIndicator,
{
    pub fn new(config: &Config, source: S, tracker: T, renderer: R, indicator: I) -> Self {
        Self {
            state: LifecycleState::Idle,
            session: Session::new(config.viewport),
            source,
            tracker,
            renderer,
            indicator,
            tracker_settings: config.tracker.clone(),
            camera_settings: config.camera,
            cube_settings: config.cube,
            stage: None,
            scheduler: FrameScheduler::new(config.refresh_rate),
            detection_interval: Duration::from_secs(1) / config.tracker.max_detection_rate.max(1),
            last_detection: None,
            acquisition_requests: 0,
            initializing_entries: 0,
            requested_at: None,
            stall_warned: false,
            error_message: None,
        }
    }

    /// Begin a session. Returns true when this call left `Idle`; every later
    /// call (or a call while the source already reports ready) is a no-op.
    pub fn start(&mut self, now: Instant) -> bool {
        if self.source.is_ready() {
            log::debug!("start ignored: video source already ready");
            return false;
        }
        if self.state != LifecycleState::Idle {
            log::debug!("start ignored: session is {:?}", self.state);
            return false;
        }

        self.state = LifecycleState::Initializing;
        self.initializing_entries += 1;
        log::info!(
            "session initializing (source={}, tracker={}, renderer={})",
            self.source.name(),
            self.tracker.name(),
            self.renderer.name()
        );
        self.indicator.show(LOADING_MESSAGE);

        let viewport = self.session.viewport_size;
        let mut scene = Scene::new();
        let handles = scene.compose_marker_scene(&self.cube_settings);
        // Nothing to anchor to until the marker is first found.
        scene.set_visible(handles.marker_group, false);
        let camera = PerspectiveCamera::new(&self.camera_settings, viewport.aspect());
        self.renderer.set_size(viewport);
        self.stage = Some(Stage {
            scene,
            handles,
            camera,
        });

        // Tracker assets first: a bad pattern must not leave the camera open.
        match self.configure_tracker() {
            Ok(intrinsics) => log::info!(
                "tracker configured: pattern {}, camera parameters {} ({})",
                self.tracker_settings.pattern,
                self.tracker_settings.camera_parameters,
                intrinsics.image_size
            ),
            Err(err) => {
                self.fail(format!(
                    "Unable to load marker tracking assets: {err:#}. \
                     Check the pattern and camera parameter settings."
                ));
                return true;
            }
        }

        self.acquisition_requests += 1;
        if let Err(err) = self.source.request_access(now) {
            self.fail(format!(
                "Unable to start the camera: {err:#}. Reload and try again."
            ));
            return true;
        }
        self.requested_at = Some(now);
        true
    }

    fn configure_tracker(&mut self) -> anyhow::Result<CameraIntrinsics> {
        let intrinsics = self.tracker_settings.camera_parameters.load()?;
        self.tracker.init(&self.tracker_settings, &intrinsics)?;
        if let (Some(projection), Some(stage)) =
            (self.tracker.projection_matrix(), self.stage.as_mut())
        {
            stage.camera.set_tracker_projection(projection);
        }
        Ok(intrinsics)
    }

    /// Deliver a pending acquisition outcome, if any.
    pub fn poll(&mut self, now: Instant) {
        if self.state != LifecycleState::Initializing {
            return;
        }
        match self.source.poll_acquisition(now) {
            Acquisition::Ready(size) => self.on_source_ready(size, now),
            Acquisition::Failed(err) => self.on_source_error(&err),
            Acquisition::Pending => {
                let Some(requested_at) = self.requested_at else {
                    return;
                };
                let waited = now.saturating_duration_since(requested_at);
                if !self.stall_warned && waited >= self.source.stall_warning_after() {
                    self.stall_warned = true;
                    log::warn!(
                        "camera acquisition still pending after {:.1}s",
                        waited.as_secs_f64()
                    );
                }
            }
        }
    }

    /// Camera stream is live: size render targets to the video, hide the
    /// indicator and schedule the frame loop.
    pub fn on_source_ready(&mut self, native: FrameSize, now: Instant) {
        if self.state != LifecycleState::Initializing {
            log::debug!("camera ready ignored: session is {:?}", self.state);
            return;
        }
        let Some(stage) = self.stage.as_mut() else {
            return;
        };
        self.session.source_ready = true;
        self.session.source_healthy = true;
        if !native.is_empty() {
            self.renderer.set_size(native);
            stage.camera.set_aspect(native.aspect());
            self.session.viewport_size = native;
        }
        self.indicator.hide();
        self.state = LifecycleState::Running;
        if self.scheduler.schedule(now) {
            self.session.started = true;
        }
        log::info!("session running: camera {} at {}", self.source.name(), native);
    }

    /// Camera acquisition failed. The session stays down; there is no retry.
    pub fn on_source_error(&mut self, err: &AcquisitionError) {
        if self.state != LifecycleState::Initializing {
            log::debug!("camera error ignored: session is {:?}", self.state);
            return;
        }
        self.fail(err.user_message());
    }

    fn fail(&mut self, message: String) {
        log::error!("{}", message);
        self.indicator.show_error(&message);
        self.error_message = Some(message);
        self.state = LifecycleState::Error;
        self.scheduler.stop();
    }

    /// Run the frame task if it is due. The task only runs while `Running`.
    pub fn tick(&mut self, now: Instant) -> Option<RenderStats> {
        if self.state != LifecycleState::Running {
            self.scheduler.stop();
            return None;
        }
        if !self.scheduler.is_due(now) {
            return None;
        }
        self.scheduler.mark_ran(now);
        self.on_frame(now)
    }

    /// One display refresh: track the marker, then render.
    ///
    /// The tracker runs at most once per detection interval; refreshes in
    /// between render the last pose.
    pub fn on_frame(&mut self, now: Instant) -> Option<RenderStats> {
        if self.state != LifecycleState::Running {
            return None;
        }
        self.session.source_ready = self.source.is_ready();
        if !self.session.source_ready {
            self.session.frames_skipped += 1;
            return None;
        }
        self.check_source_health(now);
        let stage = self.stage.as_mut()?;

        let detect = self
            .last_detection
            .map_or(true, |at| now.saturating_duration_since(at) >= self.detection_interval);
        match self.source.latest_frame() {
            Ok(Some(frame)) if detect => {
                self.last_detection = Some(now);
                self.session.frames_tracked += 1;
                match self.tracker.update(&frame.view()) {
                    Ok(observation) => {
                        self.session.marker_visible = observation.is_visible();
                        // On loss the group keeps its last pose.
                        if let Some(pose) = observation.transform {
                            self.session.marker_transform = Some(pose);
                            stage.scene.set_local(stage.handles.marker_group, pose);
                            stage.scene.set_visible(stage.handles.marker_group, true);
                        }
                    }
                    Err(err) => log::warn!(
                        "tracker update failed on frame {}: {:#}",
                        frame.sequence,
                        err
                    ),
                }
            }
            Ok(_) => {}
            Err(err) => log::warn!("failed to read camera frame: {:#}", err),
        }

        match self
            .renderer
            .render(&stage.scene, stage.handles.camera, &stage.camera)
        {
            Ok(stats) => {
                self.session.frames_rendered += 1;
                Some(stats)
            }
            Err(err) => {
                log::warn!("render failed: {:#}", err);
                None
            }
        }
    }

    fn check_source_health(&mut self, now: Instant) {
        let healthy = self.source.is_healthy(now);
        if healthy == self.session.source_healthy {
            return;
        }
        self.session.source_healthy = healthy;
        if healthy {
            log::info!("camera {} delivering frames again", self.source.name());
        } else {
            log::warn!("camera {} stalled; still polling", self.source.name());
        }
    }

    /// Viewport changed. Safe in any state; the camera aspect is applied
    /// once the scene exists.
    pub fn on_resize(&mut self, size: FrameSize) {
        if size.is_empty() {
            log::debug!("ignoring resize to {}", size);
            return;
        }
        self.session.viewport_size = size;
        self.renderer.set_size(size);
        match self.stage.as_mut() {
            Some(stage) => stage.camera.set_aspect(size.aspect()),
            None => log::debug!("resize to {} recorded before start", size),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn indicator(&self) -> &I {
        &self.indicator
    }

    /// Number of times camera access was requested.
    pub fn acquisition_requests(&self) -> u32 {
        self.acquisition_requests
    }

    /// Number of `Idle -> Initializing` transitions.
    pub fn initializing_entries(&self) -> u32 {
        self.initializing_entries
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// The scene camera, once `start()` has built it.
    pub fn camera(&self) -> Option<&PerspectiveCamera> {
        self.stage.as_ref().map(|stage| &stage.camera)
    }

    /// Aspect ratio of the scene camera, once it exists.
    pub fn camera_aspect(&self) -> Option<f64> {
        self.camera().map(|camera| camera.aspect)
    }

    /// Current local transform of the marker-anchored group.
    pub fn marker_group_transform(&self) -> Option<Transform> {
        self.stage
            .as_ref()
            .map(|stage| stage.scene.node(stage.handles.marker_group).local)
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.stage.as_ref().map(|stage| &stage.scene)
    }

    pub fn scene_handles(&self) -> Option<MarkerScene> {
        self.stage.as_ref().map(|stage| stage.handles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceSettings;
    use crate::indicator::{IndicatorState, RecordingIndicator};
    use crate::math;
    use crate::render::HeadlessRenderer;
    use crate::source::StubSource;
    use crate::track::scripted::{ScriptEnd, ScriptedTracker};
    use std::time::Duration;

    type Controller =
        LifecycleController<StubSource, ScriptedTracker, HeadlessRenderer, RecordingIndicator>;

    fn controller(url: &str, script: Vec<Option<Transform>>) -> Controller {
        controller_with(config(url), script)
    }

    fn config(url: &str) -> Config {
        Config {
            source: SourceSettings {
                url: url.to_string(),
                width: 64,
                height: 48,
                ..SourceSettings::default()
            },
            ..Config::default()
        }
    }

    fn controller_with(config: Config, script: Vec<Option<Transform>>) -> Controller {
        LifecycleController::new(
            &config,
            StubSource::new(config.source.clone()),
            ScriptedTracker::new(script, ScriptEnd::Hold),
            HeadlessRenderer::new(config.viewport),
            RecordingIndicator::default(),
        )
    }

    fn running(script: Vec<Option<Transform>>) -> (Controller, Instant) {
        let mut c = controller("stub://webcam", script);
        let t0 = Instant::now();
        assert!(c.start(t0));
        c.poll(t0);
        assert_eq!(c.state(), LifecycleState::Running);
        (c, t0)
    }

    #[test]
    fn start_moves_to_initializing_once() {
        let mut c = controller("stub://webcam", vec![]);
        let t0 = Instant::now();
        assert_eq!(c.state(), LifecycleState::Idle);
        assert!(c.start(t0));
        assert!(!c.start(t0));
        assert_eq!(c.state(), LifecycleState::Initializing);
        assert_eq!(c.acquisition_requests(), 1);
        assert_eq!(
            c.indicator().state(),
            &IndicatorState::Loading(LOADING_MESSAGE.into())
        );
    }

    #[test]
    fn ready_hides_indicator_and_schedules_loop() {
        let (c, _) = running(vec![]);
        assert!(c.session().source_ready);
        assert!(c.session().started);
        assert_eq!(c.scheduler().scheduled_count(), 1);
        assert_eq!(c.indicator().state(), &IndicatorState::Hidden);
        // Render target follows the video's native size.
        assert_eq!(c.renderer().size(), FrameSize::new(64, 48));
        assert_eq!(c.session().viewport_size, FrameSize::new(64, 48));
    }

    #[test]
    fn marker_group_hidden_until_first_detection() {
        let pose = math::translation(0.0, 0.0, -1.0);
        let (mut c, t0) = running(vec![None, Some(pose)]);
        let group = c.scene_handles().unwrap().marker_group;

        c.on_frame(t0).unwrap();
        assert!(!c.scene().unwrap().node(group).visible);
        assert_eq!(c.session().marker_transform, None);

        c.on_frame(t0 + Duration::from_millis(20)).unwrap();
        assert!(c.scene().unwrap().node(group).visible);
        assert_eq!(c.session().marker_transform, Some(pose));
    }

    #[test]
    fn tick_respects_refresh_interval() {
        let (mut c, t0) = running(vec![]);
        assert!(c.tick(t0).is_some());
        assert!(c.tick(t0 + Duration::from_millis(1)).is_none());
        assert!(c.tick(t0 + Duration::from_millis(20)).is_some());
        assert_eq!(c.session().frames_rendered, 2);
    }

    #[test]
    fn tracker_asset_failure_is_terminal() {
        let mut c = controller("stub://webcam", vec![]);
        c.tracker_settings.pattern = crate::assets::PatternRef::File("/nonexistent/patt.x".into());
        let t0 = Instant::now();
        assert!(c.start(t0));
        assert_eq!(c.state(), LifecycleState::Error);
        assert!(c.error_message().unwrap().contains("marker tracking assets"));
        // The camera is never opened for a session that cannot track.
        assert_eq!(c.acquisition_requests(), 0);
        assert!(matches!(c.source.poll_acquisition(t0), Acquisition::Pending));

        // A late camera completion does not revive the session.
        c.poll(t0);
        c.on_source_ready(FrameSize::new(64, 48), t0);
        assert_eq!(c.state(), LifecycleState::Error);
        assert_eq!(c.scheduler().scheduled_count(), 0);
    }

    #[test]
    fn start_installs_tracker_projection() {
        let mut c = controller("stub://webcam", vec![]);
        assert!(c.camera().is_none());
        c.start(Instant::now());

        let tracker_p = c.tracker().projection_matrix().expect("tracker projection");
        let camera = c.camera().expect("scene camera");
        assert!(camera.has_tracker_projection());
        assert_eq!(camera.projection()[(1, 1)], tracker_p[(1, 1)]);
        assert_eq!(camera.projection()[(3, 2)], tracker_p[(3, 2)]);
        let aspect = camera.aspect;
        assert!((camera.projection()[(0, 0)] - tracker_p[(1, 1)] / aspect).abs() < 1e-12);
    }

    #[test]
    fn tracker_runs_at_max_detection_rate() {
        let first = math::translation(0.0, 0.0, -1.0);
        let second = math::translation(0.1, 0.0, -1.0);
        let mut cfg = config("stub://webcam");
        cfg.tracker.max_detection_rate = 20;
        let mut c = controller_with(cfg, vec![Some(first), Some(second)]);
        let t0 = Instant::now();
        c.start(t0);
        c.poll(t0);

        // 100 refreshes over one second, detection every 50 ms.
        for i in 0..100 {
            let now = t0 + Duration::from_millis(10 * i);
            assert!(c.on_frame(now).is_some());
            if i < 5 {
                // Between detections the first pose is held.
                assert_eq!(c.session().marker_transform, Some(first));
            }
        }
        assert_eq!(c.session().frames_rendered, 100);
        assert_eq!(c.session().frames_tracked, 20);
        assert_eq!(c.tracker().updates(), 20);
        assert_eq!(c.session().marker_transform, Some(second));
    }

    #[test]
    fn resize_before_start_reaches_renderer() {
        let mut c = controller("stub://webcam", vec![]);
        c.on_resize(FrameSize::new(800, 600));
        assert_eq!(c.renderer().size(), FrameSize::new(800, 600));
        assert_eq!(c.session().viewport_size, c.renderer().size());
    }

    #[test]
    fn zero_resize_is_ignored() {
        let mut c = controller("stub://webcam", vec![]);
        let before = c.session().viewport_size;
        c.on_resize(FrameSize::new(0, 600));
        assert_eq!(c.session().viewport_size, before);
    }
}

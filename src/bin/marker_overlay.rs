//! marker-overlay - run an AR overlay session
//!
//! This binary:
//! 1. Loads configuration (file + environment + flags)
//! 2. Waits for the start trigger (load, or Enter for tap-to-start)
//! 3. Acquires the camera and configures the marker tracker
//! 4. Runs the track/render loop until interrupted or `--frames` is reached

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use marker_overlay::{
    open_source, CameraParamsRef, Config, ConsoleIndicator, EventLoop, FrameSize,
    HeadlessRenderer, HostEvent, LifecycleController, LifecycleState, PatternRef,
    ScriptedTracker, TriggerMode, UiMode, VideoSource,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON, or TOML by extension).
    #[arg(long, env = "MARKER_OVERLAY_CONFIG")]
    config: Option<PathBuf>,
    /// Camera source: stub://<name> or a V4L2 device path.
    #[arg(long)]
    source: Option<String>,
    /// Marker pattern: hiro, kanji, a .patt path or URL.
    #[arg(long)]
    pattern: Option<String>,
    /// Camera parameters: default, a camera_para.dat path or URL.
    #[arg(long)]
    camera_params: Option<String>,
    /// Start trigger: auto or tap.
    #[arg(long, value_parser = parse_trigger)]
    trigger: Option<TriggerMode>,
    /// Initial viewport, e.g. 1280x720.
    #[arg(long, value_parser = parse_viewport)]
    viewport: Option<FrameSize>,
    /// Stop after rendering this many frames.
    #[arg(long)]
    frames: Option<u64>,
    /// Terminal UI: auto, plain or pretty.
    #[arg(long)]
    ui: Option<String>,
}

fn parse_viewport(value: &str) -> Result<FrameSize, String> {
    FrameSize::parse(value).ok_or_else(|| format!("expected WIDTHxHEIGHT, got {value:?}"))
}

fn parse_trigger(value: &str) -> Result<TriggerMode, String> {
    value.parse().map_err(|e: anyhow::Error| e.to_string())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = Config::load_from(args.config.as_deref())?;
    if let Some(source) = args.source {
        cfg.source.url = source;
    }
    if let Some(pattern) = args.pattern.as_deref() {
        cfg.tracker.pattern = PatternRef::parse(pattern)?;
    }
    if let Some(params) = args.camera_params.as_deref() {
        cfg.tracker.camera_parameters = CameraParamsRef::parse(params)?;
    }
    if let Some(trigger) = args.trigger {
        cfg.trigger = trigger;
    }
    if let Some(viewport) = args.viewport {
        cfg.viewport = viewport;
    }

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))?;
    }

    let source = open_source(&cfg.source)?;
    let indicator = ConsoleIndicator::new(
        UiMode::from_flag(args.ui.as_deref()),
        std::io::stderr().is_terminal(),
    );
    let controller = LifecycleController::new(
        &cfg,
        source,
        ScriptedTracker::demo(),
        HeadlessRenderer::new(cfg.viewport),
        indicator,
    );
    let mut event_loop = EventLoop::new(controller, cfg.trigger);

    log::info!(
        "marker-overlay {}: source={} pattern={} trigger={:?} viewport={}",
        env!("CARGO_PKG_VERSION"),
        cfg.source.url,
        cfg.tracker.pattern,
        cfg.trigger,
        cfg.viewport
    );

    event_loop.push(HostEvent::Resize(cfg.viewport));
    event_loop.push(HostEvent::Load);
    if event_loop.trigger_mode() == TriggerMode::Tap {
        eprintln!("Press Enter to start the camera.");
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        event_loop.push(HostEvent::Tap);
    }

    let mut last_health_log = Instant::now();
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if let Some(stats) = event_loop.pump(now) {
            log::debug!(
                "frame {}: meshes={} corners_in_view={} bounds={:?}",
                stats.frame,
                stats.meshes,
                stats.corners_in_view,
                stats.screen_bounds
            );
        }

        let controller = event_loop.controller();
        if controller.state() == LifecycleState::Error {
            return Err(anyhow!(
                "{}",
                controller.error_message().unwrap_or("camera failed to start")
            ));
        }

        let session = controller.session();
        if args.frames.is_some_and(|limit| session.frames_rendered >= limit) {
            break;
        }

        if last_health_log.elapsed() >= Duration::from_secs(5) {
            let source = controller.source();
            let stats = source.stats();
            let native = source
                .native_size()
                .map(|size| size.to_string())
                .unwrap_or_else(|| "-".to_string());
            log::info!(
                "state={:?} frames_rendered={} frames_skipped={} frames_tracked={} marker_visible={} \
                 healthy={} captured={} native={} url={}",
                controller.state(),
                session.frames_rendered,
                session.frames_skipped,
                session.frames_tracked,
                session.marker_visible,
                source.is_healthy(now),
                stats.frames_captured,
                native,
                stats.url
            );
            last_health_log = Instant::now();
        }

        std::thread::sleep(event_loop.next_wakeup(Instant::now()));
    }

    let session = event_loop.controller().session();
    log::info!(
        "session ended: {} frames rendered, {} skipped",
        session.frames_rendered,
        session.frames_skipped
    );
    Ok(())
}

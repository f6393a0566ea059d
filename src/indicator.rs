//! Loading indicator shown while the camera starts.
//!
//! On success it is hidden; on failure its content is replaced by a plain
//! text message.

use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

pub trait LoadingIndicator {
    fn show(&mut self, message: &str);
    fn hide(&mut self);
    fn show_error(&mut self, message: &str);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

impl UiMode {
    pub fn from_flag(flag: Option<&str>) -> Self {
        match flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        }
    }
}

/// Terminal indicator: a spinner on a TTY, plain stderr lines otherwise.
pub struct ConsoleIndicator {
    use_pretty: bool,
    spinner: Option<ProgressBar>,
    shown_at: Option<Instant>,
}

impl ConsoleIndicator {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        let use_pretty = is_tty
            && match mode {
                UiMode::Pretty | UiMode::Auto => true,
                UiMode::Plain => false,
            };
        Self {
            use_pretty,
            spinner: None,
            shown_at: None,
        }
    }
}

impl LoadingIndicator for ConsoleIndicator {
    fn show(&mut self, message: &str) {
        self.shown_at = Some(Instant::now());
        if self.use_pretty {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{message}…"));
            self.spinner = Some(spinner);
        } else {
            eprintln!("==> {}", message);
        }
    }

    fn hide(&mut self) {
        let elapsed = self
            .shown_at
            .take()
            .map(|at| format_duration(at.elapsed()))
            .unwrap_or_default();
        let message = format!("✔ camera ready ({elapsed})");
        match self.spinner.take() {
            Some(spinner) => spinner.finish_with_message(message),
            None => eprintln!("{message}"),
        }
    }

    fn show_error(&mut self, message: &str) {
        self.shown_at = None;
        match self.spinner.take() {
            Some(spinner) => spinner.abandon_with_message(format!("✘ {message}")),
            None => eprintln!("✘ {message}"),
        }
    }
}

/// What an indicator was asked to display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndicatorState {
    Blank,
    Loading(String),
    Hidden,
    Error(String),
}

/// Indicator that records its state, for headless hosts and tests.
#[derive(Debug)]
pub struct RecordingIndicator {
    state: IndicatorState,
    hide_calls: u32,
}

impl Default for RecordingIndicator {
    fn default() -> Self {
        Self {
            state: IndicatorState::Blank,
            hide_calls: 0,
        }
    }
}

impl RecordingIndicator {
    pub fn state(&self) -> &IndicatorState {
        &self.state
    }

    pub fn hide_calls(&self) -> u32 {
        self.hide_calls
    }
}

impl LoadingIndicator for RecordingIndicator {
    fn show(&mut self, message: &str) {
        self.state = IndicatorState::Loading(message.to_string());
    }

    fn hide(&mut self) {
        self.hide_calls += 1;
        self.state = IndicatorState::Hidden;
    }

    fn show_error(&mut self, message: &str) {
        self.state = IndicatorState::Error(message.to_string());
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_indicator_tracks_transitions() {
        let mut indicator = RecordingIndicator::default();
        assert_eq!(indicator.state(), &IndicatorState::Blank);
        indicator.show("Starting camera");
        assert_eq!(
            indicator.state(),
            &IndicatorState::Loading("Starting camera".into())
        );
        indicator.hide();
        assert_eq!(indicator.state(), &IndicatorState::Hidden);
        assert_eq!(indicator.hide_calls(), 1);
    }

    #[test]
    fn plain_console_indicator_never_spins() {
        let mut indicator = ConsoleIndicator::new(UiMode::Plain, true);
        indicator.show("Starting camera");
        assert!(indicator.spinner.is_none());
        indicator.show_error("denied");
        assert!(indicator.shown_at.is_none());
    }

    #[test]
    fn formats_short_and_long_durations() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }
}

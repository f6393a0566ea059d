//! Startup triggers.
//!
//! `Auto` starts the session when the host finishes loading. `Tap` waits for
//! an explicit user gesture; the listener is removed after it first fires so
//! repeated taps never reach `start()` twice.

use std::str::FromStr;

use anyhow::{anyhow, Error};
use serde::Deserialize;

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TriggerMode {
    #[default]
    Auto,
    Tap,
}

impl FromStr for TriggerMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "load" => Ok(TriggerMode::Auto),
            "tap" | "click" => Ok(TriggerMode::Tap),
            other => Err(anyhow!("unknown trigger {:?} (expected auto or tap)", other)),
        }
    }
}

/// Host events that may start a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerEvent {
    Load,
    Tap,
}

/// One-shot start listener for a given trigger mode.
#[derive(Debug)]
pub struct StartGate {
    mode: TriggerMode,
    armed: bool,
}

impl StartGate {
    pub fn new(mode: TriggerMode) -> Self {
        Self { mode, armed: true }
    }

    pub fn mode(&self) -> TriggerMode {
        self.mode
    }

    /// True while the listener is still attached.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Returns true exactly once, for the first event matching the mode.
    pub fn fire(&mut self, event: TriggerEvent) -> bool {
        let matches = matches!(
            (self.mode, event),
            (TriggerMode::Auto, TriggerEvent::Load) | (TriggerMode::Tap, TriggerEvent::Tap)
        );
        if !matches || !self.armed {
            return false;
        }
        self.armed = false;
        log::debug!("start listener for {:?} removed after first use", self.mode);
        true
    }
}

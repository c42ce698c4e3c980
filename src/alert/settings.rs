//! Tunable beep parameters and their on-disk store
//!
//! Out-of-range values are clamped, never rejected. Every accepted change is
//! written straight back to disk.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::persist::{load_json, save_json};

pub const FREQUENCY_HZ: RangeInclusive<i64> = 37..=32767;
pub const DURATION_MS: RangeInclusive<i64> = 10..=5000;
pub const INTERVAL_S: RangeInclusive<f64> = 0.1..=10.0;
pub const MIN_TIMEOUT_S: i64 = 1;

/// Beep parameters shared by every alert session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Tone pitch
    #[serde(rename = "frequency")]
    pub frequency_hz: u32,

    /// Length of one tone
    #[serde(rename = "duration")]
    pub duration_ms: u32,

    /// Pause between pulses
    #[serde(rename = "interval")]
    pub interval_s: f64,

    /// An alert gives up after this long
    #[serde(rename = "alert_timeout")]
    pub timeout_s: u64,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            frequency_hz: 880,
            duration_ms: 500,
            interval_s: 1.0,
            timeout_s: 120,
        }
    }
}

impl AudioSettings {
    pub fn tone_duration(&self) -> Duration {
        Duration::from_millis(u64::from(self.duration_ms))
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval_s)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_s)
    }

    /// Apply an update, clamping each provided field
    pub fn apply(&mut self, update: &AudioSettingsUpdate) {
        if let Some(frequency) = update.frequency {
            self.frequency_hz = clamp_int(frequency, FREQUENCY_HZ);
        }
        if let Some(duration) = update.duration {
            self.duration_ms = clamp_int(duration, DURATION_MS);
        }
        if let Some(interval) = update.interval {
            self.interval_s = clamp_interval(interval);
        }
        if let Some(timeout) = update.timeout {
            self.timeout_s = timeout.max(MIN_TIMEOUT_S).unsigned_abs();
        }
    }

    /// Bring values read from disk back into range
    fn clamped(mut self) -> Self {
        self.frequency_hz = clamp_int(i64::from(self.frequency_hz), FREQUENCY_HZ);
        self.duration_ms = clamp_int(i64::from(self.duration_ms), DURATION_MS);
        self.interval_s = clamp_interval(self.interval_s);
        self.timeout_s = self.timeout_s.max(MIN_TIMEOUT_S.unsigned_abs());
        self
    }
}

fn clamp_int(value: i64, range: RangeInclusive<i64>) -> u32 {
    // Both ranges sit well inside u32.
    value.clamp(*range.start(), *range.end()) as u32
}

fn clamp_interval(value: f64) -> f64 {
    if value.is_nan() {
        return *INTERVAL_S.start();
    }
    value.clamp(*INTERVAL_S.start(), *INTERVAL_S.end())
}

/// Partial settings change; `None` fields stay as they are
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioSettingsUpdate {
    pub frequency: Option<i64>,
    pub duration: Option<i64>,
    pub interval: Option<f64>,
    pub timeout: Option<i64>,
}

impl AudioSettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self.frequency.is_none()
            && self.duration.is_none()
            && self.interval.is_none()
            && self.timeout.is_none()
    }
}

/// Process-wide settings, loaded once and saved on every change
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    current: Mutex<AudioSettings>,
}

impl SettingsStore {
    /// Load settings from `path`, falling back to defaults
    pub fn load(path: &Path) -> Self {
        let settings = match load_json::<AudioSettings>(path) {
            Ok(Some(settings)) => {
                debug!(?path, "audio settings loaded");
                settings.clamped()
            }
            Ok(None) => {
                debug!(?path, "no saved audio settings, using defaults");
                AudioSettings::default()
            }
            Err(e) => {
                warn!(?e, "failed to load audio settings, using defaults");
                AudioSettings::default()
            }
        };

        Self {
            path: path.to_owned(),
            current: Mutex::new(settings),
        }
    }

    pub async fn get(&self) -> AudioSettings {
        *self.current.lock().await
    }

    /// Apply a change and persist the full settings object
    pub async fn update(&self, update: &AudioSettingsUpdate) -> AudioSettings {
        let mut current = self.current.lock().await;
        if update.is_empty() {
            return *current;
        }

        current.apply(update);
        info!(settings = ?*current, "audio settings updated");

        if let Err(e) = save_json(&self.path, &*current) {
            warn!(?e, "failed to save audio settings");
        }
        *current
    }
}

//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::alert::{AudioSettings, AudioSettingsUpdate};
use crate::command::Command;
use crate::events::DaemonEvent;
use crate::regimen::{RegimenStatus, RegimenTable, TimerSpec};

/// Requests from a client to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Interpret and execute free text
    Command { text: String },

    GetAudioSettings,

    /// Change beep parameters; omitted fields are left alone
    SetAudioSettings(AudioSettingsUpdate),

    /// Play a single pulse
    TestBeep,

    /// Silence every alert
    StopAlerts,

    CreateRegimen {
        name: String,
        segments: Vec<TimerSpec>,
    },

    ListRegimens,

    DeleteRegimen { name: String },

    /// End the regimen in progress
    StopRegimen,

    /// Request current daemon status
    GetStatus,

    /// Ping to check connectivity
    Ping,

    /// Subscribe to daemon event notifications
    Subscribe,
}

/// Responses from daemon to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Outcome of a `command` request; `command` is absent for help text
    Command {
        understood: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        command: Option<Command>,
    },

    AudioSettings(AudioSettings),

    Regimens { regimens: RegimenTable },

    /// Current daemon status
    Status(DaemonStatus),

    Ok,

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

/// Push notification for subscribed clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    Event { event: DaemonEvent },
}

/// Full daemon status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Uptime in seconds
    pub uptime_secs: u64,

    pub active_timers: usize,

    /// Timers whose alert is sounding
    pub active_alerts: Vec<String>,

    pub active_regimen: Option<String>,

    /// Progress of `active_regimen`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regimen_status: Option<RegimenStatus>,
}

impl Default for DaemonStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: 0,
            active_timers: 0,
            active_alerts: Vec::new(),
            active_regimen: None,
            regimen_status: None,
        }
    }
}

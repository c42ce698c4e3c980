//! Alert module for audible timer notifications
//!
//! - settings: clamped beep parameters persisted as JSON
//! - tone: blocking tone devices (sine synthesis, external program)
//! - engine: cancellable, time-bounded repeating alert sessions

mod engine;
mod settings;
mod tone;

pub use engine::AlertEngine;
pub use settings::{AudioSettings, AudioSettingsUpdate, SettingsStore};
pub use tone::{default_device, ToneDevice};

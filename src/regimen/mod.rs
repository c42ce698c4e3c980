//! Regimen module: named, ordered sequences of timers run back to back
//!
//! - store: the persisted regimen table
//! - sequencer: the single in-progress run and its advancement

mod sequencer;
mod store;

pub use sequencer::{RegimenSequencer, RegimenStatus};
pub use store::{RegimenStore, RegimenTable, TimerSpec};

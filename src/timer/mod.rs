//! Timer module: countdown timers the rest of the daemon drives
//!
//! [`TimerService`] is the narrow interface the regimen sequencer needs;
//! [`TimerRegistry`] is the in-process implementation behind it.

mod registry;

use async_trait::async_trait;

pub use registry::TimerRegistry;

/// Errors from timer table operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimerError {
    #[error("Timer '{0}' already exists")]
    AlreadyExists(String),

    #[error("Timer '{0}' does not exist")]
    NotFound(String),
}

/// Creates and cancels named countdowns. Implementations report every
/// completion back to the daemon's completion channel.
#[async_trait]
pub trait TimerService: Send + Sync {
    /// Create a countdown and start it immediately
    async fn create_timer(&self, name: &str, duration_seconds: u64) -> Result<(), TimerError>;

    /// Drop a countdown without completing it
    async fn cancel_timer(&self, name: &str) -> Result<(), TimerError>;
}

/// Whole minutes from one minute up, seconds below that
pub fn format_remaining(seconds: u64) -> String {
    if seconds == 0 {
        "0m".to_string()
    } else if seconds >= 60 {
        format!("{}m", seconds / 60)
    } else {
        format!("{}s", seconds)
    }
}

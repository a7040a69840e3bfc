//! Tunables for the scheduler and the Plex connection.

use std::fmt;
use std::time::Duration;

/// Shortest accepted batch delay, in seconds.
pub const MIN_BATCH_DELAY_SECS: u64 = 10;
/// Longest accepted batch delay, in seconds.
pub const MAX_BATCH_DELAY_SECS: u64 = 300;
/// Delay applied when no valid value is configured.
pub const DEFAULT_BATCH_DELAY_SECS: u64 = 60;

/// Clamps a configured delay into the accepted range.
pub fn clamp_batch_delay_secs(secs: i64) -> u64 {
    if secs < MIN_BATCH_DELAY_SECS as i64 {
        MIN_BATCH_DELAY_SECS
    } else if secs > MAX_BATCH_DELAY_SECS as i64 {
        MAX_BATCH_DELAY_SECS
    } else {
        secs as u64
    }
}

/// Timing knobs for [`crate::scheduler::RefreshScheduler`].
#[derive(Clone, Debug)]
pub struct SchedulerSettings {
    /// Quiet period after the last arrival before a batch fires.
    pub batch_delay: Duration,
    /// Pause between per-path fallback attempts after a failed parent refresh.
    pub fallback_pacing: Duration,
}

impl SchedulerSettings {
    /// Settings with the given delay, clamped into the accepted range.
    pub fn with_delay_secs(secs: i64) -> Self {
        Self {
            batch_delay: Duration::from_secs(clamp_batch_delay_secs(secs)),
            ..Self::default()
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            batch_delay: Duration::from_secs(DEFAULT_BATCH_DELAY_SECS),
            fallback_pacing: Duration::from_secs(1),
        }
    }
}

/// Connection details for one Plex server.
#[derive(Clone)]
pub struct PlexServerSettings {
    /// Base URL of the server, scheme optional (`http://` is assumed).
    pub url: String,
    /// `X-Plex-Token` credential sent with every request.
    pub token: String,
}

impl fmt::Debug for PlexServerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlexServerSettings")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .finish()
    }
}

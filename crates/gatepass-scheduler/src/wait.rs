//! Narrowing wait towards a target instant.
//!
//! # Design
//! - Far from the target the wait sleeps coarsely, capped so wall-clock
//!   adjustments are noticed. Inside the coarse margin it sleeps half the
//!   remaining distance. Inside the spin window it only yields.
//! - Every step re-reads the clock, so the wait tracks the wall clock rather
//!   than accumulated sleep durations.
//! - Shutdown interrupts any sleep; a closed shutdown channel counts as a
//!   shutdown request.

use std::time::Duration;

use chrono::{DateTime, Utc};
use gatepass_config::WaitTuning;
use tokio::sync::watch;

use crate::clock::Clock;

const MIN_SLEEP: Duration = Duration::from_millis(1);

/// How a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The target instant was reached.
    Reached {
        /// How far past the target the clock read when the wait returned.
        lateness: Duration,
    },
    /// Shutdown was requested before the target.
    Cancelled,
}

/// Next action of the wait loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStep {
    /// Sleep for the given duration, then re-check.
    Sleep(Duration),
    /// Yield to the runtime, then re-check.
    Spin,
}

/// Choose the next step for `remaining` time until the target.
#[must_use]
pub fn next_step(remaining: Duration, tuning: WaitTuning) -> WaitStep {
    if remaining > tuning.coarse_margin {
        let coarse = (remaining - tuning.coarse_margin).min(tuning.max_coarse_sleep);
        WaitStep::Sleep(coarse.max(MIN_SLEEP))
    } else if remaining > tuning.spin_window {
        WaitStep::Sleep((remaining / 2).max(MIN_SLEEP))
    } else {
        WaitStep::Spin
    }
}

/// Suspend until `clock` reads `target` or shutdown is signalled.
pub async fn wait_until(
    clock: &dyn Clock,
    target: DateTime<Utc>,
    tuning: WaitTuning,
    shutdown: &mut watch::Receiver<bool>,
) -> WaitOutcome {
    loop {
        if *shutdown.borrow() {
            return WaitOutcome::Cancelled;
        }
        let now = clock.now();
        let remaining = match (target - now).to_std() {
            Ok(remaining) if !remaining.is_zero() => remaining,
            _ => {
                return WaitOutcome::Reached {
                    lateness: (now - target).to_std().unwrap_or_default(),
                };
            }
        };

        match next_step(remaining, tuning) {
            WaitStep::Sleep(duration) => {
                tokio::select! {
                    () = tokio::time::sleep(duration) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            return WaitOutcome::Cancelled;
                        }
                    }
                }
            }
            WaitStep::Spin => tokio::task::yield_now().await,
        }
    }
}

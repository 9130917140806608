//! Tick-counted timers for deferred actions.
//!
//! Cooldowns and dead-times are owned by the component that needs them and
//! advanced once per fixed tick, so the simulation loop never suspends.

use serde::{Deserialize, Serialize};

/// Converts a duration to a whole number of ticks, rounding up.
///
/// A small tolerance keeps exact multiples (0.1 s at 0.02 s) from rounding up
/// an extra tick due to floating point error.
///
/// ```
/// use ballsync_core::timer::ticks_for;
///
/// assert_eq!(ticks_for(0.1, 0.02), 5);
/// assert_eq!(ticks_for(0.11, 0.02), 6);
/// assert_eq!(ticks_for(0.0, 0.02), 0);
/// ```
#[must_use]
pub fn ticks_for(duration: f32, dt: f32) -> u32 {
    if duration <= 0.0 || dt <= 0.0 {
        return 0;
    }
    // f32 inputs carry representation error well above f64 epsilon.
    let ratio = f64::from(duration) / f64::from(dt);
    let nearest = ratio.round();
    let ticks = if (ratio - nearest).abs() < 1e-4 {
        nearest
    } else {
        ratio.ceil()
    };
    // Durations are short gameplay windows; saturate rather than wrap.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let ticks = ticks.clamp(0.0, f64::from(u32::MAX)) as u32;
    ticks
}

/// A countdown measured in fixed ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TickTimer {
    remaining: u32,
}

impl TickTimer {
    /// A timer that is not running.
    #[must_use]
    pub const fn idle() -> Self {
        Self { remaining: 0 }
    }

    /// Starts a timer that stays active for the next `ticks` advances.
    #[must_use]
    pub const fn start(ticks: u32) -> Self {
        Self { remaining: ticks }
    }

    /// Starts a timer covering `duration` seconds at step `dt`.
    #[must_use]
    pub fn from_duration(duration: f32, dt: f32) -> Self {
        Self::start(ticks_for(duration, dt))
    }

    /// Advances one tick. Returns true on the tick the timer expires.
    pub fn advance(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        self.remaining == 0
    }

    /// Whether the timer is still counting down.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.remaining > 0
    }

    /// Ticks left before expiry.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.remaining
    }
}

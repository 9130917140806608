//! Kick requests and intake.
//!
//! A [`KickRequest`] is created per input event and consumed by the
//! authority's arbitration within the same or next tick. [`KickIntake`] holds
//! the checks every issuing host runs before a request is queued or sent, and
//! the impulse application shared by prediction and arbitration.
//!
//! # Example
//!
//! ```
//! use ballsync_core::kick::{KickFlags, KickRequest};
//! use glam::Vec3;
//!
//! let request = KickRequest::new(100, Vec3::new(5.0, 0.0, 0.0))
//!     .with_spin(Vec3::new(0.0, 0.2, 0.0))
//!     .with_flags(KickFlags::STOP_BALL_FIRST);
//!
//! assert!(request.stops_ball_first());
//! assert!(!request.is_slide_kick());
//! ```

use bitflags::bitflags;
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::ball::{BallBody, BallInfo, Kicker};
use crate::collab::MatchGate;

bitflags! {
    /// Modifiers attached to a kick request.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct KickFlags: u8 {
        /// Zero the ball's velocities before applying the impulse.
        const STOP_BALL_FIRST = 1 << 0;
        /// The kick is a slide tackle; illegal while out of bounds.
        const SLIDE_KICK = 1 << 1;
    }
}

/// One kick input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KickRequest {
    /// Simulation tick at which the input originated.
    pub tick: u64,
    /// Linear impulse.
    pub force: Vec3,
    /// Angular impulse.
    pub angular_impulse: Vec3,
    /// Modifiers.
    pub flags: KickFlags,
    /// Issuer's view of the ball position, for audit only.
    pub client_ball_position: Vec3,
    /// Issuer's view of the ball velocity, for audit only.
    pub client_ball_velocity: Vec3,
}

impl KickRequest {
    /// Creates a kick with no spin or modifiers.
    #[must_use]
    pub fn new(tick: u64, force: Vec3) -> Self {
        Self {
            tick,
            force,
            angular_impulse: Vec3::ZERO,
            flags: KickFlags::empty(),
            client_ball_position: Vec3::ZERO,
            client_ball_velocity: Vec3::ZERO,
        }
    }

    /// Sets the angular impulse.
    #[must_use]
    pub fn with_spin(mut self, angular_impulse: Vec3) -> Self {
        self.angular_impulse = angular_impulse;
        self
    }

    /// Adds modifier flags.
    #[must_use]
    pub fn with_flags(mut self, flags: KickFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Whether the ball is stopped before the impulse.
    #[must_use]
    pub fn stops_ball_first(&self) -> bool {
        self.flags.contains(KickFlags::STOP_BALL_FIRST)
    }

    /// Whether this is a slide kick.
    #[must_use]
    pub fn is_slide_kick(&self) -> bool {
        self.flags.contains(KickFlags::SLIDE_KICK)
    }

    /// Whether the request carries any spin.
    #[must_use]
    pub fn has_spin(&self) -> bool {
        self.angular_impulse.length_squared() > 0.0
    }
}

/// A request queued on the authority together with its issuer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContestedKick {
    /// The request.
    pub request: KickRequest,
    /// Who issued it.
    pub kicker: Kicker,
}

/// Why a kick had no effect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum KickRejection {
    /// Force magnitude over the legal cap.
    IllegalForce {
        /// Magnitude that was requested.
        magnitude: f32,
    },
    /// Slide kick while the ball is out of bounds.
    SlideOutOfBounds,
    /// The match gate refused kicks (e.g. a goal is being processed).
    MatchStopped,
}

/// Checks and effects shared by every host that issues or applies kicks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KickIntake {
    max_legal_force: f32,
}

impl KickIntake {
    /// Creates an intake enforcing `max_legal_force`.
    #[must_use]
    pub const fn new(max_legal_force: f32) -> Self {
        Self { max_legal_force }
    }

    /// Pre-send checks run by the issuing host.
    ///
    /// # Errors
    ///
    /// Returns the reason the request should be dropped. Dropping is silent
    /// policy, not a fault.
    pub fn admit(
        &self,
        request: &KickRequest,
        info: &BallInfo,
        gate: &dyn MatchGate,
    ) -> Result<(), KickRejection> {
        if !gate.kicks_allowed() {
            return Err(KickRejection::MatchStopped);
        }
        if request.is_slide_kick() && info.is_out_of_bounds() {
            return Err(KickRejection::SlideOutOfBounds);
        }
        Ok(())
    }

    /// Legality checks run by the authority on an arbitration winner.
    ///
    /// # Errors
    ///
    /// Returns the rejection reason; the caller must leave the ball untouched.
    pub fn validate(&self, request: &KickRequest, info: &BallInfo) -> Result<(), KickRejection> {
        let magnitude = request.force.length();
        if magnitude > self.max_legal_force {
            return Err(KickRejection::IllegalForce { magnitude });
        }
        if request.is_slide_kick() && info.is_out_of_bounds() {
            return Err(KickRejection::SlideOutOfBounds);
        }
        Ok(())
    }

    /// Applies a request's impulses to a body.
    pub fn apply(request: &KickRequest, body: &mut BallBody) {
        if request.stops_ball_first() {
            body.stop();
        }
        body.apply_impulse(request.force);
        body.apply_angular_impulse(request.angular_impulse);
    }
}

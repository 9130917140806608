//! Events recorded during a tick for telemetry and gameplay hooks.
//!
//! Events never feed back into simulation state. A [`crate::simulation::Simulation`]
//! appends them in ball-id order as each tick resolves; callers drain them
//! with `take_events()`.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::ball::{BallId, ClientId, Kicker};
use crate::kick::KickRejection;

/// Why a set of contested kicks was dropped without a winner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscardReason {
    /// A previous kick's dead-time was still running.
    Cooldown,
    /// The ball was kinematic (held or animated).
    Kinematic,
    /// Another request had an earlier origination tick.
    LostTie,
}

/// Something that happened to a ball this tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BallEvent {
    /// An arbitrated kick was applied.
    KickAccepted {
        /// Target ball.
        ball: BallId,
        /// Winning issuer.
        kicker: Kicker,
        /// Origination tick of the winning request.
        request_tick: u64,
        /// Applied linear impulse.
        force: Vec3,
    },
    /// The arbitration winner failed validation.
    KickRejected {
        /// Target ball.
        ball: BallId,
        /// Issuer of the rejected request.
        kicker: Kicker,
        /// Why it was rejected.
        reason: KickRejection,
    },
    /// Requests dropped without being applied.
    KicksDiscarded {
        /// Target ball.
        ball: BallId,
        /// Number of requests dropped.
        count: usize,
        /// Why they were dropped.
        reason: DiscardReason,
    },
    /// Spin decayed to rest.
    SpinSettled {
        /// Ball whose spin stopped.
        ball: BallId,
    },
    /// Out-of-bounds play ended and the play flags cleared.
    OutOfBoundsEnded {
        /// Ball back in play.
        ball: BallId,
    },
    /// The kickoff barrier was lowered by the first kick after a restart.
    KickoffBarrierLowered,
    /// A ball was created on this host.
    BallSpawned {
        /// New ball.
        ball: BallId,
        /// Requesting client, for per-client practice balls.
        owner: Option<ClientId>,
    },
    /// A ball was removed from this host.
    BallDespawned {
        /// Removed ball.
        ball: BallId,
    },
    /// This host was told which spawned ball is its local practice ball.
    LocalBallAssigned {
        /// Assigned ball.
        ball: BallId,
    },
}

impl BallEvent {
    /// Ball the event concerns, if any.
    #[must_use]
    pub fn ball(&self) -> Option<BallId> {
        match self {
            Self::KickAccepted { ball, .. }
            | Self::KickRejected { ball, .. }
            | Self::KicksDiscarded { ball, .. }
            | Self::SpinSettled { ball }
            | Self::OutOfBoundsEnded { ball }
            | Self::BallSpawned { ball, .. }
            | Self::BallDespawned { ball }
            | Self::LocalBallAssigned { ball } => Some(*ball),
            Self::KickoffBarrierLowered => None,
        }
    }

    /// Whether this is an accepted kick.
    #[must_use]
    pub fn is_kick_accepted(&self) -> bool {
        matches!(self, Self::KickAccepted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ball_accessor_covers_variants() {
        let event = BallEvent::SpinSettled {
            ball: BallId::new(3),
        };
        assert_eq!(event.ball(), Some(BallId::new(3)));
        assert_eq!(BallEvent::KickoffBarrierLowered.ball(), None);
        assert!(!event.is_kick_accepted());
    }
}

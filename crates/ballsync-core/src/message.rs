//! Messages exchanged between the authority and observers.
//!
//! Every message is addressed by an [`Envelope`]. Snapshots are sent
//! unreliably: they may be dropped or arrive out of order, and the receiving
//! register discards stale ones. Everything else is reliable and keeps
//! per-link order.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::ball::{BallId, BallInfo, ClientId};
use crate::kick::KickRequest;
use crate::replication::StateSnapshot;

/// Who a message is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recipient {
    /// The authoritative host.
    Authority,
    /// Every observer.
    Observers,
    /// One specific host.
    Client(ClientId),
}

/// Ball replication and control messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BallMessage {
    /// Observer → authority: a kick input to arbitrate.
    ///
    /// The kicker is the envelope's sender; the payload carries no identity.
    RequestKick {
        /// Target ball.
        ball: BallId,
        /// The request.
        request: KickRequest,
    },
    /// Authority → observers: latest physical state.
    StateSnapshotUpdated {
        /// Ball the snapshot describes.
        ball: BallId,
        /// The snapshot.
        snapshot: StateSnapshot,
    },
    /// Authority → observers: attribution and play flags changed.
    BallInfoUpdated {
        /// Ball the info describes.
        ball: BallId,
        /// Info version.
        version: u64,
        /// New info.
        info: BallInfo,
    },
    /// Mirrored teleport.
    Teleport {
        /// Target ball.
        ball: BallId,
        /// New position.
        position: Vec3,
        /// New orientation.
        orientation: Quat,
    },
    /// Mirrored kinematic toggle.
    EnableKinematics {
        /// Target ball.
        ball: BallId,
        /// New kinematic flag.
        enabled: bool,
    },
    /// Mirrored collider toggle.
    EnableCollider {
        /// Target ball.
        ball: BallId,
        /// New collider flag.
        enabled: bool,
    },
    /// Mirrored velocity reset.
    StopBall {
        /// Target ball.
        ball: BallId,
    },
    /// Observer → authority: spawn a practice ball for me.
    RequestBallSpawn {
        /// Spawn position.
        position: Vec3,
    },
    /// Authority → requester: this ball is yours.
    AssignSpawnedBall {
        /// The spawned ball.
        ball: BallId,
    },
    /// Authority → observers: a ball now exists.
    BallSpawned {
        /// New ball.
        ball: BallId,
        /// Spawn position.
        position: Vec3,
        /// Whether it is the main match ball.
        main: bool,
    },
    /// Authority → observers: a ball was removed.
    BallDespawned {
        /// Removed ball.
        ball: BallId,
    },
    /// Authority → observers: teleport to a restart position.
    ResetBall {
        /// Target ball.
        ball: BallId,
        /// Restart position.
        position: Vec3,
    },
    /// Observer → authority: end out-of-bounds play.
    EndOutOfBoundsPlay {
        /// Target ball.
        ball: BallId,
        /// Seconds before the play flags clear.
        delay: f32,
    },
    /// Observer → authority: the first kick after kickoff happened.
    DisableKickoffBarrier,
    /// Authority → observers: kickoff barrier state.
    KickoffBarrierChanged {
        /// Barrier version.
        version: u64,
        /// Whether the first kick has happened since the last restart.
        kickoff_ended: bool,
    },
}

impl BallMessage {
    /// Whether the message may be dropped or reordered in transit.
    #[must_use]
    pub fn is_unreliable(&self) -> bool {
        matches!(self, Self::StateSnapshotUpdated { .. })
    }

    /// Short name for log lines.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RequestKick { .. } => "request_kick",
            Self::StateSnapshotUpdated { .. } => "state_snapshot",
            Self::BallInfoUpdated { .. } => "ball_info",
            Self::Teleport { .. } => "teleport",
            Self::EnableKinematics { .. } => "enable_kinematics",
            Self::EnableCollider { .. } => "enable_collider",
            Self::StopBall { .. } => "stop_ball",
            Self::RequestBallSpawn { .. } => "request_ball_spawn",
            Self::AssignSpawnedBall { .. } => "assign_spawned_ball",
            Self::BallSpawned { .. } => "ball_spawned",
            Self::BallDespawned { .. } => "ball_despawned",
            Self::ResetBall { .. } => "reset_ball",
            Self::EndOutOfBoundsPlay { .. } => "end_out_of_bounds_play",
            Self::DisableKickoffBarrier => "disable_kickoff_barrier",
            Self::KickoffBarrierChanged { .. } => "kickoff_barrier_changed",
        }
    }
}

/// A message in transit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Sending host.
    pub from: ClientId,
    /// Addressee.
    pub to: Recipient,
    /// Payload.
    pub message: BallMessage,
}

impl Envelope {
    /// Creates an envelope.
    #[must_use]
    pub const fn new(from: ClientId, to: Recipient, message: BallMessage) -> Self {
        Self { from, to, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_snapshots_are_unreliable() {
        let snapshot = BallMessage::StateSnapshotUpdated {
            ball: BallId::new(1),
            snapshot: StateSnapshot::default(),
        };
        assert!(snapshot.is_unreliable());
        assert!(!BallMessage::StopBall { ball: BallId::new(1) }.is_unreliable());
        assert!(!BallMessage::DisableKickoffBarrier.is_unreliable());
    }

    #[test]
    fn envelopes_serialize() {
        let envelope = Envelope::new(
            ClientId::new(3),
            Recipient::Authority,
            BallMessage::RequestKick {
                ball: BallId::new(1),
                request: KickRequest::new(12, Vec3::X),
            },
        );
        let json = serde_json::to_string(&envelope).unwrap();
        let back: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back, envelope);
        assert_eq!(back.message.kind(), "request_kick");
    }
}

//! Ball entity and identity types.
//!
//! - [`BallId`]: stable ball instance identifier assigned by the authority
//! - [`ClientId`]: numeric identity of a connected host
//! - [`Kicker`]: who issued a kick (a player or an AI goalkeeper)
//! - [`Ball`]: the complete per-ball container owned by a simulation
//!
//! # Example
//!
//! ```
//! use ballsync_core::ball::{Ball, BallId};
//! use ballsync_core::config::SimulationConfig;
//! use glam::Vec3;
//!
//! let config = SimulationConfig::default();
//! let ball = Ball::new(BallId::new(1), Vec3::new(0.0, 0.11, 0.0), &config);
//! assert_eq!(ball.id().as_u64(), 1);
//! assert_eq!(ball.body().transform().position, Vec3::new(0.0, 0.11, 0.0));
//! ```

pub mod components;

use std::fmt;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

pub use components::{
    Attribution, BallBody, BallInfo, CollisionDetection, Interpolation, PlayFlags, SpinState,
    Transform, VisualState,
};

use crate::config::SimulationConfig;
use crate::replication::ReplicationChannel;
use crate::resolver::ArbitrationState;
use crate::timer::TickTimer;

/// Unique identifier of a ball instance.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BallId(u64);

impl BallId {
    /// Creates a `BallId` from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for BallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BallId({})", self.0)
    }
}

impl fmt::Display for BallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numeric identity of a connected host.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClientId(u64);

impl ClientId {
    /// Identity conventionally used by the authority host.
    pub const AUTHORITY: Self = Self(0);

    /// Creates a `ClientId` from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientId({})", self.0)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client:{}", self.0)
    }
}

/// Team name as reported by the player directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TeamTag(String);

impl TeamTag {
    /// Creates a team tag.
    #[must_use]
    pub fn new(tag: &str) -> Self {
        Self(tag.to_string())
    }

    /// Returns the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TeamTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which end of the pitch a goalkeeper defends.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Home goal.
    Home,
    /// Away goal.
    Away,
}

/// Originator of a kick request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kicker {
    /// A connected player.
    Player(ClientId),
    /// An AI goalkeeper running on the authority.
    Goalkeeper(Side),
}

impl fmt::Display for Kicker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player(id) => write!(f, "{id}"),
            Self::Goalkeeper(Side::Home) => f.write_str("keeper:home"),
            Self::Goalkeeper(Side::Away) => f.write_str("keeper:away"),
        }
    }
}

/// A ball instance and all of its per-host state.
///
/// Physical fields are only written by the authority's resolvers, by applied
/// snapshots, by locally predicted kicks, or by mirrored discrete operations.
#[derive(Debug)]
pub struct Ball {
    id: BallId,
    pub(crate) body: BallBody,
    pub(crate) visual: VisualState,
    pub(crate) spin: SpinState,
    pub(crate) info: BallInfo,
    pub(crate) info_dirty: bool,
    pub(crate) arbitration: ArbitrationState,
    pub(crate) replication: ReplicationChannel,
    pub(crate) out_of_bounds_timer: TickTimer,
}

impl Ball {
    /// Creates a resting ball at `position`, normalized by the physics config.
    #[must_use]
    pub fn new(id: BallId, position: Vec3, config: &SimulationConfig) -> Self {
        let mut body = BallBody::new(config.tuning.ball_mass, config.tuning.ball_radius);
        config.physics.configure_body(&mut body);
        body.set_pose(position, Quat::IDENTITY);
        body.sync_transform();

        let mut visual = VisualState::default();
        visual.snap_to(body.transform());

        Self {
            id,
            body,
            visual,
            spin: SpinState::default(),
            info: BallInfo::default(),
            info_dirty: false,
            arbitration: ArbitrationState::default(),
            replication: ReplicationChannel::new(),
            out_of_bounds_timer: TickTimer::idle(),
        }
    }

    /// Ball identifier.
    #[must_use]
    pub const fn id(&self) -> BallId {
        self.id
    }

    /// Physical body.
    #[must_use]
    pub fn body(&self) -> &BallBody {
        &self.body
    }

    /// Smoothed render proxy.
    #[must_use]
    pub fn visual(&self) -> &VisualState {
        &self.visual
    }

    /// Replicated attribution and play state.
    #[must_use]
    pub fn info(&self) -> &BallInfo {
        &self.info
    }

    /// Spin-decay tracking.
    #[must_use]
    pub fn spin(&self) -> &SpinState {
        &self.spin
    }

    /// Arbitration bookkeeping (authority only).
    #[must_use]
    pub fn arbitration(&self) -> &ArbitrationState {
        &self.arbitration
    }

    /// Replication registers.
    #[must_use]
    pub fn replication(&self) -> &ReplicationChannel {
        &self.replication
    }

    /// Mutable replication registers, for subscribing to updates.
    pub fn replication_mut(&mut self) -> &mut ReplicationChannel {
        &mut self.replication
    }

    /// Whether the solver currently leaves this ball alone.
    #[must_use]
    pub fn is_kinematic(&self) -> bool {
        self.body.kinematic
    }

    /// Whether the spin is strong enough to curve the ball.
    #[must_use]
    pub fn is_magnus_active(&self) -> bool {
        self.body.angular_velocity.length_squared() > 0.01
    }

    /// Mutates the replicated info and marks it for publication.
    pub(crate) fn update_info(&mut self, update: impl FnOnce(&mut BallInfo)) {
        let before = self.info.clone();
        update(&mut self.info);
        if self.info != before {
            self.info_dirty = true;
        }
    }

    /// Teleports the ball: zero velocity, physical, synced and visual pose.
    pub(crate) fn teleport(&mut self, position: Vec3, orientation: Quat) {
        self.body.stop();
        self.body.clear_forces();
        self.body.set_pose(position, orientation);
        self.body.sync_transform();
        self.visual.snap_to(self.body.transform());
    }
}

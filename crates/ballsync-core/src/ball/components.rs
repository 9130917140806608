//! Component structs that make up a ball entity.
//!
//! - [`BallBody`]: solver-facing physical state
//! - [`VisualState`]: per-host smoothed render proxy
//! - [`Attribution`] and [`PlayFlags`]: authority-written bookkeeping read by
//!   external scoring logic, replicated together as [`BallInfo`]
//! - [`SpinState`]: spin-decay window tracking

use bitflags::bitflags;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::{ClientId, Kicker, TeamTag};
use crate::collab::PlayerDirectory;

// =============================================================================
// Physical body
// =============================================================================

/// Collision detection mode of a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CollisionDetection {
    /// Contacts are only checked at tick boundaries.
    #[default]
    Discrete,
    /// Swept contacts, required for fast-moving balls.
    Continuous,
}

/// Render interpolation mode of a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Interpolation {
    /// The render transform jumps at each tick.
    #[default]
    None,
    /// The render transform is interpolated between ticks.
    Interpolate,
}

/// Position and orientation pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// World position.
    pub position: Vec3,
    /// World orientation.
    pub orientation: Quat,
}

impl Transform {
    /// Creates a transform.
    #[must_use]
    pub const fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            position,
            orientation,
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Quat::IDENTITY)
    }
}

/// Physical state of one ball as seen by the solver.
///
/// Pose writes (`position`, `orientation`) are not visible through
/// [`transform`](Self::transform) until [`sync_transform`](Self::sync_transform)
/// runs, mirroring a solver with automatic transform sync disabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallBody {
    /// Solver position.
    pub position: Vec3,
    /// Solver orientation.
    pub orientation: Quat,
    /// Linear velocity in m/s.
    pub linear_velocity: Vec3,
    /// Angular velocity in rad/s.
    pub angular_velocity: Vec3,
    /// When set, forces and collisions do not move the body.
    pub kinematic: bool,
    /// Whether the collider takes part in contacts.
    pub collider_enabled: bool,
    /// Whether the solver applies global gravity to this body.
    pub use_gravity: bool,
    /// Mass in kilograms.
    pub mass: f32,
    /// Radius in metres.
    pub radius: f32,
    /// Scalar moment of inertia (solid sphere).
    pub inertia: f32,
    /// Linear damping coefficient.
    pub linear_damping: f32,
    /// Angular damping coefficient.
    pub angular_damping: f32,
    /// Angular speed cap in rad/s.
    pub max_angular_speed: f32,
    /// Collision detection mode.
    pub collision_detection: CollisionDetection,
    /// Render interpolation mode.
    pub interpolation: Interpolation,
    /// Per-body solver position iterations.
    pub solver_position_iterations: u32,
    /// Per-body solver velocity iterations.
    pub solver_velocity_iterations: u32,
    force: Vec3,
    transform: Transform,
}

impl BallBody {
    /// Creates a resting solid sphere at the origin.
    #[must_use]
    pub fn new(mass: f32, radius: f32) -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            kinematic: false,
            collider_enabled: true,
            use_gravity: true,
            mass,
            radius,
            inertia: 0.4 * mass * radius * radius,
            linear_damping: 0.0,
            angular_damping: 0.0,
            max_angular_speed: f32::INFINITY,
            collision_detection: CollisionDetection::default(),
            interpolation: Interpolation::default(),
            solver_position_iterations: 1,
            solver_velocity_iterations: 1,
            force: Vec3::ZERO,
            transform: Transform::default(),
        }
    }

    /// Adds an instantaneous linear impulse. No effect while kinematic.
    pub fn apply_impulse(&mut self, impulse: Vec3) {
        if self.kinematic {
            return;
        }
        self.linear_velocity += impulse / self.mass;
    }

    /// Adds an instantaneous angular impulse. No effect while kinematic.
    pub fn apply_angular_impulse(&mut self, impulse: Vec3) {
        if self.kinematic {
            return;
        }
        self.angular_velocity =
            (self.angular_velocity + impulse / self.inertia).clamp_length_max(self.max_angular_speed);
    }

    /// Accumulates a continuous force for the next solver step.
    pub fn add_force(&mut self, force: Vec3) {
        if self.kinematic {
            return;
        }
        self.force += force;
    }

    /// Returns the force accumulated since the last step.
    #[must_use]
    pub fn accumulated_force(&self) -> Vec3 {
        self.force
    }

    /// Clears the force accumulator.
    pub fn clear_forces(&mut self) {
        self.force = Vec3::ZERO;
    }

    /// Zeroes linear and angular velocity.
    pub fn stop(&mut self) {
        self.linear_velocity = Vec3::ZERO;
        self.angular_velocity = Vec3::ZERO;
    }

    /// Writes the solver pose directly. Call [`sync_transform`](Self::sync_transform)
    /// before reading [`transform`](Self::transform).
    pub fn set_pose(&mut self, position: Vec3, orientation: Quat) {
        self.position = position;
        self.orientation = orientation;
    }

    /// Publishes the solver pose to the readable transform.
    pub fn sync_transform(&mut self) {
        self.transform = Transform::new(self.position, self.orientation);
    }

    /// Last synced transform.
    #[must_use]
    pub fn transform(&self) -> Transform {
        self.transform
    }
}

// =============================================================================
// Visual proxy
// =============================================================================

/// Smoothed render transform, distinct from the physical transform.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VisualState {
    /// Rendered position.
    pub position: Vec3,
    /// Rendered orientation.
    pub orientation: Quat,
    /// SmoothDamp velocity carried between frames.
    pub velocity: Vec3,
}

impl VisualState {
    /// Places the visual proxy exactly on a transform and stops smoothing.
    pub fn snap_to(&mut self, transform: Transform) {
        self.position = transform.position;
        self.orientation = transform.orientation;
        self.velocity = Vec3::ZERO;
    }
}

// =============================================================================
// Replicated bookkeeping
// =============================================================================

bitflags! {
    /// Out-of-play state of a ball.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct PlayFlags: u8 {
        /// Ball left the field of play.
        const OUT_OF_BOUNDS = 1 << 0;
        /// Restart is a throw-in.
        const THROW_IN = 1 << 1;
        /// Restart is a corner kick.
        const CORNER_KICK = 1 << 2;
        /// Restart is a goal kick.
        const GOAL_KICK = 1 << 3;
        /// Ball is held by a player.
        const PICKED_UP = 1 << 4;
    }
}

/// Who touched the ball last, and who gets credit for a goal.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Attribution {
    /// Most recent player to have a kick accepted.
    pub last_kicker: Option<ClientId>,
    /// Previous distinct kicker.
    pub second_last_kicker: Option<ClientId>,
    /// Team of the last kicker, if the directory knows it.
    pub last_team: Option<TeamTag>,
    /// Display name of the credited scorer.
    pub scorer: Option<String>,
    /// Display name of the credited assister.
    pub assister: Option<String>,
}

impl Attribution {
    /// Records an accepted kick.
    ///
    /// A player's repeated touches never move them into `second_last_kicker`.
    /// Goalkeeper touches clear both kicker fields.
    pub fn record_kick(&mut self, kicker: Kicker, directory: &dyn PlayerDirectory) {
        match kicker {
            Kicker::Player(id) => {
                if self.last_kicker != Some(id) {
                    self.second_last_kicker = self.last_kicker;
                }
                self.last_kicker = Some(id);
                self.last_team = directory.team_of(id);
            }
            Kicker::Goalkeeper(_) => {
                self.last_kicker = None;
                self.second_last_kicker = None;
            }
        }
    }

    /// Fills in scorer and assister names from the current kickers.
    ///
    /// The assist is only credited to a teammate of the scorer; any earlier
    /// assister is dropped.
    pub fn credit_goal(&mut self, directory: &dyn PlayerDirectory) {
        let Some(scorer) = self.last_kicker else {
            return;
        };
        self.scorer = directory.display_name(scorer);
        self.assister = None;

        if let Some(assister) = self.second_last_kicker {
            let scorer_team = directory.team_of(scorer);
            if scorer_team.is_some() && directory.team_of(assister) == scorer_team {
                self.assister = directory.display_name(assister);
            }
        }
    }

    /// Forgets every kicker and credit, as at a round restart.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Authority-written ball bookkeeping, replicated as one versioned value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BallInfo {
    /// Kicker attribution.
    pub attribution: Attribution,
    /// Out-of-play flags.
    pub play: PlayFlags,
}

impl BallInfo {
    /// Whether the ball is currently out of bounds.
    #[must_use]
    pub fn is_out_of_bounds(&self) -> bool {
        self.play.contains(PlayFlags::OUT_OF_BOUNDS)
    }
}

/// Spin-decay window tracking.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpinState {
    /// Simulation time of the last accepted kick with non-zero spin.
    pub kick_time: Option<f64>,
}

//! Rigid-body solver seam.
//!
//! The ball core orchestrates authority, arbitration and replication around a
//! solver it does not own. [`Solver`] is the narrow interface it needs:
//! one-time configuration, per-tick integration of a body, and an explicit
//! "sync transforms now" primitive.
//!
//! [`ReferenceSolver`] is a minimal semi-implicit Euler integrator with an
//! optional ground plane. It exists so the core can run headless and be
//! tested; production hosts plug their engine in through the trait.
//!
//! # Fixed Timestep
//!
//! Integration is always called with the configured fixed timestep, never a
//! frame delta, so every host integrates identical steps.

use glam::{Quat, Vec3};

use crate::ball::BallBody;
use crate::config::PhysicsDeterminismConfig;

/// Rigid-body solver used by a simulation.
///
/// Implementations must be deterministic for identical inputs.
pub trait Solver: Send + Sync {
    /// Applies global configuration. Must be idempotent.
    fn configure(&mut self, config: &PhysicsDeterminismConfig);

    /// Advances one body by `dt`, consuming its force accumulator.
    ///
    /// Kinematic bodies are not moved.
    fn integrate(&self, body: &mut BallBody, dt: f32);

    /// Publishes the body's solver pose to its readable transform.
    fn sync_transforms(&self, body: &mut BallBody) {
        body.sync_transform();
    }

    /// Whether direct pose writes are published without an explicit sync.
    fn auto_sync_transforms(&self) -> bool {
        false
    }

    /// Writes a pose directly, syncing only if automatic sync is enabled.
    fn write_pose(&self, body: &mut BallBody, position: Vec3, orientation: Quat) {
        body.set_pose(position, orientation);
        if self.auto_sync_transforms() {
            body.sync_transform();
        }
    }
}

/// Horizontal ground plane the reference solver collides balls against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundPlane {
    /// Height of the plane.
    pub height: f32,
    /// Fraction of normal speed kept on a bounce.
    pub restitution: f32,
}

impl Default for GroundPlane {
    fn default() -> Self {
        Self {
            height: 0.0,
            restitution: 0.6,
        }
    }
}

/// Minimal deterministic integrator.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSolver {
    gravity: Vec3,
    contact_offset: f32,
    bounce_threshold: f32,
    sleep_threshold: f32,
    auto_sync: bool,
    ground: Option<GroundPlane>,
}

impl Default for ReferenceSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceSolver {
    /// Creates a solver in free flight (no ground), using default constants
    /// until [`Solver::configure`] runs.
    #[must_use]
    pub fn new() -> Self {
        let mut solver = Self {
            gravity: Vec3::ZERO,
            contact_offset: 0.0,
            bounce_threshold: 0.0,
            sleep_threshold: 0.0,
            auto_sync: false,
            ground: None,
        };
        solver.configure(&PhysicsDeterminismConfig::default());
        solver
    }

    /// Adds a ground plane.
    #[must_use]
    pub fn with_ground(mut self, ground: GroundPlane) -> Self {
        self.ground = Some(ground);
        self
    }

    /// Configured gravity.
    #[must_use]
    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    /// Ground plane, if any.
    #[must_use]
    pub fn ground(&self) -> Option<GroundPlane> {
        self.ground
    }

    fn resolve_ground(&self, ground: GroundPlane, body: &mut BallBody) -> bool {
        let floor = ground.height + body.radius;
        if body.position.y > floor + self.contact_offset {
            return false;
        }
        if body.position.y < floor {
            body.position.y = floor;
        }
        if body.linear_velocity.y < 0.0 {
            let impact = -body.linear_velocity.y;
            body.linear_velocity.y = if impact > self.bounce_threshold {
                impact * ground.restitution
            } else {
                0.0
            };
        }
        true
    }
}

impl Solver for ReferenceSolver {
    fn configure(&mut self, config: &PhysicsDeterminismConfig) {
        self.gravity = config.gravity;
        self.contact_offset = config.contact_offset;
        self.bounce_threshold = config.bounce_threshold;
        self.sleep_threshold = config.sleep_threshold;
        self.auto_sync = config.auto_sync_transforms;
    }

    fn integrate(&self, body: &mut BallBody, dt: f32) {
        if body.kinematic {
            body.clear_forces();
            body.sync_transform();
            return;
        }

        let mut acceleration = body.accumulated_force() / body.mass;
        if body.use_gravity {
            acceleration += self.gravity;
        }
        body.linear_velocity += acceleration * dt;
        body.linear_velocity *= (1.0 - body.linear_damping * dt).max(0.0);
        body.angular_velocity *= (1.0 - body.angular_damping * dt).max(0.0);
        body.angular_velocity = body.angular_velocity.clamp_length_max(body.max_angular_speed);

        body.position += body.linear_velocity * dt;
        let rotation = Quat::from_scaled_axis(body.angular_velocity * dt);
        body.orientation = (rotation * body.orientation).normalize();

        let grounded = match self.ground {
            Some(ground) if body.collider_enabled => self.resolve_ground(ground, body),
            _ => false,
        };
        if grounded {
            let energy =
                0.5 * (body.linear_velocity.length_squared() + body.angular_velocity.length_squared());
            if energy < self.sleep_threshold {
                body.stop();
            }
        }

        body.clear_forces();
        body.sync_transform();
    }

    fn auto_sync_transforms(&self) -> bool {
        self.auto_sync
    }
}

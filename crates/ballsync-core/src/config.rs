//! Process-wide physics configuration and per-ball tuning.
//!
//! Every host applies the same [`PhysicsDeterminismConfig`] before any body is
//! simulated so that authority and observers integrate with matching
//! constants. [`BallTuning`] holds the gameplay constants that drive spin,
//! arbitration and smoothing.
//!
//! # Example
//!
//! ```
//! use ballsync_core::config::PhysicsDeterminismConfig;
//!
//! let config = PhysicsDeterminismConfig::default();
//! assert!(config.validate().is_ok());
//! assert!((config.fixed_timestep - 0.02).abs() < f32::EPSILON);
//! ```

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::ball::{BallBody, CollisionDetection, Interpolation};
use crate::error::{BallSyncError, Result};

/// Default fixed simulation step (50 Hz).
pub const DEFAULT_FIXED_TIMESTEP: f32 = 0.02;

/// Global solver configuration shared by every host.
///
/// Applying it is pure configuration: idempotent and infallible once
/// [`validate`](Self::validate) has passed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsDeterminismConfig {
    /// Length of one simulation tick in seconds.
    pub fixed_timestep: f32,
    /// Solver position iterations, copied onto every body.
    pub solver_position_iterations: u32,
    /// Solver velocity iterations, copied onto every body.
    pub solver_velocity_iterations: u32,
    /// Global gravity vector.
    pub gravity: Vec3,
    /// Distance at which contacts start being generated.
    pub contact_offset: f32,
    /// Relative normal speed below which contacts do not bounce.
    pub bounce_threshold: f32,
    /// Mass-normalized kinetic energy below which a resting body sleeps.
    pub sleep_threshold: f32,
    /// Maximum angular speed of any body, in rad/s.
    pub max_angular_speed: f32,
    /// When false, transform reads after a direct pose write are only valid
    /// after an explicit `sync_transforms` call.
    pub auto_sync_transforms: bool,
    /// Lower bound applied to every ball's linear damping.
    pub min_linear_damping: f32,
    /// Lower bound applied to every ball's angular damping.
    pub min_angular_damping: f32,
}

impl Default for PhysicsDeterminismConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: DEFAULT_FIXED_TIMESTEP,
            solver_position_iterations: 8,
            solver_velocity_iterations: 2,
            gravity: Vec3::new(0.0, -9.81, 0.0),
            contact_offset: 0.01,
            bounce_threshold: 2.0,
            sleep_threshold: 0.005,
            max_angular_speed: 50.0,
            auto_sync_transforms: false,
            min_linear_damping: 0.05,
            min_angular_damping: 0.05,
        }
    }
}

impl PhysicsDeterminismConfig {
    /// Checks that every value is usable by the solver.
    ///
    /// # Errors
    ///
    /// Returns [`BallSyncError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        if !(self.fixed_timestep.is_finite() && self.fixed_timestep > 0.0) {
            return Err(invalid("fixed_timestep", "must be positive and finite"));
        }
        if self.solver_position_iterations == 0 {
            return Err(invalid("solver_position_iterations", "must be at least 1"));
        }
        if self.solver_velocity_iterations == 0 {
            return Err(invalid("solver_velocity_iterations", "must be at least 1"));
        }
        if !self.gravity.is_finite() {
            return Err(invalid("gravity", "must be finite"));
        }
        let non_negative = [
            ("contact_offset", self.contact_offset),
            ("bounce_threshold", self.bounce_threshold),
            ("sleep_threshold", self.sleep_threshold),
            ("max_angular_speed", self.max_angular_speed),
            ("min_linear_damping", self.min_linear_damping),
            ("min_angular_damping", self.min_angular_damping),
        ];
        for (field, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid(field, "must be non-negative and finite"));
            }
        }
        Ok(())
    }

    /// Normalizes a freshly spawned ball body.
    ///
    /// Forces continuous collision detection and interpolated rendering,
    /// copies the solver iteration counts and angular speed cap, and raises
    /// damping to the configured floors (never lowers it).
    pub fn configure_body(&self, body: &mut BallBody) {
        body.collision_detection = CollisionDetection::Continuous;
        body.interpolation = Interpolation::Interpolate;
        body.solver_position_iterations = self.solver_position_iterations;
        body.solver_velocity_iterations = self.solver_velocity_iterations;
        body.max_angular_speed = self.max_angular_speed;
        body.linear_damping = body.linear_damping.max(self.min_linear_damping);
        body.angular_damping = body.angular_damping.max(self.min_angular_damping);
    }
}

/// Gameplay constants for a ball.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BallTuning {
    /// Scale of the `angular × linear` Magnus force.
    pub magnus_force_multiplier: f32,
    /// Constant downward force, independent of gravity.
    pub down_force_multiplier: f32,
    /// Seconds after a spinning kick before angular decay starts.
    pub spin_duration: f32,
    /// Fraction of angular velocity kept per second once decay runs.
    pub spin_decay_rate: f32,
    /// Largest force magnitude the authority accepts in a kick.
    pub max_legal_force: f32,
    /// Dead-time after an arbitrated kick during which new kicks are discarded.
    pub kick_cooldown: f32,
    /// SmoothDamp time of the visual proxy.
    pub interpolation_time: f32,
    /// Mass of a ball in kilograms.
    pub ball_mass: f32,
    /// Radius of a ball in metres.
    pub ball_radius: f32,
}

impl Default for BallTuning {
    fn default() -> Self {
        Self {
            magnus_force_multiplier: 0.05,
            down_force_multiplier: 1.0,
            spin_duration: 2.0,
            spin_decay_rate: 0.98,
            max_legal_force: 54.6,
            kick_cooldown: 0.1,
            interpolation_time: 0.045,
            ball_mass: 0.45,
            ball_radius: 0.11,
        }
    }
}

impl BallTuning {
    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`BallSyncError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("magnus_force_multiplier", self.magnus_force_multiplier),
            ("down_force_multiplier", self.down_force_multiplier),
            ("spin_duration", self.spin_duration),
            ("max_legal_force", self.max_legal_force),
            ("kick_cooldown", self.kick_cooldown),
            ("interpolation_time", self.interpolation_time),
        ];
        for (field, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid(field, "must be non-negative and finite"));
            }
        }
        if !(self.spin_decay_rate > 0.0 && self.spin_decay_rate <= 1.0) {
            return Err(invalid("spin_decay_rate", "must be in (0, 1]"));
        }
        if !(self.ball_mass.is_finite() && self.ball_mass > 0.0) {
            return Err(invalid("ball_mass", "must be positive and finite"));
        }
        if !(self.ball_radius.is_finite() && self.ball_radius > 0.0) {
            return Err(invalid("ball_radius", "must be positive and finite"));
        }
        Ok(())
    }
}

/// Everything a [`crate::simulation::Simulation`] needs to be built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Solver configuration.
    pub physics: PhysicsDeterminismConfig,
    /// Ball gameplay constants.
    pub tuning: BallTuning,
}

impl SimulationConfig {
    /// Validates both halves of the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first [`BallSyncError::InvalidConfig`] found.
    pub fn validate(&self) -> Result<()> {
        self.physics.validate()?;
        self.tuning.validate()
    }
}

fn invalid(field: &'static str, reason: &'static str) -> BallSyncError {
    BallSyncError::InvalidConfig { field, reason }
}

//! Aerodynamic forces and spin decay.
//!
//! Applied by the authority before integration, so observers only ever see
//! the result through snapshots. Forces go through the body's accumulator and
//! are consumed by the next solver step.

use glam::Vec3;
use tracing::trace;

use crate::ball::{Ball, BallBody};
use crate::config::BallTuning;
use crate::event::BallEvent;
use crate::timer::ticks_for;

use super::{Resolver, TickContext};

/// Squared magnitude below which spin or speed counts as zero.
const REST_EPSILON_SQ: f32 = 0.01;

/// Magnus force for a body, or zero when it is too slow or not spinning.
fn magnus_force(angular: Vec3, linear: Vec3, multiplier: f32) -> Vec3 {
    if angular.length_squared() > REST_EPSILON_SQ && linear.length_squared() > REST_EPSILON_SQ {
        angular.cross(linear) * multiplier
    } else {
        Vec3::ZERO
    }
}

/// Adds Magnus and downforce, and decays spin once the spin window closes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpinDynamics;

impl SpinDynamics {
    /// Creates the resolver.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Resolver for SpinDynamics {
    fn name(&self) -> &'static str {
        "spin-dynamics"
    }

    fn resolve(&self, ctx: &TickContext<'_>, ball: &mut Ball, events: &mut Vec<BallEvent>) {
        if ball.body.kinematic {
            return;
        }
        let tuning = ctx.tuning;
        let body = &mut ball.body;

        body.add_force(magnus_force(
            body.angular_velocity,
            body.linear_velocity,
            tuning.magnus_force_multiplier,
        ));
        body.add_force(Vec3::new(0.0, -tuning.down_force_multiplier, 0.0));

        let Some(kick_time) = ball.spin.kick_time else {
            return;
        };
        if ctx.now <= kick_time + f64::from(tuning.spin_duration) {
            return;
        }
        body.angular_velocity *= tuning.spin_decay_rate.powf(ctx.dt);
        if body.angular_velocity.length_squared() < REST_EPSILON_SQ {
            body.angular_velocity = Vec3::ZERO;
            ball.spin.kick_time = None;
            trace!(ball = %ball.id(), "spin settled");
            events.push(BallEvent::SpinSettled { ball: ball.id() });
        }
    }
}

/// Predicts where a body will be `time_ahead` seconds from now.
///
/// Forward-integrates `gravity`, downforce, Magnus force and damping at the
/// fixed step without touching the body. Gravity is always applied, even on
/// observers whose bodies do not simulate it, and forces are divided by the
/// body's mass. The step count is `time_ahead / dt` rounded up, so the
/// estimate never stops short of the requested time. Contacts are ignored,
/// so the result is a free-flight estimate. Kinematic bodies stay where they
/// are.
#[must_use]
pub fn predict_position(
    body: &BallBody,
    tuning: &BallTuning,
    gravity: Vec3,
    dt: f32,
    time_ahead: f32,
) -> Vec3 {
    if body.kinematic {
        return body.position;
    }
    let mut position = body.position;
    let mut linear = body.linear_velocity;
    let mut angular = body.angular_velocity;
    let downforce = Vec3::new(0.0, -tuning.down_force_multiplier, 0.0);

    for _ in 0..ticks_for(time_ahead, dt) {
        let force = downforce + magnus_force(angular, linear, tuning.magnus_force_multiplier);
        linear += (force / body.mass + gravity) * dt;
        linear *= (1.0 - body.linear_damping * dt).max(0.0);
        angular *= (1.0 - body.angular_damping * dt).max(0.0);
        position += linear * dt;
    }
    position
}

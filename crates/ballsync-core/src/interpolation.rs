//! Visual smoothing of the ball on every host.
//!
//! Observers overwrite their physical body whenever a snapshot lands, which
//! makes the body jump. The visual proxy chases the synced transform with a
//! critically damped spring instead, so rendering stays smooth while the
//! physics stays authoritative.
//!
//! Rendering runs at frame rate, decoupled from the fixed tick.

use glam::Vec3;

use crate::ball::Ball;

/// Critically damped approach of `current` toward `target`.
///
/// `velocity` is carried between calls. The approach never overshoots: if a
/// step would pass the target, the result lands exactly on it and the
/// velocity is zeroed.
///
/// ```
/// use ballsync_core::interpolation::smooth_damp;
/// use glam::Vec3;
///
/// let mut velocity = Vec3::ZERO;
/// let mut position = Vec3::ZERO;
/// for _ in 0..60 {
///     position = smooth_damp(position, Vec3::X, &mut velocity, 0.045, 1.0 / 60.0);
/// }
/// assert!((position - Vec3::X).length() < 1e-3);
/// ```
#[must_use]
pub fn smooth_damp(current: Vec3, target: Vec3, velocity: &mut Vec3, smooth_time: f32, dt: f32) -> Vec3 {
    if dt <= 0.0 {
        return current;
    }
    let smooth_time = smooth_time.max(1e-4);
    let omega = 2.0 / smooth_time;
    let x = omega * dt;
    let decay = 1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x);

    let change = current - target;
    let temp = (*velocity + change * omega) * dt;
    *velocity = (*velocity - temp * omega) * decay;
    let mut output = target + (change + temp) * decay;

    if (target - current).dot(output - target) > 0.0 {
        output = target;
        *velocity = Vec3::ZERO;
    }
    output
}

/// Drives a ball's visual proxy toward its synced transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interpolator {
    smooth_time: f32,
}

impl Interpolator {
    /// Creates an interpolator with the given SmoothDamp time.
    #[must_use]
    pub const fn new(smooth_time: f32) -> Self {
        Self { smooth_time }
    }

    /// Advances one render frame.
    ///
    /// Kinematic and out-of-bounds balls snap to the synced transform; any
    /// other ball is smoothed in position while orientation is copied.
    pub fn update(&self, ball: &mut Ball, frame_dt: f32) {
        let synced = ball.body.transform();
        if ball.body.kinematic || ball.info.is_out_of_bounds() {
            ball.visual.snap_to(synced);
            return;
        }
        let visual = &mut ball.visual;
        visual.position = smooth_damp(
            visual.position,
            synced.position,
            &mut visual.velocity,
            self.smooth_time,
            frame_dt,
        );
        visual.orientation = synced.orientation;
    }
}

#[cfg(test)]
mod tests {
    use glam::Quat;

    use super::*;
    use crate::ball::{BallId, PlayFlags};
    use crate::config::SimulationConfig;

    const FRAME: f32 = 1.0 / 60.0;

    fn displaced_ball() -> Ball {
        let mut ball = Ball::new(BallId::new(1), Vec3::ZERO, &SimulationConfig::default());
        ball.body.set_pose(Vec3::new(2.0, 0.0, 0.0), Quat::from_rotation_y(1.0));
        ball.body.sync_transform();
        ball
    }

    #[test]
    fn approaches_monotonically_without_overshoot() {
        let target = Vec3::new(1.0, 0.0, 0.0);
        let mut velocity = Vec3::ZERO;
        let mut position = Vec3::ZERO;
        let mut last = f32::MAX;
        for _ in 0..120 {
            position = smooth_damp(position, target, &mut velocity, 0.045, FRAME);
            let distance = (target - position).length();
            assert!(distance <= last + 1e-6);
            assert!(position.x <= 1.0 + 1e-6);
            last = distance;
        }
        assert!(last < 1e-4);
    }

    #[test]
    fn zero_frame_is_a_no_op() {
        let mut velocity = Vec3::ONE;
        let result = smooth_damp(Vec3::ZERO, Vec3::X, &mut velocity, 0.045, 0.0);
        assert_eq!(result, Vec3::ZERO);
        assert_eq!(velocity, Vec3::ONE);
    }

    #[test]
    fn visual_lags_then_converges() {
        let mut ball = displaced_ball();
        let interpolator = Interpolator::new(0.045);

        interpolator.update(&mut ball, FRAME);
        assert!(ball.visual().position.x > 0.0);
        assert!(ball.visual().position.x < 2.0);
        assert_eq!(ball.visual().orientation, Quat::from_rotation_y(1.0));

        for _ in 0..60 {
            interpolator.update(&mut ball, FRAME);
        }
        assert!((ball.visual().position.x - 2.0).abs() < 1e-3);
    }

    #[test]
    fn kinematic_and_out_of_bounds_snap() {
        let interpolator = Interpolator::new(0.045);

        let mut held = displaced_ball();
        held.body.kinematic = true;
        interpolator.update(&mut held, FRAME);
        assert_eq!(held.visual().position, Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(held.visual().velocity, Vec3::ZERO);

        let mut out = displaced_ball();
        out.update_info(|info| info.play = PlayFlags::OUT_OF_BOUNDS);
        interpolator.update(&mut out, FRAME);
        assert_eq!(out.visual().position, Vec3::new(2.0, 0.0, 0.0));
    }
}

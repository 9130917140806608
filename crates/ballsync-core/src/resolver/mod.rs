//! Per-ball resolvers run by the authority every fixed tick.
//!
//! Resolvers are the write phase of an authoritative tick. Each one receives a
//! shared, read-only [`TickContext`] and exclusive access to one [`Ball`], and
//! appends any [`BallEvent`]s it produces.
//!
//! # Execution Order
//!
//! For every non-despawned ball, in this order:
//! 1. [`KickArbitrator`]: resolve contested kick requests into at most one impulse
//! 2. [`SpinDynamics`]: add Magnus and downforce, decay spin
//!
//! The solver then integrates the ball and the authority publishes its
//! snapshot.
//!
//! # Invariants
//!
//! - Resolvers only touch the ball they were handed, so balls can be resolved
//!   in parallel
//! - Resolvers must be deterministic for the same ball state and context
//! - Events are appended in the order they happen for that ball

mod arbitration;
mod spin;

pub use arbitration::{ArbitrationPhase, ArbitrationState, KickArbitrator};
pub use spin::{predict_position, SpinDynamics};

use crate::ball::Ball;
use crate::collab::PlayerDirectory;
use crate::config::BallTuning;
use crate::event::BallEvent;

/// Read-only inputs shared by every resolver during one tick.
#[derive(Clone, Copy)]
pub struct TickContext<'a> {
    /// Tick being resolved.
    pub tick: u64,
    /// Fixed timestep in seconds.
    pub dt: f32,
    /// Simulation time at the start of the tick.
    pub now: f64,
    /// Ball gameplay constants.
    pub tuning: &'a BallTuning,
    /// Player directory for attribution.
    pub directory: &'a dyn PlayerDirectory,
}

impl<'a> TickContext<'a> {
    /// Builds the context for `tick` at step `dt`.
    #[must_use]
    pub fn new(
        tick: u64,
        dt: f32,
        tuning: &'a BallTuning,
        directory: &'a dyn PlayerDirectory,
    ) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let now = tick as f64 * f64::from(dt);
        Self {
            tick,
            dt,
            now,
            tuning,
            directory,
        }
    }
}

impl std::fmt::Debug for TickContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickContext")
            .field("tick", &self.tick)
            .field("dt", &self.dt)
            .field("now", &self.now)
            .finish_non_exhaustive()
    }
}

/// A pass over one ball during an authoritative tick.
///
/// # Example
///
/// ```
/// use ballsync_core::ball::Ball;
/// use ballsync_core::event::BallEvent;
/// use ballsync_core::resolver::{Resolver, TickContext};
///
/// struct Freeze;
///
/// impl Resolver for Freeze {
///     fn name(&self) -> &'static str {
///         "freeze"
///     }
///
///     fn resolve(&self, _ctx: &TickContext<'_>, _ball: &mut Ball, _events: &mut Vec<BallEvent>) {}
/// }
/// ```
pub trait Resolver: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &'static str;

    /// Resolves one ball for the current tick.
    fn resolve(&self, ctx: &TickContext<'_>, ball: &mut Ball, events: &mut Vec<BallEvent>);
}

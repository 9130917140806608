//! Kick arbitration: at most one winning impulse per ball per tick.
//!
//! Requests collected since the previous tick form the contested set. The
//! request with the lowest origination tick wins; ties keep arrival order.
//! Everything else in the set is dropped, including requests that would not
//! have conflicted with the winner.
//!
//! # State Machine
//!
//! ```text
//! Idle ──enqueue──▶ Collecting ──tick──▶ Resolving ──winner──▶ Cooldown ──expire──▶ Idle
//!                        │                                        │
//!                        └──────── discard while cooling ◀────────┘
//! ```
//!
//! The cooldown is armed the moment a winner is chosen, whether or not the
//! winner then passes validation.

use tracing::debug;

use crate::ball::Ball;
use crate::event::{BallEvent, DiscardReason};
use crate::kick::{ContestedKick, KickIntake};
use crate::timer::TickTimer;

use super::{Resolver, TickContext};

/// Where a ball's arbitration currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArbitrationPhase {
    /// Nothing queued, no dead-time.
    #[default]
    Idle,
    /// Requests are queued for the next tick.
    Collecting,
    /// A set is being resolved this tick.
    Resolving,
    /// Dead-time after a winner; new sets are discarded.
    Cooldown,
}

/// Per-ball arbitration bookkeeping, held on the authority.
#[derive(Debug, Clone, Default)]
pub struct ArbitrationState {
    pending: Vec<ContestedKick>,
    cooldown: TickTimer,
    phase: ArbitrationPhase,
}

impl ArbitrationState {
    /// Queues a request for the next resolution.
    pub fn enqueue(&mut self, kick: ContestedKick) {
        self.pending.push(kick);
        if self.phase == ArbitrationPhase::Idle {
            self.phase = ArbitrationPhase::Collecting;
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> ArbitrationPhase {
        self.phase
    }

    /// Requests waiting for the next tick.
    #[must_use]
    pub fn pending(&self) -> &[ContestedKick] {
        &self.pending
    }

    /// Ticks of dead-time left.
    #[must_use]
    pub fn cooldown_remaining(&self) -> u32 {
        self.cooldown.remaining()
    }

    /// Drops queued requests and any running cooldown.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn settle(&mut self) {
        self.phase = if self.cooldown.is_active() {
            ArbitrationPhase::Cooldown
        } else if self.pending.is_empty() {
            ArbitrationPhase::Idle
        } else {
            ArbitrationPhase::Collecting
        };
    }
}

/// Resolves each ball's contested set once per authoritative tick.
#[derive(Debug, Clone, Copy)]
pub struct KickArbitrator {
    intake: KickIntake,
}

impl KickArbitrator {
    /// Creates an arbitrator enforcing `max_legal_force`.
    #[must_use]
    pub const fn new(max_legal_force: f32) -> Self {
        Self {
            intake: KickIntake::new(max_legal_force),
        }
    }

    /// Index of the winning request: lowest tick, first queued on ties.
    fn winner(set: &[ContestedKick]) -> Option<usize> {
        set.iter()
            .enumerate()
            .min_by_key(|(_, kick)| kick.request.tick)
            .map(|(index, _)| index)
    }
}

impl Resolver for KickArbitrator {
    fn name(&self) -> &'static str {
        "kick-arbitrator"
    }

    fn resolve(&self, ctx: &TickContext<'_>, ball: &mut Ball, events: &mut Vec<BallEvent>) {
        ball.arbitration.cooldown.advance();
        let set = std::mem::take(&mut ball.arbitration.pending);
        let id = ball.id();

        if set.is_empty() {
            ball.arbitration.settle();
            return;
        }

        let discard = if ball.body.kinematic {
            Some(DiscardReason::Kinematic)
        } else if ball.arbitration.cooldown.is_active() {
            Some(DiscardReason::Cooldown)
        } else {
            None
        };
        if let Some(reason) = discard {
            debug!(ball = %id, count = set.len(), ?reason, "discarding contested kicks");
            events.push(BallEvent::KicksDiscarded {
                ball: id,
                count: set.len(),
                reason,
            });
            ball.arbitration.settle();
            return;
        }

        ball.arbitration.phase = ArbitrationPhase::Resolving;
        let Some(index) = Self::winner(&set) else {
            ball.arbitration.settle();
            return;
        };
        let winner = set[index];
        if set.len() > 1 {
            debug!(ball = %id, tick = winner.request.tick, losers = set.len() - 1, "kick tie-break");
            events.push(BallEvent::KicksDiscarded {
                ball: id,
                count: set.len() - 1,
                reason: DiscardReason::LostTie,
            });
        }

        ball.arbitration.cooldown = TickTimer::from_duration(ctx.tuning.kick_cooldown, ctx.dt);

        if let Err(reason) = self.intake.validate(&winner.request, &ball.info) {
            debug!(ball = %id, kicker = %winner.kicker, ?reason, "kick rejected");
            events.push(BallEvent::KickRejected {
                ball: id,
                kicker: winner.kicker,
                reason,
            });
            ball.arbitration.settle();
            return;
        }

        KickIntake::apply(&winner.request, &mut ball.body);
        ball.update_info(|info| info.attribution.record_kick(winner.kicker, ctx.directory));
        if winner.request.has_spin() {
            ball.spin.kick_time = Some(ctx.now);
        }

        debug!(ball = %id, kicker = %winner.kicker, tick = winner.request.tick, "kick accepted");
        events.push(BallEvent::KickAccepted {
            ball: id,
            kicker: winner.kicker,
            request_tick: winner.request.tick,
            force: winner.request.force,
        });
        ball.arbitration.settle();
    }
}

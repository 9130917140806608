//! Ball lifecycle bookkeeping.
//!
//! The registry tracks which balls are live on a host, in spawn order, which
//! one is the main match ball, and which practice ball belongs to which
//! client. It stores ids only; ball state lives in the simulation.

use std::collections::BTreeMap;

use glam::Vec3;

use crate::ball::{Ball, BallId, ClientId};

/// Live balls on one host.
#[derive(Debug, Clone, Default)]
pub struct BallRegistry {
    live: Vec<BallId>,
    main: Option<BallId>,
    spawned_for: BTreeMap<ClientId, BallId>,
}

impl BallRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a ball. Registering twice is a no-op.
    pub fn register(&mut self, id: BallId) {
        if !self.live.contains(&id) {
            self.live.push(id);
        }
    }

    /// Removes a ball and any bookkeeping that points at it.
    pub fn unregister(&mut self, id: BallId) {
        self.live.retain(|live| *live != id);
        if self.main == Some(id) {
            self.main = None;
        }
        self.spawned_for.retain(|_, ball| *ball != id);
    }

    /// Whether a ball is live.
    #[must_use]
    pub fn contains(&self, id: BallId) -> bool {
        self.live.contains(&id)
    }

    /// Live balls in registration order.
    pub fn iter(&self) -> impl Iterator<Item = BallId> + '_ {
        self.live.iter().copied()
    }

    /// Number of live balls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Whether no ball is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Marks a registered ball as the main match ball.
    pub fn set_main(&mut self, id: BallId) {
        self.register(id);
        self.main = Some(id);
    }

    /// The main match ball.
    #[must_use]
    pub fn main(&self) -> Option<BallId> {
        self.main
    }

    /// Live balls other than the main one, in registration order.
    #[must_use]
    pub fn non_main(&self) -> Vec<BallId> {
        self.live
            .iter()
            .copied()
            .filter(|id| Some(*id) != self.main)
            .collect()
    }

    /// Closest live ball to `point`.
    ///
    /// Ties keep the first ball in registration order. Ids missing from
    /// `balls` are skipped.
    #[must_use]
    pub fn find_nearest(&self, balls: &BTreeMap<BallId, Ball>, point: Vec3) -> Option<BallId> {
        let mut best: Option<(BallId, f32)> = None;
        for id in &self.live {
            let Some(ball) = balls.get(id) else {
                continue;
            };
            let distance = ball.body().transform().position.distance_squared(point);
            if best.map_or(true, |(_, closest)| distance < closest) {
                best = Some((*id, distance));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Records the practice ball spawned for `client`.
    pub fn track_spawn(&mut self, client: ClientId, id: BallId) {
        self.spawned_for.insert(client, id);
    }

    /// Practice ball spawned for `client`, if any.
    #[must_use]
    pub fn local_ball_of(&self, client: ClientId) -> Option<BallId> {
        self.spawned_for.get(&client).copied()
    }

    /// Forgets which client owns which practice ball.
    pub fn clear_client_balls(&mut self) {
        self.spawned_for.clear();
    }
}

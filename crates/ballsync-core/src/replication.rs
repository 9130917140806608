//! State replication from the authority to observers.
//!
//! Each ball carries a [`ReplicationChannel`]: two single-slot, last-write-wins
//! registers. The state register holds the latest [`StateSnapshot`], versioned
//! by tick; the info register holds attribution and play flags, versioned by
//! a counter the authority bumps on every change.
//!
//! A register never goes backwards. An offer whose version is not newer than
//! the held one is dropped, so an observer that receives snapshots out of
//! order, or misses some, simply ends up on the newest value it has seen.
//!
//! # Example
//!
//! ```
//! use ballsync_core::replication::{Offer, VersionedRegister};
//!
//! let mut register = VersionedRegister::new(0_u32);
//! assert_eq!(register.offer(5, 50), Offer::Accepted);
//! assert_eq!(register.offer(4, 40), Offer::Stale);
//! assert_eq!(register.offer(5, 51), Offer::Stale);
//! assert_eq!(*register.value(), 50);
//! ```

use std::fmt;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::ball::{BallBody, BallInfo, SpinState};
use crate::solver::Solver;

/// Result of offering a value to a [`VersionedRegister`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    /// The value was newer and replaced the held one.
    Accepted,
    /// The value was not newer and was dropped.
    Stale,
}

/// Handle returned by [`VersionedRegister::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener<T> = Box<dyn FnMut(&T, &T) + Send>;

/// A value plus a monotonically increasing version.
///
/// Subscribers are called with `(previous, current)` after every accepted
/// update, in subscription order.
pub struct VersionedRegister<T> {
    value: T,
    version: Option<u64>,
    listeners: Vec<(SubscriptionId, Listener<T>)>,
    next_subscription: u64,
}

impl<T: fmt::Debug> fmt::Debug for VersionedRegister<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionedRegister")
            .field("value", &self.value)
            .field("version", &self.version)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl<T> VersionedRegister<T> {
    /// Creates a register holding `initial` with no version yet.
    ///
    /// Any first offer is accepted, including version 0.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            value: initial,
            version: None,
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    /// Current value.
    #[must_use]
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Version of the current value, `None` before the first accepted offer.
    #[must_use]
    pub fn version(&self) -> Option<u64> {
        self.version
    }

    /// Registers a change listener.
    pub fn subscribe(&mut self, listener: impl FnMut(&T, &T) + Send + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Removes a listener. Unknown ids are ignored.
    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.listeners.retain(|(existing, _)| *existing != id);
    }

    /// Replaces the value if `version` is newer than the held version.
    pub fn offer(&mut self, version: u64, value: T) -> Offer {
        if self.version.is_some_and(|held| version <= held) {
            return Offer::Stale;
        }
        let previous = std::mem::replace(&mut self.value, value);
        self.version = Some(version);
        for (_, listener) in &mut self.listeners {
            listener(&previous, &self.value);
        }
        Offer::Accepted
    }
}

/// Complete replicated description of a ball's physical state at one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Authoritative tick that produced the snapshot.
    pub tick: u64,
    /// Position.
    pub position: Vec3,
    /// Orientation.
    pub orientation: Quat,
    /// Linear velocity.
    pub linear_velocity: Vec3,
    /// Angular velocity.
    pub angular_velocity: Vec3,
    /// Time of the last accepted spinning kick.
    pub last_kick_time: Option<f64>,
}

impl Default for StateSnapshot {
    fn default() -> Self {
        Self {
            tick: 0,
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            last_kick_time: None,
        }
    }
}

impl StateSnapshot {
    /// Captures a body's current state.
    #[must_use]
    pub fn capture(tick: u64, body: &BallBody, spin: &SpinState) -> Self {
        Self {
            tick,
            position: body.position,
            orientation: body.orientation,
            linear_velocity: body.linear_velocity,
            angular_velocity: body.angular_velocity,
            last_kick_time: spin.kick_time,
        }
    }

    /// Overwrites a body with this snapshot and forces a transform sync.
    ///
    /// Returns false without touching anything if the body is kinematic: a
    /// local animation override outranks replicated state.
    pub fn apply_to(&self, body: &mut BallBody, spin: &mut SpinState, solver: &dyn Solver) -> bool {
        if body.kinematic {
            return false;
        }
        solver.write_pose(body, self.position, self.orientation);
        body.linear_velocity = self.linear_velocity;
        body.angular_velocity = self.angular_velocity;
        spin.kick_time = self.last_kick_time;
        solver.sync_transforms(body);
        true
    }
}

/// Per-ball replication registers.
#[derive(Debug)]
pub struct ReplicationChannel {
    state: VersionedRegister<StateSnapshot>,
    info: VersionedRegister<BallInfo>,
    info_version: u64,
}

impl Default for ReplicationChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplicationChannel {
    /// Creates empty registers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: VersionedRegister::new(StateSnapshot::default()),
            info: VersionedRegister::new(BallInfo::default()),
            info_version: 0,
        }
    }

    /// Latest snapshot register.
    #[must_use]
    pub fn state(&self) -> &VersionedRegister<StateSnapshot> {
        &self.state
    }

    /// Latest info register.
    #[must_use]
    pub fn info(&self) -> &VersionedRegister<BallInfo> {
        &self.info
    }

    /// Mutable snapshot register, for subscribing.
    pub fn state_mut(&mut self) -> &mut VersionedRegister<StateSnapshot> {
        &mut self.state
    }

    /// Mutable info register, for subscribing.
    pub fn info_mut(&mut self) -> &mut VersionedRegister<BallInfo> {
        &mut self.info
    }

    /// Tick of the last snapshot held, if any.
    #[must_use]
    pub fn last_tick(&self) -> Option<u64> {
        self.state.version()
    }

    /// Authority: records a freshly captured snapshot.
    pub fn publish_state(&mut self, snapshot: StateSnapshot) -> Offer {
        self.state.offer(snapshot.tick, snapshot)
    }

    /// Authority: records new info and returns the version to broadcast.
    pub fn publish_info(&mut self, info: BallInfo) -> u64 {
        self.info_version += 1;
        let version = self.info_version;
        self.info.offer(version, info);
        version
    }

    /// Observer: offers a received snapshot.
    pub fn receive_state(&mut self, snapshot: StateSnapshot) -> Offer {
        self.state.offer(snapshot.tick, snapshot)
    }

    /// Observer: offers received info.
    pub fn receive_info(&mut self, version: u64, info: BallInfo) -> Offer {
        self.info.offer(version, info)
    }
}

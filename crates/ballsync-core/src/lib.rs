//! # Ballsync Core
//!
//! Authoritative ball physics replication and kick arbitration for real-time
//! multiplayer football.
//!
//! One host (the authority) simulates every ball. Any number of observers
//! mirror it from snapshots, predict their own kicks locally, and smooth the
//! rendered ball. Concurrent kick requests against one ball are resolved into
//! at most one impulse per tick.
//!
//! ## Architecture
//!
//! - **Ball**: body, visual proxy, attribution and play state ([`ball`])
//! - **Resolvers**: kick arbitration and spin dynamics, run per ball per tick
//!   ([`resolver`])
//! - **Replication**: versioned last-write-wins registers ([`replication`])
//! - **Simulation**: one host's root object in either role ([`simulation`])
//! - **Session**: authority, observers and a loopback network in lockstep
//!   ([`session`], [`net`])
//!
//! ## Usage
//!
//! ```
//! use ballsync_core::ball::{ClientId, Kicker};
//! use ballsync_core::kick::KickRequest;
//! use ballsync_core::session::{LocalSession, SessionConfig};
//! use ballsync_core::solver::{ReferenceSolver, Solver};
//! use glam::Vec3;
//!
//! let mut session = LocalSession::new(
//!     SessionConfig::default(),
//!     Box::new(|| -> Box<dyn Solver> { Box::new(ReferenceSolver::new()) }),
//! )?;
//! session.add_observer(ClientId::new(1))?;
//! let ball = session.authority_mut().spawn_main_ball(Vec3::new(0.0, 0.11, 0.0))?;
//! session.run(10);
//!
//! let observer = session.observer_mut(ClientId::new(1)).unwrap();
//! let kick = KickRequest::new(observer.tick(), Vec3::new(8.0, 0.0, 0.0));
//! observer.request_kick(ball, kick, Kicker::Player(ClientId::new(1)))?;
//! session.run(10);
//!
//! assert!(session.authority().ball(ball).unwrap().body().linear_velocity.x > 0.0);
//! # Ok::<(), ballsync_core::error::BallSyncError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ball;
pub mod collab;
pub mod config;
pub mod error;
pub mod event;
pub mod interpolation;
pub mod kick;
pub mod message;
pub mod net;
pub mod registry;
pub mod replication;
pub mod resolver;
pub mod session;
pub mod simulation;
pub mod solver;
pub mod timer;

pub use ball::{Ball, BallId, ClientId, Kicker};
pub use config::{BallTuning, PhysicsDeterminismConfig, SimulationConfig};
pub use error::{BallSyncError, Result};
pub use event::BallEvent;
pub use kick::{KickFlags, KickRequest};
pub use message::{BallMessage, Envelope, Recipient};
pub use session::{LocalSession, SessionConfig};
pub use simulation::{Role, Simulation};

#[cfg(test)]
mod tests;

//! Lockstep driver for an authority and its observers in one process.
//!
//! A [`LocalSession`] owns one authoritative [`Simulation`], any number of
//! observers and a [`LoopbackNetwork`] between them. Each call to
//! [`LocalSession::step`] runs one fixed tick on every host:
//!
//! 1. Flush outboxes filled by API calls since the last step.
//! 2. Deliver every message that is due this tick.
//! 3. Step the authority, then each observer in id order.
//! 4. Flush the outboxes filled by the tick itself.
//!
//! Used by the headless driver and by cross-host tests.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ball::ClientId;
use crate::collab::{MatchGate, OpenMatch, PlayerDirectory, StaticDirectory};
use crate::config::SimulationConfig;
use crate::error::Result;
use crate::event::BallEvent;
use crate::net::{LoopbackNetwork, NetworkConfig};
use crate::simulation::Simulation;
use crate::solver::Solver;

/// Builds a solver for each host.
pub type SolverFactory = Box<dyn Fn() -> Box<dyn Solver> + Send + Sync>;

/// Configuration of a [`LocalSession`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Configuration shared by every host.
    pub simulation: SimulationConfig,
    /// Transport behaviour.
    pub network: NetworkConfig,
}

/// An authority, its observers and the network between them.
pub struct LocalSession {
    config: SimulationConfig,
    make_solver: SolverFactory,
    directory: Arc<dyn PlayerDirectory>,
    gate: Arc<dyn MatchGate>,
    authority: Simulation,
    observers: BTreeMap<ClientId, Simulation>,
    network: LoopbackNetwork,
    tick: u64,
}

impl fmt::Debug for LocalSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSession")
            .field("tick", &self.tick)
            .field("authority", &self.authority)
            .field("observers", &self.observers.keys().collect::<Vec<_>>())
            .field("network", &self.network.stats())
            .finish_non_exhaustive()
    }
}

impl LocalSession {
    /// Creates a session with only the authority.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::BallSyncError::InvalidConfig`] if the
    /// simulation configuration is unusable.
    pub fn new(config: SessionConfig, make_solver: SolverFactory) -> Result<Self> {
        let directory: Arc<dyn PlayerDirectory> = Arc::new(StaticDirectory::new());
        let gate: Arc<dyn MatchGate> = Arc::new(OpenMatch::default());
        let authority = Simulation::authority(config.simulation.clone(), make_solver())?
            .with_directory(Arc::clone(&directory))
            .with_gate(Arc::clone(&gate));

        Ok(Self {
            config: config.simulation,
            make_solver,
            directory,
            gate,
            authority,
            observers: BTreeMap::new(),
            network: LoopbackNetwork::new(config.network),
            tick: 0,
        })
    }

    /// Shares a player directory with every current and future host.
    pub fn set_directory(&mut self, directory: Arc<dyn PlayerDirectory>) {
        self.authority.set_directory(Arc::clone(&directory));
        for observer in self.observers.values_mut() {
            observer.set_directory(Arc::clone(&directory));
        }
        self.directory = directory;
    }

    /// Shares a match gate with every current and future host.
    pub fn set_gate(&mut self, gate: Arc<dyn MatchGate>) {
        self.authority.set_gate(Arc::clone(&gate));
        for observer in self.observers.values_mut() {
            observer.set_gate(Arc::clone(&gate));
        }
        self.gate = gate;
    }

    /// Connects a new observer.
    ///
    /// The observer only learns about balls spawned after it joins.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::BallSyncError::InvalidConfig`] if the
    /// simulation configuration is unusable.
    pub fn add_observer(&mut self, id: ClientId) -> Result<()> {
        let observer = Simulation::observer(id, self.config.clone(), (self.make_solver)())?
            .with_directory(Arc::clone(&self.directory))
            .with_gate(Arc::clone(&self.gate));
        self.observers.insert(id, observer);
        self.network.attach(id);
        Ok(())
    }

    /// Disconnects an observer.
    pub fn remove_observer(&mut self, id: ClientId) -> Option<Simulation> {
        self.network.detach(id);
        self.observers.remove(&id)
    }

    /// Ticks run so far.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// The authoritative host.
    #[must_use]
    pub fn authority(&self) -> &Simulation {
        &self.authority
    }

    /// The authoritative host, mutably.
    pub fn authority_mut(&mut self) -> &mut Simulation {
        &mut self.authority
    }

    /// An observer host.
    #[must_use]
    pub fn observer(&self, id: ClientId) -> Option<&Simulation> {
        self.observers.get(&id)
    }

    /// An observer host, mutably.
    pub fn observer_mut(&mut self, id: ClientId) -> Option<&mut Simulation> {
        self.observers.get_mut(&id)
    }

    /// Observer ids in order.
    pub fn observer_ids(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.observers.keys().copied()
    }

    /// The transport.
    #[must_use]
    pub fn network(&self) -> &LoopbackNetwork {
        &self.network
    }

    /// Runs one fixed tick on every host.
    pub fn step(&mut self) {
        self.flush();
        self.deliver();
        self.authority.step();
        for observer in self.observers.values_mut() {
            observer.step();
        }
        self.flush();
        self.tick += 1;
    }

    /// Runs `ticks` fixed ticks.
    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
        }
    }

    /// Advances every host's visual proxies by one render frame.
    pub fn render(&mut self, frame_dt: f32) {
        self.authority.render(frame_dt);
        for observer in self.observers.values_mut() {
            observer.render(frame_dt);
        }
    }

    /// Takes every host's events, tagged with the host id.
    pub fn take_events(&mut self) -> Vec<(ClientId, BallEvent)> {
        let mut events: Vec<(ClientId, BallEvent)> = self
            .authority
            .take_events()
            .into_iter()
            .map(|event| (ClientId::AUTHORITY, event))
            .collect();
        for (id, observer) in &mut self.observers {
            events.extend(observer.take_events().into_iter().map(|event| (*id, event)));
        }
        events
    }

    fn flush(&mut self) {
        let now = self.tick;
        for envelope in self.authority.drain_outbox() {
            self.network.send(envelope, now);
        }
        for observer in self.observers.values_mut() {
            for envelope in observer.drain_outbox() {
                self.network.send(envelope, now);
            }
        }
    }

    fn deliver(&mut self) {
        for (to, envelope) in self.network.deliver_due(self.tick) {
            let kind = envelope.message.kind();
            let host = if to == ClientId::AUTHORITY {
                Some(&mut self.authority)
            } else {
                self.observers.get_mut(&to)
            };
            let Some(host) = host else {
                debug!(%to, kind, "no host for delivery");
                continue;
            };
            if let Err(err) = host.handle_message(envelope) {
                debug!(%to, kind, %err, "message dropped");
            }
        }
    }
}

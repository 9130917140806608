//! One host's view of the ball world.
//!
//! A `Simulation` runs on every host, in one of two roles:
//!
//! - **Authority**: owns ball state. Queues kick requests, arbitrates them,
//!   applies spin forces, integrates, and publishes a snapshot per ball per
//!   tick.
//! - **Observer**: mirrors the authority. Applies received snapshots to its
//!   bodies, predicts its own kicks locally, and smooths the rendered ball.
//!
//! Hosts talk only through [`Envelope`]s: outgoing messages accumulate in an
//! outbox (see [`Simulation::drain_outbox`]) and incoming ones are fed to
//! [`Simulation::handle_message`]. The transport is someone else's problem.
//!
//! # Authoritative Tick
//!
//! 1. **RESOLVE**: every ball runs the resolvers (arbitration, spin) and its
//!    out-of-bounds dead-time, then the solver integrates it. Balls are
//!    independent and run in parallel.
//! 2. **MERGE**: per-ball events are appended in ball-id order.
//! 3. **PUBLISH**: each non-kinematic ball's snapshot, and any changed info,
//!    is recorded and broadcast.
//!
//! # Determinism
//!
//! Balls live in a `BTreeMap` and are merged by id, so two authorities fed the
//! same inputs produce identical snapshot streams regardless of thread count.
//!
//! # Example
//!
//! ```
//! use ballsync_core::ball::{ClientId, Kicker};
//! use ballsync_core::config::SimulationConfig;
//! use ballsync_core::kick::KickRequest;
//! use ballsync_core::simulation::Simulation;
//! use ballsync_core::solver::ReferenceSolver;
//! use glam::Vec3;
//!
//! let mut sim = Simulation::authority(SimulationConfig::default(), Box::new(ReferenceSolver::new()))?;
//! let ball = sim.spawn_main_ball(Vec3::new(0.0, 0.11, 0.0))?;
//!
//! let kick = KickRequest::new(sim.tick(), Vec3::new(5.0, 0.0, 0.0));
//! sim.request_kick(ball, kick, Kicker::Player(ClientId::new(1)))?;
//! sim.step();
//!
//! assert_eq!(sim.tick(), 1);
//! assert!(sim.ball(ball).unwrap().body().linear_velocity.x > 0.0);
//! # Ok::<(), ballsync_core::error::BallSyncError>(())
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use glam::{Quat, Vec3};
use rayon::prelude::*;
use tracing::{debug, info, trace};

use crate::ball::{Ball, BallId, ClientId, Kicker, PlayFlags};
use crate::collab::{MatchGate, OpenMatch, PlayerDirectory, StaticDirectory};
use crate::config::SimulationConfig;
use crate::error::{BallSyncError, Result};
use crate::event::BallEvent;
use crate::interpolation::Interpolator;
use crate::kick::{ContestedKick, KickIntake, KickRequest};
use crate::message::{BallMessage, Envelope, Recipient};
use crate::registry::BallRegistry;
use crate::replication::{Offer, StateSnapshot, VersionedRegister};
use crate::resolver::{predict_position, KickArbitrator, Resolver, SpinDynamics, TickContext};
use crate::solver::Solver;
use crate::timer::TickTimer;

/// Which side of the replication a host is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The host that owns ball state.
    Authority,
    /// Any other host.
    Observer,
}

/// Ball simulation for one host.
pub struct Simulation {
    role: Role,
    local_id: ClientId,
    config: SimulationConfig,
    solver: Box<dyn Solver>,
    directory: Arc<dyn PlayerDirectory>,
    gate: Arc<dyn MatchGate>,
    resolvers: Vec<Box<dyn Resolver>>,
    intake: KickIntake,
    interpolator: Interpolator,
    balls: BTreeMap<BallId, Ball>,
    registry: BallRegistry,
    local_ball: Option<BallId>,
    tick: u64,
    next_ball_id: u64,
    kickoff: VersionedRegister<bool>,
    kickoff_version: u64,
    kickoff_lowered_locally: bool,
    outbox: Vec<Envelope>,
    events: Vec<BallEvent>,
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("role", &self.role)
            .field("local_id", &self.local_id)
            .field("tick", &self.tick)
            .field("balls", &self.balls.len())
            .field("resolvers", &format!("[{} resolvers]", self.resolvers.len()))
            .field("outbox", &self.outbox.len())
            .finish_non_exhaustive()
    }
}

impl Simulation {
    /// Creates a simulation for `role`.
    ///
    /// Validates the configuration and applies it to the solver. The player
    /// directory starts empty and the match gate starts open; replace them
    /// with [`with_directory`](Self::with_directory) and
    /// [`with_gate`](Self::with_gate).
    ///
    /// # Errors
    ///
    /// Returns [`BallSyncError::InvalidConfig`] if the configuration is unusable.
    pub fn new(
        role: Role,
        local_id: ClientId,
        config: SimulationConfig,
        mut solver: Box<dyn Solver>,
    ) -> Result<Self> {
        config.validate()?;
        solver.configure(&config.physics);

        let tuning = &config.tuning;
        let resolvers: Vec<Box<dyn Resolver>> = vec![
            Box::new(KickArbitrator::new(tuning.max_legal_force)),
            Box::new(SpinDynamics::new()),
        ];
        let intake = KickIntake::new(tuning.max_legal_force);
        let interpolator = Interpolator::new(tuning.interpolation_time);

        Ok(Self {
            role,
            local_id,
            solver,
            directory: Arc::new(StaticDirectory::new()),
            gate: Arc::new(OpenMatch::default()),
            resolvers,
            intake,
            interpolator,
            balls: BTreeMap::new(),
            registry: BallRegistry::new(),
            local_ball: None,
            tick: 0,
            next_ball_id: 1,
            kickoff: VersionedRegister::new(false),
            kickoff_version: 0,
            kickoff_lowered_locally: false,
            outbox: Vec::new(),
            events: Vec::new(),
            config,
        })
    }

    /// Creates the authoritative simulation, identified as [`ClientId::AUTHORITY`].
    ///
    /// # Errors
    ///
    /// Returns [`BallSyncError::InvalidConfig`] if the configuration is unusable.
    pub fn authority(config: SimulationConfig, solver: Box<dyn Solver>) -> Result<Self> {
        Self::new(Role::Authority, ClientId::AUTHORITY, config, solver)
    }

    /// Creates an observer simulation for host `local_id`.
    ///
    /// # Errors
    ///
    /// Returns [`BallSyncError::InvalidConfig`] if the configuration is unusable.
    pub fn observer(
        local_id: ClientId,
        config: SimulationConfig,
        solver: Box<dyn Solver>,
    ) -> Result<Self> {
        Self::new(Role::Observer, local_id, config, solver)
    }

    /// Replaces the player directory.
    #[must_use]
    pub fn with_directory(mut self, directory: Arc<dyn PlayerDirectory>) -> Self {
        self.directory = directory;
        self
    }

    /// Replaces the match gate.
    #[must_use]
    pub fn with_gate(mut self, gate: Arc<dyn MatchGate>) -> Self {
        self.gate = gate;
        self
    }

    /// Swaps the player directory in place.
    pub fn set_directory(&mut self, directory: Arc<dyn PlayerDirectory>) {
        self.directory = directory;
    }

    /// Swaps the match gate in place.
    pub fn set_gate(&mut self, gate: Arc<dyn MatchGate>) {
        self.gate = gate;
    }

    /// Appends a resolver that runs after the built-in ones.
    pub fn add_resolver(&mut self, resolver: Box<dyn Resolver>) {
        self.resolvers.push(resolver);
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// This host's role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Whether this host is the authority.
    #[must_use]
    pub fn is_authority(&self) -> bool {
        self.role == Role::Authority
    }

    /// This host's identity.
    #[must_use]
    pub fn local_id(&self) -> ClientId {
        self.local_id
    }

    /// Number of fixed ticks stepped so far.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Simulation time in seconds.
    #[must_use]
    pub fn time(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let ticks = self.tick as f64;
        ticks * f64::from(self.config.physics.fixed_timestep)
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Looks up a ball.
    #[must_use]
    pub fn ball(&self, id: BallId) -> Option<&Ball> {
        self.balls.get(&id)
    }

    /// Looks up a ball mutably, e.g. to subscribe to its registers.
    pub fn ball_mut(&mut self, id: BallId) -> Option<&mut Ball> {
        self.balls.get_mut(&id)
    }

    /// Live balls in id order.
    pub fn balls(&self) -> impl Iterator<Item = &Ball> {
        self.balls.values()
    }

    /// Lifecycle registry.
    #[must_use]
    pub fn registry(&self) -> &BallRegistry {
        &self.registry
    }

    /// The main match ball.
    #[must_use]
    pub fn main_ball(&self) -> Option<BallId> {
        self.registry.main()
    }

    /// The practice ball assigned to this host.
    #[must_use]
    pub fn local_ball(&self) -> Option<BallId> {
        self.local_ball
    }

    /// Whether the first kick since the last kickoff restart has happened.
    #[must_use]
    pub fn kickoff_ended(&self) -> bool {
        *self.kickoff.value() || self.kickoff_lowered_locally
    }

    /// Takes every message queued for sending.
    pub fn drain_outbox(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.outbox)
    }

    /// Takes every event recorded since the last call.
    pub fn take_events(&mut self) -> Vec<BallEvent> {
        std::mem::take(&mut self.events)
    }

    // =========================================================================
    // Fixed tick and render
    // =========================================================================

    /// Advances one fixed tick.
    pub fn step(&mut self) {
        let dt = self.config.physics.fixed_timestep;
        match self.role {
            Role::Authority => self.step_authority(dt),
            Role::Observer => self.step_observer(dt),
        }
        self.tick += 1;
    }

    fn step_authority(&mut self, dt: f32) {
        let ctx = TickContext::new(
            self.tick,
            dt,
            &self.config.tuning,
            self.directory.as_ref(),
        );
        let resolvers = &self.resolvers;
        let solver = self.solver.as_ref();

        let mut per_ball: Vec<(BallId, Vec<BallEvent>)> = self
            .balls
            .par_iter_mut()
            .map(|(id, ball)| {
                let mut events = Vec::new();
                for resolver in resolvers {
                    resolver.resolve(&ctx, ball, &mut events);
                }
                advance_play_dead_time(ball, &mut events);
                solver.integrate(&mut ball.body, dt);
                (*id, events)
            })
            .collect();
        per_ball.sort_by_key(|(id, _)| *id);
        for (_, events) in per_ball {
            self.events.extend(events);
        }

        let tick = self.tick;
        for (id, ball) in &mut self.balls {
            if !ball.body.kinematic {
                let snapshot = StateSnapshot::capture(tick, &ball.body, &ball.spin);
                ball.replication.publish_state(snapshot);
                trace!(ball = %id, tick, "snapshot published");
                self.outbox.push(Envelope::new(
                    self.local_id,
                    Recipient::Observers,
                    BallMessage::StateSnapshotUpdated { ball: *id, snapshot },
                ));
            }
            if ball.info_dirty {
                ball.info_dirty = false;
                let version = ball.replication.publish_info(ball.info.clone());
                self.outbox.push(Envelope::new(
                    self.local_id,
                    Recipient::Observers,
                    BallMessage::BallInfoUpdated {
                        ball: *id,
                        version,
                        info: ball.info.clone(),
                    },
                ));
            }
        }
    }

    fn step_observer(&mut self, dt: f32) {
        for ball in self.balls.values_mut() {
            self.solver.integrate(&mut ball.body, dt);
        }
    }

    /// Advances every ball's visual proxy by one render frame.
    pub fn render(&mut self, frame_dt: f32) {
        for ball in self.balls.values_mut() {
            self.interpolator.update(ball, frame_dt);
        }
    }

    // =========================================================================
    // Kicks
    // =========================================================================

    /// Issues a kick from this host.
    ///
    /// Refused silently (an event, no state change) while the match gate
    /// forbids kicks or for a slide kick on an out-of-bounds ball. On the
    /// authority the request joins the next arbitration; on an observer it is
    /// applied locally as a prediction and sent to the authority.
    ///
    /// # Errors
    ///
    /// Returns [`BallSyncError::UnknownBall`] if `ball` is not live here.
    pub fn request_kick(&mut self, ball: BallId, request: KickRequest, kicker: Kicker) -> Result<()> {
        let intake = self.intake;
        let target = self
            .balls
            .get_mut(&ball)
            .ok_or(BallSyncError::UnknownBall(ball))?;

        if let Err(reason) = intake.admit(&request, &target.info, self.gate.as_ref()) {
            debug!(%ball, %kicker, ?reason, "kick refused at intake");
            self.events.push(BallEvent::KickRejected {
                ball,
                kicker,
                reason,
            });
            return Ok(());
        }

        let mut request = request;
        request.client_ball_position = target.body.position;
        request.client_ball_velocity = target.body.linear_velocity;

        match self.role {
            Role::Authority => target.arbitration.enqueue(ContestedKick { request, kicker }),
            Role::Observer => {
                KickIntake::apply(&request, &mut target.body);
                self.send(
                    Recipient::Authority,
                    BallMessage::RequestKick { ball, request },
                );
            }
        }
        self.lower_kickoff_barrier();
        Ok(())
    }

    /// Re-arms the kickoff barrier for a restart.
    ///
    /// # Errors
    ///
    /// Returns [`BallSyncError::NotAuthority`] on an observer.
    pub fn restart_kickoff(&mut self) -> Result<()> {
        self.require_authority("restart_kickoff")?;
        info!(tick = self.tick, "kickoff barrier raised");
        self.publish_kickoff(false);
        Ok(())
    }

    fn lower_kickoff_barrier(&mut self) {
        if self.kickoff_ended() {
            return;
        }
        match self.role {
            Role::Authority => {
                self.publish_kickoff(true);
                self.events.push(BallEvent::KickoffBarrierLowered);
            }
            Role::Observer => {
                self.kickoff_lowered_locally = true;
                self.send(Recipient::Authority, BallMessage::DisableKickoffBarrier);
            }
        }
    }

    fn publish_kickoff(&mut self, kickoff_ended: bool) {
        self.kickoff_version += 1;
        let version = self.kickoff_version;
        self.kickoff.offer(version, kickoff_ended);
        self.send(
            Recipient::Observers,
            BallMessage::KickoffBarrierChanged {
                version,
                kickoff_ended,
            },
        );
    }

    // =========================================================================
    // Mirrored operations
    // =========================================================================

    /// Teleports a ball: zero velocity, physical, synced and visual pose.
    ///
    /// # Errors
    ///
    /// Returns [`BallSyncError::UnknownBall`] if `ball` is not live here.
    pub fn teleport(&mut self, ball: BallId, position: Vec3, orientation: Quat) -> Result<()> {
        self.apply_teleport(ball, position, orientation)?;
        self.mirror(BallMessage::Teleport {
            ball,
            position,
            orientation,
        });
        Ok(())
    }

    /// Switches a ball between simulated and kinematic.
    ///
    /// # Errors
    ///
    /// Returns [`BallSyncError::UnknownBall`] if `ball` is not live here.
    pub fn enable_kinematics(&mut self, ball: BallId, enabled: bool) -> Result<()> {
        self.ball_entry(ball)?.body.kinematic = enabled;
        self.mirror(BallMessage::EnableKinematics { ball, enabled });
        Ok(())
    }

    /// Turns a ball's collider on or off.
    ///
    /// # Errors
    ///
    /// Returns [`BallSyncError::UnknownBall`] if `ball` is not live here.
    pub fn enable_collider(&mut self, ball: BallId, enabled: bool) -> Result<()> {
        self.ball_entry(ball)?.body.collider_enabled = enabled;
        self.mirror(BallMessage::EnableCollider { ball, enabled });
        Ok(())
    }

    /// Zeroes a ball's linear and angular velocity.
    ///
    /// # Errors
    ///
    /// Returns [`BallSyncError::UnknownBall`] if `ball` is not live here.
    pub fn stop_ball(&mut self, ball: BallId) -> Result<()> {
        self.ball_entry(ball)?.body.stop();
        self.mirror(BallMessage::StopBall { ball });
        Ok(())
    }

    /// Teleports a ball to a restart position with identity rotation.
    ///
    /// # Errors
    ///
    /// Returns [`BallSyncError::NotAuthority`] on an observer, or
    /// [`BallSyncError::UnknownBall`] if `ball` is not live.
    pub fn reset_ball(&mut self, ball: BallId, position: Vec3) -> Result<()> {
        self.require_authority("reset_ball")?;
        self.apply_reset(ball, position)?;
        info!(%ball, ?position, "ball reset");
        self.send(Recipient::Observers, BallMessage::ResetBall { ball, position });
        Ok(())
    }

    /// Resets every live ball to `position`.
    ///
    /// # Errors
    ///
    /// Returns [`BallSyncError::NotAuthority`] on an observer.
    pub fn reset_all(&mut self, position: Vec3) -> Result<()> {
        self.require_authority("reset_all")?;
        let live: Vec<BallId> = self.registry.iter().collect();
        for ball in live {
            self.reset_ball(ball, position)?;
        }
        Ok(())
    }

    fn mirror(&mut self, message: BallMessage) {
        let to = match self.role {
            Role::Authority => Recipient::Observers,
            Role::Observer => Recipient::Authority,
        };
        self.send(to, message);
    }

    fn apply_teleport(&mut self, ball: BallId, position: Vec3, orientation: Quat) -> Result<()> {
        self.ball_entry(ball)?.teleport(position, orientation);
        Ok(())
    }

    fn apply_reset(&mut self, ball: BallId, position: Vec3) -> Result<()> {
        let target = self.ball_entry(ball)?;
        target.teleport(position, Quat::IDENTITY);
        target.spin.kick_time = None;
        target.arbitration.reset();
        Ok(())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Spawns the main match ball.
    ///
    /// # Errors
    ///
    /// Returns [`BallSyncError::NotAuthority`] on an observer.
    pub fn spawn_main_ball(&mut self, position: Vec3) -> Result<BallId> {
        self.require_authority("spawn_main_ball")?;
        let id = self.spawn(position, true, None);
        self.registry.set_main(id);
        Ok(id)
    }

    /// Spawns an unowned practice ball.
    ///
    /// # Errors
    ///
    /// Returns [`BallSyncError::NotAuthority`] on an observer.
    pub fn spawn_practice_ball(&mut self, position: Vec3) -> Result<BallId> {
        self.require_authority("spawn_practice_ball")?;
        Ok(self.spawn(position, false, None))
    }

    /// Asks for a practice ball owned by this host.
    ///
    /// Each host gets at most one; repeated requests are ignored. An observer
    /// learns its ball from the authority's `AssignSpawnedBall` reply.
    pub fn request_ball_spawn(&mut self, position: Vec3) {
        match self.role {
            Role::Authority => {
                let local = self.local_id;
                self.spawn_for(local, position);
            }
            Role::Observer => {
                if self.local_ball.is_some() {
                    debug!(client = %self.local_id, "already owns a practice ball");
                    return;
                }
                self.send(Recipient::Authority, BallMessage::RequestBallSpawn { position });
            }
        }
    }

    /// Removes a ball.
    ///
    /// # Errors
    ///
    /// Returns [`BallSyncError::NotAuthority`] on an observer, or
    /// [`BallSyncError::UnknownBall`] if `ball` is not live.
    pub fn despawn(&mut self, ball: BallId) -> Result<()> {
        self.require_authority("despawn")?;
        self.remove_ball(ball)?;
        self.send(Recipient::Observers, BallMessage::BallDespawned { ball });
        Ok(())
    }

    /// Despawns every practice ball and resets the main ball to `position`.
    ///
    /// # Errors
    ///
    /// Returns [`BallSyncError::NotAuthority`] on an observer.
    pub fn delete_non_main(&mut self, position: Vec3) -> Result<()> {
        self.require_authority("delete_non_main")?;
        for ball in self.registry.non_main() {
            self.despawn(ball)?;
        }
        self.registry.clear_client_balls();
        self.local_ball = None;
        if let Some(main) = self.registry.main() {
            self.reset_ball(main, position)?;
        }
        Ok(())
    }

    /// Forgets which client owns which practice ball.
    ///
    /// # Errors
    ///
    /// Returns [`BallSyncError::NotAuthority`] on an observer.
    pub fn clear_client_balls(&mut self) -> Result<()> {
        self.require_authority("clear_client_balls")?;
        self.registry.clear_client_balls();
        Ok(())
    }

    /// Closest live ball to `point`, first spawned winning ties.
    #[must_use]
    pub fn find_nearest_ball(&self, point: Vec3) -> Option<BallId> {
        self.registry.find_nearest(&self.balls, point)
    }

    fn allocate_id(&mut self) -> BallId {
        let id = BallId::new(self.next_ball_id);
        self.next_ball_id += 1;
        id
    }

    fn insert_ball(&mut self, id: BallId, position: Vec3) {
        let mut ball = Ball::new(id, position, &self.config);
        if self.role == Role::Observer {
            ball.body.use_gravity = false;
        }
        self.balls.insert(id, ball);
        self.registry.register(id);
    }

    fn spawn(&mut self, position: Vec3, main: bool, owner: Option<ClientId>) -> BallId {
        let id = self.allocate_id();
        self.insert_ball(id, position);
        info!(ball = %id, ?position, main, "ball spawned");
        self.events.push(BallEvent::BallSpawned { ball: id, owner });
        self.send(
            Recipient::Observers,
            BallMessage::BallSpawned {
                ball: id,
                position,
                main,
            },
        );
        id
    }

    fn spawn_for(&mut self, client: ClientId, position: Vec3) -> Option<BallId> {
        if let Some(existing) = self.registry.local_ball_of(client) {
            debug!(%client, ball = %existing, "duplicate spawn request ignored");
            return None;
        }
        let id = self.spawn(position, false, Some(client));
        self.registry.track_spawn(client, id);
        if client == self.local_id {
            self.local_ball = Some(id);
            self.events.push(BallEvent::LocalBallAssigned { ball: id });
        }
        Some(id)
    }

    fn remove_ball(&mut self, ball: BallId) -> Result<()> {
        if self.balls.remove(&ball).is_none() {
            return Err(BallSyncError::UnknownBall(ball));
        }
        self.registry.unregister(ball);
        if self.local_ball == Some(ball) {
            self.local_ball = None;
        }
        info!(%ball, "ball despawned");
        self.events.push(BallEvent::BallDespawned { ball });
        Ok(())
    }

    // =========================================================================
    // Play state and attribution
    // =========================================================================

    /// Replaces a ball's play flags and cancels any pending end of play.
    ///
    /// # Errors
    ///
    /// Returns [`BallSyncError::NotAuthority`] on an observer, or
    /// [`BallSyncError::UnknownBall`] if `ball` is not live.
    pub fn set_play_flags(&mut self, ball: BallId, flags: PlayFlags) -> Result<()> {
        self.require_authority("set_play_flags")?;
        let target = self.ball_entry(ball)?;
        target.out_of_bounds_timer = TickTimer::idle();
        target.update_info(|info| info.play = flags);
        Ok(())
    }

    /// Ends out-of-bounds play.
    ///
    /// With no delay every flag clears now. Otherwise `PICKED_UP` clears now
    /// and the rest clear once `delay` seconds of ticks have run. Observers
    /// forward the request to the authority.
    ///
    /// # Errors
    ///
    /// Returns [`BallSyncError::UnknownBall`] if `ball` is not live here.
    pub fn end_out_of_bounds_play(&mut self, ball: BallId, delay: f32) -> Result<()> {
        if self.role == Role::Observer {
            self.ball_entry(ball)?;
            self.send(
                Recipient::Authority,
                BallMessage::EndOutOfBoundsPlay { ball, delay },
            );
            return Ok(());
        }

        let dt = self.config.physics.fixed_timestep;
        let target = self
            .balls
            .get_mut(&ball)
            .ok_or(BallSyncError::UnknownBall(ball))?;
        let timer = TickTimer::from_duration(delay, dt);
        if timer.is_active() {
            target.update_info(|info| info.play.remove(PlayFlags::PICKED_UP));
            target.out_of_bounds_timer = timer;
        } else {
            target.out_of_bounds_timer = TickTimer::idle();
            target.update_info(|info| info.play = PlayFlags::empty());
            self.events.push(BallEvent::OutOfBoundsEnded { ball });
        }
        Ok(())
    }

    /// Credits the current last and second-last kickers with a goal.
    ///
    /// # Errors
    ///
    /// Returns [`BallSyncError::NotAuthority`] on an observer, or
    /// [`BallSyncError::UnknownBall`] if `ball` is not live.
    pub fn credit_goal(&mut self, ball: BallId) -> Result<()> {
        self.require_authority("credit_goal")?;
        let directory = self.directory.as_ref();
        let target = self
            .balls
            .get_mut(&ball)
            .ok_or(BallSyncError::UnknownBall(ball))?;
        target.update_info(|info| info.attribution.credit_goal(directory));
        Ok(())
    }

    /// Forgets every kicker and credit on a ball.
    ///
    /// # Errors
    ///
    /// Returns [`BallSyncError::NotAuthority`] on an observer, or
    /// [`BallSyncError::UnknownBall`] if `ball` is not live.
    pub fn clear_attribution(&mut self, ball: BallId) -> Result<()> {
        self.require_authority("clear_attribution")?;
        self.ball_entry(ball)?
            .update_info(|info| info.attribution.clear());
        Ok(())
    }

    /// Free-flight estimate of where a ball will be in `time_ahead` seconds.
    ///
    /// # Errors
    ///
    /// Returns [`BallSyncError::UnknownBall`] if `ball` is not live here.
    pub fn predict_ball_position(&self, ball: BallId, time_ahead: f32) -> Result<Vec3> {
        let target = self
            .balls
            .get(&ball)
            .ok_or(BallSyncError::UnknownBall(ball))?;
        Ok(predict_position(
            target.body(),
            &self.config.tuning,
            self.config.physics.gravity,
            self.config.physics.fixed_timestep,
            time_ahead,
        ))
    }

    // =========================================================================
    // Incoming messages
    // =========================================================================

    /// Applies a message received from another host.
    ///
    /// Messages that make no sense for this host's role are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`BallSyncError::UnknownBall`] if the message targets a ball
    /// that is not live here. Nothing is changed in that case.
    pub fn handle_message(&mut self, envelope: Envelope) -> Result<()> {
        let Envelope { from, message, .. } = envelope;
        match (self.role, message) {
            (Role::Authority, BallMessage::RequestKick { ball, request }) => {
                self.ball_entry(ball)?.arbitration.enqueue(ContestedKick {
                    request,
                    kicker: Kicker::Player(from),
                });
            }
            (Role::Observer, BallMessage::StateSnapshotUpdated { ball, snapshot }) => {
                let solver = self.solver.as_ref();
                let target = self
                    .balls
                    .get_mut(&ball)
                    .ok_or(BallSyncError::UnknownBall(ball))?;
                match target.replication.receive_state(snapshot) {
                    Offer::Accepted => {
                        snapshot.apply_to(&mut target.body, &mut target.spin, solver);
                    }
                    Offer::Stale => trace!(%ball, tick = snapshot.tick, "stale snapshot dropped"),
                }
            }
            (Role::Observer, BallMessage::BallInfoUpdated { ball, version, info }) => {
                let target = self.ball_entry(ball)?;
                if target.replication.receive_info(version, info.clone()) == Offer::Accepted {
                    target.info = info;
                }
            }
            (role, BallMessage::Teleport { ball, position, orientation }) => {
                self.apply_teleport(ball, position, orientation)?;
                if role == Role::Authority {
                    self.rebroadcast(BallMessage::Teleport {
                        ball,
                        position,
                        orientation,
                    });
                }
            }
            (role, BallMessage::EnableKinematics { ball, enabled }) => {
                self.ball_entry(ball)?.body.kinematic = enabled;
                if role == Role::Authority {
                    self.rebroadcast(BallMessage::EnableKinematics { ball, enabled });
                }
            }
            (role, BallMessage::EnableCollider { ball, enabled }) => {
                self.ball_entry(ball)?.body.collider_enabled = enabled;
                if role == Role::Authority {
                    self.rebroadcast(BallMessage::EnableCollider { ball, enabled });
                }
            }
            (role, BallMessage::StopBall { ball }) => {
                self.ball_entry(ball)?.body.stop();
                if role == Role::Authority {
                    self.rebroadcast(BallMessage::StopBall { ball });
                }
            }
            (Role::Authority, BallMessage::RequestBallSpawn { position }) => {
                if let Some(ball) = self.spawn_for(from, position) {
                    self.send(Recipient::Client(from), BallMessage::AssignSpawnedBall { ball });
                }
            }
            (Role::Observer, BallMessage::AssignSpawnedBall { ball }) => {
                self.ball_entry(ball)?;
                self.local_ball = Some(ball);
                self.events.push(BallEvent::LocalBallAssigned { ball });
            }
            (Role::Observer, BallMessage::BallSpawned { ball, position, main }) => {
                if !self.balls.contains_key(&ball) {
                    self.insert_ball(ball, position);
                    self.events.push(BallEvent::BallSpawned { ball, owner: None });
                }
                if main {
                    self.registry.set_main(ball);
                }
            }
            (Role::Observer, BallMessage::BallDespawned { ball }) => {
                self.remove_ball(ball)?;
            }
            (Role::Observer, BallMessage::ResetBall { ball, position }) => {
                self.apply_reset(ball, position)?;
            }
            (Role::Authority, BallMessage::EndOutOfBoundsPlay { ball, delay }) => {
                self.end_out_of_bounds_play(ball, delay)?;
            }
            (Role::Authority, BallMessage::DisableKickoffBarrier) => {
                self.lower_kickoff_barrier();
            }
            (Role::Observer, BallMessage::KickoffBarrierChanged { version, kickoff_ended }) => {
                if self.kickoff.offer(version, kickoff_ended) == Offer::Accepted {
                    self.kickoff_lowered_locally = false;
                }
            }
            (role, message) => {
                debug!(?role, %from, kind = message.kind(), "message ignored for role");
            }
        }
        Ok(())
    }

    fn rebroadcast(&mut self, message: BallMessage) {
        self.send(Recipient::Observers, message);
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn send(&mut self, to: Recipient, message: BallMessage) {
        self.outbox.push(Envelope::new(self.local_id, to, message));
    }

    fn ball_entry(&mut self, ball: BallId) -> Result<&mut Ball> {
        self.balls
            .get_mut(&ball)
            .ok_or(BallSyncError::UnknownBall(ball))
    }

    fn require_authority(&self, operation: &'static str) -> Result<()> {
        if self.role == Role::Authority {
            Ok(())
        } else {
            Err(BallSyncError::NotAuthority(operation))
        }
    }
}

/// Counts down a ball's out-of-bounds dead-time, clearing play flags on expiry.
fn advance_play_dead_time(ball: &mut Ball, events: &mut Vec<BallEvent>) {
    if ball.out_of_bounds_timer.advance() {
        ball.update_info(|info| info.play = PlayFlags::empty());
        events.push(BallEvent::OutOfBoundsEnded { ball: ball.id() });
    }
}

//! Setup utilities shared by the cross-module tests.

use std::sync::{Arc, Mutex};

use glam::Vec3;

use crate::ball::{BallId, ClientId, Kicker, TeamTag};
use crate::collab::StaticDirectory;
use crate::config::SimulationConfig;
use crate::event::BallEvent;
use crate::message::{BallMessage, Envelope, Recipient};
use crate::net::NetworkConfig;
use crate::replication::StateSnapshot;
use crate::session::{LocalSession, SessionConfig};
use crate::simulation::Simulation;
use crate::solver::{GroundPlane, ReferenceSolver, Solver};

/// Resting height of a ball on the ground plane.
pub const GROUND_Y: f32 = 0.11;

/// A reference solver with a ground plane at zero.
pub fn ground_solver() -> Box<dyn Solver> {
    Box::new(ReferenceSolver::new().with_ground(GroundPlane::default()))
}

/// Centre spot, resting on the ground.
pub fn centre_spot() -> Vec3 {
    Vec3::new(0.0, GROUND_Y, 0.0)
}

/// Player kicker shorthand.
pub fn player(id: u64) -> Kicker {
    Kicker::Player(ClientId::new(id))
}

/// Directory with two teams of two.
///
/// Clients 1 and 2 play for Blue, 3 and 4 for Red.
pub fn two_team_directory() -> StaticDirectory {
    let mut directory = StaticDirectory::new();
    directory.insert(ClientId::new(1), TeamTag::new("Blue"), "ana");
    directory.insert(ClientId::new(2), TeamTag::new("Blue"), "bo");
    directory.insert(ClientId::new(3), TeamTag::new("Red"), "cy");
    directory.insert(ClientId::new(4), TeamTag::new("Red"), "dee");
    directory
}

/// Authority with a ground plane and the two-team directory.
pub fn authority() -> Simulation {
    Simulation::authority(SimulationConfig::default(), ground_solver())
        .expect("default config is valid")
        .with_directory(Arc::new(two_team_directory()))
}

/// Authority with its main ball on the centre spot.
pub fn authority_with_ball() -> (Simulation, BallId) {
    let mut sim = authority();
    let ball = sim.spawn_main_ball(centre_spot()).expect("authority can spawn");
    sim.drain_outbox();
    sim.take_events();
    (sim, ball)
}

/// Steps a single host `ticks` times.
pub fn step_n(sim: &mut Simulation, ticks: u64) {
    for _ in 0..ticks {
        sim.step();
    }
}

/// Session with `observers` observers (ids 1..=n), ground solvers and the
/// two-team directory.
pub fn session(observers: u64, network: NetworkConfig) -> LocalSession {
    let config = SessionConfig {
        simulation: SimulationConfig::default(),
        network,
    };
    let mut session =
        LocalSession::new(config, Box::new(ground_solver)).expect("default config is valid");
    session.set_directory(Arc::new(two_team_directory()));
    for id in 1..=observers {
        session
            .add_observer(ClientId::new(id))
            .expect("default config is valid");
    }
    session
}

/// Session whose main ball has already reached every observer.
pub fn session_with_ball(observers: u64, network: NetworkConfig) -> (LocalSession, BallId) {
    let mut session = session(observers, network);
    let ball = session
        .authority_mut()
        .spawn_main_ball(centre_spot())
        .expect("authority can spawn");
    session.run(10);
    session.take_events();
    (session, ball)
}

/// Network with no latency or jitter.
pub fn instant_network() -> NetworkConfig {
    NetworkConfig {
        latency_ticks: 0,
        jitter_ticks: 0,
        ..NetworkConfig::default()
    }
}

/// Records every snapshot accepted by an observer's state register.
pub fn record_snapshots(sim: &mut Simulation, ball: BallId) -> Arc<Mutex<Vec<StateSnapshot>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    sim.ball_mut(ball)
        .expect("ball is live")
        .replication_mut()
        .state_mut()
        .subscribe(move |_, current| sink.lock().unwrap().push(*current));
    log
}

/// Envelope from `client` to the authority.
pub fn from_client(client: u64, message: BallMessage) -> Envelope {
    Envelope::new(ClientId::new(client), Recipient::Authority, message)
}

/// Envelope from the authority to observers.
pub fn from_authority(message: BallMessage) -> Envelope {
    Envelope::new(ClientId::AUTHORITY, Recipient::Observers, message)
}

/// Accepted kicks as `(kicker, request tick)`.
pub fn accepted_kicks(events: &[BallEvent]) -> Vec<(Kicker, u64)> {
    events
        .iter()
        .filter_map(|event| match event {
            BallEvent::KickAccepted {
                kicker,
                request_tick,
                ..
            } => Some((*kicker, *request_tick)),
            _ => None,
        })
        .collect()
}

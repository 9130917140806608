//! Headless ballsync match.
//!
//! Runs an authority and its observers over the loopback network, issues the
//! scripted kicks and prints a JSON report of where every host ended up.
//!
//! ```text
//! ballsync-sim [scenario.json]
//! ```

mod scenario;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use ballsync_core::ball::{BallId, ClientId, Kicker};
use ballsync_core::net::NetworkStats;
use ballsync_core::replication::StateSnapshot;
use ballsync_core::session::LocalSession;
use ballsync_core::solver::{GroundPlane, ReferenceSolver, Solver};
use ballsync_core::{BallEvent, Simulation};
use serde::Serialize;
use tracing::{debug, info, warn, Level};

use crate::scenario::{Scenario, ScriptedKick};

#[derive(Debug, Serialize)]
struct HostReport {
    host: ClientId,
    kickoff_ended: bool,
    balls: usize,
    main_ball: Option<StateSnapshot>,
    last_kicker: Option<ClientId>,
}

#[derive(Debug, Serialize)]
struct Report {
    ticks: u64,
    accepted_kicks: usize,
    rejected_kicks: usize,
    network: NetworkStats,
    hosts: Vec<HostReport>,
}

fn ground_solver() -> Box<dyn Solver> {
    Box::new(ReferenceSolver::new().with_ground(GroundPlane::default()))
}

fn host_report(host: &Simulation) -> HostReport {
    let main = host.main_ball().and_then(|id| host.ball(id));
    HostReport {
        host: host.local_id(),
        kickoff_ended: host.kickoff_ended(),
        balls: host.registry().len(),
        main_ball: main.map(|ball| StateSnapshot::capture(host.tick(), ball.body(), ball.spin())),
        last_kicker: main.and_then(|ball| ball.info().attribution.last_kicker),
    }
}

fn issue(session: &mut LocalSession, ball: BallId, kick: &ScriptedKick) -> Result<()> {
    let issuer = match kick.kicker {
        Kicker::Player(client) if session.observer(client).is_some() => client,
        _ => ClientId::AUTHORITY,
    };
    let host = if issuer == ClientId::AUTHORITY {
        session.authority_mut()
    } else {
        session
            .observer_mut(issuer)
            .with_context(|| format!("observer {issuer} vanished"))?
    };
    let request = kick.request(host.tick());
    host.request_kick(ball, request, kick.kicker)
        .with_context(|| format!("{issuer} kicking {ball}"))
}

fn run(scenario: &Scenario) -> Result<Report> {
    let mut session = LocalSession::new(scenario.session.clone(), Box::new(ground_solver))
        .context("building session")?;
    session.set_directory(Arc::new(scenario.directory()));
    for id in &scenario.observers {
        session.add_observer(ClientId::new(*id))?;
    }

    let ball = session.authority_mut().spawn_main_ball(scenario.kickoff_spot)?;
    for (owner, position) in &scenario.practice_balls {
        match session.observer_mut(ClientId::new(*owner)) {
            Some(observer) => observer.request_ball_spawn(*position),
            None => warn!(owner, "practice ball owner is not an observer"),
        }
    }
    info!(
        observers = scenario.observers.len(),
        ticks = scenario.ticks,
        %ball,
        "session ready"
    );

    let frame_dt = scenario.session.simulation.physics.fixed_timestep;
    let mut accepted_kicks = 0;
    let mut rejected_kicks = 0;
    for _ in 0..scenario.ticks {
        let tick = session.tick();
        for kick in scenario.kicks_at(tick) {
            issue(&mut session, ball, kick)?;
        }
        session.step();
        session.render(frame_dt);

        for (host, event) in session.take_events() {
            match event {
                BallEvent::KickAccepted {
                    kicker,
                    request_tick,
                    ..
                } => {
                    accepted_kicks += 1;
                    info!(tick, %kicker, request_tick, "kick accepted");
                }
                BallEvent::KickRejected { kicker, reason, .. } => {
                    rejected_kicks += 1;
                    info!(tick, %host, %kicker, ?reason, "kick rejected");
                }
                other => debug!(tick, %host, event = ?other),
            }
        }
    }

    let mut hosts = vec![host_report(session.authority())];
    hosts.extend(
        session
            .observer_ids()
            .filter_map(|id| session.observer(id))
            .map(host_report),
    );
    Ok(Report {
        ticks: session.tick(),
        accepted_kicks,
        rejected_kicks,
        network: session.network().stats(),
        hosts,
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let scenario = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => Scenario::load(&path)?,
        None => Scenario::default(),
    };
    scenario
        .session
        .simulation
        .validate()
        .context("scenario simulation config")?;

    let report = run(&scenario)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

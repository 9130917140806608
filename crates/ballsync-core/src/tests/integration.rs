//! End-to-end scenarios across an authority and its observers.

use glam::{Quat, Vec3};

use super::helpers::*;
use crate::ball::{BallId, ClientId, Kicker, PlayFlags, Side};
use crate::config::SimulationConfig;
use crate::event::{BallEvent, DiscardReason};
use crate::kick::{KickFlags, KickRejection, KickRequest};
use crate::message::{BallMessage, Envelope};
use crate::net::NetworkConfig;
use crate::replication::StateSnapshot;
use crate::session::LocalSession;
use crate::simulation::Simulation;

const FRAME_DT: f32 = 1.0 / 60.0;

fn assert_close(a: Vec3, b: Vec3, tolerance: f32) {
    assert!(
        (a - b).length() <= tolerance,
        "expected {a:?} within {tolerance} of {b:?}"
    );
}

fn kick_from(client: u64, ball: BallId, tick: u64, force: Vec3) -> Envelope {
    from_client(
        client,
        BallMessage::RequestKick {
            ball,
            request: KickRequest::new(tick, force),
        },
    )
}

fn every_host(session: &LocalSession) -> Vec<&Simulation> {
    let mut hosts = vec![session.authority()];
    hosts.extend(session.observer_ids().filter_map(|id| session.observer(id)));
    hosts
}

// =============================================================================
// Arbitration
// =============================================================================

#[test]
fn earliest_origination_tick_wins_regardless_of_arrival() {
    let (mut sim, ball) = authority_with_ball();
    sim.handle_message(kick_from(1, ball, 101, Vec3::new(5.0, 0.0, 0.0)))
        .unwrap();
    sim.handle_message(kick_from(3, ball, 100, Vec3::new(-5.0, 0.0, 0.0)))
        .unwrap();
    sim.step();

    let events = sim.take_events();
    assert_eq!(accepted_kicks(&events), vec![(player(3), 100)]);
    assert!(events.contains(&BallEvent::KicksDiscarded {
        ball,
        count: 1,
        reason: DiscardReason::LostTie,
    }));

    let ball = sim.ball(ball).unwrap();
    assert!(ball.body().linear_velocity.x < 0.0, "only B's impulse applied");
    assert_eq!(ball.info().attribution.last_kicker, Some(ClientId::new(3)));
    assert_eq!(ball.info().attribution.second_last_kicker, None);
}

#[test]
fn remote_kicks_are_credited_to_the_sending_client() {
    let (mut session, ball) = session_with_ball(2, instant_network());

    let observer = session.observer_mut(ClientId::new(2)).unwrap();
    let request = KickRequest::new(observer.tick(), Vec3::X);
    observer.request_kick(ball, request, player(1)).unwrap();
    session.run(8);
    let attribution = &session.authority().ball(ball).unwrap().info().attribution;
    assert_eq!(attribution.last_kicker, Some(ClientId::new(2)));

    let observer = session.observer_mut(ClientId::new(1)).unwrap();
    let request = KickRequest::new(observer.tick(), Vec3::X);
    observer
        .request_kick(ball, request, Kicker::Goalkeeper(Side::Home))
        .unwrap();
    session.run(8);
    let attribution = &session.authority().ball(ball).unwrap().info().attribution;
    assert_eq!(attribution.last_kicker, Some(ClientId::new(1)));
    assert_eq!(attribution.second_last_kicker, Some(ClientId::new(2)));
}

#[test]
fn zero_cooldown_contest_applies_only_the_earlier_kick() {
    let mut config = SimulationConfig::default();
    config.tuning.kick_cooldown = 0.0;
    let mut sim = Simulation::authority(config, ground_solver()).unwrap();
    let ball = sim.spawn_main_ball(centre_spot()).unwrap();
    sim.handle_message(kick_from(1, ball, 100, Vec3::new(5.0, 0.0, 0.0)))
        .unwrap();
    sim.handle_message(kick_from(2, ball, 101, Vec3::new(0.0, 0.0, 5.0)))
        .unwrap();
    sim.step();

    let velocity = sim.ball(ball).unwrap().body().linear_velocity;
    assert_eq!(velocity.z, 0.0);
    assert!(velocity.x > 0.0);
    assert_eq!(sim.ball(ball).unwrap().arbitration().cooldown_remaining(), 0);
}

#[test]
fn illegal_force_is_rejected_but_still_blocks_the_ball() {
    let (mut sim, ball) = authority_with_ball();
    sim.handle_message(kick_from(1, ball, 0, Vec3::new(60.0, 0.0, 0.0)))
        .unwrap();
    sim.step();

    let events = sim.take_events();
    assert!(accepted_kicks(&events).is_empty());
    assert!(events.iter().any(|event| matches!(
        event,
        BallEvent::KickRejected {
            reason: KickRejection::IllegalForce { .. },
            ..
        }
    )));
    let target = sim.ball(ball).unwrap();
    assert_eq!(target.body().linear_velocity.x, 0.0);
    assert_eq!(target.info().attribution.last_kicker, None);
    assert!(target.arbitration().cooldown_remaining() > 0);

    sim.handle_message(kick_from(2, ball, 1, Vec3::new(5.0, 0.0, 0.0)))
        .unwrap();
    sim.step();
    assert!(sim.take_events().contains(&BallEvent::KicksDiscarded {
        ball,
        count: 1,
        reason: DiscardReason::Cooldown,
    }));
}

#[test]
fn cooldown_spaces_accepted_kicks_under_spam() {
    let (mut sim, ball) = authority_with_ball();
    let mut events = Vec::new();
    for tick in 0..60 {
        for client in 1..=4 {
            sim.handle_message(kick_from(client, ball, tick, Vec3::new(1.0, 0.0, 0.0)))
                .unwrap();
        }
        sim.step();
        events.extend(sim.take_events());
    }

    let accepted: Vec<u64> = accepted_kicks(&events).iter().map(|(_, tick)| *tick).collect();
    assert_eq!(accepted.len(), 12, "one kick per five ticks: {accepted:?}");
    assert!(accepted.windows(2).all(|pair| pair[1] - pair[0] == 5));
}

#[test]
fn kinematic_ball_discards_kicks_and_stops_publishing() {
    let (mut session, ball) = session_with_ball(2, NetworkConfig::default());
    session.authority_mut().enable_kinematics(ball, true).unwrap();
    session.run(6);
    for host in every_host(&session) {
        assert!(host.ball(ball).unwrap().is_kinematic());
    }

    let authority = session.authority_mut();
    let published = authority.ball(ball).unwrap().replication().last_tick();
    authority
        .request_kick(ball, KickRequest::new(0, Vec3::X), player(1))
        .unwrap();
    authority.step();

    assert!(authority.take_events().contains(&BallEvent::KicksDiscarded {
        ball,
        count: 1,
        reason: DiscardReason::Kinematic,
    }));
    assert_eq!(authority.ball(ball).unwrap().replication().last_tick(), published);
    assert!(!authority
        .drain_outbox()
        .iter()
        .any(|envelope| matches!(envelope.message, BallMessage::StateSnapshotUpdated { .. })));
}

// =============================================================================
// Replication
// =============================================================================

#[test]
fn stale_snapshot_never_overwrites_newer_state() {
    let mut observer = Simulation::observer(
        ClientId::new(1),
        SimulationConfig::default(),
        ground_solver(),
    )
    .unwrap();
    let ball = BallId::new(1);
    observer
        .handle_message(from_authority(BallMessage::BallSpawned {
            ball,
            position: centre_spot(),
            main: true,
        }))
        .unwrap();

    let snapshot_at = |tick, x| StateSnapshot {
        tick,
        position: Vec3::new(x, GROUND_Y, 0.0),
        ..StateSnapshot::default()
    };
    for snapshot in [snapshot_at(12, 4.0), snapshot_at(11, -4.0)] {
        observer
            .handle_message(from_authority(BallMessage::StateSnapshotUpdated { ball, snapshot }))
            .unwrap();
    }

    let state = observer.ball(ball).unwrap();
    assert_eq!(state.body().position.x, 4.0);
    assert_eq!(state.replication().last_tick(), Some(12));
}

#[test]
fn rejected_prediction_is_overwritten_by_snapshots() {
    let (mut session, ball) = session_with_ball(1, NetworkConfig::default());
    let observer = session.observer_mut(ClientId::new(1)).unwrap();
    let request = KickRequest::new(observer.tick(), Vec3::new(60.0, 0.0, 0.0));
    observer.request_kick(ball, request, player(1)).unwrap();
    assert!(observer.ball(ball).unwrap().body().linear_velocity.x > 0.0);

    session.run(10);
    let predicted = session.observer(ClientId::new(1)).unwrap().ball(ball).unwrap();
    let authoritative = session.authority().ball(ball).unwrap();
    assert_eq!(predicted.body().linear_velocity.x, 0.0);
    assert_close(predicted.body().position, authoritative.body().position, 1e-5);
}

#[test]
fn observers_converge_once_the_ball_rests() {
    let (mut session, ball) = session_with_ball(3, NetworkConfig::default());
    let kick = KickRequest::new(session.authority().tick(), Vec3::new(3.0, 1.0, 0.5))
        .with_spin(Vec3::new(0.0, 0.5, 0.0));
    session
        .authority_mut()
        .request_kick(ball, kick, Kicker::Player(ClientId::new(4)))
        .unwrap();
    session.run(200);
    session.authority_mut().stop_ball(ball).unwrap();
    session.run(100);
    for _ in 0..120 {
        session.render(FRAME_DT);
    }

    let target = session.authority().ball(ball).unwrap().body().position;
    assert!(target.x > 0.0);
    for host in every_host(&session) {
        let state = host.ball(ball).unwrap();
        assert_close(state.body().position, target, 1e-4);
        assert_close(state.visual().position, target, 1e-3);
    }
}

#[test]
fn teleport_is_idempotent_on_every_host() {
    let (mut session, ball) = session_with_ball(2, NetworkConfig::default());
    let spot = Vec3::new(5.0, GROUND_Y, -3.0);
    let observer = session.observer_mut(ClientId::new(1)).unwrap();
    observer.teleport(ball, spot, Quat::IDENTITY).unwrap();
    let once = observer.ball(ball).unwrap().body().clone();
    observer.teleport(ball, spot, Quat::IDENTITY).unwrap();
    assert_eq!(observer.ball(ball).unwrap().body(), &once);

    session.run(10);
    for host in every_host(&session) {
        let state = host.ball(ball).unwrap();
        assert_close(state.body().position, spot, 1e-5);
        assert_eq!(state.body().linear_velocity, Vec3::ZERO);
        assert_close(state.visual().position, state.body().position, 1e-5);
    }
}

#[test]
fn attribution_and_goal_credit_reach_observers() {
    let (mut session, ball) = session_with_ball(2, NetworkConfig::default());
    for client in [1, 2] {
        let id = ClientId::new(client);
        let observer = session.observer_mut(id).unwrap();
        let request = KickRequest::new(observer.tick(), Vec3::new(2.0, 0.0, 0.0));
        observer.request_kick(ball, request, player(client)).unwrap();
        session.run(12);
    }
    session.authority_mut().credit_goal(ball).unwrap();
    session.run(8);

    let expected = session.authority().ball(ball).unwrap().info().clone();
    assert_eq!(expected.attribution.scorer.as_deref(), Some("bo"));
    assert_eq!(expected.attribution.assister.as_deref(), Some("ana"));
    for id in session.observer_ids() {
        assert_eq!(session.observer(id).unwrap().ball(ball).unwrap().info(), &expected);
    }
}

#[test]
fn goalkeeper_touch_clears_assist_chain() {
    let (mut sim, ball) = authority_with_ball();
    sim.request_kick(ball, KickRequest::new(0, Vec3::X), player(1))
        .unwrap();
    step_n(&mut sim, 6);
    sim.request_kick(ball, KickRequest::new(6, Vec3::X), player(2))
        .unwrap();
    step_n(&mut sim, 6);
    sim.request_kick(ball, KickRequest::new(12, Vec3::X), Kicker::Goalkeeper(Side::Away))
        .unwrap();
    step_n(&mut sim, 6);
    sim.request_kick(ball, KickRequest::new(18, Vec3::X), player(3))
        .unwrap();
    step_n(&mut sim, 1);
    sim.credit_goal(ball).unwrap();

    let attribution = &sim.ball(ball).unwrap().info().attribution;
    assert_eq!(attribution.last_kicker, Some(ClientId::new(3)));
    assert_eq!(attribution.second_last_kicker, None);
    assert_eq!(attribution.scorer.as_deref(), Some("cy"));
    assert_eq!(attribution.assister, None);
}

// =============================================================================
// Match flow
// =============================================================================

#[test]
fn kickoff_barrier_replicates_both_ways() {
    let (mut session, ball) = session_with_ball(2, NetworkConfig::default());
    session.authority_mut().restart_kickoff().unwrap();
    session.run(6);
    assert!(every_host(&session).iter().all(|host| !host.kickoff_ended()));

    let observer = session.observer_mut(ClientId::new(2)).unwrap();
    let request = KickRequest::new(observer.tick(), Vec3::new(1.0, 0.0, 0.0));
    observer.request_kick(ball, request, player(2)).unwrap();
    assert!(observer.kickoff_ended(), "lowered locally at once");
    assert!(!session.observer(ClientId::new(1)).unwrap().kickoff_ended());

    session.run(12);
    assert!(every_host(&session).iter().all(|host| host.kickoff_ended()));
    assert!(session
        .take_events()
        .contains(&(ClientId::AUTHORITY, BallEvent::KickoffBarrierLowered)));
}

#[test]
fn out_of_bounds_play_ends_after_forwarded_delay() {
    let (mut session, ball) = session_with_ball(1, instant_network());
    session
        .authority_mut()
        .set_play_flags(
            ball,
            PlayFlags::OUT_OF_BOUNDS | PlayFlags::THROW_IN | PlayFlags::PICKED_UP,
        )
        .unwrap();
    session.run(2);

    let observer = session.observer_mut(ClientId::new(1)).unwrap();
    assert!(observer.ball(ball).unwrap().info().is_out_of_bounds());
    let slide = KickRequest::new(observer.tick(), Vec3::X).with_flags(KickFlags::SLIDE_KICK);
    observer.request_kick(ball, slide, player(1)).unwrap();
    assert!(observer.take_events().iter().any(|event| matches!(
        event,
        BallEvent::KickRejected {
            reason: KickRejection::SlideOutOfBounds,
            ..
        }
    )));
    observer.end_out_of_bounds_play(ball, 0.1).unwrap();

    session.run(2);
    let play = session.authority().ball(ball).unwrap().info().play;
    assert!(!play.contains(PlayFlags::PICKED_UP));
    assert!(play.contains(PlayFlags::OUT_OF_BOUNDS));

    session.run(8);
    for host in every_host(&session) {
        assert!(host.ball(ball).unwrap().info().play.is_empty());
    }
    assert!(session
        .take_events()
        .contains(&(ClientId::AUTHORITY, BallEvent::OutOfBoundsEnded { ball })));
}

#[test]
fn practice_balls_are_removed_everywhere() {
    let (mut session, main) = session_with_ball(2, NetworkConfig::default());
    for id in session.observer_ids().collect::<Vec<_>>() {
        let spot = Vec3::new(id.as_u64() as f32 * 4.0, GROUND_Y, 0.0);
        session.observer_mut(id).unwrap().request_ball_spawn(spot);
    }
    session.run(12);
    for host in every_host(&session) {
        assert_eq!(host.registry().len(), 3);
    }
    let owned = session.observer(ClientId::new(1)).unwrap().local_ball();
    assert!(owned.is_some());
    assert_ne!(owned, session.observer(ClientId::new(2)).unwrap().local_ball());

    let restart = Vec3::new(0.0, GROUND_Y, 10.0);
    session.authority_mut().delete_non_main(restart).unwrap();
    session.run(10);
    for host in every_host(&session) {
        assert_eq!(host.registry().iter().collect::<Vec<_>>(), vec![main]);
        assert_eq!(host.main_ball(), Some(main));
        assert_eq!(host.local_ball(), None);
        assert_close(host.ball(main).unwrap().body().position, restart, 1e-5);
    }
}

#[test]
fn unknown_ball_messages_are_dropped_without_side_effects() {
    let (mut session, ball) = session_with_ball(1, NetworkConfig::default());
    let ghost = BallId::new(99);
    session
        .observer_mut(ClientId::new(1))
        .unwrap()
        .handle_message(from_authority(BallMessage::StopBall { ball: ghost }))
        .unwrap_err();
    session
        .authority_mut()
        .handle_message(kick_from(1, ghost, 0, Vec3::X))
        .unwrap_err();
    session.run(5);
    assert!(session.authority().ball(ball).is_some());
    assert!(session.authority().ball(ghost).is_none());
}

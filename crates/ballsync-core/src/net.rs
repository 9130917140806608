//! In-process transport with seeded latency and jitter.
//!
//! [`LoopbackNetwork`] stands in for a real transport when several
//! [`crate::simulation::Simulation`]s run in one process. Time is measured in
//! fixed ticks. Each delivery is delayed by a base latency plus a random
//! jitter drawn from a `ChaCha8Rng`, so a given seed always produces the same
//! delivery schedule.
//!
//! Reliable messages never overtake earlier reliable messages on the same
//! link. Unreliable snapshots may be reordered by jitter, and may be dropped.

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::ball::ClientId;
use crate::message::{Envelope, Recipient};

/// Delivery behaviour of a [`LoopbackNetwork`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// RNG seed for jitter and drops.
    pub seed: u64,
    /// Minimum delay in ticks.
    pub latency_ticks: u32,
    /// Maximum extra random delay in ticks.
    pub jitter_ticks: u32,
    /// Probability that an unreliable message is lost.
    pub snapshot_loss: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            latency_ticks: 2,
            jitter_ticks: 2,
            snapshot_loss: 0.0,
        }
    }
}

/// Counters kept by the network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStats {
    /// Per-destination copies scheduled.
    pub sent: u64,
    /// Copies handed to a host.
    pub delivered: u64,
    /// Unreliable copies lost.
    pub dropped: u64,
}

#[derive(Debug, Clone)]
struct InFlight {
    deliver_at: u64,
    seq: u64,
    to: ClientId,
    envelope: Envelope,
}

/// Deterministic in-memory message bus.
#[derive(Debug, Clone)]
pub struct LoopbackNetwork {
    config: NetworkConfig,
    rng: ChaCha8Rng,
    observers: Vec<ClientId>,
    in_flight: Vec<InFlight>,
    reliable_tail: BTreeMap<(ClientId, ClientId), u64>,
    next_seq: u64,
    stats: NetworkStats,
}

impl LoopbackNetwork {
    /// Creates a network with no observers attached.
    #[must_use]
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            observers: Vec::new(),
            in_flight: Vec::new(),
            reliable_tail: BTreeMap::new(),
            next_seq: 0,
            stats: NetworkStats::default(),
        }
    }

    /// Attaches an observer so it receives broadcasts.
    pub fn attach(&mut self, observer: ClientId) {
        if !self.observers.contains(&observer) {
            self.observers.push(observer);
        }
    }

    /// Detaches an observer. Messages already in flight to it are dropped.
    pub fn detach(&mut self, observer: ClientId) {
        self.observers.retain(|id| *id != observer);
        self.in_flight.retain(|item| item.to != observer);
    }

    /// Delivery counters.
    #[must_use]
    pub fn stats(&self) -> NetworkStats {
        self.stats
    }

    /// Messages not yet delivered.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Schedules `envelope` for delivery, sent at tick `now`.
    pub fn send(&mut self, envelope: Envelope, now: u64) {
        let destinations: Vec<ClientId> = match envelope.to {
            Recipient::Authority => vec![ClientId::AUTHORITY],
            Recipient::Client(id) => vec![id],
            Recipient::Observers => self
                .observers
                .iter()
                .copied()
                .filter(|id| *id != envelope.from)
                .collect(),
        };
        let unreliable = envelope.message.is_unreliable();

        for to in destinations {
            let jitter = self.rng.gen_range(0..=self.config.jitter_ticks);
            let mut deliver_at = now + u64::from(self.config.latency_ticks + jitter);

            if unreliable {
                if self.config.snapshot_loss > 0.0 && self.rng.gen_bool(self.config.snapshot_loss.min(1.0)) {
                    trace!(from = %envelope.from, %to, kind = envelope.message.kind(), "message lost");
                    self.stats.dropped += 1;
                    continue;
                }
            } else {
                let tail = self.reliable_tail.entry((envelope.from, to)).or_insert(0);
                deliver_at = deliver_at.max(*tail);
                *tail = deliver_at;
            }

            self.stats.sent += 1;
            self.in_flight.push(InFlight {
                deliver_at,
                seq: self.next_seq,
                to,
                envelope: envelope.clone(),
            });
            self.next_seq += 1;
        }
    }

    /// Removes and returns every message due at or before `now`, in delivery
    /// order, paired with its destination.
    pub fn deliver_due(&mut self, now: u64) -> Vec<(ClientId, Envelope)> {
        let (mut due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.in_flight)
            .into_iter()
            .partition(|item| item.deliver_at <= now);
        self.in_flight = pending;
        due.sort_by_key(|item| (item.deliver_at, item.seq));
        self.stats.delivered += due.len() as u64;
        due.into_iter().map(|item| (item.to, item.envelope)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ball::BallId;
    use crate::message::BallMessage;
    use crate::replication::StateSnapshot;

    fn stop(ball: u64) -> Envelope {
        Envelope::new(
            ClientId::AUTHORITY,
            Recipient::Observers,
            BallMessage::StopBall {
                ball: BallId::new(ball),
            },
        )
    }

    fn snapshot(tick: u64) -> Envelope {
        Envelope::new(
            ClientId::AUTHORITY,
            Recipient::Observers,
            BallMessage::StateSnapshotUpdated {
                ball: BallId::new(1),
                snapshot: StateSnapshot {
                    tick,
                    ..StateSnapshot::default()
                },
            },
        )
    }

    fn jittery(seed: u64) -> LoopbackNetwork {
        let mut net = LoopbackNetwork::new(NetworkConfig {
            seed,
            latency_ticks: 1,
            jitter_ticks: 6,
            snapshot_loss: 0.0,
        });
        net.attach(ClientId::new(1));
        net
    }

    fn drain(net: &mut LoopbackNetwork, until: u64) -> Vec<Envelope> {
        (0..=until)
            .flat_map(|now| net.deliver_due(now))
            .map(|(_, envelope)| envelope)
            .collect()
    }

    #[test]
    fn reliable_messages_keep_link_order() {
        let mut net = jittery(7);
        for (tick, ball) in (0..20).enumerate() {
            net.send(stop(ball), tick as u64);
        }
        let delivered: Vec<u64> = drain(&mut net, 100)
            .into_iter()
            .filter_map(|env| match env.message {
                BallMessage::StopBall { ball } => Some(ball.as_u64()),
                _ => None,
            })
            .collect();
        assert_eq!(delivered, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn same_seed_same_schedule() {
        let schedule = |seed| {
            let mut net = jittery(seed);
            for tick in 0..30 {
                net.send(snapshot(tick), tick);
            }
            (0..60)
                .map(|now| net.deliver_due(now).len())
                .collect::<Vec<_>>()
        };
        assert_eq!(schedule(11), schedule(11));
    }

    #[test]
    fn broadcasts_skip_sender_and_reach_each_observer() {
        let mut net = LoopbackNetwork::new(NetworkConfig {
            jitter_ticks: 0,
            latency_ticks: 0,
            ..NetworkConfig::default()
        });
        net.attach(ClientId::new(1));
        net.attach(ClientId::new(2));
        net.send(
            Envelope::new(
                ClientId::new(2),
                Recipient::Observers,
                BallMessage::DisableKickoffBarrier,
            ),
            0,
        );
        let delivered = net.deliver_due(0);
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].0, ClientId::new(1));
    }

    #[test]
    fn total_loss_drops_only_snapshots() {
        let mut net = LoopbackNetwork::new(NetworkConfig {
            snapshot_loss: 1.0,
            ..NetworkConfig::default()
        });
        net.attach(ClientId::new(1));
        net.send(snapshot(0), 0);
        net.send(stop(1), 0);
        assert_eq!(drain(&mut net, 10).len(), 1);
        assert_eq!(net.stats().dropped, 1);
        assert_eq!(net.stats().delivered, 1);
    }

    #[test]
    fn detach_discards_pending_deliveries() {
        let mut net = jittery(3);
        net.send(stop(1), 0);
        net.detach(ClientId::new(1));
        assert_eq!(net.in_flight(), 0);
    }
}

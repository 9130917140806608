//! Scripted match description loaded from JSON.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use ballsync_core::ball::{ClientId, Kicker, TeamTag};
use ballsync_core::collab::StaticDirectory;
use ballsync_core::kick::{KickFlags, KickRequest};
use ballsync_core::session::SessionConfig;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// A connected player known to the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub client: u64,
    pub team: String,
    pub name: String,
}

/// One kick issued at a fixed session tick.
///
/// Player kicks are issued by that player's observer when one exists,
/// everything else by the authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedKick {
    pub tick: u64,
    pub kicker: Kicker,
    pub force: Vec3,
    #[serde(default)]
    pub spin: Vec3,
    #[serde(default)]
    pub stop_first: bool,
    #[serde(default)]
    pub slide: bool,
}

impl ScriptedKick {
    /// Builds the request as issued at `tick`.
    pub fn request(&self, tick: u64) -> KickRequest {
        let mut flags = KickFlags::empty();
        flags.set(KickFlags::STOP_BALL_FIRST, self.stop_first);
        flags.set(KickFlags::SLIDE_KICK, self.slide);
        KickRequest::new(tick, self.force)
            .with_spin(self.spin)
            .with_flags(flags)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub session: SessionConfig,
    /// Observer ids, each joining before the main ball spawns.
    pub observers: Vec<u64>,
    pub ticks: u64,
    pub kickoff_spot: Vec3,
    /// Practice balls requested by observers at tick zero.
    pub practice_balls: Vec<(u64, Vec3)>,
    pub players: Vec<Player>,
    pub kicks: Vec<ScriptedKick>,
}

impl Default for Scenario {
    fn default() -> Self {
        let kick = |tick, client, force| ScriptedKick {
            tick,
            kicker: Kicker::Player(ClientId::new(client)),
            force,
            spin: Vec3::new(0.0, 1.5, 0.0),
            stop_first: false,
            slide: false,
        };
        Self {
            session: SessionConfig::default(),
            observers: vec![1, 2, 3],
            ticks: 400,
            kickoff_spot: Vec3::new(0.0, 0.11, 0.0),
            practice_balls: vec![(3, Vec3::new(20.0, 0.11, 15.0))],
            players: vec![
                Player {
                    client: 1,
                    team: "Blue".into(),
                    name: "ana".into(),
                },
                Player {
                    client: 2,
                    team: "Blue".into(),
                    name: "bo".into(),
                },
                Player {
                    client: 3,
                    team: "Red".into(),
                    name: "cy".into(),
                },
            ],
            kicks: vec![
                kick(30, 1, Vec3::new(6.0, 2.0, 1.0)),
                kick(30, 3, Vec3::new(-6.0, 2.0, 0.0)),
                kick(140, 2, Vec3::new(9.0, 3.0, -1.0)),
                kick(260, 1, Vec3::new(12.0, 1.0, 0.0)),
            ],
        }
    }
}

impl Scenario {
    /// Reads a scenario from a JSON file; missing fields take defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing scenario {}", path.display()))
    }

    /// Directory of every listed player.
    pub fn directory(&self) -> StaticDirectory {
        let mut directory = StaticDirectory::new();
        for player in &self.players {
            directory.insert(
                ClientId::new(player.client),
                TeamTag::new(&player.team),
                player.name.clone(),
            );
        }
        directory
    }

    /// Kicks scheduled for `tick`, in file order.
    pub fn kicks_at(&self, tick: u64) -> impl Iterator<Item = &ScriptedKick> {
        self.kicks.iter().filter(move |kick| kick.tick == tick)
    }
}

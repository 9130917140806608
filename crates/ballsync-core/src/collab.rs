//! Interfaces to collaborators outside the ball core.
//!
//! The match/possession authority and the player directory are owned by other
//! systems. The core only reads them: the directory for attribution
//! bookkeeping and the gate to refuse kicks during stoppages. Simple in-memory
//! implementations are provided for tests and the headless driver.

use std::collections::BTreeMap;

use crate::ball::{ClientId, TeamTag};

/// Maps client identities to team and display name.
///
/// Used only for attribution; arbitration never consults it.
pub trait PlayerDirectory: Send + Sync {
    /// Team of a connected player, or `None` if unknown.
    fn team_of(&self, client: ClientId) -> Option<TeamTag>;

    /// Display name of a connected player, or `None` if unknown.
    fn display_name(&self, client: ClientId) -> Option<String>;
}

/// Read-only view of match state that can veto kicks.
///
/// The simulation only consults [`MatchGate::kicks_allowed`]. Match start and
/// possession are carried for gameplay code sharing the same gate.
pub trait MatchGate: Send + Sync {
    /// Whether a goal is currently being processed.
    fn is_goal_in_progress(&self) -> bool;

    /// Whether the match has kicked off at least once.
    fn has_match_started(&self) -> bool;

    /// Team currently holding possession, if possession is tracked.
    fn possession(&self) -> Option<TeamTag>;

    /// Whether kick requests may be issued right now.
    fn kicks_allowed(&self) -> bool {
        !self.is_goal_in_progress()
    }
}

/// Fixed player directory backed by a `BTreeMap`.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    players: BTreeMap<ClientId, (TeamTag, String)>,
}

impl StaticDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a player.
    pub fn insert(&mut self, client: ClientId, team: TeamTag, name: impl Into<String>) {
        self.players.insert(client, (team, name.into()));
    }

    /// Removes a player.
    pub fn remove(&mut self, client: ClientId) {
        self.players.remove(&client);
    }
}

impl PlayerDirectory for StaticDirectory {
    fn team_of(&self, client: ClientId) -> Option<TeamTag> {
        self.players.get(&client).map(|(team, _)| team.clone())
    }

    fn display_name(&self, client: ClientId) -> Option<String> {
        self.players.get(&client).map(|(_, name)| name.clone())
    }
}

/// Match gate that always allows play unless a goal is flagged.
#[derive(Debug, Clone, Default)]
pub struct OpenMatch {
    /// Set while a goal celebration/reset is running.
    pub goal_in_progress: bool,
    /// Team in possession.
    pub possession: Option<TeamTag>,
}

impl MatchGate for OpenMatch {
    fn is_goal_in_progress(&self) -> bool {
        self.goal_in_progress
    }

    fn has_match_started(&self) -> bool {
        true
    }

    fn possession(&self) -> Option<TeamTag> {
        self.possession.clone()
    }
}

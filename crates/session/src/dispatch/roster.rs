//! Connected-player roster
//!
//! Derived state owned by the event dispatcher. Keyed by `user_id`: a
//! duplicate join (reconnect races deliver those) replaces the stored entry
//! in place rather than appending, so the roster can never hold two players
//! with the same id.

use tablebound_shared::Player;

/// Insertion-ordered set of connected players, unique by `user_id`.
#[derive(Debug, Default)]
pub struct Roster {
    players: Vec<Player>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole roster with an authoritative server snapshot.
    pub fn replace(&mut self, players: Vec<Player>) {
        self.players.clear();
        for player in players {
            self.upsert(player);
        }
    }

    /// Insert a player, replacing any existing entry with the same `user_id`.
    /// Returns true if an entry was replaced.
    pub fn upsert(&mut self, player: Player) -> bool {
        if let Some(existing) = self
            .players
            .iter_mut()
            .find(|p| p.user_id == player.user_id)
        {
            *existing = player;
            true
        } else {
            self.players.push(player);
            false
        }
    }

    /// Remove the player with the given id, if present.
    pub fn remove(&mut self, user_id: &str) -> Option<Player> {
        let idx = self.players.iter().position(|p| p.user_id == user_id)?;
        Some(self.players.remove(idx))
    }

    pub fn clear(&mut self) {
        self.players.clear();
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.players.iter().any(|p| p.user_id == user_id)
    }
}

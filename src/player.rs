//! Player identities and the ordered room roster
//!
//! The roster keeps players in join order. That order defines the 1-based
//! numbers shown to users, which nominations by number refer to, so it must
//! stay stable while a round is running.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{constants, error::Error};

/// A stable identifier for a player, as issued by the chat transport
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
    derive_more::FromStr,
)]
#[serde(transparent)]
pub struct PlayerId(i64);

impl PlayerId {
    /// Returns the raw transport identifier
    pub fn get(self) -> i64 {
        self.0
    }
}

/// A member of the roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    id: PlayerId,
    name: String,
    /// Role label, assigned when a round starts
    role: Option<String>,
}

impl Player {
    /// Creates a player without a role
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            role: None,
        }
    }

    /// The player's identifier
    pub fn id(&self) -> PlayerId {
        self.id
    }

    /// The display name given on join
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The role label assigned for the current round, if any
    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    pub(crate) fn set_role(&mut self, role: impl Into<String>) {
        self.role = Some(role.into());
    }
}

/// Ordered set of players in a room
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Roster {
    players: Vec<Player>,
}

impl Roster {
    /// Appends a player at the end of the roster
    ///
    /// # Errors
    ///
    /// * `Error::AlreadyMember` if the id is already present
    /// * `Error::CapacityExceeded` if the roster is full
    pub fn add(&mut self, player: Player) -> Result<(), Error> {
        if self.contains(player.id) {
            return Err(Error::AlreadyMember);
        }

        if self.players.len() >= constants::roster::MAX_PLAYERS {
            return Err(Error::CapacityExceeded);
        }

        self.players.push(player);

        Ok(())
    }

    /// Removes a player, keeping the order of the others
    pub fn remove(&mut self, id: PlayerId) -> Option<Player> {
        let position = self.players.iter().position(|p| p.id == id)?;
        Some(self.players.remove(position))
    }

    /// Looks up a player by id
    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.iter_mut()
    }

    /// Whether the id is in the roster
    pub fn contains(&self, id: PlayerId) -> bool {
        self.get(id).is_some()
    }

    /// Looks up a player by their 1-based display number
    pub fn by_number(&self, number: usize) -> Option<&Player> {
        number.checked_sub(1).and_then(|index| self.players.get(index))
    }

    /// The 1-based display number of a player
    pub fn number_of(&self, id: PlayerId) -> Option<usize> {
        self.players.iter().position(|p| p.id == id).map(|i| i + 1)
    }

    /// The display name of a player
    pub fn name_of(&self, id: PlayerId) -> Option<&str> {
        self.get(id).map(Player::name)
    }

    /// All display names in roster order
    pub fn names(&self) -> Vec<String> {
        self.players.iter().map(|p| p.name.clone()).collect_vec()
    }

    /// Players in roster order
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Iterates over players in roster order
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    /// Number of players
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Whether nobody joined yet
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Empties the roster
    pub fn clear(&mut self) {
        self.players.clear();
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn roster_of(count: i64) -> Roster {
        let mut roster = Roster::default();
        for id in 1..=count {
            roster
                .add(Player::new(PlayerId::from(id), format!("p{id}")))
                .unwrap();
        }
        roster
    }

    #[test]
    fn test_add_rejects_duplicates() {
        let mut roster = roster_of(2);
        assert_eq!(
            roster.add(Player::new(PlayerId::from(1), "again")),
            Err(Error::AlreadyMember)
        );
        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn test_add_rejects_when_full() {
        let mut roster = roster_of(8);
        assert_eq!(
            roster.add(Player::new(PlayerId::from(9), "late")),
            Err(Error::CapacityExceeded)
        );
    }

    #[test]
    fn test_numbering_follows_join_order() {
        let mut roster = roster_of(4);
        assert_eq!(roster.by_number(1).map(Player::name), Some("p1"));
        assert_eq!(roster.by_number(0), None);
        assert_eq!(roster.by_number(5), None);

        roster.remove(PlayerId::from(2)).unwrap();

        assert_eq!(roster.number_of(PlayerId::from(3)), Some(2));
        assert_eq!(roster.names(), vec!["p1", "p3", "p4"]);
    }

    #[test]
    fn test_remove_missing_player() {
        let mut roster = roster_of(1);
        assert!(roster.remove(PlayerId::from(7)).is_none());
    }

    #[test]
    fn test_player_id_parses() {
        let id: PlayerId = "-100500".parse().unwrap();
        assert_eq!(id.get(), -100_500);
        assert_eq!(id.to_string(), "-100500");
    }
}

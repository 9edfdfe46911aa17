//! Location and role assignment
//!
//! A pure function of the roster, the location table and a random source.
//! Every agent receives the same role label; spies receive the fixed spy
//! label and no location role.

use itertools::Itertools;
use serde::Serialize;

use crate::{
    constants,
    location::{Location, LocationTable},
    player::{Player, PlayerId},
    settings::Language,
};

/// Result of assigning a round
#[derive(Debug, Clone, Serialize)]
pub struct Assignment {
    /// The location every agent shares
    pub location: Location,
    /// Spies, in roster order
    pub spies: Vec<PlayerId>,
    /// The single role label shared by all agents
    pub agent_role: String,
    /// The label every spy receives
    pub spy_role: String,
}

impl Assignment {
    /// Whether the player was picked as a spy
    pub fn is_spy(&self, id: PlayerId) -> bool {
        self.spies.contains(&id)
    }

    /// The role label for a player of this round
    pub fn role_for(&self, id: PlayerId) -> &str {
        if self.is_spy(id) {
            &self.spy_role
        } else {
            &self.agent_role
        }
    }
}

/// Number of spies for a roster of the given size
pub fn spy_count(roster_size: usize) -> usize {
    if roster_size <= constants::roster::SINGLE_SPY_MAX_PLAYERS {
        1
    } else {
        2
    }
}

/// Picks `count` distinct positions out of `0..len`
///
/// Shuffles the positions and keeps the first `count`, so every position is
/// equally likely regardless of join order. The result is sorted.
pub fn sample_positions(len: usize, count: usize, rng: &mut fastrand::Rng) -> Vec<usize> {
    let mut positions = (0..len).collect_vec();
    rng.shuffle(&mut positions);
    positions.truncate(count);
    positions.sort_unstable();
    positions
}

/// Assigns a location, the spies and the shared agent role
///
/// The caller guarantees the roster holds between
/// [`MIN_PLAYERS`](constants::roster::MIN_PLAYERS) and
/// [`MAX_PLAYERS`](constants::roster::MAX_PLAYERS) players.
pub fn assign(
    roster: &[Player],
    table: &LocationTable,
    language: Language,
    rng: &mut fastrand::Rng,
) -> Assignment {
    let locations = table.locations();
    let location = locations[rng.usize(..locations.len())].clone();

    let spies = sample_positions(roster.len(), spy_count(roster.len()), rng)
        .into_iter()
        .map(|position| roster[position].id())
        .collect_vec();

    let roles = location.roles(language);
    let agent_role = if roles.is_empty() {
        language.fallback_agent_label().to_owned()
    } else {
        roles[rng.usize(..roles.len())].clone()
    };

    tracing::debug!(
        location = location.name(language),
        spies = ?spies,
        agent_role = %agent_role,
        "assigned round"
    );

    Assignment {
        location,
        spies,
        agent_role,
        spy_role: language.spy_label().to_owned(),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::location::tests::{location, table};

    fn roster(size: i64) -> Vec<Player> {
        (1..=size)
            .map(|id| Player::new(PlayerId::from(id), format!("p{id}")))
            .collect()
    }

    #[test]
    fn test_spy_count_by_roster_size() {
        let mut rng = fastrand::Rng::with_seed(7);
        let table = table();

        for size in 3..=8 {
            let players = roster(size);
            let assignment = assign(&players, &table, Language::Uk, &mut rng);

            let expected = if size <= 4 { 1 } else { 2 };
            assert_eq!(assignment.spies.len(), expected, "roster of {size}");

            let ids: HashSet<_> = players.iter().map(Player::id).collect();
            assert!(assignment.spies.iter().all(|id| ids.contains(id)));
            assert_eq!(
                assignment.spies.iter().collect::<HashSet<_>>().len(),
                expected
            );

            let agent_roles: HashSet<_> = players
                .iter()
                .filter(|p| !assignment.is_spy(p.id()))
                .map(|p| assignment.role_for(p.id()))
                .collect();
            assert_eq!(agent_roles.len(), 1);
        }
    }

    #[test]
    fn test_spies_get_the_spy_label() {
        let mut rng = fastrand::Rng::with_seed(1);
        let players = roster(6);
        let assignment = assign(&players, &table(), Language::Ru, &mut rng);

        for spy in &assignment.spies {
            assert_eq!(assignment.role_for(*spy), "Шпион");
        }
        assert_ne!(assignment.agent_role, "Шпион");
    }

    #[test]
    fn test_agent_role_comes_from_location() {
        let table = LocationTable::new(vec![location("Bank", &["Teller", "Guard"])]).unwrap();
        let mut rng = fastrand::Rng::with_seed(3);

        for _ in 0..50 {
            let assignment = assign(&roster(3), &table, Language::Uk, &mut rng);
            assert!(["Teller", "Guard"].contains(&assignment.agent_role.as_str()));
        }
    }

    #[test]
    fn test_empty_role_list_uses_fallback() {
        let table = LocationTable::new(vec![location("Theatre", &[])]).unwrap();
        let mut rng = fastrand::Rng::with_seed(3);

        let assignment = assign(&roster(4), &table, Language::Uk, &mut rng);

        assert_eq!(assignment.agent_role, "Агент");
    }

    #[test]
    fn test_seeded_assignment_is_reproducible() {
        let players = roster(7);
        let first = assign(
            &players,
            &table(),
            Language::Uk,
            &mut fastrand::Rng::with_seed(99),
        );
        let second = assign(
            &players,
            &table(),
            Language::Uk,
            &mut fastrand::Rng::with_seed(99),
        );

        assert_eq!(first.spies, second.spies);
        assert_eq!(first.agent_role, second.agent_role);
        assert_eq!(first.location, second.location);
    }

    #[test]
    fn test_single_spy_is_uniform_over_positions() {
        const TRIALS: usize = 40_000;
        let mut rng = fastrand::Rng::with_seed(2024);
        let mut hits = [0usize; 4];

        for _ in 0..TRIALS {
            for position in sample_positions(4, 1, &mut rng) {
                hits[position] += 1;
            }
        }

        let expected = TRIALS / 4;
        for (position, count) in hits.iter().enumerate() {
            assert!(
                count.abs_diff(expected) < expected / 20,
                "position {position} picked {count} times, expected about {expected}"
            );
        }
    }

    #[test]
    fn test_two_spies_are_uniform_over_positions() {
        const TRIALS: usize = 40_000;
        let mut rng = fastrand::Rng::with_seed(11);
        let mut hits = [0usize; 8];

        for _ in 0..TRIALS {
            let picked = sample_positions(8, 2, &mut rng);
            assert_ne!(picked[0], picked[1]);
            for position in picked {
                hits[position] += 1;
            }
        }

        let expected = TRIALS * 2 / 8;
        for (position, count) in hits.iter().enumerate() {
            assert!(
                count.abs_diff(expected) < expected / 20,
                "position {position} picked {count} times, expected about {expected}"
            );
        }
    }
}

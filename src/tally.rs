//! Ballots, vote tallying and the elimination decision
//!
//! The tie-break looks at the net score (support minus oppose), while the
//! quorum looks at raw support only: oppose ballots can cancel a nomination
//! but never count towards an elimination.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{constants, player::PlayerId};

/// Whether a ballot supports or opposes eliminating its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BallotKind {
    /// Vote to eliminate
    Support,
    /// Vote to protect
    Oppose,
}

/// One voter's choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    /// The nominee the ballot is about
    pub target: PlayerId,
    /// Support or oppose
    pub kind: BallotKind,
}

/// Ballots keyed by voter, at most one per voter
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Ballots {
    by_voter: HashMap<PlayerId, Ballot>,
}

impl Ballots {
    /// Records a ballot, replacing the voter's previous one
    ///
    /// # Returns
    ///
    /// The ballot that was replaced, if any
    pub fn upsert(&mut self, voter: PlayerId, ballot: Ballot) -> Option<Ballot> {
        self.by_voter.insert(voter, ballot)
    }

    /// Drops every ballot cast by or naming the player
    pub fn discard(&mut self, player: PlayerId) {
        self.by_voter
            .retain(|voter, ballot| *voter != player && ballot.target != player);
    }

    /// Removes all ballots
    pub fn clear(&mut self) {
        self.by_voter.clear();
    }

    /// The ballot of a voter
    pub fn get(&self, voter: PlayerId) -> Option<&Ballot> {
        self.by_voter.get(&voter)
    }

    /// Iterates over `(voter, ballot)` pairs in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (PlayerId, &Ballot)> {
        self.by_voter.iter().map(|(voter, ballot)| (*voter, ballot))
    }

    /// Number of voters who cast a ballot
    pub fn len(&self) -> usize {
        self.by_voter.len()
    }

    /// Whether nobody voted
    pub fn is_empty(&self) -> bool {
        self.by_voter.is_empty()
    }
}

/// Per-nominee ballot counts
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Count {
    /// Support ballots
    pub support: usize,
    /// Oppose ballots
    pub oppose: usize,
}

impl Count {
    /// Support minus oppose
    pub fn net(&self) -> i64 {
        self.support as i64 - self.oppose as i64
    }
}

/// Counted ballots for a set of nominees
///
/// Only ballots naming one of the nominees count. The leaders are the
/// nominees sharing the highest net score, and only a positive score leads,
/// so a nominee opposed as much as supported can never be eliminated.
/// [`decide`](Self::decide) then checks the single leader's raw support
/// against the quorum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tally {
    counts: BTreeMap<PlayerId, Count>,
    leaders: BTreeSet<PlayerId>,
    leader_net: i64,
    total_ballots: usize,
    roster_size: usize,
}

impl Tally {
    /// Counts for a nominee
    pub fn count(&self, nominee: PlayerId) -> Count {
        self.counts.get(&nominee).copied().unwrap_or_default()
    }

    /// Counts for every nominee, ordered by id
    pub fn counts(&self) -> &BTreeMap<PlayerId, Count> {
        &self.counts
    }

    /// Nominees sharing the highest positive net score
    pub fn leaders(&self) -> &BTreeSet<PlayerId> {
        &self.leaders
    }

    /// The leaders' net score, zero when there are no leaders
    pub fn leader_net(&self) -> i64 {
        self.leader_net
    }

    /// Number of ballots counted
    pub fn total_ballots(&self) -> usize {
        self.total_ballots
    }

    /// Roster size the tally was taken against
    pub fn roster_size(&self) -> usize {
        self.roster_size
    }

    /// Applies the leadership and quorum rules
    pub fn decide(&self, quorum: usize) -> Decision {
        match self.leaders.iter().exactly_one() {
            Ok(&leader) => {
                let support = self.count(leader).support;
                if support >= quorum {
                    Decision::Eliminate {
                        target: leader,
                        support,
                    }
                } else {
                    Decision::NoQuorum {
                        leader,
                        support,
                        required: quorum,
                    }
                }
            }
            Err(_) if self.leaders.is_empty() => Decision::NoDecision,
            Err(leaders) => Decision::Tie {
                leaders: leaders.copied().collect_vec(),
                net: self.leader_net,
            },
        }
    }
}

/// Outcome of a closed vote
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Decision {
    /// A single leader reached quorum
    Eliminate {
        /// Player to remove
        target: PlayerId,
        /// Support ballots they received
        support: usize,
    },
    /// A single leader fell short of quorum
    NoQuorum {
        /// The leading nominee
        leader: PlayerId,
        /// Support ballots they received
        support: usize,
        /// Support ballots that were needed
        required: usize,
    },
    /// Several nominees share the best net score
    Tie {
        /// The tied nominees
        leaders: Vec<PlayerId>,
        /// Their shared net score
        net: i64,
    },
    /// No nominee has a positive net score
    NoDecision,
}

/// Minimum support ballots needed to eliminate: `max(2, ceil(30% of roster))`
pub fn quorum(roster_size: usize) -> usize {
    (roster_size * constants::voting::QUORUM_NUMERATOR)
        .div_ceil(constants::voting::QUORUM_DENOMINATOR)
        .max(constants::voting::QUORUM_FLOOR)
}

/// Counts the ballots cast for the nominees
///
/// Ballots naming anyone outside of `nominees` are ignored.
pub fn tally(ballots: &Ballots, nominees: &BTreeSet<PlayerId>, roster_size: usize) -> Tally {
    let mut counts: BTreeMap<PlayerId, Count> = nominees
        .iter()
        .map(|nominee| (*nominee, Count::default()))
        .collect();

    let mut total_ballots = 0;
    for (_, ballot) in ballots.iter() {
        let Some(count) = counts.get_mut(&ballot.target) else {
            continue;
        };
        match ballot.kind {
            BallotKind::Support => count.support += 1,
            BallotKind::Oppose => count.oppose += 1,
        }
        total_ballots += 1;
    }

    let leader_net = counts.values().map(Count::net).max().unwrap_or(0).max(0);
    let leaders = if leader_net > 0 {
        counts
            .iter()
            .filter(|(_, count)| count.net() == leader_net)
            .map(|(id, _)| *id)
            .collect()
    } else {
        BTreeSet::new()
    };

    Tally {
        counts,
        leaders,
        leader_net,
        total_ballots,
        roster_size,
    }
}

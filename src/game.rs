//! Room session state machine
//!
//! A [`Session`] owns everything one room needs to play successive games:
//! the roster, the settings, the phase with its per-phase data, and one timer
//! slot per [`TimerClass`]. Operations either return the updates the
//! transport should render or an [`Error`] explaining the refusal, in which
//! case nothing changed.

use std::{collections::BTreeSet, fmt::Debug, mem};

use enum_map::Enum;
use itertools::Itertools;
use serde::Serialize;
use serde_with::skip_serializing_none;
use web_time::{Duration, Instant};

use crate::{
    assign::{self, Assignment},
    config::{Config, Timings},
    constants,
    error::{Error, Target},
    location::LocationTable,
    player::{Player, PlayerId, Roster},
    runtime::Runtime,
    settings::{Setting, Settings},
    store::RoomId,
    tally::{self, Ballot, BallotKind, Ballots, Decision},
    timer::{AlarmMessage, TimerClass, Timers},
};

/// The phase a room is in, without its data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, derive_more::Display)]
pub enum PhaseKind {
    /// Gathering players
    #[display("in the lobby")]
    Lobby,
    /// Enough players, counting down to the start
    #[display("waiting to start")]
    Waiting,
    /// A round is running
    #[display("playing")]
    Active,
    /// A round is running and a vote is open
    #[display("voting")]
    Voting,
}

/// Side that won a game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Team {
    /// The non-spy players
    Agents,
    /// The spies
    Spies,
}

/// Why a game ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EndReason {
    /// The round timer ran out
    TimeUp,
    /// Someone ended the game explicitly
    Stopped(String),
    /// A spy guessed the agents' word
    SpyGuessedWord,
    /// The last spy guessed wrong
    SpyGuessFailed,
    /// Every spy was voted out
    AllSpiesEliminated,
    /// Spies outnumber the remaining agents
    SpiesOutnumberAgents,
}

#[derive(Debug)]
struct Round {
    assignment: Assignment,
    /// Spies still in the roster
    spies: Vec<PlayerId>,
    started_at: Instant,
    eliminated: Vec<Player>,
    last_guess: Option<String>,
}

#[derive(Debug)]
struct Vote {
    nominator: PlayerId,
    nominees: BTreeSet<PlayerId>,
    ballots: Ballots,
}

#[derive(Debug)]
enum Phase {
    Lobby,
    Waiting,
    Active(Box<Round>),
    Voting(Box<Round>, Vote),
}

impl Phase {
    fn kind(&self) -> PhaseKind {
        match self {
            Phase::Lobby => PhaseKind::Lobby,
            Phase::Waiting => PhaseKind::Waiting,
            Phase::Active(_) => PhaseKind::Active,
            Phase::Voting(_, _) => PhaseKind::Voting,
        }
    }

    fn round(&self) -> Option<&Round> {
        match self {
            Phase::Active(round) | Phase::Voting(round, _) => Some(round.as_ref()),
            Phase::Lobby | Phase::Waiting => None,
        }
    }

    fn round_mut(&mut self) -> Option<&mut Round> {
        match self {
            Phase::Active(round) | Phase::Voting(round, _) => Some(round.as_mut()),
            Phase::Lobby | Phase::Waiting => None,
        }
    }
}

/// What a player is privately told when a round starts
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleCard {
    /// Role label, the spy label for spies
    pub role: String,
    /// Whether the player is a spy
    pub spy: bool,
    /// Location name, withheld from spies without the detailed briefing
    pub location: Option<String>,
    /// Names of the other spies, for spies only
    pub fellow_spies: Vec<String>,
    /// Whether spies get the full instructions
    pub detailed_briefing: bool,
}

/// A roster entry as shown to users
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerView {
    /// 1-based number used for nominations
    pub number: usize,
    /// Player identifier
    pub id: PlayerId,
    /// Display name
    pub name: String,
}

/// Remaining time on an armed timer
#[serde_with::serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimerView {
    /// Which timer
    pub class: TimerClass,
    /// Time left before it fires
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub remaining: Duration,
}

/// Read-only projection of a session
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    /// Room the session belongs to
    pub room: RoomId,
    /// Current phase
    pub phase: PhaseKind,
    /// Roster in display order
    pub players: Vec<PlayerView>,
    /// Armed timers
    pub timers: Vec<TimerView>,
    /// Current settings
    pub settings: Settings,
    /// Spies left in the running round
    pub spies_remaining: Option<usize>,
}

impl Status {
    /// Time left on a timer, if armed
    pub fn remaining(&self, class: TimerClass) -> Option<Duration> {
        self.timers
            .iter()
            .find(|t| t.class == class)
            .map(|t| t.remaining)
    }
}

/// Ballots cast so far for one nominee
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NomineeView {
    /// Nominee identifier
    pub id: PlayerId,
    /// Nominee name
    pub name: String,
    /// Names of players supporting the elimination, in roster order
    pub support: Vec<String>,
    /// Names of players opposing the elimination, in roster order
    pub oppose: Vec<String>,
    /// Support minus oppose
    pub net: i64,
}

/// Read-only projection of an open vote
#[serde_with::serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteSnapshot {
    /// Who opened the vote
    pub nominator: PlayerId,
    /// Per-nominee ballots
    pub nominees: Vec<NomineeView>,
    /// Ballots cast
    pub ballots: usize,
    /// Players who may vote
    pub roster_size: usize,
    /// Support ballots needed to eliminate
    pub quorum: usize,
    /// Time left in the voting window
    #[serde_as(as = "Option<serde_with::DurationMilliSeconds<u64>>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<Duration>,
}

/// A player's role as revealed at the end of a game
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerRole {
    /// Display name
    pub name: String,
    /// Role label they played
    pub role: String,
    /// Whether they were eliminated before the end
    pub eliminated: bool,
}

/// Everything revealed when a game ends
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Winning side, if the game was decided
    pub winner: Option<Team>,
    /// Why the game ended
    pub reason: EndReason,
    /// Location name
    pub location: String,
    /// The agents' shared word
    pub agent_role: String,
    /// Every spy of the round, eliminated or not
    pub spies: Vec<String>,
    /// Every player's role
    pub roles: Vec<PlayerRole>,
    /// The last word a spy guessed
    pub last_guess: Option<String>,
}

/// Updates produced by session operations and alarms
///
/// These are plain values: rendering and delivering them is up to the
/// transport.
#[serde_with::serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum UpdateMessage {
    /// The lobby lacks players and will expire
    AwaitingPlayers {
        /// Time until the lobby expires
        #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
        expires_in: Duration,
    },
    /// A player joined the lobby
    PlayerJoined {
        /// Who joined
        player: PlayerId,
        /// Their name
        name: String,
        /// Roster size after joining
        count: usize,
    },
    /// A player left the lobby
    PlayerLeft {
        /// Who left
        player: PlayerId,
        /// Their name
        name: String,
        /// Roster size after leaving
        count: usize,
    },
    /// Enough players joined, the round starts automatically
    CountdownStarted {
        /// Time until the start
        #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
        starts_in: Duration,
    },
    /// The roster dropped below the minimum before the start
    CountdownCancelled,
    /// The lobby is about to expire
    LobbyExpiring {
        /// Time until expiry
        #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
        remaining: Duration,
        /// Players who joined so far
        players: Vec<String>,
    },
    /// The lobby expired without enough players and was cleared
    LobbyExpired {
        /// Players who had joined
        players: Vec<String>,
    },
    /// A round started
    RoundStarted {
        /// Round length
        #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
        duration: Duration,
        /// Number of spies
        spy_count: usize,
        /// Roster in display order
        players: Vec<String>,
        /// Private role cards to deliver
        cards: Vec<(PlayerId, RoleCard)>,
    },
    /// A player was nominated and a vote opened
    Nominated {
        /// Who nominated
        nominator: PlayerId,
        /// Who is up for elimination
        nominee: PlayerId,
        /// Length of the voting window
        #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
        window: Duration,
    },
    /// A ballot was recorded
    BallotCast {
        /// Who voted
        voter: PlayerId,
        /// What they voted
        ballot: Ballot,
        /// Whether it replaced an earlier ballot
        replaced: bool,
    },
    /// A vote closed
    VotingClosed {
        /// What the vote decided
        decision: Decision,
        /// Final ballots
        snapshot: VoteSnapshot,
    },
    /// The vote was dropped because its nominee left the round
    VotingCancelled {
        /// The nominee who is gone
        nominee: PlayerId,
    },
    /// A player was removed from the round
    PlayerEliminated {
        /// Who was removed
        player: PlayerId,
        /// Their name
        name: String,
        /// Whether they were a spy
        was_spy: bool,
        /// Roster in display order afterwards
        remaining: Vec<String>,
    },
    /// A spy guessed the agents' word
    SpyGuessed {
        /// The guessing spy
        player: PlayerId,
        /// The trimmed guess
        guess: String,
        /// Whether it matched
        correct: bool,
    },
    /// The game ended and the room is back in the lobby
    GameEnded(Box<Summary>),
    /// Settings changed
    SettingChanged(Settings),
}

impl UpdateMessage {
    /// Converts the update message to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

type Outcome = Result<Vec<UpdateMessage>, Error>;

fn verdict(spies: usize, agents: usize) -> Option<(Team, EndReason)> {
    if spies == 0 {
        Some((Team::Agents, EndReason::AllSpiesEliminated))
    } else if spies > agents {
        Some((Team::Spies, EndReason::SpiesOutnumberAgents))
    } else {
        None
    }
}

fn normalize(word: &str) -> String {
    word.trim().to_lowercase()
}

/// The state of one room
///
/// A session is created once per room and never destroyed: ending a game or
/// expiring the lobby clears the roster, the round and every timer, while the
/// settings stay. All mutations take `&mut self`, so a host serving several
/// threads wraps each session in its own lock.
///
/// Timers are scheduled through the session's [`Runtime`] and come back
/// through [`receive_alarm`](Self::receive_alarm).
pub struct Session<R: Runtime> {
    id: RoomId,
    roster: Roster,
    phase: Phase,
    settings: Settings,
    timings: Timings,
    locations: LocationTable,
    rng: fastrand::Rng,
    timers: Timers<R::Handle>,
    runtime: R,
}

impl<R: Runtime> Debug for Session<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("phase", &self.phase.kind())
            .field("roster", &self.roster)
            .finish_non_exhaustive()
    }
}

impl<R: Runtime> Session<R> {
    /// Creates an empty session in the lobby
    pub fn new(id: RoomId, config: &Config, locations: LocationTable, runtime: R) -> Self {
        Self {
            id,
            roster: Roster::default(),
            phase: Phase::Lobby,
            settings: config.settings,
            timings: config.timings,
            locations,
            rng: config.rng(),
            timers: Timers::default(),
            runtime,
        }
    }

    /// Room identifier
    pub fn id(&self) -> RoomId {
        self.id
    }

    /// Current phase
    pub fn phase(&self) -> PhaseKind {
        self.phase.kind()
    }

    /// The roster in display order
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Current settings
    pub fn settings(&self) -> Settings {
        self.settings
    }

    /// The host runtime
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// The host runtime, mutably
    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    /// Spies still playing in the running round
    pub fn spies(&self) -> &[PlayerId] {
        self.phase
            .round()
            .map(|round| round.spies.as_slice())
            .unwrap_or_default()
    }

    /// The agents' shared word in the running round
    pub fn agent_role(&self) -> Option<&str> {
        self.phase
            .round()
            .map(|round| round.assignment.agent_role.as_str())
    }

    /// When the running round started
    pub fn round_started_at(&self) -> Option<Instant> {
        self.phase.round().map(|round| round.started_at)
    }

    /// The last word a spy guessed in the running round
    pub fn last_guess(&self) -> Option<&str> {
        self.phase.round().and_then(|round| round.last_guess.as_deref())
    }

    fn in_round(&self) -> bool {
        self.phase.round().is_some()
    }

    fn arm_idle(&mut self) -> UpdateMessage {
        self.timers
            .arm(TimerClass::Idle, self.timings.idle_lobby, &mut self.runtime);
        match self.timings.idle_warning() {
            Some(after) => self
                .timers
                .arm(TimerClass::IdleWarning, after, &mut self.runtime),
            None => self.timers.cancel(TimerClass::IdleWarning, &mut self.runtime),
        }

        UpdateMessage::AwaitingPlayers {
            expires_in: self.timings.idle_lobby,
        }
    }

    fn cancel_idle(&mut self) {
        self.timers.cancel(TimerClass::Idle, &mut self.runtime);
        self.timers
            .cancel(TimerClass::IdleWarning, &mut self.runtime);
    }

    fn reset(&mut self) {
        self.timers.cancel_all(&mut self.runtime);
        self.roster.clear();
        self.phase = Phase::Lobby;
    }

    /// Opens the lobby explicitly, arming (or refreshing) its expiry
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPhase` unless the room is in the lobby.
    pub fn open_lobby(&mut self) -> Outcome {
        if !matches!(self.phase, Phase::Lobby) {
            return Err(Error::InvalidPhase(self.phase()));
        }

        tracing::info!(room = %self.id, "lobby opened");

        Ok(vec![self.arm_idle()])
    }

    /// Adds a player to the lobby
    ///
    /// Reaching the minimum roster moves the room to `Waiting` and arms the
    /// auto-start countdown.
    ///
    /// # Errors
    ///
    /// * `Error::InvalidPhase` while a round is running
    /// * `Error::AlreadyMember` if the player already joined
    /// * `Error::CapacityExceeded` if the roster is full
    pub fn join(&mut self, player: PlayerId, name: impl Into<String>) -> Outcome {
        if self.in_round() {
            return Err(Error::InvalidPhase(self.phase()));
        }

        let name = name.into();
        self.roster.add(Player::new(player, name.clone()))?;

        tracing::info!(room = %self.id, %player, count = self.roster.len(), "player joined");

        let mut messages = vec![UpdateMessage::PlayerJoined {
            player,
            name,
            count: self.roster.len(),
        }];

        if matches!(self.phase, Phase::Lobby) {
            if self.roster.len() >= constants::roster::MIN_PLAYERS {
                self.cancel_idle();
                self.timers
                    .arm(TimerClass::Autostart, self.timings.autostart, &mut self.runtime);
                self.phase = Phase::Waiting;

                tracing::info!(room = %self.id, "countdown started");

                messages.push(UpdateMessage::CountdownStarted {
                    starts_in: self.timings.autostart,
                });
            } else if !self.timers.is_armed(TimerClass::Idle) {
                messages.push(self.arm_idle());
            }
        }

        Ok(messages)
    }

    /// Removes a player from the lobby
    ///
    /// # Errors
    ///
    /// * `Error::InvalidPhase` while a round is running
    /// * `Error::NotAMember` if the player is not in the roster
    pub fn leave(&mut self, player: PlayerId) -> Outcome {
        if self.in_round() {
            return Err(Error::InvalidPhase(self.phase()));
        }

        let removed = self.roster.remove(player).ok_or(Error::NotAMember)?;

        tracing::info!(room = %self.id, %player, count = self.roster.len(), "player left");

        let mut messages = vec![UpdateMessage::PlayerLeft {
            player,
            name: removed.name().to_owned(),
            count: self.roster.len(),
        }];

        if matches!(self.phase, Phase::Waiting)
            && self.roster.len() < constants::roster::MIN_PLAYERS
        {
            self.timers
                .cancel(TimerClass::Autostart, &mut self.runtime);
            self.phase = Phase::Lobby;

            tracing::info!(room = %self.id, "countdown cancelled");

            messages.push(UpdateMessage::CountdownCancelled);
            messages.push(self.arm_idle());
        }

        Ok(messages)
    }

    /// Starts the round without waiting for the countdown
    ///
    /// # Errors
    ///
    /// * `Error::InvalidPhase` if a round is already running
    /// * `Error::BelowMinimum` if too few players joined
    pub fn request_start(&mut self) -> Outcome {
        if self.in_round() {
            return Err(Error::InvalidPhase(self.phase()));
        }

        if self.roster.len() < constants::roster::MIN_PLAYERS {
            return Err(Error::BelowMinimum);
        }

        Ok(self.start_round())
    }

    fn start_round(&mut self) -> Vec<UpdateMessage> {
        self.timers
            .cancel(TimerClass::Autostart, &mut self.runtime);
        self.cancel_idle();

        let assignment = assign::assign(
            self.roster.players(),
            &self.locations,
            self.settings.language,
            &mut self.rng,
        );

        for player in self.roster.iter_mut() {
            let role = assignment.role_for(player.id()).to_owned();
            player.set_role(role);
        }

        let duration = self.settings.round_duration();
        self.timers
            .arm(TimerClass::Round, duration, &mut self.runtime);

        let spy_count = assignment.spies.len();
        self.phase = Phase::Active(Box::new(Round {
            spies: assignment.spies.clone(),
            assignment,
            started_at: self.runtime.now(),
            eliminated: Vec::new(),
            last_guess: None,
        }));

        tracing::info!(
            room = %self.id,
            players = self.roster.len(),
            spy_count,
            minutes = self.settings.duration_minutes,
            "round started"
        );

        let cards = self
            .roster
            .iter()
            .filter_map(|p| Some((p.id(), self.role_card(p.id())?)))
            .collect_vec();

        vec![UpdateMessage::RoundStarted {
            duration,
            spy_count,
            players: self.roster.names(),
            cards,
        }]
    }

    /// Nominates a player and opens a vote on them
    ///
    /// The nominator's support ballot is cast automatically.
    ///
    /// # Errors
    ///
    /// * `Error::InvalidPhase` unless a round is running without an open vote
    /// * `Error::NotAMember` if the nominator is not playing
    /// * `Error::InvalidTarget` for self-nomination or a target outside the roster
    pub fn nominate(&mut self, nominator: PlayerId, nominee: PlayerId) -> Outcome {
        if !matches!(self.phase, Phase::Active(_)) {
            return Err(Error::InvalidPhase(self.phase()));
        }

        if !self.roster.contains(nominator) {
            return Err(Error::NotAMember);
        }

        if nominator == nominee {
            return Err(Error::InvalidTarget(Target::SelfTarget));
        }

        if !self.roster.contains(nominee) {
            return Err(Error::InvalidTarget(Target::NotInRoster));
        }

        let round = match mem::replace(&mut self.phase, Phase::Lobby) {
            Phase::Active(round) => round,
            other => {
                self.phase = other;
                return Err(Error::InvalidPhase(self.phase()));
            }
        };

        let mut ballots = Ballots::default();
        ballots.upsert(
            nominator,
            Ballot {
                target: nominee,
                kind: BallotKind::Support,
            },
        );

        self.phase = Phase::Voting(
            round,
            Vote {
                nominator,
                nominees: BTreeSet::from([nominee]),
                ballots,
            },
        );

        let window = self.timings.voting_window;
        self.timers
            .arm(TimerClass::Voting, window, &mut self.runtime);

        tracing::info!(room = %self.id, %nominator, %nominee, "vote opened");

        let mut messages = vec![UpdateMessage::Nominated {
            nominator,
            nominee,
            window,
        }];
        messages.extend(self.close_vote_if_complete());

        Ok(messages)
    }

    /// Nominates the player with the given 1-based number
    ///
    /// # Errors
    ///
    /// Same as [`nominate`](Self::nominate), plus
    /// `Error::InvalidTarget(Target::NoSuchNumber)` for an unknown number.
    pub fn nominate_number(&mut self, nominator: PlayerId, number: usize) -> Outcome {
        if !matches!(self.phase, Phase::Active(_)) {
            return Err(Error::InvalidPhase(self.phase()));
        }

        let nominee = self
            .roster
            .by_number(number)
            .map(Player::id)
            .ok_or(Error::InvalidTarget(Target::NoSuchNumber))?;

        self.nominate(nominator, nominee)
    }

    /// Records a ballot on a nominee, replacing the voter's previous one
    ///
    /// The vote closes immediately once every player has a ballot in.
    ///
    /// # Errors
    ///
    /// * `Error::InvalidPhase` unless a vote is open
    /// * `Error::NotAMember` if the voter is not playing
    /// * `Error::InvalidTarget` for a self-vote or a target that is not nominated
    pub fn cast_ballot(&mut self, voter: PlayerId, target: PlayerId, kind: BallotKind) -> Outcome {
        let phase = self.phase();
        let Phase::Voting(_, vote) = &mut self.phase else {
            return Err(Error::InvalidPhase(phase));
        };

        if !self.roster.contains(voter) {
            return Err(Error::NotAMember);
        }

        if voter == target {
            return Err(Error::InvalidTarget(Target::SelfTarget));
        }

        if !vote.nominees.contains(&target) {
            return Err(Error::InvalidTarget(if self.roster.contains(target) {
                Target::NotNominated
            } else {
                Target::NotInRoster
            }));
        }

        let ballot = Ballot { target, kind };
        let replaced = vote.ballots.upsert(voter, ballot).is_some();

        tracing::debug!(room = %self.id, %voter, %target, ?kind, replaced, "ballot cast");

        let mut messages = vec![UpdateMessage::BallotCast {
            voter,
            ballot,
            replaced,
        }];
        messages.extend(self.close_vote_if_complete());

        Ok(messages)
    }

    /// Closes the vote once ballots reach the roster size. With a single
    /// nominee, who cannot vote on themselves, this never fires.
    fn close_vote_if_complete(&mut self) -> Vec<UpdateMessage> {
        let complete = matches!(
            &self.phase,
            Phase::Voting(_, vote) if vote.ballots.len() >= self.roster.len()
        );

        if complete {
            self.close_vote()
        } else {
            Vec::new()
        }
    }

    fn end_vote(&mut self) -> Option<Vote> {
        match mem::replace(&mut self.phase, Phase::Lobby) {
            Phase::Voting(round, vote) => {
                self.phase = Phase::Active(round);
                self.timers
                    .cancel(TimerClass::Voting, &mut self.runtime);
                Some(vote)
            }
            other => {
                self.phase = other;
                None
            }
        }
    }

    fn close_vote(&mut self) -> Vec<UpdateMessage> {
        let Some(snapshot) = self.vote_snapshot() else {
            return Vec::new();
        };
        let Some(vote) = self.end_vote() else {
            return Vec::new();
        };

        let decision = tally::tally(&vote.ballots, &vote.nominees, self.roster.len())
            .decide(tally::quorum(self.roster.len()));

        tracing::info!(room = %self.id, ?decision, ballots = vote.ballots.len(), "vote closed");

        let eliminated = match &decision {
            Decision::Eliminate { target, .. } => Some(*target),
            _ => None,
        };

        let mut messages = vec![UpdateMessage::VotingClosed { decision, snapshot }];
        if let Some(target) = eliminated {
            messages.extend(self.eliminate(target));
        }

        messages
    }

    fn eliminate(&mut self, id: PlayerId) -> Vec<UpdateMessage> {
        let Some(round) = self.phase.round_mut() else {
            return Vec::new();
        };
        let Some(player) = self.roster.remove(id) else {
            return Vec::new();
        };

        let was_spy = round.spies.contains(&id);
        round.spies.retain(|spy| *spy != id);
        round.eliminated.push(player.clone());
        let spies_left = round.spies.len();

        tracing::info!(room = %self.id, player = %id, was_spy, "player eliminated");

        let mut messages = vec![UpdateMessage::PlayerEliminated {
            player: id,
            name: player.name().to_owned(),
            was_spy,
            remaining: self.roster.names(),
        }];

        let vote_emptied = match &mut self.phase {
            Phase::Voting(_, vote) => {
                vote.ballots.discard(id);
                vote.nominees.remove(&id);
                vote.nominees.is_empty()
            }
            _ => false,
        };

        if vote_emptied {
            self.end_vote();
            messages.push(UpdateMessage::VotingCancelled { nominee: id });
        }

        let agents_left = self.roster.len() - spies_left;
        if let Some((winner, reason)) = verdict(spies_left, agents_left) {
            messages.extend(self.finish(Some(winner), reason));
        }

        messages
    }

    /// Resolves a spy's guess of the agents' word
    ///
    /// The comparison ignores case and surrounding whitespace. A wrong guess
    /// eliminates the guesser while another spy remains, and loses the game
    /// for the spies otherwise.
    ///
    /// # Errors
    ///
    /// * `Error::InvalidPhase` unless a round is running
    /// * `Error::NotAMember` if the player is not playing
    /// * `Error::NotASpy` if the player is an agent
    /// * `Error::OutOfRange` for a blank guess
    pub fn submit_guess(&mut self, player: PlayerId, guess: &str) -> Outcome {
        let phase = self.phase();
        let Some(round) = self.phase.round_mut() else {
            return Err(Error::InvalidPhase(phase));
        };

        if !self.roster.contains(player) {
            return Err(Error::NotAMember);
        }

        if !round.spies.contains(&player) {
            return Err(Error::NotASpy);
        }

        let guess = guess.trim();
        if guess.is_empty() {
            return Err(Error::OutOfRange);
        }

        round.last_guess = Some(guess.to_owned());
        let correct = normalize(guess) == normalize(&round.assignment.agent_role);
        let spies_left = round.spies.len();

        tracing::info!(room = %self.id, %player, correct, "spy guessed");

        let mut messages = vec![UpdateMessage::SpyGuessed {
            player,
            guess: guess.to_owned(),
            correct,
        }];

        if correct {
            messages.extend(self.finish(Some(Team::Spies), EndReason::SpyGuessedWord));
        } else if spies_left >= 2 {
            messages.extend(self.eliminate(player));
            messages.extend(self.close_vote_if_complete());
        } else {
            messages.extend(self.finish(Some(Team::Agents), EndReason::SpyGuessFailed));
        }

        Ok(messages)
    }

    /// Changes a setting between rounds
    ///
    /// # Errors
    ///
    /// * `Error::SettingLocked` while a round is running
    /// * `Error::OutOfRange` if the value is not allowed
    pub fn change_setting(&mut self, setting: Setting) -> Outcome {
        if self.in_round() {
            return Err(Error::SettingLocked);
        }

        self.settings = self.settings.with(setting)?;

        tracing::info!(room = %self.id, ?setting, "setting changed");

        Ok(vec![UpdateMessage::SettingChanged(self.settings)])
    }

    /// Ends the running game without a winner
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPhase` unless a round is running.
    pub fn end_game(&mut self, reason: impl Into<String>) -> Outcome {
        if !self.in_round() {
            return Err(Error::InvalidPhase(self.phase()));
        }

        Ok(self.finish(None, EndReason::Stopped(reason.into())))
    }

    fn finish(&mut self, winner: Option<Team>, reason: EndReason) -> Vec<UpdateMessage> {
        let Some(round) = self.phase.round() else {
            return Vec::new();
        };

        let language = self.settings.language;
        let name_of = |id: PlayerId| {
            self.roster
                .iter()
                .chain(&round.eliminated)
                .find(|p| p.id() == id)
                .map(|p| p.name().to_owned())
                .unwrap_or_default()
        };

        let roles = self
            .roster
            .iter()
            .map(|p| (p, false))
            .chain(round.eliminated.iter().map(|p| (p, true)))
            .map(|(p, eliminated)| PlayerRole {
                name: p.name().to_owned(),
                role: round.assignment.role_for(p.id()).to_owned(),
                eliminated,
            })
            .collect_vec();

        let summary = Summary {
            winner,
            reason,
            location: round.assignment.location.name(language).to_owned(),
            agent_role: round.assignment.agent_role.clone(),
            spies: round.assignment.spies.iter().map(|id| name_of(*id)).collect_vec(),
            roles,
            last_guess: round.last_guess.clone(),
        };

        tracing::info!(
            room = %self.id,
            winner = ?summary.winner,
            reason = ?summary.reason,
            "game ended"
        );

        self.reset();

        vec![UpdateMessage::GameEnded(Box::new(summary))]
    }

    /// Handles a fired timer
    ///
    /// Alarms that were superseded or cancelled are ignored, and every
    /// handler re-checks that the room is still in the state the timer was
    /// armed for.
    pub fn receive_alarm(&mut self, alarm: AlarmMessage) -> Vec<UpdateMessage> {
        if !self.timers.claim(&alarm) {
            tracing::debug!(room = %self.id, ?alarm, "stale alarm ignored");
            return Vec::new();
        }

        let lobby = matches!(self.phase, Phase::Lobby);

        match alarm.class {
            TimerClass::Autostart
                if matches!(self.phase, Phase::Waiting)
                    && self.roster.len() >= constants::roster::MIN_PLAYERS =>
            {
                self.start_round()
            }
            TimerClass::Round => self.finish(None, EndReason::TimeUp),
            TimerClass::Voting => self.close_vote(),
            TimerClass::Idle if lobby => {
                let players = self.roster.names();
                tracing::info!(room = %self.id, players = players.len(), "lobby expired");
                self.reset();
                vec![UpdateMessage::LobbyExpired { players }]
            }
            TimerClass::IdleWarning if lobby => vec![UpdateMessage::LobbyExpiring {
                remaining: self
                    .timers
                    .remaining(TimerClass::Idle, self.runtime.now())
                    .unwrap_or_default(),
                players: self.roster.names(),
            }],
            TimerClass::Autostart | TimerClass::Idle | TimerClass::IdleWarning => Vec::new(),
        }
    }

    /// The private role card of a player in the running round
    pub fn role_card(&self, player: PlayerId) -> Option<RoleCard> {
        let round = self.phase.round()?;
        if !self.roster.contains(player) {
            return None;
        }

        let language = self.settings.language;
        let location = round.assignment.location.name(language).to_owned();
        let detailed_briefing = self.settings.detailed_spy_briefing;

        Some(if round.spies.contains(&player) {
            RoleCard {
                role: round.assignment.spy_role.clone(),
                spy: true,
                location: detailed_briefing.then_some(location),
                fellow_spies: round
                    .spies
                    .iter()
                    .filter(|spy| **spy != player)
                    .filter_map(|spy| self.roster.name_of(*spy))
                    .map(str::to_owned)
                    .collect_vec(),
                detailed_briefing,
            }
        } else {
            RoleCard {
                role: round.assignment.agent_role.clone(),
                spy: false,
                location: Some(location),
                fellow_spies: Vec::new(),
                detailed_briefing,
            }
        })
    }

    /// Phase, roster, timers and settings at a glance
    pub fn status(&self) -> Status {
        let now = self.runtime.now();

        Status {
            room: self.id,
            phase: self.phase(),
            players: self
                .roster
                .iter()
                .enumerate()
                .map(|(index, p)| PlayerView {
                    number: index + 1,
                    id: p.id(),
                    name: p.name().to_owned(),
                })
                .collect_vec(),
            timers: (0..TimerClass::LENGTH)
                .map(TimerClass::from_usize)
                .filter_map(|class| {
                    Some(TimerView {
                        class,
                        remaining: self.timers.remaining(class, now)?,
                    })
                })
                .collect_vec(),
            settings: self.settings,
            spies_remaining: self.phase.round().map(|round| round.spies.len()),
        }
    }

    /// The open vote, if any
    pub fn vote_snapshot(&self) -> Option<VoteSnapshot> {
        match &self.phase {
            Phase::Voting(_, vote) => Some(self.snapshot_of(vote)),
            _ => None,
        }
    }

    fn snapshot_of(&self, vote: &Vote) -> VoteSnapshot {
        let tally = tally::tally(&vote.ballots, &vote.nominees, self.roster.len());

        let voters_for = |nominee: PlayerId, kind: BallotKind| {
            self.roster
                .iter()
                .filter(|p| {
                    vote.ballots
                        .get(p.id())
                        .is_some_and(|b| b.target == nominee && b.kind == kind)
                })
                .map(|p| p.name().to_owned())
                .collect_vec()
        };

        VoteSnapshot {
            nominator: vote.nominator,
            nominees: vote
                .nominees
                .iter()
                .map(|&id| NomineeView {
                    id,
                    name: self.roster.name_of(id).unwrap_or_default().to_owned(),
                    support: voters_for(id, BallotKind::Support),
                    oppose: voters_for(id, BallotKind::Oppose),
                    net: tally.count(id).net(),
                })
                .collect_vec(),
            ballots: tally.total_ballots(),
            roster_size: self.roster.len(),
            quorum: tally::quorum(self.roster.len()),
            remaining: self
                .timers
                .remaining(TimerClass::Voting, self.runtime.now()),
        }
    }
}

//! Configuration constants for the spy room game engine
//!
//! This module contains the limits and defaults used throughout the engine
//! to keep rosters, settings and timers within consistent boundaries.

/// Roster size limits
pub mod roster {
    /// Minimum number of players needed to start a round
    pub const MIN_PLAYERS: usize = 3;
    /// Maximum number of players a room can hold
    pub const MAX_PLAYERS: usize = 8;
    /// Largest roster that still plays with a single spy
    pub const SINGLE_SPY_MAX_PLAYERS: usize = 4;
}

/// Round duration limits, in minutes
pub mod round {
    /// Shortest allowed round
    pub const MIN_DURATION_MINUTES: u8 = 1;
    /// Longest allowed round
    pub const MAX_DURATION_MINUTES: u8 = 20;
    /// Round length used by a freshly created room
    pub const DEFAULT_DURATION_MINUTES: u8 = 8;
}

/// Timer limits and defaults, in seconds
pub mod timers {
    /// Default countdown before a full enough lobby starts on its own
    pub const DEFAULT_AUTOSTART: u64 = 60;
    /// Minimum auto-start countdown
    pub const MIN_AUTOSTART: u64 = 5;
    /// Maximum auto-start countdown
    pub const MAX_AUTOSTART: u64 = 300;

    /// Default length of a voting window
    pub const DEFAULT_VOTING_WINDOW: u64 = 30;
    /// Minimum voting window
    pub const MIN_VOTING_WINDOW: u64 = 5;
    /// Maximum voting window
    pub const MAX_VOTING_WINDOW: u64 = 120;

    /// Default lifetime of a lobby that never gathers enough players
    pub const DEFAULT_IDLE_LOBBY: u64 = 120;
    /// Minimum idle lobby lifetime
    pub const MIN_IDLE_LOBBY: u64 = 30;
    /// Maximum idle lobby lifetime
    pub const MAX_IDLE_LOBBY: u64 = 900;

    /// How long before idle expiry the lobby warning fires
    pub const IDLE_WARNING_LEAD: u64 = 60;
}

/// Voting quorum parameters
pub mod voting {
    /// Quorum never drops below this many support ballots
    pub const QUORUM_FLOOR: usize = 2;
    /// Numerator of the quorum share of the roster (30%)
    pub const QUORUM_NUMERATOR: usize = 3;
    /// Denominator of the quorum share of the roster
    pub const QUORUM_DENOMINATOR: usize = 10;
}

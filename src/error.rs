//! Refusal reasons returned by session operations
//!
//! Every public operation on a [`Session`](crate::game::Session) validates its
//! input against the current state and returns one of these values instead of
//! mutating anything. The transport layer renders them as feedback.

use serde::Serialize;
use thiserror::Error;

use crate::game::PhaseKind;

/// Why a targeted action (nomination, ballot) was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, derive_more::Display)]
pub enum Target {
    /// The actor targeted themselves
    #[display("players cannot target themselves")]
    SelfTarget,
    /// The target is not among the current nominees
    #[display("that player is not nominated")]
    NotNominated,
    /// The target is not in the roster
    #[display("that player is not in the game")]
    NotInRoster,
    /// A player number outside of `1..=roster size`
    #[display("no player has that number")]
    NoSuchNumber,
}

/// Errors that can occur when operating on a room session
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The operation is not legal in the current phase
    #[error("not allowed while the room is {0}")]
    InvalidPhase(PhaseKind),
    /// The acting player is not in the roster
    #[error("player is not in this game")]
    NotAMember,
    /// The player already joined
    #[error("player already joined this game")]
    AlreadyMember,
    /// The roster is full
    #[error("the game is full")]
    CapacityExceeded,
    /// Not enough players to start
    #[error("not enough players to start")]
    BelowMinimum,
    /// The target of a nomination or ballot is invalid
    #[error("invalid target: {0}")]
    InvalidTarget(Target),
    /// Settings cannot change while a round is running
    #[error("settings are locked while a round is running")]
    SettingLocked,
    /// A setting value or key is outside of what is supported
    #[error("setting value is out of range")]
    OutOfRange,
    /// Only spies may guess the agents' word
    #[error("only a spy can guess the word")]
    NotASpy,
}

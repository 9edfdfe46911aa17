//! # Spyroom
//!
//! Rules engine for a chat-room spy deduction game. Players gather in a room,
//! most of them learn a secret location and role, one or two spies learn only
//! that they are spies. Players nominate and vote each other out while spies
//! try to guess the location word before they are caught.
//!
//! The engine is transport-agnostic: a host feeds it commands through
//! [`Session`](game::Session) operations, renders the returned
//! [`UpdateMessage`](game::UpdateMessage)s and routes timer alarms back via a
//! [`Runtime`](runtime::Runtime) implementation.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::wildcard_imports)]

pub mod assign;
pub mod config;
pub mod constants;
pub mod error;
pub mod game;
pub mod location;
pub mod player;
pub mod runtime;
pub mod settings;
pub mod store;
pub mod tally;
pub mod timer;

pub use config::{Config, ConfigError, Timings};
pub use error::Error;
pub use game::{PhaseKind, Session, UpdateMessage};
pub use location::{Location, LocationTable};
pub use player::PlayerId;
pub use runtime::{ManualRuntime, Runtime};
pub use settings::{Language, Setting, Settings};
pub use store::{RoomId, Sessions};
pub use tally::BallotKind;
pub use timer::AlarmMessage;

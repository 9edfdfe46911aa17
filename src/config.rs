//! Engine configuration
//!
//! A [`Config`] is shared by every room a host runs. It carries the timer
//! lengths, the settings new rooms start with and an optional seed for
//! reproducible games.

use garde::Validate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use web_time::Duration;

use crate::{constants::timers, settings::Settings};

type ValidationResult = garde::Result;

/// Validates that a duration falls within `[MIN_SECONDS, MAX_SECONDS]`
fn validate_duration<const MIN_SECONDS: u64, const MAX_SECONDS: u64>(
    field: &'static str,
    val: &Duration,
) -> ValidationResult {
    if (MIN_SECONDS..=MAX_SECONDS).contains(&val.as_secs()) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "{field} is outside of the bounds [{MIN_SECONDS},{MAX_SECONDS}]",
        )))
    }
}

fn validate_autostart(val: &Duration) -> ValidationResult {
    validate_duration::<{ timers::MIN_AUTOSTART }, { timers::MAX_AUTOSTART }>("autostart", val)
}

fn validate_voting_window(val: &Duration) -> ValidationResult {
    validate_duration::<{ timers::MIN_VOTING_WINDOW }, { timers::MAX_VOTING_WINDOW }>(
        "voting_window",
        val,
    )
}

fn validate_idle_lobby(val: &Duration) -> ValidationResult {
    validate_duration::<{ timers::MIN_IDLE_LOBBY }, { timers::MAX_IDLE_LOBBY }>("idle_lobby", val)
}

/// Fixed timer lengths
#[serde_with::serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Timings {
    /// Countdown from reaching the minimum roster to starting
    #[garde(custom(|v, _| validate_autostart(v)))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub autostart: Duration,
    /// How long a vote stays open
    #[garde(custom(|v, _| validate_voting_window(v)))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub voting_window: Duration,
    /// How long a lobby short of players lives
    #[garde(custom(|v, _| validate_idle_lobby(v)))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub idle_lobby: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            autostart: Duration::from_secs(timers::DEFAULT_AUTOSTART),
            voting_window: Duration::from_secs(timers::DEFAULT_VOTING_WINDOW),
            idle_lobby: Duration::from_secs(timers::DEFAULT_IDLE_LOBBY),
        }
    }
}

impl Timings {
    /// Delay from lobby opening to the expiry warning, if the lobby lives long
    /// enough for one
    pub fn idle_warning(&self) -> Option<Duration> {
        let lead = Duration::from_secs(timers::IDLE_WARNING_LEAD);
        self.idle_lobby.checked_sub(lead).filter(|d| !d.is_zero())
    }
}

/// Configuration shared by all rooms of a host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    /// Timer lengths
    #[garde(dive)]
    pub timings: Timings,
    /// Settings a new room starts with
    #[garde(dive)]
    pub settings: Settings,
    /// Seed for the random source of every room, for reproducible games
    #[garde(skip)]
    pub seed: Option<u64>,
}

/// Errors raised while loading configuration or reference data
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The input is not valid JSON for the expected shape
    #[error("failed to parse: {0}")]
    Parse(#[from] serde_json::Error),
    /// The input parsed but failed validation
    #[error("invalid configuration: {0}")]
    Invalid(#[from] garde::Report),
}

impl Config {
    /// Parses and validates a JSON configuration
    ///
    /// Missing fields take their default values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` on malformed JSON and
    /// `ConfigError::Invalid` when a value is out of bounds.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// A fresh random source for a room
    pub fn rng(&self) -> fastrand::Rng {
        match self.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::settings::Language;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timings.autostart, Duration::from_secs(60));
        assert_eq!(config.timings.voting_window, Duration::from_secs(30));
        assert_eq!(config.timings.idle_lobby, Duration::from_secs(120));
        assert_eq!(config.timings.idle_warning(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = Config::from_json(
            r#"{"timings": {"voting_window": 45000}, "settings": {"language": "ru"}, "seed": 5}"#,
        )
        .unwrap();

        assert_eq!(config.timings.voting_window, Duration::from_secs(45));
        assert_eq!(config.timings.autostart, Duration::from_secs(60));
        assert_eq!(config.settings.language, Language::Ru);
        assert_eq!(config.settings.duration_minutes, 8);
        assert_eq!(config.seed, Some(5));
    }

    #[test]
    fn test_from_json_rejects_out_of_bounds() {
        assert!(matches!(
            Config::from_json(r#"{"timings": {"autostart": 1000}}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_json(r#"{"settings": {"duration_minutes": 30}}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_json("not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_short_idle_lobby_has_no_warning() {
        let timings = Timings {
            idle_lobby: Duration::from_secs(45),
            ..Timings::default()
        };
        assert_eq!(timings.idle_warning(), None);
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let config = Config {
            seed: Some(42),
            ..Config::default()
        };
        assert_eq!(config.rng().u64(..), config.rng().u64(..));
    }
}

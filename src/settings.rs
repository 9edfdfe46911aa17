//! Per-room adjustable settings
//!
//! Settings can be changed between rounds and survive the reset that follows
//! the end of a game.

use std::str::FromStr;

use enum_map::Enum;
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::{constants, error::Error};

/// Languages the location data and role labels are available in
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Enum, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Ukrainian
    #[default]
    #[display("uk")]
    Uk,
    /// Russian
    #[display("ru")]
    Ru,
}

impl Language {
    /// The label every spy receives in place of a role
    pub fn spy_label(self) -> &'static str {
        match self {
            Self::Uk => "Шпигун",
            Self::Ru => "Шпион",
        }
    }

    /// The label agents receive when a location carries no roles
    pub fn fallback_agent_label(self) -> &'static str {
        "Агент"
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "uk" | "ua" => Ok(Self::Uk),
            "ru" => Ok(Self::Ru),
            _ => Err(Error::OutOfRange),
        }
    }
}

/// Settings of a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Settings {
    /// Length of a round in minutes
    #[garde(range(
        min = constants::round::MIN_DURATION_MINUTES,
        max = constants::round::MAX_DURATION_MINUTES
    ))]
    pub duration_minutes: u8,
    /// Language of location names and role labels
    #[garde(skip)]
    pub language: Language,
    /// Whether spies are told the location and given full instructions
    #[garde(skip)]
    pub detailed_spy_briefing: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            duration_minutes: constants::round::DEFAULT_DURATION_MINUTES,
            language: Language::default(),
            detailed_spy_briefing: true,
        }
    }
}

impl Settings {
    /// Returns a copy with the setting applied, if the result is valid
    ///
    /// # Errors
    ///
    /// Returns `Error::OutOfRange` when the resulting settings fail validation.
    pub fn with(self, setting: Setting) -> Result<Self, Error> {
        let mut next = self;
        match setting {
            Setting::Duration(minutes) => next.duration_minutes = minutes,
            Setting::Language(language) => next.language = language,
            Setting::DetailedSpyBriefing(detailed) => next.detailed_spy_briefing = detailed,
        }
        next.validate().map_err(|_| Error::OutOfRange)?;
        Ok(next)
    }

    /// Round length as a duration
    pub fn round_duration(&self) -> web_time::Duration {
        web_time::Duration::from_secs(u64::from(self.duration_minutes) * 60)
    }
}

/// A single settings change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Setting {
    /// Round length in minutes
    Duration(u8),
    /// Language of the location data
    Language(Language),
    /// Spy briefing detail
    DetailedSpyBriefing(bool),
}

impl Setting {
    /// Parses a chat-style `key value` pair
    ///
    /// # Errors
    ///
    /// Returns `Error::OutOfRange` for unknown keys and unparsable values.
    pub fn parse(key: &str, value: &str) -> Result<Self, Error> {
        let value = value.trim();
        match key.trim().to_lowercase().as_str() {
            "duration" | "time" => value
                .parse()
                .map(Self::Duration)
                .map_err(|_| Error::OutOfRange),
            "language" | "lang" => value.parse().map(Self::Language),
            "briefing" | "show_location" | "location" => parse_flag(value).map(Self::DetailedSpyBriefing),
            _ => Err(Error::OutOfRange),
        }
    }
}

fn parse_flag(value: &str) -> Result<bool, Error> {
    match value.to_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => Err(Error::OutOfRange),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.duration_minutes, 8);
        assert_eq!(settings.round_duration(), web_time::Duration::from_secs(480));
    }

    #[test]
    fn test_duration_bounds() {
        let settings = Settings::default();
        assert_eq!(settings.with(Setting::Duration(0)), Err(Error::OutOfRange));
        assert_eq!(settings.with(Setting::Duration(21)), Err(Error::OutOfRange));
        assert_eq!(
            settings.with(Setting::Duration(20)).map(|s| s.duration_minutes),
            Ok(20)
        );
        assert_eq!(
            settings.with(Setting::Duration(1)).map(|s| s.duration_minutes),
            Ok(1)
        );
    }

    #[test]
    fn test_parse_settings() {
        assert_eq!(Setting::parse("duration", " 12 "), Ok(Setting::Duration(12)));
        assert_eq!(
            Setting::parse("lang", "RU"),
            Ok(Setting::Language(Language::Ru))
        );
        assert_eq!(
            Setting::parse("briefing", "off"),
            Ok(Setting::DetailedSpyBriefing(false))
        );
        assert_eq!(Setting::parse("language", "en"), Err(Error::OutOfRange));
        assert_eq!(Setting::parse("duration", "-3"), Err(Error::OutOfRange));
        assert_eq!(Setting::parse("colour", "red"), Err(Error::OutOfRange));
    }

    #[test]
    fn test_language_labels() {
        assert_eq!(Language::Uk.spy_label(), "Шпигун");
        assert_eq!(Language::Ru.spy_label(), "Шпион");
        assert_eq!(Language::Ru.to_string(), "ru");
    }
}

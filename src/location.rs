//! Location reference data
//!
//! The location table is supplied by the host. It is read-only for the
//! lifetime of the rooms sharing it, so it is kept behind an `Arc`.

use std::sync::Arc;

use enum_map::EnumMap;
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::{config::ConfigError, settings::Language};

type ValidationResult = garde::Result;

fn validate_names(names: &EnumMap<Language, String>) -> ValidationResult {
    match names.iter().find(|(_, name)| name.trim().is_empty()) {
        Some((language, _)) => Err(garde::Error::new(format!(
            "location name is empty for {language}"
        ))),
        None => Ok(()),
    }
}

/// A place the agents share, with candidate role labels per language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Location {
    #[garde(custom(|v, _| validate_names(v)))]
    name: EnumMap<Language, String>,
    #[garde(skip)]
    roles: EnumMap<Language, Vec<String>>,
}

impl Location {
    /// Creates a location from its localized names and role lists
    pub fn new(name: EnumMap<Language, String>, roles: EnumMap<Language, Vec<String>>) -> Self {
        Self { name, roles }
    }

    /// The localized location name
    pub fn name(&self, language: Language) -> &str {
        &self.name[language]
    }

    /// Candidate agent role labels in the given language
    pub fn roles(&self, language: Language) -> &[String] {
        &self.roles[language]
    }
}

#[derive(Validate)]
struct LocationList(#[garde(length(min = 1), dive)] Vec<Location>);

/// A nonempty, validated list of locations
#[derive(Debug, Clone)]
pub struct LocationTable(Arc<[Location]>);

impl LocationTable {
    /// Validates and wraps a list of locations
    ///
    /// # Errors
    ///
    /// Returns a `garde::Report` if the list is empty or a location has an
    /// empty name.
    pub fn new(locations: Vec<Location>) -> Result<Self, garde::Report> {
        let list = LocationList(locations);
        list.validate()?;
        Ok(Self(list.0.into()))
    }

    /// Parses and validates a JSON array of locations
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` on malformed JSON and
    /// `ConfigError::Invalid` if the table fails validation.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let locations: Vec<Location> = serde_json::from_str(json)?;
        Ok(Self::new(locations)?)
    }

    /// The locations, in table order
    pub fn locations(&self) -> &[Location] {
        &self.0
    }

    /// Number of locations
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false, tables are validated to be nonempty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
pub(crate) mod tests {
    use enum_map::enum_map;

    use super::*;

    pub(crate) fn location(name: &str, roles: &[&str]) -> Location {
        let roles = roles.iter().map(|r| (*r).to_owned()).collect::<Vec<_>>();
        Location::new(
            enum_map! { _ => name.to_owned() },
            enum_map! { _ => roles.clone() },
        )
    }

    pub(crate) fn table() -> LocationTable {
        LocationTable::new(vec![
            location("Bank", &["Teller", "Guard", "Manager"]),
            location("Beach", &["Lifeguard", "Surfer"]),
            location("Theatre", &[]),
        ])
        .unwrap()
    }

    #[test]
    fn test_empty_table_is_rejected() {
        assert!(LocationTable::new(vec![]).is_err());
    }

    #[test]
    fn test_blank_name_is_rejected() {
        assert!(LocationTable::new(vec![location("  ", &["Cook"])]).is_err());
    }

    #[test]
    fn test_from_json() {
        let table = LocationTable::from_json(
            r#"[{
                "name": {"uk": "Лікарня", "ru": "Больница"},
                "roles": {"uk": ["Лікар"], "ru": ["Врач"]}
            }]"#,
        )
        .unwrap();

        assert_eq!(table.len(), 1);
        let hospital = &table.locations()[0];
        assert_eq!(hospital.name(Language::Ru), "Больница");
        assert_eq!(hospital.roles(Language::Uk), ["Лікар".to_owned()]);
    }

    #[test]
    fn test_from_json_reports_parse_errors() {
        assert!(matches!(
            LocationTable::from_json("{"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            LocationTable::from_json("[]"),
            Err(ConfigError::Invalid(_))
        ));
    }
}

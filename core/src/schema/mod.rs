//! BIDS naming rules consumed by the classifier, entity extractor and layout
//!
//! The pipeline only ever talks to [`SchemaService`]. [`BidsSchema`] is the
//! built-in implementation: a compiled-in BIDS 1.9 snapshot that can be
//! replaced by a JSON snapshot at start-up.

mod bids;

pub use bids::{BidsSchema, EntityDef, FileRule, RequirementLevel, SchemaSnapshot};

use crate::types::{Entities, IDENTITY_ENTITIES};

/// Read-only view of the BIDS naming rules
///
/// Implementations are constructed once per run and shared by reference.
pub trait SchemaService {
    /// BIDS version the rules describe
    fn bids_version(&self) -> &str;

    /// Canonical filename order of every known entity, `subject` first
    fn entity_order(&self) -> &[String];

    /// Filename key for an entity (`subject` -> `sub`); unknown entities use
    /// their first three characters
    fn entity_short_key(&self, name: &str) -> String;

    /// Entities that must be present for a datatype/suffix, identity excluded
    fn required_entities(&self, datatype: &str, suffix: &str) -> Vec<String>;

    /// Every entity allowed for a datatype/suffix, identity excluded
    fn allowed_entities(&self, datatype: &str, suffix: &str) -> Vec<String>;

    /// Checks that the suffix exists for the datatype
    ///
    /// # Errors
    ///
    /// Returns the human-readable reason when the datatype is unknown or the
    /// suffix is not defined for it.
    fn check_suffix(&self, datatype: &str, suffix: &str) -> Result<(), String>;

    /// `(is_valid, reason)` form of [`SchemaService::check_suffix`]
    fn is_valid_suffix(&self, datatype: &str, suffix: &str) -> (bool, String) {
        match self.check_suffix(datatype, suffix) {
            Ok(()) => (true, String::new()),
            Err(reason) => (false, reason),
        }
    }

    /// Lists every violation of a datatype/suffix/entity combination
    ///
    /// An invalid suffix short-circuits with that single violation. Otherwise
    /// missing required entities come first, followed by entities not
    /// allowed for the suffix. Identity keys are never reported.
    fn validate_entities(&self, datatype: &str, suffix: &str, entities: &Entities) -> Vec<String> {
        if let Err(reason) = self.check_suffix(datatype, suffix) {
            return vec![reason];
        }

        let mut violations: Vec<String> = self
            .required_entities(datatype, suffix)
            .into_iter()
            .filter(|name| !entities.contains(name))
            .map(|name| format!("{}{}", MISSING_REQUIRED_PREFIX, name))
            .collect();

        let allowed = self.allowed_entities(datatype, suffix);
        for name in entities.names() {
            if IDENTITY_ENTITIES.contains(&name) {
                continue;
            }
            if !allowed.iter().any(|a| a == name) {
                violations.push(format!(
                    "Entity '{}' not valid for {}/{}",
                    name, datatype, suffix
                ));
            }
        }

        violations
    }
}

/// Prefix of the only violation kind that blocks a record
pub const MISSING_REQUIRED_PREFIX: &str = "Missing required entity: ";

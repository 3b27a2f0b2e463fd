//! BIDS entity labels for classified records
//!
//! Each label has its own best-effort extractor in [`labels`]; the
//! [`EntityExtractor`] decides which ones to attempt, puts the result in
//! canonical order and validates it.

pub mod labels;

pub use labels::{
    extract_acquisition, extract_direction, extract_echo, extract_part, extract_reconstruction,
    extract_run, extract_task,
};

use crate::schema::{SchemaService, MISSING_REQUIRED_PREFIX};
use crate::types::{Entities, Record};
use log::{debug, warn};

/// Fills `entities` on every classified record and validates them
pub struct EntityExtractor<'a> {
    schema: &'a dyn SchemaService,
}

impl<'a> EntityExtractor<'a> {
    pub fn new(schema: &'a dyn SchemaService) -> Self {
        Self { schema }
    }

    /// Extracts the labels of one record, in canonical schema order
    ///
    /// `task` is attempted when required or for `func`; `direction` when
    /// required or for `fmap`/`dwi`. The other labels are always attempted.
    pub fn entities_for(&self, record: &Record) -> Entities {
        let required = self
            .schema
            .required_entities(&record.datatype, &record.suffix);
        let is_required = |name: &str| required.iter().any(|r| r == name);

        let mut entities = Entities::new();
        if is_required("task") || record.datatype == "func" {
            if let Some(task) = extract_task(record) {
                entities.insert("task", task);
            }
        }
        if is_required("direction") || matches!(record.datatype.as_str(), "fmap" | "dwi") {
            if let Some(direction) = extract_direction(record) {
                entities.insert("direction", direction);
            }
        }

        let optional: [(&str, fn(&Record) -> Option<String>); 5] = [
            ("acquisition", extract_acquisition),
            ("run", extract_run),
            ("echo", extract_echo),
            ("part", extract_part),
            ("reconstruction", extract_reconstruction),
        ];
        for (name, extract) in optional {
            if let Some(label) = extract(record) {
                entities.insert(name, label);
            }
        }

        entities.reordered(self.schema.entity_order())
    }

    /// Extracts and validates entities for every classified record
    ///
    /// Missing required entities become the record's blocking `error`; any
    /// other violation is kept as a validation warning. Excluded and
    /// unidentified records are passed through untouched.
    pub fn extract(&self, records: Vec<Record>) -> Vec<Record> {
        records
            .into_iter()
            .map(|mut record| {
                if !record.is_classified() {
                    return record;
                }

                record.entities = self.entities_for(&record);
                let violations = self.schema.validate_entities(
                    &record.datatype,
                    &record.suffix,
                    &record.entities,
                );
                let (missing, other): (Vec<String>, Vec<String>) = violations
                    .into_iter()
                    .partition(|v| v.starts_with(MISSING_REQUIRED_PREFIX));

                if !missing.is_empty() {
                    warn!("{}: {}", record.nifti_path.display(), missing.join("; "));
                    record.error = missing.join("; ");
                }
                for violation in other {
                    debug!("{}: {}", record.nifti_path.display(), violation);
                    if !record.validation_warnings.contains(&violation) {
                        record.validation_warnings.push(violation);
                    }
                }
                record
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::BidsSchema;
    use std::path::PathBuf;

    fn classified(description: &str, datatype: &str, suffix: &str) -> Record {
        let mut r = Record::new(PathBuf::from("/d/scan.nii.gz"));
        r.series_description = description.to_string();
        r.set_classification(datatype, suffix);
        r
    }

    #[test]
    fn test_bold_gets_task() {
        let schema = BidsSchema::builtin();
        let records = EntityExtractor::new(&schema)
            .extract(vec![classified("task-rest_bold", "func", "bold")]);
        let names: Vec<_> = records[0].entities.iter().collect();
        assert_eq!(names, vec![("task", "rest")]);
        assert!(records[0].error.is_empty());
    }

    #[test]
    fn test_canonical_order() {
        let schema = BidsSchema::builtin();
        let record = classified("task-nback_run-2_acq-mb4_bold", "func", "bold");
        let entities = EntityExtractor::new(&schema).entities_for(&record);
        let names: Vec<_> = entities.names().collect();
        assert_eq!(names, vec!["task", "acquisition", "run"]);
        assert_eq!(entities.get("run"), Some("02"));
    }

    #[test]
    fn test_missing_required_is_error() {
        let schema = BidsSchema::builtin();
        let mut record = classified("spin_echo", "fmap", "epi");
        record.protocol_name = "spin_echo".to_string();
        let records = EntityExtractor::new(&schema).extract(vec![record]);
        assert_eq!(records[0].error, "Missing required entity: direction");
        assert!(records[0].entities.is_empty());
    }

    #[test]
    fn test_invalid_entity_is_warning() {
        let schema = BidsSchema::builtin();
        let mut record = classified("gre_field_mapping", "fmap", "magnitude1");
        record.echo_number = Some(1);
        let records = EntityExtractor::new(&schema).extract(vec![record]);
        assert!(records[0].error.is_empty());
        assert_eq!(records[0].entities.get("echo"), Some("1"));
        assert_eq!(
            records[0].validation_warnings,
            vec!["Entity 'echo' not valid for fmap/magnitude1"]
        );
    }

    #[test]
    fn test_dwi_direction_fallback() {
        let schema = BidsSchema::builtin();
        let record = classified("DWI_AP", "dwi", "dwi");
        let entities = EntityExtractor::new(&schema).entities_for(&record);
        assert_eq!(entities.get("direction"), Some("AP"));
    }

    #[test]
    fn test_excluded_untouched() {
        let schema = BidsSchema::builtin();
        let mut record = Record::new(PathBuf::from("/d/loc.nii"));
        record.series_description = "localizer_run-1".to_string();
        record.mark_excluded("Excluded");
        let records = EntityExtractor::new(&schema).extract(vec![record]);
        assert!(records[0].entities.is_empty());
    }
}

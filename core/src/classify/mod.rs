//! Heuristic datatype/suffix classification
//!
//! Detection patterns live in [`rules`] as static data; [`heuristics`] runs
//! the stages (exclusion, dwi, fmap, func, anat) and [`correction`] fixes up
//! decisions that depend on sibling records.

pub mod correction;
pub mod heuristics;
pub mod rules;

pub use correction::correct_pepolar_fieldmaps;
pub use heuristics::{exclusion_reason, identify, Classification, Texts};

use crate::schema::SchemaService;
use crate::types::Record;
use log::{debug, warn};

/// Assigns datatype, suffix and exclusion status to every record
pub struct DatatypeClassifier<'a> {
    schema: &'a dyn SchemaService,
}

impl<'a> DatatypeClassifier<'a> {
    pub fn new(schema: &'a dyn SchemaService) -> Self {
        Self { schema }
    }

    /// Classifies one record in isolation
    ///
    /// Excluded records never get a datatype/suffix. A heuristic result the
    /// schema does not know is kept and annotated with a validation warning.
    /// Unmatched records are flagged unidentified and kept.
    pub fn classify_record(&self, mut record: Record) -> Record {
        let texts = Texts::from_record(&record);

        if let Some(reason) = exclusion_reason(&texts) {
            debug!("{}: {}", record.nifti_path.display(), reason);
            record.mark_excluded(reason);
            return record;
        }

        match identify(&record, &texts) {
            Some((datatype, suffix)) => {
                record.set_classification(datatype, suffix);
                match self.schema.check_suffix(datatype, suffix) {
                    Ok(()) => {
                        record.message = format!("Identified as {}/{}", datatype, suffix);
                    }
                    Err(reason) => {
                        warn!(
                            "{}: {}/{} not in schema: {}",
                            record.nifti_path.display(),
                            datatype,
                            suffix,
                            reason
                        );
                        record.message = format!(
                            "Identified as {}/{} (validation warning: {})",
                            datatype, suffix, reason
                        );
                        record.validation_warnings.push(reason);
                    }
                }
            }
            None => {
                warn!(
                    "{}: could not identify acquisition '{}'",
                    record.nifti_path.display(),
                    record.series_description
                );
                record.mark_unidentified();
            }
        }
        record
    }

    /// Classifies the batch, then runs the cross-record correction pass
    pub fn classify(&self, records: Vec<Record>) -> Vec<Record> {
        let mut records: Vec<Record> = records
            .into_iter()
            .map(|r| self.classify_record(r))
            .collect();
        let corrected = correct_pepolar_fieldmaps(&mut records);
        debug!(
            "Classified {} records ({} excluded, {} corrected)",
            records.len(),
            records.iter().filter(|r| r.exclude).count(),
            corrected
        );
        records
    }
}

use crate::extraction::discovery::natural_cmp;
use crate::extraction::identity::{sequence_subject_labels, IdentityKey};
use crate::types::Record;
use log::debug;
use std::cmp::Ordering;

/// Assigns subject and session indices in a fixed, total sort order
pub struct IdentityOrganizer;

impl IdentityOrganizer {
    /// Sort order used by every later stage
    ///
    /// (acquisition date, patient ID, patient name, acquisition time,
    /// modified series number), then the image path so the order is total.
    pub fn compare(a: &Record, b: &Record) -> Ordering {
        a.acquisition_date
            .cmp(&b.acquisition_date)
            .then_with(|| a.patient_id.cmp(&b.patient_id))
            .then_with(|| a.patient_name.cmp(&b.patient_name))
            .then_with(|| a.acquisition_time.cmp(&b.acquisition_time))
            .then_with(|| a.modified_series_number.cmp(&b.modified_series_number))
            .then_with(|| {
                natural_cmp(
                    &a.nifti_path.to_string_lossy(),
                    &b.nifti_path.to_string_lossy(),
                )
            })
    }

    /// Sorts records and assigns identity
    ///
    /// Algorithm:
    /// 1. Sort with [`IdentityOrganizer::compare`]
    /// 2. Compute auto subject labels over the sorted identity keys
    /// 3. Walk once: a new (patient ID, name, birth date) increments
    ///    `subject_index` and resets session tracking; a new acquisition date
    ///    increments `session_index`
    /// 4. Records without an explicit subject take their auto label, or the
    ///    zero-padded subject index
    pub fn organize(mut records: Vec<Record>) -> Vec<Record> {
        records.sort_by(Self::compare);

        let keys: Vec<IdentityKey> = records.iter().map(IdentityKey::from_record).collect();
        let auto_labels = sequence_subject_labels(&keys);

        let mut subject_index = 0;
        let mut session_index = 0;
        let mut prev_subject: Option<(String, String, String)> = None;
        let mut prev_session: Option<String> = None;

        for (record, auto) in records.iter_mut().zip(auto_labels) {
            let subject_key = (
                record.patient_id.clone(),
                record.patient_name.clone(),
                record.patient_birth_date.clone(),
            );
            if prev_subject.as_ref() != Some(&subject_key) {
                subject_index += 1;
                session_index = 0;
                prev_session = None;
            }
            if prev_session.as_deref() != Some(record.acquisition_date.as_str()) {
                session_index += 1;
            }

            record.subject_index = subject_index;
            record.session_index = session_index;
            record.auto_subject = auto;
            if record.subject.is_empty() {
                record.subject = if record.auto_subject.is_empty() {
                    format!("{:02}", subject_index)
                } else {
                    record.auto_subject.clone()
                };
            }

            prev_session = Some(record.acquisition_date.clone());
            prev_subject = Some(subject_key);
        }

        debug!(
            "Organized {} records into {} subjects",
            records.len(),
            subject_index
        );
        records
    }
}

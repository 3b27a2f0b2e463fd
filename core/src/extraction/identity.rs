use crate::types::{Record, DEFAULT_BIRTH_DATE, NOT_AVAILABLE};
use serde_json::Value;
use std::path::Path;

/// Extracts the label following `<prefix>-` from the first field containing it
///
/// Matching is case-insensitive and uses the last occurrence within a field.
/// The label is the run of ASCII alphanumerics right after the prefix,
/// lowercased. Fields whose label would be empty are skipped.
pub fn extract_label(prefix: &str, fields: &[&str]) -> String {
    let needle = format!("{}-", prefix.to_lowercase());
    for field in fields {
        let lower = field.to_lowercase();
        let Some(pos) = lower.rfind(&needle) else {
            continue;
        };
        let label: String = lower[pos + needle.len()..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect();
        if !label.is_empty() {
            return label;
        }
    }
    String::new()
}

/// Subject and session labels from path, patient ID and patient name, in that
/// priority
pub fn extract_subject_session(path: &str, patient_id: &str, patient_name: &str) -> (String, String) {
    let fields = [path, patient_id, patient_name];
    (extract_label("sub", &fields), extract_label("ses", &fields))
}

/// Identity used to detect subject changes in anonymised data
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub patient_id: String,
    pub patient_name: String,
    pub patient_birth_date: String,
    /// Parent directory name, only when all patient fields are anonymised
    pub folder: String,
}

impl IdentityKey {
    pub fn from_record(record: &Record) -> Self {
        let anonymised = record.patient_id == NOT_AVAILABLE
            && record.patient_name == NOT_AVAILABLE
            && record.patient_birth_date == DEFAULT_BIRTH_DATE;
        let folder = if anonymised {
            record
                .nifti_path
                .parent()
                .and_then(Path::file_name)
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string())
        } else {
            NOT_AVAILABLE.to_string()
        };

        Self {
            patient_id: record.patient_id.clone(),
            patient_name: record.patient_name.clone(),
            patient_birth_date: record.patient_birth_date.clone(),
            folder,
        }
    }
}

/// Assigns a two-digit subject label to each key in one left-to-right pass
///
/// The counter starts at "01" and advances whenever a key differs from the
/// one immediately before it. Equal keys that are not adjacent get different
/// labels.
pub fn sequence_subject_labels(keys: &[IdentityKey]) -> Vec<String> {
    let mut counter = 0usize;
    keys.iter()
        .enumerate()
        .map(|(i, key)| {
            if i == 0 || keys[i - 1] != *key {
                counter += 1;
            }
            format!("{:02}", counter)
        })
        .collect()
}

/// Renders a number without a trailing ".0"
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", (value * 100.0).round() / 100.0)
    }
}

/// Parses a DICOM age string ("034Y", "006M", "012W", "003D") into years
fn parse_dicom_age(text: &str) -> Option<f64> {
    let text = text.trim();
    let unit = text.chars().last()?;
    let digits = &text[..text.len() - unit.len_utf8()];
    let n: f64 = digits.parse().ok()?;
    match unit.to_ascii_uppercase() {
        'Y' => Some(n),
        'M' => Some(n / 12.0),
        'W' => Some(n / 52.0),
        'D' => Some(n / 365.0),
        _ => None,
    }
}

/// Derives the participant age in years
///
/// Algorithm:
/// 1. A numeric `PatientAge` (or numeric string) is used as-is
/// 2. A DICOM age string is converted to years
/// 3. Otherwise the birth year is subtracted from `current_year`
/// 4. Otherwise "n/a"
pub fn compute_age(patient_age: Option<&Value>, birth_date: &str, current_year: i32) -> String {
    match patient_age {
        Some(Value::Number(n)) => {
            if let Some(v) = n.as_f64() {
                return format_number(v);
            }
        }
        Some(Value::String(s)) => {
            if let Ok(v) = s.trim().parse::<f64>() {
                return format_number(v);
            }
            if let Some(v) = parse_dicom_age(s) {
                return format_number(v);
            }
        }
        _ => {}
    }

    if birth_date != DEFAULT_BIRTH_DATE {
        if let Some(year) = birth_date.get(..4).and_then(|y| y.parse::<i32>().ok()) {
            return (current_year - year).to_string();
        }
    }

    NOT_AVAILABLE.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;
    use std::path::PathBuf;

    #[rstest]
    #[case("/data/sub-01/ses-pre/anat.nii.gz", "n/a", "n/a", "01", "pre")]
    #[case("/data/SUB-Alpha_ses-2/scan.nii", "n/a", "n/a", "alpha", "2")]
    #[case("/data/scan.nii", "sub-007", "n/a", "007", "")]
    #[case("/data/scan.nii", "n/a", "Study^ses-B", "", "b")]
    #[case("/data/sub-01/old/sub-02/x.nii", "n/a", "n/a", "02", "")]
    #[case("/data/sub-/x.nii", "sub-5", "n/a", "5", "")]
    #[case("/data/x.nii", "n/a", "n/a", "", "")]
    fn test_extract_subject_session(
        #[case] path: &str,
        #[case] patient_id: &str,
        #[case] patient_name: &str,
        #[case] subject: &str,
        #[case] session: &str,
    ) {
        assert_eq!(
            extract_subject_session(path, patient_id, patient_name),
            (subject.to_string(), session.to_string())
        );
    }

    fn key(id: &str) -> IdentityKey {
        IdentityKey {
            patient_id: id.to_string(),
            patient_name: "n/a".to_string(),
            patient_birth_date: "00000000".to_string(),
            folder: "n/a".to_string(),
        }
    }

    #[test]
    fn test_sequence_subject_labels() {
        let keys = vec![key("a"), key("a"), key("b"), key("b"), key("a"), key("c")];
        assert_eq!(
            sequence_subject_labels(&keys),
            vec!["01", "01", "02", "02", "03", "04"]
        );
        assert!(sequence_subject_labels(&[]).is_empty());
    }

    #[test]
    fn test_identity_key_folder_only_when_anonymised() {
        let mut record = Record::new(PathBuf::from("/data/scanA/img.nii"));
        assert_eq!(IdentityKey::from_record(&record).folder, "scanA");

        record.patient_id = "P1".to_string();
        assert_eq!(IdentityKey::from_record(&record).folder, "n/a");
    }

    #[rstest]
    #[case(Some(json!(34)), "00000000", "34")]
    #[case(Some(json!(34.5)), "00000000", "34.5")]
    #[case(Some(json!("034Y")), "00000000", "34")]
    #[case(Some(json!("018M")), "00000000", "1.5")]
    #[case(None, "19900115", "36")]
    #[case(Some(json!("unknown")), "19900115", "36")]
    #[case(None, "00000000", "n/a")]
    #[case(None, "abcd0101", "n/a")]
    fn test_compute_age(#[case] age: Option<Value>, #[case] birth: &str, #[case] expected: &str) {
        assert_eq!(compute_age(age.as_ref(), birth, 2026), expected);
    }
}

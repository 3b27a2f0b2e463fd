use serde_json::{Map, Value};

// Patient fields
pub const PATIENT_ID: &str = "PatientID";
pub const PATIENT_NAME: &str = "PatientName";
pub const PATIENT_BIRTH_DATE: &str = "PatientBirthDate";
pub const PATIENT_SEX: &str = "PatientSex";
pub const PATIENT_AGE: &str = "PatientAge";
pub const PATIENT_SPECIES: &str = "PatientSpecies";
pub const PATIENT_HANDEDNESS: &str = "PatientHandedness";

// Series fields
pub const MODALITY: &str = "Modality";
pub const MANUFACTURER: &str = "Manufacturer";
pub const SERIES_NUMBER: &str = "SeriesNumber";
pub const SERIES_DESCRIPTION: &str = "SeriesDescription";
pub const PROTOCOL_NAME: &str = "ProtocolName";
pub const IMAGE_TYPE: &str = "ImageType";

// Timing fields
pub const ACQUISITION_DATE_TIME: &str = "AcquisitionDateTime";
pub const ACQUISITION_DATE: &str = "AcquisitionDate";
pub const ACQUISITION_TIME: &str = "AcquisitionTime";

// Sequence fields
pub const REPETITION_TIME: &str = "RepetitionTime";
pub const ECHO_TIME: &str = "EchoTime";
pub const ECHO_NUMBER: &str = "EchoNumber";
pub const INVERSION_TIME: &str = "InversionTime";
pub const PHASE_ENCODING_DIRECTION: &str = "PhaseEncodingDirection";

// Provenance fields
pub const CONVERSION_SOFTWARE: &str = "ConversionSoftware";
pub const CONVERSION_SOFTWARE_VERSION: &str = "ConversionSoftwareVersion";

/// Helper to get a string value from a sidecar field
///
/// Numbers are rendered as text. Returns `None` if the field is absent,
/// null or an empty string.
pub fn get_string_value(sidecar: &Map<String, Value>, field: &str) -> Option<String> {
    match sidecar.get(field)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Helper to get a float value from a sidecar field
///
/// Accepts JSON numbers and numeric strings.
pub fn get_f64_value(sidecar: &Map<String, Value>, field: &str) -> Option<f64> {
    match sidecar.get(field)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Helper to get an integer value from a sidecar field
///
/// Integral floats (`2.0`) are accepted; fractional values are not.
pub fn get_i64_value(sidecar: &Map<String, Value>, field: &str) -> Option<i64> {
    match sidecar.get(field)? {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Helper to get a multi-valued string field
///
/// Arrays yield their string members; a single string is split on the DICOM
/// backslash separator.
pub fn get_multi_string_value(sidecar: &Map<String, Value>, field: &str) -> Option<Vec<String>> {
    match sidecar.get(field)? {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s.trim().to_string()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
        ),
        Value::String(s) => Some(s.split('\\').map(|p| p.trim().to_string()).collect()),
        _ => None,
    }
}

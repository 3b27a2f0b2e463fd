use crate::error::Result;
use crate::extraction::direction::phase_encoding_label;
use crate::extraction::discovery::{natural_sort, FileInventory};
use crate::extraction::identity::{compute_age, extract_subject_session};
use crate::extraction::nifti::NiftiHeader;
use crate::extraction::sidecar::*;
use crate::types::{
    ImageType, Record, DEFAULT_ACQUISITION_DATE, DEFAULT_ACQUISITION_TIME, DEFAULT_BIRTH_DATE,
    NOT_AVAILABLE,
};
use chrono::Datelike;
use log::{debug, info, warn};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Value written to `ConversionSoftware` in synthetic sidecars
pub const SYNTHETIC_SOFTWARE: &str = "bidsmap";

/// Builds one [`Record`] per image file
///
/// Nothing here is fatal for a single image: a missing or unreadable sidecar
/// is replaced by a synthetic one and an unreadable header falls back to a
/// 3D single-volume image with unknown orientation.
///
/// # Example
///
/// ```no_run
/// use bidsmap_core::extraction::{FileInventory, MetadataExtractor};
/// use std::path::Path;
///
/// let inventory = FileInventory::scan(Path::new("/data/nifti")).unwrap();
/// let records = MetadataExtractor::new().extract_all(&inventory);
/// for record in &records {
///     println!("{} -> {}", record.nifti_path.display(), record.series_description);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    current_year: i32,
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataExtractor {
    /// Creates an extractor using the local calendar year for age estimates
    pub fn new() -> Self {
        Self {
            current_year: chrono::Local::now().year(),
        }
    }

    /// Builder: Fix the year used for birth-date age estimates
    pub fn with_current_year(mut self, year: i32) -> Self {
        self.current_year = year;
        self
    }

    /// Scans a directory and extracts every image found
    pub fn extract_dir(&self, root: &Path) -> Result<Vec<Record>> {
        let inventory = FileInventory::scan(root)?;
        Ok(self.extract_all(&inventory))
    }

    /// Extracts every image of an inventory, in inventory order
    pub fn extract_all(&self, inventory: &FileInventory) -> Vec<Record> {
        let records: Vec<Record> = inventory
            .images
            .iter()
            .map(|image| {
                self.extract(
                    image,
                    inventory.match_sidecar(image),
                    inventory.companions_for(image),
                )
            })
            .collect();
        info!("Extracted metadata for {} images", records.len());
        records
    }

    /// Extracts one record from an image, its sidecar and companion files
    pub fn extract(&self, image: &Path, sidecar_path: Option<&Path>, companions: Vec<PathBuf>) -> Record {
        let mut record = Record::new(image.to_path_buf());

        record.sidecar = match sidecar_path {
            Some(path) => match load_sidecar(path) {
                Some(map) => {
                    record.sidecar_path = Some(path.to_path_buf());
                    map
                }
                None => synthetic_sidecar(),
            },
            None => {
                warn!("No sidecar for {}, using defaults", image.display());
                synthetic_sidecar()
            }
        };

        self.apply_sidecar(&mut record);
        apply_header(&mut record);

        record.direction = phase_encoding_label(
            &record.phase_encoding_direction,
            record.orientation.as_deref(),
        );
        record.filesize = std::fs::metadata(image).map(|m| m.len()).unwrap_or(0);

        let path_text = image.to_string_lossy();
        let (subject, session) =
            extract_subject_session(&path_text, &record.patient_id, &record.patient_name);
        record.subject = subject;
        record.session = session;

        let mut paths = vec![image.to_path_buf()];
        paths.extend(record.sidecar_path.clone());
        paths.extend(companions);
        natural_sort(&mut paths);
        record.paths = paths;

        record
    }

    /// Copies sidecar fields onto the record, applying anonymised defaults
    fn apply_sidecar(&self, record: &mut Record) {
        let s = &record.sidecar;
        let text = |field: &str, default: &str| {
            get_string_value(s, field).unwrap_or_else(|| default.to_string())
        };

        let modality = text(MODALITY, "MR");
        let patient_id = text(PATIENT_ID, NOT_AVAILABLE);
        let patient_name = text(PATIENT_NAME, NOT_AVAILABLE);
        let birth_date = text(PATIENT_BIRTH_DATE, DEFAULT_BIRTH_DATE).replace('-', "");
        let patient_sex = text(PATIENT_SEX, NOT_AVAILABLE);
        let species = text(PATIENT_SPECIES, NOT_AVAILABLE);
        let handedness = text(PATIENT_HANDEDNESS, NOT_AVAILABLE);
        let manufacturer = text(MANUFACTURER, NOT_AVAILABLE);
        let mut description = text(SERIES_DESCRIPTION, NOT_AVAILABLE);
        let protocol = text(PROTOCOL_NAME, NOT_AVAILABLE);
        let age = compute_age(s.get(PATIENT_AGE), &birth_date, self.current_year);

        let (split_date, split_time) = get_string_value(s, ACQUISITION_DATE_TIME)
            .and_then(|dt| {
                dt.split_once('T')
                    .map(|(d, t)| (d.to_string(), t.to_string()))
            })
            .unzip();
        let acquisition_date = get_string_value(s, ACQUISITION_DATE)
            .or(split_date)
            .unwrap_or_else(|| DEFAULT_ACQUISITION_DATE.to_string());
        let acquisition_time = get_string_value(s, ACQUISITION_TIME)
            .or(split_time)
            .unwrap_or_else(|| DEFAULT_ACQUISITION_TIME.to_string());

        if description == NOT_AVAILABLE && protocol == NOT_AVAILABLE {
            description = record.nifti_path.to_string_lossy().to_string();
        }

        let series_number = get_i64_value(s, SERIES_NUMBER).unwrap_or(0);

        record.repetition_time = get_f64_value(s, REPETITION_TIME).unwrap_or(0.0);
        record.echo_time = get_f64_value(s, ECHO_TIME).unwrap_or(0.0);
        record.echo_number = get_i64_value(s, ECHO_NUMBER);
        record.image_type = ImageType::new(get_multi_string_value(s, IMAGE_TYPE).unwrap_or_default());
        record.phase_encoding_direction =
            get_string_value(s, PHASE_ENCODING_DIRECTION).unwrap_or_default();

        record.modality = modality;
        record.patient_id = patient_id;
        record.patient_name = patient_name;
        record.patient_birth_date = birth_date;
        record.patient_sex = patient_sex;
        record.patient_age = age;
        record.species = species;
        record.handedness = handedness;
        record.manufacturer = manufacturer;
        record.series_description = description;
        record.protocol_name = protocol;
        record.acquisition_date = acquisition_date;
        record.acquisition_time = acquisition_time;
        record.series_number = series_number;
        record.modified_series_number = modified_series_number(series_number);
    }
}

/// Sort-friendly series number: two-digit padded below 100
pub fn modified_series_number(series_number: i64) -> String {
    if series_number < 100 {
        format!("{:02}", series_number)
    } else {
        series_number.to_string()
    }
}

/// Sidecar substituted when none exists or it cannot be parsed
pub fn synthetic_sidecar() -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(
        CONVERSION_SOFTWARE.to_string(),
        Value::String(SYNTHETIC_SOFTWARE.to_string()),
    );
    map.insert(
        CONVERSION_SOFTWARE_VERSION.to_string(),
        Value::String(env!("CARGO_PKG_VERSION").to_string()),
    );
    map
}

fn load_sidecar(path: &Path) -> Option<Map<String, Value>> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            warn!("Cannot read sidecar {}: {}", path.display(), e);
            return None;
        }
    };
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => {
            warn!("Sidecar {} is not a JSON object", path.display());
            None
        }
        Err(e) => {
            warn!("Cannot parse sidecar {}: {}", path.display(), e);
            None
        }
    }
}

/// Fills header-derived fields, degrading to 3D/1 volume on failure
fn apply_header(record: &mut Record) {
    match NiftiHeader::from_file(&record.nifti_path) {
        Ok(header) => {
            record.ndim = header.ndim();
            record.num_volumes = header.num_volumes();
            record.orientation = header.orientation();
            if record.repetition_time == 0.0 {
                if let Some(tr) = header.repetition_time() {
                    debug!(
                        "Backfilling RepetitionTime={} from header of {}",
                        tr,
                        record.nifti_path.display()
                    );
                    record.repetition_time = tr;
                    if let Some(number) = serde_json::Number::from_f64(tr) {
                        record
                            .sidecar
                            .insert(REPETITION_TIME.to_string(), Value::Number(number));
                    }
                }
            }
        }
        Err(e) => {
            warn!(
                "Unreadable image header {}: {}",
                record.nifti_path.display(),
                e
            );
            record.ndim = 3;
            record.num_volumes = 1;
            record.orientation = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn write_json(path: &Path, value: Value) {
        fs::write(path, serde_json::to_string(&value).unwrap()).unwrap();
    }

    #[test]
    fn test_modified_series_number() {
        assert_eq!(modified_series_number(3), "03");
        assert_eq!(modified_series_number(42), "42");
        assert_eq!(modified_series_number(1001), "1001");
    }

    #[test]
    fn test_synthetic_sidecar_when_missing() {
        let tmp = TempDir::new().unwrap();
        let image = tmp.path().join("scan.nii");
        fs::write(&image, b"garbage").unwrap();

        let record = MetadataExtractor::new().extract(&image, None, Vec::new());
        assert!(record.sidecar_path.is_none());
        assert_eq!(record.sidecar[CONVERSION_SOFTWARE], json!("bidsmap"));
        assert_eq!(record.modality, "MR");
        assert_eq!(record.patient_id, "n/a");
        // description falls back to the image path
        assert_eq!(record.series_description, image.to_string_lossy());
        // unreadable header
        assert_eq!(record.ndim, 3);
        assert_eq!(record.num_volumes, 1);
        assert!(record.orientation.is_none());
        assert_eq!(record.direction, "");
        assert_eq!(record.paths, vec![image.clone()]);
        assert_eq!(record.filesize, 7);
    }

    #[test]
    fn test_sidecar_fields_and_defaults() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("sub-07").join("ses-Pre");
        fs::create_dir_all(&dir).unwrap();
        let image = dir.join("bold.nii.gz");
        fs::write(&image, b"").unwrap();
        let json_path = dir.join("bold.json");
        write_json(
            &json_path,
            json!({
                "SeriesDescription": "task-rest_bold",
                "SeriesNumber": 4,
                "PatientBirthDate": "1990-01-15",
                "AcquisitionDateTime": "2024-03-01T10:15:30.500000",
                "RepetitionTime": 2.0,
                "EchoTime": 0.03,
                "ImageType": ["ORIGINAL", "PRIMARY", "M", "ND"],
                "PhaseEncodingDirection": "j-"
            }),
        );
        let bvec = dir.join("bold.bvec");

        let record = MetadataExtractor::new()
            .with_current_year(2024)
            .extract(&image, Some(&json_path), vec![bvec.clone()]);

        assert_eq!(record.sidecar_path.as_deref(), Some(json_path.as_path()));
        assert_eq!(record.series_description, "task-rest_bold");
        assert_eq!(record.protocol_name, "n/a");
        assert_eq!(record.modified_series_number, "04");
        assert_eq!(record.patient_birth_date, "19900115");
        assert_eq!(record.patient_age, "34");
        assert_eq!(record.acquisition_date, "2024-03-01");
        assert_eq!(record.acquisition_time, "10:15:30.500000");
        assert_eq!(record.repetition_time, 2.0);
        assert_eq!(record.image_type.simple_repr(), "ORIGINAL|PRIMARY|M|ND");
        assert_eq!(record.phase_encoding_direction, "j-");
        assert_eq!(record.subject, "07");
        assert_eq!(record.session, "pre");
        assert_eq!(record.paths, vec![bvec, json_path.clone(), image.clone()]);
    }

    #[test]
    fn test_malformed_sidecar_is_replaced() {
        let tmp = TempDir::new().unwrap();
        let image = tmp.path().join("t1.nii");
        fs::write(&image, b"").unwrap();
        let json_path = tmp.path().join("t1.json");
        fs::write(&json_path, b"{ not json").unwrap();

        let record = MetadataExtractor::new().extract(&image, Some(&json_path), Vec::new());
        assert!(record.sidecar_path.is_none());
        assert_eq!(record.sidecar[CONVERSION_SOFTWARE], json!("bidsmap"));
        assert_eq!(record.paths, vec![image.clone()]);
    }
}

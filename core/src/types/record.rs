use crate::types::{Entities, ImageType};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Placeholder used for every unknown text field
pub const NOT_AVAILABLE: &str = "n/a";

/// Anonymised birth date placeholder
pub const DEFAULT_BIRTH_DATE: &str = "00000000";

/// Anonymised acquisition date placeholder
pub const DEFAULT_ACQUISITION_DATE: &str = "0000-00-00";

/// Anonymised acquisition time placeholder
pub const DEFAULT_ACQUISITION_TIME: &str = "00:00:00.000000";

/// Message attached to records no heuristic could identify
pub const UNIDENTIFIED_MESSAGE: &str = "Could not automatically identify datatype/suffix";

/// Error attached to records no heuristic could identify
pub const UNIDENTIFIED_ERROR: &str =
    "Unidentified acquisition - please set datatype and suffix manually";

/// One acquisition: a primary image file plus everything derived from it
///
/// Records are created by the metadata extractor and passed by value through
/// each pipeline stage. Identity indices are assigned exactly once by the
/// identity organizer; classification fields are owned by the classifier and
/// entity extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Primary image file (`.nii` / `.nii.gz`)
    pub nifti_path: PathBuf,

    /// Matched sidecar, `None` when a synthetic sidecar was substituted
    pub sidecar_path: Option<PathBuf>,

    /// Image, sidecar and companion files, natural-sorted
    pub paths: Vec<PathBuf>,

    /// Sidecar content (real or synthetic)
    pub sidecar: Map<String, Value>,

    // Patient
    pub patient_id: String,
    pub patient_name: String,
    pub patient_birth_date: String,
    pub patient_sex: String,
    pub patient_age: String,
    pub species: String,
    pub handedness: String,

    // Identity
    /// Explicit or auto-assigned subject label
    pub subject: String,
    /// Explicit session label, empty when none
    pub session: String,
    /// Counter label derived from the anonymised identity sequence
    pub auto_subject: String,
    pub subject_index: usize,
    pub session_index: usize,
    pub series_index: usize,

    // Acquisition
    pub series_number: i64,
    pub modified_series_number: String,
    pub series_description: String,
    pub protocol_name: String,
    pub acquisition_date: String,
    pub acquisition_time: String,
    pub modality: String,
    pub manufacturer: String,
    pub image_type: ImageType,
    pub repetition_time: f64,
    pub echo_time: f64,
    pub echo_number: Option<i64>,

    // Image header
    pub ndim: usize,
    pub num_volumes: usize,
    /// Axis codes such as "RAS"; `None` when the header could not be read
    pub orientation: Option<String>,
    pub filesize: u64,

    /// Sidecar `PhaseEncodingDirection` (e.g. "j-")
    pub phase_encoding_direction: String,
    /// Anatomical PE label (e.g. "AP"), empty when undeterminable
    pub direction: String,

    // Classification
    pub datatype: String,
    pub suffix: String,
    /// `"<datatype>/<suffix>"`, `"exclude"` or empty
    pub kind: String,
    pub entities: Entities,
    pub exclude: bool,
    pub error: String,
    pub message: String,
    pub validation_warnings: Vec<String>,
}

impl Record {
    /// Creates a record for an image with every metadata field at its default
    pub fn new(nifti_path: PathBuf) -> Self {
        Self {
            paths: vec![nifti_path.clone()],
            nifti_path,
            sidecar_path: None,
            sidecar: Map::new(),
            patient_id: NOT_AVAILABLE.to_string(),
            patient_name: NOT_AVAILABLE.to_string(),
            patient_birth_date: DEFAULT_BIRTH_DATE.to_string(),
            patient_sex: NOT_AVAILABLE.to_string(),
            patient_age: NOT_AVAILABLE.to_string(),
            species: NOT_AVAILABLE.to_string(),
            handedness: NOT_AVAILABLE.to_string(),
            subject: String::new(),
            session: String::new(),
            auto_subject: String::new(),
            subject_index: 0,
            session_index: 0,
            series_index: 0,
            series_number: 0,
            modified_series_number: "00".to_string(),
            series_description: NOT_AVAILABLE.to_string(),
            protocol_name: NOT_AVAILABLE.to_string(),
            acquisition_date: DEFAULT_ACQUISITION_DATE.to_string(),
            acquisition_time: DEFAULT_ACQUISITION_TIME.to_string(),
            modality: "MR".to_string(),
            manufacturer: NOT_AVAILABLE.to_string(),
            image_type: ImageType::default(),
            repetition_time: 0.0,
            echo_time: 0.0,
            echo_number: None,
            ndim: 3,
            num_volumes: 1,
            orientation: None,
            filesize: 0,
            phase_encoding_direction: String::new(),
            direction: String::new(),
            datatype: String::new(),
            suffix: String::new(),
            kind: String::new(),
            entities: Entities::new(),
            exclude: false,
            error: String::new(),
            message: String::new(),
            validation_warnings: Vec::new(),
        }
    }

    /// Marks the record excluded; an excluded record carries no classification
    pub fn mark_excluded(&mut self, message: impl Into<String>) {
        self.exclude = true;
        self.datatype.clear();
        self.suffix.clear();
        self.kind = "exclude".to_string();
        self.entities = Entities::new();
        self.message = message.into();
    }

    /// Sets datatype/suffix and the derived `kind`
    pub fn set_classification(&mut self, datatype: &str, suffix: &str) {
        self.exclude = false;
        self.datatype = datatype.to_string();
        self.suffix = suffix.to_string();
        self.kind = format!("{}/{}", datatype, suffix);
    }

    /// Leaves the record unclassified and flags it for manual resolution
    pub fn mark_unidentified(&mut self) {
        self.datatype.clear();
        self.suffix.clear();
        self.kind.clear();
        self.message = UNIDENTIFIED_MESSAGE.to_string();
        self.error = UNIDENTIFIED_ERROR.to_string();
    }

    /// True when the record has a datatype/suffix and is not excluded
    pub fn is_classified(&self) -> bool {
        !self.exclude && !self.datatype.is_empty() && !self.suffix.is_empty()
    }

    /// Path of a companion file with the given extension (e.g. "bvec")
    pub fn companion(&self, extension: &str) -> Option<&Path> {
        self.paths
            .iter()
            .find(|p| p.extension().is_some_and(|e| e == extension))
            .map(PathBuf::as_path)
    }

    /// Sidecar path, or where it would sit next to the image when synthetic
    pub fn json_path(&self) -> PathBuf {
        match &self.sidecar_path {
            Some(path) => path.clone(),
            None => {
                let name = self
                    .nifti_path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                let stem = name
                    .strip_suffix(".nii.gz")
                    .or_else(|| name.strip_suffix(".nii"))
                    .unwrap_or(&name);
                self.nifti_path.with_file_name(format!("{}.json", stem))
            }
        }
    }
}

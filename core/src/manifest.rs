//! JSON manifest: the analysis result consumed by the dataset writer
//!
//! Key names follow the established manifest format so that manifests can be
//! edited by hand (or by other tools) and fed back to `bidsmap apply`.

use crate::error::{BidsmapError, Result};
use crate::extraction::sidecar::{get_string_value, ACQUISITION_DATE_TIME};
use crate::organize::SeriesView;
use crate::schema::MISSING_REQUIRED_PREFIX;
use crate::types::{DatasetConfig, Entities, FileKind, Record, DEFAULT_BIDS_VERSION};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// File name the manifest is saved under
pub const MANIFEST_FILE_NAME: &str = "bidsmap_core.json";

/// Tool name recorded in `GeneratedBy`
pub const GENERATOR_NAME: &str = "bidsmap";

/// Full analysis result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub readme: String,
    #[serde(default)]
    pub dataset_description: DatasetDescription,
    #[serde(default)]
    pub subjects: Vec<SubjectEntry>,
    #[serde(default)]
    pub participants_column: IndexMap<String, ParticipantColumn>,
    /// Keyed by subject index
    #[serde(default)]
    pub participants_info: IndexMap<String, IndexMap<String, String>>,
    #[serde(default)]
    pub series: Vec<SeriesEntry>,
    #[serde(default)]
    pub objects: Vec<ObjectEntry>,
    #[serde(default)]
    pub events: Map<String, Value>,
    #[serde(rename = "BIDSURI", default)]
    pub bids_uri: bool,
}

/// Contents of `dataset_description.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DatasetDescription {
    pub name: String,
    #[serde(rename = "BIDSVersion")]
    pub bids_version: String,
    pub license: String,
    pub authors: Vec<String>,
    pub acknowledgements: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub how_to_acknowledge: Option<String>,
    pub funding: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_by: Option<Vec<GeneratedBy>>,
    /// Any other field a user added by hand
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GeneratedBy {
    pub name: String,
    pub version: String,
}

impl DatasetDescription {
    pub fn from_config(config: &DatasetConfig) -> Self {
        Self {
            name: config.dataset_name().to_string(),
            bids_version: config.bids_version().to_string(),
            license: config.dataset.license.clone().unwrap_or_default(),
            authors: config.dataset.authors.clone(),
            acknowledgements: config.dataset.acknowledgements.clone().unwrap_or_default(),
            how_to_acknowledge: config.dataset.how_to_acknowledge.clone(),
            funding: config.dataset.funding.clone(),
            ..Self::default()
        }
    }

    /// Fills the fields a written dataset must carry
    pub fn with_writer_defaults(mut self) -> Self {
        if self.name.is_empty() {
            self.name = crate::types::DEFAULT_DATASET_NAME.to_string();
        }
        if self.bids_version.is_empty() {
            self.bids_version = DEFAULT_BIDS_VERSION.to_string();
        }
        if self.dataset_type.is_none() {
            self.dataset_type = Some("raw".to_string());
        }
        if self.generated_by.is_none() {
            self.generated_by = Some(vec![GeneratedBy {
                name: GENERATOR_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            }]);
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectEntry {
    pub subject: String,
    #[serde(rename = "PatientInfo")]
    pub patient_info: Vec<PatientInfo>,
    pub sessions: Vec<SessionEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PatientInfo {
    #[serde(rename = "PatientID")]
    pub patient_id: String,
    pub patient_name: String,
    pub patient_birth_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEntry {
    pub session: String,
    #[serde(rename = "AcquisitionDate")]
    pub acquisition_date: String,
    #[serde(rename = "AcquisitionTime")]
    pub acquisition_time: String,
}

/// One `participants.json` column definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParticipantColumn {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub levels: Option<IndexMap<String, String>>,
}

/// One unique series and the objects belonging to it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesEntry {
    pub series_idx: usize,
    #[serde(rename = "SeriesDescription")]
    pub series_description: String,
    #[serde(rename = "ProtocolName")]
    pub protocol_name: String,
    #[serde(rename = "Modality")]
    pub modality: String,
    #[serde(rename = "ImageType")]
    pub image_type: Vec<String>,
    #[serde(rename = "RepetitionTime")]
    pub repetition_time: f64,
    #[serde(rename = "EchoTime")]
    pub echo_time: f64,
    #[serde(rename = "NumVolumes")]
    pub num_volumes: usize,
    #[serde(rename = "PED")]
    pub ped: String,
    pub nifti_path: String,
    #[serde(rename = "AcquisitionDateTime")]
    pub acquisition_date_time: String,
    pub datatype: String,
    pub suffix: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub entities: Entities,
    pub error: String,
    pub message: String,
    #[serde(rename = "IntendedFor")]
    pub intended_for: Option<Vec<usize>>,
    #[serde(rename = "B0FieldIdentifier")]
    pub b0_field_identifier: Option<String>,
    #[serde(rename = "B0FieldSource")]
    pub b0_field_source: Option<String>,
    pub object_indices: Vec<usize>,
}

/// A file belonging to an object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub path: String,
    /// Extension without the leading dot (`nii.gz`, `json`, ...)
    pub name: String,
    /// Sidecar content, present on `json` items only
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sidecar: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisResults {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(rename = "NumVolumes")]
    pub num_volumes: usize,
    pub filesize: u64,
    pub orientation: Option<String>,
    pub section_id: u32,
}

/// Authoritative per-record classification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectEntry {
    pub idx: usize,
    pub series_idx: usize,
    pub subject_idx: usize,
    pub session_idx: usize,
    #[serde(rename = "SeriesDescription")]
    pub series_description: String,
    #[serde(rename = "SeriesNumber")]
    pub series_number: i64,
    #[serde(rename = "ModifiedSeriesNumber")]
    pub modified_series_number: String,
    #[serde(rename = "AcquisitionDate")]
    pub acquisition_date: String,
    #[serde(rename = "AcquisitionTime")]
    pub acquisition_time: String,
    pub nifti_path: String,
    #[serde(rename = "PED")]
    pub ped: String,
    pub datatype: String,
    pub suffix: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub entities: Entities,
    /// `subject`, `session` and every entity, as used for naming
    #[serde(rename = "_entities")]
    pub naming_entities: IndexMap<String, String>,
    /// `type`, else `datatype/suffix`, else `exclude`
    #[serde(rename = "_type")]
    pub naming_type: String,
    pub exclude: bool,
    pub error: String,
    pub message: String,
    #[serde(rename = "IntendedFor")]
    pub intended_for: Option<Vec<usize>>,
    #[serde(rename = "B0FieldIdentifier")]
    pub b0_field_identifier: Option<String>,
    #[serde(rename = "B0FieldSource")]
    pub b0_field_source: Option<String>,
    pub items: Vec<Item>,
    #[serde(rename = "analysisResults")]
    pub analysis_results: AnalysisResults,
    #[serde(rename = "validationErrors")]
    pub validation_errors: Vec<String>,
    #[serde(rename = "validationWarnings")]
    pub validation_warnings: Vec<String>,
}

impl ObjectEntry {
    pub fn from_record(idx: usize, record: &Record) -> Self {
        let mut naming_entities = IndexMap::new();
        naming_entities.insert("subject".to_string(), record.subject.clone());
        naming_entities.insert("session".to_string(), record.session.clone());
        for (name, label) in record.entities.iter() {
            naming_entities.insert(name.to_string(), label.to_string());
        }

        let naming_type = if !record.kind.is_empty() {
            record.kind.clone()
        } else if !record.datatype.is_empty() && !record.suffix.is_empty() {
            format!("{}/{}", record.datatype, record.suffix)
        } else {
            "exclude".to_string()
        };

        let items = record
            .paths
            .iter()
            .map(|path| {
                let kind = FileKind::from_path(path);
                Item {
                    path: path.to_string_lossy().to_string(),
                    name: kind.simple_name().to_string(),
                    sidecar: (kind == FileKind::Json).then(|| record.sidecar.clone()),
                }
            })
            .collect();

        let errors: Vec<String> = if record.error.is_empty() {
            Vec::new()
        } else {
            vec![record.error.clone()]
        };

        Self {
            idx,
            series_idx: record.series_index,
            subject_idx: record.subject_index,
            session_idx: record.session_index,
            series_description: record.series_description.clone(),
            series_number: record.series_number,
            modified_series_number: record.modified_series_number.clone(),
            acquisition_date: record.acquisition_date.clone(),
            acquisition_time: record.acquisition_time.clone(),
            nifti_path: record.nifti_path.to_string_lossy().to_string(),
            ped: record.direction.clone(),
            datatype: record.datatype.clone(),
            suffix: record.suffix.clone(),
            kind: record.kind.clone(),
            entities: record.entities.clone(),
            naming_entities,
            naming_type,
            exclude: record.exclude,
            error: record.error.clone(),
            message: record.message.clone(),
            intended_for: None,
            b0_field_identifier: None,
            b0_field_source: None,
            items,
            analysis_results: AnalysisResults {
                errors,
                warnings: record.validation_warnings.clone(),
                num_volumes: record.num_volumes,
                filesize: record.filesize,
                orientation: record.orientation.clone(),
                section_id: 1,
            },
            validation_errors: record
                .error
                .split("; ")
                .filter(|e| e.starts_with(MISSING_REQUIRED_PREFIX))
                .map(str::to_string)
                .collect(),
            validation_warnings: record.validation_warnings.clone(),
        }
    }

    /// `(datatype, suffix)` from `_type`, None when excluded or unresolved
    pub fn naming_pair(&self) -> Option<(&str, &str)> {
        if self.exclude || self.naming_type == "exclude" {
            return None;
        }
        self.naming_type
            .split_once('/')
            .filter(|(d, s)| !d.is_empty() && !s.is_empty())
    }

    /// `(subject, session, entities)` from `_entities`, labels reduced to
    /// ASCII alphanumerics
    pub fn naming_identity(&self) -> (String, String, Entities) {
        let label = |name: &str| {
            self.naming_entities
                .get(name)
                .map(|v| clean_label(v))
                .unwrap_or_default()
        };
        let mut subject = label("subject");
        if subject.is_empty() {
            subject = "unknown".to_string();
        }
        let session = label("session");
        let entities: Entities = self
            .naming_entities
            .iter()
            .map(|(k, v)| (k.clone(), clean_label(v)))
            .collect();
        (subject, session, entities)
    }
}

/// Keeps only the ASCII alphanumerics of a label
pub fn clean_label(label: &str) -> String {
    label.chars().filter(char::is_ascii_alphanumeric).collect()
}

impl SeriesEntry {
    pub fn from_view(view: &SeriesView<'_>) -> Self {
        let r = view.representative;
        let acquisition_date_time = get_string_value(&r.sidecar, ACQUISITION_DATE_TIME)
            .unwrap_or_else(|| format!("{}T{}", r.acquisition_date, r.acquisition_time));
        Self {
            series_idx: view.series_index,
            series_description: r.series_description.clone(),
            protocol_name: r.protocol_name.clone(),
            modality: r.modality.clone(),
            image_type: r.image_type.tags.clone(),
            repetition_time: r.repetition_time,
            echo_time: r.echo_time,
            num_volumes: r.num_volumes,
            ped: r.direction.clone(),
            nifti_path: r.nifti_path.to_string_lossy().to_string(),
            acquisition_date_time,
            datatype: r.datatype.clone(),
            suffix: r.suffix.clone(),
            kind: r.kind.clone(),
            entities: r.entities.clone(),
            error: r.error.clone(),
            message: r.message.clone(),
            intended_for: None,
            b0_field_identifier: None,
            b0_field_source: None,
            object_indices: view.object_indices.clone(),
        }
    }
}

/// Subjects in order of first appearance, with their distinct sessions
pub fn build_subjects(records: &[Record]) -> Vec<SubjectEntry> {
    let mut subjects: IndexMap<&str, SubjectEntry> = IndexMap::new();
    for record in records {
        let entry = subjects
            .entry(record.subject.as_str())
            .or_insert_with(|| SubjectEntry {
                subject: record.subject.clone(),
                patient_info: vec![PatientInfo {
                    patient_id: record.patient_id.clone(),
                    patient_name: record.patient_name.clone(),
                    patient_birth_date: record.patient_birth_date.clone(),
                }],
                sessions: Vec::new(),
            });
        if !record.session.is_empty() && !entry.sessions.iter().any(|s| s.session == record.session)
        {
            entry.sessions.push(SessionEntry {
                session: record.session.clone(),
                acquisition_date: record.acquisition_date.clone(),
                acquisition_time: record.acquisition_time.clone(),
            });
        }
    }
    subjects.into_values().collect()
}

/// Demographics per subject index, first record wins
pub fn build_participants_info(records: &[Record]) -> IndexMap<String, IndexMap<String, String>> {
    let mut info: IndexMap<String, IndexMap<String, String>> = IndexMap::new();
    for record in records {
        info.entry(record.subject_index.to_string())
            .or_insert_with(|| {
                IndexMap::from([
                    ("species".to_string(), record.species.clone()),
                    ("sex".to_string(), record.patient_sex.clone()),
                    ("age".to_string(), record.patient_age.clone()),
                    ("handedness".to_string(), record.handedness.clone()),
                ])
            });
    }
    info
}

fn column(description: &str, levels: &[(&str, &str)]) -> ParticipantColumn {
    ParticipantColumn {
        description: description.to_string(),
        levels: (!levels.is_empty()).then(|| {
            levels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        }),
    }
}

/// Standard `participants.json` columns
pub fn default_participants_column() -> IndexMap<String, ParticipantColumn> {
    IndexMap::from([
        (
            "species".to_string(),
            column("Species of participant", &[("homo sapiens", "Human")]),
        ),
        (
            "sex".to_string(),
            column(
                "Biological sex of participant",
                &[("M", "Male"), ("F", "Female")],
            ),
        ),
        ("age".to_string(), column("Age of participant in years", &[])),
        (
            "handedness".to_string(),
            column(
                "Handedness of participant",
                &[("R", "Right"), ("L", "Left"), ("A", "Ambidextrous")],
            ),
        ),
    ])
}

/// README text: the configured one, else a template naming the dataset
pub fn readme_text(config: &DatasetConfig) -> String {
    if let Some(readme) = config.readme.as_deref().filter(|r| !r.is_empty()) {
        return readme.to_string();
    }
    format!(
        "# {}\n\nThis dataset was converted to BIDS format using {}.\n\n\
         ## Description\n\nAdd your dataset description here.\n\n\
         ## License\n\nAdd license information here.\n",
        config.dataset.name.as_deref().unwrap_or("Dataset"),
        GENERATOR_NAME
    )
}

impl Manifest {
    /// Builds the manifest from final, organised records
    pub fn build(records: &[Record], config: &DatasetConfig) -> Self {
        Self {
            readme: readme_text(config),
            dataset_description: DatasetDescription::from_config(config),
            subjects: build_subjects(records),
            participants_column: default_participants_column(),
            participants_info: build_participants_info(records),
            series: SeriesView::build(records)
                .iter()
                .map(SeriesEntry::from_view)
                .collect(),
            objects: records
                .iter()
                .enumerate()
                .map(|(idx, r)| ObjectEntry::from_record(idx, r))
                .collect(),
            events: Map::new(),
            bids_uri: false,
        }
    }

    /// Loads a manifest from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            BidsmapError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes [`MANIFEST_FILE_NAME`] into a directory, creating it if needed
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(MANIFEST_FILE_NAME);
        std::fs::write(&path, self.to_json_string()?)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(path: &str, subject: &str, subject_index: usize) -> Record {
        let mut r = Record::new(PathBuf::from(path));
        r.subject = subject.to_string();
        r.subject_index = subject_index;
        r.session_index = 1;
        r
    }

    #[test]
    fn test_object_naming_fields() {
        let mut r = record("/d/bold.nii.gz", "01", 1);
        r.paths.push(PathBuf::from("/d/bold.json"));
        r.sidecar.insert("RepetitionTime".into(), json!(2.0));
        r.set_classification("func", "bold");
        r.entities.insert("task", "rest");

        let obj = ObjectEntry::from_record(0, &r);
        assert_eq!(obj.naming_type, "func/bold");
        assert_eq!(obj.naming_pair(), Some(("func", "bold")));
        let keys: Vec<_> = obj.naming_entities.keys().cloned().collect();
        assert_eq!(keys, vec!["subject", "session", "task"]);

        let (subject, session, entities) = obj.naming_identity();
        assert_eq!((subject.as_str(), session.as_str()), ("01", ""));
        assert_eq!(entities.names().collect::<Vec<_>>(), vec!["task"]);

        assert_eq!(obj.items.len(), 2);
        assert_eq!(obj.items[0].name, "nii.gz");
        assert!(obj.items[0].sidecar.is_none());
        assert_eq!(obj.items[1].name, "json");
        assert!(obj.items[1].sidecar.is_some());
    }

    #[test]
    fn test_naming_identity_cleans_edited_labels() {
        let mut obj = ObjectEntry::from_record(0, &record("/d/bold.nii.gz", "01", 1));
        obj.naming_entities.insert("subject".into(), "../01".into());
        obj.naming_entities.insert("session".into(), "pre/post".into());
        obj.naming_entities.insert("task".into(), "rest_eyes-open".into());
        obj.naming_entities.insert("acquisition".into(), "__".into());

        let (subject, session, entities) = obj.naming_identity();
        assert_eq!(subject, "01");
        assert_eq!(session, "prepost");
        assert_eq!(entities.get("task"), Some("resteyesopen"));
        assert_eq!(entities.get("acquisition"), Some(""));

        obj.naming_entities.insert("subject".into(), "/".into());
        assert_eq!(obj.naming_identity().0, "unknown");
    }

    #[test]
    fn test_excluded_and_unidentified_types() {
        let mut excluded = record("/d/loc.nii", "01", 1);
        excluded.mark_excluded("Excluded: matches localizer pattern 'localizer'");
        let obj = ObjectEntry::from_record(0, &excluded);
        assert_eq!(obj.naming_type, "exclude");
        assert_eq!(obj.naming_pair(), None);

        let mut unknown = record("/d/x.nii", "01", 1);
        unknown.mark_unidentified();
        let obj = ObjectEntry::from_record(1, &unknown);
        assert_eq!(obj.naming_type, "exclude");
        assert_eq!(obj.analysis_results.errors.len(), 1);
        assert!(obj.validation_errors.is_empty());
    }

    #[test]
    fn test_validation_errors_from_missing_required() {
        let mut r = record("/d/fm.nii", "01", 1);
        r.set_classification("fmap", "epi");
        r.error = "Missing required entity: direction".to_string();
        let obj = ObjectEntry::from_record(0, &r);
        assert_eq!(obj.validation_errors, vec!["Missing required entity: direction"]);
    }

    #[test]
    fn test_subjects_and_participants() {
        let mut a = record("/d/a.nii", "01", 1);
        a.session = "pre".to_string();
        let mut b = record("/d/b.nii", "01", 1);
        b.session = "pre".to_string();
        let mut c = record("/d/c.nii", "02", 2);
        c.patient_sex = "F".to_string();

        let records = vec![a, b, c];
        let subjects = build_subjects(&records);
        assert_eq!(subjects.len(), 2);
        assert_eq!(subjects[0].sessions.len(), 1);
        assert!(subjects[1].sessions.is_empty());

        let info = build_participants_info(&records);
        assert_eq!(info.len(), 2);
        assert_eq!(info["2"]["sex"], "F");
    }

    #[test]
    fn test_manifest_round_trip_keys() {
        let mut r = record("/d/t1.nii", "01", 1);
        r.set_classification("anat", "T1w");
        let manifest = Manifest::build(&[r], &DatasetConfig::default().with_name("Study"));
        let value: Value = serde_json::to_value(&manifest).unwrap();
        for key in [
            "readme",
            "datasetDescription",
            "subjects",
            "participantsColumn",
            "participantsInfo",
            "series",
            "objects",
            "events",
            "BIDSURI",
        ] {
            assert!(value.get(key).is_some(), "{}", key);
        }
        assert_eq!(value["datasetDescription"]["Name"], "Study");
        assert_eq!(value["datasetDescription"]["BIDSVersion"], "1.9.0");
        assert_eq!(value["objects"][0]["_type"], "anat/T1w");
        assert_eq!(value["series"][0]["object_indices"], json!([0]));
        assert!(manifest.readme.starts_with("# Study\n"));

        let parsed: Manifest = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, manifest);
    }

    #[test]
    fn test_writer_defaults() {
        let desc = DatasetDescription::default().with_writer_defaults();
        assert_eq!(desc.name, "Untitled");
        assert_eq!(desc.dataset_type.as_deref(), Some("raw"));
        assert_eq!(desc.generated_by.unwrap()[0].name, "bidsmap");
    }
}

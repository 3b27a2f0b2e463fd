use crate::error::Result;
use crate::extraction::discovery::natural_sort;
use crate::preprocess::tags::*;
use dicom_dictionary_std::tags::PIXEL_DATA;
use dicom_object::OpenFileOptions;
use indexmap::IndexMap;
use log::{debug, info, warn};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Checks if a file has a DICOM header
///
/// DICOM files typically have:
/// - 128-byte preamble
/// - 4-byte "DICM" magic string at offset 128
pub fn is_dicom_file(path: &Path) -> bool {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return false,
    };

    // Read first 132 bytes (128-byte preamble + 4-byte "DICM" magic)
    let mut buffer = [0u8; 132];
    match file.read_exact(&mut buffer) {
        Ok(()) => &buffer[128..132] == b"DICM",
        Err(_) => false,
    }
}

/// True for `.dcm` / `.dicom` / `.ima` extensions, or extension-less files
/// carrying the DICOM magic
pub fn looks_like_dicom(path: &Path) -> bool {
    match path.extension() {
        Some(ext) => ["dcm", "dicom", "ima"]
            .iter()
            .any(|e| ext.eq_ignore_ascii_case(e)),
        None => is_dicom_file(path),
    }
}

/// Recursively collects DICOM files in natural path order
pub fn collect_dicom_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if entry.file_type().is_file() && looks_like_dicom(entry.path()) {
            files.push(entry.into_path());
        }
    }
    natural_sort(&mut files);
    Ok(files)
}

/// One DICOM series found in the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DicomSeries {
    pub series_instance_uid: String,
    pub series_number: Option<i32>,
    pub series_description: String,
    pub modality: String,
    pub patient_id: String,
    pub patient_name: String,
    pub files: usize,
}

/// Series and patients present in a DICOM directory, read from headers only
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DicomInventory {
    /// Keyed by SeriesInstanceUID, in order of first file
    pub series: IndexMap<String, DicomSeries>,
    /// Files that could not be parsed
    pub unreadable: Vec<PathBuf>,
}

impl DicomInventory {
    /// Reads every DICOM header under `root`, stopping before pixel data
    pub fn scan(root: &Path) -> Result<Self> {
        let mut inventory = Self::default();
        for path in collect_dicom_files(root)? {
            match OpenFileOptions::new().read_until(PIXEL_DATA).open_file(&path) {
                Ok(dcm) => inventory.add(&dcm),
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    inventory.unreadable.push(path);
                }
            }
        }
        info!(
            "Found {} DICOM series from {} patients",
            inventory.series.len(),
            inventory.patient_count()
        );
        Ok(inventory)
    }

    /// Adds one header to the inventory
    pub fn add(&mut self, dcm: &dicom_object::InMemDicomObject) {
        let uid = get_string_value(dcm, SERIES_INSTANCE_UID).unwrap_or_default();
        let series = self
            .series
            .entry(uid.clone())
            .or_insert_with(|| DicomSeries {
                series_instance_uid: uid,
                series_number: get_int_value(dcm, SERIES_NUMBER),
                series_description: get_string_value(dcm, SERIES_DESCRIPTION)
                    .or_else(|| get_string_value(dcm, PROTOCOL_NAME))
                    .unwrap_or_default(),
                modality: get_string_value(dcm, MODALITY).unwrap_or_default(),
                patient_id: get_string_value(dcm, PATIENT_ID).unwrap_or_default(),
                patient_name: get_string_value(dcm, PATIENT_NAME).unwrap_or_default(),
                files: 0,
            });
        series.files += 1;
        debug!(
            "Series {} now has {} files",
            series.series_instance_uid, series.files
        );
    }

    /// Number of distinct (patient ID, patient name) pairs
    pub fn patient_count(&self) -> usize {
        let mut patients: Vec<(&str, &str)> = self
            .series
            .values()
            .map(|s| (s.patient_id.as_str(), s.patient_name.as_str()))
            .collect();
        patients.sort_unstable();
        patients.dedup();
        patients.len()
    }

    pub fn file_count(&self) -> usize {
        self.series.values().map(|s| s.files).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

impl fmt::Display for DicomInventory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} files, {} series, {} patients",
            self.file_count(),
            self.series.len(),
            self.patient_count()
        )?;
        for series in self.series.values() {
            let number = series
                .series_number
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string());
            writeln!(
                f,
                "  [{:>3}] {:<32} {:<4} {} file(s)",
                number, series.series_description, series.modality, series.files
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom_core::{DataElement, PrimitiveValue, VR};
    use dicom_object::InMemDicomObject;
    use std::io::Write;
    use tempfile::TempDir;

    fn header(uid: &str, description: &str, patient: &str) -> InMemDicomObject {
        let mut dcm = InMemDicomObject::new_empty();
        dcm.put(DataElement::new(
            SERIES_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from(uid),
        ));
        dcm.put(DataElement::new(
            SERIES_DESCRIPTION,
            VR::LO,
            PrimitiveValue::from(description),
        ));
        dcm.put(DataElement::new(PATIENT_ID, VR::LO, PrimitiveValue::from(patient)));
        dcm.put(DataElement::new(MODALITY, VR::CS, PrimitiveValue::from("MR")));
        dcm
    }

    #[test]
    fn test_is_dicom_file_with_valid_header() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("IM0001");
        let mut file = File::create(&path).unwrap();
        file.write_all(&[0u8; 128]).unwrap();
        file.write_all(b"DICM").unwrap();
        file.write_all(&[0u8; 16]).unwrap();
        assert!(is_dicom_file(&path));
        assert!(looks_like_dicom(&path));
    }

    #[test]
    fn test_is_dicom_file_too_small_or_wrong_magic() {
        let temp_dir = TempDir::new().unwrap();
        let small = temp_dir.path().join("small");
        std::fs::write(&small, [0u8; 64]).unwrap();
        assert!(!is_dicom_file(&small));

        let wrong = temp_dir.path().join("wrong");
        let mut bytes = vec![0u8; 128];
        bytes.extend_from_slice(b"NOPE");
        std::fs::write(&wrong, bytes).unwrap();
        assert!(!is_dicom_file(&wrong));
    }

    #[test]
    fn test_collect_by_extension() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("series2");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(temp_dir.path().join("a10.dcm"), b"x").unwrap();
        std::fs::write(temp_dir.path().join("a2.DCM"), b"x").unwrap();
        std::fs::write(nested.join("b.ima"), b"x").unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), b"x").unwrap();

        let files = collect_dicom_files(temp_dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a2.DCM", "a10.dcm", "b.ima"]);
    }

    #[test]
    fn test_inventory_groups_series() {
        let mut inventory = DicomInventory::default();
        inventory.add(&header("1.2.3", "T1_MPRAGE", "P1"));
        inventory.add(&header("1.2.3", "T1_MPRAGE", "P1"));
        inventory.add(&header("1.2.4", "rest_bold", "P1"));
        inventory.add(&header("1.2.5", "rest_bold", "P2"));

        assert_eq!(inventory.series.len(), 3);
        assert_eq!(inventory.series["1.2.3"].files, 2);
        assert_eq!(inventory.file_count(), 4);
        assert_eq!(inventory.patient_count(), 2);
        assert!(inventory.to_string().starts_with("4 files, 3 series, 2 patients"));
    }
}

//! Input preparation: DICOM detection and inventory, and the external
//! `dcm2niix` converter

pub mod dcm2niix;
pub mod dicom;
pub mod tags;

pub use dcm2niix::{find_dcm2niix, prepare_input, ConversionOutput, Dcm2niix, PreparedInput};
pub use dicom::{collect_dicom_files, is_dicom_file, looks_like_dicom, DicomInventory, DicomSeries};

use thiserror::Error;

/// Result type for bidsmap operations
pub type Result<T> = std::result::Result<T, BidsmapError>;

/// Error types for bidsmap operations
///
/// Only batch-level failures surface here. Problems confined to a single
/// record (missing sidecar, unreadable header, unidentified acquisition) are
/// recorded on the record itself and never abort the pipeline.
#[derive(Error, Debug)]
pub enum BidsmapError {
    /// NIfTI header could not be decoded
    #[error("NIfTI error: {0}")]
    NiftiError(String),

    /// DICOM reading error
    #[error("DICOM error: {0}")]
    DicomError(String),

    /// Schema snapshot could not be loaded or is inconsistent
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// External conversion process failed
    #[error("Conversion error: {0}")]
    ConversionError(String),

    /// Generic extraction error
    #[error("Extraction error: {0}")]
    ExtractionError(String),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML deserialization error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

// Helper conversions
impl From<String> for BidsmapError {
    fn from(s: String) -> Self {
        BidsmapError::ExtractionError(s)
    }
}

impl From<&str> for BidsmapError {
    fn from(s: &str) -> Self {
        BidsmapError::ExtractionError(s.to_string())
    }
}

// Convert dicom-object errors
impl From<dicom_object::ReadError> for BidsmapError {
    fn from(e: dicom_object::ReadError) -> Self {
        BidsmapError::DicomError(format!("{}", e))
    }
}

impl From<walkdir::Error> for BidsmapError {
    fn from(e: walkdir::Error) -> Self {
        BidsmapError::IoError(std::io::Error::other(e.to_string()))
    }
}

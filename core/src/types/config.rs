use crate::error::{BidsmapError, Result};
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_DATASET_NAME: &str = "Untitled";
pub const DEFAULT_BIDS_VERSION: &str = "1.9.0";

/// Dataset-level overrides applied to the manifest
///
/// Every field is optional; anything left unset falls back to the manifest
/// defaults.
///
/// # Example
///
/// ```
/// use bidsmap_core::DatasetConfig;
///
/// let config = DatasetConfig::default()
///     .with_name("Visual Cortex Study")
///     .with_authors(vec!["A. Author".to_string()]);
///
/// assert_eq!(config.dataset_name(), "Visual Cortex Study");
/// assert_eq!(config.bids_version(), "1.9.0");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// dataset_description.json overrides
    pub dataset: DatasetSection,

    /// Custom README text replacing the generated template
    pub readme: Option<String>,
}

/// The `dataset:` section of the configuration file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DatasetSection {
    pub name: Option<String>,
    pub bids_version: Option<String>,
    pub license: Option<String>,
    pub authors: Vec<String>,
    pub acknowledgements: Option<String>,
    pub how_to_acknowledge: Option<String>,
    pub funding: Vec<String>,
}

impl DatasetConfig {
    /// Loads configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML for
    /// this structure. An empty file yields the default configuration.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            BidsmapError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&text)
    }

    /// Parses configuration from YAML text
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Effective dataset name
    pub fn dataset_name(&self) -> &str {
        self.dataset.name.as_deref().unwrap_or(DEFAULT_DATASET_NAME)
    }

    /// Effective BIDS version
    pub fn bids_version(&self) -> &str {
        self.dataset
            .bids_version
            .as_deref()
            .unwrap_or(DEFAULT_BIDS_VERSION)
    }

    /// Builder: Set dataset name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.dataset.name = Some(name.into());
        self
    }

    /// Builder: Set BIDS version
    pub fn with_bids_version(mut self, version: impl Into<String>) -> Self {
        self.dataset.bids_version = Some(version.into());
        self
    }

    /// Builder: Set license
    pub fn with_license(mut self, license: impl Into<String>) -> Self {
        self.dataset.license = Some(license.into());
        self
    }

    /// Builder: Set authors
    pub fn with_authors(mut self, authors: Vec<String>) -> Self {
        self.dataset.authors = authors;
        self
    }

    /// Builder: Set custom README text
    pub fn with_readme(mut self, readme: impl Into<String>) -> Self {
        self.readme = Some(readme.into());
        self
    }
}

//! Reusable configuration export
//!
//! Turns an analysed manifest into a YAML template: the dataset block reads
//! back through [`DatasetConfig`](crate::types::DatasetConfig), and every
//! distinct series becomes one matching rule.

use crate::error::Result;
use crate::manifest::{Manifest, SeriesEntry};
use crate::types::{Entities, LinkMode};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Version written at the top of every exported configuration
pub const CONFIG_VERSION: &str = "1.0";

/// Default file name for `init-config`
pub const DEFAULT_CONFIG_FILE: &str = "bidsmap_config.yaml";

/// An exported configuration document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedConfig {
    pub version: String,
    pub dataset: ExportedDataset,
    pub series: Vec<SeriesRule>,
    pub output: OutputSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedDataset {
    pub name: String,
    pub bids_version: String,
    pub authors: Vec<String>,
    pub license: String,
}

/// One rule per distinct series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesRule {
    #[serde(rename = "match")]
    pub matcher: SeriesMatch,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<Entities>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesMatch {
    /// Regex over the series description
    pub series_description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSection {
    pub link_mode: LinkMode,
    pub validate: bool,
}

impl SeriesRule {
    /// Builds the rule for a series, or `None` when it has no description
    ///
    /// Algorithm:
    /// 1. Match on the escaped description wrapped in `.*`
    /// 2. Excluded series only carry `exclude: true`
    /// 3. Classified series carry datatype, suffix and any entities
    /// 4. Unidentified series carry the match alone
    pub fn from_series(series: &SeriesEntry) -> Option<Self> {
        if series.series_description.is_empty() {
            return None;
        }

        let mut rule = SeriesRule {
            matcher: SeriesMatch {
                series_description: format!(".*{}.*", regex::escape(&series.series_description)),
            },
            exclude: None,
            datatype: None,
            suffix: None,
            entities: None,
        };

        if series.kind == "exclude" {
            rule.exclude = Some(true);
        } else if !series.datatype.is_empty() && !series.suffix.is_empty() {
            rule.datatype = Some(series.datatype.clone());
            rule.suffix = Some(series.suffix.clone());
            if !series.entities.is_empty() {
                rule.entities = Some(series.entities.clone());
            }
        }

        Some(rule)
    }
}

impl ExportedConfig {
    /// Builds the configuration document for a manifest
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let description = &manifest.dataset_description;
        Self {
            version: CONFIG_VERSION.to_string(),
            dataset: ExportedDataset {
                name: description.name.clone(),
                bids_version: description.bids_version.clone(),
                authors: description.authors.clone(),
                license: description.license.clone(),
            },
            series: manifest
                .series
                .iter()
                .filter_map(SeriesRule::from_series)
                .collect(),
            output: OutputSection {
                link_mode: LinkMode::Hardlink,
                validate: true,
            },
        }
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Writes the configuration template for `manifest` to `path`
pub fn export_config(manifest: &Manifest, path: &Path) -> Result<()> {
    let config = ExportedConfig::from_manifest(manifest);
    let writer = BufWriter::new(File::create(path)?);
    serde_yaml::to_writer(writer, &config)?;
    info!(
        "Exported {} series rules to {}",
        config.series.len(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Pipeline;
    use crate::schema::BidsSchema;
    use crate::types::{DatasetConfig, Record};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn record(path: &str, description: &str, num_volumes: usize) -> Record {
        let mut record = Record::new(PathBuf::from(path));
        record.series_description = description.to_string();
        record.ndim = if num_volumes > 1 { 4 } else { 3 };
        record.num_volumes = num_volumes;
        record
    }

    fn manifest() -> Manifest {
        let schema = BidsSchema::builtin();
        let config = DatasetConfig::default()
            .with_name("Visual Study")
            .with_license("CC0")
            .with_authors(vec!["A. Author".to_string(), "B. Author".to_string()]);
        Pipeline::new(&schema)
            .with_config(config)
            .analyze_records(vec![
                record("/d/t1.nii.gz", "T1_MPRAGE", 1),
                record("/d/t1_repeat.nii.gz", "T1_MPRAGE", 1),
                record("/d/scout.nii", "localizer (3 plane)", 1),
            ])
            .manifest
    }

    fn rule<'a>(config: &'a ExportedConfig, pattern: &str) -> &'a SeriesRule {
        config
            .series
            .iter()
            .find(|rule| rule.matcher.series_description == pattern)
            .unwrap()
    }

    #[test]
    fn test_dataset_block_reads_back_as_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        export_config(&manifest(), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("version:"));

        let config = DatasetConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.dataset_name(), "Visual Study");
        assert_eq!(config.bids_version(), "1.9.0");
        assert_eq!(config.dataset.license.as_deref(), Some("CC0"));
        assert_eq!(config.dataset.authors, vec!["A. Author", "B. Author"]);
    }

    #[test]
    fn test_one_rule_per_series() {
        let config = ExportedConfig::from_manifest(&manifest());
        assert_eq!(config.version, "1.0");
        assert_eq!(config.series.len(), 2);
        assert_eq!(config.output.link_mode, LinkMode::Hardlink);
        assert!(config.output.validate);

        let anat = rule(&config, ".*T1_MPRAGE.*");
        assert_eq!(anat.datatype.as_deref(), Some("anat"));
        assert_eq!(anat.suffix.as_deref(), Some("T1w"));
        assert_eq!(anat.exclude, None);

        let scout = rule(&config, r".*localizer \(3 plane\).*");
        assert_eq!(scout.exclude, Some(true));
        assert!(scout.datatype.is_none());
    }

    #[test]
    fn test_yaml_shape() {
        let yaml = ExportedConfig::from_manifest(&manifest())
            .to_yaml_string()
            .unwrap();
        assert!(yaml.contains("- match:"));
        assert!(yaml.contains("exclude: true"));
        assert!(yaml.contains("link_mode: hardlink"));
        assert!(yaml.contains("validate: true"));
    }

    #[test]
    fn test_rule_carries_entities() {
        let mut series = SeriesEntry {
            series_description: "rest bold".to_string(),
            datatype: "func".to_string(),
            suffix: "bold".to_string(),
            kind: "func/bold".to_string(),
            ..Default::default()
        };
        series.entities.insert("task", "rest");
        let rule = SeriesRule::from_series(&series).unwrap();
        assert_eq!(rule.entities.unwrap().get("task"), Some("rest"));

        series.series_description.clear();
        assert!(SeriesRule::from_series(&series).is_none());
    }
}

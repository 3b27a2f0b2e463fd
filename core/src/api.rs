use crate::classify::DatatypeClassifier;
use crate::entities::EntityExtractor;
use crate::error::Result;
use crate::extraction::MetadataExtractor;
use crate::layout::{DatasetWriter, LayoutBuilder, PlannedName, WriteReport};
use crate::manifest::Manifest;
use crate::organize::{IdentityOrganizer, SeriesDeduplicator, SeriesView};
use crate::schema::SchemaService;
use crate::types::{DatasetConfig, LinkMode, Record};
use log::info;
use std::collections::BTreeSet;
use std::path::Path;

/// Runs the classification and layout stages in their fixed order
///
/// Each stage takes the records from the previous one and hands back the
/// updated records:
/// extraction, identity, series, classification, entities, layout.
///
/// # Example
///
/// ```no_run
/// use bidsmap_core::{BidsSchema, DatasetConfig, Pipeline};
/// use std::path::Path;
///
/// let schema = BidsSchema::builtin();
/// let pipeline = Pipeline::new(&schema).with_config(DatasetConfig::default().with_name("Study"));
/// let analysis = pipeline.analyze_dir(Path::new("/data/nifti")).unwrap();
///
/// for (record, planned) in analysis.records.iter().zip(&analysis.layout) {
///     if let Some(planned) = planned {
///         println!("{} -> {}", record.nifti_path.display(), planned.path(".nii.gz").display());
///     }
/// }
/// ```
pub struct Pipeline<'a> {
    schema: &'a dyn SchemaService,
    config: DatasetConfig,
    extractor: MetadataExtractor,
}

impl<'a> Pipeline<'a> {
    pub fn new(schema: &'a dyn SchemaService) -> Self {
        Self {
            schema,
            config: DatasetConfig::default(),
            extractor: MetadataExtractor::new(),
        }
    }

    /// Builder: Set dataset-level configuration
    pub fn with_config(mut self, config: DatasetConfig) -> Self {
        self.config = config;
        self
    }

    /// Builder: Replace the metadata extractor
    pub fn with_extractor(mut self, extractor: MetadataExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn schema(&self) -> &'a dyn SchemaService {
        self.schema
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// Discovers and analyses every image under `root`
    ///
    /// # Errors
    ///
    /// Returns an error only if `root` cannot be scanned; per-image problems
    /// are recorded on the records.
    pub fn analyze_dir(&self, root: &Path) -> Result<Analysis> {
        info!("Step 1/5: discovering files in {}", root.display());
        let records = self.extractor.extract_dir(root)?;
        Ok(self.analyze_records(records))
    }

    /// Runs every stage after extraction
    pub fn analyze_records(&self, records: Vec<Record>) -> Analysis {
        info!("Step 2/5: organizing {} records", records.len());
        let records = IdentityOrganizer::organize(records);
        let records = SeriesDeduplicator::assign(records);

        info!("Step 3/5: identifying datatypes and suffixes");
        let records = DatatypeClassifier::new(self.schema).classify(records);

        info!("Step 4/5: extracting entity labels");
        let records = EntityExtractor::new(self.schema).extract(records);

        info!("Step 5/5: planning output layout");
        let layout = LayoutBuilder::plan_all(self.schema, &records);
        let manifest = Manifest::build(&records, &self.config);

        Analysis {
            records,
            layout,
            manifest,
        }
    }

    /// Writes a BIDS tree from a manifest
    pub fn write(&self, manifest: &Manifest, output_root: &Path, link_mode: LinkMode) -> Result<WriteReport> {
        DatasetWriter::new(self.schema)
            .with_link_mode(link_mode)
            .write(manifest, output_root)
    }
}

/// Final records, their planned locations and the manifest built from them
#[derive(Debug, Clone)]
pub struct Analysis {
    /// In the organizer's sort order
    pub records: Vec<Record>,
    /// One entry per record; `None` for excluded or unidentified ones
    pub layout: Vec<Option<PlannedName>>,
    pub manifest: Manifest,
}

impl Analysis {
    /// Unique series over the final records
    pub fn series(&self) -> Vec<SeriesView<'_>> {
        SeriesView::build(&self.records)
    }

    pub fn subject_count(&self) -> usize {
        self.records
            .iter()
            .map(|r| r.subject_index)
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn excluded_count(&self) -> usize {
        self.records.iter().filter(|r| r.exclude).count()
    }

    /// Records that are neither excluded nor classified
    pub fn unidentified_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| !r.exclude && !r.is_classified())
            .count()
    }

    /// Records carrying a blocking error
    pub fn error_count(&self) -> usize {
        self.records.iter().filter(|r| !r.error.is_empty()).count()
    }
}

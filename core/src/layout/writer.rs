use crate::error::Result;
use crate::layout::builder::LayoutBuilder;
use crate::manifest::{Item, Manifest, ObjectEntry, MANIFEST_FILE_NAME};
use crate::schema::SchemaService;
use crate::types::{FileKind, LinkMode, NOT_AVAILABLE};
use log::{debug, info, warn};
use regex::Regex;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Outcome of writing a dataset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub dataset_dir: PathBuf,
    /// Objects that were given a location
    pub objects: usize,
    /// Files created in the tree, dataset-level files excluded
    pub written: usize,
    /// Hard links that fell back to a copy
    pub copy_fallbacks: usize,
    /// Sources that were missing or could not be linked
    pub skipped: Vec<PathBuf>,
}

impl fmt::Display for WriteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "BIDS dataset: {}", self.dataset_dir.display())?;
        writeln!(f, "  Objects:         {}", self.objects)?;
        writeln!(f, "  Files written:   {}", self.written)?;
        writeln!(f, "  Copy fallbacks:  {}", self.copy_fallbacks)?;
        write!(f, "  Skipped:         {}", self.skipped.len())?;
        for path in &self.skipped {
            write!(f, "\n    {}", path.display())?;
        }
        Ok(())
    }
}

impl WriteReport {
    /// Counts the outcome of placing one source file
    fn tally(&mut self, source: &str, destination: &Path, outcome: Result<Option<Placement>>) {
        match outcome {
            Ok(Some(placement)) => {
                self.written += 1;
                if placement == Placement::CopyFallback {
                    self.copy_fallbacks += 1;
                }
            }
            Ok(None) => self.skipped.push(PathBuf::from(source)),
            Err(e) => {
                warn!("Failed to write {}: {}", destination.display(), e);
                self.skipped.push(PathBuf::from(source));
            }
        }
    }
}

/// Outcome of placing a single file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Linked,
    Copied,
    CopyFallback,
    Serialized,
}

/// Filesystem-safe dataset directory name
pub fn sanitize_name(name: &str) -> String {
    static INVALID: OnceLock<Regex> = OnceLock::new();
    static REPEATED: OnceLock<Regex> = OnceLock::new();
    let invalid = INVALID.get_or_init(|| Regex::new(r"[^\w\-]").expect("Failed to compile regex"));
    let repeated = REPEATED.get_or_init(|| Regex::new(r"_+").expect("Failed to compile regex"));

    let replaced = invalid.replace_all(name, "_");
    let collapsed = repeated.replace_all(&replaced, "_");
    let trimmed = collapsed.trim_matches('_');
    if trimmed.is_empty() {
        "dataset".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Materialises a BIDS tree from a manifest
///
/// Dataset-level files are written first; a failure there is an error.
/// Per-file problems (missing source, failed link) are logged, recorded in
/// the [`WriteReport`] and never stop the batch.
pub struct DatasetWriter<'a> {
    schema: &'a dyn SchemaService,
    link_mode: LinkMode,
}

impl<'a> DatasetWriter<'a> {
    pub fn new(schema: &'a dyn SchemaService) -> Self {
        Self {
            schema,
            link_mode: LinkMode::default(),
        }
    }

    /// Builder: Set how source files are placed in the tree
    pub fn with_link_mode(mut self, link_mode: LinkMode) -> Self {
        self.link_mode = link_mode;
        self
    }

    /// Writes the dataset under `output_root/<sanitised dataset name>`
    pub fn write(&self, manifest: &Manifest, output_root: &Path) -> Result<WriteReport> {
        let dataset_dir = output_root.join(sanitize_name(&manifest.dataset_description.name));
        fs::create_dir_all(&dataset_dir)?;
        info!("Creating BIDS dataset: {}", dataset_dir.display());

        self.write_dataset_description(manifest, &dataset_dir)?;
        self.write_readme(manifest, &dataset_dir)?;
        write_bidsignore(&dataset_dir)?;
        write_participants(manifest, &dataset_dir)?;

        let mut report = WriteReport {
            dataset_dir: dataset_dir.clone(),
            ..WriteReport::default()
        };
        let mut builder = LayoutBuilder::new(self.schema);
        for object in &manifest.objects {
            self.write_object(object, &mut builder, &dataset_dir, &mut report)?;
        }

        info!(
            "Wrote {} files for {} objects ({} skipped)",
            report.written,
            report.objects,
            report.skipped.len()
        );
        Ok(report)
    }

    fn write_dataset_description(&self, manifest: &Manifest, dataset_dir: &Path) -> Result<()> {
        let mut description = manifest.dataset_description.clone();
        if description.bids_version.is_empty() {
            description.bids_version = self.schema.bids_version().to_string();
        }
        let description = description.with_writer_defaults();
        fs::write(
            dataset_dir.join("dataset_description.json"),
            serde_json::to_string_pretty(&description)?,
        )?;
        Ok(())
    }

    fn write_readme(&self, manifest: &Manifest, dataset_dir: &Path) -> Result<()> {
        let readme = if manifest.readme.is_empty() {
            "# Dataset\n\nConverted using bidsmap.\n"
        } else {
            manifest.readme.as_str()
        };
        fs::write(dataset_dir.join("README"), readme)?;
        Ok(())
    }

    fn write_object(
        &self,
        object: &ObjectEntry,
        builder: &mut LayoutBuilder<'_>,
        dataset_dir: &Path,
        report: &mut WriteReport,
    ) -> Result<()> {
        let Some((datatype, suffix)) = object.naming_pair() else {
            debug!("Object {} is not written ({})", object.idx, object.naming_type);
            return Ok(());
        };

        let (subject, session, entities) = object.naming_identity();
        let planned = builder.plan(&subject, &session, datatype, suffix, &entities);
        let directory = dataset_dir.join(&planned.directory);
        fs::create_dir_all(&directory)?;
        report.objects += 1;

        for item in &object.items {
            if item.path.is_empty() {
                continue;
            }
            let destination = directory.join(planned.file_name(&item_extension(item)));
            let outcome = self.place_item(item, &destination);
            report.tally(&item.path, &destination, outcome);
        }
        Ok(())
    }

    /// Places one item; `Ok(None)` when the source is missing
    fn place_item(&self, item: &Item, destination: &Path) -> Result<Option<Placement>> {
        if let Some(sidecar) = item.sidecar.as_ref().filter(|_| item.name == "json") {
            remove_existing(destination)?;
            fs::write(destination, serde_json::to_string_pretty(sidecar)?)?;
            return Ok(Some(Placement::Serialized));
        }

        let source = Path::new(&item.path);
        if !source.exists() {
            warn!("Source file not found: {}", source.display());
            return Ok(None);
        }

        remove_existing(destination)?;
        let placement = match self.link_mode {
            LinkMode::Hardlink => link_or_copy(source, destination, |s, d| fs::hard_link(s, d))?,
            LinkMode::Symlink => {
                symlink_file(&source.canonicalize()?, destination)?;
                Placement::Linked
            }
            LinkMode::Copy => {
                fs::copy(source, destination)?;
                Placement::Copied
            }
        };
        Ok(Some(placement))
    }
}

/// Links with `link`, copying the file when linking fails
fn link_or_copy<F>(source: &Path, destination: &Path, link: F) -> io::Result<Placement>
where
    F: FnOnce(&Path, &Path) -> io::Result<()>,
{
    match link(source, destination) {
        Ok(()) => Ok(Placement::Linked),
        Err(e) => {
            warn!("Hard link failed for {} ({}), copying", source.display(), e);
            remove_existing(destination)?;
            fs::copy(source, destination)?;
            Ok(Placement::CopyFallback)
        }
    }
}

/// Output extension for an item, from its name, else from its source path
fn item_extension(item: &Item) -> String {
    let kind = FileKind::from_str(&item.name);
    match kind {
        FileKind::Other(ref name) if name.is_empty() => {
            FileKind::from_path(Path::new(&item.path)).extension()
        }
        _ => kind.extension(),
    }
}

fn remove_existing(path: &Path) -> io::Result<()> {
    if path.symlink_metadata().is_ok() {
        fs::remove_file(path)?;
    }
    Ok(())
}

#[cfg(unix)]
fn symlink_file(source: &Path, destination: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(source, destination)
}

#[cfg(windows)]
fn symlink_file(source: &Path, destination: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(source, destination)
}

fn write_bidsignore(dataset_dir: &Path) -> Result<()> {
    let patterns = ["excluded/", "finalized.json", MANIFEST_FILE_NAME];
    fs::write(
        dataset_dir.join(".bidsignore"),
        format!("{}\n", patterns.join("\n")),
    )?;
    Ok(())
}

/// Writes `participants.tsv` and `participants.json`; nothing without subjects
fn write_participants(manifest: &Manifest, dataset_dir: &Path) -> Result<()> {
    if manifest.subjects.is_empty() {
        return Ok(());
    }

    let columns: Vec<&str> = manifest
        .participants_column
        .keys()
        .map(String::as_str)
        .collect();
    let mut tsv = format!("participant_id\t{}\n", columns.join("\t"));
    if columns.is_empty() {
        tsv = "participant_id\n".to_string();
    }

    for subject in &manifest.subjects {
        let subject_idx = manifest
            .objects
            .iter()
            .find(|o| o.naming_entities.get("subject") == Some(&subject.subject))
            .map(|o| o.subject_idx.to_string());
        let info = subject_idx.and_then(|idx| manifest.participants_info.get(&idx));

        let mut row = vec![format!("sub-{}", subject.subject)];
        for column in &columns {
            let value = info
                .and_then(|i| i.get(*column))
                .filter(|v| !v.is_empty())
                .map(String::as_str)
                .unwrap_or(NOT_AVAILABLE);
            row.push(value.to_string());
        }
        tsv.push_str(&row.join("\t"));
        tsv.push('\n');
    }

    fs::write(dataset_dir.join("participants.tsv"), tsv)?;
    fs::write(
        dataset_dir.join("participants.json"),
        serde_json::to_string_pretty(&manifest.participants_column)?,
    )?;
    Ok(())
}

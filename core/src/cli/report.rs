use crate::api::Analysis;
use crate::types::FileKind;
use std::fmt;

/// Text report formatter for an analysis
pub struct TextReport<'a> {
    analysis: &'a Analysis,
}

impl<'a> TextReport<'a> {
    /// Creates a new text report
    pub fn new(analysis: &'a Analysis) -> Self {
        Self { analysis }
    }
}

impl<'a> fmt::Display for TextReport<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let analysis = self.analysis;
        writeln!(f, "BIDS Layout")?;
        writeln!(f, "===========")?;
        writeln!(f)?;
        writeln!(
            f,
            "Dataset:        {}",
            analysis.manifest.dataset_description.name
        )?;
        writeln!(f, "Images:         {}", analysis.records.len())?;
        writeln!(f, "Subjects:       {}", analysis.subject_count())?;
        writeln!(f, "Series:         {}", analysis.series().len())?;
        writeln!(f, "Excluded:       {}", analysis.excluded_count())?;
        writeln!(f, "Unidentified:   {}", analysis.unidentified_count())?;
        writeln!(f, "With errors:    {}", analysis.error_count())?;
        writeln!(f)?;

        writeln!(f, "Records")?;
        writeln!(f, "-------")?;
        for (record, planned) in analysis.records.iter().zip(&analysis.layout) {
            let kind = if record.kind.is_empty() {
                "unknown"
            } else {
                record.kind.as_str()
            };
            writeln!(f, "[{}] {}", kind, record.nifti_path.display())?;
            if let Some(planned) = planned {
                let extension = FileKind::from_path(&record.nifti_path).extension();
                writeln!(f, "  -> {}", planned.path(&extension).display())?;
            }
            if !record.message.is_empty() {
                writeln!(f, "  {}", record.message)?;
            }
            if !record.error.is_empty() {
                writeln!(f, "  Error: {}", record.error)?;
            }
            for warning in &record.validation_warnings {
                writeln!(f, "  Warning: {}", warning)?;
            }
        }

        Ok(())
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// How source files are materialised in the output tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    /// Hard link, falling back to a copy when linking fails
    #[default]
    Hardlink,
    /// Symbolic link to the canonicalised source
    Symlink,
    /// Full copy
    Copy,
}

impl LinkMode {
    /// Returns simple name for display
    pub fn simple_name(&self) -> &'static str {
        match self {
            LinkMode::Hardlink => "hardlink",
            LinkMode::Symlink => "symlink",
            LinkMode::Copy => "copy",
        }
    }

    /// Parses link mode from string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "hardlink" | "hard" => Some(LinkMode::Hardlink),
            "symlink" | "soft" => Some(LinkMode::Symlink),
            "copy" => Some(LinkMode::Copy),
            _ => None,
        }
    }
}

impl fmt::Display for LinkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.simple_name())
    }
}

/// Kind of file associated with a record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileKind {
    NiftiGz,
    Nifti,
    Json,
    Bval,
    Bvec,
    Tsv,
    Other(String),
}

impl FileKind {
    /// Classifies a path by its (possibly double) extension
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if name.ends_with(".nii.gz") {
            FileKind::NiftiGz
        } else if name.ends_with(".nii") {
            FileKind::Nifti
        } else if name.ends_with(".json") {
            FileKind::Json
        } else if name.ends_with(".bval") {
            FileKind::Bval
        } else if name.ends_with(".bvec") {
            FileKind::Bvec
        } else if name.ends_with(".tsv") {
            FileKind::Tsv
        } else {
            FileKind::Other(
                path.extension()
                    .map(|e| e.to_string_lossy().to_string())
                    .unwrap_or_default(),
            )
        }
    }

    /// Parses the manifest item name back into a kind
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Self {
        match s {
            "nii.gz" => FileKind::NiftiGz,
            "nii" => FileKind::Nifti,
            "json" => FileKind::Json,
            "bval" => FileKind::Bval,
            "bvec" => FileKind::Bvec,
            "tsv" => FileKind::Tsv,
            other => FileKind::Other(other.to_string()),
        }
    }

    /// Name used in manifest items (no leading dot)
    pub fn simple_name(&self) -> &str {
        match self {
            FileKind::NiftiGz => "nii.gz",
            FileKind::Nifti => "nii",
            FileKind::Json => "json",
            FileKind::Bval => "bval",
            FileKind::Bvec => "bvec",
            FileKind::Tsv => "tsv",
            FileKind::Other(ext) => ext,
        }
    }

    /// Output extension including the leading dot (empty when unknown)
    pub fn extension(&self) -> String {
        let name = self.simple_name();
        if name.is_empty() {
            String::new()
        } else {
            format!(".{}", name)
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, FileKind::NiftiGz | FileKind::Nifti)
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.simple_name())
    }
}

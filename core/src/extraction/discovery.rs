use crate::error::{BidsmapError, Result};
use crate::types::FileKind;
use log::{debug, warn};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Compares two strings treating digit runs as numbers ("run2" < "run10")
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();

    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) if ca.is_ascii_digit() && cb.is_ascii_digit() => {
                let mut da = String::new();
                while let Some(c) = ai.next_if(char::is_ascii_digit) {
                    da.push(c);
                }
                let mut db = String::new();
                while let Some(c) = bi.next_if(char::is_ascii_digit) {
                    db.push(c);
                }
                let ta = da.trim_start_matches('0');
                let tb = db.trim_start_matches('0');
                let ord = ta
                    .len()
                    .cmp(&tb.len())
                    .then_with(|| ta.cmp(tb))
                    .then_with(|| da.len().cmp(&db.len()));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(ca), Some(cb)) => {
                if ca != cb {
                    return ca.cmp(&cb);
                }
                ai.next();
                bi.next();
            }
        }
    }
}

/// Sorts paths in natural order of their full text
pub fn natural_sort(paths: &mut [PathBuf]) {
    paths.sort_by(|a, b| natural_cmp(&a.to_string_lossy(), &b.to_string_lossy()));
}

/// File name without the image/sidecar extension (`x.nii.gz` -> `x`)
pub fn file_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext_len = FileKind::from_path(path).extension().len();
    name[..name.len().saturating_sub(ext_len)].to_string()
}

fn shared_prefix_len(a: &str, b: &str) -> usize {
    a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count()
}

/// True when `longer` is `shorter` followed by a separator
fn extends_stem(longer: &str, shorter: &str) -> bool {
    longer
        .strip_prefix(shorter)
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| matches!(c, '_' | '-' | '.'))
}

/// Every file the extractor cares about under one input root
#[derive(Debug, Clone, Default)]
pub struct FileInventory {
    /// NIfTI images, natural-sorted
    pub images: Vec<PathBuf>,
    sidecars: HashMap<PathBuf, Vec<PathBuf>>,
    companions: HashMap<PathBuf, Vec<PathBuf>>,
}

impl FileInventory {
    /// Walks `root` recursively and indexes images, sidecars and gradient
    /// tables
    ///
    /// Unreadable entries are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` is not a directory.
    pub fn scan(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(BidsmapError::ExtractionError(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        let mut inventory = Self::default();
        for entry in WalkDir::new(root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Error accessing entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            inventory.add(entry.into_path());
        }

        natural_sort(&mut inventory.images);
        for list in inventory
            .sidecars
            .values_mut()
            .chain(inventory.companions.values_mut())
        {
            natural_sort(list);
        }

        debug!(
            "Discovered {} images under {}",
            inventory.images.len(),
            root.display()
        );
        Ok(inventory)
    }

    /// Indexes a single file by kind
    pub fn add(&mut self, path: PathBuf) {
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        match FileKind::from_path(&path) {
            kind if kind.is_image() => self.images.push(path),
            FileKind::Json => self.sidecars.entry(dir).or_default().push(path),
            FileKind::Bval | FileKind::Bvec => self.companions.entry(dir).or_default().push(path),
            _ => {}
        }
    }

    /// Best-matching sidecar for an image in the same directory
    ///
    /// Candidates share the image stem up to a separator in either direction.
    /// An exact stem match wins; otherwise the longest shared prefix, then
    /// natural order.
    pub fn match_sidecar(&self, image: &Path) -> Option<&Path> {
        let dir = image.parent().map(Path::to_path_buf).unwrap_or_default();
        let stem = file_stem(image);

        self.sidecars
            .get(&dir)?
            .iter()
            .filter_map(|json| {
                let json_stem = file_stem(json);
                let exact = json_stem == stem;
                if exact || extends_stem(&json_stem, &stem) || extends_stem(&stem, &json_stem) {
                    Some((exact, shared_prefix_len(&json_stem, &stem), json))
                } else {
                    None
                }
            })
            // list is natural-sorted, so min_by keeps the first of equal ranks
            .min_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)))
            .map(|(_, _, json)| json.as_path())
    }

    /// `.bval` / `.bvec` files with exactly the image stem
    pub fn companions_for(&self, image: &Path) -> Vec<PathBuf> {
        let dir = image.parent().map(Path::to_path_buf).unwrap_or_default();
        let stem = file_stem(image);
        self.companions
            .get(&dir)
            .map(|files| {
                files
                    .iter()
                    .filter(|f| file_stem(f) == stem)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_natural_cmp() {
        assert_eq!(natural_cmp("run2", "run10"), Ordering::Less);
        assert_eq!(natural_cmp("run10", "run2"), Ordering::Greater);
        assert_eq!(natural_cmp("a", "a"), Ordering::Equal);
        assert_eq!(natural_cmp("a", "ab"), Ordering::Less);
        assert_eq!(natural_cmp("sn-02", "sn-2"), Ordering::Greater);
        assert_eq!(natural_cmp("x9y", "x10a"), Ordering::Less);
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem(Path::new("/a/scan.nii.gz")), "scan");
        assert_eq!(file_stem(Path::new("/a/scan.nii")), "scan");
        assert_eq!(file_stem(Path::new("/a/scan.json")), "scan");
        assert_eq!(file_stem(Path::new("/a/scan.v2.bvec")), "scan.v2");
    }

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, b"{}").unwrap();
        path
    }

    #[test]
    fn test_scan_orders_images_naturally() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "s/run10.nii.gz");
        touch(tmp.path(), "s/run2.nii.gz");
        touch(tmp.path(), "s/run1.nii");
        touch(tmp.path(), "s/notes.txt");

        let inventory = FileInventory::scan(tmp.path()).unwrap();
        let names: Vec<_> = inventory.images.iter().map(|p| file_stem(p)).collect();
        assert_eq!(names, vec!["run1", "run2", "run10"]);
    }

    #[test]
    fn test_scan_rejects_file_root() {
        let tmp = TempDir::new().unwrap();
        let file = touch(tmp.path(), "x.nii");
        assert!(FileInventory::scan(&file).is_err());
    }

    #[test]
    fn test_match_sidecar_exact_wins() {
        let tmp = TempDir::new().unwrap();
        let image = touch(tmp.path(), "d/bold.nii.gz");
        touch(tmp.path(), "d/bold_e2.json");
        let exact = touch(tmp.path(), "d/bold.json");
        touch(tmp.path(), "other/bold.json");

        let inventory = FileInventory::scan(tmp.path()).unwrap();
        assert_eq!(inventory.match_sidecar(&image), Some(exact.as_path()));
    }

    #[test]
    fn test_match_sidecar_prefix_and_separator() {
        let tmp = TempDir::new().unwrap();
        let image = touch(tmp.path(), "d/run1.nii");
        touch(tmp.path(), "d/run10.json");
        let extended = touch(tmp.path(), "d/run1_ph.json");
        let lonely = touch(tmp.path(), "d/unrelated.nii");

        let inventory = FileInventory::scan(tmp.path()).unwrap();
        assert_eq!(inventory.match_sidecar(&image), Some(extended.as_path()));
        assert_eq!(inventory.match_sidecar(&lonely), None);
    }

    #[test]
    fn test_companions_exact_stem_only() {
        let tmp = TempDir::new().unwrap();
        let image = touch(tmp.path(), "d/dwi.nii.gz");
        let bval = touch(tmp.path(), "d/dwi.bval");
        let bvec = touch(tmp.path(), "d/dwi.bvec");
        touch(tmp.path(), "d/dwi_2.bvec");

        let inventory = FileInventory::scan(tmp.path()).unwrap();
        assert_eq!(inventory.companions_for(&image), vec![bval, bvec]);
    }
}

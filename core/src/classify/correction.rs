use crate::types::Record;
use log::info;

/// Volume count below which a direction-labelled dwi series is suspect
pub const LOW_VOLUME_THRESHOLD: usize = 10;

/// Message left on records moved from `dwi/dwi` to `fmap/epi`
pub const RECLASSIFIED_MESSAGE: &str = "Reclassified from dwi to fmap/epi (low volume count)";

fn is_dwi(record: &Record) -> bool {
    record.datatype == "dwi" && record.suffix == "dwi"
}

/// Moves low-volume, direction-labelled `dwi/dwi` records to `fmap/epi`
///
/// Applies only when the same batch holds a `dwi/dwi` record with more than
/// [`LOW_VOLUME_THRESHOLD`] volumes. Returns the number of records changed.
pub fn correct_pepolar_fieldmaps(records: &mut [Record]) -> usize {
    let has_full_dwi = records
        .iter()
        .any(|r| is_dwi(r) && r.num_volumes > LOW_VOLUME_THRESHOLD);
    if !has_full_dwi {
        return 0;
    }

    let mut changed = 0;
    for record in records
        .iter_mut()
        .filter(|r| is_dwi(r) && r.num_volumes < LOW_VOLUME_THRESHOLD && !r.direction.is_empty())
    {
        info!(
            "{}: {} volumes alongside a full diffusion series, treating as fmap/epi",
            record.nifti_path.display(),
            record.num_volumes
        );
        record.set_classification("fmap", "epi");
        record.message = RECLASSIFIED_MESSAGE.to_string();
        changed += 1;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn dwi(name: &str, volumes: usize, direction: &str) -> Record {
        let mut r = Record::new(PathBuf::from(name));
        r.set_classification("dwi", "dwi");
        r.num_volumes = volumes;
        r.direction = direction.to_string();
        r
    }

    #[test]
    fn test_reclassifies_alongside_full_dwi() {
        let mut records = vec![dwi("a.nii", 64, "AP"), dwi("b.nii", 3, "PA")];
        assert_eq!(correct_pepolar_fieldmaps(&mut records), 1);
        assert_eq!(records[0].kind, "dwi/dwi");
        assert_eq!(records[1].kind, "fmap/epi");
        assert_eq!(records[1].message, RECLASSIFIED_MESSAGE);
    }

    #[test]
    fn test_requires_direction() {
        let mut records = vec![dwi("a.nii", 64, "AP"), dwi("b.nii", 3, "")];
        assert_eq!(correct_pepolar_fieldmaps(&mut records), 0);
        assert_eq!(records[1].kind, "dwi/dwi");
    }

    #[test]
    fn test_requires_full_sibling() {
        // exactly 10 volumes is neither low nor full
        let mut records = vec![dwi("a.nii", 10, "AP"), dwi("b.nii", 3, "PA")];
        assert_eq!(correct_pepolar_fieldmaps(&mut records), 0);
        assert!(records.iter().all(|r| r.kind == "dwi/dwi"));
    }
}

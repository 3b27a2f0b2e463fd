use crate::classify::rules::*;
use crate::types::Record;

/// Normalised text views of a record used by every stage
#[derive(Debug, Clone)]
pub struct Texts {
    pub description: String,
    pub protocol: String,
    /// Lowercased sidecar path (or where it would be)
    pub json_path: String,
    pub image_path: String,
    pub manufacturer: String,
}

impl Texts {
    pub fn from_record(record: &Record) -> Self {
        Self {
            description: normalize(&record.series_description),
            protocol: normalize(&record.protocol_name),
            json_path: record.json_path().to_string_lossy().to_lowercase(),
            image_path: record.nifti_path.to_string_lossy().to_string(),
            manufacturer: record.manufacturer.to_uppercase(),
        }
    }

    fn both(&self) -> [&str; 2] {
        [&self.description, &self.protocol]
    }
}

/// A datatype/suffix decision
pub type Classification = (&'static str, &'static str);

/// Returns the exclusion message when the record must be excluded
///
/// Checks localizer patterns, then derived-image patterns, over description
/// and protocol, then the localizer filename marker.
pub fn exclusion_reason(texts: &Texts) -> Option<String> {
    if let Some(term) = first_match(LOCALIZER_PATTERNS, &texts.both()) {
        return Some(format!("Excluded: matches localizer pattern '{}'", term));
    }
    if let Some(term) = first_match(DERIVED_PATTERNS, &texts.both()) {
        return Some(format!("Excluded: matches derived image pattern '{}'", term));
    }
    if texts.image_path.contains(LOCALIZER_FILENAME_MARKER) {
        return Some("Excluded: localizer indicator in filename".to_string());
    }
    None
}

/// Diffusion stage
///
/// A text match or a bvec companion with more than one volume is `dwi`; a
/// single-volume 3D image with an sbref/b0 pattern is `sbref`.
pub fn identify_dwi(record: &Record, texts: &Texts) -> Option<Classification> {
    if ["trace", "_fa_", "adc"]
        .iter()
        .any(|t| texts.description.contains(t))
    {
        return None;
    }

    let has_bvec = record.companion("bvec").is_some();
    if !(has_bvec || matches_any(patterns("dwi", "dwi"), &texts.both())) {
        return None;
    }

    if record.num_volumes > 1 {
        return Some(("dwi", "dwi"));
    }
    if record.ndim == 3
        && record.num_volumes == 1
        && matches_any(patterns("dwi", "sbref"), &[&texts.description])
    {
        return Some(("dwi", "sbref"));
    }
    None
}

/// Fieldmap stage
///
/// Algorithm:
/// 1. Spin-echo/PEPOLAR patterns with at most 10 volumes, no echo number and
///    a non-GE scanner are `epi`
/// 2. Gradient-echo fieldmaps, or anything carrying an echo number, are split
///    by echo: echo 1 is `phase1` with a phase marker else `magnitude1`;
///    echo 2 is `phasediff` with a phase marker else `magnitude2`
/// 3. GE gradient-echo pairs are `fieldmap` with a phase marker else
///    `magnitude`
pub fn identify_fmap(record: &Record, texts: &Texts) -> Option<Classification> {
    let is_ge = texts.manufacturer == "GE";

    if matches_any(patterns("fmap", "epi"), &texts.both())
        && record.num_volumes <= 10
        && record.echo_number.is_none()
        && !is_ge
    {
        return Some(("fmap", "epi"));
    }

    let is_gre = matches_any(GRE_FIELDMAP_PATTERNS, &texts.both());
    let phase_in_description = texts.description.contains("phase");

    if is_gre || record.echo_number.is_some() {
        match record.echo_number {
            Some(1) => {
                return Some(if texts.json_path.contains("_e1_ph") || phase_in_description {
                    ("fmap", "phase1")
                } else {
                    ("fmap", "magnitude1")
                });
            }
            Some(2) => {
                // phase2 is never produced: a second-echo phase image is
                // always taken as the phase difference
                return Some(if texts.json_path.contains("_e2_ph") || phase_in_description {
                    ("fmap", "phasediff")
                } else {
                    ("fmap", "magnitude2")
                });
            }
            _ => {}
        }
    }

    if is_ge && is_gre {
        return Some(if phase_in_description || texts.description.contains("ph") {
            ("fmap", "fieldmap")
        } else {
            ("fmap", "magnitude")
        });
    }

    None
}

/// Functional stage
pub fn identify_func(record: &Record, texts: &Texts) -> Option<Classification> {
    if record.image_type.contains_any(FUNC_EXCLUDED_IMAGE_TYPES) {
        return None;
    }
    if !matches_any(patterns("func", "bold"), &texts.both()) {
        return None;
    }

    if record.ndim == 4 && record.num_volumes > 1 && record.repetition_time > 0.0 {
        return Some(("func", "bold"));
    }
    if record.ndim == 3
        && record.num_volumes == 1
        && matches_any(patterns("func", "sbref"), &[&texts.description])
    {
        return Some(("func", "sbref"));
    }
    None
}

/// Anatomical stage: 3D only, first suffix in priority order whose patterns
/// match and whose guard allows it
pub fn identify_anat(record: &Record, texts: &Texts) -> Option<Classification> {
    if record.ndim != 3 {
        return None;
    }

    ANAT_PRIORITY
        .iter()
        .find(|(suffix, guard)| {
            matches_any(patterns("anat", suffix), &texts.both())
                && guard.allows(record, &texts.description)
        })
        .map(|(suffix, _)| ("anat", *suffix))
}

/// Runs the stages in order (dwi, fmap, func, anat); first hit wins
pub fn identify(record: &Record, texts: &Texts) -> Option<Classification> {
    identify_dwi(record, texts)
        .or_else(|| identify_fmap(record, texts))
        .or_else(|| identify_func(record, texts))
        .or_else(|| identify_anat(record, texts))
}

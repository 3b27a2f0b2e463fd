use crate::types::Record;

/// Description patterns marking localizer/scout acquisitions
pub const LOCALIZER_PATTERNS: &[&str] = &["localizer", "scout", "survey", "loc_"];

/// Description patterns marking scanner-derived images
pub const DERIVED_PATTERNS: &[&str] = &["trace", "_fa_", "adc", "colfa", "tensor"];

/// Filename marker of the first-volume-only localizer convention
pub const LOCALIZER_FILENAME_MARKER: &str = "_i0000";

/// Image-type tags that disqualify a functional acquisition
pub const FUNC_EXCLUDED_IMAGE_TYPES: &[&str] = &["DERIVED", "PERFUSION", "DIFFUSION", "ASL", "UNI"];

/// Patterns identifying a gradient-echo fieldmap
pub const GRE_FIELDMAP_PATTERNS: &[&str] = &["fieldmap", "gre"];

/// Ordered substring patterns for one datatype/suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuffixRule {
    pub datatype: &'static str,
    pub suffix: &'static str,
    pub patterns: &'static [&'static str],
}

const fn rule(
    datatype: &'static str,
    suffix: &'static str,
    patterns: &'static [&'static str],
) -> SuffixRule {
    SuffixRule {
        datatype,
        suffix,
        patterns,
    }
}

/// Detection table, matched against normalised description/protocol text
pub const RULES: &[SuffixRule] = &[
    // anat
    rule(
        "anat",
        "T1w",
        &[
            "t1w", "t1_w", "tfl3d", "tfl_3d", "mprage", "mp_rage", "spgr", "tflmgh", "tfl_mgh",
            "t1mpr", "t1_mpr", "anatt1", "anat_t1", "3dt1", "3d_t1", "t1_", "_t1",
        ],
    ),
    rule(
        "anat",
        "T2w",
        &[
            "t2w", "t2_w", "anatt2", "anat_t2", "3dt2", "3d_t2", "t2spc", "t2_spc", "t2_", "_t2",
        ],
    ),
    rule(
        "anat",
        "FLAIR",
        &[
            "flair",
            "t2spacedafl",
            "t2_space_da_fl",
            "t2space_da_fl",
            "t2space_dafl",
            "t2_space_dafl",
            "dark_fluid",
        ],
    ),
    rule("anat", "T2starw", &["t2starw", "t2star_w", "t2star", "qsm", "swi"]),
    rule("anat", "PDw", &["pdw", "pd_w", "proton_density"]),
    rule("anat", "inplaneT1", &["inplanet1", "inplane_t1"]),
    rule("anat", "inplaneT2", &["inplanet2", "inplane_t2"]),
    rule("anat", "angio", &["angio", "tof", "mra"]),
    rule("anat", "MEGRE", &["megre", "multi_echo_gre"]),
    rule("anat", "MESE", &["mese", "multi_echo_se"]),
    rule("anat", "UNIT1", &["uni", "unit1"]),
    rule("anat", "MP2RAGE", &["mp2rage"]),
    rule("anat", "T1map", &["t1map", "t1_map"]),
    rule("anat", "T2map", &["t2map", "t2_map"]),
    rule("anat", "T2starmap", &["t2starmap", "t2star_map", "r2starmap"]),
    rule("anat", "PDmap", &["pdmap", "pd_map"]),
    rule("anat", "Chimap", &["chimap", "chi_map", "susceptibility"]),
    // func
    rule(
        "func",
        "bold",
        &[
            "bold", "func", "fmri", "f_mri", "fcmri", "fcfmri", "rsfmri", "rs_fmri", "rsmri",
            "task", "rest",
        ],
    ),
    rule("func", "sbref", &["sbref", "sb_ref", "singleband"]),
    // dwi
    rule(
        "dwi",
        "dwi",
        &["dwi", "dti", "dmri", "d_mri", "diffusion", "hardi"],
    ),
    rule("dwi", "sbref", &["sbref", "sb_ref", "b0", "bzero", "b_zero"]),
    // fmap
    rule(
        "fmap",
        "epi",
        &[
            "fmap_spin",
            "fmap_se",
            "fmap_ap",
            "fmap_pa",
            "fieldmap_spin",
            "fieldmap_ap",
            "fieldmap_pa",
            "fieldmap_se",
            "spinecho",
            "spin_echo",
            "sefmri",
            "semri",
            "pepolar",
            "topup",
            "distortion",
            "b0map",
            "b0_map",
        ],
    ),
    rule("fmap", "phasediff", &["phasediff", "phase_diff", "phdiff"]),
    rule("fmap", "phase1", &["phase1", "phase_1", "_e1_ph"]),
    rule("fmap", "phase2", &["phase2", "phase_2", "_e2_ph"]),
    rule("fmap", "magnitude1", &["magnitude1", "mag1", "mag_1", "_e1"]),
    rule("fmap", "magnitude2", &["magnitude2", "mag2", "mag_2", "_e2"]),
    rule("fmap", "magnitude", &["magnitude", "mag"]),
    rule(
        "fmap",
        "fieldmap",
        &["fieldmap", "field_map", "grefieldmap", "gre_field_map"],
    ),
];

/// Extra predicate an anatomical suffix must satisfy after its patterns match
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Guard {
    /// Always accept
    Accept,
    /// Reject when the description contains any of these
    RejectDescription(&'static [&'static str]),
    /// Reject when 0 < echo time (ms) < the threshold
    RejectEchoTimeBelowMs(f64),
    /// Require a structured echo number
    RequireEchoNumber,
    /// Require an exact image-type tag
    RequireImageTypeTag(&'static str),
    /// Require a sidecar field to be present
    RequireSidecarField(&'static str),
}

impl Guard {
    /// Evaluates the guard; `description` is already normalised
    pub fn allows(&self, record: &Record, description: &str) -> bool {
        match self {
            Guard::Accept => true,
            Guard::RejectDescription(terms) => !terms.iter().any(|t| description.contains(t)),
            Guard::RejectEchoTimeBelowMs(threshold) => {
                let te_ms = record.echo_time * 1000.0;
                !(te_ms > 0.0 && te_ms < *threshold)
            }
            Guard::RequireEchoNumber => record.echo_number.is_some(),
            Guard::RequireImageTypeTag(tag) => record.image_type.contains(tag),
            Guard::RequireSidecarField(field) => record.sidecar.contains_key(*field),
        }
    }
}

/// Anatomical suffixes in priority order with their guards
///
/// Parametric and quantitative suffixes come before the generic weighted
/// images so that e.g. "t1map" is not taken as T1w.
pub const ANAT_PRIORITY: &[(&str, Guard)] = &[
    ("MP2RAGE", Guard::RequireSidecarField("InversionTime")),
    ("UNIT1", Guard::RequireImageTypeTag("UNI")),
    ("MEGRE", Guard::RequireEchoNumber),
    ("MESE", Guard::RequireEchoNumber),
    ("T1map", Guard::Accept),
    ("T2map", Guard::Accept),
    ("T2starmap", Guard::Accept),
    ("PDmap", Guard::Accept),
    ("Chimap", Guard::Accept),
    (
        "T1w",
        Guard::RejectDescription(&["inv1", "inv2", "uni_images"]),
    ),
    ("T2w", Guard::RejectEchoTimeBelowMs(50.0)),
    ("FLAIR", Guard::Accept),
    ("T2starw", Guard::Accept),
    ("PDw", Guard::Accept),
    ("inplaneT1", Guard::Accept),
    ("inplaneT2", Guard::Accept),
    ("angio", Guard::Accept),
];

/// Patterns registered for a datatype/suffix, empty when unknown
pub fn patterns(datatype: &str, suffix: &str) -> &'static [&'static str] {
    RULES
        .iter()
        .find(|r| r.datatype == datatype && r.suffix == suffix)
        .map(|r| r.patterns)
        .unwrap_or(&[])
}

/// Lowercases and unifies spaces and dashes to underscores
pub fn normalize(text: &str) -> String {
    text.to_lowercase().replace([' ', '-'], "_")
}

/// First pattern contained in any of the (normalised) texts
pub fn first_match<'p>(patterns: &[&'p str], texts: &[&str]) -> Option<&'p str> {
    patterns
        .iter()
        .copied()
        .find(|p| texts.iter().any(|t| t.contains(p)))
}

/// True when any pattern is contained in any of the (normalised) texts
pub fn matches_any(patterns: &[&str], texts: &[&str]) -> bool {
    first_match(patterns, texts).is_some()
}

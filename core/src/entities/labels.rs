use crate::types::Record;
use regex::Regex;
use std::sync::OnceLock;

/// Task names recognised on their own, without a `task` marker
const NAMED_TASKS: &[&str] = &[
    "rest",
    "motor",
    "language",
    "memory",
    "attention",
    "emotion",
    "faces",
    "localizer",
];

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("Failed to compile regex"))
        .collect()
}

/// First capture of the first pattern matching any text, pattern-major
fn first_capture(regexes: &[Regex], texts: &[&str]) -> Option<String> {
    regexes.iter().find_map(|re| {
        texts
            .iter()
            .find_map(|t| re.captures(t))
            .and_then(|c| c.get(1).map(|m| m.as_str().to_string()))
    })
}

fn lowered(record: &Record) -> (String, String) {
    (
        record.series_description.to_lowercase(),
        record.protocol_name.to_lowercase(),
    )
}

/// Lowercased file name of the image, without its directory
fn image_name(record: &Record) -> String {
    record
        .nifti_path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Lowercased file name of the sidecar, or where it would be
fn sidecar_name(record: &Record) -> String {
    record
        .json_path()
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Task label
///
/// Algorithm:
/// 1. `task<label>` or `<label>task` over description, then protocol
/// 2. A known task name appearing anywhere
/// 3. `rest` for resting-state markers
/// 4. `task` for a functional record with nothing better
///
/// Labels shorter than two characters are ignored.
pub fn extract_task(record: &Record) -> Option<String> {
    static REGEXES: OnceLock<Vec<Regex>> = OnceLock::new();
    let regexes =
        REGEXES.get_or_init(|| compile(&[r"task[_-]?([a-z0-9]+)", r"([a-z0-9]+)[_-]?task"]));

    let (desc, proto) = lowered(record);
    for re in regexes {
        let label = [&desc, &proto]
            .iter()
            .find_map(|t| re.captures(t))
            .and_then(|c| c.get(1).map(|m| m.as_str().to_string()));
        if let Some(label) = label.filter(|l| l.len() >= 2) {
            return Some(label);
        }
    }

    if let Some(name) = NAMED_TASKS
        .iter()
        .find(|n| desc.contains(*n) || proto.contains(*n))
    {
        return Some(name.to_string());
    }

    if desc.contains("rsfmri") {
        return Some("rest".to_string());
    }
    if record.datatype == "func" {
        return Some("task".to_string());
    }
    None
}

/// Phase-encoding direction label: the header-derived label, else an
/// `_ap_`-style token in description or protocol
pub fn extract_direction(record: &Record) -> Option<String> {
    if !record.direction.is_empty() {
        return Some(record.direction.clone());
    }

    static REGEX: OnceLock<Regex> = OnceLock::new();
    let re = REGEX.get_or_init(|| {
        Regex::new(r"[_-](ap|pa|lr|rl|si|is)(?:[_-]|$)").expect("Failed to compile regex")
    });

    let (desc, proto) = lowered(record);
    // ordered by label so that a description holding several tokens is stable
    ["ap", "pa", "lr", "rl", "si", "is"].iter().find_map(|label| {
        [&desc, &proto]
            .iter()
            .flat_map(|t| re.captures_iter(t))
            .any(|c| c.get(1).map(|m| m.as_str()) == Some(*label))
            .then(|| label.to_uppercase())
    })
}

/// Echo index: the structured echo number, else `echo1`/`e1_` style tokens
/// in the description or sidecar file name
pub fn extract_echo(record: &Record) -> Option<String> {
    if let Some(n) = record.echo_number {
        return Some(n.to_string());
    }

    static REGEXES: OnceLock<Vec<Regex>> = OnceLock::new();
    let regexes =
        REGEXES.get_or_init(|| compile(&[r"echo[_-]?(\d+)", r"e(\d+)[_-]", r"_e(\d+)"]));

    let desc = record.series_description.to_lowercase();
    first_capture(regexes, &[&desc, &sidecar_name(record)])
}

/// Free acquisition label
pub fn extract_acquisition(record: &Record) -> Option<String> {
    static REGEXES: OnceLock<Vec<Regex>> = OnceLock::new();
    let regexes = REGEXES.get_or_init(|| {
        compile(&[
            r"(?:^|[_-])acq[_-]?([a-z0-9]+)",
            r"(highres|lowres|hires|lores)",
            r"(mb\d+)",
            r"(?:^|[_-])(norm|prenorm|postnorm)(?:[_-]|$)",
        ])
    });

    let (desc, proto) = lowered(record);
    first_capture(regexes, &[&desc, &proto])
}

/// Run index, zero-padded to two digits
pub fn extract_run(record: &Record) -> Option<String> {
    static REGEXES: OnceLock<Vec<Regex>> = OnceLock::new();
    let regexes = REGEXES.get_or_init(|| compile(&[r"run[_-]?(\d+)", r"_r(\d+)_"]));

    let (desc, proto) = lowered(record);
    let number = first_capture(regexes, &[&desc, &proto, &image_name(record)])?;
    let number: u32 = number.parse().ok()?;
    Some(format!("{:02}", number))
}

/// Complex-data part: image-type tags first, then description/file name
pub fn extract_part(record: &Record) -> Option<String> {
    let tags = record.image_type.lowercase_tags();
    let has = |names: &[&str]| tags.iter().any(|t| names.contains(&t.as_str()));

    if has(&["p", "phase"]) {
        return Some("phase".to_string());
    }
    if has(&["m", "magnitude"]) {
        return Some("mag".to_string());
    }
    if has(&["real"]) {
        return Some("real".to_string());
    }
    if has(&["imaginary"]) {
        return Some("imag".to_string());
    }

    let desc = record.series_description.to_lowercase();
    if sidecar_name(record).contains("_ph") || desc.contains("phase") {
        return Some("phase".to_string());
    }
    if desc.contains("mag") {
        return Some("mag".to_string());
    }
    None
}

/// Reconstruction label
pub fn extract_reconstruction(record: &Record) -> Option<String> {
    static REGEXES: OnceLock<Vec<Regex>> = OnceLock::new();
    let regexes = REGEXES.get_or_init(|| {
        compile(&[
            r"(?:^|[_-])rec[_-]?([a-z0-9]+)",
            r"(moco|nomoco)",
            r"(?:^|[_-])(nd|filtered)(?:[_-]|$)",
        ])
    });

    let (desc, proto) = lowered(record);
    first_capture(regexes, &[&desc, &proto])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImageType;
    use rstest::rstest;
    use std::path::PathBuf;

    fn record(description: &str) -> Record {
        let mut r = Record::new(PathBuf::from("/data/scan.nii.gz"));
        r.series_description = description.to_string();
        r
    }

    #[rstest]
    #[case("task-rest_bold", Some("rest"))]
    #[case("fMRI_TASK_nback", Some("nback"))]
    #[case("motor_task", Some("motor"))]
    #[case("bold_faces", Some("faces"))]
    #[case("RSfMRI", Some("rest"))]
    #[case("t1_mprage", None)]
    fn test_extract_task(#[case] description: &str, #[case] expected: Option<&str>) {
        assert_eq!(extract_task(&record(description)).as_deref(), expected);
    }

    #[test]
    fn test_task_single_char_label_skipped() {
        let mut r = record("task-a_bold");
        assert_eq!(extract_task(&r), None);
        r.datatype = "func".to_string();
        assert_eq!(extract_task(&r).as_deref(), Some("task"));
    }

    #[test]
    fn test_extract_direction() {
        let mut r = record("DWI_PA");
        assert_eq!(extract_direction(&r).as_deref(), Some("PA"));
        r.direction = "AP".to_string();
        assert_eq!(extract_direction(&r).as_deref(), Some("AP"));
        // "map" is not a direction token
        assert_eq!(extract_direction(&record("b0map")), None);
    }

    #[test]
    fn test_extract_echo() {
        let mut r = record("multiecho_echo2");
        assert_eq!(extract_echo(&r).as_deref(), Some("2"));
        r.echo_number = Some(3);
        assert_eq!(extract_echo(&r).as_deref(), Some("3"));

        let mut named = record("gre");
        named.nifti_path = PathBuf::from("/d/fm_e2_ph.nii.gz");
        assert_eq!(extract_echo(&named).as_deref(), Some("2"));
    }

    #[rstest]
    #[case("t1_acq-highres", Some("highres"))]
    #[case("bold_mb4", Some("mb4"))]
    #[case("t1_norm", Some("norm"))]
    #[case("abnormal", None)]
    #[case("bold_acq_fast", Some("fast"))]
    #[case("opacquired_scan", None)]
    fn test_extract_acquisition(#[case] description: &str, #[case] expected: Option<&str>) {
        assert_eq!(extract_acquisition(&record(description)).as_deref(), expected);
    }

    #[test]
    fn test_extract_run() {
        assert_eq!(extract_run(&record("bold_run-3")).as_deref(), Some("03"));
        assert_eq!(extract_run(&record("bold_run12")).as_deref(), Some("12"));
        let mut r = record("bold");
        r.nifti_path = PathBuf::from("/d/sub_r2_bold.nii");
        assert_eq!(extract_run(&r).as_deref(), Some("02"));
        assert_eq!(extract_run(&record("bold")), None);
    }

    #[test]
    fn test_extract_part() {
        let mut r = record("gre");
        r.image_type = ImageType::new(vec!["ORIGINAL".into(), "PRIMARY".into(), "P".into()]);
        assert_eq!(extract_part(&r).as_deref(), Some("phase"));
        r.image_type = ImageType::new(vec!["ORIGINAL".into(), "M".into()]);
        assert_eq!(extract_part(&r).as_deref(), Some("mag"));
        assert_eq!(extract_part(&record("gre_phase")).as_deref(), Some("phase"));
        assert_eq!(extract_part(&record("gre_mag")).as_deref(), Some("mag"));
        assert_eq!(extract_part(&record("t1")), None);
    }

    #[rstest]
    #[case("bold_moco", Some("moco"))]
    #[case("t1_nd", Some("nd"))]
    #[case("t1_rec-norm", Some("norm"))]
    #[case("rec_filtered", Some("filtered"))]
    #[case("second", None)]
    #[case("T1_MPRAGE_precontrast", None)]
    #[case("SpinEcho_distortion_correction_AP", None)]
    #[case("DWI_direction_AP", None)]
    fn test_extract_reconstruction(#[case] description: &str, #[case] expected: Option<&str>) {
        assert_eq!(extract_reconstruction(&record(description)).as_deref(), expected);
    }
}

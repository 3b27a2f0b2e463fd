/// Returns the opposite anatomical axis label
fn antonym(c: char) -> Option<char> {
    match c {
        'R' => Some('L'),
        'L' => Some('R'),
        'A' => Some('P'),
        'P' => Some('A'),
        'S' => Some('I'),
        'I' => Some('S'),
        _ => None,
    }
}

/// Computes the anatomical phase-encoding label (e.g. "AP")
///
/// Algorithm:
/// 1. The PE axis letter (`i`, `j`, `k`) indexes into the orientation codes
/// 2. The orientation character is paired with its antonym
/// 3. An unsigned axis keeps the pair in order (`j` + "RAS" -> "AP"); a
///    negative axis reverses it (`j-` -> "PA")
///
/// Returns an empty string when either input is missing or unrecognised.
pub fn phase_encoding_label(pe_direction: &str, orientation: Option<&str>) -> String {
    let Some(orientation) = orientation else {
        return String::new();
    };
    let pe = pe_direction.trim();
    let axis = match pe.chars().find(|c| *c != '-') {
        Some('i') => 0,
        Some('j') => 1,
        Some('k') => 2,
        _ => return String::new(),
    };
    let Some(code) = orientation.chars().nth(axis) else {
        return String::new();
    };
    let Some(opposite) = antonym(code) else {
        return String::new();
    };

    if pe.contains('-') {
        format!("{}{}", opposite, code)
    } else {
        format!("{}{}", code, opposite)
    }
}

/// 3x3 rotation/zoom block of an affine
pub type Matrix3 = [[f64; 3]; 3];

/// Axis labels per world axis: (negative, positive)
const AXIS_LABELS: [(char, char); 3] = [('L', 'R'), ('P', 'A'), ('I', 'S')];

/// Rotation matrix from the NIfTI quaternion parameters b, c, d
///
/// `a` is recovered as `sqrt(1 - b² - c² - d²)`; tiny negative values from
/// rounding are clamped to zero.
pub fn quaternion_to_rotation(b: f64, c: f64, d: f64) -> Matrix3 {
    let a = (1.0 - (b * b + c * c + d * d)).max(0.0).sqrt();
    [
        [
            a * a + b * b - c * c - d * d,
            2.0 * (b * c - a * d),
            2.0 * (b * d + a * c),
        ],
        [
            2.0 * (b * c + a * d),
            a * a + c * c - b * b - d * d,
            2.0 * (c * d - a * b),
        ],
        [
            2.0 * (b * d - a * c),
            2.0 * (c * d + a * b),
            a * a + d * d - b * b - c * c,
        ],
    ]
}

/// Computes orientation axis codes (e.g. "RAS") from an affine's 3x3 block
///
/// Algorithm:
/// 1. Normalise each column by its length (removes voxel zooms)
/// 2. For each voxel axis in order, pick the world axis with the largest
///    absolute component among those not yet taken
/// 3. The sign of that component selects the positive or negative label
///
/// Returns `None` when a column is all zeros.
pub fn axis_codes(rzs: &Matrix3) -> Option<String> {
    let mut m = *rzs;
    for col in 0..3 {
        let norm = (0..3).map(|row| m[row][col].powi(2)).sum::<f64>().sqrt();
        if norm == 0.0 || !norm.is_finite() {
            return None;
        }
        for row in m.iter_mut() {
            row[col] /= norm;
        }
    }

    let mut taken = [false; 3];
    let mut codes = String::with_capacity(3);
    for col in 0..3 {
        let (out_axis, value) = (0..3)
            .filter(|row| !taken[*row])
            .map(|row| (row, m[row][col]))
            .fold(None, |best: Option<(usize, f64)>, (row, v)| match best {
                Some((_, bv)) if bv.abs() >= v.abs() => best,
                _ => Some((row, v)),
            })?;
        if value == 0.0 {
            return None;
        }
        taken[out_axis] = true;
        let (neg, pos) = AXIS_LABELS[out_axis];
        codes.push(if value < 0.0 { neg } else { pos });
    }
    Some(codes)
}

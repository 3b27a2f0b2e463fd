use crate::error::{BidsmapError, Result};
use crate::extraction::orientation::{axis_codes, quaternion_to_rotation, Matrix3};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

pub const NIFTI1_HEADER_SIZE: usize = 348;
pub const NIFTI2_HEADER_SIZE: usize = 540;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// The subset of a NIfTI-1/NIfTI-2 header the pipeline needs
#[derive(Debug, Clone, PartialEq)]
pub struct NiftiHeader {
    /// 1 or 2
    pub version: u8,
    /// `dim[0]` is the number of dimensions
    pub dim: [i64; 8],
    /// `pixdim[0]` is qfac, `pixdim[4]` the TR for 4D images
    pub pixdim: [f64; 8],
    pub qform_code: i32,
    pub sform_code: i32,
    /// quatern_b, quatern_c, quatern_d
    pub quatern: [f64; 3],
    /// srow_x, srow_y, srow_z
    pub srow: [[f64; 4]; 3],
}

/// Field offsets for one header version
struct Layout {
    dim: usize,
    pixdim: usize,
    qform_code: usize,
    sform_code: usize,
    quatern: usize,
    srow: usize,
}

const NIFTI1_LAYOUT: Layout = Layout {
    dim: 40,
    pixdim: 76,
    qform_code: 252,
    sform_code: 254,
    quatern: 256,
    srow: 280,
};

const NIFTI2_LAYOUT: Layout = Layout {
    dim: 16,
    pixdim: 104,
    qform_code: 344,
    sform_code: 348,
    quatern: 352,
    srow: 400,
};

impl NiftiHeader {
    /// Reads the header of a `.nii` or `.nii.gz` file
    ///
    /// Compression is detected from the gzip magic bytes, not the extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or decompressed, or the
    /// header is not a recognisable NIfTI-1/NIfTI-2 header.
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut magic = [0u8; 2];
        let gzipped = {
            let mut file = File::open(path)?;
            file.read_exact(&mut magic).is_ok() && magic == GZIP_MAGIC
        };

        let file = BufReader::new(File::open(path)?);
        let reader: Box<dyn Read> = if gzipped {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };

        let mut bytes = Vec::with_capacity(NIFTI2_HEADER_SIZE);
        reader
            .take(NIFTI2_HEADER_SIZE as u64)
            .read_to_end(&mut bytes)
            .map_err(|e| BidsmapError::NiftiError(format!("{}: {}", path.display(), e)))?;
        Self::parse(&bytes)
    }

    /// Decodes a header from raw bytes, detecting version and byte order
    /// from the `sizeof_hdr` field
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(BidsmapError::NiftiError("truncated header".to_string()));
        }

        let little = LittleEndian::read_i32(&bytes[0..4]);
        let big = BigEndian::read_i32(&bytes[0..4]);
        let (size, little_endian) = match (little, big) {
            (348, _) | (540, _) => (little as usize, true),
            (_, 348) | (_, 540) => (big as usize, false),
            _ => {
                return Err(BidsmapError::NiftiError(format!(
                    "unrecognised sizeof_hdr {}",
                    little
                )))
            }
        };

        if bytes.len() < size {
            return Err(BidsmapError::NiftiError(format!(
                "header truncated at {} of {} bytes",
                bytes.len(),
                size
            )));
        }

        match (size, little_endian) {
            (NIFTI1_HEADER_SIZE, true) => Ok(Self::decode_v1::<LittleEndian>(bytes)),
            (NIFTI1_HEADER_SIZE, false) => Ok(Self::decode_v1::<BigEndian>(bytes)),
            (_, true) => Ok(Self::decode_v2::<LittleEndian>(bytes)),
            (_, false) => Ok(Self::decode_v2::<BigEndian>(bytes)),
        }
    }

    fn decode_v1<B: ByteOrder>(bytes: &[u8]) -> Self {
        let l = NIFTI1_LAYOUT;
        let i16_at = |off: usize| B::read_i16(&bytes[off..off + 2]);
        let f32_at = |off: usize| B::read_f32(&bytes[off..off + 4]) as f64;

        let mut dim = [0i64; 8];
        let mut pixdim = [0f64; 8];
        for i in 0..8 {
            dim[i] = i16_at(l.dim + 2 * i) as i64;
            pixdim[i] = f32_at(l.pixdim + 4 * i);
        }
        let mut srow = [[0f64; 4]; 3];
        for (r, row) in srow.iter_mut().enumerate() {
            for (c, value) in row.iter_mut().enumerate() {
                *value = f32_at(l.srow + 16 * r + 4 * c);
            }
        }

        Self {
            version: 1,
            dim,
            pixdim,
            qform_code: i16_at(l.qform_code) as i32,
            sform_code: i16_at(l.sform_code) as i32,
            quatern: [f32_at(l.quatern), f32_at(l.quatern + 4), f32_at(l.quatern + 8)],
            srow,
        }
    }

    fn decode_v2<B: ByteOrder>(bytes: &[u8]) -> Self {
        let l = NIFTI2_LAYOUT;
        let i32_at = |off: usize| B::read_i32(&bytes[off..off + 4]);
        let f64_at = |off: usize| B::read_f64(&bytes[off..off + 8]);

        let mut dim = [0i64; 8];
        let mut pixdim = [0f64; 8];
        for i in 0..8 {
            dim[i] = B::read_i64(&bytes[l.dim + 8 * i..l.dim + 8 * i + 8]);
            pixdim[i] = f64_at(l.pixdim + 8 * i);
        }
        let mut srow = [[0f64; 4]; 3];
        for (r, row) in srow.iter_mut().enumerate() {
            for (c, value) in row.iter_mut().enumerate() {
                *value = f64_at(l.srow + 32 * r + 8 * c);
            }
        }

        Self {
            version: 2,
            dim,
            pixdim,
            qform_code: i32_at(l.qform_code),
            sform_code: i32_at(l.sform_code),
            quatern: [f64_at(l.quatern), f64_at(l.quatern + 8), f64_at(l.quatern + 16)],
            srow,
        }
    }

    /// Number of dimensions (`dim[0]`)
    pub fn ndim(&self) -> usize {
        self.dim[0].clamp(0, 7) as usize
    }

    /// Volume count: `dim[4]` for 4D+ images, otherwise 1
    pub fn num_volumes(&self) -> usize {
        if self.ndim() >= 4 {
            self.dim[4].max(1) as usize
        } else {
            1
        }
    }

    /// Voxel spacing of the first three axes
    pub fn zooms(&self) -> [f64; 3] {
        [self.pixdim[1], self.pixdim[2], self.pixdim[3]]
    }

    /// Repetition time from `pixdim[4]`, rounded to two decimals, for
    /// exactly-4D images
    pub fn repetition_time(&self) -> Option<f64> {
        (self.ndim() == 4).then(|| (self.pixdim[4] * 100.0).round() / 100.0)
    }

    /// Rotation/zoom block of the best available affine
    ///
    /// Preference order:
    /// 1. sform rows when `sform_code > 0`
    /// 2. quaternion rotation scaled by the zooms (z by qfac) when
    ///    `qform_code > 0`
    /// 3. the base affine `diag(-dx, dy, dz)`
    pub fn rotation_zooms(&self) -> Matrix3 {
        let [dx, dy, dz] = self.zooms();
        if self.sform_code > 0 {
            let mut m = [[0f64; 3]; 3];
            for (r, row) in m.iter_mut().enumerate() {
                row.copy_from_slice(&self.srow[r][..3]);
            }
            m
        } else if self.qform_code > 0 {
            let qfac = if self.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
            let rot = quaternion_to_rotation(self.quatern[0], self.quatern[1], self.quatern[2]);
            let scale = [dx, dy, dz * qfac];
            let mut m = [[0f64; 3]; 3];
            for (r, row) in m.iter_mut().enumerate() {
                for (c, value) in row.iter_mut().enumerate() {
                    *value = rot[r][c] * scale[c];
                }
            }
            m
        } else {
            [[-dx, 0.0, 0.0], [0.0, dy, 0.0], [0.0, 0.0, dz]]
        }
    }

    /// Orientation axis codes (e.g. "RAS")
    pub fn orientation(&self) -> Option<String> {
        axis_codes(&self.rotation_zooms())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::TempDir;

    fn nifti1(dims: &[i16], pixdim: &[f32], sform: Option<[[f32; 4]; 3]>) -> Vec<u8> {
        let mut buf = vec![0u8; NIFTI1_HEADER_SIZE + 4];
        LittleEndian::write_i32(&mut buf[0..4], 348);
        LittleEndian::write_i16(&mut buf[40..42], dims.len() as i16);
        for (i, d) in dims.iter().enumerate() {
            LittleEndian::write_i16(&mut buf[42 + 2 * i..44 + 2 * i], *d);
        }
        LittleEndian::write_f32(&mut buf[76..80], 1.0);
        for (i, p) in pixdim.iter().enumerate() {
            LittleEndian::write_f32(&mut buf[80 + 4 * i..84 + 4 * i], *p);
        }
        if let Some(rows) = sform {
            LittleEndian::write_i16(&mut buf[254..256], 1);
            for (r, row) in rows.iter().enumerate() {
                for (c, v) in row.iter().enumerate() {
                    let off = 280 + 16 * r + 4 * c;
                    LittleEndian::write_f32(&mut buf[off..off + 4], *v);
                }
            }
        }
        buf[344..348].copy_from_slice(b"n+1\0");
        buf
    }

    #[test]
    fn test_parse_4d_sform() {
        let bytes = nifti1(
            &[64, 64, 30, 120],
            &[3.0, 3.0, 3.5, 2.0],
            Some([[3.0, 0.0, 0.0, -90.0], [0.0, 3.0, 0.0, -120.0], [0.0, 0.0, 3.5, -60.0]]),
        );
        let header = NiftiHeader::parse(&bytes).unwrap();
        assert_eq!(header.version, 1);
        assert_eq!(header.ndim(), 4);
        assert_eq!(header.num_volumes(), 120);
        assert_eq!(header.repetition_time(), Some(2.0));
        assert_eq!(header.orientation().as_deref(), Some("RAS"));
    }

    #[test]
    fn test_parse_3d_base_affine() {
        let bytes = nifti1(&[176, 256, 256], &[1.0, 1.0, 1.0], None);
        let header = NiftiHeader::parse(&bytes).unwrap();
        assert_eq!(header.ndim(), 3);
        assert_eq!(header.num_volumes(), 1);
        assert_eq!(header.repetition_time(), None);
        assert_eq!(header.orientation().as_deref(), Some("LAS"));
    }

    #[test]
    fn test_parse_qform_quaternion() {
        let mut bytes = nifti1(&[64, 64, 30], &[2.0, 2.0, 2.0], None);
        LittleEndian::write_i16(&mut bytes[252..254], 1);
        // quatern_d = 1 -> 180 degrees about z
        LittleEndian::write_f32(&mut bytes[264..268], 1.0);
        let header = NiftiHeader::parse(&bytes).unwrap();
        assert_eq!(header.orientation().as_deref(), Some("LPS"));
    }

    #[test]
    fn test_parse_big_endian() {
        let mut buf = vec![0u8; NIFTI1_HEADER_SIZE];
        BigEndian::write_i32(&mut buf[0..4], 348);
        BigEndian::write_i16(&mut buf[40..42], 4);
        BigEndian::write_i16(&mut buf[48..50], 7);
        let header = NiftiHeader::parse(&buf).unwrap();
        assert_eq!(header.ndim(), 4);
        assert_eq!(header.num_volumes(), 7);
    }

    #[test]
    fn test_parse_nifti2() {
        let mut buf = vec![0u8; NIFTI2_HEADER_SIZE];
        LittleEndian::write_i32(&mut buf[0..4], 540);
        LittleEndian::write_i64(&mut buf[16..24], 4);
        LittleEndian::write_i64(&mut buf[48..56], 64);
        LittleEndian::write_f64(&mut buf[136..144], 1.5);
        let header = NiftiHeader::parse(&buf).unwrap();
        assert_eq!(header.version, 2);
        assert_eq!(header.num_volumes(), 64);
        assert_eq!(header.repetition_time(), Some(1.5));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(NiftiHeader::parse(b"not a header").is_err());
        assert!(NiftiHeader::parse(&[0u8; 2]).is_err());
        let mut short = vec![0u8; 100];
        LittleEndian::write_i32(&mut short[0..4], 348);
        assert!(NiftiHeader::parse(&short).is_err());
    }

    #[test]
    fn test_from_file_plain_and_gzip() {
        let dir = TempDir::new().unwrap();
        let bytes = nifti1(&[10, 10, 10, 5], &[1.0, 1.0, 1.0, 0.8], None);

        let plain = dir.path().join("plain.nii");
        std::fs::write(&plain, &bytes).unwrap();

        let gz = dir.path().join("packed.nii.gz");
        let mut encoder = GzEncoder::new(File::create(&gz).unwrap(), Compression::default());
        encoder.write_all(&bytes).unwrap();
        encoder.finish().unwrap();

        let a = NiftiHeader::from_file(&plain).unwrap();
        let b = NiftiHeader::from_file(&gz).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.num_volumes(), 5);
        assert_eq!(a.repetition_time(), Some(0.8));
    }
}

//! Fixture builders: minimal NIfTI-1 headers and JSON sidecars on disk

#![allow(dead_code)]

use byteorder::{ByteOrder, LittleEndian};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const HEADER_SIZE: usize = 348;

/// NIfTI-1 header with an RAS sform scaled by `zooms`
pub fn nifti1_header(dims: &[i16], zooms: [f32; 3], tr: f32) -> Vec<u8> {
    let mut buf = vec![0u8; HEADER_SIZE + 4];
    LittleEndian::write_i32(&mut buf[0..4], HEADER_SIZE as i32);
    LittleEndian::write_i16(&mut buf[40..42], dims.len() as i16);
    for (i, d) in dims.iter().enumerate() {
        LittleEndian::write_i16(&mut buf[42 + 2 * i..44 + 2 * i], *d);
    }

    let mut pixdim = vec![1.0f32, zooms[0], zooms[1], zooms[2]];
    if dims.len() >= 4 {
        pixdim.push(tr);
    }
    for (i, p) in pixdim.iter().enumerate() {
        LittleEndian::write_f32(&mut buf[76 + 4 * i..80 + 4 * i], *p);
    }

    LittleEndian::write_i16(&mut buf[254..256], 1);
    for (r, zoom) in zooms.iter().enumerate() {
        let off = 280 + 16 * r + 4 * r;
        LittleEndian::write_f32(&mut buf[off..off + 4], *zoom);
    }
    buf[344..348].copy_from_slice(b"n+1\0");
    buf
}

/// Writes a header-only image; `.nii.gz` paths are gzip-compressed
pub fn write_nifti(path: &Path, dims: &[i16]) -> PathBuf {
    let tr = if dims.len() >= 4 { 2.0 } else { 0.0 };
    let header = nifti1_header(dims, [2.0, 2.0, 2.0], tr);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }

    if path.to_string_lossy().ends_with(".gz") {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&header).unwrap();
        fs::write(path, encoder.finish().unwrap()).unwrap();
    } else {
        fs::write(path, header).unwrap();
    }
    path.to_path_buf()
}

pub fn write_sidecar(path: &Path, value: &Value) -> PathBuf {
    fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    path.to_path_buf()
}

/// Image plus sidecar sharing a stem
pub fn write_acquisition(dir: &Path, stem: &str, dims: &[i16], sidecar: &Value) -> PathBuf {
    let image = write_nifti(&dir.join(format!("{}.nii.gz", stem)), dims);
    write_sidecar(&dir.join(format!("{}.json", stem)), sidecar);
    image
}

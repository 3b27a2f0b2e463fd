use crate::error::{BidsmapError, Result};
use crate::extraction::discovery::{natural_sort, FileInventory};
use crate::preprocess::dicom::DicomInventory;
use log::{debug, info, warn};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Executable name looked up on `PATH`
pub const DCM2NIIX: &str = "dcm2niix";

/// Output file name pattern: acquisition time and series number
pub const DEFAULT_FILENAME_FORMAT: &str = "time-%t-sn-%s";

/// Default wall-clock limit for one conversion
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3600);

const FALLBACK_LOCATIONS: &[&str] = &[
    "/usr/bin/dcm2niix",
    "/usr/local/bin/dcm2niix",
    "/opt/dcm2niix/bin/dcm2niix",
];

/// Locates the converter on `PATH`, then in common install locations
pub fn find_dcm2niix() -> Option<PathBuf> {
    let on_path = std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths)
            .map(|dir| dir.join(DCM2NIIX))
            .find(|candidate| candidate.is_file())
    });
    on_path.or_else(|| {
        FALLBACK_LOCATIONS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.is_file())
    })
}

/// Result of one converter run
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    pub output_dir: PathBuf,
    /// Produced images, natural-sorted
    pub images: Vec<PathBuf>,
    pub stdout: String,
    pub stderr: String,
}

/// External DICOM to NIfTI converter
///
/// # Example
///
/// ```no_run
/// use bidsmap_core::preprocess::Dcm2niix;
/// use std::path::Path;
/// use std::time::Duration;
///
/// let converter = Dcm2niix::locate()
///     .unwrap()
///     .with_timeout(Duration::from_secs(600));
/// let output = converter.run(Path::new("/data/dicom"), Path::new("/work/nifti")).unwrap();
/// println!("{} images", output.images.len());
/// ```
#[derive(Debug, Clone)]
pub struct Dcm2niix {
    executable: PathBuf,
    filename_format: String,
    compress: bool,
    timeout: Duration,
}

impl Dcm2niix {
    pub fn new(executable: PathBuf) -> Self {
        Self {
            executable,
            filename_format: DEFAULT_FILENAME_FORMAT.to_string(),
            compress: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Uses the converter found by [`find_dcm2niix`]
    pub fn locate() -> Result<Self> {
        find_dcm2niix().map(Self::new).ok_or_else(|| {
            BidsmapError::ConversionError(format!("{} not found on PATH", DCM2NIIX))
        })
    }

    /// Builder: Set the output file name pattern
    pub fn with_filename_format(mut self, format: impl Into<String>) -> Self {
        self.filename_format = format.into();
        self
    }

    /// Builder: Write `.nii.gz` (true) or `.nii`
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Builder: Set the wall-clock limit
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Command-line arguments for one conversion
    pub fn arguments(&self, input_dir: &Path, output_dir: &Path) -> Vec<String> {
        vec![
            "-z".to_string(),
            if self.compress { "y" } else { "n" }.to_string(),
            "-f".to_string(),
            self.filename_format.clone(),
            "-o".to_string(),
            output_dir.to_string_lossy().to_string(),
            "-d".to_string(),
            "9".to_string(),
            "-ba".to_string(),
            "n".to_string(),
            input_dir.to_string_lossy().to_string(),
        ]
    }

    /// Converts `input_dir` into `output_dir`
    ///
    /// # Errors
    ///
    /// Returns [`BidsmapError::ConversionError`] when the process cannot be
    /// started, exceeds the timeout (it is killed), exits unsuccessfully or
    /// produces no images.
    pub fn run(&self, input_dir: &Path, output_dir: &Path) -> Result<ConversionOutput> {
        std::fs::create_dir_all(output_dir)?;
        let args = self.arguments(input_dir, output_dir);
        info!("Running: {} {}", self.executable.display(), args.join(" "));

        let mut child = Command::new(&self.executable)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                BidsmapError::ConversionError(format!(
                    "cannot start {}: {}",
                    self.executable.display(),
                    e
                ))
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() > self.timeout {
                warn!("{} timed out, killing it", DCM2NIIX);
                child.kill()?;
                child.wait()?;
                return Err(BidsmapError::ConversionError(format!(
                    "{} timed out after {} seconds",
                    DCM2NIIX,
                    self.timeout.as_secs()
                )));
            }
            thread::sleep(Duration::from_millis(100));
        };

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();
        debug!("{} output:\n{}", DCM2NIIX, stdout);

        let mut images = list_images(output_dir);
        natural_sort(&mut images);

        if !status.success() || images.is_empty() {
            return Err(BidsmapError::ConversionError(format!(
                "{} failed ({}): {}",
                DCM2NIIX,
                status,
                stderr.trim()
            )));
        }

        info!("Converted {} images", images.len());
        Ok(ConversionOutput {
            output_dir: output_dir.to_path_buf(),
            images,
            stdout,
            stderr,
        })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut text = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut text);
        }
        text
    })
}

fn list_images(dir: &Path) -> Vec<PathBuf> {
    let mut inventory = FileInventory::default();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            inventory.add(entry.path());
        }
    }
    inventory.images
}

/// Directory holding the images to analyse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedInput {
    pub data_dir: PathBuf,
    /// True when the converter produced `data_dir`
    pub converted: bool,
    /// Series found in DICOM input, `None` for NIfTI input
    pub dicom: Option<DicomInventory>,
}

/// Makes sure there are NIfTI images to analyse
///
/// Input that already holds images is used as-is. DICOM input is converted
/// into `work_dir/nifti`.
///
/// # Errors
///
/// Returns an error when neither images nor DICOM files are found, or when
/// the conversion fails.
pub fn prepare_input(input_dir: &Path, work_dir: &Path, timeout: Duration) -> Result<PreparedInput> {
    let inventory = FileInventory::scan(input_dir)?;
    if !inventory.images.is_empty() {
        info!("Found {} NIfTI files", inventory.images.len());
        return Ok(PreparedInput {
            data_dir: input_dir.to_path_buf(),
            converted: false,
            dicom: None,
        });
    }

    let dicom = DicomInventory::scan(input_dir)?;
    if dicom.is_empty() && dicom.unreadable.is_empty() {
        return Err(BidsmapError::ConversionError(format!(
            "no NIfTI or DICOM files found in {}",
            input_dir.display()
        )));
    }

    info!("DICOM input detected, converting: {}", dicom);
    let nifti_dir = work_dir.join("nifti");
    Dcm2niix::locate()?
        .with_timeout(timeout)
        .run(input_dir, &nifti_dir)?;
    Ok(PreparedInput {
        data_dir: nifti_dir,
        converted: true,
        dicom: Some(dicom),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_arguments() {
        let converter = Dcm2niix::new(PathBuf::from("/usr/bin/dcm2niix"));
        let args = converter.arguments(Path::new("/in"), Path::new("/out"));
        assert_eq!(
            args,
            vec!["-z", "y", "-f", "time-%t-sn-%s", "-o", "/out", "-d", "9", "-ba", "n", "/in"]
        );

        let args = converter
            .with_compression(false)
            .with_filename_format("%s")
            .arguments(Path::new("/in"), Path::new("/out"));
        assert_eq!(&args[..4], &["-z", "n", "-f", "%s"]);
    }

    #[test]
    fn test_prepare_input_uses_existing_images() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("t1.nii"), b"").unwrap();
        let prepared =
            prepare_input(temp_dir.path(), &temp_dir.path().join("work"), DEFAULT_TIMEOUT).unwrap();
        assert_eq!(prepared.data_dir, temp_dir.path());
        assert!(!prepared.converted);
        assert!(prepared.dicom.is_none());
    }

    #[test]
    fn test_prepare_input_without_data_fails() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), b"").unwrap();
        let err = prepare_input(temp_dir.path(), &temp_dir.path().join("work"), DEFAULT_TIMEOUT)
            .unwrap_err();
        assert!(matches!(err, BidsmapError::ConversionError(_)));
    }

    #[test]
    fn test_missing_executable_fails_to_start() {
        let temp_dir = TempDir::new().unwrap();
        let converter = Dcm2niix::new(temp_dir.path().join("no-such-binary"));
        let err = converter
            .run(temp_dir.path(), &temp_dir.path().join("out"))
            .unwrap_err();
        assert!(err.to_string().contains("cannot start"));
    }
}

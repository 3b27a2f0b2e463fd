pub mod report;

use crate::export::DEFAULT_CONFIG_FILE;
use crate::types::LinkMode;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Command-line arguments for bidsmap
#[derive(Parser, Debug)]
#[command(name = "bidsmap")]
#[command(about = "Classify neuroimaging acquisitions and lay them out as a BIDS dataset")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Classify every image and write the manifest
    Analyze {
        #[command(flatten)]
        input: InputArgs,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
    /// Classify every image, then write the BIDS tree
    Convert {
        #[command(flatten)]
        input: InputArgs,

        /// How source files are placed in the tree
        #[arg(short, long, default_value = "hardlink")]
        link_mode: LinkModeArg,
    },
    /// Write a BIDS tree from an existing manifest
    Apply {
        /// Manifest written by `analyze`
        #[arg(value_name = "MANIFEST")]
        manifest: PathBuf,

        /// Directory that receives the dataset
        #[arg(value_name = "OUTPUT_DIR")]
        output_dir: PathBuf,

        /// How source files are placed in the tree
        #[arg(short, long, default_value = "hardlink")]
        link_mode: LinkModeArg,

        /// BIDS schema snapshot (JSON) replacing the built-in one
        #[arg(long, value_name = "FILE")]
        schema: Option<PathBuf>,
    },
    /// Analyse the input and export a reusable configuration template
    InitConfig {
        /// Directory of NIfTI images with sidecars, or of DICOM files
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Configuration file to write
        #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_FILE)]
        output: PathBuf,

        /// BIDS schema snapshot (JSON) replacing the built-in one
        #[arg(long, value_name = "FILE")]
        schema: Option<PathBuf>,

        /// Converter timeout in seconds
        #[arg(long, default_value_t = 3600)]
        timeout: u64,
    },
}

/// Arguments shared by `analyze` and `convert`
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Directory of NIfTI images with sidecars, or of DICOM files
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output directory (defaults to the input directory)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Dataset configuration (YAML)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// BIDS schema snapshot (JSON) replacing the built-in one
    #[arg(long, value_name = "FILE")]
    pub schema: Option<PathBuf>,

    /// Converter timeout in seconds
    #[arg(long, default_value_t = 3600)]
    pub timeout: u64,
}

impl InputArgs {
    pub fn output_dir(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| self.input.clone())
    }
}

/// Output format options
#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    Text,
    /// JSON manifest
    Json,
}

/// File placement options
#[derive(Debug, Clone, ValueEnum)]
pub enum LinkModeArg {
    /// Hard link, copying when linking fails
    Hardlink,
    /// Symbolic link to the absolute source path
    Symlink,
    /// Plain copy
    Copy,
}

impl From<LinkModeArg> for LinkMode {
    fn from(arg: LinkModeArg) -> Self {
        match arg {
            LinkModeArg::Hardlink => LinkMode::Hardlink,
            LinkModeArg::Symlink => LinkMode::Symlink,
            LinkModeArg::Copy => LinkMode::Copy,
        }
    }
}

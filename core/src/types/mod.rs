//! Core type definitions for the BIDS layout engine
//!
//! - [`Record`]: one acquisition, mutated stage by stage through the pipeline
//! - [`ImageType`]: ordered sidecar `ImageType` tags
//! - [`Entities`]: ordered BIDS entity labels
//! - [`LinkMode`] / [`FileKind`]: output materialisation and file kinds
//! - [`DatasetConfig`]: dataset-level overrides loaded from YAML

mod config;
mod entities;
mod enums;
mod image_type;
mod record;

pub use config::{DatasetConfig, DatasetSection, DEFAULT_BIDS_VERSION, DEFAULT_DATASET_NAME};
pub use entities::{Entities, IDENTITY_ENTITIES};
pub use enums::{FileKind, LinkMode};
pub use image_type::ImageType;
pub use record::{
    Record, DEFAULT_ACQUISITION_DATE, DEFAULT_ACQUISITION_TIME, DEFAULT_BIRTH_DATE,
    NOT_AVAILABLE, UNIDENTIFIED_ERROR, UNIDENTIFIED_MESSAGE,
};

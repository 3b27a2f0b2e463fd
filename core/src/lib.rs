pub mod api;
pub mod classify;
pub mod cli;
pub mod entities;
pub mod error;
pub mod export;
pub mod extraction;
pub mod layout;
pub mod manifest;
pub mod organize;
pub mod preprocess;
pub mod schema;
pub mod types;

pub use api::{Analysis, Pipeline};
pub use classify::DatatypeClassifier;
pub use cli::report::TextReport;
pub use entities::EntityExtractor;
pub use error::{BidsmapError, Result};
pub use export::{export_config, ExportedConfig};
pub use extraction::MetadataExtractor;
pub use layout::{DatasetWriter, LayoutBuilder, PlannedName, WriteReport};
pub use manifest::Manifest;
pub use organize::{IdentityOrganizer, SeriesDeduplicator, SeriesView};
pub use schema::{BidsSchema, SchemaService};
pub use types::*;

//! Identity and series grouping
//!
//! - [`IdentityOrganizer`]: total sort order, subject/session indices
//! - [`SeriesDeduplicator`]: shared series indices by acquisition key
//! - [`SeriesView`]: per-series projection rebuilt from records

pub mod identity;
pub mod series;

pub use identity::IdentityOrganizer;
pub use series::{SeriesDeduplicator, SeriesKey, SeriesView};

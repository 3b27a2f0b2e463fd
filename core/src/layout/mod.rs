//! Output layout
//!
//! [`LayoutBuilder`] plans collision-free BIDS paths; [`DatasetWriter`]
//! materialises a manifest on disk using those plans.

pub mod builder;
pub mod writer;

pub use builder::{LayoutBuilder, PlannedName};
pub use writer::{sanitize_name, DatasetWriter, WriteReport};

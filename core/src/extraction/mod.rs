pub mod direction;
pub mod discovery;
pub mod identity;
pub mod metadata;
pub mod nifti;
pub mod orientation;
pub mod sidecar;

pub use direction::phase_encoding_label;
pub use discovery::{file_stem, natural_cmp, natural_sort, FileInventory};
pub use identity::{
    compute_age, extract_label, extract_subject_session, sequence_subject_labels, IdentityKey,
};
pub use metadata::{modified_series_number, synthetic_sidecar, MetadataExtractor};
pub use nifti::NiftiHeader;
pub use orientation::axis_codes;

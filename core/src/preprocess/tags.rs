use dicom_core::Tag;
use dicom_object::InMemDicomObject;

// Patient Tags
pub const PATIENT_NAME: Tag = Tag(0x0010, 0x0010);
pub const PATIENT_ID: Tag = Tag(0x0010, 0x0020);

// Series Identification Tags
pub const SERIES_INSTANCE_UID: Tag = Tag(0x0020, 0x000E);
pub const SERIES_NUMBER: Tag = Tag(0x0020, 0x0011);

// Description Tags
pub const SERIES_DESCRIPTION: Tag = Tag(0x0008, 0x103E);
pub const PROTOCOL_NAME: Tag = Tag(0x0018, 0x1030);
pub const MODALITY: Tag = Tag(0x0008, 0x0060);

/// Helper to get string value from DICOM tag
///
/// Returns `None` if the tag is not present, cannot be converted to string
/// or is blank
pub fn get_string_value(dcm: &InMemDicomObject, tag: Tag) -> Option<String> {
    dcm.element(tag)
        .ok()
        .and_then(|elem| elem.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Helper to get integer value from DICOM tag
pub fn get_int_value(dcm: &InMemDicomObject, tag: Tag) -> Option<i32> {
    dcm.element(tag)
        .ok()
        .and_then(|elem| elem.to_int::<i32>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom_core::{DataElement, PrimitiveValue, VR};

    #[test]
    fn test_tag_values() {
        assert_eq!(SERIES_INSTANCE_UID, Tag(0x0020, 0x000E));
        assert_eq!(SERIES_DESCRIPTION, Tag(0x0008, 0x103E));
        assert_eq!(PROTOCOL_NAME, Tag(0x0018, 0x1030));
    }

    #[test]
    fn test_value_helpers() {
        let mut dcm = InMemDicomObject::new_empty();
        dcm.put(DataElement::new(
            SERIES_DESCRIPTION,
            VR::LO,
            PrimitiveValue::from("T1_MPRAGE "),
        ));
        dcm.put(DataElement::new(SERIES_NUMBER, VR::IS, PrimitiveValue::from("7")));
        dcm.put(DataElement::new(PATIENT_NAME, VR::PN, PrimitiveValue::from("  ")));

        assert_eq!(
            get_string_value(&dcm, SERIES_DESCRIPTION).as_deref(),
            Some("T1_MPRAGE")
        );
        assert_eq!(get_int_value(&dcm, SERIES_NUMBER), Some(7));
        assert_eq!(get_string_value(&dcm, PATIENT_NAME), None);
        assert_eq!(get_string_value(&dcm, PATIENT_ID), None);
    }
}

use dicom_core::Tag;
use dicom_dictionary_std::tags;
use dicom_object::InMemDicomObject;

use crate::study::StudyTags;

/// Helper to get string value from DICOM tag
///
/// Returns `None` if the tag is not present or cannot be converted to string
pub fn string_value(dcm: &InMemDicomObject, tag: Tag) -> Option<String> {
    dcm.element(tag)
        .ok()
        .and_then(|elem| elem.to_str().ok())
        .map(|s| s.trim().to_string())
}

/// Helper to get integer value from DICOM tag
pub fn int_value(dcm: &InMemDicomObject, tag: Tag) -> Option<i32> {
    dcm.element(tag)
        .ok()
        .and_then(|elem| elem.to_int::<i32>().ok())
}

/// Helper to get a single float value from DICOM tag
pub fn f64_value(dcm: &InMemDicomObject, tag: Tag) -> Option<f64> {
    dcm.element(tag)
        .ok()
        .and_then(|elem| elem.to_float64().ok())
}

/// Helper to get multi-valued floats from DICOM tag (e.g. positions, cosines)
pub fn multi_f64_value(dcm: &InMemDicomObject, tag: Tag) -> Option<Vec<f64>> {
    dcm.element(tag)
        .ok()
        .and_then(|elem| elem.to_multi_float64().ok())
}

/// Extracts the identifying tags used for output naming
pub fn study_tags(dcm: &InMemDicomObject) -> StudyTags {
    StudyTags {
        patient_id: string_value(dcm, tags::PATIENT_ID),
        series_uid: string_value(dcm, tags::SERIES_INSTANCE_UID),
        series_description: string_value(dcm, tags::SERIES_DESCRIPTION),
        series_number: int_value(dcm, tags::SERIES_NUMBER),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom_core::{DataElement, PrimitiveValue, VR};

    fn sample_object() -> InMemDicomObject {
        let mut dcm = InMemDicomObject::new_empty();
        dcm.put(DataElement::new(
            tags::PATIENT_ID,
            VR::LO,
            PrimitiveValue::from("PAT001 "),
        ));
        dcm.put(DataElement::new(
            tags::SERIES_NUMBER,
            VR::IS,
            PrimitiveValue::from("3"),
        ));
        dcm.put(DataElement::new(
            tags::IMAGE_POSITION_PATIENT,
            VR::DS,
            PrimitiveValue::Strs(
                vec!["-12.5".to_string(), "0".to_string(), "4.0".to_string()].into(),
            ),
        ));
        dcm
    }

    #[test]
    fn test_string_value_trims() {
        let dcm = sample_object();
        assert_eq!(
            string_value(&dcm, tags::PATIENT_ID),
            Some("PAT001".to_string())
        );
        assert_eq!(string_value(&dcm, tags::SERIES_DESCRIPTION), None);
    }

    #[test]
    fn test_int_value() {
        let dcm = sample_object();
        assert_eq!(int_value(&dcm, tags::SERIES_NUMBER), Some(3));
    }

    #[test]
    fn test_multi_f64_value() {
        let dcm = sample_object();
        let pos = multi_f64_value(&dcm, tags::IMAGE_POSITION_PATIENT).unwrap();
        assert_eq!(pos, vec![-12.5, 0.0, 4.0]);
    }

    #[test]
    fn test_study_tags_extraction() {
        let tags = study_tags(&sample_object());
        assert_eq!(tags.patient_id, Some("PAT001".to_string()));
        assert_eq!(tags.series_number, Some(3));
        assert_eq!(tags.series_description, None);
    }
}

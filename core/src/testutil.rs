//! Shared test fixtures: synthetic DICOM slices written the way scanners
//! produce them (explicit VR little endian, native 16-bit pixel data).

use dicom_core::{DataElement, PrimitiveValue, VR};
use dicom_dictionary_std::{tags, StandardDataDictionary};
use dicom_object::meta::FileMetaTableBuilder;
use dicom_object::{FileDicomObject, InMemDicomObject};
use std::path::Path;

const CT_SOP_CLASS: &str = "1.2.840.10008.5.1.4.1.1.2";
const EXPLICIT_VR_LE: &str = "1.2.840.10008.1.2.1";

/// Builds one synthetic CT slice at position (0, 0, z)
pub fn ct_slice(
    series_uid: &str,
    instance: i32,
    z: f64,
    rows: u16,
    cols: u16,
    values: Vec<u16>,
) -> FileDicomObject<InMemDicomObject> {
    assert_eq!(values.len(), rows as usize * cols as usize);

    let sop_instance = format!("1.2.826.0.1.{}.{}", series_uid.len(), instance);
    let meta = FileMetaTableBuilder::new()
        .media_storage_sop_class_uid(CT_SOP_CLASS)
        .media_storage_sop_instance_uid(sop_instance.as_str())
        .transfer_syntax(EXPLICIT_VR_LE)
        .build()
        .unwrap();

    let mut obj = FileDicomObject::new_empty_with_dict_and_meta(StandardDataDictionary, meta);

    put_str(&mut obj, tags::SOP_CLASS_UID, VR::UI, CT_SOP_CLASS);
    put_str(&mut obj, tags::SOP_INSTANCE_UID, VR::UI, &sop_instance);
    put_str(&mut obj, tags::MODALITY, VR::CS, "CT");
    put_str(&mut obj, tags::PATIENT_ID, VR::LO, "PAT001");
    put_str(&mut obj, tags::SERIES_INSTANCE_UID, VR::UI, series_uid);
    put_str(&mut obj, tags::INSTANCE_NUMBER, VR::IS, &instance.to_string());

    obj.put(DataElement::new(
        tags::IMAGE_POSITION_PATIENT,
        VR::DS,
        PrimitiveValue::Strs(vec!["0".to_string(), "0".to_string(), z.to_string()].into()),
    ));
    obj.put(DataElement::new(
        tags::IMAGE_ORIENTATION_PATIENT,
        VR::DS,
        PrimitiveValue::Strs(
            vec!["1", "0", "0", "0", "1", "0"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
                .into(),
        ),
    ));
    obj.put(DataElement::new(
        tags::PIXEL_SPACING,
        VR::DS,
        PrimitiveValue::Strs(vec!["1".to_string(), "1".to_string()].into()),
    ));
    put_str(&mut obj, tags::SLICE_THICKNESS, VR::DS, "2");

    obj.put(DataElement::new(
        tags::ROWS,
        VR::US,
        PrimitiveValue::from(rows),
    ));
    obj.put(DataElement::new(
        tags::COLUMNS,
        VR::US,
        PrimitiveValue::from(cols),
    ));
    obj.put(DataElement::new(
        tags::BITS_ALLOCATED,
        VR::US,
        PrimitiveValue::from(16u16),
    ));
    obj.put(DataElement::new(
        tags::BITS_STORED,
        VR::US,
        PrimitiveValue::from(16u16),
    ));
    obj.put(DataElement::new(
        tags::HIGH_BIT,
        VR::US,
        PrimitiveValue::from(15u16),
    ));
    obj.put(DataElement::new(
        tags::PIXEL_REPRESENTATION,
        VR::US,
        PrimitiveValue::from(0u16),
    ));
    obj.put(DataElement::new(
        tags::SAMPLES_PER_PIXEL,
        VR::US,
        PrimitiveValue::from(1u16),
    ));
    put_str(&mut obj, tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "MONOCHROME2");

    obj.put(DataElement::new(
        tags::PIXEL_DATA,
        VR::OW,
        PrimitiveValue::U16(values.into()),
    ));

    obj
}

/// Builds one multi-frame CT object carrying a whole stack in a single file
pub fn multi_frame_ct(
    series_uid: &str,
    frames: u16,
    rows: u16,
    cols: u16,
    values: Vec<u16>,
) -> FileDicomObject<InMemDicomObject> {
    assert_eq!(
        values.len(),
        frames as usize * rows as usize * cols as usize
    );

    let mut obj = ct_slice(series_uid, 1, 0.0, rows, cols, vec![0; rows as usize * cols as usize]);
    put_str(&mut obj, tags::NUMBER_OF_FRAMES, VR::IS, &frames.to_string());
    obj.put(DataElement::new(
        tags::PIXEL_DATA,
        VR::OW,
        PrimitiveValue::U16(values.into()),
    ));
    obj
}

fn put_str(obj: &mut FileDicomObject<InMemDicomObject>, tag: dicom_core::Tag, vr: VR, value: &str) {
    obj.put(DataElement::new(tag, vr, PrimitiveValue::from(value)));
}

/// Writes slices into a directory as numbered .dcm files
pub fn write_slices(dir: &Path, slices: &[FileDicomObject<InMemDicomObject>]) {
    for (i, obj) in slices.iter().enumerate() {
        obj.write_to_file(dir.join(format!("slice{:03}.dcm", i)))
            .unwrap();
    }
}

/// Writes a small valid study directory with `count` slices at the given
/// z step, all filled with a constant intensity ramp per slice
pub fn write_study(dir: &Path, series_uid: &str, count: usize, z_step: f64) {
    let slices: Vec<_> = (0..count)
        .map(|i| {
            ct_slice(
                series_uid,
                i as i32 + 1,
                i as f64 * z_step,
                4,
                4,
                vec![(i as u16 + 1) * 100; 16],
            )
        })
        .collect();
    write_slices(dir, &slices);
}

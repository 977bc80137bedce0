//! DICOM Part 10 parsing collaborator: extracts the identifying attributes
//! the storage layer needs, and projects a parsed object into the PS3.18
//! Annex F JSON element map (minus PixelData) for metadata responses.

use std::io::Cursor;

use dicom_core::Tag;
use dicom_dictionary_std::tags;
use dicom_object::mem::InMemElement;
use dicom_object::{FileDicomObject, InMemDicomObject, OpenFileOptions};
use thiserror::Error;

use crate::json::DicomJsonObject;

const PIXEL_DATA: Tag = tags::PIXEL_DATA;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to parse DICOM Part 10 stream: {0}")]
    Parse(String),
    #[error("required attribute {0:?} missing from dataset")]
    MissingAttribute(Tag),
}

/// The scalar header extracted from a stored instance, used to seed/derive
/// Series and Study aggregates (spec §3).
#[derive(Debug, Clone, Default)]
pub struct InstanceHeader {
    pub study_instance_uid: String,
    pub series_instance_uid: String,
    pub sop_instance_uid: String,
    pub sop_class_uid: Option<String>,
    pub transfer_syntax_uid: Option<String>,

    pub patient_name: Option<String>,
    pub patient_id: Option<String>,
    pub patient_birth_date: Option<String>,
    pub patient_sex: Option<String>,

    pub study_date: Option<String>,
    pub study_time: Option<String>,
    pub accession_number: Option<String>,
    pub study_description: Option<String>,
    pub referring_physician_name: Option<String>,
    pub study_id: Option<String>,

    pub modality: Option<String>,
    pub series_number: Option<String>,
    pub series_description: Option<String>,
    pub body_part_examined: Option<String>,
    pub series_date: Option<String>,
    pub series_time: Option<String>,
    pub performing_physician_name: Option<String>,
    pub instance_number: Option<String>,
}

/// Parses a DICOM Part 10 byte stream far enough to read the dataset
/// (stopping before pixel data for speed) and extract the identifying
/// attributes. Returns `Err` only when the bytes cannot be parsed as DICOM
/// at all; per spec §4.2, callers should still store the bytes on parse
/// failure and simply leave the header's optional scalars absent.
pub fn parse_instance(bytes: &[u8]) -> Result<(FileDicomObject<InMemDicomObject>, InstanceHeader), CodecError> {
    let cursor = Cursor::new(bytes);
    let obj = OpenFileOptions::new()
        .read_until(PIXEL_DATA)
        .from_reader(cursor)
        .map_err(|e| CodecError::Parse(e.to_string()))?;

    let study_instance_uid = element_str(&obj, tags::STUDY_INSTANCE_UID)
        .ok_or(CodecError::MissingAttribute(tags::STUDY_INSTANCE_UID))?;
    let series_instance_uid = element_str(&obj, tags::SERIES_INSTANCE_UID)
        .ok_or(CodecError::MissingAttribute(tags::SERIES_INSTANCE_UID))?;
    let sop_instance_uid = element_str(&obj, tags::SOP_INSTANCE_UID)
        .ok_or(CodecError::MissingAttribute(tags::SOP_INSTANCE_UID))?;

    let transfer_syntax_uid = Some(obj.meta().transfer_syntax().to_string());

    let header = InstanceHeader {
        study_instance_uid,
        series_instance_uid,
        sop_instance_uid,
        sop_class_uid: element_str(&obj, tags::SOP_CLASS_UID),
        transfer_syntax_uid,
        patient_name: element_str(&obj, tags::PATIENT_NAME),
        patient_id: element_str(&obj, tags::PATIENT_ID),
        patient_birth_date: element_str(&obj, tags::PATIENT_BIRTH_DATE),
        patient_sex: element_str(&obj, tags::PATIENT_SEX),
        study_date: element_str(&obj, tags::STUDY_DATE),
        study_time: element_str(&obj, tags::STUDY_TIME),
        accession_number: element_str(&obj, tags::ACCESSION_NUMBER),
        study_description: element_str(&obj, tags::STUDY_DESCRIPTION),
        referring_physician_name: element_str(&obj, tags::REFERRING_PHYSICIAN_NAME),
        study_id: element_str(&obj, tags::STUDY_ID),
        modality: element_str(&obj, tags::MODALITY),
        series_number: element_str(&obj, tags::SERIES_NUMBER),
        series_description: element_str(&obj, tags::SERIES_DESCRIPTION),
        body_part_examined: element_str(&obj, tags::BODY_PART_EXAMINED),
        series_date: element_str(&obj, tags::SERIES_DATE),
        series_time: element_str(&obj, tags::SERIES_TIME),
        performing_physician_name: element_str(&obj, tags::PERFORMING_PHYSICIAN_NAME),
        instance_number: element_str(&obj, tags::INSTANCE_NUMBER),
    };

    Ok((obj, header))
}

fn element_str(obj: &FileDicomObject<InMemDicomObject>, tag: Tag) -> Option<String> {
    obj.element(tag)
        .ok()
        .and_then(|e| e.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Projects every element of a parsed instance into the Annex F JSON model,
/// dropping PixelData as required by the metadata endpoints (spec §4.5).
///
/// Delegates the actual VR/value encoding to `dicom-json`, which already
/// implements the Annex F rules (PN as `{"Alphabetic": ...}`, SQ as nested
/// objects, numeric VRs as numbers); PixelData is stripped beforehand by
/// copying every other element into a fresh in-memory object.
pub fn project_metadata(obj: &FileDicomObject<InMemDicomObject>) -> DicomJsonObject {
    let mut without_pixels = InMemDicomObject::new_empty();
    for element in obj.iter() {
        if element.header().tag == PIXEL_DATA {
            continue;
        }
        without_pixels.put(element.clone());
    }

    match dicom_json::to_value(&without_pixels) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => DicomJsonObject::new(),
    }
}

//! PS3.18 Annex F ("DICOM JSON Model") projection: serialises tag/value
//! pairs derived from our own Study/Series/Instance aggregates into the
//! `{"GGGGEEEE": {"vr": "..", "Value": [..]}}` shape (spec §4.9).
//!
//! Metadata responses built from a fully parsed DICOM object instead use
//! `dicom-json` directly (see [`crate::codec::project_metadata`]); this
//! module is for the aggregate-derived search/metadata fields the storage
//! layer assembles itself.

use serde_json::{json, Map, Value};
use std::collections::HashSet;

pub type DicomJsonObject = Map<String, Value>;

/// Inserts a single-valued string attribute, skipping it entirely when
/// absent (DICOM JSON omits unknown attributes rather than emitting nulls).
pub fn put_str(obj: &mut DicomJsonObject, tag: &str, vr: &str, value: &Option<String>) {
    if let Some(v) = value.as_ref().filter(|v| !v.is_empty()) {
        obj.insert(tag.to_string(), json!({ "vr": vr, "Value": [v] }));
    }
}

/// Inserts a Person Name (VR `PN`) attribute using the `{"Alphabetic": ..}`
/// component group required by Annex F.
pub fn put_pn(obj: &mut DicomJsonObject, tag: &str, value: &Option<String>) {
    if let Some(v) = value.as_ref().filter(|v| !v.is_empty()) {
        obj.insert(
            tag.to_string(),
            json!({ "vr": "PN", "Value": [{ "Alphabetic": v }] }),
        );
    }
}

/// Inserts a multi-valued string/code attribute (e.g. `ModalitiesInStudy`).
/// Values are sorted for a deterministic wire order since the source sets
/// (e.g. `StudyRecord::modalities_in_study`) are unordered.
pub fn put_multi(obj: &mut DicomJsonObject, tag: &str, vr: &str, values: &HashSet<String>) {
    if !values.is_empty() {
        let mut sorted: Vec<&String> = values.iter().collect();
        sorted.sort();
        let arr: Vec<Value> = sorted.into_iter().map(|v| json!(v)).collect();
        obj.insert(tag.to_string(), json!({ "vr": vr, "Value": arr }));
    }
}

/// Inserts an integer-valued attribute encoded per IS/US convention: DICOM
/// JSON represents IS as numbers.
pub fn put_int(obj: &mut DicomJsonObject, tag: &str, vr: &str, value: i64) {
    obj.insert(tag.to_string(), json!({ "vr": vr, "Value": [value] }));
}

/// Inserts a Sequence (VR `SQ`) attribute: `items` are nested DICOM JSON
/// objects, one per sequence item.
pub fn put_sq(obj: &mut DicomJsonObject, tag: &str, items: Vec<DicomJsonObject>) {
    if !items.is_empty() {
        let arr: Vec<Value> = items.into_iter().map(Value::Object).collect();
        obj.insert(tag.to_string(), json!({ "vr": "SQ", "Value": arr }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_str_skips_absent_values() {
        let mut obj = DicomJsonObject::new();
        put_str(&mut obj, "00080050", "SH", &None);
        assert!(obj.is_empty());
    }

    #[test]
    fn put_pn_wraps_alphabetic_component() {
        let mut obj = DicomJsonObject::new();
        put_pn(&mut obj, "00100010", &Some("DOE^JOHN".to_string()));
        assert_eq!(
            obj["00100010"]["Value"][0]["Alphabetic"],
            Value::String("DOE^JOHN".to_string())
        );
    }

    #[test]
    fn put_multi_collects_set_members() {
        let mut obj = DicomJsonObject::new();
        let mut set = HashSet::new();
        set.insert("CT".to_string());
        set.insert("MR".to_string());
        put_multi(&mut obj, "00080061", "CS", &set);
        let values = obj["00080061"]["Value"].as_array().unwrap();
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn put_int_emits_number() {
        let mut obj = DicomJsonObject::new();
        put_int(&mut obj, "00201206", "IS", 3);
        assert_eq!(obj["00201206"]["Value"][0], json!(3));
    }
}

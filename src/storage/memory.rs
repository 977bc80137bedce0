//! Reference `StorageProvider` implementation: a process-wide map of
//! Study -> Series -> Instance guarded by a single `RwLock` (spec §4.2,
//! §5 "single-owner serialised entity").

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::codec;
use crate::identity::{wildcard_match, DateRange, StorageQuery};
use crate::json::DicomJsonObject;

use super::{
    DeleteMode, InstanceInfo, SeriesRecord, StorageFailure, StorageProvider, StudyRecord,
};

#[derive(Debug, Clone, Default)]
struct InstanceEntry {
    bytes: Vec<u8>,
    sop_class_uid: Option<String>,
    transfer_syntax_uid: Option<String>,
    instance_number: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct SeriesScalars {
    modality: Option<String>,
    series_number: Option<String>,
    series_description: Option<String>,
    body_part_examined: Option<String>,
    series_date: Option<String>,
    series_time: Option<String>,
    performing_physician_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct SeriesEntry {
    seeded: bool,
    scalars: SeriesScalars,
    instances: HashMap<String, InstanceEntry>,
}

#[derive(Debug, Clone, Default)]
struct StudyScalars {
    patient_name: Option<String>,
    patient_id: Option<String>,
    patient_birth_date: Option<String>,
    patient_sex: Option<String>,
    study_date: Option<String>,
    study_time: Option<String>,
    accession_number: Option<String>,
    study_description: Option<String>,
    referring_physician_name: Option<String>,
    study_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct StudyEntry {
    seeded: bool,
    scalars: StudyScalars,
    series: HashMap<String, SeriesEntry>,
}

#[derive(Debug, Default)]
struct MemoryState {
    studies: HashMap<String, StudyEntry>,
    soft_deleted: HashSet<String>,
}

fn soft_key(study: &str, series: &str, instance: &str) -> String {
    format!("{study}/{series}/{instance}")
}

/// The reference in-memory backend (spec §4.2). Ephemeral: all state is
/// lost on process exit.
#[derive(Default)]
pub struct MemoryBackend {
    state: RwLock<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn compute_series_record(series_uid: &str, entry: &SeriesEntry, live_count: usize) -> SeriesRecord {
    SeriesRecord {
        series_instance_uid: series_uid.to_string(),
        modality: entry.scalars.modality.clone(),
        series_number: entry.scalars.series_number.clone(),
        series_description: entry.scalars.series_description.clone(),
        body_part_examined: entry.scalars.body_part_examined.clone(),
        series_date: entry.scalars.series_date.clone(),
        series_time: entry.scalars.series_time.clone(),
        performing_physician_name: entry.scalars.performing_physician_name.clone(),
        instance_count: live_count,
    }
}

fn live_instance_count(study: &str, series_uid: &str, entry: &SeriesEntry, soft_deleted: &HashSet<String>) -> usize {
    entry
        .instances
        .keys()
        .filter(|instance| !soft_deleted.contains(&soft_key(study, series_uid, instance)))
        .count()
}

fn compute_study_record(study_uid: &str, entry: &StudyEntry, soft_deleted: &HashSet<String>) -> StudyRecord {
    let mut modalities_in_study = HashSet::new();
    let mut sop_classes_in_study = HashSet::new();
    let mut series_count = 0usize;
    let mut instance_count = 0usize;

    for (series_uid, series) in &entry.series {
        let live = live_instance_count(study_uid, series_uid, series, soft_deleted);
        if live == 0 {
            continue;
        }
        series_count += 1;
        instance_count += live;
        if let Some(modality) = &series.scalars.modality {
            modalities_in_study.insert(modality.clone());
        }
        for (instance_uid, instance) in &series.instances {
            if soft_deleted.contains(&soft_key(study_uid, series_uid, instance_uid)) {
                continue;
            }
            if let Some(sop_class) = &instance.sop_class_uid {
                sop_classes_in_study.insert(sop_class.clone());
            }
        }
    }

    StudyRecord {
        study_instance_uid: study_uid.to_string(),
        patient_name: entry.scalars.patient_name.clone(),
        patient_id: entry.scalars.patient_id.clone(),
        patient_birth_date: entry.scalars.patient_birth_date.clone(),
        patient_sex: entry.scalars.patient_sex.clone(),
        study_date: entry.scalars.study_date.clone(),
        study_time: entry.scalars.study_time.clone(),
        accession_number: entry.scalars.accession_number.clone(),
        study_description: entry.scalars.study_description.clone(),
        referring_physician_name: entry.scalars.referring_physician_name.clone(),
        study_id: entry.scalars.study_id.clone(),
        modalities_in_study,
        sop_classes_in_study,
        series_count,
        instance_count,
    }
}

fn matches_wildcard_or_exact(field: &Option<String>, query: &Option<String>, fuzzy: bool) -> bool {
    match query {
        None => true,
        Some(q) => match field {
            Some(v) => wildcard_match(q, v, fuzzy),
            None => false,
        },
    }
}

fn matches_exact(field: &Option<String>, query: &Option<String>) -> bool {
    match query {
        None => true,
        Some(q) => field.as_deref() == Some(q.as_str()),
    }
}

fn matches_date(field: &Option<String>, query: &Option<DateRange>) -> bool {
    match query {
        None => true,
        Some(range) => match field {
            Some(v) => range.contains(v),
            None => false,
        },
    }
}

fn study_matches(query: &StorageQuery, record: &StudyRecord) -> bool {
    matches_exact(&Some(record.study_instance_uid.clone()), &query.study_instance_uid)
        && matches_wildcard_or_exact(&record.patient_name, &query.patient_name, query.fuzzy_matching)
        && matches_wildcard_or_exact(&record.patient_id, &query.patient_id, query.fuzzy_matching)
        && matches_date(&record.study_date, &query.study_date)
        && matches_date(&record.study_time, &query.study_time)
        && matches_exact(&record.accession_number, &query.accession_number)
        && matches_wildcard_or_exact(&record.study_description, &query.study_description, query.fuzzy_matching)
        && matches_wildcard_or_exact(
            &record.referring_physician_name,
            &query.referring_physician_name,
            query.fuzzy_matching,
        )
        && match &query.modality {
            None => true,
            Some(m) => record.modalities_in_study.contains(m),
        }
        && match &query.modalities_in_study {
            None => true,
            Some(set) => crate::identity::set_intersects(set, &record.modalities_in_study),
        }
}

fn series_matches(query: &StorageQuery, record: &SeriesRecord) -> bool {
    matches_exact(&Some(record.series_instance_uid.clone()), &query.series_instance_uid)
        && matches_exact(&record.modality, &query.modality)
        && matches_wildcard_or_exact(&record.series_description, &query.series_description, query.fuzzy_matching)
        && matches_exact(&record.series_number, &query.series_number)
}

fn instance_matches(query: &StorageQuery, info: &InstanceInfo) -> bool {
    matches_exact(&Some(info.sop_instance_uid.clone()), &query.sop_instance_uid)
        && matches_exact(&info.instance_number, &query.instance_number)
}

fn paginate<T>(mut items: Vec<T>, offset: usize, limit: usize) -> Vec<T> {
    if offset >= items.len() {
        return Vec::new();
    }
    let end = items.len().min(offset.saturating_add(limit));
    items.drain(offset..end).collect()
}

#[async_trait]
impl StorageProvider for MemoryBackend {
    async fn get_instance(
        &self,
        study: &str,
        series: &str,
        instance: &str,
    ) -> Result<Option<Vec<u8>>, StorageFailure> {
        let state = self.state.read().await;
        if state.soft_deleted.contains(&soft_key(study, series, instance)) {
            return Ok(None);
        }
        Ok(state
            .studies
            .get(study)
            .and_then(|s| s.series.get(series))
            .and_then(|se| se.instances.get(instance))
            .map(|i| i.bytes.clone()))
    }

    async fn get_series_instances(
        &self,
        study: &str,
        series: &str,
    ) -> Result<Vec<InstanceInfo>, StorageFailure> {
        let state = self.state.read().await;
        let Some(study_entry) = state.studies.get(study) else {
            return Ok(Vec::new());
        };
        let Some(series_entry) = study_entry.series.get(series) else {
            return Ok(Vec::new());
        };
        Ok(series_entry
            .instances
            .iter()
            .filter(|(uid, _)| !state.soft_deleted.contains(&soft_key(study, series, uid)))
            .map(|(uid, entry)| InstanceInfo {
                study_instance_uid: study.to_string(),
                series_instance_uid: series.to_string(),
                sop_instance_uid: uid.clone(),
                sop_class_uid: entry.sop_class_uid.clone(),
                transfer_syntax_uid: entry.transfer_syntax_uid.clone(),
                instance_number: entry.instance_number.clone(),
                size_bytes: entry.bytes.len(),
            })
            .collect())
    }

    async fn get_study_instances(&self, study: &str) -> Result<Vec<InstanceInfo>, StorageFailure> {
        let state = self.state.read().await;
        let Some(study_entry) = state.studies.get(study) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for (series_uid, series_entry) in &study_entry.series {
            for (instance_uid, entry) in &series_entry.instances {
                if state.soft_deleted.contains(&soft_key(study, series_uid, instance_uid)) {
                    continue;
                }
                out.push(InstanceInfo {
                    study_instance_uid: study.to_string(),
                    series_instance_uid: series_uid.clone(),
                    sop_instance_uid: instance_uid.clone(),
                    sop_class_uid: entry.sop_class_uid.clone(),
                    transfer_syntax_uid: entry.transfer_syntax_uid.clone(),
                    instance_number: entry.instance_number.clone(),
                    size_bytes: entry.bytes.len(),
                });
            }
        }
        Ok(out)
    }

    async fn store_instance(
        &self,
        bytes: Vec<u8>,
        study: &str,
        series: &str,
        instance: &str,
    ) -> Result<(), StorageFailure> {
        let header = match codec::parse_instance(&bytes) {
            Ok((_, header)) => Some(header),
            Err(err) => {
                debug!(error = %err, "storing instance with unparsable header");
                None
            }
        };

        let mut state = self.state.write().await;
        state.soft_deleted.remove(&soft_key(study, series, instance));

        let study_entry = state.studies.entry(study.to_string()).or_default();
        if !study_entry.seeded {
            if let Some(h) = &header {
                study_entry.scalars = StudyScalars {
                    patient_name: h.patient_name.clone(),
                    patient_id: h.patient_id.clone(),
                    patient_birth_date: h.patient_birth_date.clone(),
                    patient_sex: h.patient_sex.clone(),
                    study_date: h.study_date.clone(),
                    study_time: h.study_time.clone(),
                    accession_number: h.accession_number.clone(),
                    study_description: h.study_description.clone(),
                    referring_physician_name: h.referring_physician_name.clone(),
                    study_id: h.study_id.clone(),
                };
            }
            study_entry.seeded = true;
        }

        let series_entry = study_entry.series.entry(series.to_string()).or_default();
        if !series_entry.seeded {
            if let Some(h) = &header {
                series_entry.scalars = SeriesScalars {
                    modality: h.modality.clone(),
                    series_number: h.series_number.clone(),
                    series_description: h.series_description.clone(),
                    body_part_examined: h.body_part_examined.clone(),
                    series_date: h.series_date.clone(),
                    series_time: h.series_time.clone(),
                    performing_physician_name: h.performing_physician_name.clone(),
                };
            }
            series_entry.seeded = true;
        }

        series_entry.instances.insert(
            instance.to_string(),
            InstanceEntry {
                bytes,
                sop_class_uid: header.as_ref().and_then(|h| h.sop_class_uid.clone()),
                transfer_syntax_uid: header.as_ref().and_then(|h| h.transfer_syntax_uid.clone()),
                instance_number: header.as_ref().and_then(|h| h.instance_number.clone()),
            },
        );
        debug!(study, series, instance, "stored instance");
        Ok(())
    }

    async fn delete_instance(
        &self,
        study: &str,
        series: &str,
        instance: &str,
        mode: DeleteMode,
    ) -> Result<bool, StorageFailure> {
        let mut state = self.state.write().await;
        let exists = state
            .studies
            .get(study)
            .and_then(|s| s.series.get(series))
            .map(|se| se.instances.contains_key(instance))
            .unwrap_or(false);
        if !exists {
            return Ok(false);
        }

        match mode {
            DeleteMode::Soft => {
                state.soft_deleted.insert(soft_key(study, series, instance));
            }
            DeleteMode::Permanent => {
                state.soft_deleted.remove(&soft_key(study, series, instance));
                if let Some(study_entry) = state.studies.get_mut(study) {
                    if let Some(series_entry) = study_entry.series.get_mut(series) {
                        series_entry.instances.remove(instance);
                        if series_entry.instances.is_empty() {
                            study_entry.series.remove(series);
                        }
                    }
                    if study_entry.series.is_empty() {
                        state.studies.remove(study);
                    }
                }
            }
        }
        debug!(study, series, instance, ?mode, "deleted instance");
        Ok(true)
    }

    async fn delete_series(
        &self,
        study: &str,
        series: &str,
        mode: DeleteMode,
    ) -> Result<usize, StorageFailure> {
        let instances: Vec<String> = {
            let state = self.state.read().await;
            state
                .studies
                .get(study)
                .and_then(|s| s.series.get(series))
                .map(|se| se.instances.keys().cloned().collect())
                .unwrap_or_default()
        };
        let mut affected = 0;
        for instance in instances {
            if self.delete_instance(study, series, &instance, mode).await? {
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn delete_study(&self, study: &str, mode: DeleteMode) -> Result<usize, StorageFailure> {
        let series: Vec<String> = {
            let state = self.state.read().await;
            state
                .studies
                .get(study)
                .map(|s| s.series.keys().cloned().collect())
                .unwrap_or_default()
        };
        let mut affected = 0;
        for series_uid in series {
            affected += self.delete_series(study, &series_uid, mode).await?;
        }
        Ok(affected)
    }

    async fn search_studies(&self, query: &StorageQuery) -> Result<Vec<StudyRecord>, StorageFailure> {
        let state = self.state.read().await;
        let mut records: Vec<StudyRecord> = state
            .studies
            .iter()
            .map(|(uid, entry)| compute_study_record(uid, entry, &state.soft_deleted))
            .filter(|record| record.instance_count > 0)
            .filter(|record| study_matches(query, record))
            .collect();
        records.sort_by(|a, b| a.study_instance_uid.cmp(&b.study_instance_uid));
        Ok(paginate(records, query.offset, query.limit))
    }

    async fn search_series(
        &self,
        query: &StorageQuery,
        study: Option<&str>,
    ) -> Result<Vec<SeriesRecord>, StorageFailure> {
        let state = self.state.read().await;
        let mut records = Vec::new();
        for (study_uid, study_entry) in &state.studies {
            if let Some(filter_study) = study {
                if filter_study != study_uid {
                    continue;
                }
            }
            let study_record = compute_study_record(study_uid, study_entry, &state.soft_deleted);
            if !study_matches(query, &study_record) {
                continue;
            }
            for (series_uid, series_entry) in &study_entry.series {
                let live = live_instance_count(study_uid, series_uid, series_entry, &state.soft_deleted);
                if live == 0 {
                    continue;
                }
                let record = compute_series_record(series_uid, series_entry, live);
                if series_matches(query, &record) {
                    records.push(record);
                }
            }
        }
        records.sort_by(|a, b| a.series_instance_uid.cmp(&b.series_instance_uid));
        Ok(paginate(records, query.offset, query.limit))
    }

    async fn search_instances(
        &self,
        query: &StorageQuery,
        study: Option<&str>,
        series: Option<&str>,
    ) -> Result<Vec<InstanceInfo>, StorageFailure> {
        let state = self.state.read().await;
        let mut records = Vec::new();
        for (study_uid, study_entry) in &state.studies {
            if let Some(filter_study) = study {
                if filter_study != study_uid {
                    continue;
                }
            }
            let study_record = compute_study_record(study_uid, study_entry, &state.soft_deleted);
            if !study_matches(query, &study_record) {
                continue;
            }
            for (series_uid, series_entry) in &study_entry.series {
                if let Some(filter_series) = series {
                    if filter_series != series_uid {
                        continue;
                    }
                }
                let live = live_instance_count(study_uid, series_uid, series_entry, &state.soft_deleted);
                if live == 0 {
                    continue;
                }
                let series_record = compute_series_record(series_uid, series_entry, live);
                if !series_matches(query, &series_record) {
                    continue;
                }
                for (instance_uid, entry) in &series_entry.instances {
                    if state.soft_deleted.contains(&soft_key(study_uid, series_uid, instance_uid)) {
                        continue;
                    }
                    let info = InstanceInfo {
                        study_instance_uid: study_uid.clone(),
                        series_instance_uid: series_uid.clone(),
                        sop_instance_uid: instance_uid.clone(),
                        sop_class_uid: entry.sop_class_uid.clone(),
                        transfer_syntax_uid: entry.transfer_syntax_uid.clone(),
                        instance_number: entry.instance_number.clone(),
                        size_bytes: entry.bytes.len(),
                    };
                    if instance_matches(query, &info) {
                        records.push(info);
                    }
                }
            }
        }
        records.sort_by(|a, b| a.sop_instance_uid.cmp(&b.sop_instance_uid));
        Ok(paginate(records, query.offset, query.limit))
    }

    async fn get_instance_metadata(
        &self,
        study: &str,
        series: &str,
        instance: &str,
    ) -> Result<Option<DicomJsonObject>, StorageFailure> {
        let Some(bytes) = self.get_instance(study, series, instance).await? else {
            return Ok(None);
        };
        let (obj, _) = codec::parse_instance(&bytes)?;
        Ok(Some(codec::project_metadata(&obj)))
    }

    async fn get_series_metadata(
        &self,
        study: &str,
        series: &str,
    ) -> Result<Vec<DicomJsonObject>, StorageFailure> {
        let instances = self.get_series_instances(study, series).await?;
        let mut out = Vec::with_capacity(instances.len());
        for info in instances {
            if let Some(meta) = self
                .get_instance_metadata(study, series, &info.sop_instance_uid)
                .await?
            {
                out.push(meta);
            }
        }
        Ok(out)
    }

    async fn get_study_metadata(&self, study: &str) -> Result<Vec<DicomJsonObject>, StorageFailure> {
        let instances = self.get_study_instances(study).await?;
        let mut out = Vec::with_capacity(instances.len());
        for info in instances {
            if let Some(meta) = self
                .get_instance_metadata(study, &info.series_instance_uid, &info.sop_instance_uid)
                .await?
            {
                out.push(meta);
            }
        }
        Ok(out)
    }

    async fn count_studies(&self, query: &StorageQuery) -> Result<usize, StorageFailure> {
        let state = self.state.read().await;
        Ok(state
            .studies
            .iter()
            .map(|(uid, entry)| compute_study_record(uid, entry, &state.soft_deleted))
            .filter(|record| record.instance_count > 0)
            .filter(|record| study_matches(query, record))
            .count())
    }

    async fn count_series(&self, study: &str) -> Result<usize, StorageFailure> {
        let state = self.state.read().await;
        Ok(state
            .studies
            .get(study)
            .map(|entry| compute_study_record(study, entry, &state.soft_deleted).series_count)
            .unwrap_or(0))
    }

    async fn count_instances(&self, study: &str, series: &str) -> Result<usize, StorageFailure> {
        let state = self.state.read().await;
        Ok(state
            .studies
            .get(study)
            .and_then(|s| s.series.get(series))
            .map(|se| live_instance_count(study, series, se, &state.soft_deleted))
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom_core::{PrimitiveValue, VR};
    use dicom_dictionary_std::{tags, uids};
    use dicom_object::mem::InMemElement;
    use dicom_object::{FileMetaTableBuilder, InMemDicomObject};

    fn sample_bytes(study: &str, series: &str, instance: &str, patient_name: &str) -> Vec<u8> {
        let mut obj = InMemDicomObject::new_empty();
        obj.put(InMemElement::new(tags::STUDY_INSTANCE_UID, VR::UI, PrimitiveValue::from(study)));
        obj.put(InMemElement::new(tags::SERIES_INSTANCE_UID, VR::UI, PrimitiveValue::from(series)));
        obj.put(InMemElement::new(tags::SOP_INSTANCE_UID, VR::UI, PrimitiveValue::from(instance)));
        obj.put(InMemElement::new(tags::SOP_CLASS_UID, VR::UI, PrimitiveValue::from(uids::SECONDARY_CAPTURE_IMAGE_STORAGE)));
        obj.put(InMemElement::new(tags::MODALITY, VR::CS, PrimitiveValue::from("OT")));
        obj.put(InMemElement::new(tags::PATIENT_NAME, VR::PN, PrimitiveValue::from(patient_name)));
        let obj = obj
            .with_meta(
                FileMetaTableBuilder::new()
                    .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
                    .media_storage_sop_class_uid(uids::SECONDARY_CAPTURE_IMAGE_STORAGE),
            )
            .expect("meta");
        let mut bytes = Vec::new();
        obj.write_all(&mut bytes).expect("write");
        bytes
    }

    #[tokio::test]
    async fn store_then_get_round_trips_bytes() {
        let backend = MemoryBackend::new();
        let bytes = sample_bytes("1.2.3", "1.2.3.1", "1.2.3.1.1", "DOE^JOHN");
        backend
            .store_instance(bytes.clone(), "1.2.3", "1.2.3.1", "1.2.3.1.1")
            .await
            .unwrap();
        let fetched = backend.get_instance("1.2.3", "1.2.3.1", "1.2.3.1.1").await.unwrap();
        assert_eq!(fetched, Some(bytes));
    }

    #[tokio::test]
    async fn soft_delete_hides_instance_but_keeps_count() {
        let backend = MemoryBackend::new();
        let bytes = sample_bytes("1.2.3", "1.2.3.1", "1.2.3.1.1", "DOE^JOHN");
        backend
            .store_instance(bytes, "1.2.3", "1.2.3.1", "1.2.3.1.1")
            .await
            .unwrap();

        backend
            .delete_instance("1.2.3", "1.2.3.1", "1.2.3.1.1", DeleteMode::Soft)
            .await
            .unwrap();
        assert!(backend
            .get_instance("1.2.3", "1.2.3.1", "1.2.3.1.1")
            .await
            .unwrap()
            .is_none());

        let query = StorageQuery::new();
        let count = backend.count_studies(&query).await.unwrap();
        assert_eq!(count, 1);

        backend
            .delete_study("1.2.3", DeleteMode::Permanent)
            .await
            .unwrap();
        let count = backend.count_studies(&query).await.unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn search_by_patient_name_wildcard() {
        let backend = MemoryBackend::new();
        backend
            .store_instance(
                sample_bytes("1.2.3", "1.2.3.1", "1.2.3.1.1", "DOE^JOHN"),
                "1.2.3",
                "1.2.3.1",
                "1.2.3.1.1",
            )
            .await
            .unwrap();
        backend
            .store_instance(
                sample_bytes("9.9.9", "9.9.9.1", "9.9.9.1.1", "ROE^JANE"),
                "9.9.9",
                "9.9.9.1",
                "9.9.9.1.1",
            )
            .await
            .unwrap();

        let mut query = StorageQuery::new();
        query.patient_name = Some("DOE*".to_string());
        let results = backend.search_studies(&query).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].patient_name.as_deref(), Some("DOE^JOHN"));
    }

    #[tokio::test]
    async fn modalities_in_study_reflects_only_live_series() {
        let backend = MemoryBackend::new();
        backend
            .store_instance(
                sample_bytes("1.2.3", "1.2.3.1", "1.2.3.1.1", "DOE^JOHN"),
                "1.2.3",
                "1.2.3.1",
                "1.2.3.1.1",
            )
            .await
            .unwrap();
        let mut query = StorageQuery::new();
        query.study_instance_uid = Some("1.2.3".to_string());
        let results = backend.search_studies(&query).await.unwrap();
        assert!(results[0].modalities_in_study.contains("OT"));

        backend
            .delete_instance("1.2.3", "1.2.3.1", "1.2.3.1.1", DeleteMode::Soft)
            .await
            .unwrap();
        let results = backend.search_studies(&query).await.unwrap();
        assert!(results.is_empty());
    }
}

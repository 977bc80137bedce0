//! The Storage Provider contract (spec §4.1): an abstract backend over
//! which the dispatcher performs every CRUD/search/metadata/count
//! operation. `memory` holds the reference in-memory implementation.

pub mod memory;

use std::collections::HashSet;

use async_trait::async_trait;
use thiserror::Error;

use crate::identity::{InstanceKey, SeriesKey, StorageQuery, StudyKey};
use crate::json::DicomJsonObject;

/// Total failure type for every [`StorageProvider`] operation.
#[derive(Debug, Error)]
pub enum StorageFailure {
    #[error("i/o error: {0}")]
    Io(String),
    #[error("codec error: {0}")]
    Codec(#[from] crate::codec::CodecError),
    #[error("not found")]
    NotFound,
    #[error("internal storage error: {0}")]
    Internal(String),
}

/// Whether a delete marks-and-keeps the payload or removes it outright
/// (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    Soft,
    Permanent,
}

/// The header/derived scalars recorded for a stored instance, independent of
/// the raw bytes (spec §3 `Instance`).
#[derive(Debug, Clone)]
pub struct InstanceInfo {
    pub study_instance_uid: StudyKey,
    pub series_instance_uid: SeriesKey,
    pub sop_instance_uid: InstanceKey,
    pub sop_class_uid: Option<String>,
    pub transfer_syntax_uid: Option<String>,
    pub instance_number: Option<String>,
    pub size_bytes: usize,
}

/// Series-level aggregate (spec §3 `Series record`).
#[derive(Debug, Clone, Default)]
pub struct SeriesRecord {
    pub series_instance_uid: SeriesKey,
    pub modality: Option<String>,
    pub series_number: Option<String>,
    pub series_description: Option<String>,
    pub body_part_examined: Option<String>,
    pub series_date: Option<String>,
    pub series_time: Option<String>,
    pub performing_physician_name: Option<String>,
    pub instance_count: usize,
}

/// Study-level aggregate (spec §3 `Study record`).
#[derive(Debug, Clone, Default)]
pub struct StudyRecord {
    pub study_instance_uid: StudyKey,
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
    pub modalities_in_study: HashSet<String>,
    pub sop_classes_in_study: HashSet<String>,
    pub series_count: usize,
    pub instance_count: usize,
}

/// Abstract backend over which the dispatcher performs every operation
/// (spec §4.1). The server is generic over this trait and never names a
/// concrete backend (Design Notes "Dynamic dispatch over storage backends").
#[async_trait]
pub trait StorageProvider: Send + Sync {
    async fn get_instance(
        &self,
        study: &str,
        series: &str,
        instance: &str,
    ) -> Result<Option<Vec<u8>>, StorageFailure>;

    async fn get_series_instances(
        &self,
        study: &str,
        series: &str,
    ) -> Result<Vec<InstanceInfo>, StorageFailure>;

    async fn get_study_instances(&self, study: &str) -> Result<Vec<InstanceInfo>, StorageFailure>;

    async fn store_instance(
        &self,
        bytes: Vec<u8>,
        study: &str,
        series: &str,
        instance: &str,
    ) -> Result<(), StorageFailure>;

    async fn delete_instance(
        &self,
        study: &str,
        series: &str,
        instance: &str,
        mode: DeleteMode,
    ) -> Result<bool, StorageFailure>;

    async fn delete_series(
        &self,
        study: &str,
        series: &str,
        mode: DeleteMode,
    ) -> Result<usize, StorageFailure>;

    async fn delete_study(&self, study: &str, mode: DeleteMode) -> Result<usize, StorageFailure>;

    async fn search_studies(&self, query: &StorageQuery) -> Result<Vec<StudyRecord>, StorageFailure>;

    async fn search_series(
        &self,
        query: &StorageQuery,
        study: Option<&str>,
    ) -> Result<Vec<SeriesRecord>, StorageFailure>;

    async fn search_instances(
        &self,
        query: &StorageQuery,
        study: Option<&str>,
        series: Option<&str>,
    ) -> Result<Vec<InstanceInfo>, StorageFailure>;

    async fn get_instance_metadata(
        &self,
        study: &str,
        series: &str,
        instance: &str,
    ) -> Result<Option<DicomJsonObject>, StorageFailure>;

    async fn get_series_metadata(
        &self,
        study: &str,
        series: &str,
    ) -> Result<Vec<DicomJsonObject>, StorageFailure>;

    async fn get_study_metadata(&self, study: &str) -> Result<Vec<DicomJsonObject>, StorageFailure>;

    async fn count_studies(&self, query: &StorageQuery) -> Result<usize, StorageFailure>;

    async fn count_series(&self, study: &str) -> Result<usize, StorageFailure>;

    async fn count_instances(&self, study: &str, series: &str) -> Result<usize, StorageFailure>;
}

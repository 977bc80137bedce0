//! Request dispatcher: handles each [`HandlerKind`], shapes responses,
//! injects CORS/server headers, and maps failures to the HTTP error table
//! (spec §4.5, §4.6, §7).

use std::collections::HashSet;
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{error, info};

use crate::cache::CacheLookup;
use crate::codec::{self, CodecError};
use crate::config::CorsConfig;
use crate::identity::{DateRange, StorageQuery};
use crate::json::{self, DicomJsonObject};
use crate::multipart::{self, MultipartError};
use crate::router::HandlerKind;
use crate::storage::{DeleteMode, InstanceInfo, SeriesRecord, StorageFailure, StudyRecord};
use crate::AppState;

/// Failure kinds a handler may signal (spec §7). Implements
/// `IntoResponse`, mapping exactly to the HTTP status table.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{0}")]
    BadRequest(String),
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    UnsupportedMediaType(String),
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("{0}")]
    ServiceUnavailable(String),
    #[error("{0}")]
    Internal(String),
}

impl From<StorageFailure> for DispatchError {
    fn from(err: StorageFailure) -> Self {
        match err {
            StorageFailure::NotFound => DispatchError::NotFound,
            StorageFailure::Codec(codec_err) => DispatchError::BadRequest(codec_err.to_string()),
            other => DispatchError::Internal(other.to_string()),
        }
    }
}

impl From<CodecError> for DispatchError {
    fn from(err: CodecError) -> Self {
        DispatchError::BadRequest(err.to_string())
    }
}

impl From<MultipartError> for DispatchError {
    fn from(err: MultipartError) -> Self {
        DispatchError::BadRequest(err.to_string())
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            DispatchError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            DispatchError::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
            DispatchError::UnsupportedMediaType(msg) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, msg.clone()),
            DispatchError::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "payload too large".to_string()),
            DispatchError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            DispatchError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };
        error!(status = %status, error = %message, "dispatch failed");
        (status, message).into_response()
    }
}

/// Entry point called once per request by the HTTP adapter in `lib.rs`.
/// Resolves the route, consults the cache for GETs, runs the work through
/// the pipeline, and injects `Server`/CORS headers on the way out.
pub async fn dispatch(
    state: Arc<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if body.len() > state.config.server.max_request_body_size {
        return finalize(&state, DispatchError::PayloadTooLarge.into_response());
    }

    // Bounds simultaneous handlers to `server.max_concurrent_requests`
    // (spec §6); held for the remainder of this call.
    let _permit = state
        .concurrency
        .acquire()
        .await
        .expect("concurrency semaphore is never closed");

    let path = uri.path();
    let stripped = path
        .strip_prefix(state.config.server.path_prefix.as_str())
        .unwrap_or(path);

    let Some((kind, params)) = state.router.resolve(&method, stripped) else {
        return finalize(&state, not_found_response());
    };

    let query_pairs = parse_query_pairs(uri.query().unwrap_or(""));
    let accept = headers
        .get(axum::http::header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/dicom+json")
        .to_string();

    if kind == HandlerKind::CorsPreflight {
        return finalize(&state, cors_preflight_response());
    }

    let cache_key = crate::cache::canonical_key(stripped, &query_pairs, &accept);
    let if_none_match = headers
        .get(axum::http::header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    if method == Method::GET && is_cache_eligible(kind) {
        match state.cache.get(&cache_key, if_none_match.as_deref()).await {
            CacheLookup::Hit(entry) => {
                return finalize(&state, cached_hit_response(&entry));
            }
            CacheLookup::NotModified { etag } => {
                return finalize(&state, not_modified_response(&etag));
            }
            CacheLookup::Miss => {}
        }
    }

    let state_for_work = state.clone();
    let params_for_work = params.clone();
    let query_pairs_for_work = query_pairs.clone();
    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let result = state
        .pipeline
        .submit(async move {
            compute_response(
                state_for_work,
                kind,
                params_for_work,
                query_pairs_for_work,
                content_type,
                body,
            )
            .await
        })
        .await;

    let response = match result {
        Ok(response) => response,
        Err(_) => DispatchError::ServiceUnavailable("pipeline cancelled".to_string()).into_response(),
    };

    if matches!(method, Method::POST | Method::DELETE) && response.status().is_success() {
        state.cache.invalidate_all().await;
    }

    let response = if method == Method::GET && is_cache_eligible(kind) && response.status() == StatusCode::OK {
        store_in_cache(&state, &cache_key, response).await
    } else {
        response
    };

    finalize(&state, response)
}

fn is_cache_eligible(kind: HandlerKind) -> bool {
    use HandlerKind::*;
    matches!(
        kind,
        SearchStudies
            | SearchSeries
            | SearchInstances
            | SearchSeriesInStudy
            | SearchInstancesInStudy
            | SearchInstancesInSeries
            | RetrieveStudy
            | RetrieveSeries
            | RetrieveInstance
            | RetrieveStudyMetadata
            | RetrieveSeriesMetadata
            | RetrieveInstanceMetadata
            | Capabilities
    )
}

async fn compute_response(
    state: Arc<AppState>,
    kind: HandlerKind,
    params: std::collections::HashMap<String, String>,
    query_pairs: Vec<(String, String)>,
    content_type: String,
    body: Bytes,
) -> Response {
    let outcome = match kind {
        HandlerKind::SearchStudies => search_studies(&state, &query_pairs).await,
        HandlerKind::SearchSeries => search_series(&state, &query_pairs, None).await,
        HandlerKind::SearchInstances => search_instances(&state, &query_pairs, None, None).await,
        HandlerKind::SearchSeriesInStudy => {
            search_series(&state, &query_pairs, param(&params, "studyUID")).await
        }
        HandlerKind::SearchInstancesInStudy => {
            search_instances(&state, &query_pairs, param(&params, "studyUID"), None).await
        }
        HandlerKind::SearchInstancesInSeries => {
            search_instances(
                &state,
                &query_pairs,
                param(&params, "studyUID"),
                param(&params, "seriesUID"),
            )
            .await
        }
        HandlerKind::RetrieveStudy => retrieve_study(&state, &params).await,
        HandlerKind::RetrieveSeries => retrieve_series(&state, &params).await,
        HandlerKind::RetrieveInstance => retrieve_instance(&state, &params).await,
        HandlerKind::RetrieveStudyMetadata => retrieve_study_metadata(&state, &params).await,
        HandlerKind::RetrieveSeriesMetadata => retrieve_series_metadata(&state, &params).await,
        HandlerKind::RetrieveInstanceMetadata => retrieve_instance_metadata(&state, &params).await,
        HandlerKind::RetrieveFrames
        | HandlerKind::RetrieveRendered
        | HandlerKind::RetrieveThumbnail
        | HandlerKind::RetrieveBulkdata => {
            Err(DispatchError::Internal("pixel-data rendering is not implemented".to_string()))
        }
        HandlerKind::StoreInstances => store_instances(&state, None, &content_type, body).await,
        HandlerKind::StoreInstancesInStudy => {
            store_instances(&state, param(&params, "studyUID"), &content_type, body).await
        }
        HandlerKind::DeleteStudy => delete_study(&state, &params).await,
        HandlerKind::DeleteSeries => delete_series(&state, &params).await,
        HandlerKind::DeleteInstance => delete_instance(&state, &params).await,
        HandlerKind::Capabilities => Ok(capabilities_response()),
        HandlerKind::CorsPreflight => Ok(cors_preflight_response()),
    };

    match outcome {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

fn param<'a>(params: &'a std::collections::HashMap<String, String>, name: &str) -> Option<&'a str> {
    params.get(name).map(|s| s.as_str())
}

fn parse_query_pairs(raw: &str) -> Vec<(String, String)> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = urlencoding::decode(key).ok()?.into_owned();
            let value = urlencoding::decode(value).ok()?.into_owned();
            Some((key, value))
        })
        .collect()
}

fn parse_storage_query(pairs: &[(String, String)]) -> StorageQuery {
    let mut query = StorageQuery::new();
    for (key, value) in pairs {
        match key.as_str() {
            "PatientName" => query.patient_name = Some(value.clone()),
            "PatientID" => query.patient_id = Some(value.clone()),
            "StudyDate" => query.study_date = Some(DateRange::parse(value)),
            "StudyTime" => query.study_time = Some(DateRange::parse(value)),
            "AccessionNumber" => query.accession_number = Some(value.clone()),
            "Modality" => query.modality = Some(value.clone()),
            "ModalitiesInStudy" => {
                let set: HashSet<String> = value.split('\\').map(|s| s.to_string()).collect();
                query.modalities_in_study = Some(set);
            }
            "StudyInstanceUID" => query.study_instance_uid = Some(value.clone()),
            "SeriesInstanceUID" => query.series_instance_uid = Some(value.clone()),
            "SOPInstanceUID" => query.sop_instance_uid = Some(value.clone()),
            "StudyDescription" => query.study_description = Some(value.clone()),
            "SeriesDescription" => query.series_description = Some(value.clone()),
            "SeriesNumber" => query.series_number = Some(value.clone()),
            "InstanceNumber" => query.instance_number = Some(value.clone()),
            "ReferringPhysicianName" => query.referring_physician_name = Some(value.clone()),
            "offset" => {
                if let Ok(v) = value.parse() {
                    query.offset = v;
                }
            }
            "limit" => {
                if let Ok(v) = value.parse() {
                    query.limit = v;
                }
            }
            "fuzzymatching" => query.fuzzy_matching = value.eq_ignore_ascii_case("true"),
            other => {
                query.custom.insert(other.to_string(), value.clone());
            }
        }
    }
    query
}

fn study_record_to_json(study: &StudyRecord) -> DicomJsonObject {
    let mut obj = DicomJsonObject::new();
    json::put_str(&mut obj, "0020000D", "UI", &Some(study.study_instance_uid.clone()));
    json::put_pn(&mut obj, "00100010", &study.patient_name);
    json::put_str(&mut obj, "00100020", "LO", &study.patient_id);
    json::put_str(&mut obj, "00100030", "DA", &study.patient_birth_date);
    json::put_str(&mut obj, "00100040", "CS", &study.patient_sex);
    json::put_str(&mut obj, "00080020", "DA", &study.study_date);
    json::put_str(&mut obj, "00080030", "TM", &study.study_time);
    json::put_str(&mut obj, "00080050", "SH", &study.accession_number);
    json::put_str(&mut obj, "00081030", "LO", &study.study_description);
    json::put_pn(&mut obj, "00080090", &study.referring_physician_name);
    json::put_str(&mut obj, "00200010", "SH", &study.study_id);
    json::put_multi(&mut obj, "00080061", "CS", &study.modalities_in_study);
    json::put_int(&mut obj, "00201206", "IS", study.series_count as i64);
    json::put_int(&mut obj, "00201208", "IS", study.instance_count as i64);
    obj
}

fn series_record_to_json(series: &SeriesRecord) -> DicomJsonObject {
    let mut obj = DicomJsonObject::new();
    json::put_str(&mut obj, "0020000E", "UI", &Some(series.series_instance_uid.clone()));
    json::put_str(&mut obj, "00080060", "CS", &series.modality);
    json::put_str(&mut obj, "00200011", "IS", &series.series_number);
    json::put_str(&mut obj, "0008103E", "LO", &series.series_description);
    json::put_str(&mut obj, "00180015", "CS", &series.body_part_examined);
    json::put_str(&mut obj, "00080021", "DA", &series.series_date);
    json::put_str(&mut obj, "00080031", "TM", &series.series_time);
    json::put_pn(&mut obj, "00081050", &series.performing_physician_name);
    json::put_int(&mut obj, "00201209", "IS", series.instance_count as i64);
    obj
}

fn instance_info_to_json(info: &InstanceInfo) -> DicomJsonObject {
    let mut obj = DicomJsonObject::new();
    json::put_str(&mut obj, "00080018", "UI", &Some(info.sop_instance_uid.clone()));
    json::put_str(&mut obj, "00080016", "UI", &info.sop_class_uid);
    json::put_str(&mut obj, "00200013", "IS", &info.instance_number);
    obj
}

fn json_array_response(items: Vec<DicomJsonObject>, total_count: usize) -> Response {
    let body = serde_json::Value::Array(items.into_iter().map(serde_json::Value::Object).collect());
    let mut response = (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/dicom+json")],
        body.to_string(),
    )
        .into_response();
    response.headers_mut().insert(
        "X-Total-Count",
        HeaderValue::from_str(&total_count.to_string()).unwrap(),
    );
    response
}

async fn search_studies(state: &AppState, query_pairs: &[(String, String)]) -> Result<Response, DispatchError> {
    let query = parse_storage_query(query_pairs);
    let results = state.storage.search_studies(&query).await?;
    let total = state.storage.count_studies(&query).await?;
    let body = results.iter().map(study_record_to_json).collect();
    info!(count = results.len(), total, "search_studies");
    Ok(json_array_response(body, total))
}

async fn search_series(
    state: &AppState,
    query_pairs: &[(String, String)],
    study: Option<&str>,
) -> Result<Response, DispatchError> {
    let query = parse_storage_query(query_pairs);
    let results = state.storage.search_series(&query, study).await?;
    let body: Vec<DicomJsonObject> = results.iter().map(series_record_to_json).collect();
    let total = body.len();
    Ok(json_array_response(body, total))
}

async fn search_instances(
    state: &AppState,
    query_pairs: &[(String, String)],
    study: Option<&str>,
    series: Option<&str>,
) -> Result<Response, DispatchError> {
    let query = parse_storage_query(query_pairs);
    let results = state.storage.search_instances(&query, study, series).await?;
    let body: Vec<DicomJsonObject> = results.iter().map(instance_info_to_json).collect();
    let total = body.len();
    Ok(json_array_response(body, total))
}

fn multipart_response(parts: Vec<Vec<u8>>) -> Response {
    let boundary = multipart::generate_boundary(&parts);
    let content_type = multipart::content_type(&boundary);
    let body = multipart::emit(&parts, &boundary);
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, content_type)],
        body,
    )
        .into_response()
}

async fn retrieve_study(state: &AppState, params: &std::collections::HashMap<String, String>) -> Result<Response, DispatchError> {
    let study = require_param(params, "studyUID")?;
    let instances = state.storage.get_study_instances(study).await?;
    retrieve_bytes(state, instances).await
}

async fn retrieve_series(state: &AppState, params: &std::collections::HashMap<String, String>) -> Result<Response, DispatchError> {
    let study = require_param(params, "studyUID")?;
    let series = require_param(params, "seriesUID")?;
    let instances = state.storage.get_series_instances(study, series).await?;
    retrieve_bytes(state, instances).await
}

async fn retrieve_instance(state: &AppState, params: &std::collections::HashMap<String, String>) -> Result<Response, DispatchError> {
    let study = require_param(params, "studyUID")?;
    let series = require_param(params, "seriesUID")?;
    let instance = require_param(params, "instanceUID")?;
    match state.storage.get_instance(study, series, instance).await? {
        Some(bytes) => Ok(multipart_response(vec![bytes])),
        None => Err(DispatchError::NotFound),
    }
}

async fn retrieve_bytes(state: &AppState, instances: Vec<InstanceInfo>) -> Result<Response, DispatchError> {
    if instances.is_empty() {
        return Err(DispatchError::NotFound);
    }
    let mut parts = Vec::with_capacity(instances.len());
    for info in instances {
        if let Some(bytes) = state
            .storage
            .get_instance(&info.study_instance_uid, &info.series_instance_uid, &info.sop_instance_uid)
            .await?
        {
            parts.push(bytes);
        }
    }
    if parts.is_empty() {
        return Err(DispatchError::NotFound);
    }
    Ok(multipart_response(parts))
}

fn metadata_response(items: Vec<DicomJsonObject>) -> Result<Response, DispatchError> {
    if items.is_empty() {
        return Err(DispatchError::NotFound);
    }
    let body = serde_json::Value::Array(items.into_iter().map(serde_json::Value::Object).collect());
    Ok((
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/dicom+json")],
        body.to_string(),
    )
        .into_response())
}

async fn retrieve_study_metadata(state: &AppState, params: &std::collections::HashMap<String, String>) -> Result<Response, DispatchError> {
    let study = require_param(params, "studyUID")?;
    metadata_response(state.storage.get_study_metadata(study).await?)
}

async fn retrieve_series_metadata(state: &AppState, params: &std::collections::HashMap<String, String>) -> Result<Response, DispatchError> {
    let study = require_param(params, "studyUID")?;
    let series = require_param(params, "seriesUID")?;
    metadata_response(state.storage.get_series_metadata(study, series).await?)
}

async fn retrieve_instance_metadata(state: &AppState, params: &std::collections::HashMap<String, String>) -> Result<Response, DispatchError> {
    let study = require_param(params, "studyUID")?;
    let series = require_param(params, "seriesUID")?;
    let instance = require_param(params, "instanceUID")?;
    match state.storage.get_instance_metadata(study, series, instance).await? {
        Some(meta) => metadata_response(vec![meta]),
        None => Err(DispatchError::NotFound),
    }
}

/// STOW-RS store (spec §4.5). Accepts any outcome with HTTP 200 — per-part
/// failures are recorded in the response document, not as an HTTP error.
async fn store_instances(
    state: &AppState,
    path_study: Option<&str>,
    content_type: &str,
    body: Bytes,
) -> Result<Response, DispatchError> {
    if content_type.is_empty() {
        return Err(DispatchError::UnsupportedMediaType(
            "Content-Type is required for STOW-RS".to_string(),
        ));
    }
    let boundary = multipart::extract_boundary(content_type)?;
    let parts = multipart::parse(&body, &boundary)?;

    let mut referenced = Vec::new();
    let mut failed = Vec::new();

    for part in parts {
        match codec::parse_instance(&part.body) {
            Ok((_, header)) => {
                if let Some(expected_study) = path_study {
                    if expected_study != header.study_instance_uid {
                        failed.push(failed_sop(
                            header.sop_class_uid.as_deref(),
                            &header.sop_instance_uid,
                        ));
                        continue;
                    }
                }
                match state
                    .storage
                    .store_instance(
                        part.body,
                        &header.study_instance_uid,
                        &header.series_instance_uid,
                        &header.sop_instance_uid,
                    )
                    .await
                {
                    Ok(()) => referenced.push(referenced_sop(
                        header.sop_class_uid.as_deref(),
                        &header.sop_instance_uid,
                    )),
                    Err(_) => failed.push(failed_sop(
                        header.sop_class_uid.as_deref(),
                        &header.sop_instance_uid,
                    )),
                }
            }
            Err(_) => failed.push(failed_sop(None, "unknown")),
        }
    }

    let mut document = DicomJsonObject::new();
    json::put_sq(&mut document, "00081199", referenced);
    json::put_sq(&mut document, "00081198", failed);

    Ok((
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/dicom+json")],
        serde_json::Value::Object(document).to_string(),
    )
        .into_response())
}

fn referenced_sop(sop_class_uid: Option<&str>, sop_instance_uid: &str) -> DicomJsonObject {
    let mut obj = DicomJsonObject::new();
    json::put_str(&mut obj, "00081150", "UI", &sop_class_uid.map(|s| s.to_string()));
    json::put_str(&mut obj, "00081155", "UI", &Some(sop_instance_uid.to_string()));
    obj
}

fn failed_sop(sop_class_uid: Option<&str>, sop_instance_uid: &str) -> DicomJsonObject {
    let mut obj = DicomJsonObject::new();
    json::put_str(&mut obj, "00081150", "UI", &sop_class_uid.map(|s| s.to_string()));
    json::put_str(&mut obj, "00081155", "UI", &Some(sop_instance_uid.to_string()));
    json::put_int(&mut obj, "00081197", "US", 0xA700);
    obj
}

async fn delete_study(state: &AppState, params: &std::collections::HashMap<String, String>) -> Result<Response, DispatchError> {
    let study = require_param(params, "studyUID")?;
    let affected = state.storage.delete_study(study, DeleteMode::Permanent).await?;
    if affected == 0 {
        return Err(DispatchError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn delete_series(state: &AppState, params: &std::collections::HashMap<String, String>) -> Result<Response, DispatchError> {
    let study = require_param(params, "studyUID")?;
    let series = require_param(params, "seriesUID")?;
    let affected = state.storage.delete_series(study, series, DeleteMode::Permanent).await?;
    if affected == 0 {
        return Err(DispatchError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn delete_instance(state: &AppState, params: &std::collections::HashMap<String, String>) -> Result<Response, DispatchError> {
    let study = require_param(params, "studyUID")?;
    let series = require_param(params, "seriesUID")?;
    let instance = require_param(params, "instanceUID")?;
    let existed = state
        .storage
        .delete_instance(study, series, instance, DeleteMode::Permanent)
        .await?;
    if !existed {
        return Err(DispatchError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}

fn require_param<'a>(params: &'a std::collections::HashMap<String, String>, name: &str) -> Result<&'a str, DispatchError> {
    params
        .get(name)
        .map(|s| s.as_str())
        .ok_or_else(|| DispatchError::BadRequest(format!("missing path parameter {name}")))
}

fn capabilities_response() -> Response {
    let body = json!({
        "wadoRS": true,
        "qidoRS": true,
        "stowRS": true,
    });
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

fn not_found_response() -> Response {
    DispatchError::NotFound.into_response()
}

fn cors_preflight_response() -> Response {
    (StatusCode::NO_CONTENT, "").into_response()
}

fn cached_hit_response(entry: &crate::cache::CacheEntry) -> Response {
    let mut response = (StatusCode::OK, entry.body.clone()).into_response();
    let headers = response.headers_mut();
    headers.insert(axum::http::header::CONTENT_TYPE, HeaderValue::from_str(&entry.content_type).unwrap());
    headers.insert("ETag", HeaderValue::from_str(&entry.etag).unwrap());
    headers.insert("X-Cache", HeaderValue::from_static("HIT"));
    for (name, value) in &entry.preserved_headers {
        if let Ok(value) = HeaderValue::from_str(value) {
            if let Ok(name) = axum::http::HeaderName::from_bytes(name.as_bytes()) {
                headers.insert(name, value);
            }
        }
    }
    response
}

fn not_modified_response(etag: &str) -> Response {
    let mut response = (StatusCode::NOT_MODIFIED, "").into_response();
    let headers = response.headers_mut();
    headers.insert("ETag", HeaderValue::from_str(etag).unwrap());
    headers.insert("X-Cache", HeaderValue::from_static("HIT"));
    response
}

async fn store_in_cache(state: &AppState, key: &str, response: Response) -> Response {
    let content_type = response
        .headers()
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    if !crate::cache::is_cacheable_content_type(&content_type) {
        return response;
    }

    let preserved_headers: Vec<(String, String)> = response
        .headers()
        .iter()
        .filter(|(name, _)| name.as_str().eq_ignore_ascii_case("x-total-count"))
        .filter_map(|(name, value)| Some((name.to_string(), value.to_str().ok()?.to_string())))
        .collect();

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(_) => return Response::from_parts(parts, axum::body::Body::empty()),
    };

    let entry = state
        .cache
        .put(key.to_string(), bytes.to_vec(), content_type, preserved_headers)
        .await;

    let mut response = Response::from_parts(parts, axum::body::Body::from(bytes));
    let headers = response.headers_mut();
    headers.insert("ETag", HeaderValue::from_str(&entry.etag).unwrap());
    headers.insert(
        axum::http::header::CACHE_CONTROL,
        HeaderValue::from_str(&format!("public, max-age={}", state.config.cache.default_ttl_seconds)).unwrap(),
    );
    headers.insert("X-Cache", HeaderValue::from_static("MISS"));
    response
}

fn finalize(state: &AppState, mut response: Response) -> Response {
    response.headers_mut().insert(
        "Server",
        HeaderValue::from_str(&state.config.server.server_name).unwrap_or(HeaderValue::from_static("dicomweb-server")),
    );
    if let Some(cors) = &state.config.server.cors {
        inject_cors_headers(&mut response, cors);
    }
    response
}

fn inject_cors_headers(response: &mut Response, cors: &CorsConfig) {
    let headers = response.headers_mut();
    let origin = if cors.allowed_origins.is_empty() {
        "*".to_string()
    } else {
        cors.allowed_origins.join(", ")
    };
    if let Ok(value) = HeaderValue::from_str(&origin) {
        headers.insert("Access-Control-Allow-Origin", value);
    }
    if let Ok(value) = HeaderValue::from_str(&cors.allowed_methods.join(", ")) {
        headers.insert("Access-Control-Allow-Methods", value);
    }
    if let Ok(value) = HeaderValue::from_str(&cors.allowed_headers.join(", ")) {
        headers.insert("Access-Control-Allow-Headers", value);
    }
    headers.insert(
        "Access-Control-Max-Age",
        HeaderValue::from_str(&cors.max_age_seconds.to_string()).unwrap(),
    );
    if cors.allow_credentials {
        headers.insert("Access-Control-Allow-Credentials", HeaderValue::from_static("true"));
    }
    if !cors.exposed_headers.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&cors.exposed_headers.join(", ")) {
            headers.insert("Access-Control-Expose-Headers", value);
        }
    }
}

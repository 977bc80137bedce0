//! End-to-end HTTP coverage for the QIDO-RS/WADO-RS/STOW-RS/DELETE surface,
//! driven through the real `axum::Router` with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use dicom_core::{PrimitiveValue, VR};
use dicom_dictionary_std::{tags, uids};
use dicom_object::mem::InMemElement;
use dicom_object::{FileMetaTableBuilder, InMemDicomObject};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use dicomweb_server::config::Config;
use dicomweb_server::storage::memory::MemoryBackend;
use dicomweb_server::storage::StorageProvider;
use dicomweb_server::{build_app, AppState};

fn sample_bytes(study: &str, series: &str, instance: &str, patient_name: &str) -> Vec<u8> {
    let mut obj = InMemDicomObject::new_empty();
    obj.put(InMemElement::new(tags::STUDY_INSTANCE_UID, VR::UI, PrimitiveValue::from(study)));
    obj.put(InMemElement::new(tags::SERIES_INSTANCE_UID, VR::UI, PrimitiveValue::from(series)));
    obj.put(InMemElement::new(tags::SOP_INSTANCE_UID, VR::UI, PrimitiveValue::from(instance)));
    obj.put(InMemElement::new(
        tags::SOP_CLASS_UID,
        VR::UI,
        PrimitiveValue::from(uids::SECONDARY_CAPTURE_IMAGE_STORAGE),
    ));
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

fn app() -> axum::Router {
    let storage: Arc<dyn StorageProvider> = Arc::new(MemoryBackend::new());
    let state = Arc::new(AppState::new(Config::development(), storage));
    build_app(state)
}

fn stow_body(parts: Vec<Vec<u8>>) -> (String, Vec<u8>) {
    let boundary = dicomweb_server::multipart::generate_boundary(&parts);
    let content_type = dicomweb_server::multipart::content_type(&boundary);
    let body = dicomweb_server::multipart::emit(&parts, &boundary);
    (content_type, body)
}

async fn store_one(app: &axum::Router, bytes: Vec<u8>) {
    let (content_type, body) = stow_body(vec![bytes]);
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/dicom-web/studies")
                .header("content-type", content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

/// S1: store an instance via STOW-RS, then retrieve it via WADO-RS and
/// confirm the bytes round-trip exactly.
#[tokio::test]
async fn store_then_retrieve_round_trips_bytes() {
    let app = app();
    let bytes = sample_bytes("1.2.3", "1.2.3.1", "1.2.3.1.1", "DOE^JOHN");
    store_one(&app, bytes.clone()).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/dicom-web/studies/1.2.3/series/1.2.3.1/instances/1.2.3.1.1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("multipart/related"));
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(body.windows(bytes.len()).any(|w| w == bytes.as_slice()));
}

/// S2: QIDO-RS search by wildcard PatientName, asserting X-Total-Count.
#[tokio::test]
async fn search_studies_by_wildcard_patient_name() {
    let app = app();
    store_one(&app, sample_bytes("1.2.3", "1.2.3.1", "1.2.3.1.1", "DOE^JOHN")).await;
    store_one(&app, sample_bytes("9.9.9", "9.9.9.1", "9.9.9.1.1", "ROE^JANE")).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/dicom-web/studies?PatientName=DOE*")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let total_count = response
        .headers()
        .get("x-total-count")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert_eq!(total_count, "1");
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    let studies = json.as_array().unwrap();
    assert_eq!(studies.len(), 1);
    assert_eq!(
        studies[0]["00100010"]["Value"][0]["Alphabetic"],
        Value::String("DOE^JOHN".to_string())
    );
}

/// S3: deleting every instance in a study removes it from subsequent
/// QIDO-RS searches and a second DELETE reports 404.
#[tokio::test]
async fn deleting_a_study_removes_it_from_search_and_is_idempotent_on_error() {
    let app = app();
    store_one(&app, sample_bytes("1.2.3", "1.2.3.1", "1.2.3.1.1", "DOE^JOHN")).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/dicom-web/studies/1.2.3")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/dicom-web/studies/1.2.3")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/dicom-web/studies")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let total_count = response.headers().get("x-total-count").unwrap().to_str().unwrap().to_string();
    assert_eq!(total_count, "0");
}

/// S4: a second identical GET returns the same ETag, and presenting it
/// back via If-None-Match yields 304 with no body.
#[tokio::test]
async fn conditional_get_returns_not_modified_on_matching_etag() {
    let app = app();
    store_one(&app, sample_bytes("1.2.3", "1.2.3.1", "1.2.3.1.1", "DOE^JOHN")).await;

    let first = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/dicom-web/studies")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let etag = first.headers().get("etag").unwrap().to_str().unwrap().to_string();

    let second = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/dicom-web/studies")
                .header("if-none-match", etag.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(second.headers().get("etag").unwrap().to_str().unwrap(), etag);
    let body = second.into_body().collect().await.unwrap().to_bytes();
    assert!(body.is_empty());
}

/// S6: STOW-RS with one valid part and one corrupt part reports a single
/// Referenced SOP and a single Failed SOP with failure reason A700, with
/// the overall HTTP status still 200.
#[tokio::test]
async fn stow_partial_failure_is_reported_in_the_response_document() {
    let app = app();
    let good = sample_bytes("1.2.3", "1.2.3.1", "1.2.3.1.1", "DOE^JOHN");
    let corrupt = b"not a dicom stream".to_vec();
    let (content_type, body) = stow_body(vec![good, corrupt]);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/dicom-web/studies")
                .header("content-type", content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();

    let referenced = json["00081199"]["Value"].as_array().unwrap();
    assert_eq!(referenced.len(), 1);
    let failed = json["00081198"]["Value"].as_array().unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["00081197"]["Value"][0], Value::from(0xA700));
}

/// A body larger than the configured `max_request_body_size` is rejected
/// with 413, independent of whether it would otherwise parse as DICOM.
#[tokio::test]
async fn oversize_body_is_rejected_with_payload_too_large() {
    let storage: Arc<dyn StorageProvider> = Arc::new(MemoryBackend::new());
    let mut config = Config::development();
    config.server.max_request_body_size = 16;
    let state = Arc::new(AppState::new(config, storage));
    let app = build_app(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/dicom-web/studies")
                .header("content-type", "multipart/related; boundary=B")
                .body(Body::from(vec![0u8; 1024]))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

/// Capabilities endpoint is reachable and cacheable.
#[tokio::test]
async fn capabilities_reports_supported_services() {
    let app = app();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/dicom-web/capabilities")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["qidoRS"], Value::Bool(true));
}

/// CORS preflight carries the configured allow-headers per spec §4.6.
#[tokio::test]
async fn options_preflight_carries_cors_headers() {
    let app = app();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/dicom-web/studies")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(response.headers().contains_key("access-control-allow-origin"));
    assert!(response.headers().contains_key("access-control-allow-methods"));
    assert!(response.headers().contains_key("access-control-max-age"));
}

/// Frame/rendered/thumbnail/bulkdata endpoints are recognised by the router
/// but always resolve to the 500 stub response (spec §4.4, Design Notes).
#[tokio::test]
async fn frame_retrieval_is_a_stub_returning_internal_error() {
    let app = app();
    store_one(&app, sample_bytes("1.2.3", "1.2.3.1", "1.2.3.1.1", "DOE^JOHN")).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/dicom-web/studies/1.2.3/series/1.2.3.1/instances/1.2.3.1.1/frames/1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

/// Deleting a single instance collapses its now-empty series and study, per
/// invariant 1 (no Study/Series survives with zero live instances).
#[tokio::test]
async fn deleting_the_last_instance_collapses_series_and_study() {
    let app = app();
    store_one(&app, sample_bytes("1.2.3", "1.2.3.1", "1.2.3.1.1", "DOE^JOHN")).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/dicom-web/studies/1.2.3/series/1.2.3.1/instances/1.2.3.1.1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/dicom-web/studies/1.2.3")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// QIDO-RS `offset`/`limit` slice the result set per spec §3 `StorageQuery`.
#[tokio::test]
async fn search_studies_honours_offset_and_limit() {
    let app = app();
    store_one(&app, sample_bytes("1.2.3", "1.2.3.1", "1.2.3.1.1", "A^A")).await;
    store_one(&app, sample_bytes("2.2.3", "2.2.3.1", "2.2.3.1.1", "B^B")).await;
    store_one(&app, sample_bytes("3.2.3", "3.2.3.1", "3.2.3.1.1", "C^C")).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/dicom-web/studies?offset=1&limit=1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let total_count = response.headers().get("x-total-count").unwrap().to_str().unwrap().to_string();
    assert_eq!(total_count, "3");
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 1);
}

/// A STOW-RS part whose StudyInstanceUID disagrees with the path parameter
/// is rejected for that part only, per spec §4.5.
#[tokio::test]
async fn stow_rejects_a_part_whose_study_uid_disagrees_with_the_path() {
    let app = app();
    let bytes = sample_bytes("1.2.3", "1.2.3.1", "1.2.3.1.1", "DOE^JOHN");
    let (content_type, body) = stow_body(vec![bytes]);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/dicom-web/studies/9.9.9")
                .header("content-type", content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json.get("00081199").is_none());
    let failed = json["00081198"]["Value"].as_array().unwrap();
    assert_eq!(failed.len(), 1);
}

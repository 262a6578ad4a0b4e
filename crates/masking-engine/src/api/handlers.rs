//! HTTP handlers.
//!
//! The inbound webhook accepts JSON or form-encoded bodies with query
//! parameters merged at lowest precedence, and resolves field names
//! case-insensitively through an alias table before the routing engine
//! ever sees the request.

use super::types::*;
use crate::audit::AuditLog;
use crate::config::MaskingConfig;
use crate::directory::PartyDirectory;
use crate::error::MaskingError;
use crate::pool::NumberPool;
use crate::routing::RoutingEngine;
use crate::types::{InboundSms, RouteOutcome};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use record_store::{RecordStore, RecordStoreError};
use serde_json::Value;
use sms_client::SmsTransport;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

/// Accepted spellings of the webhook fields, lowercase.
const FROM_KEYS: &[&str] = &["from", "from_number", "fromnumber"];
const TO_KEYS: &[&str] = &["to", "to_number", "tonumber"];
const BODY_KEYS: &[&str] = &["body", "message", "text"];
const SITTER_ID_KEYS: &[&str] = &["sitter_id", "sitterid", "sitter"];

/// Shared application state for handlers.
pub struct ApiState {
    pub engine: Arc<RoutingEngine>,
    pub directory: PartyDirectory,
    pub pool: NumberPool,
    pub store: Arc<dyn RecordStore>,
    pub transport: Arc<dyn SmsTransport>,
    pub pool_tag: String,
}

impl ApiState {
    pub fn new(
        store: Arc<dyn RecordStore>,
        transport: Arc<dyn SmsTransport>,
        config: &MaskingConfig,
    ) -> Self {
        let audit = AuditLog::new(store.clone());
        Self {
            engine: Arc::new(RoutingEngine::new(store.clone(), transport.clone(), config)),
            directory: PartyDirectory::new(store.clone()),
            pool: NumberPool::new(store.clone(), audit),
            store,
            transport,
            pool_tag: config.pool_tag.clone(),
        }
    }
}

/// Create the relay API router.
pub fn create_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/intercept", post(intercept))
        .route("/attach-number", post(attach_number))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    let store_healthy = state.store.health_check().await;
    let transport_healthy = state.transport.health_check().await;

    Json(HealthResponse {
        healthy: store_healthy && transport_healthy,
        store_healthy,
        transport_healthy,
    })
}

/// Inbound SMS webhook.
async fn intercept(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<WebhookAck>), (StatusCode, Json<ErrorResponse>)> {
    let payload = parse_payload(&headers, &body, &query);

    let from = first_field(&payload, FROM_KEYS);
    let to = first_field(&payload, TO_KEYS);
    let text = first_field(&payload, BODY_KEYS);

    let (from, to, text) = match (from, to, text) {
        (Some(from), Some(to), Some(text)) => (from, to, text),
        (from, to, text) => {
            let mut missing = Vec::new();
            if from.is_none() {
                missing.push("From");
            }
            if to.is_none() {
                missing.push("To");
            }
            if text.is_none() {
                missing.push("Body");
            }
            return Err((
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ErrorResponse::new(
                    format!("Missing required field(s): {}", missing.join(", ")),
                    "MISSING_FIELDS",
                )),
            ));
        }
    };

    let sms = InboundSms {
        from: from.to_string(),
        to: to.to_string(),
        body: text.to_string(),
    };

    match state.engine.handle_inbound(&sms).await {
        Ok(RouteOutcome::ForwardedToClient { correlation_id }) => Ok((
            StatusCode::FORBIDDEN,
            Json(WebhookAck::blocked(Some(correlation_id), None)),
        )),
        Ok(RouteOutcome::ForwardedToSitter { correlation_id, .. }) => Ok((
            StatusCode::FORBIDDEN,
            Json(WebhookAck::blocked(Some(correlation_id), None)),
        )),
        Ok(RouteOutcome::Ignored(reason)) => {
            Ok((StatusCode::OK, Json(WebhookAck::ignored(reason.as_str()))))
        }
        // The message record stays Pending for the fallback retrier; the
        // upstream must still suppress its default delivery.
        Err(MaskingError::ForwardToSitterFailed(_)) => Ok((
            StatusCode::FORBIDDEN,
            Json(WebhookAck::blocked(None, Some("delivery deferred to fallback"))),
        )),
        Err(MaskingError::ForwardToClientFailed(e)) => Err((
            StatusCode::BAD_GATEWAY,
            Json(ErrorResponse::new(e.to_string(), "FORWARD_FAILED")),
        )),
        Err(MaskingError::PoolExhausted) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new(
                MaskingError::PoolExhausted.to_string(),
                "POOL_EXHAUSTED",
            )),
        )),
        Err(MaskingError::DataIntegrity(msg)) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(msg, "DATA_INTEGRITY")),
        )),
        Err(MaskingError::Validation(msg)) => Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse::new(msg, "MISSING_FIELDS")),
        )),
        Err(e) => {
            error!("Intercept failed: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e.to_string(), "INTERNAL_ERROR")),
            ))
        }
    }
}

/// Force-rotate a sitter's public entry-point number.
async fn attach_number(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<AttachNumberResponse>, (StatusCode, Json<ErrorResponse>)> {
    let payload = parse_payload(&headers, &body, &query);

    let sitter_id = first_field(&payload, SITTER_ID_KEYS)
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let Some(sitter_id) = sitter_id else {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse::new(
                "sitter_id is required in request body or query parameter",
                "MISSING_SITTER_ID",
            )),
        ));
    };

    let sitter = state.directory.get_sitter(sitter_id).await.map_err(|e| match e {
        MaskingError::Store(RecordStoreError::RecordNotFound { .. }) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(
                format!("Sitter not found: {}", sitter_id),
                "SITTER_NOT_FOUND",
            )),
        ),
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(other.to_string(), "STORE_ERROR")),
        ),
    })?;

    match state
        .pool
        .rotate_sitter_entry_point(&sitter, &state.pool_tag)
        .await
    {
        Ok(new_number) => Ok(Json(AttachNumberResponse {
            status: "success".into(),
            new_number,
        })),
        Err(MaskingError::PoolExhausted) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new(
                MaskingError::PoolExhausted.to_string(),
                "POOL_EXHAUSTED",
            )),
        )),
        Err(e) => {
            error!("Number rotation failed for {}: {}", sitter_id, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e.to_string(), "INTERNAL_ERROR")),
            ))
        }
    }
}

/// Merge body and query parameters into one lowercase-keyed map.
///
/// JSON is preferred when the content type names it, form encoding is the
/// fallback, and query parameters never overwrite body values.
fn parse_payload(
    headers: &HeaderMap,
    body: &[u8],
    query: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut merged: HashMap<String, String> = HashMap::new();

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_lowercase();

    if content_type.contains("application/json") {
        if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) {
            for (key, value) in map {
                if let Some(text) = value_to_string(value) {
                    merged.insert(key.to_lowercase(), text);
                }
            }
        }
    }

    if merged.is_empty() {
        for (key, value) in url::form_urlencoded::parse(body) {
            merged.insert(key.to_lowercase(), value.into_owned());
        }
    }

    for (key, value) in query {
        merged
            .entry(key.to_lowercase())
            .or_insert_with(|| value.clone());
    }

    merged
}

fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn first_field<'a>(payload: &'a HashMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| payload.get(*key))
        .map(String::as_str)
        .find(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use record_store::MemoryStore;
    use serde_json::json;
    use sms_client::{SmsError, SmsTransport};
    use tower::ServiceExt;

    struct OkTransport;

    #[async_trait]
    impl SmsTransport for OkTransport {
        async fn send(&self, _from: &str, _to: &str, _body: &str) -> Result<String, SmsError> {
            Ok("SM_test".into())
        }
    }

    fn header_map(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, content_type.parse().unwrap());
        headers
    }

    #[test]
    fn test_parse_payload_json_case_insensitive() {
        let body = serde_json::to_vec(&json!({"From": "+1", "BODY": "hi"})).unwrap();
        let payload = parse_payload(&header_map("application/json"), &body, &HashMap::new());

        assert_eq!(first_field(&payload, FROM_KEYS), Some("+1"));
        assert_eq!(first_field(&payload, BODY_KEYS), Some("hi"));
    }

    #[test]
    fn test_parse_payload_form_fallback() {
        let body = b"From=%2B1&To=%2B2&Body=hello+there";
        let payload = parse_payload(
            &header_map("application/x-www-form-urlencoded"),
            body,
            &HashMap::new(),
        );

        assert_eq!(first_field(&payload, FROM_KEYS), Some("+1"));
        assert_eq!(first_field(&payload, BODY_KEYS), Some("hello there"));
    }

    #[test]
    fn test_query_params_lowest_precedence() {
        let body = serde_json::to_vec(&json!({"From": "+1-from-body"})).unwrap();
        let mut query = HashMap::new();
        query.insert("From".to_string(), "+1-from-query".to_string());
        query.insert("To".to_string(), "+2".to_string());

        let payload = parse_payload(&header_map("application/json"), &body, &query);

        assert_eq!(first_field(&payload, FROM_KEYS), Some("+1-from-body"));
        assert_eq!(first_field(&payload, TO_KEYS), Some("+2"));
    }

    async fn seeded_router() -> Router {
        let store = Arc::new(MemoryStore::new());
        store
            .create(
                SITTERS_TABLE,
                record_fields(json!({
                    "Full Name": "Jane Sitter",
                    "Phone Number": "+15550001111",
                    "Twilio Number": "+15550009999",
                })),
            )
            .await
            .unwrap();
        store
            .create(
                INVENTORY_TABLE,
                record_fields(json!({
                    "Phone Number": "+15550002222",
                    "Status": "Ready",
                    "Type": "Pool",
                })),
            )
            .await
            .unwrap();

        let store: Arc<dyn RecordStore> = store;
        let state = Arc::new(ApiState::new(
            store,
            Arc::new(OkTransport),
            &MaskingConfig::default(),
        ));
        create_router(state)
    }

    #[tokio::test]
    async fn test_intercept_missing_fields_names_them() {
        let router = seeded_router().await;

        let request = Request::builder()
            .method("POST")
            .uri("/intercept")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"From": "+15550003333"}"#))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let error: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert!(error.error.contains("To"));
        assert!(error.error.contains("Body"));
        assert!(!error.error.contains("From,"));
    }

    #[tokio::test]
    async fn test_intercept_forward_returns_block_signal() {
        let router = seeded_router().await;

        let request = Request::builder()
            .method("POST")
            .uri("/intercept")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("From=%2B15550003333&To=%2B15550009999&Body=Hi"))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let ack: WebhookAck = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(ack.status, "blocked");
        assert!(ack.correlation_id.is_some());
    }

    #[tokio::test]
    async fn test_intercept_unknown_parties_acks_ignored() {
        let router = seeded_router().await;

        let request = Request::builder()
            .method("POST")
            .uri("/intercept")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"From": "+19990000000", "To": "+19990000001", "Body": "hello"}"#,
            ))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let ack: WebhookAck = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(ack.status, "ignored");
    }

    #[tokio::test]
    async fn test_attach_number_requires_sitter_id() {
        let router = seeded_router().await;

        let request = Request::builder()
            .method("POST")
            .uri("/attach-number")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"sitter_id": "   "}"#))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_attach_number_via_query_param() {
        let router = seeded_router().await;

        let request = Request::builder()
            .method("POST")
            .uri("/attach-number?sitter_id=rec000001")
            .header("content-type", "application/json")
            .body(Body::empty())
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let rotated: AttachNumberResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(rotated.new_number, "+15550002222");
    }

    #[tokio::test]
    async fn test_attach_number_unknown_sitter() {
        let router = seeded_router().await;

        let request = Request::builder()
            .method("POST")
            .uri("/attach-number?sitter_id=rec999999")
            .header("content-type", "application/json")
            .body(Body::empty())
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let router = seeded_router().await;

        let request = Request::builder()
            .method("GET")
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let health: HealthResponse = serde_json::from_slice(&bytes).unwrap();
        assert!(health.store_healthy);
    }
}

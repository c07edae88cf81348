use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chatsink_model::{Event, EventHints, LogId, Role};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::AppState;

const DEFAULT_LIST_LIMIT: usize = 20;
const MAX_LIST_LIMIT: usize = 100;

/// Body of `POST /log`. Every field is optional; capture scripts are
/// unreliable and missing values fall back to defaults.
#[derive(Debug, Deserialize, Default)]
struct LogRequest {
    platform: Option<String>,
    role: Option<String>,
    text: Option<String>,
    urls: Option<Value>,
    metadata: Option<Value>,
}

impl LogRequest {
    fn into_event(self) -> Event {
        let urls = self
            .urls
            .as_ref()
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();
        let hints = self
            .metadata
            .as_ref()
            .map(EventHints::from_metadata)
            .unwrap_or_default();

        Event::new(
            self.platform.unwrap_or_else(|| "unknown".to_owned()),
            self.role.as_deref().map_or(Role::Assistant, Role::from_label),
            self.text.unwrap_or_default(),
        )
        .with_urls(urls)
        .with_hints(hints)
    }
}

#[derive(Debug, Deserialize, Default)]
pub(crate) struct BypassQuery {
    platform: Option<String>,
    role: Option<String>,
    text: Option<String>,
    method: Option<String>,
    callback: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub(crate) struct ListQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ListResponse {
    log: LogId,
    entries: Vec<Event>,
}

#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(error: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub(crate) type ApiResult<T> = Result<T, ApiError>;

pub(crate) async fn health() -> &'static str {
    "ok"
}

/// OPTIONS that the CORS layer did not recognise as a preflight.
pub(crate) async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

pub(crate) async fn ingest_via_post(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<&'static str> {
    let request = match serde_json::from_slice::<LogRequest>(&body) {
        Ok(request) => request,
        Err(error) => {
            warn!(%error, bytes = body.len(), "ignoring unparsable log body");
            return Ok("ok");
        }
    };

    state
        .pipeline
        .ingest(request.into_event())
        .await
        .map_err(|error| {
            tracing::error!(error = %format!("{error:#}"), "failed to record event");
            ApiError::internal(error)
        })?;
    Ok("ok")
}

/// `GET /log` for capture scripts that cannot issue a cross-origin POST.
pub(crate) async fn ingest_via_get(
    State(state): State<AppState>,
    Query(query): Query<BypassQuery>,
) -> ApiResult<Response> {
    let text = query.text.unwrap_or_default();
    if !text.is_empty() {
        let method = query.method.as_deref().unwrap_or("get_bypass");
        let event = Event::new(
            query.platform.unwrap_or_else(|| "claude".to_owned()),
            query.role.as_deref().map_or(Role::User, Role::from_label),
            text,
        );
        info!(method, platform = %event.platform, role = %event.role, "event received via GET");
        state
            .pipeline
            .ingest(event)
            .await
            .map_err(ApiError::internal)?;
    }

    match query.callback.filter(|name| is_callback_name(name)) {
        Some(callback) => Ok((
            [(CONTENT_TYPE, "application/javascript")],
            format!(r#"{callback}({{"status": "ok", "method": "jsonp"}})"#),
        )
            .into_response()),
        None => Ok("ok".into_response()),
    }
}

fn is_callback_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.'))
}

pub(crate) async fn diagnostic(
    State(state): State<AppState>,
    Json(data): Json<Value>,
) -> ApiResult<&'static str> {
    let record = json!({
        "ts": now_ts(),
        "type": data.get("type").cloned().unwrap_or_else(|| json!("diagnostic")),
        "timestamp": field(&data, "timestamp"),
        "elementSignature": field(&data, "elementSignature"),
        "conversationContext": field(&data, "conversationContext"),
        "transmissionType": field(&data, "transmissionType"),
    });

    state
        .pipeline
        .record(LogId::Diagnostic, &record)
        .await
        .map_err(ApiError::internal)?;

    let element = &record["elementSignature"];
    let preview: String = element["textPreview"]
        .as_str()
        .unwrap_or_default()
        .chars()
        .take(50)
        .collect();
    info!(
        transmission = %record["transmissionType"],
        preview = %preview,
        text_length = element["textLength"].as_u64().unwrap_or(0),
        "diagnostic recorded"
    );
    Ok("ok")
}

pub(crate) async fn analytics(
    State(state): State<AppState>,
    Json(data): Json<Value>,
) -> ApiResult<&'static str> {
    let record = json!({
        "ts": now_ts(),
        "sessionTime": field(&data, "sessionTime"),
        "type": field(&data, "type"),
        "testPhase": field(&data, "testPhase"),
        "url": field(&data, "url"),
        "conversationId": field(&data, "conversationId"),
        "data": field(&data, "data"),
    });

    state
        .pipeline
        .record(LogId::Analytics, &record)
        .await
        .map_err(ApiError::internal)?;

    log_analytics_summary(&record);
    Ok("ok")
}

fn log_analytics_summary(record: &Value) {
    let phase = record["testPhase"].as_str().unwrap_or("none");
    let data = &record["data"];
    let text_preview = |value: &Value| -> String {
        value.as_str().unwrap_or_default().chars().take(50).collect()
    };

    match record["type"].as_str().unwrap_or("unknown") {
        "transmission" => info!(
            phase,
            role = data["role"].as_str().unwrap_or("unknown"),
            duplicate = data["isDuplicate"].as_bool().unwrap_or(false),
            text = %text_preview(&data["text"]),
            "analytics transmission"
        ),
        "duplicate_detected" => info!(
            phase,
            pattern = data["duplicateInfo"]["pattern"].as_str().unwrap_or("unknown"),
            text = %text_preview(&data["text"]),
            "analytics duplicate pattern"
        ),
        "conversation_event" => info!(
            phase,
            event_type = data["eventType"].as_str().unwrap_or("unknown"),
            "analytics conversation event"
        ),
        "test_start" => info!(
            test = data["testName"].as_str().unwrap_or("unknown"),
            "analytics test start"
        ),
        "test_end" => info!(
            test = data["testName"].as_str().unwrap_or("unknown"),
            transmissions = data["transmissionCount"].as_u64().unwrap_or(0),
            duplicates = data["duplicateCount"].as_u64().unwrap_or(0),
            "analytics test end"
        ),
        other => info!(phase, kind = other, "analytics recorded"),
    }
}

pub(crate) async fn recent_entries(
    Path(log): Path<String>,
    Query(query): Query<ListQuery>,
    State(state): State<AppState>,
) -> ApiResult<Json<ListResponse>> {
    let log: LogId = log
        .parse()
        .map_err(|error| ApiError::bad_request(format!("{error}")))?;
    if !LogId::EVENT_LOGS.contains(&log) {
        return Err(ApiError::bad_request(format!("{log} does not hold chat events")));
    }
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);

    let entries = state
        .pipeline
        .read_recent(log, limit)
        .await
        .map_err(ApiError::internal)?;

    Ok(Json(ListResponse { log, entries }))
}

fn field(data: &Value, key: &str) -> Value {
    data.get(key).cloned().unwrap_or(Value::Null)
}

fn now_ts() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::is_callback_name;

    #[test]
    fn callback_names_are_restricted_to_identifiers() {
        assert!(is_callback_name("jsonp_cb"));
        assert!(is_callback_name("window.handlers.$log"));
        assert!(!is_callback_name(""));
        assert!(!is_callback_name("alert(1)"));
        assert!(!is_callback_name("a;b"));
    }
}

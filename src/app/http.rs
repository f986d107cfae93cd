// ==========================================
// 联系人导入服务 - HTTP 路由
// ==========================================
// 职责: 远程调用入口，JSON 进出，行为与 IngestApi 完全一致
// 约束: 导入类接口始终 200，失败体现在 IngestResult 中
// ==========================================

use crate::api::ApiError;
use crate::app::state::AppState;
use crate::config::config_keys;
use crate::domain::ingest::{
    CsvIngestRequest, IngestRequest, IngestResult, PreviewRequest, PreviewResponse, RetryRequest,
};
use crate::domain::source::{FieldDefinition, SourceStatus};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// 错误响应结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 错误代码
    pub code: String,

    /// 错误消息
    pub message: String,

    /// 详细信息（可选）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "请求处理失败");
        }

        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
            details: self.details(),
        };
        (status, Json(body)).into_response()
    }
}

/// 构建路由
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/ingest", post(ingest))
        .route("/api/ingest/csv", post(ingest_csv))
        .route("/api/ingest/preview", post(preview))
        .route("/api/field-mappings", get(list_field_mappings))
        .route("/api/sources/{id}", get(source_status))
        .route("/api/sources/{id}/transform", post(retry_transform))
        .route("/api/runs/{run_id}/cancel", post(cancel_run))
        .route("/api/config", get(get_config))
        .route("/api/config/{key}", put(update_config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
    }))
}

/// 请求体无法反序列化时，按导入失败返回（与进程内调用一致）
fn rejected_body(route: &str, rejection: JsonRejection) -> Json<IngestResult> {
    tracing::warn!(route = route, status = %rejection.status(), "请求体解析失败");
    Json(IngestResult::rejected(
        vec![format!("invalid request body: {}", rejection.body_text())],
        Vec::new(),
    ))
}

/// POST /api/ingest
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Json<IngestResult> {
    match payload {
        Ok(Json(payload)) => Json(state.ingest_api.ingest(payload).await),
        Err(rejection) => rejected_body("/api/ingest", rejection),
    }
}

/// POST /api/ingest/csv
pub async fn ingest_csv(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CsvIngestRequest>, JsonRejection>,
) -> Json<IngestResult> {
    match payload {
        Ok(Json(payload)) => Json(state.ingest_api.ingest_csv(payload).await),
        Err(rejection) => rejected_body("/api/ingest/csv", rejection),
    }
}

/// POST /api/ingest/preview
pub async fn preview(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PreviewRequest>,
) -> Result<Json<PreviewResponse>, ApiError> {
    Ok(Json(state.ingest_api.preview(payload).await?))
}

/// GET /api/field-mappings
pub async fn list_field_mappings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<FieldDefinition>>, ApiError> {
    Ok(Json(state.ingest_api.list_fields()?))
}

/// GET /api/sources/{id}
pub async fn source_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<SourceStatus>, ApiError> {
    Ok(Json(state.ingest_api.source_status(id).await?))
}

/// POST /api/sources/{id}/transform
pub async fn retry_transform(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(payload): Json<RetryRequest>,
) -> Result<Json<IngestResult>, ApiError> {
    Ok(Json(state.ingest_api.retry(id, payload).await?))
}

/// POST /api/runs/{run_id}/cancel
pub async fn cancel_run(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    state.ingest_api.cancel(&run_id)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "runId": run_id, "cancelRequested": true })),
    ))
}

/// 配置覆写请求体
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigUpdate {
    pub value: String,
}

/// GET /api/config
pub async fn get_config(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let snapshot = state.config_manager.get_config_snapshot()?;
    let value =
        serde_json::from_str(&snapshot).map_err(|e| ApiError::InternalError(e.to_string()))?;
    Ok(Json(value))
}

/// PUT /api/config/{key}
///
/// 仅允许 ingest.* 键，值必须为正整数；下一次运行生效
pub async fn update_config(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Json(payload): Json<ConfigUpdate>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !config_keys::ALL.contains(&key.as_str()) {
        return Err(ApiError::InvalidInput(format!("unknown config key '{}'", key)));
    }

    let value = payload.value.trim();
    if !matches!(value.parse::<usize>(), Ok(v) if v >= 1) {
        return Err(ApiError::InvalidInput(format!(
            "{} must be a positive integer, got '{}'",
            key, payload.value
        )));
    }

    state.config_manager.set_value(&key, value)?;
    tracing::info!(key = %key, value = value, "配置已更新");

    get_config(State(state)).await
}

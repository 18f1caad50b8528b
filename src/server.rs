//! HTTPフロントエンド
//!
//! - GET  /api/                      : 稼働確認
//! - POST /api/scan                  : 査定（JSON, 画像はBase64）
//! - GET  /api/history/{requester_id}: スキャン履歴
//! - GET  /api/scan/{id}             : スキャン1件

use std::sync::Arc;

use appraiser_common::{Locale, ScanRequest};
use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::{AppraiserError, Result};
use crate::history::{ScanHistory, ScanQuota, ScanRecord, DEFAULT_LIST_LIMIT};
use crate::pipeline::AppraisalPipeline;
use crate::scanner::decode_base64_image;

/// Base64化した画像を受けるため既定より大きくする
const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

pub struct AppState {
    pub pipeline: AppraisalPipeline,
    pub history: Arc<dyn ScanHistory>,
    pub quota: Arc<dyn ScanQuota>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanBody {
    #[serde(default)]
    image_base64: String,
    #[serde(default)]
    country_code: String,
    #[serde(default)]
    currency_code: String,
    hint: Option<String>,
    #[serde(default)]
    requester_id: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    limit: Option<usize>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/", get(api_root))
        .route("/api/scan", post(api_scan))
        .route("/api/scan/{id}", get(api_scan_detail))
        .route("/api/history/{requester_id}", get(api_history))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(addr: &str, state: Arc<AppState>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppraiserError::Server(format!("{}: {}", addr, e)))?;
    info!(addr, "listening");

    axum::serve(listener, router(state))
        .await
        .map_err(|e| AppraiserError::Server(e.to_string()))
}

async fn api_root() -> impl IntoResponse {
    Json(json!({"message": "Thrift appraiser API - ready to scan!"}))
}

async fn api_scan(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ScanBody>,
) -> std::result::Result<Response, AppraiserError> {
    // 入力検証 → 無料枠確認 → 査定（この順で外部呼び出しより前に弾く）
    if body.image_base64.trim().is_empty() {
        return Err(AppraiserError::InvalidInput("image is required".into()));
    }
    if body.requester_id.trim().is_empty() {
        return Err(AppraiserError::InvalidInput("requesterId is required".into()));
    }
    let image = decode_base64_image(&body.image_base64)?;
    let locale = Locale::new(&body.country_code, &body.currency_code);
    let request = ScanRequest::new(image, locale, body.hint.as_deref(), &body.requester_id)?;

    // 予約は履歴に記録し終えるまで保持する
    let _reservation = state.quota.reserve(&request.requester_id)?;

    let result = state.pipeline.run(&request).await;

    let record = ScanRecord::new(&request.requester_id, &request.image, result.clone());
    let history = state.history.clone();
    match tokio::task::spawn_blocking(move || history.record(record)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            warn!(error = %e, requester = %request.requester_id, "scan not saved to history")
        }
        Err(e) => {
            warn!(error = %e, requester = %request.requester_id, "history write task failed")
        }
    }

    Ok(Json(result).into_response())
}

async fn api_history(
    State(state): State<Arc<AppState>>,
    Path(requester_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> std::result::Result<Response, AppraiserError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let scans = state.history.list(&requester_id, limit)?;
    Ok(Json(scans).into_response())
}

async fn api_scan_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> std::result::Result<Response, AppraiserError> {
    match state.history.get(&id)? {
        Some(record) => Ok(Json(record).into_response()),
        None => Err(AppraiserError::ScanNotFound(id)),
    }
}

impl IntoResponse for AppraiserError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppraiserError::QuotaExceeded { .. } => StatusCode::PAYMENT_REQUIRED,
            AppraiserError::ScanNotFound(_) => StatusCode::NOT_FOUND,
            err if err.is_caller_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!(error = %self, "request failed");
        }
        (status, Json(json!({"error": self.to_string()}))).into_response()
    }
}

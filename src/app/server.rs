// ==========================================
// 物料盘点导入系统 - HTTP 服务
// ==========================================
// 职责: 将 ImportApi 绑定到 HTTP 路由（特性 server）
// 路由:
// - POST /api/v1/upload-deposit
// - GET  /api/v1/iris?city=&coords=lng,lat
// - GET  /api/v1/geocode?address=
// - POST /api/v1/locality-geometry
// ==========================================

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::{ApiError, ImportApi};

#[derive(Clone)]
struct ServerState {
    api: Arc<ImportApi>,
}

#[derive(Debug, Deserialize)]
struct IrisQuery {
    #[serde(default)]
    city: String,
    #[serde(default)]
    coords: String,
}

#[derive(Debug, Deserialize)]
struct GeocodeQuery {
    #[serde(default)]
    address: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self, "请求处理失败");
        }
        (status, Json(self.to_body())).into_response()
    }
}

/// POST /api/v1/upload-deposit
async fn upload_deposit(State(state): State<ServerState>, body: String) -> Response {
    match state.api.upload_deposit(&body).await {
        Ok(response) => {
            let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::OK);
            (status, Json(response.body)).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// GET /api/v1/iris
async fn get_iris(State(state): State<ServerState>, Query(query): Query<IrisQuery>) -> Response {
    match state.api.get_iris(&query.city, &query.coords) {
        Ok(code) => Json(code).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /api/v1/geocode
async fn geocode(State(state): State<ServerState>, Query(query): Query<GeocodeQuery>) -> Response {
    match state.api.geocode(&query.address).await {
        Ok(candidates) => Json(candidates).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /api/v1/locality-geometry
async fn locality_geometry(State(state): State<ServerState>, body: String) -> Response {
    match state.api.locality_geometry(&body).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => e.into_response(),
    }
}

/// 构建路由
pub fn router(api: Arc<ImportApi>) -> Router {
    let api_routes = Router::new()
        .route("/upload-deposit", post(upload_deposit))
        .route("/iris", get(get_iris))
        .route("/geocode", get(geocode))
        .route("/locality-geometry", post(locality_geometry))
        .with_state(ServerState { api });

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// 启动 HTTP 服务
pub async fn serve(addr: &str, api: Arc<ImportApi>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HTTP 服务已启动: http://{}/api/v1", addr);
    axum::serve(listener, router(api)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_status() {
        let response = ApiError::InvalidInput("缺少字段 name".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ApiError::NotFound("无结果".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = ApiError::GeoError("歧义".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

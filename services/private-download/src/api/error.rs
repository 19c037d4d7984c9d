//! HTTP 错误响应

use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use pd_errors::AppError;
use tracing::error;

pub const PROBLEM_JSON: &str = "application/problem+json";

/// 把 `AppError` 转换为 problem+json 响应
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %self.0, kind = self.0.kind(), "Request failed");
        }

        (
            status,
            [(header::CONTENT_TYPE, PROBLEM_JSON)],
            Json(self.0.to_problem_details()),
        )
            .into_response()
    }
}

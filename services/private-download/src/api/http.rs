//! 私有文件下载入口
//!
//! 路由:
//! - `GET /system/files/{*path}` 经聚合器裁决后以附件形式返回文件
//! - `GET /health` 聚合器封存前返回 503
//! - `GET /metrics` Prometheus 文本

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{Path as UrlPath, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use pd_common::ResourcePath;
use pd_errors::{AppError, AppResult};
use pd_telemetry::{HealthStatus, PrometheusHandle};
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use super::error::ApiError;
use crate::application::AccessAggregator;

/// 共享状态
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<AccessAggregator>,
    /// 规范化后的受保护根目录
    pub protected_root: Arc<PathBuf>,
    /// 关闭时取消进行中的决策
    pub shutdown: CancellationToken,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        aggregator: Arc<AccessAggregator>,
        protected_root: impl AsRef<Path>,
        shutdown: CancellationToken,
    ) -> AppResult<Self> {
        let root = protected_root.as_ref();
        let protected_root = std::fs::canonicalize(root).map_err(|e| {
            AppError::configuration(format!(
                "protected root {} is not accessible: {}",
                root.display(),
                e
            ))
        })?;
        if !protected_root.is_dir() {
            return Err(AppError::configuration(format!(
                "protected root {} is not a directory",
                protected_root.display()
            )));
        }

        Ok(Self {
            aggregator,
            protected_root: Arc::new(protected_root),
            shutdown,
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/system/files/{*path}", get(serve_file))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn serve_file(
    State(state): State<AppState>,
    UrlPath(raw_path): UrlPath<String>,
) -> Result<Response, ApiError> {
    // 请求被丢弃时 guard 取消 token，进行中的 provider 任务随之中止
    let cancel = state.shutdown.child_token();
    let _guard = cancel.clone().drop_guard();

    let decision = state
        .aggregator
        .decide_with_cancel(&raw_path, &cancel)
        .await?;

    // 拒绝时无论文件是否存在都返回 403，避免泄露文件存在性
    if let Err(e) = decision.ensure_allowed() {
        info!(
            path = %decision.path,
            provider = ?decision.deciding_provider.as_ref().map(|p| p.as_str()),
            fail_closed = decision.is_fail_closed(),
            "Private file download denied"
        );
        return Err(e.into());
    }

    let file_path = locate(state.protected_root.as_path(), &decision.path).await?;
    let file = tokio::fs::File::open(&file_path)
        .await
        .map_err(AppError::from)?;
    let metadata = file.metadata().await.map_err(AppError::from)?;
    if !metadata.is_file() {
        return Err(AppError::not_found(format!("{} is not a file", decision.path)).into());
    }

    debug!(path = %decision.path, size = metadata.len(), "Streaming private file");

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            ),
            (header::CONTENT_LENGTH, HeaderValue::from(metadata.len())),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(&decision.path),
            ),
        ],
        body,
    )
        .into_response())
}

/// 解析到磁盘路径，符号链接不得逃出根目录
async fn locate(root: &Path, path: &ResourcePath) -> AppResult<PathBuf> {
    let candidate = path.resolve_under(root);
    let resolved = tokio::fs::canonicalize(&candidate)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AppError::not_found(format!("{} not found", path)),
            _ => AppError::from(e),
        })?;

    if !resolved.starts_with(root) {
        warn!(path = %path, "Resolved file escapes protected root");
        return Err(AppError::forbidden("access to this file is denied"));
    }
    Ok(resolved)
}

fn content_disposition(path: &ResourcePath) -> HeaderValue {
    let name = path.file_name();
    if name.contains('"') {
        return HeaderValue::from_static("attachment");
    }
    HeaderValue::from_str(&format!("attachment; filename=\"{}\"", name))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let mut status = HealthStatus::new();

    let sealed = state.aggregator.is_sealed();
    status.add_check(
        "aggregator",
        sealed,
        (!sealed).then(|| "access providers are still registering".to_string()),
    );

    let root_ok = tokio::fs::metadata(state.protected_root.as_path())
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    status.add_check(
        "protected_root",
        root_ok,
        (!root_ok).then(|| "protected root is not accessible".to_string()),
    );

    let code = if status.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status))
}

async fn metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

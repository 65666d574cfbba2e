use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::database::RepositoryError;
use crate::geo::{GeometryError, MatchError};
use crate::utils::{error_codes, error_to_api_response};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Validation(String),

    #[error("no path yet")]
    PathNotFound,

    #[error("path {0} not found")]
    UnknownPath(String),

    #[error(transparent)]
    MalformedGeometry(#[from] GeometryError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<MatchError> for AppError {
    fn from(e: MatchError) -> Self {
        match e {
            MatchError::Geometry(e) => AppError::MalformedGeometry(e),
            MatchError::Repository(e) => AppError::Repository(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, error_message) = match &self {
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                error_codes::AUTH_FAILED,
                "未授权访问".to_string(),
            ),
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                error_codes::VALIDATION_ERROR,
                msg.clone(),
            ),
            // 新用户还没有路线是正常情况，不按错误处理
            AppError::PathNotFound => (
                StatusCode::OK,
                error_codes::NO_PATH,
                "尚未创建路线".to_string(),
            ),
            AppError::UnknownPath(id) => (
                StatusCode::NOT_FOUND,
                error_codes::NOT_FOUND,
                format!("路线不存在: {}", id),
            ),
            AppError::MalformedGeometry(e) => {
                tracing::warn!("Unusable path geometry: {}", e);
                (StatusCode::OK, error_codes::NO_ROUTE, "路线不可用".to_string())
            }
            AppError::Repository(e) => {
                tracing::error!("Repository error: {}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    error_codes::STORE_ERROR,
                    format!("存储服务暂时不可用，请稍后重试: {}", e),
                )
            }
        };

        (status, error_to_api_response::<()>(code, error_message)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ApiResponse;
    use axum::body::to_bytes;

    async fn body(err: AppError) -> (StatusCode, ApiResponse<()>) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn match_errors_keep_their_meaning() {
        let geometry = AppError::from(MatchError::Geometry(GeometryError::MalformedGeometry(
            "LINESTRING(".into(),
        )));
        let (status, resp) = body(geometry).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp.code, error_codes::NO_ROUTE);

        let store = AppError::from(MatchError::Repository(RepositoryError::Corrupt(
            "path p1".into(),
        )));
        let (status, resp) = body(store).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(resp.code, error_codes::STORE_ERROR);
    }
}

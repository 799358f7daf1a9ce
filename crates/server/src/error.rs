use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::services::{document_store::StoreError, featured_limit::FeaturedLimitError};
use thiserror::Error;
use utils::{response::ApiResponse, webhook_signature::SignatureError, youtube::YoutubeUrlError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    FeaturedLimit(#[from] FeaturedLimitError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Youtube(#[from] YoutubeUrlError),
    #[error("webhook signature rejected: {0}")]
    Signature(#[from] SignatureError),
    #[error("bad request: {0}")]
    BadRequest(String),
}

fn store_status(error: &StoreError) -> StatusCode {
    match error {
        StoreError::RevisionConflict { .. } => StatusCode::CONFLICT,
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        StoreError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::FeaturedLimit(err) => match err {
                FeaturedLimitError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
                FeaturedLimitError::StoreRead(source)
                | FeaturedLimitError::StoreWrite { source, .. } => store_status(source),
                FeaturedLimitError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
                FeaturedLimitError::TimedOut => StatusCode::GATEWAY_TIMEOUT,
            },
            ApiError::Store(err) => store_status(err),
            ApiError::Youtube(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Signature(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = %status, "Request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }
        let body = ApiResponse::<()>::error(&self.to_string());
        (status, Json(body)).into_response()
    }
}

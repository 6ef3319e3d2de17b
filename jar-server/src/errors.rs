use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use jar_core::ErrorBody;
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("{0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("{0}")]
    ApiError(#[from] ApiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("Status=400, BadRequest: {0}")]
    BadRequest(String),
    #[error("Status=404, NotFound: {0}")]
    NotFound(String),
    #[error("Status=500, InternalServerError: {0}")]
    InternalServerError(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalServerError(message.into())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ServerError::ApiError(e) => {
                tracing::warn!("{}", e);
                match e {
                    ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
                    ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
                    ApiError::InternalServerError(message) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, message)
                    }
                }
            }
            other => {
                tracing::error!(%other, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Unexpected Error".to_string(),
                )
            }
        };

        (status, axum::Json(ErrorBody { message })).into_response()
    }
}

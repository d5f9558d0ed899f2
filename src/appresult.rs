use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use tracing::error;

use crate::error::{CoreError, ErrorKind};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError(pub CoreError);

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Transport => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }

        (
            status,
            Json(json!({ "error": self.0.public_message(), "code": self.0.code() })),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<CoreError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_taxonomy() {
        let cases = [
            (CoreError::validation("short"), StatusCode::UNPROCESSABLE_ENTITY),
            (CoreError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (CoreError::MatchNotActive(1), StatusCode::FORBIDDEN),
            (CoreError::conflict("dup"), StatusCode::CONFLICT),
            (CoreError::not_found("gone"), StatusCode::NOT_FOUND),
            (CoreError::Transport("closed".into()), StatusCode::SERVICE_UNAVAILABLE),
        ];

        for (err, status) in cases {
            assert_eq!(AppError(err).status(), status);
        }
    }
}

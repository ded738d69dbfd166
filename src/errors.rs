use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::services::scheduling::SchedulingError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Scheduling(#[from] SchedulingError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Scheduling(SchedulingError::InvalidRequest(_))
            | AppError::Scheduling(SchedulingError::RangeTooLarge { .. }) => StatusCode::BAD_REQUEST,
            AppError::Scheduling(SchedulingError::Internal { .. }) => {
                tracing::error!(error = %self, "slot recommendation failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_status_codes() {
        let bad = AppError::InvalidRequest("text must not be empty".into()).into_response();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let range = AppError::from(SchedulingError::RangeTooLarge { days: 400, max: 366 }).into_response();
        assert_eq!(range.status(), StatusCode::BAD_REQUEST);

        let internal = AppError::from(SchedulingError::Internal {
            request_id: Uuid::new_v4(),
            reason: "date overflow".into(),
        })
        .into_response();
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_internal_message_carries_request_id() {
        let request_id = Uuid::new_v4();
        let err = AppError::from(SchedulingError::Internal {
            request_id,
            reason: "date overflow".into(),
        });
        assert!(err.to_string().contains(&request_id.to_string()));
    }
}

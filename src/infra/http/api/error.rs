use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use stampa_api_types::{ApiErrorBody, ApiErrorMessage};

use crate::application::error::ErrorReport;

pub mod codes {
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const OVERLOADED: &str = "overloaded";
    pub const NOT_FOUND: &str = "not_found";
    pub const NOT_READY: &str = "not_ready";
    pub const INTERNAL: &str = "internal_error";
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
        }
    }

    pub fn invalid_input(hint: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Submission rejected",
            Some(hint.into()),
        )
    }

    pub fn not_found(message: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    pub fn not_ready() -> Self {
        Self::new(
            StatusCode::CONFLICT,
            codes::NOT_READY,
            "Job has not completed yet",
            Some("poll the status endpoint until state is `completed`".to_string()),
        )
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::INTERNAL,
            "Internal error",
            Some(detail.into()),
        )
    }

    /// 503 with a Retry-After header: the queue is full and the submitter
    /// should back off.
    pub fn overloaded(retry_after_seconds: u64) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: codes::OVERLOADED.to_string(),
                message: "Render queue is full".to_string(),
                hint: Some(format!("Retry after {retry_after_seconds} seconds")),
            },
        };
        let mut response = (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response();
        if let Ok(value) = axum::http::HeaderValue::from_str(&retry_after_seconds.to_string()) {
            response
                .headers_mut()
                .insert(axum::http::header::RETRY_AFTER, value);
        }
        ErrorReport::from_message(
            "infra::http::api::overloaded",
            StatusCode::SERVICE_UNAVAILABLE,
            format!("overloaded: retry_after={retry_after_seconds}"),
        )
        .attach(&mut response);
        response
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let hint = self.hint.clone();
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        // Attach a structured report so shared logging middleware can emit rich diagnostics.
        ErrorReport::from_message(
            "infra::http::api",
            self.status,
            format!("{}: {}", self.code, hint.as_deref().unwrap_or(self.message)),
        )
        .attach(&mut response);
        response
    }
}

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use devportal_core::DomainError;

/// HTTP status for each error class.
pub fn status_for(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::Conflict(_) => StatusCode::CONFLICT,
        DomainError::InvalidState(_) => StatusCode::PRECONDITION_FAILED,
        DomainError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::error!(code = err.code(), "request failed: {err}");
    }
    json_error(status, err.code(), err.kind(), err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    kind: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "kind": kind,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a path segment into a typed id, answering 422 on garbage.
pub fn parse_id<T>(raw: &str) -> Result<T, axum::response::Response>
where
    T: core::str::FromStr<Err = DomainError>,
{
    raw.parse().map_err(domain_error_to_response)
}

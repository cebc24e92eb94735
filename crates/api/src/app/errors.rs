use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use jobwork_core::DomainError;

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let status = match &err {
        DomainError::Validation(_) => StatusCode::BAD_REQUEST,
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::InsufficientStock(_)
        | DomainError::OverAllocation(_)
        | DomainError::LockConflict(_)
        | DomainError::AlreadyReviewed(_) => StatusCode::CONFLICT,
        DomainError::Contention(_) => StatusCode::SERVICE_UNAVAILABLE,
        DomainError::InvariantViolation(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        tracing::error!(code = err.code(), error = %err, "ledger operation failed");
    }

    json_error(status, err.code(), err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a path or body id, answering 400 `invalid_id` on garbage.
pub fn parse_id<T: std::str::FromStr>(
    raw: &str,
    what: &str,
) -> Result<T, axum::response::Response> {
    raw.trim().parse().map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("invalid {what} id"),
        )
    })
}

use axum::{http::StatusCode, Json};
use serde::Serialize;
use serde_json::{json, Value};

/// Success envelope shared by every endpoint:
/// `{"status": "success", "code": N, "message": ..., "data": ...}`.
pub fn success<T: Serialize>(
    status: StatusCode,
    message: &str,
    data: T,
) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({
            "status": "success",
            "code": status.as_u16(),
            "message": message,
            "data": data,
        })),
    )
}

pub fn ok<T: Serialize>(data: T) -> (StatusCode, Json<Value>) {
    success(StatusCode::OK, "Operation successful", data)
}

pub fn created<T: Serialize>(message: &str, data: T) -> (StatusCode, Json<Value>) {
    success(StatusCode::CREATED, message, data)
}

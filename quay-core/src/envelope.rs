use serde::Serialize;

use crate::error::{EngineError, ErrorCode};

/// Uniform result shape exposed to the (external) transport layer:
/// `{ success, data | error, http_status }`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub http_status: u16,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            http_status: 200,
        }
    }

    pub fn err(err: &EngineError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: err.code(),
                message: err.to_string(),
            }),
            http_status: err.http_status(),
        }
    }
}

impl<T> From<Result<T, EngineError>> for ApiResponse<T> {
    fn from(result: Result<T, EngineError>) -> Self {
        match result {
            Ok(data) => ApiResponse::ok(data),
            Err(e) => ApiResponse::err(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_envelope_carries_data_and_200() {
        let resp = ApiResponse::ok(42u32);
        assert!(resp.success);
        assert_eq!(resp.data, Some(42));
        assert_eq!(resp.http_status, 200);
        assert!(resp.error.is_none());
    }

    #[test]
    fn error_envelope_serializes_code_and_status() {
        let resp: ApiResponse<()> =
            ApiResponse::err(&EngineError::Conflict { requested: 5, available: 2 });
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["http_status"], 409);
        assert_eq!(json["error"]["code"], "CONFLICT");
        assert!(json.get("data").is_none());
    }
}

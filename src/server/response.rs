//! # HTTP 响应
//!
//! 成功回跳统一为 302；失败统一为 JSON 诊断体，且不带 `Location` 头。

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LinkError;

/// # 标准错误信息
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

/// # 标准错误响应
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// # 便捷函数：HTTP错误响应
pub fn error(status: StatusCode, code: &str, message: &str, request_id: Option<&str>) -> Response {
    let body = ErrorResponse {
        success: false,
        error: ErrorInfo {
            code: code.to_string(),
            message: message.to_string(),
        },
        request_id: request_id.map(str::to_string),
        timestamp: Utc::now(),
    };
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

/// # 便捷函数：关联错误响应
pub fn link_error(err: &LinkError, request_id: &str) -> Response {
    let (status, code) = err.to_http_response_parts();
    error(status, code, &err.to_string(), Some(request_id))
}

/// # 便捷函数：302 跳转
///
/// 地址无法放入响应头时返回 500，不发出跳转。
pub fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (
            StatusCode::FOUND,
            [
                (header::LOCATION, value),
                (header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
            ],
        )
            .into_response(),
        Err(_) => error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INVALID_LOCATION",
            "redirect target is not a valid header value",
            None,
        ),
    }
}

impl IntoResponse for LinkError {
    fn into_response(self) -> Response {
        let (status, code) = self.to_http_response_parts();
        error(status, code, &self.to_string(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_never_carry_location() {
        let response = LinkError::InvalidClient {
            client_id: "x".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(header::LOCATION).is_none());
    }

    #[test]
    fn found_sets_location_and_no_store() {
        let response = found("https://oauth-redirect.example.com/r/p#access_token=a&state=b");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[header::LOCATION],
            "https://oauth-redirect.example.com/r/p#access_token=a&state=b"
        );
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    }

    #[test]
    fn invalid_location_is_not_redirected() {
        let response = found("https://example.com/\n");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(header::LOCATION).is_none());
    }
}

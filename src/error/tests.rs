//! # 错误处理测试

use crate::error::{Context, LinkError, RelayError};
use axum::http::StatusCode;
use std::error::Error;

#[test]
fn test_config_error_creation() {
    let err = RelayError::config("测试配置错误");
    assert!(matches!(err, RelayError::Config { .. }));
    assert_eq!(err.to_string(), "配置错误: 测试配置错误");
}

#[test]
fn test_config_error_with_source() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "文件不存在");
    let err = RelayError::config_with_source("配置文件加载失败", io_err);

    assert!(err.to_string().contains("配置错误: 配置文件加载失败"));
    assert!(err.source().is_some());
}

#[test]
fn test_context_trait_wraps_source() {
    let result: Result<(), std::io::Error> = Err(std::io::Error::new(
        std::io::ErrorKind::PermissionDenied,
        "权限不足",
    ));

    let err = result.context("读取密钥文件失败").unwrap_err();
    assert!(matches!(err, RelayError::Context { .. }));
    assert!(err.to_string().starts_with("读取密钥文件失败"));
    assert!(err.to_string().contains("IO错误"));
    assert!(err.source().is_some());
}

#[test]
fn test_auto_conversion_from_toml_error() {
    let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
    let err: RelayError = toml_err.into();

    assert!(matches!(err, RelayError::Config { .. }));
    assert!(err.to_string().contains("TOML解析失败"));
}

#[test]
fn test_validation_errors_are_client_errors() {
    let redirect = LinkError::invalid_redirect("https://evil.example/r/p", "host mismatch");
    let client = LinkError::InvalidClient {
        client_id: "other".to_string(),
    };
    let callback = LinkError::MalformedCallback("missing code".to_string());

    for err in [redirect, client, callback] {
        assert!(err.to_http_response_parts().0.is_client_error());
        assert_eq!(err.to_http_response_parts().0, StatusCode::BAD_REQUEST);
    }
}

#[test]
fn test_exchange_timeout_is_exchange_failed() {
    let err = LinkError::exchange_timeout(1500);
    assert!(matches!(
        err,
        LinkError::ExchangeFailed {
            timed_out: true,
            ..
        }
    ));
    assert!(err.to_http_response_parts().0.is_server_error());
    assert_eq!(err.to_http_response_parts().1, "EXCHANGE_TIMEOUT");
    assert!(err.to_string().contains("1500ms"));
}

#[test]
fn test_sign_in_rejection_is_unauthorized() {
    let err = LinkError::SignInRejected("audience mismatch".to_string());
    assert_eq!(err.to_http_response_parts().0, StatusCode::UNAUTHORIZED);
}

//! Errors raised while relaying a single account-linking transaction.
//!
//! Every variant except [`LinkError::PersistenceFailed`] is fail-closed: the
//! handler answers with a non-2xx status and never emits a `Location` header.

use axum::http::StatusCode;
use thiserror::Error;

/// Protocol-level error taxonomy for the relay.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("redirect_uri is not the expected completion endpoint: {reason}")]
    InvalidRedirect { redirect_uri: String, reason: String },

    #[error("client_id '{client_id}' is not registered with this relay")]
    InvalidClient { client_id: String },

    #[error("malformed provider callback: {0}")]
    MalformedCallback(String),

    #[error("token exchange failed: {message}")]
    ExchangeFailed {
        message: String,
        timed_out: bool,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("token persistence failed: {message}")]
    PersistenceFailed {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("malformed sign-in request: {0}")]
    MalformedRequest(String),

    #[error("sign-in token rejected: {0}")]
    SignInRejected(String),

    #[error("token verification failed: {message}")]
    VerificationFailed {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl LinkError {
    /// 创建重定向地址错误
    pub fn invalid_redirect<U: Into<String>, R: Into<String>>(redirect_uri: U, reason: R) -> Self {
        Self::InvalidRedirect {
            redirect_uri: redirect_uri.into(),
            reason: reason.into(),
        }
    }

    /// 创建令牌交换错误
    pub fn exchange_failed<T: Into<String>>(message: T) -> Self {
        Self::ExchangeFailed {
            message: message.into(),
            timed_out: false,
            source: None,
        }
    }

    /// 创建带来源的令牌交换错误
    pub fn exchange_failed_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::ExchangeFailed {
            message: message.into(),
            timed_out: false,
            source: Some(source.into()),
        }
    }

    /// 令牌交换超时
    pub fn exchange_timeout(timeout_ms: u64) -> Self {
        Self::ExchangeFailed {
            message: format!("token endpoint did not answer within {timeout_ms}ms"),
            timed_out: true,
            source: None,
        }
    }

    /// 创建持久化错误
    pub fn persistence_failed<T: Into<String>>(message: T) -> Self {
        Self::PersistenceFailed {
            message: message.into(),
            source: None,
        }
    }

    /// 创建令牌校验错误
    pub fn verification_failed_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::VerificationFailed {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// HTTP status and stable error code for the diagnostic body.
    #[must_use]
    pub const fn to_http_response_parts(&self) -> (StatusCode, &'static str) {
        match self {
            Self::InvalidRedirect { .. } => (StatusCode::BAD_REQUEST, "INVALID_REDIRECT"),
            Self::InvalidClient { .. } => (StatusCode::BAD_REQUEST, "INVALID_CLIENT"),
            Self::MalformedCallback(_) => (StatusCode::BAD_REQUEST, "MALFORMED_CALLBACK"),
            Self::ExchangeFailed {
                timed_out: true, ..
            } => (StatusCode::GATEWAY_TIMEOUT, "EXCHANGE_TIMEOUT"),
            Self::ExchangeFailed { .. } => (StatusCode::BAD_GATEWAY, "EXCHANGE_FAILED"),
            Self::PersistenceFailed { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "PERSISTENCE_FAILED")
            }
            Self::MalformedRequest(_) => (StatusCode::BAD_REQUEST, "MALFORMED_REQUEST"),
            Self::SignInRejected(_) => (StatusCode::UNAUTHORIZED, "SIGN_IN_REJECTED"),
            Self::VerificationFailed { .. } => (StatusCode::BAD_GATEWAY, "VERIFICATION_FAILED"),
        }
    }
}

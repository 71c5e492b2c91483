//! # 令牌交换
//!
//! 身份提供商回调 `/exch` 的参数提取与授权码换令牌。
//!
//! GET 查询串和 POST 表单体先归一成同一个键值来源，再由
//! [`CallbackParams::extract`] 统一提取，交换逻辑与传输方式无关。

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use oauth2::basic::{BasicErrorResponse, BasicTokenResponse, BasicTokenType};
use oauth2::{AuthorizationCode, HttpClientError, RequestTokenError, TokenResponse};
use super::query::parse_pairs;
use super::redirect::{ProviderClient, build_provider_client};
use super::state::RelayState;
use crate::config::RelayConfig;
use crate::error::{LinkError, LinkResult, RelayError, Result};

/// 键值参数来源
///
/// 值是百分号解码一次后的原始字节。
pub trait ParamSource {
    /// 取参数值，不存在返回 `None`
    fn param(&self, key: &str) -> Option<&[u8]>;

    /// 取 UTF-8 文本值，不是合法 UTF-8 时返回 `None`
    fn text(&self, key: &str) -> Option<&str> {
        self.param(key).and_then(|value| std::str::from_utf8(value).ok())
    }
}

impl ParamSource for HashMap<String, Vec<u8>> {
    fn param(&self, key: &str) -> Option<&[u8]> {
        self.get(key).map(Vec::as_slice)
    }
}

impl ParamSource for [(String, Vec<u8>)] {
    fn param(&self, key: &str) -> Option<&[u8]> {
        self.iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_slice())
    }
}

/// 合并查询串与表单体参数
///
/// 同一来源内首次出现的值生效；两个来源都有时表单体优先。
#[must_use]
pub fn collect_params(query: Option<&str>, form_body: Option<&[u8]>) -> HashMap<String, Vec<u8>> {
    let mut params = HashMap::new();
    if let Some(query) = query {
        for (key, value) in parse_pairs(query.as_bytes()) {
            params.entry(key).or_insert(value);
        }
    }
    if let Some(body) = form_body {
        let mut from_body = HashMap::new();
        for (key, value) in parse_pairs(body) {
            from_body.entry(key).or_insert(value);
        }
        params.extend(from_body);
    }
    params
}

/// 回调携带的授权码与 `state`
#[derive(Clone, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: String,
    pub state: RelayState,
}

impl fmt::Debug for CallbackParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackParams")
            .field("code", &"<redacted>")
            .field("state", &self.state)
            .finish()
    }
}

impl CallbackParams {
    /// 从任意键值来源提取
    ///
    /// `code` 或 `state` 缺失、为空，或提供商返回了 `error`，都是 `MalformedCallback`。
    /// `code` 必须是 UTF-8；`state` 按原始字节透传。
    pub fn extract<P: ParamSource + ?Sized>(source: &P) -> LinkResult<Self> {
        let code = source.param("code").filter(|code| !code.is_empty());

        if code.is_none() {
            if let Some(error) = source.param("error").filter(|e| !e.is_empty()) {
                let detail = source
                    .param("error_description")
                    .map(|d| format!(" ({})", String::from_utf8_lossy(d)))
                    .unwrap_or_default();
                return Err(LinkError::MalformedCallback(format!(
                    "provider returned error '{}'{detail}",
                    String::from_utf8_lossy(error)
                )));
            }
        }

        let code = code.ok_or_else(|| LinkError::MalformedCallback("missing code".to_string()))?;
        let code = std::str::from_utf8(code)
            .map_err(|_| LinkError::MalformedCallback("code is not valid UTF-8".to_string()))?;
        let state = source
            .param("state")
            .filter(|state| !state.is_empty())
            .ok_or_else(|| LinkError::MalformedCallback("missing state".to_string()))?;

        Ok(Self {
            code: code.to_string(),
            state: RelayState::from(state),
        })
    }
}

/// 身份提供商签发的令牌
#[derive(Clone, PartialEq, Eq)]
pub struct UpstreamToken {
    pub access_token: String,
    pub token_type: String,
    pub refresh_token: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
}

impl UpstreamToken {
    /// 构造 bearer 令牌
    #[must_use]
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: "bearer".to_string(),
            refresh_token: None,
            expiry: None,
        }
    }

    fn from_response(response: &BasicTokenResponse) -> Self {
        #[allow(unreachable_patterns)]
        let token_type = match response.token_type() {
            BasicTokenType::Bearer => "bearer".to_string(),
            BasicTokenType::Extension(other) => other.to_ascii_lowercase(),
            other => format!("{other:?}").to_ascii_lowercase(),
        };
        let expiry = response
            .expires_in()
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .map(|ttl| Utc::now() + ttl);

        Self {
            access_token: response.access_token().secret().clone(),
            token_type,
            refresh_token: response.refresh_token().map(|t| t.secret().clone()),
            expiry,
        }
    }
}

impl fmt::Debug for UpstreamToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamToken")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// 授权码换令牌
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    /// 以授权码换取令牌；网络错误、提供商错误和超时都是 `ExchangeFailed`
    async fn exchange(&self, code: &str) -> LinkResult<UpstreamToken>;
}

/// 基于 `oauth2` 的令牌交换实现
pub struct OAuthTokenExchanger {
    client: ProviderClient,
    http: reqwest::Client,
    timeout: Duration,
}

impl OAuthTokenExchanger {
    pub fn new(config: &RelayConfig) -> Result<Self> {
        let timeout = config.exchange_timeout();
        // 令牌端点不应跟随重定向
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::network_with_source("创建HTTP客户端失败", e))?;

        Ok(Self {
            client: build_provider_client(config)?,
            http,
            timeout,
        })
    }
}

#[async_trait]
impl TokenExchanger for OAuthTokenExchanger {
    async fn exchange(&self, code: &str) -> LinkResult<UpstreamToken> {
        let request = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http);

        let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| LinkError::exchange_timeout(timeout_ms))?
            .map_err(|err| classify_token_error(err, timeout_ms))?;

        let token = UpstreamToken::from_response(&response);
        if token.access_token.is_empty() {
            return Err(LinkError::exchange_failed("provider returned an empty access token"));
        }
        Ok(token)
    }
}

type TokenRequestError =
    RequestTokenError<HttpClientError<reqwest::Error>, BasicErrorResponse>;

fn classify_token_error(err: TokenRequestError, timeout_ms: u64) -> LinkError {
    match err {
        RequestTokenError::ServerResponse(response) => {
            let message = format!("provider rejected the code: {}", response.error());
            LinkError::exchange_failed(message)
        }
        RequestTokenError::Request(HttpClientError::Reqwest(e)) if e.is_timeout() => {
            LinkError::exchange_timeout(timeout_ms)
        }
        other => LinkError::exchange_failed_with_source("token endpoint request failed", other),
    }
}

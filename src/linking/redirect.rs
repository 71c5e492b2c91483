//! # 跳转构造
//!
//! - [`UpstreamRedirectBuilder`]：构造身份提供商授权页地址
//! - [`CompletionRedirect`]：构造回跳助手平台的完成地址

use oauth2::basic::BasicClient;
use oauth2::{AuthUrl, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet, RedirectUrl, Scope, TokenUrl};
use url::Url;
use url::form_urlencoded::byte_serialize;

use super::request::ValidatedRequest;
use super::state::RelayState;
use crate::config::RelayConfig;
use crate::error::{RelayError, Result};

/// 配好授权端点与令牌端点的 OAuth2 客户端
pub type ProviderClient = BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// 按中继配置构造 OAuth2 客户端
///
/// 提供商回调地址固定为中继自己的 `own_callback_url`。
pub fn build_provider_client(config: &RelayConfig) -> Result<ProviderClient> {
    let auth_url = AuthUrl::new(config.auth_url.clone())
        .map_err(|e| RelayError::config_with_source(format!("无效的授权URL: {}", config.auth_url), e))?;
    let token_url = TokenUrl::new(config.token_url.clone())
        .map_err(|e| RelayError::config_with_source(format!("无效的令牌URL: {}", config.token_url), e))?;
    let redirect_url = RedirectUrl::new(config.own_callback_url.clone()).map_err(|e| {
        RelayError::config_with_source(format!("无效的回调URL: {}", config.own_callback_url), e)
    })?;

    Ok(BasicClient::new(ClientId::new(config.provider_client_id.clone()))
        .set_client_secret(ClientSecret::new(config.provider_client_secret.clone()))
        .set_auth_uri(auth_url)
        .set_token_uri(token_url)
        .set_redirect_uri(redirect_url))
}

/// 身份提供商授权页地址构造器
///
/// 启动时构造一次，之后只读。
#[derive(Clone)]
pub struct UpstreamRedirectBuilder {
    client: ProviderClient,
    scopes: Vec<Scope>,
    offline_access: bool,
    force_consent: bool,
}

impl UpstreamRedirectBuilder {
    pub fn new(config: &RelayConfig) -> Result<Self> {
        Ok(Self {
            client: build_provider_client(config)?,
            scopes: config.scopes.iter().cloned().map(Scope::new).collect(),
            offline_access: config.offline_access,
            force_consent: config.force_consent,
        })
    }

    /// 构造授权页地址
    ///
    /// 入站 `state` 原样作为提供商的 `state`，不另生成 CSRF 值。
    #[must_use]
    pub fn build(&self, request: &ValidatedRequest) -> Url {
        self.consent_url(request.state())
    }

    /// 按 `state` 构造授权页地址
    ///
    /// `CsrfToken` 只能承载 UTF-8，因此 `state` 在 `oauth2` 生成地址后按原始字节写回查询串。
    #[must_use]
    pub fn consent_url(&self, state: &RelayState) -> Url {
        let mut auth_request = self
            .client
            .authorize_url(|| CsrfToken::new(String::new()))
            .add_scopes(self.scopes.iter().cloned());

        if self.offline_access {
            auth_request = auth_request.add_extra_param("access_type", "offline");
        }
        if self.force_consent {
            auth_request = auth_request.add_extra_param("prompt", "consent");
        }

        let (mut url, _csrf) = auth_request.url();
        let query = with_raw_state(&url, state);
        url.set_query(Some(&query));
        url
    }
}

/// 重新序列化查询串，`state` 取原始字节
fn with_raw_state(url: &Url, state: &RelayState) -> String {
    let mut pairs: Vec<String> = Vec::new();
    let mut state_written = false;
    for (key, value) in url.query_pairs() {
        let bytes = if key == "state" {
            if state_written {
                continue;
            }
            state_written = true;
            state.as_bytes()
        } else {
            value.as_bytes()
        };
        pairs.push(form_pair(key.as_bytes(), bytes));
    }
    if !state_written {
        pairs.push(form_pair(b"state", state.as_bytes()));
    }
    pairs.join("&")
}

fn form_pair(key: &[u8], value: &[u8]) -> String {
    format!(
        "{}={}",
        byte_serialize(key).collect::<String>(),
        byte_serialize(value).collect::<String>()
    )
}

/// 回跳助手平台的完成地址
///
/// 令牌和 `state` 只出现在片段中，不会进入查询串。
#[derive(Clone, PartialEq, Eq)]
pub struct CompletionRedirect(String);

impl CompletionRedirect {
    /// 按完成端点、访问令牌与 `state` 构造
    #[must_use]
    pub fn new(config: &RelayConfig, access_token: &str, state: &RelayState) -> Self {
        Self(format!(
            "{}#access_token={}&token_type=bearer&state={}",
            config.completion_endpoint(),
            urlencoding::encode(access_token),
            urlencoding::encode_binary(state.as_bytes()),
        ))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

// 地址内含访问令牌
impl std::fmt::Debug for CompletionRedirect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let base = self.0.split('#').next().unwrap_or_default();
        write!(f, "CompletionRedirect({base}#<redacted>)")
    }
}

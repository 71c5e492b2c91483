//! # Google 登录账户关联
//!
//! 助手平台在用户完成 Google 登录后，把带有 ID 令牌的 webhook 请求发到 `/link`。
//! 中继通过 tokeninfo 端点校验 ID 令牌，受众必须是本中继的客户端ID，
//! 校验通过后把用户交给 [`UserStore`]。

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::store::{LinkedUser, UserStore, persist_user};
use crate::config::RelayConfig;
use crate::error::{LinkError, LinkResult, RelayError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::{linfo, lwarn};

/// 平台 webhook 请求，只解析关联需要的字段
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRequest {
    #[serde(default)]
    pub response_id: String,
    #[serde(default)]
    pub session: String,
    #[serde(default)]
    pub original_detect_intent_request: Option<OriginalDetectIntentRequest>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginalDetectIntentRequest {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub payload: Option<AssistantPayload>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantPayload {
    #[serde(default)]
    pub user: Option<AssistantUser>,
    #[serde(default)]
    pub is_in_sandbox: bool,
}

/// 助手平台用户
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantUser {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub id_token: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub locale: String,
}

impl fmt::Debug for AssistantUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssistantUser")
            .field("user_id", &self.user_id)
            .field("id_token", &"<redacted>")
            .field("access_token", &"<redacted>")
            .field("locale", &self.locale)
            .finish()
    }
}

impl WebhookRequest {
    /// 解析请求体
    pub fn from_slice(body: &[u8]) -> LinkResult<Self> {
        serde_json::from_slice(body)
            .map_err(|e| LinkError::MalformedRequest(format!("invalid webhook JSON: {e}")))
    }

    /// 请求中的用户，缺失或没有 ID 令牌时报错
    pub fn user(&self) -> LinkResult<&AssistantUser> {
        let user = self
            .original_detect_intent_request
            .as_ref()
            .and_then(|original| original.payload.as_ref())
            .and_then(|payload| payload.user.as_ref())
            .ok_or_else(|| LinkError::MalformedRequest("payload.user is missing".to_string()))?;

        if user.id_token.is_empty() {
            return Err(LinkError::MalformedRequest("payload.user.idToken is missing".to_string()));
        }
        Ok(user)
    }
}

/// tokeninfo 端点返回的令牌信息
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct TokenInfo {
    #[serde(default, alias = "audience")]
    pub aud: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
}

/// ID 令牌校验
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdTokenVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> LinkResult<TokenInfo>;
}

/// 通过 Google tokeninfo 端点校验
pub struct GoogleTokenInfoVerifier {
    http: reqwest::Client,
    tokeninfo_url: String,
}

impl GoogleTokenInfoVerifier {
    pub fn new(config: &RelayConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.exchange_timeout_ms))
            .build()
            .map_err(|e| RelayError::network_with_source("创建HTTP客户端失败", e))?;
        Ok(Self {
            http,
            tokeninfo_url: config.tokeninfo_url.clone(),
        })
    }
}

#[async_trait]
impl IdTokenVerifier for GoogleTokenInfoVerifier {
    async fn verify(&self, id_token: &str) -> LinkResult<TokenInfo> {
        let response = self
            .http
            .get(&self.tokeninfo_url)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(|e| LinkError::verification_failed_with_source("tokeninfo request failed", e))?;

        let status = response.status();
        if status.is_client_error() {
            return Err(LinkError::SignInRejected(format!(
                "provider refused the id token ({status})"
            )));
        }
        if !status.is_success() {
            return Err(LinkError::VerificationFailed {
                message: format!("tokeninfo answered {status}"),
                source: None,
            });
        }

        response
            .json::<TokenInfo>()
            .await
            .map_err(|e| LinkError::verification_failed_with_source("invalid tokeninfo body", e))
    }
}

/// 关联 Google 登录用户
///
/// 受众不符返回 `SignInRejected`；存储失败只记录日志。
pub async fn link_user(
    request: &WebhookRequest,
    client_id: &str,
    verifier: &dyn IdTokenVerifier,
    store: &dyn UserStore,
    request_id: &str,
) -> LinkResult<LinkedUser> {
    let user = request.user()?;
    let info = verifier.verify(&user.id_token).await?;

    if info.aud != client_id {
        lwarn!(
            request_id,
            LogStage::SignIn,
            LogComponent::SignIn,
            "audience_mismatch",
            &format!("token audience '{}' does not match this relay", info.aud)
        );
        return Err(LinkError::SignInRejected(format!(
            "token audience '{}' does not match",
            info.aud
        )));
    }

    let linked = LinkedUser {
        email: info.email.unwrap_or_default(),
        id: user.user_id.clone(),
        access_token: user.access_token.clone(),
    };
    // 存储失败不影响关联结果
    let _ = persist_user(store, &linked, request_id).await;

    linfo!(
        request_id,
        LogStage::SignIn,
        LogComponent::SignIn,
        "link_user",
        "Google sign-in user linked",
        user_id = linked.id.as_str()
    );
    Ok(linked)
}

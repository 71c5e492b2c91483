//! # 应用配置结构定义

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::error::{RelayError, Result};

/// 应用主配置结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP 服务器配置
    #[serde(default)]
    pub server: ServerConfig,
    /// 账户关联中继配置
    pub relay: RelayConfig,
    /// 日志级别（`RUST_LOG` 优先）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl AppConfig {
    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.relay.validate()
    }
}

/// HTTP 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 监听地址
    pub bind_address: String,
    /// 监听端口
    pub port: u16,
    /// 最大请求体大小（字节）
    pub max_request_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            max_request_size: 64 * 1024,
        }
    }
}

impl ServerConfig {
    fn validate(&self) -> Result<()> {
        if self.bind_address.parse::<std::net::IpAddr>().is_err() {
            return Err(RelayError::config(format!(
                "无效的监听地址: {}",
                self.bind_address
            )));
        }
        if self.max_request_size == 0 {
            return Err(RelayError::config("最大请求体大小必须大于0"));
        }
        Ok(())
    }
}

/// 账户关联中继配置
///
/// 进程启动时加载一次，之后只读，通过 `Arc` 在并发请求间共享。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// 在助手平台注册、同时用于身份提供商的客户端ID
    #[serde(default)]
    pub provider_client_id: String,
    /// 身份提供商客户端密钥
    #[serde(default, skip_serializing)]
    pub provider_client_secret: String,
    /// 助手平台项目ID
    #[serde(default)]
    pub project_id: String,
    /// 申请的授权范围
    #[serde(default)]
    pub scopes: Vec<String>,
    /// 是否申请离线访问（刷新令牌）
    #[serde(default = "default_true")]
    pub offline_access: bool,
    /// 是否强制重新显示授权页
    #[serde(default)]
    pub force_consent: bool,
    /// 中继自身的回调地址，身份提供商授权后回调此地址
    pub own_callback_url: String,
    /// 助手平台域名，完成端点为 `https://oauth-redirect.<platform_domain>/r/<project_id>`
    #[serde(default = "default_platform_domain")]
    pub platform_domain: String,
    /// 身份提供商授权端点
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    /// 身份提供商令牌端点
    #[serde(default = "default_token_url")]
    pub token_url: String,
    /// ID 令牌校验端点
    #[serde(default = "default_tokeninfo_url")]
    pub tokeninfo_url: String,
    /// 令牌交换超时（毫秒）
    #[serde(default = "default_exchange_timeout_ms")]
    pub exchange_timeout_ms: u64,
    /// Google 客户端密钥 JSON 文件路径（可选）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_path: Option<PathBuf>,
}

const fn default_true() -> bool {
    true
}

fn default_platform_domain() -> String {
    "googleusercontent.com".to_string()
}

fn default_auth_url() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_tokeninfo_url() -> String {
    "https://oauth2.googleapis.com/tokeninfo".to_string()
}

const fn default_exchange_timeout_ms() -> u64 {
    10_000
}

impl RelayConfig {
    /// 以默认端点创建配置
    pub fn new<I, S, P, C>(client_id: I, client_secret: S, project_id: P, own_callback_url: C) -> Self
    where
        I: Into<String>,
        S: Into<String>,
        P: Into<String>,
        C: Into<String>,
    {
        Self {
            provider_client_id: client_id.into(),
            provider_client_secret: client_secret.into(),
            project_id: project_id.into(),
            scopes: Vec::new(),
            offline_access: true,
            force_consent: false,
            own_callback_url: own_callback_url.into(),
            platform_domain: default_platform_domain(),
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            tokeninfo_url: default_tokeninfo_url(),
            exchange_timeout_ms: default_exchange_timeout_ms(),
            secret_path: None,
        }
    }

    /// 设置平台域名
    #[must_use]
    pub fn with_platform_domain(mut self, domain: impl Into<String>) -> Self {
        self.platform_domain = domain.into();
        self
    }

    /// 设置授权范围
    #[must_use]
    pub fn with_scopes<S: Into<String>>(mut self, scopes: impl IntoIterator<Item = S>) -> Self {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// 设置身份提供商端点
    #[must_use]
    pub fn with_provider_endpoints(
        mut self,
        auth_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        self.auth_url = auth_url.into();
        self.token_url = token_url.into();
        self
    }

    /// 设置 ID 令牌校验端点
    #[must_use]
    pub fn with_tokeninfo_url(mut self, url: impl Into<String>) -> Self {
        self.tokeninfo_url = url.into();
        self
    }

    /// 设置离线访问与强制授权标志
    #[must_use]
    pub const fn with_consent_flags(mut self, offline_access: bool, force_consent: bool) -> Self {
        self.offline_access = offline_access;
        self.force_consent = force_consent;
        self
    }

    /// 设置令牌交换超时
    #[must_use]
    pub const fn with_exchange_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.exchange_timeout_ms = timeout_ms;
        self
    }

    /// 助手平台完成端点的主机名
    #[must_use]
    pub fn completion_host(&self) -> String {
        format!("oauth-redirect.{}", self.platform_domain)
    }

    /// 助手平台完成端点的路径
    #[must_use]
    pub fn completion_path(&self) -> String {
        format!("/r/{}", self.project_id)
    }

    /// 助手平台完成端点
    #[must_use]
    pub fn completion_endpoint(&self) -> String {
        format!("https://{}{}", self.completion_host(), self.completion_path())
    }

    /// 令牌交换超时
    #[must_use]
    pub const fn exchange_timeout(&self) -> Duration {
        Duration::from_millis(self.exchange_timeout_ms)
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        if self.provider_client_id.trim().is_empty() {
            return Err(RelayError::config("provider_client_id 不能为空"));
        }
        if self.provider_client_secret.is_empty() {
            return Err(RelayError::config("provider_client_secret 不能为空"));
        }
        if self.project_id.trim().is_empty() || self.project_id.contains('/') {
            return Err(RelayError::config(format!(
                "无效的 project_id: '{}'",
                self.project_id
            )));
        }
        if self.platform_domain.trim().is_empty() {
            return Err(RelayError::config("platform_domain 不能为空"));
        }
        if self.exchange_timeout_ms == 0 {
            return Err(RelayError::config("exchange_timeout_ms 必须大于0"));
        }

        for (name, value) in [
            ("own_callback_url", &self.own_callback_url),
            ("auth_url", &self.auth_url),
            ("token_url", &self.token_url),
            ("tokeninfo_url", &self.tokeninfo_url),
        ] {
            let parsed = Url::parse(value).map_err(|e| {
                RelayError::config_with_source(format!("{name} 不是有效的URL: {value}"), e)
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(RelayError::config(format!(
                    "{name} 必须使用 http 或 https: {value}"
                )));
            }
        }
        Ok(())
    }
}

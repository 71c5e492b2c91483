//! # 配置管理器
//!
//! 启动时加载一次配置：TOML 文件 → 客户端密钥文件 → 环境变量覆盖 → 校验。
//! 加载后的 [`RelayConfig`] 不可变，以 `Arc` 共享给所有请求。

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::{AppConfig, ClientSecretFile, RelayConfig, ServerConfig};
use crate::error::{Context, RelayError, Result};

/// 环境变量前缀，`LINK_RELAY_SERVER__PORT` 对应 `server.port`
const ENV_PREFIX: &str = "LINK_RELAY_";
/// 指定配置文件路径的环境变量
pub const CONFIG_PATH_ENV: &str = "LINK_RELAY_CONFIG_PATH";

/// 配置管理器
#[derive(Debug, Clone)]
pub struct ConfigManager {
    /// 配置来源
    source: PathBuf,
    /// 服务器配置
    server: ServerConfig,
    /// 中继配置（只读共享）
    relay: Arc<RelayConfig>,
    /// 日志级别
    log_level: Option<String>,
}

impl ConfigManager {
    /// 按默认规则定位配置文件并加载
    pub fn new() -> Result<Self> {
        Self::from_file(Self::default_config_path())
    }

    /// 默认配置文件路径
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        // 优先使用环境变量指定的配置文件路径
        env::var(CONFIG_PATH_ENV).map_or_else(
            |_| {
                let env = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
                PathBuf::from(format!("config/config.{env}.toml"))
            },
            PathBuf::from,
        )
    }

    /// 从指定文件创建配置管理器
    pub fn from_file(config_path: impl AsRef<Path>) -> Result<Self> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Err(RelayError::config(format!(
                "配置文件不存在: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("读取配置文件失败: {}", config_path.display()))?;

        let manager = Self::from_toml_str(&content, Self::collect_env_overrides())?;
        info!(
            path = %config_path.display(),
            project_id = %manager.relay.project_id,
            "配置加载完成"
        );
        Ok(Self {
            source: config_path.to_path_buf(),
            ..manager
        })
    }

    /// 从 TOML 文本和显式的覆盖项创建配置管理器
    pub fn from_toml_str(content: &str, overrides: HashMap<String, String>) -> Result<Self> {
        let mut config: AppConfig = toml::from_str(content)?;

        if let Some(secret_path) = config.relay.secret_path.clone() {
            ClientSecretFile::from_path(&secret_path)?.apply_to(&mut config.relay);
            debug!(path = %secret_path.display(), "已应用客户端密钥文件");
        }

        Self::apply_env_overrides(&mut config, &overrides)?;
        config.validate()?;

        Ok(Self {
            source: PathBuf::from("<inline>"),
            server: config.server,
            relay: Arc::new(config.relay),
            log_level: config.log_level,
        })
    }

    /// 配置来源路径
    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// 服务器配置
    #[must_use]
    pub const fn server(&self) -> &ServerConfig {
        &self.server
    }

    /// 中继配置
    #[must_use]
    pub fn relay(&self) -> Arc<RelayConfig> {
        Arc::clone(&self.relay)
    }

    /// 日志级别
    #[must_use]
    pub const fn log_level(&self) -> Option<&String> {
        self.log_level.as_ref()
    }

    /// 收集 `LINK_RELAY_` 前缀的环境变量
    #[must_use]
    pub fn collect_env_overrides() -> HashMap<String, String> {
        let overrides: HashMap<String, String> = env::vars()
            .filter(|(key, _)| key != CONFIG_PATH_ENV)
            .filter_map(|(key, value)| {
                key.strip_prefix(ENV_PREFIX)
                    .map(|path| (path.to_lowercase().replace("__", "."), value))
            })
            .collect();

        debug!("发现 {} 个环境变量覆盖", overrides.len());
        overrides
    }

    /// 应用环境变量覆盖
    fn apply_env_overrides(config: &mut AppConfig, overrides: &HashMap<String, String>) -> Result<()> {
        for (path, value) in overrides {
            debug!(
                "应用环境变量覆盖: {} = {}",
                path,
                if path.contains("secret") { "***" } else { value }
            );
            Self::apply_override_to_config(config, path, value)?;
        }
        Ok(())
    }

    /// 将单个覆盖项应用到配置对象
    fn apply_override_to_config(config: &mut AppConfig, path: &str, value: &str) -> Result<()> {
        let parts: Vec<&str> = path.split('.').collect();
        let relay = &mut config.relay;

        match parts.as_slice() {
            ["server", "bind_address"] => config.server.bind_address = value.to_string(),
            ["server", "port"] => {
                config.server.port = value
                    .parse()
                    .map_err(|e| RelayError::config_with_source(format!("无效端口: {value}"), e))?;
            }
            ["relay", "provider_client_id"] => relay.provider_client_id = value.to_string(),
            ["relay", "provider_client_secret"] => relay.provider_client_secret = value.to_string(),
            ["relay", "project_id"] => relay.project_id = value.to_string(),
            ["relay", "own_callback_url"] => relay.own_callback_url = value.to_string(),
            ["relay", "platform_domain"] => relay.platform_domain = value.to_string(),
            ["relay", "scopes"] => {
                relay.scopes = value
                    .split([',', ' '])
                    .filter(|scope| !scope.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            ["relay", "force_consent"] => relay.force_consent = parse_bool(path, value)?,
            ["relay", "offline_access"] => relay.offline_access = parse_bool(path, value)?,
            ["relay", "exchange_timeout_ms"] => {
                relay.exchange_timeout_ms = value.parse().map_err(|e| {
                    RelayError::config_with_source(format!("无效的超时时间: {value}"), e)
                })?;
            }
            ["log_level"] => config.log_level = Some(value.to_string()),
            _ => debug!("忽略未知的环境变量覆盖: {}", path),
        }
        Ok(())
    }
}

fn parse_bool(path: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(RelayError::config(format!("{path} 需要布尔值，实际为 '{value}'"))),
    }
}

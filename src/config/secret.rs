//! # 客户端密钥文件
//!
//! 解析 Google 控制台导出的 OAuth 客户端密钥 JSON（`web` 或 `installed` 段），
//! 用其中的凭据和端点补全 [`RelayConfig`]。

use serde::Deserialize;
use std::path::Path;

use super::RelayConfig;
use crate::error::{Context, RelayError, Result};

/// 客户端密钥文件
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecretFile {
    /// Web 应用凭据
    #[serde(default)]
    pub web: Option<ClientSecretEntry>,
    /// 已安装应用凭据
    #[serde(default)]
    pub installed: Option<ClientSecretEntry>,
}

/// 单个凭据段
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecretEntry {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub auth_uri: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ClientSecretFile {
    /// 从文件读取
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("读取客户端密钥文件失败: {}", path.display()))?;
        Self::parse(&content)
    }

    /// 从 JSON 文本解析
    pub fn parse(content: &str) -> Result<Self> {
        let file: Self = serde_json::from_str(content)?;
        if file.web.is_none() && file.installed.is_none() {
            return Err(RelayError::config(
                "客户端密钥文件缺少 web 或 installed 段",
            ));
        }
        Ok(file)
    }

    /// 优先使用 `web` 段
    #[must_use]
    pub fn entry(&self) -> Option<&ClientSecretEntry> {
        match (&self.web, &self.installed) {
            (Some(web), _) => Some(web),
            (None, installed) => installed.as_ref(),
        }
    }

    /// 用文件中的凭据覆盖配置
    pub fn apply_to(&self, relay: &mut RelayConfig) {
        let Some(entry) = self.entry() else {
            return;
        };
        relay.provider_client_id.clone_from(&entry.client_id);
        relay.provider_client_secret.clone_from(&entry.client_secret);
        if let Some(auth_uri) = &entry.auth_uri {
            relay.auth_url.clone_from(auth_uri);
        }
        if let Some(token_uri) = &entry.token_uri {
            relay.token_url.clone_from(token_uri);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEB_SECRET: &str = r#"{
        "web": {
            "client_id": "123.apps.googleusercontent.com",
            "project_id": "proj1",
            "auth_uri": "https://accounts.google.com/o/oauth2/auth",
            "token_uri": "https://oauth2.googleapis.com/token",
            "client_secret": "s3cr3t",
            "redirect_uris": ["https://relay.example.org/exch"]
        }
    }"#;

    #[test]
    fn web_entry_overrides_credentials() {
        let file = ClientSecretFile::parse(WEB_SECRET).unwrap();
        let mut relay = RelayConfig::new("", "", "proj1", "https://relay.example.org/exch")
            .with_provider_endpoints("https://old/auth", "https://old/token");

        file.apply_to(&mut relay);

        assert_eq!(relay.provider_client_id, "123.apps.googleusercontent.com");
        assert_eq!(relay.provider_client_secret, "s3cr3t");
        assert_eq!(relay.auth_url, "https://accounts.google.com/o/oauth2/auth");
        assert_eq!(relay.token_url, "https://oauth2.googleapis.com/token");
    }

    #[test]
    fn installed_entry_is_used_when_web_is_absent() {
        let file = ClientSecretFile::parse(
            r#"{"installed": {"client_id": "cli", "client_secret": "x"}}"#,
        )
        .unwrap();
        assert_eq!(file.entry().unwrap().client_id, "cli");
    }

    #[test]
    fn empty_document_is_rejected() {
        assert!(ClientSecretFile::parse("{}").is_err());
        assert!(ClientSecretFile::parse("not json").is_err());
    }
}

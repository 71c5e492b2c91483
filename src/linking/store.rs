//! # 令牌存储
//!
//! 令牌交换成功后交给注入的存储协作者。令牌在后台任务中保存，
//! 存储失败或超时只记录日志，不影响也不推迟回跳。

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::task::JoinHandle;

use super::exchange::UpstreamToken;
use crate::error::LinkError;
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, lerror};

/// 单次存储调用的时限
pub const STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// 通过 Google 登录关联的用户
#[derive(Clone, PartialEq, Eq)]
pub struct LinkedUser {
    pub email: String,
    pub id: String,
    pub access_token: String,
}

impl fmt::Debug for LinkedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkedUser")
            .field("email", &self.email)
            .field("id", &self.id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// 令牌存储协作者
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn store(&self, token: &UpstreamToken) -> anyhow::Result<()>;
}

/// 关联用户存储协作者
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn store_user(&self, user: &LinkedUser) -> anyhow::Result<()>;
}

/// 丢弃所有写入
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStore;

#[async_trait]
impl TokenStore for NoopStore {
    async fn store(&self, _token: &UpstreamToken) -> anyhow::Result<()> {
        Ok(())
    }
}

#[async_trait]
impl UserStore for NoopStore {
    async fn store_user(&self, _user: &LinkedUser) -> anyhow::Result<()> {
        Ok(())
    }
}

/// 进程内存储，按访问令牌和用户ID索引
#[derive(Debug, Default, Clone)]
pub struct MemoryLinkStore {
    tokens: Arc<DashMap<String, UpstreamToken>>,
    users: Arc<DashMap<String, LinkedUser>>,
}

impl MemoryLinkStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 已保存的令牌数量
    #[must_use]
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// 按访问令牌查找
    #[must_use]
    pub fn token(&self, access_token: &str) -> Option<UpstreamToken> {
        self.tokens.get(access_token).map(|entry| entry.value().clone())
    }

    /// 已关联的用户数量
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// 按用户ID查找
    #[must_use]
    pub fn user(&self, id: &str) -> Option<LinkedUser> {
        self.users.get(id).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl TokenStore for MemoryLinkStore {
    async fn store(&self, token: &UpstreamToken) -> anyhow::Result<()> {
        self.tokens.insert(token.access_token.clone(), token.clone());
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryLinkStore {
    async fn store_user(&self, user: &LinkedUser) -> anyhow::Result<()> {
        anyhow::ensure!(!user.id.is_empty(), "linked user has no id");
        self.users.insert(user.id.clone(), user.clone());
        Ok(())
    }
}

/// 尽力保存令牌
///
/// 失败或超时返回 `PersistenceFailed` 并记录日志；调用方不据此改变响应。
pub async fn persist_token(
    store: &dyn TokenStore,
    token: &UpstreamToken,
    request_id: &str,
) -> Result<(), LinkError> {
    let outcome = tokio::time::timeout(STORE_TIMEOUT, store.store(token)).await;
    finish_persist(outcome, request_id, "store_token")
}

/// 在后台任务中尽力保存令牌，立即返回
///
/// 任务自带超时与日志；调用方可以丢弃句柄，也可以等待它取得结果。
pub fn spawn_persist_token(
    store: Arc<dyn TokenStore>,
    token: UpstreamToken,
    request_id: String,
) -> JoinHandle<Result<(), LinkError>> {
    tokio::spawn(async move { persist_token(store.as_ref(), &token, &request_id).await })
}

/// 尽力保存关联用户
pub async fn persist_user(
    store: &dyn UserStore,
    user: &LinkedUser,
    request_id: &str,
) -> Result<(), LinkError> {
    let outcome = tokio::time::timeout(STORE_TIMEOUT, store.store_user(user)).await;
    finish_persist(outcome, request_id, "store_user")
}

fn finish_persist(
    outcome: Result<anyhow::Result<()>, tokio::time::error::Elapsed>,
    request_id: &str,
    operation: &str,
) -> Result<(), LinkError> {
    let error = match outcome {
        Ok(Ok(())) => {
            ldebug!(
                request_id,
                LogStage::Persistence,
                LogComponent::TokenStore,
                operation,
                "stored"
            );
            return Ok(());
        }
        Ok(Err(e)) => LinkError::PersistenceFailed {
            message: "store rejected the write".to_string(),
            source: Some(e),
        },
        Err(_) => LinkError::persistence_failed(format!(
            "store did not answer within {}ms",
            STORE_TIMEOUT.as_millis()
        )),
    };

    lerror!(
        request_id,
        LogStage::Persistence,
        LogComponent::TokenStore,
        operation,
        &format!("{error:#}")
    );
    Err(error)
}

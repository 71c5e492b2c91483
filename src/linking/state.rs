//! # 关联状态
//!
//! `state` 关联值与单次关联事务的状态机。
//!
//! 中继本身无状态：每个 HTTP 请求在栈上重建自己的 [`LinkTransaction`]，
//! `state` 只通过函数参数传递，从不写入共享的处理器对象。

use std::fmt;

use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, lwarn};

/// 助手平台签发的不透明关联值
///
/// 按百分号解码一次后的原始字节保存：不修剪、不截断、不做 UTF-8 转换。
/// `Debug` 只输出长度，避免进入日志。
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RelayState(Vec<u8>);

impl RelayState {
    /// 包装原始字节
    #[must_use]
    pub const fn new(raw: Vec<u8>) -> Self {
        Self(raw)
    }

    /// 原始字节
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// 字节长度
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 取出原始字节
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Debug for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RelayState(len={})", self.0.len())
    }
}

impl From<Vec<u8>> for RelayState {
    fn from(raw: Vec<u8>) -> Self {
        Self(raw)
    }
}

impl From<&[u8]> for RelayState {
    fn from(raw: &[u8]) -> Self {
        Self(raw.to_vec())
    }
}

impl From<&str> for RelayState {
    fn from(raw: &str) -> Self {
        Self(raw.as_bytes().to_vec())
    }
}

/// 关联事务所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPhase {
    /// 尚未收到有效的授权请求
    Idle,
    /// 已跳转到身份提供商授权页
    AwaitingConsent,
    /// 已收到身份提供商回调，等待令牌交换
    AwaitingExchange,
    /// 已回跳助手平台
    Completed,
    /// 终止（吸收态）
    Failed,
}

/// 驱动阶段迁移的事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    RequestValidated,
    ValidationFailed,
    CallbackReceived,
    ExchangeSucceeded,
    ExchangeFailed,
}

impl LinkPhase {
    /// 计算迁移后的阶段，非法迁移返回 `None`
    #[must_use]
    pub const fn next(self, event: LinkEvent) -> Option<Self> {
        match (self, event) {
            (Self::Idle, LinkEvent::RequestValidated) => Some(Self::AwaitingConsent),
            (Self::Idle, LinkEvent::ValidationFailed)
            | (Self::AwaitingExchange, LinkEvent::ExchangeFailed) => Some(Self::Failed),
            (Self::AwaitingConsent, LinkEvent::CallbackReceived) => Some(Self::AwaitingExchange),
            (Self::AwaitingExchange, LinkEvent::ExchangeSucceeded) => Some(Self::Completed),
            _ => None,
        }
    }

    /// 是否为终态
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    const fn log_stage(self) -> LogStage {
        match self {
            Self::Idle | Self::Failed => LogStage::Authorize,
            Self::AwaitingConsent => LogStage::Consent,
            Self::AwaitingExchange => LogStage::Exchange,
            Self::Completed => LogStage::Completion,
        }
    }
}

/// 单个 HTTP 请求内的关联事务
///
/// 只存在于处理器的调用栈上。
#[derive(Debug)]
pub struct LinkTransaction<'a> {
    request_id: &'a str,
    phase: LinkPhase,
}

impl<'a> LinkTransaction<'a> {
    /// 新的授权请求，从 `Idle` 开始
    #[must_use]
    pub const fn begin(request_id: &'a str) -> Self {
        Self {
            request_id,
            phase: LinkPhase::Idle,
        }
    }

    /// 身份提供商回调到达，从 `AwaitingConsent` 重建并推进到 `AwaitingExchange`
    #[must_use]
    pub fn resume_from_callback(request_id: &'a str) -> Self {
        let mut txn = Self {
            request_id,
            phase: LinkPhase::AwaitingConsent,
        };
        txn.advance(LinkEvent::CallbackReceived);
        txn
    }

    /// 当前阶段
    #[must_use]
    pub const fn phase(&self) -> LinkPhase {
        self.phase
    }

    /// 应用事件；非法迁移落入 `Failed`
    pub fn advance(&mut self, event: LinkEvent) -> LinkPhase {
        let from = self.phase;
        if let Some(to) = from.next(event) {
            ldebug!(
                self.request_id,
                to.log_stage(),
                LogComponent::Http,
                "phase_transition",
                &format!("{from:?} -> {to:?} on {event:?}")
            );
            self.phase = to;
        } else {
            lwarn!(
                self.request_id,
                from.log_stage(),
                LogComponent::Http,
                "illegal_transition",
                &format!("illegal transition from {from:?} on {event:?}")
            );
            self.phase = LinkPhase::Failed;
        }
        self.phase
    }
}

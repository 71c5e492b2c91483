//! # 日志配置模块
//!
//! 提供结构化日志宏和 tracing 订阅器初始化。
//!
//! 所有日志宏统一使用 `(request_id, stage, component, operation, message)`
//! 五元组，便于按请求、阶段和组件检索。令牌、授权码和客户端密钥不得写入日志，
//! `state` 只记录长度。

use std::env;
use std::fmt;
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// 日志所处的流程阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStage {
    /// 进程启动
    Startup,
    /// 进程关闭
    Shutdown,
    /// 配置加载
    Config,
    /// 入站授权请求校验
    Authorize,
    /// 跳转身份提供商授权页
    Consent,
    /// 授权码换取令牌
    Exchange,
    /// 回跳助手平台
    Completion,
    /// 令牌持久化
    Persistence,
    /// Google 登录账户关联
    SignIn,
}

impl LogStage {
    /// 阶段名称
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Shutdown => "shutdown",
            Self::Config => "config",
            Self::Authorize => "authorize",
            Self::Consent => "consent",
            Self::Exchange => "exchange",
            Self::Completion => "completion",
            Self::Persistence => "persistence",
            Self::SignIn => "sign_in",
        }
    }
}

impl fmt::Display for LogStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 产生日志的组件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogComponent {
    /// 主程序
    Main,
    /// 配置管理
    Config,
    /// 服务器装配
    ServerSetup,
    /// 授权请求校验器
    Validator,
    /// 上游跳转构造器
    RedirectBuilder,
    /// 令牌交换
    TokenExchange,
    /// 令牌存储
    TokenStore,
    /// Google 登录关联
    SignIn,
    /// HTTP 处理器
    Http,
}

impl LogComponent {
    /// 组件名称
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Config => "config",
            Self::ServerSetup => "server_setup",
            Self::Validator => "validator",
            Self::RedirectBuilder => "redirect_builder",
            Self::TokenExchange => "token_exchange",
            Self::TokenStore => "token_store",
            Self::SignIn => "sign_in",
            Self::Http => "http",
        }
    }
}

impl fmt::Display for LogComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 结构化 info 日志
#[macro_export]
macro_rules! linfo {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($key = $value,)*
            "{}",
            $message
        )
    };
}

/// 结构化 warn 日志
#[macro_export]
macro_rules! lwarn {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($key = $value,)*
            "{}",
            $message
        )
    };
}

/// 结构化 error 日志
#[macro_export]
macro_rules! lerror {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::error!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($key = $value,)*
            "{}",
            $message
        )
    };
}

/// 结构化 debug 日志
#[macro_export]
macro_rules! ldebug {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($key = $value,)*
            "{}",
            $message
        )
    };
}

/// 初始化日志系统
///
/// `RUST_LOG` 优先；否则使用传入级别，默认 `info`。
pub fn init_optimized_logging(log_level: Option<&String>) {
    let level = log_level.map_or("info", String::as_str);

    // 默认屏蔽 HTTP 客户端的连接级日志
    let default_filter = format!("{level},link_relay=debug,hyper=warn,reqwest=warn,tower_http=info");

    let log_filter = env::var("RUST_LOG").unwrap_or(default_filter);

    let result = tracing_subscriber::registry()
        .with(EnvFilter::try_new(&log_filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init();

    if result.is_err() {
        // 订阅器已由测试或宿主进程安装
        tracing::debug!("tracing subscriber already initialised");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_and_component_names_are_snake_case() {
        assert_eq!(LogStage::SignIn.to_string(), "sign_in");
        assert_eq!(LogStage::Exchange.as_str(), "exchange");
        assert_eq!(LogComponent::RedirectBuilder.to_string(), "redirect_builder");
        assert_eq!(LogComponent::TokenStore.as_str(), "token_store");
    }

    #[test]
    fn init_is_idempotent() {
        init_optimized_logging(None);
        init_optimized_logging(Some(&"debug".to_string()));
    }
}

//! # 中继服务器
//!
//! Axum HTTP服务器：装配路由、中间件和共享的只读状态。

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{authorize, exchange, link, system};
use super::middleware::request_id_middleware;
use crate::config::{RelayConfig, ServerConfig};
use crate::error::{RelayError, Result};
use crate::linking::{
    GoogleTokenInfoVerifier, IdTokenVerifier, NoopStore, OAuthTokenExchanger, TokenExchanger,
    TokenStore, UpstreamRedirectBuilder, UserStore,
};
use crate::linfo;
use crate::logging::{LogComponent, LogStage};

/// 处理器共享状态
///
/// 所有字段只读；单次关联事务的数据不会写入这里。
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub redirect_builder: Arc<UpstreamRedirectBuilder>,
    pub exchanger: Arc<dyn TokenExchanger>,
    pub token_store: Arc<dyn TokenStore>,
    pub user_store: Arc<dyn UserStore>,
    pub verifier: Arc<dyn IdTokenVerifier>,
}

impl AppState {
    /// 以默认协作者创建：`oauth2` 令牌交换、tokeninfo 校验、丢弃式存储
    pub fn new(config: Arc<RelayConfig>) -> Result<Self> {
        let redirect_builder = Arc::new(UpstreamRedirectBuilder::new(&config)?);
        let exchanger: Arc<dyn TokenExchanger> = Arc::new(OAuthTokenExchanger::new(&config)?);
        let verifier: Arc<dyn IdTokenVerifier> = Arc::new(GoogleTokenInfoVerifier::new(&config)?);

        Ok(Self {
            config,
            redirect_builder,
            exchanger,
            token_store: Arc::new(NoopStore),
            user_store: Arc::new(NoopStore),
            verifier,
        })
    }

    #[must_use]
    pub fn with_exchanger(mut self, exchanger: Arc<dyn TokenExchanger>) -> Self {
        self.exchanger = exchanger;
        self
    }

    #[must_use]
    pub fn with_token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.token_store = store;
        self
    }

    #[must_use]
    pub fn with_user_store(mut self, store: Arc<dyn UserStore>) -> Self {
        self.user_store = store;
        self
    }

    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<dyn IdTokenVerifier>) -> Self {
        self.verifier = verifier;
        self
    }
}

/// 创建路由器
pub fn create_router(state: AppState, server: &ServerConfig) -> Router {
    Router::new()
        .route("/auth", get(authorize::authorize_handler))
        .route(
            "/exch",
            get(exchange::exchange_handler).post(exchange::exchange_handler),
        )
        .route("/link", post(link::link_handler))
        .route("/ping", get(system::ping_handler))
        .route("/health", get(system::health_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(server.max_request_size)),
        )
        .layer(axum::middleware::from_fn(request_id_middleware))
}

/// 中继服务器
pub struct RelayServer {
    config: ServerConfig,
    router: Router,
}

impl RelayServer {
    #[must_use]
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        let router = create_router(state, &config);
        Self { config, router }
    }

    /// 获取绑定地址
    pub fn bind_address(&self) -> Result<SocketAddr> {
        let ip = self
            .config
            .bind_address
            .parse::<IpAddr>()
            .map_err(|e| {
                RelayError::config_with_source(
                    format!("无效的监听地址 '{}'", self.config.bind_address),
                    e,
                )
            })?;
        Ok(SocketAddr::new(ip, self.config.port))
    }

    /// 启动服务器，Ctrl-C 时优雅退出
    pub async fn serve(self) -> Result<()> {
        let addr = self.bind_address()?;

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::ServerSetup,
            "server_start",
            &format!("Starting relay server on {addr}")
        );

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| RelayError::server_start_with_source(format!("无法绑定 {addr}"), e))?;

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| RelayError::network_with_source("Relay server error", e))?;

        linfo!(
            "system",
            LogStage::Shutdown,
            LogComponent::ServerSetup,
            "server_stop",
            "Relay server stopped"
        );
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        crate::lerror!(
            "system",
            LogStage::Shutdown,
            LogComponent::ServerSetup,
            "signal_handler_fail",
            &format!("Failed to listen for shutdown signal: {e}")
        );
        std::future::pending::<()>().await;
    }
}

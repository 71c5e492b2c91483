//! 集成测试共用的装配代码

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, header};
use link_relay::config::{RelayConfig, ServerConfig};
use link_relay::linking::MemoryLinkStore;
use link_relay::{AppState, create_router};
use serde_json::Value;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CLIENT_ID: &str = "abc";
pub const PROJECT_ID: &str = "proj1";
pub const CALLBACK_URL: &str = "https://relay.example.org/exch";
pub const COMPLETION: &str = "https://oauth-redirect.example.com/r/proj1";

/// 指向模拟提供商的中继配置
pub fn relay_config(provider: &MockServer) -> RelayConfig {
    RelayConfig::new(CLIENT_ID, "shh", PROJECT_ID, CALLBACK_URL)
        .with_platform_domain("example.com")
        .with_scopes(["email", "profile"])
        .with_provider_endpoints(
            format!("{}/o/oauth2/auth", provider.uri()),
            format!("{}/token", provider.uri()),
        )
        .with_tokeninfo_url(format!("{}/tokeninfo", provider.uri()))
        .with_exchange_timeout_ms(2_000)
}

/// 使用真实协作者和内存存储的路由器
pub fn relay_app(config: RelayConfig) -> (Router, MemoryLinkStore) {
    let store = MemoryLinkStore::new();
    let state = AppState::new(Arc::new(config))
        .expect("state")
        .with_token_store(Arc::new(store.clone()))
        .with_user_store(Arc::new(store.clone()));
    (create_router(state, &ServerConfig::default()), store)
}

/// 令牌端点返回成功
pub async fn mount_token_success(provider: &MockServer, access_token: &str) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": access_token,
            "token_type": "Bearer",
            "expires_in": 3600,
            "refresh_token": "1//refresh"
        })))
        .mount(provider)
        .await;
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.expect("router is infallible")
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Request::get(uri).body(Body::empty()).expect("request")).await
}

pub async fn post_form(app: &Router, uri: &str, body: String) -> Response<Body> {
    let request = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .expect("request");
    send(app, request).await
}

pub fn location(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::LOCATION)
        .map(|value| value.to_str().expect("ascii location").to_string())
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

/// `/auth` 查询串
pub fn auth_query(client_id: &str, redirect_uri: &str, state: &str) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("state", state)
        .append_pair("response_type", "code")
        .finish()
}

/// 从完成地址片段中解出某个参数
pub fn fragment_param(location: &str, key: &str) -> Option<String> {
    let (_, fragment) = location.split_once('#')?;
    fragment.split('&').find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        (name == key).then(|| urlencoding::decode(value).expect("utf-8").into_owned())
    })
}

/// 从完成地址片段中取出某个参数的原始字节
pub fn fragment_bytes(location: &str, key: &str) -> Option<Vec<u8>> {
    let (_, fragment) = location.split_once('#')?;
    fragment.split('&').find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        (name == key).then(|| urlencoding::decode_binary(value.as_bytes()).into_owned())
    })
}

/// 从地址查询串中取出某个参数的原始字节
pub fn query_bytes(location: &str, key: &str) -> Option<Vec<u8>> {
    let query = location.split_once('?')?.1;
    let query = query.split('#').next().unwrap_or_default();
    query.split('&').find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        let value = value.replace('+', " ");
        (name == key).then(|| urlencoding::decode_binary(value.as_bytes()).into_owned())
    })
}

/// 后台保存是异步的，轮询等待条件成立
pub async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

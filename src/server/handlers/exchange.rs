//! # 令牌交换处理器
//!
//! `GET|POST /exch`：身份提供商回调。两种传输方式归一后走同一条交换流程。

use std::sync::Arc;

use axum::Extension;
use axum::body::Bytes;
use axum::extract::{RawQuery, State};
use axum::http::{HeaderMap, Method, header};
use axum::response::Response;

use crate::linking::store::spawn_persist_token;
use crate::linking::{CallbackParams, CompletionRedirect, LinkEvent, LinkTransaction, collect_params};
use crate::logging::{LogComponent, LogStage};
use crate::server::middleware::RequestId;
use crate::server::response;
use crate::server::router::AppState;
use crate::{linfo, lwarn};

/// 处理 `GET|POST /exch`
pub async fn exchange_handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    let form_body = (method == Method::POST && is_form_body(&headers)).then_some(body.as_ref());
    let params = collect_params(query.as_deref(), form_body);

    let mut txn = LinkTransaction::resume_from_callback(&request_id);

    let callback = match CallbackParams::extract(&params) {
        Ok(callback) => callback,
        Err(err) => {
            txn.advance(LinkEvent::ExchangeFailed);
            lwarn!(
                request_id,
                LogStage::Exchange,
                LogComponent::Http,
                "malformed_callback",
                &err.to_string()
            );
            return response::link_error(&err, &request_id);
        }
    };

    linfo!(
        request_id,
        LogStage::Exchange,
        LogComponent::TokenExchange,
        "exchange_start",
        "Exchanging authorization code",
        method = method.as_str(),
        state_len = callback.state.len()
    );

    let token = match state.exchanger.exchange(&callback.code).await {
        Ok(token) => token,
        Err(err) => {
            txn.advance(LinkEvent::ExchangeFailed);
            lwarn!(
                request_id,
                LogStage::Exchange,
                LogComponent::TokenExchange,
                "exchange_failed",
                &err.to_string()
            );
            return response::link_error(&err, &request_id);
        }
    };

    txn.advance(LinkEvent::ExchangeSucceeded);
    let completion = CompletionRedirect::new(&state.config, &token.access_token, &callback.state);

    // 后台保存，结果只进日志
    spawn_persist_token(Arc::clone(&state.token_store), token, request_id.to_string());

    linfo!(
        request_id,
        LogStage::Completion,
        LogComponent::Http,
        "completion_redirect",
        "Redirecting to assistant completion endpoint"
    );
    response::found(completion.as_str())
}

/// 只有表单编码或未声明类型的请求体参与参数提取
fn is_form_body(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_none_or(|content_type| {
            content_type
                .trim()
                .to_ascii_lowercase()
                .starts_with("application/x-www-form-urlencoded")
        })
}

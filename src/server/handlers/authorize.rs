//! # 授权请求处理器
//!
//! `GET /auth`：校验助手平台的请求并 302 到身份提供商授权页。

use axum::Extension;
use axum::extract::{RawQuery, State};
use axum::response::Response;

use crate::linking::{AuthorizationRequest, LinkEvent, LinkTransaction};
use crate::logging::{LogComponent, LogStage};
use crate::server::middleware::RequestId;
use crate::server::response;
use crate::server::router::AppState;
use crate::linfo;

/// 处理 `GET /auth`
pub async fn authorize_handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    RawQuery(query): RawQuery,
) -> Response {
    let request = AuthorizationRequest::from_query(query.as_deref().unwrap_or_default());
    let mut txn = LinkTransaction::begin(&request_id);

    linfo!(
        request_id,
        LogStage::Authorize,
        LogComponent::Http,
        "authorize_request",
        "Received authorization request",
        state_len = request.state.len(),
        response_type = request.response_type.as_str()
    );

    match request.validate_logged(&state.config, &request_id) {
        Ok(validated) => {
            txn.advance(LinkEvent::RequestValidated);
            let consent_url = state.redirect_builder.build(&validated);
            linfo!(
                request_id,
                LogStage::Consent,
                LogComponent::RedirectBuilder,
                "consent_redirect",
                "Redirecting to provider consent page"
            );
            response::found(consent_url.as_str())
        }
        Err(err) => {
            txn.advance(LinkEvent::ValidationFailed);
            response::link_error(&err, &request_id)
        }
    }
}

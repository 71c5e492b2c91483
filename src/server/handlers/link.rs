//! # 登录关联处理器
//!
//! `POST /link`：Google 登录后的账户关联 webhook。

use axum::Extension;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::linking::{WebhookRequest, link_user};
use crate::server::middleware::RequestId;
use crate::server::response;
use crate::server::router::AppState;

/// 处理 `POST /link`，成功返回 204
pub async fn link_handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    body: Bytes,
) -> Response {
    let outcome = match WebhookRequest::from_slice(&body) {
        Ok(request) => {
            link_user(
                &request,
                &state.config.provider_client_id,
                state.verifier.as_ref(),
                state.user_store.as_ref(),
                &request_id,
            )
            .await
        }
        Err(err) => Err(err),
    };

    match outcome {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            crate::lwarn!(
                request_id,
                crate::logging::LogStage::SignIn,
                crate::logging::LogComponent::Http,
                "link_rejected",
                &err.to_string()
            );
            response::link_error(&err, &request_id)
        }
    }
}

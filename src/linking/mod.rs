//! # 账户关联中继
//!
//! 助手平台与身份提供商之间的 OAuth2 授权码中继：
//!
//! ```text
//! 平台 --/auth--> 校验 --302--> 提供商授权页 --/exch--> 换令牌 --302--> 平台完成端点
//! ```
//!
//! 每个请求独立处理，`state` 只在请求内通过参数传递。

pub mod exchange;
pub mod query;
pub mod redirect;
pub mod request;
pub mod signin;
pub mod state;
pub mod store;

pub use exchange::{CallbackParams, OAuthTokenExchanger, ParamSource, TokenExchanger, UpstreamToken, collect_params};
pub use redirect::{CompletionRedirect, UpstreamRedirectBuilder};
pub use request::{AuthorizationRequest, ValidatedRequest};
pub use signin::{GoogleTokenInfoVerifier, IdTokenVerifier, TokenInfo, WebhookRequest, link_user};
pub use state::{LinkEvent, LinkPhase, LinkTransaction, RelayState};
pub use store::{LinkedUser, MemoryLinkStore, NoopStore, TokenStore, UserStore};

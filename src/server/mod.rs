//! # HTTP 服务
//!
//! `/auth`、`/exch`、`/link` 以及存活检查端点。

pub mod handlers;
pub mod middleware;
pub mod response;
pub mod router;

pub use middleware::RequestId;
pub use router::{AppState, RelayServer, create_router};

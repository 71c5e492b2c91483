//! # Link Relay Library
//!
//! 语音助手平台的账户关联 OAuth2 中继核心库

pub mod config;
pub mod error;
pub mod linking;
pub mod logging;
pub mod server;

// Re-export commonly used types
pub use config::{AppConfig, ConfigManager, RelayConfig};
pub use error::{LinkError, RelayError, Result};
pub use server::{AppState, RelayServer, create_router};

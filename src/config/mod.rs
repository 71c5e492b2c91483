//! # 配置管理模块
//!
//! 处理应用配置加载、验证和管理

mod manager;
mod relay_config;
mod secret;

pub use manager::{CONFIG_PATH_ENV, ConfigManager};
pub use relay_config::{AppConfig, RelayConfig, ServerConfig};
pub use secret::{ClientSecretEntry, ClientSecretFile};

//! # 系统信息处理器

use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthInfo {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

/// Ping 处理器
pub async fn ping_handler() -> &'static str {
    "pong"
}

/// 存活检查
pub async fn health_handler() -> Json<HealthInfo> {
    Json(HealthInfo {
        status: "ok",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

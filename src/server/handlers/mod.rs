//! # 请求处理器

pub mod authorize;
pub mod exchange;
pub mod link;
pub mod system;

//! # Link Relay 主程序
//!
//! 账户关联中继服务

use std::path::PathBuf;

use clap::Parser;
use link_relay::{
    AppState, RelayServer, Result,
    config::ConfigManager,
    lerror, linfo,
    logging::{self, LogComponent, LogStage},
};

/// 命令行参数
#[derive(Debug, Parser)]
#[command(name = "link-relay", version, about = "Account-linking OAuth2 relay")]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, env = "LINK_RELAY_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// 日志级别，覆盖配置文件
    #[arg(long)]
    log_level: Option<String>,

    /// 只校验配置后退出
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let manager = match cli.config.as_ref() {
        Some(path) => ConfigManager::from_file(path),
        None => ConfigManager::new(),
    };
    let manager = match manager {
        Ok(manager) => manager,
        Err(e) => {
            logging::init_optimized_logging(cli.log_level.as_ref());
            lerror!(
                "system",
                LogStage::Config,
                LogComponent::Config,
                "config_load_failed",
                &format!("配置加载失败: {e}")
            );
            return Err(e);
        }
    };

    logging::init_optimized_logging(cli.log_level.as_ref().or_else(|| manager.log_level()));

    let relay = manager.relay();
    let completion_endpoint = relay.completion_endpoint();
    linfo!(
        "system",
        LogStage::Config,
        LogComponent::Config,
        "config_loaded",
        &format!("配置已加载: {}", manager.source().display()),
        project_id = relay.project_id.as_str(),
        completion_endpoint = completion_endpoint.as_str()
    );

    if cli.check {
        linfo!(
            "system",
            LogStage::Config,
            LogComponent::Main,
            "config_check_ok",
            "配置校验通过"
        );
        return Ok(());
    }

    let state = AppState::new(relay)?;
    let server = RelayServer::new(manager.server().clone(), state);

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Main,
        "service_starting",
        "服务启动"
    );
    if let Err(e) = server.serve().await {
        lerror!(
            "system",
            LogStage::Startup,
            LogComponent::Main,
            "service_start_failed",
            &format!("服务启动失败: {e:?}")
        );
        return Err(e);
    }

    linfo!(
        "system",
        LogStage::Shutdown,
        LogComponent::Main,
        "service_shutdown",
        "服务正常关闭"
    );
    Ok(())
}

//! # Resilience Engine 主程序
//!
//! 提供商韧性与混沌工程引擎 - 健康监控循环 + 管理 API 服务

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use resilience_engine::app::AppContext;
use resilience_engine::config::ConfigManager;
use resilience_engine::{Result, logging, management};

/// 命令行参数
#[derive(Debug, Parser)]
#[command(name = "resilience-engine", about = "Provider resilience and chaos engineering service")]
struct Cli {
    /// 配置文件路径（TOML）
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// 日志级别（默认 info）
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化日志系统
    logging::init_logging(cli.log_level.as_ref());

    // 加载配置并装配引擎
    let manager = ConfigManager::load(cli.config.as_deref())?;
    let context = AppContext::bootstrap(manager.config().clone()).await?;

    info!(
        providers = context.config.providers.len(),
        "Resilience engine initialized"
    );

    // 启动周期健康检查循环
    tokio::spawn(context.monitor.clone().run());

    // 管理服务器阻塞运行
    if let Err(e) = management::server::serve(context).await {
        error!(error = %e, "Management server failed");
        std::process::exit(1);
    }

    info!("Resilience engine shut down");
    Ok(())
}

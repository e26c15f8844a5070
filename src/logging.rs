//! # 日志配置模块
//!
//! 提供统一的 tracing 初始化入口，默认过滤掉探针 HTTP 客户端的冗余输出

use std::env;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// 初始化日志系统
///
/// `RUST_LOG` 优先于传入的级别；未设置时引擎自身使用 debug，
/// 探针与 HTTP 栈默认降噪到 warn。
pub fn init_logging(log_level: Option<&String>) {
    let level = log_level.map_or("info", std::string::String::as_str);

    let default_filter = format!(
        "{level},resilience_engine=debug,reqwest=warn,hyper=warn,tower_http=info"
    );

    let log_filter = env::var("RUST_LOG").unwrap_or(default_filter);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| log_filter.into()))
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

/// 环境变量设置指南
pub fn print_logging_help() {
    println!("📋 日志配置指南:");
    println!("  RUST_LOG=info                          # 标准日志级别");
    println!("  RUST_LOG=debug                         # 调试级别");
    println!("  RUST_LOG=resilience_engine=trace       # 引擎详细追踪");
    println!("  RUST_LOG=info,tower_http=debug         # 管理端请求日志");
}

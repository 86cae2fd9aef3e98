use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Arg, Command};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cronjobd::app::Application;
use cronjobd::shutdown::ShutdownManager;
use cronjobd_core::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let matches = Command::new("cronjobd")
        .version("1.0.0")
        .about("定时任务调度与执行服务")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径")
                .default_value("config/cronjobd.toml"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .default_value("info"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty"])
                .default_value("pretty"),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").unwrap();
    let log_level = matches.get_one::<String>("log-level").unwrap();
    let log_format = matches.get_one::<String>("log-format").unwrap();

    // 初始化日志系统
    init_logging(log_level, log_format);

    info!("启动定时任务调度服务");
    info!("配置文件: {config_path}");

    let config = AppConfig::load(Some(config_path)).context("加载配置失败")?;
    let app = Application::new(config).await?;

    // 关闭信号
    let shutdown = Arc::new(ShutdownManager::new());
    spawn_signal_listeners(shutdown.clone());

    let shutdown_rx = shutdown.subscribe();
    app.run(shutdown_rx).await?;

    info!("进程退出");
    Ok(())
}

fn init_logging(level: &str, format: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        _ => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// 监听Ctrl+C和SIGTERM，触发优雅关闭
fn spawn_signal_listeners(shutdown: Arc<ShutdownManager>) {
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => info!("收到Ctrl+C，开始优雅关闭"),
                Err(e) => error!("监听Ctrl+C失败: {e}"),
            }
            shutdown.shutdown().await;
        });
    }

    #[cfg(unix)]
    tokio::spawn(async move {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("收到SIGTERM，开始优雅关闭");
                shutdown.shutdown().await;
            }
            Err(e) => error!("监听SIGTERM失败: {e}"),
        }
    });
}

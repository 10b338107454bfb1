mod api;
mod config;
mod error;
mod model;
mod service;
mod util;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, fmt, Layer};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    // 创建日志目录
    let log_dir = PathBuf::from("logs");
    if !log_dir.exists() {
        std::fs::create_dir_all(&log_dir)?;
    }

    // 配置日志文件（按日期滚动）
    let file_appender = tracing_appender::rolling::daily(&log_dir, "doc_gateway.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // 控制台输出层（带颜色）
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_filter(filter.clone());

    // 文件输出层（无颜色）
    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::info!("日志文件位置: {}/doc_gateway.log", log_dir.display());

    let config = config::AppConfig::load("config.toml").await?;

    // 所有请求共用的临时目录
    let work_dir = &config.converter.work_dir;
    tokio::fs::create_dir_all(work_dir)
        .await
        .with_context(|| format!("Failed to create work dir {}", work_dir.display()))?;

    if config.api_key().is_none() {
        tracing::warn!("⚠️  未配置 API 密钥，转换接口不做鉴权");
    }
    tracing::info!(
        "转换器: {}, 临时目录: {}",
        config.converter.binary,
        work_dir.display()
    );

    let addr = config.bind_addr();
    let app_state = api::AppState::new(config);
    let app = api::routes::create_router(app_state);

    let listener = TcpListener::bind(&addr).await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

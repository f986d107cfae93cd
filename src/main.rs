// ==========================================
// 联系人导入服务 - HTTP 主入口
// ==========================================
// 技术栈: Rust + SQLite + axum
// 环境变量:
// - CONTACT_INGEST_DB: 数据库文件路径
// - CONTACT_INGEST_ADDR: 监听地址（默认 127.0.0.1:8787）
// - CONTACT_INGEST_LOG_FORMAT: json 时输出 JSON 日志
// ==========================================

use anyhow::Context;
use contact_ingest::app::{get_default_db_path, router, AppState};
use std::sync::Arc;

/// 默认监听地址
const DEFAULT_ADDR: &str = "127.0.0.1:8787";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志系统
    contact_ingest::logging::init_from_env();

    tracing::info!("==================================================");
    tracing::info!("{}", contact_ingest::APP_NAME);
    tracing::info!("系统版本: {}", contact_ingest::VERSION);
    tracing::info!("==================================================");

    // 获取数据库路径
    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let app_state = AppState::new(db_path).context("无法初始化AppState")?;
    let app = router(Arc::new(app_state));

    let addr = std::env::var("CONTACT_INGEST_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("无法监听地址 {}", addr))?;
    tracing::info!("HTTP 服务已启动: {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP 服务异常退出")?;

    tracing::info!("服务已退出");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("监听退出信号失败: {}", e);
    }
}

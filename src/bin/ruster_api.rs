//! Ruster Audit API Server
//!
//! Usage:
//!   cargo run --bin ruster_api
//!
//! Environment:
//!   PORT / RUSTER_PORT - Server port (default: 8080)
//!   RUSTER_HOST        - Server host (default: 0.0.0.0)
//!   RUSTER_API_KEYS    - Accepted API keys, comma separated
//!   RUST_LOG           - Log filter (default: info)

use ruster_audit::api::{create_router, start_cleanup_task, AppState};
use ruster_audit::{AppConfig, Auditor};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let config = AppConfig::from_env()?;
    let auditor = Auditor::new(&config)?;
    let state = Arc::new(AppState::new(auditor));

    start_cleanup_task(state.clone());
    info!("🧹 Background cleanup task started");

    let app = create_router(state.clone());

    let host = std::env::var("RUSTER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("RUSTER_PORT"))
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    info!("🚀 Ruster Audit API starting on http://{}", addr);
    info!("Endpoints:");
    info!("  POST /v1/audit        - Audit supplied transfer facts");
    info!("  POST /v1/audit/live   - Resolve chain and audit from RPC");
    info!("  GET  /v1/stats        - Audit and cache statistics");
    info!("  GET  /v1/health       - Health check");

    let listener = TcpListener::bind(addr).await?;

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("⚠️ Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    let stats = state.auditor.stats();
    info!("🛑 Shutdown: {} live audits, {} suspicious, {} failed", stats.audits_run, stats.suspicious, stats.failed);

    Ok(())
}

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use telemetry_query::api;
use telemetry_query::infra::config::Settings;
use telemetry_query::infra::db_external::DynamicBackend;
use telemetry_query::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env()?;
    let bind_addr = settings.bind_addr.clone();
    let state = Arc::new(AppState::new(settings));
    if let DynamicBackend::Unconfigured { reason } = &state.backend {
        tracing::warn!("数据库未配置，执行请求将失败: {}", reason);
    }

    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    println!("🚀 Telemetry Query 运行在 http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

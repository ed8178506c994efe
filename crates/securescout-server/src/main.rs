mod handlers;
mod state;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use uuid::Uuid;

use state::AppState;

/// Platform fee applied to every released payment, in basis points.
const DEFAULT_PLATFORM_FEE_BPS: u16 = 250;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let owner = Uuid::new_v4();
    let fee_bps = std::env::var("SECURESCOUT_FEE_BPS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_PLATFORM_FEE_BPS);
    let state = AppState::new(owner, fee_bps);
    info!(%owner, fee_bps, "securescout hub ready");

    let app = handlers::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr =
        std::env::var("SECURESCOUT_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

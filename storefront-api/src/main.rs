use std::net::SocketAddr;
use storefront_api::{app, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "storefront_api=debug,storefront_store=info,storefront_cart=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = storefront_store::app_config::Config::load()?;
    tracing::info!(
        backend = ?config.cache.backend,
        max_age_days = config.cache.max_age_days,
        "Starting storefront API on port {}",
        config.server.port
    );

    let store = config.cache.build_store()?;
    let app = app(AppState::new(store, config.cache.clone())?);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

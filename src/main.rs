mod admission;
mod client;
mod config;
mod error;
mod handlers;
mod metrics;
mod models;
mod pricing;
mod provider;
mod rate_limit;
mod routes;
mod state;

use clap::Parser; // for cli
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::admission::AdmissionController;
use crate::config::Args;
use crate::pricing::PricingResolver;
use crate::provider::ChatClient;
use crate::rate_limit::{MemoryStore, sweeper};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "assistant_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // parse cli arguments, then validate them once
    let config = Args::parse().into_config()?;

    let admission = AdmissionController::new(Arc::new(MemoryStore::new()), &config.admission);

    if let Some(every) = config.admission.sweep_interval {
        let limiter = Arc::clone(admission.limiter());
        tokio::spawn(async move {
            sweeper(limiter, every).await;
        });
    }

    // creating shared state
    let state = Arc::new(AppState {
        admission,
        provider: ChatClient::new(config.provider.clone())?,
        pricing: PricingResolver::new(&config.pricing),
    });

    let app = routes::router(state, &config.server.cors_origins);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Gateway running on http://localhost:{}", config.server.port);
    tracing::info!(
        base_url = %config.provider.base_url,
        model = %config.provider.model,
        "Forwarding chat completions"
    );
    tracing::info!(
        "Rate limit: {} requests per {} seconds",
        config.admission.rate_limit,
        config.admission.rate_window.as_secs()
    );
    tracing::info!(
        promo_expiry = %config.pricing.promo_expiry.to_rfc3339(),
        "Pricing catalog loaded"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

//! Checkout bridge server
//!
//! Storefront carts become Stripe checkout sessions; completed sessions are
//! replicated into the ERP.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bridge_erp::{MemoryLedger, OrderDefaults, OrderReplicator};
use bridge_payments::{CheckoutUrls, StripeClient};
use bridge_server::config::{ErpBackend, ServerConfig};
use bridge_server::router;
use bridge_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let config = ServerConfig::from_env()?;

    let gateway = Arc::new(StripeClient::from_env()?);
    tracing::info!("✓ Stripe configured");

    let erp = config.erp_backend.connect()?;
    let defaults = match config.erp_backend {
        ErpBackend::ErpNext => OrderDefaults::from_env()?,
        ErpBackend::Memory => {
            tracing::warn!("⚠ In-memory ERP selected - orders are not persisted");
            OrderDefaults {
                company: "Development".into(),
                ..Default::default()
            }
        }
    };
    let company = defaults.company.clone();

    let ledger = MemoryLedger::new().with_lease(config.claim_lease);
    let replicator = OrderReplicator::new(erp, Arc::new(ledger), defaults);
    tracing::info!(erp = replicator.erp_name(), company = %company, "✓ ERP configured");
    let state = AppState::new(
        gateway,
        CheckoutUrls::for_storefront(&config.public_base_url),
        replicator,
    );

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 checkout bridge running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                  - Health check");
    tracing::info!("  POST /create-checkout-session - Create Stripe checkout");
    tracing::info!("  POST /webhook                 - Stripe webhook");

    axum::serve(listener, router(state)).await?;

    Ok(())
}

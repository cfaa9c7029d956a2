//! Application State

use std::sync::Arc;

use bridge_erp::OrderReplicator;
use bridge_payments::{CheckoutSessionBuilder, CheckoutUrls, PaymentGateway};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Payment provider; also verifies webhooks
    pub gateway: Arc<dyn PaymentGateway>,

    pub checkout: Arc<CheckoutSessionBuilder>,

    /// Paid session to ERP replication
    pub replicator: Arc<OrderReplicator>,
}

impl AppState {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        urls: CheckoutUrls,
        replicator: OrderReplicator,
    ) -> Self {
        Self {
            checkout: Arc::new(CheckoutSessionBuilder::new(gateway.clone(), urls)),
            gateway,
            replicator: Arc::new(replicator),
        }
    }
}

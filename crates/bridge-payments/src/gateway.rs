//! Payment Gateway Client
//!
//! The two provider operations the bridge needs: creating a hosted checkout
//! session and verifying inbound webhooks. `StripeClient` is the production
//! implementation; tests plug in their own.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stripe::{
    CheckoutSession as StripeCheckoutSession, CheckoutSessionBillingAddressCollection,
    CheckoutSessionMode, Client, CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionLineItemsPriceData, CreateCheckoutSessionLineItemsPriceDataProductData,
    CreateCheckoutSessionPaymentMethodTypes, Currency,
};

use crate::error::{PaymentError, Result};
use crate::metadata::CheckoutMetadata;
use crate::webhook::{GatewayEvent, WebhookVerifier, DEFAULT_TOLERANCE_SECS};

/// Priced line shown on the hosted payment page
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub description: String,
    /// Minor currency units (cents)
    pub unit_amount: i64,
    pub quantity: u64,
}

impl LineItem {
    pub fn total(&self) -> i64 {
        self.unit_amount * i64::try_from(self.quantity).unwrap_or(i64::MAX)
    }
}

/// Everything needed to open a hosted checkout
#[derive(Clone, Debug)]
pub struct SessionRequest {
    pub line_items: Vec<LineItem>,
    pub metadata: CheckoutMetadata,
    pub success_url: String,
    pub cancel_url: String,
    /// Pre-filled on the payment page
    pub customer_email: Option<String>,
}

/// Session returned by the provider
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSession {
    pub id: String,
    pub url: String,
}

/// Payment provider abstraction (Strategy pattern)
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted checkout session
    async fn create_session(&self, request: SessionRequest) -> Result<PaymentSession>;

    /// Authenticate a webhook from its raw body and signature header
    fn verify_webhook(&self, payload: &[u8], signature: Option<&str>) -> Result<GatewayEvent>;

    /// Provider name
    fn name(&self) -> &str;
}

/// Stripe credentials and limits
#[derive(Clone, Debug)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    /// Upper bound on the session-create call
    pub timeout: Duration,
    /// Max age of a webhook signature timestamp
    pub tolerance_secs: i64,
}

impl StripeConfig {
    pub fn new(secret_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            webhook_secret: webhook_secret.into(),
            timeout: Duration::from_secs(20),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .map_err(|_| PaymentError::Config("STRIPE_SECRET_KEY not set".into()))?;
        let webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET")
            .map_err(|_| PaymentError::Config("STRIPE_WEBHOOK_SECRET not set".into()))?;

        let mut config = Self::new(secret_key, webhook_secret);
        if let Some(secs) = env_parse::<u64>("STRIPE_TIMEOUT_SECS")? {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<i64>("WEBHOOK_TOLERANCE_SECS")? {
            config.tolerance_secs = secs;
        }

        Ok(config)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| PaymentError::Config(format!("{name} is not a valid number"))),
        Err(_) => Ok(None),
    }
}

/// Stripe client wrapper
pub struct StripeClient {
    client: Client,
    verifier: WebhookVerifier,
    timeout: Duration,
}

impl StripeClient {
    /// Create a new Stripe client
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            client: Client::new(config.secret_key.clone()),
            verifier: WebhookVerifier::new(config.webhook_secret.clone())
                .with_tolerance(config.tolerance_secs),
            timeout: config.timeout,
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(&StripeConfig::from_env()?))
    }

    fn line_items(items: &[LineItem]) -> Vec<CreateCheckoutSessionLineItems> {
        items
            .iter()
            .map(|item| CreateCheckoutSessionLineItems {
                quantity: Some(item.quantity),
                price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                    currency: Currency::USD,
                    unit_amount: Some(item.unit_amount),
                    product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                        name: item.name.clone(),
                        // Stripe rejects empty descriptions
                        description: (!item.description.is_empty())
                            .then(|| item.description.clone()),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            })
            .collect()
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_session(&self, request: SessionRequest) -> Result<PaymentSession> {
        let mut params = CreateCheckoutSession::new();
        params.success_url = Some(&request.success_url);
        params.cancel_url = Some(&request.cancel_url);
        params.mode = Some(CheckoutSessionMode::Payment);
        params.payment_method_types = Some(vec![CreateCheckoutSessionPaymentMethodTypes::Card]);
        params.billing_address_collection = Some(CheckoutSessionBillingAddressCollection::Auto);
        params.customer_email = request
            .customer_email
            .as_deref()
            .filter(|email| !email.is_empty());
        params.metadata = Some(request.metadata.clone().into_inner());
        params.line_items = Some(Self::line_items(&request.line_items));

        let session = tokio::time::timeout(
            self.timeout,
            StripeCheckoutSession::create(&self.client, params),
        )
        .await
        .map_err(|_| PaymentError::Gateway(format!("session create timed out after {:?}", self.timeout)))?
        .map_err(|e| PaymentError::Gateway(e.to_string()))?;

        let url = session
            .url
            .ok_or_else(|| PaymentError::Gateway("No checkout URL returned".into()))?;

        Ok(PaymentSession {
            id: session.id.to_string(),
            url,
        })
    }

    fn verify_webhook(&self, payload: &[u8], signature: Option<&str>) -> Result<GatewayEvent> {
        self.verifier.verify(payload, signature)
    }

    fn name(&self) -> &str {
        "Stripe"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_item_total() {
        let item = LineItem {
            name: "SIP Wall Panel".into(),
            description: "SIPS-WALL-4X24".into(),
            unit_amount: 125_000,
            quantity: 2,
        };
        assert_eq!(item.total(), 250_000);
    }

    #[test]
    fn test_stripe_line_items_skip_empty_description() {
        let items = StripeClient::line_items(&[LineItem {
            name: "Custom cut".into(),
            description: String::new(),
            unit_amount: 500,
            quantity: 1,
        }]);
        let product = items[0]
            .price_data
            .as_ref()
            .and_then(|p| p.product_data.as_ref())
            .unwrap();
        assert_eq!(product.name, "Custom cut");
        assert!(product.description.is_none());
        assert_eq!(items[0].quantity, Some(1));
    }

    #[test]
    fn test_config_defaults() {
        let config = StripeConfig::new("sk_test_xxx", "whsec_xxx");
        assert_eq!(config.timeout, Duration::from_secs(20));
        assert_eq!(config.tolerance_secs, DEFAULT_TOLERANCE_SECS);
    }
}

//! Checkout Session Builder
//!
//! Validates the cart, prices it in minor units, packs the metadata and asks
//! the gateway for a hosted checkout session.

use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize};

use crate::cart::{Cart, Customer, Project};
use crate::error::{PaymentError, Result};
use crate::gateway::{LineItem, PaymentGateway, PaymentSession, SessionRequest};
use crate::metadata;

/// Body of `POST /create-checkout-session`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutRequest {
    #[serde(deserialize_with = "null_as_default")]
    pub cart: Cart,
    #[serde(deserialize_with = "null_as_default")]
    pub customer: Customer,
    #[serde(deserialize_with = "null_as_default")]
    pub project: Project,
}

/// `null` reads as the empty value, the same as a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Where the hosted page sends the shopper afterwards
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutUrls {
    pub success_url: String,
    pub cancel_url: String,
}

impl CheckoutUrls {
    /// Storefront success and cancel pages under `base`
    pub fn for_storefront(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            success_url: format!("{base}/success?session_id={{CHECKOUT_SESSION_ID}}"),
            cancel_url: format!("{base}/checkout"),
        }
    }
}

/// Cents for a unit price, rounding half away from zero
pub fn to_minor_units(price: Decimal) -> Result<i64> {
    price
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|cents| cents.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|cents| cents.to_i64())
        .ok_or_else(|| PaymentError::Validation(format!("Price out of range: {price}")))
}

/// One gateway line per cart line, each rounded on its own
pub fn line_items(cart: &Cart) -> Result<Vec<LineItem>> {
    cart.items()
        .iter()
        .map(|item| {
            Ok(LineItem {
                name: item.name.clone(),
                description: item.item_code.clone(),
                unit_amount: to_minor_units(item.unit_price)?,
                quantity: u64::from(item.quantity),
            })
        })
        .collect()
}

/// Builds payment sessions for storefront carts
pub struct CheckoutSessionBuilder {
    gateway: Arc<dyn PaymentGateway>,
    urls: CheckoutUrls,
}

impl CheckoutSessionBuilder {
    pub fn new(gateway: Arc<dyn PaymentGateway>, urls: CheckoutUrls) -> Self {
        Self { gateway, urls }
    }

    pub fn urls(&self) -> &CheckoutUrls {
        &self.urls
    }

    /// Create a payment session for the request
    ///
    /// Fails with [`PaymentError::Validation`] before any gateway call when the
    /// cart is unusable.
    pub async fn create(&self, request: &CheckoutRequest) -> Result<PaymentSession> {
        request.cart.validate()?;

        let line_items = line_items(&request.cart)?;
        let metadata = metadata::encode(&request.cart, &request.customer, &request.project)?;

        let session = self
            .gateway
            .create_session(SessionRequest {
                line_items,
                metadata,
                success_url: self.urls.success_url.clone(),
                cancel_url: self.urls.cancel_url.clone(),
                customer_email: Some(request.customer.email.clone()),
            })
            .await?;

        tracing::info!(
            session_id = %session.id,
            gateway = self.gateway.name(),
            items = request.cart.len(),
            email = %request.customer.email,
            "Created checkout session"
        );

        Ok(session)
    }
}

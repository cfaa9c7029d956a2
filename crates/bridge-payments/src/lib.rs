//! # bridge-payments
//!
//! Payment side of the storefront checkout bridge.
//!
//! ## Flow
//!
//! ```text
//! ┌─────────────┐     ┌─────────────────┐     ┌─────────────┐
//! │ Storefront  │────▶│  Stripe Hosted  │────▶│ Storefront  │
//! │   (cart)    │     │  Checkout Page  │     │  (success)  │
//! └─────────────┘     └─────────────────┘     └─────────────┘
//!                              │
//!                              ▼ checkout.session.completed
//!                     ┌─────────────────┐
//!                     │ WebhookVerifier │──▶ ERP replication
//!                     └─────────────────┘
//! ```
//!
//! The cart travels to the webhook inside the session metadata, which Stripe
//! limits to 500 characters per value. See [`metadata`] for what that costs.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bridge_payments::{CheckoutSessionBuilder, CheckoutUrls, StripeClient};
//!
//! let gateway = Arc::new(StripeClient::from_env()?);
//! let builder = CheckoutSessionBuilder::new(
//!     gateway,
//!     CheckoutUrls::for_storefront("https://shop.example"),
//! );
//!
//! let session = builder.create(&request).await?;
//! // Redirect shopper to: session.url
//! ```

mod cart;
mod checkout;
mod error;
mod gateway;
pub mod metadata;
mod webhook;

pub use cart::{Cart, CartItem, Customer, DeliveryAddress, Project};
pub use checkout::{line_items, to_minor_units, CheckoutRequest, CheckoutSessionBuilder, CheckoutUrls};
pub use error::{PaymentError, Result};
pub use gateway::{LineItem, PaymentGateway, PaymentSession, SessionRequest, StripeClient, StripeConfig};
pub use metadata::CheckoutMetadata;
pub use webhook::{
    CompletedSession, EventData, GatewayEvent, WebhookEvent, WebhookVerifier,
    CHECKOUT_SESSION_COMPLETED, DEFAULT_TOLERANCE_SECS, SIGNATURE_HEADER,
};
